//! Voice-to-transaction recognition.
//!
//! Sends a recorded utterance ("spent fifty on groceries yesterday") to
//! the Gemini API and asks for a structured transaction draft back. The
//! response format is pinned with a JSON response schema so the model
//! cannot reply in prose. Recognition is best-effort by contract: every
//! failure mode collapses to [`RecognitionOutcome::Failed`] and never
//! takes the app down.

use crate::model::{today, Amount, Transaction, TransactionKind, TransactionStatus};
use base64::Engine;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};

const GEMINI_BASE: &str = "https://generativelanguage.googleapis.com";
const MODEL: &str = "gemini-2.5-flash";

const PROMPT: &str = "Extract a financial transaction from this voice note. \
Respond with the amount, whether it is an income or an expense, a short \
category, an optional description, and the date if one is mentioned. \
If the audio contains no recognizable transaction, respond with null.";

/// What came back from a recognition attempt.
#[derive(Debug)]
pub enum RecognitionOutcome {
    /// A transaction was heard and parsed.
    Recognized(Transaction),
    /// The audio contained no recognizable transaction.
    Empty,
    /// The request or the response parse failed.
    Failed(String),
}

/// The model's structured reply, before it becomes a [`Transaction`].
#[derive(Debug, Deserialize)]
pub struct TransactionDraft {
    #[serde(rename = "type", default)]
    pub kind: TransactionKind,
    #[serde(default)]
    pub category: Option<String>,
    pub amount: f64,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

impl TransactionDraft {
    /// Builds a full transaction: fresh id, `paid` status, and today's
    /// date when the utterance did not mention one.
    pub fn into_transaction(self) -> Transaction {
        let amount = Decimal::try_from(self.amount)
            .map(Amount::new)
            .unwrap_or_default();
        Transaction::new(
            self.kind,
            self.category.unwrap_or_else(|| "Other".to_string()),
            amount,
            self.date.unwrap_or_else(today),
            self.description.unwrap_or_default(),
            TransactionStatus::Paid,
        )
    }
}

pub struct VoiceRecognizer {
    client: reqwest::Client,
    api_key: String,
    base: String,
}

impl VoiceRecognizer {
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> crate::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            base: GEMINI_BASE.to_string(),
        })
    }

    /// Points the recognizer at an alternate API base URL. Testing hook.
    pub fn with_base(mut self, base: impl Into<String>) -> Self {
        self.base = base.into();
        self
    }

    /// Recognizes one utterance. `mime` is the audio MIME type as recorded
    /// (for example `audio/webm` or `audio/wav`).
    pub async fn recognize(&self, audio: &[u8], mime: &str) -> RecognitionOutcome {
        let encoded = base64::engine::general_purpose::STANDARD.encode(audio);
        let body = json!({
            "contents": [{
                "parts": [
                    { "text": PROMPT },
                    { "inline_data": { "mime_type": mime, "data": encoded } }
                ]
            }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": {
                    "type": "OBJECT",
                    "nullable": true,
                    "properties": {
                        "type": { "type": "STRING", "enum": ["income", "expense"] },
                        "amount": { "type": "NUMBER" },
                        "category": { "type": "STRING" },
                        "description": { "type": "STRING" },
                        "date": { "type": "STRING" }
                    },
                    "required": ["type", "amount"]
                }
            }
        });

        let url = format!(
            "{}/v1beta/models/{MODEL}:generateContent?key={}",
            self.base, self.api_key
        );
        let response = match self.client.post(&url).json(&body).send().await {
            Ok(r) => r,
            Err(e) => return RecognitionOutcome::Failed(format!("request failed: {e}")),
        };
        let status = response.status();
        if !status.is_success() {
            return RecognitionOutcome::Failed(format!("recognition API answered HTTP {status}"));
        }
        let payload: Value = match response.json().await {
            Ok(v) => v,
            Err(e) => return RecognitionOutcome::Failed(format!("unreadable response: {e}")),
        };

        parse_reply(&payload)
    }
}

fn parse_reply(payload: &Value) -> RecognitionOutcome {
    let Some(text) = payload["candidates"][0]["content"]["parts"][0]["text"].as_str() else {
        return RecognitionOutcome::Failed("response carried no text part".to_string());
    };
    let trimmed = text.trim();
    if trimmed.is_empty() || trimmed == "null" {
        debug!("no transaction recognized in utterance");
        return RecognitionOutcome::Empty;
    }
    match serde_json::from_str::<Option<TransactionDraft>>(trimmed) {
        Ok(Some(draft)) => RecognitionOutcome::Recognized(draft.into_transaction()),
        Ok(None) => RecognitionOutcome::Empty,
        Err(e) => {
            warn!("unparseable recognition reply: {e}");
            RecognitionOutcome::Failed(format!("unparseable reply: {e}"))
        }
    }
}
