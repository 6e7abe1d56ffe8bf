use crate::commands::{App, Out};
use crate::model::Transaction;
use crate::sync::Mutation;
use crate::voice::{RecognitionOutcome, VoiceRecognizer};
use crate::Result;
use anyhow::{bail, Context};
use std::path::Path;

/// Recognizes a transaction from a recorded audio file and records it.
pub async fn voice(app: &App, file: &Path, mime: Option<&str>) -> Result<Out<Transaction>> {
    let Some(api_key) = app.config.gemini_api_key() else {
        bail!("No gemini_api_key in the config file; voice input is unavailable");
    };
    let audio = tokio::fs::read(file)
        .await
        .with_context(|| format!("Unable to read audio file {}", file.display()))?;
    let mime = match mime {
        Some(m) => m.to_string(),
        None => guess_mime(file)?,
    };

    let recognizer = VoiceRecognizer::new(api_key, app.config.timeout())?;
    match recognizer.recognize(&audio, &mime).await {
        RecognitionOutcome::Recognized(transaction) => {
            let recorded = transaction.clone();
            let outcome = app
                .controller
                .mutate(Mutation::Add(transaction))
                .await
                .context("Unable to record the recognized transaction")?;
            crate::commands::tx::finish(app, outcome).await?;
            Ok(Out::new(
                format!(
                    "Recorded {} of {} in '{}' ({})",
                    recorded.kind, recorded.amount, recorded.category, recorded.id
                ),
                recorded,
            ))
        }
        RecognitionOutcome::Empty => Ok("No transaction recognized in the audio".into()),
        RecognitionOutcome::Failed(reason) => bail!("Voice recognition failed: {reason}"),
    }
}

fn guess_mime(file: &Path) -> Result<String> {
    let ext = file
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    let mime = match ext.as_deref() {
        Some("wav") => "audio/wav",
        Some("mp3") => "audio/mp3",
        Some("ogg") => "audio/ogg",
        Some("webm") => "audio/webm",
        Some("m4a") | Some("aac") => "audio/aac",
        Some("flac") => "audio/flac",
        _ => bail!(
            "Cannot guess the audio MIME type of '{}'; pass --mime",
            file.display()
        ),
    };
    Ok(mime.to_string())
}
