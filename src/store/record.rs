//! Conversion between the typed `Transaction` and the backends' flat,
//! loosely-typed record shape.
//!
//! All the dynamic coercion lives here and nowhere else. Decoding rules,
//! in order:
//! - field names are matched case-insensitively (bulk mode) or positionally
//!   (per-row mode);
//! - `amount` is coerced to a non-negative magnitude;
//! - `type` is inferred by substring match against `income`/`expense`,
//!   falling back to the sign of the raw amount;
//! - `status` is pending if a dedicated status field says so or the type
//!   string embeds `pending` (combined encodings like `pending_expense`);
//! - `date` is re-parsed using local calendar fields, falling back to
//!   today on unparseable input;
//! - a missing id gets a fresh uuid, a missing category gets a default,
//!   a missing description falls back to the category.
//!
//! Encoding inverts this: sign is re-applied (`expense` → negative) and
//! pending status is folded back into the type string as `pending_<type>`
//! so the backend can filter without a separate column.

use crate::model::{today, Amount, Transaction, TransactionKind, TransactionStatus};
use chrono::{DateTime, Local, NaiveDate};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::{json, Value};

/// Category applied to records that arrive without one.
pub(crate) const DEFAULT_CATEGORY: &str = "Other";

/// The fixed column order shared by both backend modes.
pub(crate) const COLUMNS: [&str; 7] = [
    "id",
    "date",
    "category",
    "type",
    "amount",
    "description",
    "status",
];

/// A raw record as it came off the wire, before normalization.
#[derive(Debug, Default, Clone)]
pub(crate) struct RawRecord {
    pub id: Option<String>,
    pub date: Option<String>,
    pub category: Option<String>,
    pub kind: Option<String>,
    pub amount: f64,
    pub description: Option<String>,
    pub status: Option<String>,
}

impl RawRecord {
    /// Builds a raw record from a JSON object, matching field names
    /// case-insensitively.
    pub(crate) fn from_value(value: &Value) -> Self {
        let get = |name: &str| -> Option<&Value> {
            value
                .as_object()?
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v)
        };
        let text = |name: &str| get(name).and_then(value_to_string);
        Self {
            id: text("id"),
            date: text("date"),
            category: text("category"),
            kind: text("type"),
            amount: get("amount").map(value_to_f64).unwrap_or(0.0),
            description: text("description"),
            status: text("status"),
        }
    }

    /// Builds a raw record from a positional sheet row in the fixed
    /// column order.
    pub(crate) fn from_row(row: &[Value]) -> Self {
        let text = |ix: usize| row.get(ix).and_then(value_to_string);
        Self {
            id: text(0),
            date: text(1),
            category: text(2),
            kind: text(3),
            amount: row.get(4).map(value_to_f64).unwrap_or(0.0),
            description: text(5),
            status: text(6),
        }
    }

    /// Applies the documented fallback rules and produces a well-formed
    /// domain transaction. Never fails; every field has a defined default.
    pub(crate) fn normalize(self) -> Transaction {
        let raw_kind = self.kind.unwrap_or_default().to_lowercase();
        let raw_status = self.status.unwrap_or_default().to_lowercase();

        let status = if raw_status == "pending" || raw_kind.contains("pending") {
            TransactionStatus::Pending
        } else {
            TransactionStatus::Paid
        };

        let kind = if raw_kind.contains("income") {
            TransactionKind::Income
        } else if raw_kind.contains("expense") {
            TransactionKind::Expense
        } else if self.amount < 0.0 {
            TransactionKind::Expense
        } else {
            TransactionKind::Income
        };

        let amount = Decimal::try_from(self.amount.abs())
            .map(Amount::new)
            .unwrap_or_default();

        let date = self
            .date
            .as_deref()
            .map(parse_date_lenient)
            .unwrap_or_else(today);

        let category = self
            .category
            .filter(|c| !c.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_CATEGORY.to_string());

        let description = self
            .description
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| category.clone());

        let id = self
            .id
            .filter(|i| !i.trim().is_empty())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        Transaction {
            id,
            kind,
            category,
            amount,
            date,
            description,
            status,
        }
    }
}

/// The `type` string sent on the wire: pending status is folded in as a
/// `pending_` prefix.
pub(crate) fn wire_kind(t: &Transaction) -> String {
    match t.status {
        TransactionStatus::Pending => format!("pending_{}", t.kind),
        TransactionStatus::Paid => t.kind.to_string(),
    }
}

/// The signed wire amount: expenses are negative, income positive,
/// regardless of pending status.
pub(crate) fn wire_amount(t: &Transaction) -> f64 {
    t.amount
        .signed(t.kind == TransactionKind::Expense)
        .to_f64()
        .unwrap_or(0.0)
}

/// Encodes a transaction to the bulk-mode JSON record shape.
pub(crate) fn encode(t: &Transaction) -> Value {
    json!({
        "id": t.id,
        "date": t.date.format("%Y-%m-%d").to_string(),
        "category": t.category,
        "type": wire_kind(t),
        "amount": wire_amount(t),
        "description": t.description,
        "status": t.status.to_string(),
    })
}

/// Encodes a transaction as a positional sheet row in the fixed column
/// order.
pub(crate) fn encode_row(t: &Transaction) -> Vec<Value> {
    vec![
        json!(t.id),
        json!(t.date.format("%Y-%m-%d").to_string()),
        json!(t.category),
        json!(wire_kind(t)),
        json!(wire_amount(t)),
        json!(t.description),
        json!(t.status.to_string()),
    ]
}

/// Parses a date string in several shapes, interpreting timestamps in the
/// local timezone so a UTC rendering of midnight does not shift the day.
/// Unparseable input falls back to today.
fn parse_date_lenient(s: &str) -> NaiveDate {
    let s = s.trim();
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return d;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Local).date_naive();
    }
    for fmt in ["%m/%d/%Y", "%Y/%m/%d", "%d.%m.%Y"] {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return d;
        }
    }
    today()
}

fn value_to_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn value_to_f64(v: &Value) -> f64 {
    match v {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}
