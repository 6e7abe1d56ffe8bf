//! The transaction record and the account (wallet) descriptor.

use crate::model::Amount;
use chrono::{Local, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// The direction of a transaction. The amount itself is always a magnitude;
/// this enum is the only carrier of sign.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Income,
    #[default]
    Expense,
}

serde_plain::derive_display_from_serialize!(TransactionKind);
serde_plain::derive_fromstr_from_deserialize!(TransactionKind);

/// Whether a transaction has settled.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    #[default]
    Paid,
    Pending,
}

serde_plain::derive_display_from_serialize!(TransactionStatus);
serde_plain::derive_fromstr_from_deserialize!(TransactionStatus);

/// A single income or expense record.
///
/// `id` is generated client-side at creation and is stable for the
/// transaction's lifetime; it is the join key against remote rows.
/// `date` has no time component and serializes as `YYYY-MM-DD`, which keeps
/// the cached JSON lexicographically sortable.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Transaction {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    pub category: String,
    pub amount: Amount,
    pub date: NaiveDate,
    pub description: String,
    pub status: TransactionStatus,
}

impl Transaction {
    /// Creates a new transaction with a freshly generated id. An empty
    /// description defaults to the category name.
    pub fn new(
        kind: TransactionKind,
        category: impl Into<String>,
        amount: Amount,
        date: NaiveDate,
        description: impl Into<String>,
        status: TransactionStatus,
    ) -> Self {
        let category = category.into();
        let description = description.into();
        let description = if description.trim().is_empty() {
            category.clone()
        } else {
            description
        };
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            category,
            amount,
            date,
            description,
            status,
        }
    }
}

/// Today according to the local calendar. Status changes to `Paid` stamp
/// this onto the transaction.
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Sorts the visible list: date descending, ties keeping their relative
/// insertion order (the sort is stable).
pub fn sort_by_date_desc(transactions: &mut [Transaction]) {
    transactions.sort_by(|a, b| b.date.cmp(&a.date));
}

/// One configured remote store ("wallet") plus its display metadata.
///
/// For per-row backends `id` is the backing spreadsheet's own id and
/// `endpoint` is unset; for bulk backends `id` is synthetic and `endpoint`
/// is the webhook URL.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Account {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// Monthly spending threshold, used only in derived display math.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget: Option<Decimal>,
}

impl Account {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            endpoint: None,
            budget: None,
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn with_budget(mut self, budget: Option<Decimal>) -> Self {
        self.budget = budget;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn tx(id: &str, date: &str) -> Transaction {
        Transaction {
            id: id.to_string(),
            kind: TransactionKind::Expense,
            category: "Groceries".to_string(),
            amount: Amount::from_str("10").unwrap(),
            date: NaiveDate::from_str(date).unwrap(),
            description: "Groceries".to_string(),
            status: TransactionStatus::Paid,
        }
    }

    #[test]
    fn test_sort_date_descending() {
        let mut list = vec![tx("a", "2024-03-01"), tx("b", "2024-03-02")];
        sort_by_date_desc(&mut list);
        assert_eq!(list[0].id, "b");
        assert_eq!(list[1].id, "a");
    }

    #[test]
    fn test_sort_is_stable_under_ties() {
        let mut list = vec![
            tx("a", "2024-03-02"),
            tx("b", "2024-03-01"),
            tx("c", "2024-03-02"),
            tx("d", "2024-03-02"),
        ];
        sort_by_date_desc(&mut list);
        let ids: Vec<&str> = list.iter().map(|t| t.id.as_str()).collect();
        // Same-date entries keep their relative insertion order.
        assert_eq!(ids, vec!["a", "c", "d", "b"]);
    }

    #[test]
    fn test_new_defaults_description_to_category() {
        let t = Transaction::new(
            TransactionKind::Expense,
            "Transport",
            Amount::from_str("25").unwrap(),
            NaiveDate::from_str("2024-03-01").unwrap(),
            "  ",
            TransactionStatus::Paid,
        );
        assert_eq!(t.description, "Transport");
        assert!(!t.id.is_empty());
    }

    #[test]
    fn test_kind_string_forms() {
        assert_eq!(TransactionKind::Income.to_string(), "income");
        assert_eq!(
            TransactionKind::from_str("expense").unwrap(),
            TransactionKind::Expense
        );
    }

    #[test]
    fn test_date_serializes_zero_padded() {
        let t = tx("a", "2024-03-01");
        let json = serde_json::to_string(&t).unwrap();
        assert!(json.contains("\"2024-03-01\""));
    }
}
