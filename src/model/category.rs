//! The fixed category vocabularies, one list per transaction kind.
//!
//! The direct-API backend keeps the sheet's category column to these
//! values; the webhook backend tolerates free text since the receiving
//! script defines its own rules.

use crate::model::TransactionKind;

pub const INCOME_CATEGORIES: &[&str] = &[
    "Salary",
    "Bonus",
    "Investment",
    "Freelance",
    "Gift",
    "Other Income",
];

pub const EXPENSE_CATEGORIES: &[&str] = &[
    "Rent/Housing",
    "Groceries",
    "Dining Out",
    "Utilities/Bills",
    "Transportation",
    "Entertainment",
    "Health/Medicine",
    "Shopping",
    "Subscription",
    "Other Expense",
];

/// The vocabulary for a kind.
pub fn categories(kind: TransactionKind) -> &'static [&'static str] {
    match kind {
        TransactionKind::Income => INCOME_CATEGORIES,
        TransactionKind::Expense => EXPENSE_CATEGORIES,
    }
}

/// The kind's catch-all entry, used when no category is given.
pub fn fallback_category(kind: TransactionKind) -> &'static str {
    match kind {
        TransactionKind::Income => "Other Income",
        TransactionKind::Expense => "Other Expense",
    }
}

pub fn is_known_category(kind: TransactionKind, category: &str) -> bool {
    categories(kind).contains(&category)
}
