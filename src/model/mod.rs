mod amount;
mod category;
mod summary;
mod transaction;

pub use amount::Amount;
pub use category::{
    categories, fallback_category, is_known_category, EXPENSE_CATEGORIES, INCOME_CATEGORIES,
};
pub use summary::{category_breakdown, monthly_expense, CategorySummary, Totals};
pub use transaction::{
    sort_by_date_desc, today, Account, Transaction, TransactionKind, TransactionStatus,
};
