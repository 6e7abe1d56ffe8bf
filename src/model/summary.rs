//! Derived display math over a transaction list: realized totals and a
//! per-category breakdown. Pure projections; nothing here feeds back into
//! the sync core.

use crate::model::{Transaction, TransactionKind, TransactionStatus};
use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use std::collections::BTreeMap;

/// Realized and pending totals over a set of transactions.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Totals {
    /// Sum of paid income.
    pub income: Decimal,
    /// Sum of paid expenses (as a positive magnitude).
    pub expense: Decimal,
    /// Sum of pending amounts, regardless of direction.
    pub pending: Decimal,
}

impl Totals {
    pub fn compute<'a>(transactions: impl IntoIterator<Item = &'a Transaction>) -> Self {
        let mut totals = Totals::default();
        for t in transactions {
            if t.status == TransactionStatus::Pending {
                totals.pending += t.amount.value();
                continue;
            }
            match t.kind {
                TransactionKind::Income => totals.income += t.amount.value(),
                TransactionKind::Expense => totals.expense += t.amount.value(),
            }
        }
        totals
    }

    pub fn balance(&self) -> Decimal {
        self.income - self.expense
    }
}

/// Paid expense total for the calendar month containing `month`. Budget
/// lines compare against this, so pending transactions do not count.
pub fn monthly_expense(transactions: &[Transaction], month: NaiveDate) -> Decimal {
    transactions
        .iter()
        .filter(|t| {
            t.kind == TransactionKind::Expense
                && t.status == TransactionStatus::Paid
                && t.date.year() == month.year()
                && t.date.month() == month.month()
        })
        .map(|t| t.amount.value())
        .sum()
}

/// One category's share of the paid transactions of a given kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategorySummary {
    pub category: String,
    pub amount: Decimal,
    /// Share of the kind's total, 0–100.
    pub percentage: Decimal,
}

/// Groups paid transactions of `kind` by category, largest first.
pub fn category_breakdown(transactions: &[Transaction], kind: TransactionKind) -> Vec<CategorySummary> {
    let mut by_category: BTreeMap<&str, Decimal> = BTreeMap::new();
    for t in transactions {
        if t.kind == kind && t.status == TransactionStatus::Paid {
            *by_category.entry(t.category.as_str()).or_default() += t.amount.value();
        }
    }
    let total: Decimal = by_category.values().copied().sum();
    let mut summaries: Vec<CategorySummary> = by_category
        .into_iter()
        .map(|(category, amount)| CategorySummary {
            category: category.to_string(),
            amount,
            percentage: if total.is_zero() {
                Decimal::ZERO
            } else {
                amount * Decimal::from(100) / total
            },
        })
        .collect();
    summaries.sort_by(|a, b| b.amount.cmp(&a.amount));
    summaries
}
