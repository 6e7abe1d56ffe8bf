use crate::args::{AddArgs, EditArgs};
use crate::commands::{App, Out};
use crate::config::BackendKind;
use crate::model::{
    categories, category_breakdown, fallback_category, is_known_category, monthly_expense, today,
    Totals, Transaction, TransactionKind, TransactionStatus,
};
use crate::sync::{Mutation, RemoteOutcome};
use crate::Result;
use anyhow::{bail, Context};
use rust_decimal::Decimal;
use std::fmt::Write;

pub async fn add(app: &App, args: &AddArgs) -> Result<Out<Transaction>> {
    let status = if args.pending() {
        TransactionStatus::Pending
    } else {
        TransactionStatus::Paid
    };
    let category = match args.category() {
        Some(c) => {
            check_category(app.config.backend(), args.kind(), c)?;
            c.to_string()
        }
        None => fallback_category(args.kind()).to_string(),
    };
    let transaction = Transaction::new(
        args.kind(),
        category,
        args.amount(),
        args.date().unwrap_or_else(today),
        args.description(),
        status,
    );
    let recorded = transaction.clone();
    let outcome = app
        .controller
        .mutate(Mutation::Add(transaction))
        .await
        .context("Unable to record the transaction")?;
    finish(app, outcome).await?;
    Ok(Out::new(
        format!(
            "Recorded {} {} of {} ({})",
            recorded.status, recorded.kind, recorded.amount, recorded.id
        ),
        recorded,
    ))
}

pub async fn edit(app: &App, args: &EditArgs) -> Result<Out<Transaction>> {
    let mut transaction = app
        .controller
        .transactions()
        .into_iter()
        .find(|t| t.id == args.id())
        .with_context(|| format!("No transaction with id '{}'", args.id()))?;
    if let Some(kind) = args.kind() {
        transaction.kind = kind;
    }
    if let Some(amount) = args.amount() {
        transaction.amount = amount;
    }
    if let Some(category) = args.category() {
        transaction.category = category.to_string();
    }
    if let Some(date) = args.date() {
        transaction.date = date;
    }
    if let Some(description) = args.description() {
        transaction.description = description.to_string();
    }
    // Pre-existing free text is left alone; only an explicit change has to
    // fit the vocabulary.
    if args.kind().is_some() || args.category().is_some() {
        check_category(app.config.backend(), transaction.kind, &transaction.category)?;
    }

    let edited = transaction.clone();
    let outcome = app
        .controller
        .mutate(Mutation::Update(transaction))
        .await
        .context("Unable to edit the transaction")?;
    finish(app, outcome).await?;
    Ok(Out::new(format!("Updated '{}'", edited.id), edited))
}

pub async fn delete(app: &App, id: &str) -> Result<Out<()>> {
    let outcome = app
        .controller
        .mutate(Mutation::Delete(id.to_string()))
        .await
        .context("Unable to delete the transaction")?;
    finish(app, outcome).await?;
    Ok(format!("Deleted '{id}'").into())
}

pub async fn pay(app: &App, id: &str) -> Result<Out<()>> {
    let outcome = app
        .controller
        .mutate(Mutation::SetStatus(id.to_string(), TransactionStatus::Paid))
        .await
        .context("Unable to mark the transaction paid")?;
    finish(app, outcome).await?;
    Ok(format!("Marked '{id}' as paid").into())
}

pub async fn list(app: &App) -> Result<Out<Vec<Transaction>>> {
    let transactions = app.controller.transactions();
    if transactions.is_empty() {
        return Ok("No transactions".into());
    }
    let mut message = String::new();
    for t in &transactions {
        let pending = if t.status == TransactionStatus::Pending {
            " [pending]"
        } else {
            ""
        };
        let _ = writeln!(
            message,
            "{}  {:7}  {:>12}  {}  {}{pending}  ({})",
            t.date, t.kind, t.amount, t.category, t.description, t.id
        );
    }
    Ok(Out::new(message.trim_end().to_string(), transactions))
}

pub async fn summary(app: &App) -> Result<Out<SummaryOut>> {
    let transactions = app.controller.transactions();
    let totals = Totals::compute(&transactions);
    let currency = &app.config.preferences().currency;
    let mut message = format!(
        "Income:  {1} {0}\nExpense: {2} {0}\nPending: {3} {0}\nBalance: {4} {0}",
        currency,
        totals.income,
        totals.expense,
        totals.pending,
        totals.balance()
    );
    let budget = app
        .controller
        .account()
        .and_then(|a| a.budget)
        .filter(|b| *b > Decimal::ZERO);
    let mut remaining_budget = None;
    if let Some(budget) = budget {
        let spent = monthly_expense(&transactions, today());
        let remaining = budget - spent;
        let used = (spent * Decimal::from(100) / budget).min(Decimal::from(100));
        let _ = write!(
            message,
            "\nBudget:  {remaining} {currency} left of {budget} this month ({used:.0}% used)"
        );
        remaining_budget = Some(remaining.to_string());
    }
    let breakdown = category_breakdown(&transactions, TransactionKind::Expense);
    if !breakdown.is_empty() {
        message.push_str("\n\nExpenses by category:");
        for c in &breakdown {
            let _ = write!(
                message,
                "\n  {:<16} {:>12}  {:.1}%",
                c.category, c.amount, c.percentage
            );
        }
    }
    Ok(Out::new(
        message,
        SummaryOut {
            income: totals.income.to_string(),
            expense: totals.expense.to_string(),
            pending: totals.pending.to_string(),
            balance: totals.balance().to_string(),
            remaining_budget,
        },
    ))
}

/// Serializable projection of [`Totals`] for structured output.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SummaryOut {
    income: String,
    expense: String,
    pending: String,
    balance: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    remaining_budget: Option<String>,
}

// The direct-API backend writes the category column from a fixed
// vocabulary; the webhook script accepts whatever text it is sent.
fn check_category(backend: BackendKind, kind: TransactionKind, category: &str) -> Result<()> {
    if backend == BackendKind::Sheets && !is_known_category(kind, category) {
        bail!(
            "'{category}' is not in the {kind} category list; expected one of: {}",
            categories(kind).join(", ")
        );
    }
    Ok(())
}

// A CLI process exits right after the command, so a deferred bulk push
// would never fire; flush it now.
pub(super) async fn finish(app: &App, outcome: RemoteOutcome) -> Result<()> {
    match outcome {
        RemoteOutcome::Synced => Ok(()),
        RemoteOutcome::Deferred => {
            app.controller
                .flush()
                .await
                .context("The change is saved locally but the push failed")?;
            Ok(())
        }
        RemoteOutcome::Failed(e) => {
            tracing::warn!("the change is saved locally but the remote write failed: {e}");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args::Args;
    use crate::commands::{init, wallet_add};
    use crate::config::BackendKind;
    use crate::store::Mode;
    use clap::Parser;
    use tempfile::TempDir;

    async fn app(dir: &TempDir) -> App {
        init(dir.path(), BackendKind::Webhook).await.unwrap();
        let mut app = App::load(dir.path(), Mode::Test).await.unwrap();
        wallet_add(&mut app, "Personal", Some("https://x/exec"), None)
            .await
            .unwrap();
        app
    }

    async fn sheets_app(dir: &TempDir) -> App {
        init(dir.path(), BackendKind::Sheets).await.unwrap();
        let mut app = App::load(dir.path(), Mode::Test).await.unwrap();
        wallet_add(&mut app, "Personal", None, None).await.unwrap();
        app
    }

    fn add_args(argv: &[&str]) -> AddArgs {
        let mut full = vec!["pocketsheet", "add"];
        full.extend_from_slice(argv);
        let args = Args::parse_from(full);
        match args.command() {
            crate::args::Command::Add(a) => a.clone(),
            _ => unreachable!(),
        }
    }

    #[tokio::test]
    async fn test_add_list_summary() {
        let dir = TempDir::new().unwrap();
        let app = app(&dir).await;

        add(&app, &add_args(&["income", "30000", "--category", "Salary"]))
            .await
            .unwrap();
        add(&app, &add_args(&["expense", "50", "--category", "Food"]))
            .await
            .unwrap();

        let listed = list(&app).await.unwrap();
        assert_eq!(listed.structure().unwrap().len(), 2);

        let out = summary(&app).await.unwrap();
        assert!(out.message().contains("Balance: 29950"));
    }

    #[tokio::test]
    async fn test_pay_then_delete() {
        let dir = TempDir::new().unwrap();
        let app = app(&dir).await;

        let out = add(&app, &add_args(&["expense", "9000", "--pending"]))
            .await
            .unwrap();
        let id = out.structure().unwrap().id.clone();

        pay(&app, &id).await.unwrap();
        let t = &app.controller.transactions()[0];
        assert_eq!(t.status, TransactionStatus::Paid);
        assert_eq!(t.date, today());

        delete(&app, &id).await.unwrap();
        assert!(app.controller.transactions().is_empty());
    }

    #[tokio::test]
    async fn test_edit_overrides_only_given_fields() {
        let dir = TempDir::new().unwrap();
        let app = app(&dir).await;
        let out = add(
            &app,
            &add_args(&["expense", "50", "--category", "Food", "--description", "Lunch"]),
        )
        .await
        .unwrap();
        let id = out.structure().unwrap().id.clone();

        let args = Args::parse_from(["pocketsheet", "edit", &id, "--amount", "75"]);
        let crate::args::Command::Edit(edit_args) = args.command() else {
            unreachable!();
        };
        edit(&app, edit_args).await.unwrap();

        let t = &app.controller.transactions()[0];
        assert_eq!(t.amount.to_string(), "75");
        assert_eq!(t.category, "Food");
        assert_eq!(t.description, "Lunch");
    }

    #[tokio::test]
    async fn test_delete_unknown_id_fails() {
        let dir = TempDir::new().unwrap();
        let app = app(&dir).await;
        assert!(delete(&app, "ghost").await.is_err());
    }

    #[tokio::test]
    async fn test_summary_shows_remaining_budget() {
        let dir = TempDir::new().unwrap();
        init(dir.path(), BackendKind::Webhook).await.unwrap();
        let mut app = App::load(dir.path(), Mode::Test).await.unwrap();
        wallet_add(
            &mut app,
            "Personal",
            Some("https://x/exec"),
            Some(rust_decimal::Decimal::from(10000)),
        )
        .await
        .unwrap();

        // Dated today, so it lands in the current budget month.
        add(&app, &add_args(&["expense", "2500", "--category", "Rent"]))
            .await
            .unwrap();

        let out = summary(&app).await.unwrap();
        assert!(out.message().contains("Budget:  7500 USD left of 10000"));
        assert!(out.message().contains("(25% used)"));
    }

    #[tokio::test]
    async fn test_summary_without_budget_has_no_budget_line() {
        let dir = TempDir::new().unwrap();
        let app = app(&dir).await;
        add(&app, &add_args(&["expense", "50"])).await.unwrap();
        let out = summary(&app).await.unwrap();
        assert!(!out.message().contains("Budget:"));
    }

    #[tokio::test]
    async fn test_sheets_rejects_unknown_category() {
        let dir = TempDir::new().unwrap();
        let app = sheets_app(&dir).await;
        let err = add(&app, &add_args(&["expense", "50", "--category", "Pizza"]))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not in the expense category list"));
        assert!(app.controller.transactions().is_empty());
    }

    #[tokio::test]
    async fn test_sheets_accepts_vocabulary_and_defaults_to_catch_all() {
        let dir = TempDir::new().unwrap();
        let app = sheets_app(&dir).await;

        add(&app, &add_args(&["expense", "50", "--category", "Groceries"]))
            .await
            .unwrap();
        add(&app, &add_args(&["income", "100"])).await.unwrap();

        let list = app.controller.transactions();
        let categories: Vec<&str> = list.iter().map(|t| t.category.as_str()).collect();
        assert!(categories.contains(&"Groceries"));
        assert!(categories.contains(&"Other Income"));
    }

    #[tokio::test]
    async fn test_sheets_edit_kind_change_revalidates_category() {
        let dir = TempDir::new().unwrap();
        let app = sheets_app(&dir).await;
        let out = add(&app, &add_args(&["expense", "50", "--category", "Groceries"]))
            .await
            .unwrap();
        let id = out.structure().unwrap().id.clone();

        // "Groceries" is not in the income vocabulary.
        let args = Args::parse_from(["pocketsheet", "edit", &id, "--kind", "income"]);
        let crate::args::Command::Edit(edit_args) = args.command() else {
            unreachable!();
        };
        assert!(edit(&app, edit_args).await.is_err());
    }

    #[tokio::test]
    async fn test_webhook_keeps_free_text_categories() {
        let dir = TempDir::new().unwrap();
        let app = app(&dir).await;
        add(&app, &add_args(&["expense", "50", "--category", "Pizza"]))
            .await
            .unwrap();
        assert_eq!(app.controller.transactions()[0].category, "Pizza");
    }
}
