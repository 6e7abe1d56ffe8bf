use crate::commands::{App, Out};
use crate::model::Account;
use crate::Result;
use rust_decimal::Decimal;
use std::fmt::Write;

pub async fn wallet_list(app: &App) -> Result<Out<Vec<Account>>> {
    let accounts = app.registry.list(&app.config).await?;
    if accounts.is_empty() {
        return Ok("No wallets configured".into());
    }
    let active = app.config.active_account().map(|a| a.id.clone());
    let mut message = String::new();
    for account in &accounts {
        let marker = if active.as_deref() == Some(&account.id) {
            "*"
        } else {
            " "
        };
        let _ = writeln!(message, "{marker} {}  {}", account.id, account.name);
    }
    Ok(Out::new(message.trim_end().to_string(), accounts))
}

pub async fn wallet_add(
    app: &mut App,
    name: &str,
    endpoint: Option<&str>,
    budget: Option<Decimal>,
) -> Result<Out<Account>> {
    let account = app
        .registry
        .create(&mut app.config, name, endpoint.map(str::to_string), budget)
        .await?;
    Ok(Out::new(
        format!("Added wallet '{}' ({})", account.name, account.id),
        account,
    ))
}

pub async fn wallet_remove(app: &mut App, id: &str) -> Result<Out<()>> {
    app.registry.remove(&mut app.config, id).await?;
    Ok(format!("Removed wallet '{id}'").into())
}

pub async fn wallet_use(app: &mut App, id: &str) -> Result<Out<()>> {
    app.registry.set_active(&mut app.config, id).await?;
    Ok(format!("Active wallet is now '{id}'").into())
}
