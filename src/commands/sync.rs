use crate::commands::{App, Out};
use crate::sync::RemoteOutcome;
use crate::Result;
use anyhow::Context;

/// Re-fetches the active wallet from the remote store.
pub async fn pull(app: &App) -> Result<Out<()>> {
    app.controller
        .refresh()
        .await
        .context("Unable to pull from the remote store")?;
    let count = app.controller.transactions().len();
    Ok(format!("Pulled {count} transactions").into())
}

/// Pushes any unsynced local changes immediately.
pub async fn push(app: &App) -> Result<Out<()>> {
    match app
        .controller
        .flush()
        .await
        .context("Unable to push to the remote store")?
    {
        RemoteOutcome::Synced => Ok("Remote store is up to date".into()),
        RemoteOutcome::Deferred => Ok("A transfer is in flight; push deferred".into()),
        RemoteOutcome::Failed(e) => Err(anyhow::anyhow!("Push failed: {e}")),
    }
}
