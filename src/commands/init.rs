use crate::commands::Out;
use crate::config::BackendKind;
use crate::{Config, Result};
use anyhow::Context;
use std::path::Path;

/// Creates the data directory with an initial `config.json` and an empty
/// cache directory.
pub async fn init(home: &Path, backend: BackendKind) -> Result<Out<()>> {
    let _config = Config::create(home, backend)
        .await
        .context("Unable to create the data directory and config")?;
    Ok(format!(
        "Initialized '{}' with the {backend} backend",
        home.display()
    )
    .into())
}
