use crate::commands::Out;
use crate::{Config, Result};
use anyhow::Context;
use std::path::Path;

/// Creates the data directory, its `store` subdirectory and an initial `config.json` with default
/// settings.
///
/// # Errors
/// - Returns an error if a config already exists or any file operations fail.
pub async fn init(ledger_home: &Path) -> Result<Out<()>> {
    let config = Config::create(ledger_home)
        .await
        .context("Unable to create the data directory and configs")?;
    Ok(format!(
        "Successfully created the ledger directory at '{}'",
        config.root().display()
    )
    .into())
}
