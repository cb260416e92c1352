//! The `record`, `view`, `undo` and `import` commands, which work on the ledger directly.

use crate::commands::Out;
use crate::dispatch::today;
use crate::ledger::{render, AddSummary, LedgerStore, UndoOutcome};
use crate::model::Ledger;
use crate::parse::{parse_expenses, parse_history};
use crate::{api, utils, Config, Result};
use anyhow::{bail, Context};
use chrono::Utc;
use std::path::Path;
use tokio::io::AsyncReadExt;

/// Records the expense lines in `text` under today's date.
pub async fn record(config: Config, text: &str) -> Result<Out<AddSummary>> {
    let expenses = parse_expenses(text);
    if expenses.is_empty() {
        bail!("No expense lines were found, expected lines like '鮮奶 255'");
    }
    let ledger = LedgerStore::from_config(&config, api::store(&config));
    let summary = ledger
        .add_expenses(expenses.items(), &today(config.timezone()))
        .await?;
    Ok(Out::new(
        format!(
            "✅ 已記錄 {} 項消費，總計：{}",
            summary.total_items, summary.total
        ),
        summary,
    ))
}

/// Prints the whole ledger.
pub async fn view(config: Config) -> Result<Out<Ledger>> {
    let ledger = LedgerStore::from_config(&config, api::store(&config))
        .aggregated()
        .await?;
    Ok(Out::new(render(&ledger), ledger))
}

/// Restores the ledger from the backup slot.
pub async fn undo(config: Config) -> Result<Out<UndoOutcome>> {
    let outcome = LedgerStore::from_config(&config, api::store(&config))
        .undo_last_change()
        .await?;
    let message = match outcome {
        UndoOutcome::Restored { entries } => {
            format!("Restored the ledger from the backup ({entries} dates)")
        }
        UndoOutcome::NothingToRestore => "There is no backup to restore".to_string(),
    };
    Ok(Out::new(message, outcome))
}

/// Reads a pasted history of `M/D` headers, each followed by item lines, from `file` (or stdin when
/// `None`) and merges it into the stored ledger as one undoable change. Dates are kept as written.
pub async fn import(config: Config, file: Option<&Path>) -> Result<Out<AddSummary>> {
    let text = match file {
        Some(path) => utils::read(path).await?,
        None => {
            let mut text = String::new();
            tokio::io::stdin()
                .read_to_string(&mut text)
                .await
                .context("Unable to read from stdin")?;
            text
        }
    };

    let entries = parse_history(&text, Utc::now());
    if entries.is_empty() {
        bail!("No dated entries were found to import");
    }
    let dates = entries.len();
    let ledger = LedgerStore::from_config(&config, api::store(&config));
    let summary = ledger.import_entries(entries).await?;
    Ok(Out::new(
        format!(
            "Imported {} items across {dates} dates, totaling {}",
            summary.total_items, summary.total
        ),
        summary,
    ))
}
