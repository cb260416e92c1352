//! The ledger store adapter: owns the aggregated ledger document and the single backup slot.
//!
//! Every mutating operation is a read-modify-write of one whole document with no version check,
//! so two adds that race can lose one side's items. The store's last-write-wins semantics are the
//! only guarantee.

use crate::api::Store;
use crate::model::{DateEntry, Item, Ledger, Snapshot};
use crate::{Config, Result};
use anyhow::{ensure, Context};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

/// What `render` returns for a ledger without entries.
pub const NO_RECORDS: &str = "目前沒有任何消費記錄";

/// The result of adding items to the ledger.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddSummary {
    /// The number of items that were added.
    pub total_items: usize,
    /// The sum of the prices of the items that were added.
    pub total: u64,
}

/// The result of an undo.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UndoOutcome {
    /// The ledger was restored from the backup slot, which now holds `entries` entries.
    Restored { entries: usize },
    /// No add has ever happened, so there is no backup to restore.
    NothingToRestore,
}

/// Reads and writes the ledger and its backup through a `Store`. This is the only code that
/// touches those two documents.
#[derive(Clone)]
pub struct LedgerStore {
    store: Arc<dyn Store>,
    collection: String,
    ledger_doc: String,
    backup_doc: String,
}

impl LedgerStore {
    pub fn new(
        store: Arc<dyn Store>,
        collection: impl Into<String>,
        ledger_doc: impl Into<String>,
        backup_doc: impl Into<String>,
    ) -> Self {
        Self {
            store,
            collection: collection.into(),
            ledger_doc: ledger_doc.into(),
            backup_doc: backup_doc.into(),
        }
    }

    /// Uses the document ids from `config`.
    pub fn from_config(config: &Config, store: Arc<dyn Store>) -> Self {
        Self::new(
            store,
            config.collection(),
            config.ledger_doc(),
            config.backup_doc(),
        )
    }

    /// Adds `items` under `date`. The current ledger is always copied into the backup slot first,
    /// even when it is empty. Items for a date that already exists are appended to that entry;
    /// otherwise a new entry is appended at the end.
    pub async fn add_expenses(&self, items: &[Item], date: &str) -> Result<AddSummary> {
        ensure!(!date.trim().is_empty(), "A date is required to add expenses");
        ensure!(!items.is_empty(), "There are no items to add for {date}");

        let now = Utc::now();
        let mut ledger = self.aggregated().await?;
        self.save_backup(&ledger, now).await?;

        ledger.merge(date, items.to_vec(), now);
        ledger.touch(now);
        self.save_ledger(&ledger).await?;

        let summary = AddSummary {
            total_items: items.len(),
            total: items.iter().map(Item::price).sum(),
        };
        info!(
            "Added {} items totaling {} for {date}",
            summary.total_items, summary.total
        );
        Ok(summary)
    }

    /// Merges many date entries at once, as parsed from a historical block. One backup is taken
    /// before the first merge so a single undo reverts the whole import. Nothing is written when
    /// `entries` is empty.
    pub async fn import_entries(&self, entries: Vec<DateEntry>) -> Result<AddSummary> {
        if entries.is_empty() {
            return Ok(AddSummary::default());
        }

        let now = Utc::now();
        let mut ledger = self.aggregated().await?;
        self.save_backup(&ledger, now).await?;

        let mut summary = AddSummary::default();
        for entry in entries {
            summary.total_items += entry.items().len();
            summary.total += entry.total();
            let date = entry.date().to_string();
            ledger.merge(&date, entry.into_items(), now);
        }
        ledger.touch(now);
        self.save_ledger(&ledger).await?;

        info!(
            "Imported {} items totaling {}",
            summary.total_items, summary.total
        );
        Ok(summary)
    }

    /// Returns the stored ledger, or an empty one if it has never been written.
    pub async fn aggregated(&self) -> Result<Ledger> {
        let doc = self
            .store
            .get(&self.collection, &self.ledger_doc)
            .await
            .context("Unable to read the ledger")?;
        match doc {
            Some(value) => serde_json::from_value(value).context("The ledger document is invalid"),
            None => Ok(Ledger::default()),
        }
    }

    /// Returns the backup slot, or `None` if no add has ever happened.
    pub async fn backup(&self) -> Result<Option<Snapshot>> {
        let doc = self
            .store
            .get(&self.collection, &self.backup_doc)
            .await
            .context("Unable to read the backup")?;
        doc.map(|value| serde_json::from_value(value).context("The backup document is invalid"))
            .transpose()
    }

    /// Restores the ledger to the state it had before the most recent add. The backup slot is left
    /// as it is, so repeating an undo restores the same snapshot again.
    pub async fn undo_last_change(&self) -> Result<UndoOutcome> {
        let snapshot = match self.backup().await? {
            Some(snapshot) => snapshot,
            None => return Ok(UndoOutcome::NothingToRestore),
        };
        debug!("Restoring the backup taken at {}", snapshot.backup_time());

        let mut ledger = snapshot.into_ledger();
        ledger.touch(Utc::now());
        self.save_ledger(&ledger).await?;

        let entries = ledger.entries().len();
        info!("Restored the ledger to {entries} entries");
        Ok(UndoOutcome::Restored { entries })
    }

    async fn save_ledger(&self, ledger: &Ledger) -> Result<()> {
        let value = serde_json::to_value(ledger).context("Unable to serialize the ledger")?;
        self.store
            .set(&self.collection, &self.ledger_doc, &value)
            .await
            .context("Unable to write the ledger")
    }

    async fn save_backup(&self, ledger: &Ledger, now: DateTime<Utc>) -> Result<()> {
        let snapshot = Snapshot::new(ledger.clone(), now);
        let value = serde_json::to_value(&snapshot).context("Unable to serialize the backup")?;
        self.store
            .set(&self.collection, &self.backup_doc, &value)
            .await
            .context("Unable to write the backup")
    }
}

/// Renders the ledger as plain text: each entry's date on its own line followed by one
/// `name price` line per item, entries back to back in stored order.
pub fn render(ledger: &Ledger) -> String {
    if ledger.is_empty() {
        return NO_RECORDS.to_string();
    }
    let mut text = String::new();
    for entry in ledger.entries() {
        text.push_str(entry.date());
        text.push('\n');
        for item in entry.items() {
            text.push_str(&item.to_string());
            text.push('\n');
        }
    }
    text.trim_end().to_string()
}
