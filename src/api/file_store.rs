//! Implements the `Store` trait with one JSON file per document on the local disk.

use crate::api::Store;
use crate::{utils, Result};
use anyhow::{ensure, Context};
use serde_json::Value;
use std::path::PathBuf;
use tracing::trace;
use uuid::Uuid;

/// Stores each document as `<root>/<collection>/<id>.json`. Writes go to a temporary file that is
/// then renamed over the document, so a reader sees either the old or the new document in full.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn collection_dir(&self, collection: &str) -> Result<PathBuf> {
        validate_name(collection)?;
        Ok(self.root.join(collection))
    }

    fn document_path(&self, collection: &str, id: &str) -> Result<PathBuf> {
        validate_name(id)?;
        Ok(self.collection_dir(collection)?.join(format!("{id}.json")))
    }
}

#[async_trait::async_trait]
impl Store for FileStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>> {
        let path = self.document_path(collection, id)?;
        trace!("get {}", path.display());
        if !path.is_file() {
            return Ok(None);
        }
        Ok(Some(utils::deserialize(&path).await?))
    }

    async fn set(&self, collection: &str, id: &str, data: &Value) -> Result<()> {
        let dir = self.collection_dir(collection)?;
        let path = self.document_path(collection, id)?;
        trace!("set {}", path.display());
        utils::make_dir(&dir).await?;

        let json = serde_json::to_string_pretty(data)
            .with_context(|| format!("Unable to serialize document {collection}/{id}"))?;
        let tmp = dir.join(format!(".{id}.{}.tmp", Uuid::new_v4().simple()));
        utils::write(&tmp, json).await?;
        utils::rename(&tmp, &path).await
    }
}

/// Collection names and document ids become path components, so they must be plain names.
fn validate_name(name: &str) -> Result<()> {
    ensure!(!name.is_empty(), "Document names cannot be empty");
    ensure!(
        name != "." && name != ".." && !name.contains(['/', '\\']),
        "Invalid document name '{name}'"
    );
    Ok(())
}
