//! Record store: one JSON document holding every known model record.
//!
//! The store is deliberately a whole-document value. There are no
//! transactions; instead, every mutating operation on [`ModelCatalog`] is a
//! session that works on a copy of the document, performs one atomic save,
//! and only then commits the copy to memory. Because the linking pass is
//! idempotent, a caller that loses a race can simply reload and re-run.

mod atomic;

pub use atomic::{read_json, write_json};

use crate::config::{LinkingConfig, StoreConfig};
use crate::error::{Result, StashError};
use crate::linking;
use crate::types::{LinkReport, ModelRecord, NewerVersionInfo, ScrapeData};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

/// The persisted store document.
///
/// Records are keyed by path in a `BTreeMap`, which both keeps the JSON
/// output stable and fixes the iteration order the matchers rely on.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreDocument {
    /// Schema version of the document.
    pub version: String,
    /// All known records, keyed by path.
    #[serde(default)]
    pub models: BTreeMap<String, ModelRecord>,
}

impl Default for StoreDocument {
    fn default() -> Self {
        Self {
            version: StoreConfig::SCHEMA_VERSION.to_string(),
            models: BTreeMap::new(),
        }
    }
}

impl StoreDocument {
    /// Look up a record, or fail with `RecordNotFound`.
    pub fn require(&self, path: &str) -> Result<&ModelRecord> {
        self.models
            .get(path)
            .ok_or_else(|| StashError::record_not_found(path))
    }

    /// Mutable variant of [`StoreDocument::require`].
    pub fn require_mut(&mut self, path: &str) -> Result<&mut ModelRecord> {
        self.models
            .get_mut(path)
            .ok_or_else(|| StashError::record_not_found(path))
    }
}

/// Manages the store document and its persistence.
///
/// This is the entry point collaborators use: the scanner upserts records,
/// the scraper calls [`ModelCatalog::ingest_scrape`] after each successful
/// scrape, and background jobs call
/// [`ModelCatalog::refresh_newer_versions`]. Callers must serialize
/// mutating sessions — at most one at a time — which the internal write
/// lock enforces within a single process.
#[derive(Debug)]
pub struct ModelCatalog {
    /// Path of the store JSON document.
    store_path: PathBuf,
    /// In-memory copy of the document.
    document: Arc<RwLock<StoreDocument>>,
}

impl ModelCatalog {
    /// Create a catalog backed by the given document path.
    ///
    /// The document is not read until [`ModelCatalog::load`] is called; a
    /// fresh catalog starts from an empty document.
    pub fn new(store_path: impl Into<PathBuf>) -> Self {
        Self {
            store_path: store_path.into(),
            document: Arc::new(RwLock::new(StoreDocument::default())),
        }
    }

    /// The path of the backing document.
    pub fn store_path(&self) -> &Path {
        &self.store_path
    }

    /// Load the document from disk. Missing file means an empty store.
    pub async fn load(&self) -> Result<()> {
        let data: Option<StoreDocument> = atomic::read_json(&self.store_path)?;
        if let Some(data) = data {
            *self.document.write().await = data;
        }
        Ok(())
    }

    /// Save the in-memory document to disk atomically.
    pub async fn save(&self) -> Result<()> {
        let data = self.document.read().await.clone();
        atomic::write_json(&self.store_path, &data, StoreConfig::KEEP_BACKUP_ON_SAVE)
    }

    /// Number of records in the store.
    pub async fn count(&self) -> usize {
        self.document.read().await.models.len()
    }

    /// Fetch a copy of one record.
    pub async fn get(&self, path: &str) -> Option<ModelRecord> {
        self.document.read().await.models.get(path).cloned()
    }

    /// Insert or replace a record, persisting the document.
    ///
    /// This is the scanner's interface; the linking engine itself never
    /// creates records.
    pub async fn upsert(&self, path: impl Into<String>, record: ModelRecord) -> Result<()> {
        let mut doc = self.document.write().await;
        let mut working = doc.clone();
        working.models.insert(path.into(), record);
        atomic::write_json(&self.store_path, &working, StoreConfig::KEEP_BACKUP_ON_SAVE)?;
        *doc = working;
        Ok(())
    }

    /// Store the latest scrape snapshot on a record, persisting the
    /// document. The snapshot is what the newer-version detector reads.
    pub async fn record_scrape(&self, path: &str, scrape: ScrapeData) -> Result<()> {
        let mut doc = self.document.write().await;
        let mut working = doc.clone();
        working.require_mut(path)?.scraped_versions = Some(scrape);
        atomic::write_json(&self.store_path, &working, StoreConfig::KEEP_BACKUP_ON_SAVE)?;
        *doc = working;
        Ok(())
    }

    /// Run one linking pass for a freshly scraped record.
    ///
    /// The pass runs against a working copy of the document; its mutations
    /// are persisted with one atomic save and committed to memory only
    /// when that save succeeds. On any error the in-memory document and
    /// the file on disk are both unchanged.
    pub async fn ingest_scrape(
        &self,
        path: &str,
        scrape: &ScrapeData,
        config: &LinkingConfig,
    ) -> Result<LinkReport> {
        config.validate()?;

        let mut doc = self.document.write().await;
        let mut working = doc.clone();

        let report = linking::run_linking_pass(&mut working, path, scrape, config)?;

        atomic::write_json(&self.store_path, &working, StoreConfig::KEEP_BACKUP_ON_SAVE)?;
        *doc = working;

        info!(
            origin = path,
            confirmed = report.stats.confirmed_count,
            assumed = report.stats.assumed_count,
            "Linking pass persisted"
        );
        Ok(report)
    }

    /// Re-run newer-version detection over every record.
    ///
    /// Returns the records that currently have a newer version, keyed by
    /// path. Records whose flag is no longer justified are cleared.
    pub async fn refresh_newer_versions(&self) -> Result<BTreeMap<String, NewerVersionInfo>> {
        let mut doc = self.document.write().await;
        let mut working = doc.clone();

        let found = linking::newer::refresh_store(&mut working.models);

        atomic::write_json(&self.store_path, &working, StoreConfig::KEEP_BACKUP_ON_SAVE)?;
        *doc = working;

        info!(flagged = found.len(), "Newer-version sweep persisted");
        Ok(found)
    }
}
