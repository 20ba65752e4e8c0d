//! Stash Core - headless library for AI model cataloging and registry
//! version linking.
//!
//! The crate owns two things: a JSON record store of locally known model
//! files, and the linking engine that reconciles those records against
//! scraped registry data — matching local files to remote versions by
//! hash, registry ids, or (as a labeled guess) file size, and maintaining
//! the bidirectional version-link graph plus newer-version flags.
//!
//! Scraping, file scanning, and any HTTP surface live in other processes;
//! they talk to this crate through [`ModelCatalog`].
//!
//! # Example
//!
//! ```rust,ignore
//! use stash_library::{LinkingConfig, ModelCatalog};
//!
//! #[tokio::main]
//! async fn main() -> stash_library::Result<()> {
//!     let catalog = ModelCatalog::new("/data/models.json");
//!     catalog.load().await?;
//!
//!     // After a successful scrape of one record:
//!     let report = catalog
//!         .ingest_scrape("loras/aduare.safetensors", &scrape, &LinkingConfig::default())
//!         .await?;
//!     println!(
//!         "linked {} confirmed, {} assumed",
//!         report.stats.confirmed_count, report.stats.assumed_count
//!     );
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod linking;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use config::{LinkingConfig, StoreConfig};
pub use error::{Result, StashError};
pub use linking::{
    detect_for_record, family_id_from_url, resolve_family_id, run_linking_pass, LinkGraph,
};
pub use store::{ModelCatalog, StoreDocument};
pub use types::{
    LinkInfo, LinkMatch, LinkMethod, LinkReport, LinkStats, LinkType, ModelRecord, NewerVersion,
    NewerVersionInfo, ScrapeData, ScrapedVersion, VariantHashes, VersionFile,
};
