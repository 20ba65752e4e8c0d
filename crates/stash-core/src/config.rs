//! Centralized configuration for the Stash library.

use crate::error::{Result, StashError};

/// Store-level constants.
pub struct StoreConfig;

impl StoreConfig {
    /// Default file name for the store document.
    pub const STORE_FILE_NAME: &'static str = "models.json";
    /// Schema version written into new store documents.
    pub const SCHEMA_VERSION: &'static str = "1.0.0";
    /// Whether saves keep a `.bak` copy of the previous document.
    pub const KEEP_BACKUP_ON_SAVE: bool = true;
}

/// Tuning knobs for one linking pass.
///
/// The only knob today is the size tolerance used by the assumed tier.
/// There is no universally correct value; 1% keeps false positives rare
/// while still catching re-uploads whose byte size drifted slightly.
/// Callers that curate small, homogeneous collections may want it tighter.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkingConfig {
    /// Relative file-size tolerance for assumed matches, as a fraction of
    /// the remote file size. Must be in the open interval (0, 1).
    pub size_tolerance: f64,
}

impl LinkingConfig {
    /// Default assumed-tier size tolerance: 1%.
    pub const DEFAULT_SIZE_TOLERANCE: f64 = 0.01;

    /// Create a config with an explicit size tolerance.
    pub fn new(size_tolerance: f64) -> Result<Self> {
        let config = Self { size_tolerance };
        config.validate()?;
        Ok(config)
    }

    /// Check that the tolerance is a usable fraction.
    pub fn validate(&self) -> Result<()> {
        if !self.size_tolerance.is_finite()
            || self.size_tolerance <= 0.0
            || self.size_tolerance >= 1.0
        {
            return Err(StashError::Validation {
                field: "size_tolerance".into(),
                message: format!(
                    "must be a fraction in (0, 1), got {}",
                    self.size_tolerance
                ),
            });
        }
        Ok(())
    }
}

impl Default for LinkingConfig {
    fn default() -> Self {
        Self {
            size_tolerance: Self::DEFAULT_SIZE_TOLERANCE,
        }
    }
}
