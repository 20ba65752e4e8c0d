//! Newer-version detection.
//!
//! A derived read over the scrape snapshot stored on each record: compare
//! the publish date of the record's own version against every sibling
//! version the registry listed, and flag the record when strictly newer
//! ones exist. Absent or unparsable dates are "unknown" and can never make
//! a version count as newer.

use crate::types::{ModelRecord, NewerVersion, NewerVersionInfo, ScrapedVersion};
use chrono::{DateTime, FixedOffset};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Parse a registry publish timestamp (RFC 3339 / ISO-8601, `Z` accepted).
///
/// Returns `None` for anything unparsable; bad dates are data quality
/// noise, not errors.
pub fn parse_published_at(raw: &str) -> Option<DateTime<FixedOffset>> {
    match DateTime::parse_from_rfc3339(raw) {
        Ok(dt) => Some(dt),
        Err(e) => {
            debug!(raw, error = %e, "Unparsable publish date, treating as unknown");
            None
        }
    }
}

/// Pick the snapshot entry that represents the record's own version.
///
/// Precedence: the record's stored version id, then the snapshot's
/// `currentVersionId`, then the first listed version (the registry lists
/// the primary release first).
fn current_version<'a>(
    record: &ModelRecord,
    versions: &'a [ScrapedVersion],
) -> Option<&'a ScrapedVersion> {
    let current_id = record.version_id.as_deref().or_else(|| {
        record
            .scraped_versions
            .as_ref()
            .and_then(|s| s.current_version_id.as_deref())
    });

    current_id
        .and_then(|id| versions.iter().find(|v| v.id == id))
        .or_else(|| versions.first())
}

/// Compute the newer-version flag for one record.
///
/// Returns `None` when the record has no snapshot, no comparable dates, or
/// simply no newer sibling.
pub fn detect_for_record(record: &ModelRecord) -> Option<NewerVersionInfo> {
    let snapshot = record.scraped_versions.as_ref()?;
    if snapshot.versions.is_empty() {
        return None;
    }

    let current = current_version(record, &snapshot.versions)?;
    let current_date = current
        .published_at
        .as_deref()
        .and_then(parse_published_at)?;

    let mut newer: Vec<(DateTime<FixedOffset>, NewerVersion)> = snapshot
        .versions
        .iter()
        .filter(|v| v.id != current.id)
        .filter_map(|v| {
            let date = v.published_at.as_deref().and_then(parse_published_at)?;
            (date > current_date).then(|| {
                (
                    date,
                    NewerVersion {
                        version_id: v.id.clone(),
                        version_name: v.name.clone(),
                        published_at: v.published_at.clone().unwrap_or_default(),
                        base_model: v.base_model.clone(),
                    },
                )
            })
        })
        .collect();

    if newer.is_empty() {
        return None;
    }

    // Newest first.
    newer.sort_by(|a, b| b.0.cmp(&a.0));
    let all: Vec<NewerVersion> = newer.into_iter().map(|(_, v)| v).collect();

    Some(NewerVersionInfo {
        newest: all[0].clone(),
        count: all.len(),
        all,
    })
}

/// Recompute the newer-version flag for every record in the store.
///
/// Sets the flag where newer versions exist, clears it where a previous
/// flag is no longer justified, and returns the flagged records by path.
pub fn refresh_store(
    models: &mut BTreeMap<String, ModelRecord>,
) -> BTreeMap<String, NewerVersionInfo> {
    let mut found = BTreeMap::new();

    for (path, record) in models.iter_mut() {
        let detected = detect_for_record(record);
        if let Some(ref info) = detected {
            info!(
                path = path.as_str(),
                newest = info.newest.version_name.as_str(),
                count = info.count,
                "Newer version available"
            );
            found.insert(path.clone(), info.clone());
        }
        record.newer_version_info = detected;
    }

    found
}
