//! Family identifier resolution.
//!
//! A record may carry its registry family id in the structured `familyId`
//! field, or only implicitly inside its stored registry URL. Resolution
//! precedence is fixed: structured field first, URL parse second. A record
//! with neither is unresolved, which the matchers treat as "no family
//! evidence" rather than an error.

use crate::types::ModelRecord;
use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

/// Registry model-page URLs embed the family id as `/models/<digits>`.
static FAMILY_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/models/(\d+)").expect("family id regex must compile"));

/// Parse a family id out of a registry URL.
///
/// Works on any URL shape the registry has used:
/// `https://civitai.com/models/1811313`,
/// `https://civitai.com/models/1811313/cool-model?modelVersionId=2176505`.
pub fn family_id_from_url(url: &str) -> Option<String> {
    if url.is_empty() {
        return None;
    }
    match FAMILY_ID_RE.captures(url) {
        Some(caps) => Some(caps[1].to_string()),
        None => {
            debug!(url, "No family id found in registry URL");
            None
        }
    }
}

/// Resolve a record's family id: structured field first, URL parse second.
pub fn resolve_family_id(record: &ModelRecord) -> Option<String> {
    if let Some(id) = record.family_id.as_deref() {
        if !id.is_empty() {
            return Some(id.to_string());
        }
    }
    record
        .registry_url
        .as_deref()
        .and_then(family_id_from_url)
}
