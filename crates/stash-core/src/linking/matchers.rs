//! The three matching tiers: hash, external id, size tolerance.
//!
//! Tiers are tried in order of evidence strength. A hash match is proof of
//! identical file content; a family+version id match is registry-
//! authoritative; a size match is a guess and is labeled as such. All
//! matchers iterate the store in ascending path order (the store is a
//! `BTreeMap`), so results are reproducible, and none of them ever return
//! the origin record itself.

use crate::linking::family::resolve_family_id;
use crate::types::ModelRecord;
use std::collections::BTreeMap;
use tracing::debug;

/// Length of a full SHA256 hex digest.
pub const FULL_HASH_LEN: usize = 64;
/// Length of the registry's abbreviated digest (AutoV2).
///
/// The registry's short form is assumed to be a strict prefix of the full
/// SHA256. That convention is the registry's, not ours, and is not
/// independently verifiable here.
pub const SHORT_HASH_LEN: usize = 10;

/// Normalize a raw hash string for comparison.
///
/// Returns the uppercased hash when it is hex of a recognized length,
/// `None` otherwise. Unrecognized hashes are skipped, never errors.
pub fn normalize_hash(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.len() != FULL_HASH_LEN && trimmed.len() != SHORT_HASH_LEN {
        return None;
    }
    if !trimmed.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    Some(trimmed.to_ascii_uppercase())
}

/// Compare two normalized hashes.
///
/// Equal-length hashes must match exactly. A short-form/full pair matches
/// when the short form is a prefix of the full hash, in either direction.
pub fn hashes_match(a: &str, b: &str) -> bool {
    if a.len() == b.len() {
        return a == b;
    }
    match (a.len(), b.len()) {
        (SHORT_HASH_LEN, FULL_HASH_LEN) => b.starts_with(a),
        (FULL_HASH_LEN, SHORT_HASH_LEN) => a.starts_with(b),
        _ => false,
    }
}

/// Tier 1: find a record whose hash matches any target hash.
///
/// `target_hashes` should already be normalized via [`normalize_hash`].
/// Checks the record's primary hash and any variant hashes. Returns the
/// first matching path in store order.
pub fn find_hash_match(
    models: &BTreeMap<String, ModelRecord>,
    origin_path: &str,
    target_hashes: &[String],
) -> Option<String> {
    if target_hashes.is_empty() {
        return None;
    }

    for (path, record) in models {
        if path == origin_path {
            continue;
        }
        for raw in record.hash_candidates() {
            let Some(candidate) = normalize_hash(raw) else {
                continue;
            };
            if target_hashes.iter().any(|t| hashes_match(&candidate, t)) {
                debug!(path, "Hash match");
                return Some(path.clone());
            }
        }
    }
    None
}

/// Tier 2: find a record whose resolved family id and version id both
/// equal the targets exactly.
pub fn find_id_match(
    models: &BTreeMap<String, ModelRecord>,
    origin_path: &str,
    family_id: &str,
    version_id: &str,
) -> Option<String> {
    if family_id.is_empty() || version_id.is_empty() {
        return None;
    }

    for (path, record) in models {
        if path == origin_path {
            continue;
        }
        if record.version_id.as_deref() != Some(version_id) {
            continue;
        }
        if resolve_family_id(record).as_deref() == Some(family_id) {
            debug!(path, family_id, version_id, "Registry id match");
            return Some(path.clone());
        }
    }
    None
}

/// A size-tolerance match and its audit trail.
#[derive(Debug, Clone, PartialEq)]
pub struct SizeMatch {
    /// Path of the matched record.
    pub path: String,
    /// The record's file size in bytes.
    pub size: u64,
    /// Size delta as a percentage of the remote file size.
    pub diff_percent: f64,
}

/// Tier 3: find the record whose file size sits closest to any target size,
/// within `tolerance` (a fraction; the comparison is boundary-inclusive).
///
/// Family evidence always wins over size proximity:
/// - a candidate resolvably belonging to a *different* family is excluded
///   even on an exact size match;
/// - a candidate resolvably belonging to the *same* family is excluded too,
///   because such a pair is tier-2 territory and matching it here would
///   duplicate or contradict that result.
///
/// Only candidates with neutral family evidence — no resolvable family id —
/// can be matched by size.
pub fn find_size_match(
    models: &BTreeMap<String, ModelRecord>,
    origin_path: &str,
    scrape_family_id: &str,
    target_sizes: &[u64],
    tolerance: f64,
) -> Option<SizeMatch> {
    let mut best: Option<SizeMatch> = None;
    let mut best_diff = f64::INFINITY;

    for (path, record) in models {
        if path == origin_path {
            continue;
        }

        if let Some(candidate_family) = resolve_family_id(record) {
            if candidate_family != scrape_family_id {
                // Provably a different family.
                continue;
            }
            // Same family: tier 2 owns this pair.
            continue;
        }

        if record.file_size == 0 {
            continue;
        }

        for &target_size in target_sizes {
            if target_size == 0 {
                continue;
            }
            let diff = record.file_size.abs_diff(target_size) as f64 / target_size as f64;
            if diff > tolerance || diff >= best_diff {
                continue;
            }
            best_diff = diff;
            best = Some(SizeMatch {
                path: path.clone(),
                size: record.file_size,
                diff_percent: diff * 100.0,
            });
        }
    }

    if let Some(ref m) = best {
        debug!(path = m.path, diff_percent = m.diff_percent, "Size match");
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::VariantHashes;

    fn store_with(entries: Vec<(&str, ModelRecord)>) -> BTreeMap<String, ModelRecord> {
        entries
            .into_iter()
            .map(|(p, r)| (p.to_string(), r))
            .collect()
    }

    fn record_with_hash(hash: &str) -> ModelRecord {
        ModelRecord {
            file_hash: Some(hash.to_string()),
            ..Default::default()
        }
    }

    const FULL: &str = "ABCDEF1234567890AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";

    #[test]
    fn test_normalize_hash_accepts_both_forms() {
        assert_eq!(normalize_hash("abcdef1234"), Some("ABCDEF1234".to_string()));
        assert_eq!(normalize_hash(FULL).as_deref(), Some(FULL));
        assert_eq!(normalize_hash("xyz"), None);
        assert_eq!(normalize_hash("ABCDEF123"), None); // 9 chars
        assert_eq!(normalize_hash("GGGGGGGGGG"), None); // not hex
    }

    #[test]
    fn test_short_form_prefix_matches_full() {
        assert!(hashes_match("ABCDEF1234", FULL));
        assert!(hashes_match(FULL, "ABCDEF1234"));
        assert!(!hashes_match("ABCDEF1235", FULL));
    }

    #[test]
    fn test_equal_length_requires_exact_match() {
        assert!(hashes_match(FULL, FULL));
        assert!(!hashes_match("ABCDEF1234", "ABCDEF1230"));
    }

    #[test]
    fn test_find_hash_match_is_case_insensitive() {
        let models = store_with(vec![("a", record_with_hash(&FULL.to_lowercase()))]);
        let targets = vec![normalize_hash("abcdef1234").unwrap()];
        assert_eq!(
            find_hash_match(&models, "origin", &targets),
            Some("a".to_string())
        );
    }

    #[test]
    fn test_find_hash_match_checks_variant_hashes() {
        let record = ModelRecord {
            variants: Some(VariantHashes {
                high_hash: Some(FULL.to_string()),
                low_hash: None,
            }),
            ..Default::default()
        };
        let models = store_with(vec![("a", record)]);
        let targets = vec![normalize_hash("ABCDEF1234").unwrap()];
        assert_eq!(
            find_hash_match(&models, "origin", &targets),
            Some("a".to_string())
        );
    }

    #[test]
    fn test_find_hash_match_never_returns_origin() {
        let models = store_with(vec![("a", record_with_hash(FULL))]);
        let targets = vec![normalize_hash(FULL).unwrap()];
        assert_eq!(find_hash_match(&models, "a", &targets), None);
    }

    #[test]
    fn test_find_hash_match_takes_first_in_path_order() {
        let models = store_with(vec![
            ("z", record_with_hash(FULL)),
            ("b", record_with_hash(FULL)),
        ]);
        let targets = vec![normalize_hash(FULL).unwrap()];
        assert_eq!(
            find_hash_match(&models, "origin", &targets),
            Some("b".to_string())
        );
    }

    #[test]
    fn test_find_id_match_requires_both_ids() {
        let record = ModelRecord {
            family_id: Some("453428".into()),
            version_id: Some("2311163".into()),
            ..Default::default()
        };
        let models = store_with(vec![("a", record)]);

        assert_eq!(
            find_id_match(&models, "origin", "453428", "2311163"),
            Some("a".to_string())
        );
        assert_eq!(find_id_match(&models, "origin", "453428", "999"), None);
        assert_eq!(find_id_match(&models, "origin", "999", "2311163"), None);
    }

    #[test]
    fn test_find_id_match_resolves_family_from_url() {
        let record = ModelRecord {
            registry_url: Some("https://civitai.com/models/453428".into()),
            version_id: Some("2311163".into()),
            ..Default::default()
        };
        let models = store_with(vec![("a", record)]);
        assert_eq!(
            find_id_match(&models, "origin", "453428", "2311163"),
            Some("a".to_string())
        );
    }

    #[test]
    fn test_size_match_boundary_inclusive() {
        let record = ModelRecord {
            file_size: 104_857_600,
            ..Default::default()
        };
        let models = store_with(vec![("a", record)]);
        let targets = vec![105_906_176u64];

        // diff ~= 0.99%, inside a 1% tolerance...
        let m = find_size_match(&models, "origin", "453428", &targets, 0.01).unwrap();
        assert_eq!(m.path, "a");
        assert!(m.diff_percent > 0.98 && m.diff_percent < 1.0);

        // ...but outside 0.9%.
        assert_eq!(
            find_size_match(&models, "origin", "453428", &targets, 0.009),
            None
        );
    }

    #[test]
    fn test_size_match_excludes_foreign_family_even_on_exact_size() {
        let record = ModelRecord {
            file_size: 1_000_000,
            registry_url: Some("https://civitai.com/models/777".into()),
            ..Default::default()
        };
        let models = store_with(vec![("a", record)]);
        assert_eq!(
            find_size_match(&models, "origin", "453428", &[1_000_000], 0.01),
            None
        );
    }

    #[test]
    fn test_size_match_excludes_same_family() {
        // A same-family candidate belongs to the id tier, not here.
        let record = ModelRecord {
            file_size: 1_000_000,
            family_id: Some("453428".into()),
            ..Default::default()
        };
        let models = store_with(vec![("a", record)]);
        assert_eq!(
            find_size_match(&models, "origin", "453428", &[1_000_000], 0.01),
            None
        );
    }

    #[test]
    fn test_size_match_picks_smallest_diff() {
        let near = ModelRecord {
            file_size: 1_000_100,
            ..Default::default()
        };
        let far = ModelRecord {
            file_size: 1_004_000,
            ..Default::default()
        };
        let models = store_with(vec![("far", far), ("near", near)]);
        let m = find_size_match(&models, "origin", "453428", &[1_000_000], 0.01).unwrap();
        assert_eq!(m.path, "near");
    }

    #[test]
    fn test_size_match_skips_unknown_sizes() {
        let record = ModelRecord {
            file_size: 0,
            ..Default::default()
        };
        let models = store_with(vec![("a", record)]);
        assert_eq!(
            find_size_match(&models, "origin", "453428", &[1_000_000], 0.01),
            None
        );
        // Zero target sizes are ignored too.
        let record = ModelRecord {
            file_size: 500,
            ..Default::default()
        };
        let models = store_with(vec![("a", record)]);
        assert_eq!(find_size_match(&models, "origin", "453428", &[0], 0.01), None);
    }
}
