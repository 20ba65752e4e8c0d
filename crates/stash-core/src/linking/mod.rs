//! Version Linking & Reconciliation Engine.
//!
//! Reconciles one scraped model family against the whole record store:
//! which locally known files are versions of the same family, and how sure
//! are we? Evidence is tried strongest-first per remote version:
//!
//! 1. **Hash** — identical file hash (full SHA256 or the registry short
//!    form). Proof of identical content; confirmed.
//! 2. **Registry ids** — the candidate carries the same family and version
//!    identifiers the registry reported. Confirmed.
//! 3. **File size** — within tolerance, only when the version shipped no
//!    hashes at all, and only against records with no family evidence of
//!    their own. Assumed, with the size delta recorded for audit.
//!
//! Everything here is synchronous and purely in-memory: the engine is
//! handed a store document, mutates records' link fields, and returns a
//! report. Persistence, scheduling, and rate limiting belong to callers
//! (see [`ModelCatalog`]).
//!
//! [`ModelCatalog`]: crate::store::ModelCatalog

pub mod family;
pub mod graph;
pub mod matchers;
pub mod newer;

pub use family::{family_id_from_url, resolve_family_id};
pub use graph::LinkGraph;
pub use matchers::{find_hash_match, find_id_match, find_size_match, SizeMatch};
pub use newer::detect_for_record;

use crate::config::LinkingConfig;
use crate::error::Result;
use crate::store::StoreDocument;
use crate::types::{
    LinkInfo, LinkMatch, LinkMethod, LinkReport, ScrapeData, ScrapedVersion,
};
use tracing::{debug, info, warn};

/// Run one linking pass: reconcile `origin_path` against `scrape`.
///
/// Mutates only `relatedVersions` and `linkMetadata` on the affected
/// records. Errors only when the origin record itself is missing; a
/// candidate vanishing mid-pass drops that pairing and the pass continues.
///
/// A scrape describing a single version is skipped outright — with nothing
/// to cross-reference, any link (and any conflict cleanup) would rest on
/// evidence this engine refuses to act on alone.
pub fn run_linking_pass(
    store: &mut StoreDocument,
    origin_path: &str,
    scrape: &ScrapeData,
    config: &LinkingConfig,
) -> Result<LinkReport> {
    config.validate()?;
    store.require(origin_path)?;

    let total_versions = scrape.versions.len();
    if total_versions == 0 {
        debug!(origin = origin_path, "Scrape listed no versions");
        return Ok(LinkReport::empty(0));
    }
    if total_versions == 1 {
        // A lone version gives no corroborating siblings; linking against
        // it is how unrelated models with similar sizes get glued together.
        info!(origin = origin_path, "Single-version scrape, skipping");
        return Ok(LinkReport::empty(1));
    }

    info!(
        origin = origin_path,
        family = scrape.family_id.as_str(),
        versions = total_versions,
        "Linking pass started"
    );

    // The scrape just proved the origin's family; prune every stored link
    // that contradicts it before adding new ones.
    if !scrape.family_id.is_empty() {
        let removed =
            LinkGraph::new(&mut store.models).remove_conflicting_edges(origin_path, &scrape.family_id);
        if !removed.is_empty() {
            info!(
                origin = origin_path,
                removed = removed.len(),
                "Conflict cleanup removed links"
            );
        }
    }

    let mut confirmed: Vec<LinkMatch> = Vec::new();
    let mut assumed: Vec<LinkMatch> = Vec::new();

    for version in &scrape.versions {
        // The origin's own version is not a sibling.
        if scrape.current_version_id.as_deref() == Some(version.id.as_str()) {
            continue;
        }

        debug!(
            origin = origin_path,
            version_id = version.id.as_str(),
            version_name = version.name.as_str(),
            "Searching for local copy of remote version"
        );

        if let Some(m) = match_version(store, origin_path, scrape, version, config) {
            match m.method {
                LinkMethod::FileSize => assumed.push(m),
                _ => confirmed.push(m),
            }
        } else {
            debug!(
                origin = origin_path,
                version_id = version.id.as_str(),
                "No local match"
            );
        }
    }

    apply_links(store, origin_path, &mut confirmed, &mut assumed);

    let report = LinkReport {
        stats: crate::types::LinkStats {
            total_versions,
            confirmed_count: confirmed.len(),
            assumed_count: assumed.len(),
        },
        confirmed,
        assumed,
    };

    info!(
        origin = origin_path,
        confirmed = report.stats.confirmed_count,
        assumed = report.stats.assumed_count,
        "Linking pass finished"
    );
    Ok(report)
}

/// Match one remote version against the store, strongest evidence first.
fn match_version(
    store: &StoreDocument,
    origin_path: &str,
    scrape: &ScrapeData,
    version: &ScrapedVersion,
    config: &LinkingConfig,
) -> Option<LinkMatch> {
    let target_hashes: Vec<String> = version
        .files
        .iter()
        .filter_map(|f| f.hash.as_deref())
        .filter_map(matchers::normalize_hash)
        .collect();
    let target_sizes: Vec<u64> = version
        .files
        .iter()
        .map(|f| f.size_bytes)
        .filter(|&s| s > 0)
        .collect();

    // Tier 1: hash.
    if let Some(path) = matchers::find_hash_match(&store.models, origin_path, &target_hashes) {
        return Some(link_match(
            store,
            path,
            LinkMethod::HashMatch,
            version,
            None,
        ));
    }

    // Tier 2: registry family + version ids.
    if let Some(path) =
        matchers::find_id_match(&store.models, origin_path, &scrape.family_id, &version.id)
    {
        return Some(link_match(store, path, LinkMethod::CivitaiId, version, None));
    }

    // Tier 3: file size, only when this version shipped no usable hash.
    if target_hashes.is_empty() && !target_sizes.is_empty() {
        if let Some(size_match) = matchers::find_size_match(
            &store.models,
            origin_path,
            &scrape.family_id,
            &target_sizes,
            config.size_tolerance,
        ) {
            return Some(link_match(
                store,
                size_match.path,
                LinkMethod::FileSize,
                version,
                Some(size_match.diff_percent),
            ));
        }
    }

    None
}

fn link_match(
    store: &StoreDocument,
    path: String,
    method: LinkMethod,
    version: &ScrapedVersion,
    size_diff_percent: Option<f64>,
) -> LinkMatch {
    let name = store.models.get(&path).and_then(|r| r.name.clone());
    LinkMatch {
        path,
        name,
        method,
        version_id: version.id.clone(),
        version_name: version.name.clone(),
        size_diff_percent,
    }
}

/// Apply the collected matches as bidirectional edges.
///
/// A pairing whose record vanished is dropped from the report; the rest
/// of the pass still applies. Re-applying the same matches overwrites
/// identical metadata, so retries are idempotent.
fn apply_links(
    store: &mut StoreDocument,
    origin_path: &str,
    confirmed: &mut Vec<LinkMatch>,
    assumed: &mut Vec<LinkMatch>,
) {
    let mut graph = LinkGraph::new(&mut store.models);

    let mut apply = |matches: &mut Vec<LinkMatch>| {
        matches.retain(|m| {
            let meta = match m.method {
                LinkMethod::FileSize => LinkInfo::assumed(
                    m.version_id.clone(),
                    m.version_name.clone(),
                    m.size_diff_percent.unwrap_or_default(),
                ),
                method => {
                    LinkInfo::confirmed(method, m.version_id.clone(), m.version_name.clone())
                }
            };
            let reciprocal = meta.reciprocal();
            match graph.add_edge(origin_path, &m.path, meta, reciprocal) {
                Ok(()) => true,
                Err(e) => {
                    warn!(
                        origin = origin_path,
                        path = m.path.as_str(),
                        error = %e,
                        "Dropping link whose record vanished"
                    );
                    false
                }
            }
        });
    };

    apply(confirmed);
    apply(assumed);
}
