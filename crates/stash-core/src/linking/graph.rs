//! Undirected link graph over the record store.
//!
//! Version links live denormalized on the records themselves: each side
//! holds the other's path in `relatedVersions` and a metadata entry in
//! `linkMetadata`. This type is the only code allowed to touch those two
//! fields, and every operation updates both sides together, so the
//! symmetry and `relatedVersions == linkMetadata.keys()` invariants cannot
//! drift apart across call sites.

use crate::error::{Result, StashError};
use crate::linking::family::resolve_family_id;
use crate::types::{LinkInfo, LinkMethod, LinkType, ModelRecord};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// A mutable view of the store's records as an undirected graph.
#[derive(Debug)]
pub struct LinkGraph<'a> {
    records: &'a mut BTreeMap<String, ModelRecord>,
}

impl<'a> LinkGraph<'a> {
    /// Wrap the store's record map.
    pub fn new(records: &'a mut BTreeMap<String, ModelRecord>) -> Self {
        Self { records }
    }

    /// Add (or overwrite) the edge between `a` and `b`.
    ///
    /// `meta_a` is stored on `a` (describing `b`), `meta_b` on `b`
    /// (describing `a`). Re-adding an existing edge overwrites its metadata
    /// and is otherwise a no-op, which is what makes pass retries
    /// idempotent.
    ///
    /// Self-edges are rejected, and both records must exist; a missing side
    /// yields `RecordNotFound` without having mutated the other side.
    pub fn add_edge(&mut self, a: &str, b: &str, meta_a: LinkInfo, meta_b: LinkInfo) -> Result<()> {
        if a == b {
            return Err(StashError::Validation {
                field: "edge".into(),
                message: format!("record cannot link to itself: {a}"),
            });
        }
        if !self.records.contains_key(b) {
            return Err(StashError::record_not_found(b));
        }

        let record_a = self
            .records
            .get_mut(a)
            .ok_or_else(|| StashError::record_not_found(a))?;
        record_a.related_versions.insert(b.to_string());
        record_a.link_metadata.insert(b.to_string(), meta_a);

        let record_b = self
            .records
            .get_mut(b)
            .ok_or_else(|| StashError::record_not_found(b))?;
        record_b.related_versions.insert(a.to_string());
        record_b.link_metadata.insert(a.to_string(), meta_b);

        debug!(a, b, "Linked");
        Ok(())
    }

    /// Remove the edge between `a` and `b` from whichever sides exist.
    ///
    /// Tolerant by design: either record may already be gone, and the edge
    /// may be half-present after external edits. Returns true if anything
    /// was removed.
    pub fn remove_edge(&mut self, a: &str, b: &str) -> bool {
        let mut removed = false;
        if let Some(record) = self.records.get_mut(a) {
            removed |= record.related_versions.remove(b);
            removed |= record.link_metadata.remove(b).is_some();
        }
        if let Some(record) = self.records.get_mut(b) {
            removed |= record.related_versions.remove(a);
            removed |= record.link_metadata.remove(a).is_some();
        }
        removed
    }

    /// Upgrade an existing assumed edge to a confirmed registry-id link.
    ///
    /// Called when a record that was size-matched later gains registry
    /// data proving the relationship. Rewrites metadata on both sides;
    /// a no-op returning false when the edge does not exist.
    pub fn upgrade_edge(&mut self, a: &str, b: &str, version_id: &str) -> bool {
        let present = self
            .records
            .get(a)
            .is_some_and(|r| r.link_metadata.contains_key(b))
            && self
                .records
                .get(b)
                .is_some_and(|r| r.link_metadata.contains_key(a));
        if !present {
            return false;
        }

        let confirmed = LinkInfo {
            link_type: LinkType::Confirmed,
            method: LinkMethod::CivitaiId,
            version_id: Some(version_id.to_string()),
            version_name: None,
            size_diff_percent: None,
        };

        if let Some(record) = self.records.get_mut(a) {
            record.link_metadata.insert(b.to_string(), confirmed.clone());
        }
        if let Some(record) = self.records.get_mut(b) {
            record.link_metadata.insert(a.to_string(), confirmed.reciprocal());
        }

        info!(a, b, version_id, "Upgraded assumed link to confirmed");
        true
    }

    /// Remove every edge of `origin` that contradicts its now-confirmed
    /// family id, plus any edge whose far record has vanished from the
    /// store. Returns the removed paths.
    ///
    /// Links made before a record had registry data can cross family
    /// boundaries; once a scrape proves the family, those edges are
    /// provably wrong and are pruned before new links are applied.
    pub fn remove_conflicting_edges(
        &mut self,
        origin: &str,
        confirmed_family_id: &str,
    ) -> Vec<String> {
        let Some(record) = self.records.get(origin) else {
            return Vec::new();
        };

        let mut to_remove = Vec::new();
        for related_path in &record.related_versions {
            match self.records.get(related_path) {
                None => {
                    // Dangling reference: the record was deleted.
                    to_remove.push(related_path.clone());
                }
                Some(related) => {
                    if let Some(related_family) = resolve_family_id(related) {
                        if related_family != confirmed_family_id {
                            to_remove.push(related_path.clone());
                        }
                    }
                }
            }
        }

        for related_path in &to_remove {
            self.remove_edge(origin, related_path);
            info!(
                origin,
                related = related_path.as_str(),
                family = confirmed_family_id,
                "Removed conflicting link"
            );
        }
        to_remove
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(paths: &[&str]) -> BTreeMap<String, ModelRecord> {
        paths
            .iter()
            .map(|p| (p.to_string(), ModelRecord::default()))
            .collect()
    }

    fn confirmed() -> LinkInfo {
        LinkInfo::confirmed(LinkMethod::HashMatch, "100", "v1.0")
    }

    #[test]
    fn test_add_edge_updates_both_sides() {
        let mut records = store_with(&["a", "b"]);
        let mut graph = LinkGraph::new(&mut records);

        graph
            .add_edge("a", "b", confirmed(), confirmed().reciprocal())
            .unwrap();

        assert!(records["a"].related_versions.contains("b"));
        assert!(records["b"].related_versions.contains("a"));
        assert!(records["a"].link_metadata.contains_key("b"));
        assert!(records["b"].link_metadata.contains_key("a"));
    }

    #[test]
    fn test_add_edge_is_idempotent() {
        let mut records = store_with(&["a", "b"]);
        let mut graph = LinkGraph::new(&mut records);

        graph
            .add_edge("a", "b", confirmed(), confirmed().reciprocal())
            .unwrap();
        let snapshot = records.clone();

        let mut graph = LinkGraph::new(&mut records);
        graph
            .add_edge("a", "b", confirmed(), confirmed().reciprocal())
            .unwrap();
        assert_eq!(records, snapshot);
    }

    #[test]
    fn test_add_edge_rejects_self_link() {
        let mut records = store_with(&["a"]);
        let mut graph = LinkGraph::new(&mut records);

        let err = graph
            .add_edge("a", "a", confirmed(), confirmed())
            .unwrap_err();
        assert!(matches!(err, StashError::Validation { .. }));
        assert!(records["a"].related_versions.is_empty());
    }

    #[test]
    fn test_add_edge_missing_record_mutates_nothing() {
        let mut records = store_with(&["a"]);
        let mut graph = LinkGraph::new(&mut records);

        let err = graph
            .add_edge("a", "gone", confirmed(), confirmed())
            .unwrap_err();
        assert!(matches!(err, StashError::RecordNotFound { .. }));
        assert!(records["a"].related_versions.is_empty());
        assert!(records["a"].link_metadata.is_empty());
    }

    #[test]
    fn test_remove_edge_handles_missing_far_side() {
        let mut records = store_with(&["a", "b"]);
        {
            let mut graph = LinkGraph::new(&mut records);
            graph
                .add_edge("a", "b", confirmed(), confirmed().reciprocal())
                .unwrap();
        }
        records.remove("b");

        let mut graph = LinkGraph::new(&mut records);
        assert!(graph.remove_edge("a", "b"));
        assert!(records["a"].related_versions.is_empty());
        assert!(records["a"].link_metadata.is_empty());
    }

    #[test]
    fn test_conflict_cleanup_removes_foreign_family_symmetrically() {
        let mut records = store_with(&["a", "foreign", "neutral"]);
        records.get_mut("foreign").unwrap().family_id = Some("777".into());

        {
            let mut graph = LinkGraph::new(&mut records);
            graph
                .add_edge("a", "foreign", confirmed(), confirmed().reciprocal())
                .unwrap();
            graph
                .add_edge("a", "neutral", confirmed(), confirmed().reciprocal())
                .unwrap();
        }

        let mut graph = LinkGraph::new(&mut records);
        let removed = graph.remove_conflicting_edges("a", "453428");
        assert_eq!(removed, vec!["foreign".to_string()]);

        // Both sides of the conflicting edge are gone.
        assert!(!records["a"].related_versions.contains("foreign"));
        assert!(!records["foreign"].related_versions.contains("a"));
        assert!(!records["foreign"].link_metadata.contains_key("a"));

        // The family-neutral link survives.
        assert!(records["a"].related_versions.contains("neutral"));
    }

    #[test]
    fn test_conflict_cleanup_uses_url_resolved_family() {
        let mut records = store_with(&["a", "b"]);
        records.get_mut("b").unwrap().registry_url =
            Some("https://civitai.com/models/777".into());
        {
            let mut graph = LinkGraph::new(&mut records);
            graph
                .add_edge("a", "b", confirmed(), confirmed().reciprocal())
                .unwrap();
        }

        let mut graph = LinkGraph::new(&mut records);
        let removed = graph.remove_conflicting_edges("a", "453428");
        assert_eq!(removed, vec!["b".to_string()]);
    }

    #[test]
    fn test_conflict_cleanup_prunes_dangling_references() {
        let mut records = store_with(&["a", "b"]);
        {
            let mut graph = LinkGraph::new(&mut records);
            graph
                .add_edge("a", "b", confirmed(), confirmed().reciprocal())
                .unwrap();
        }
        records.remove("b");

        let mut graph = LinkGraph::new(&mut records);
        let removed = graph.remove_conflicting_edges("a", "453428");
        assert_eq!(removed, vec!["b".to_string()]);
        assert!(records["a"].related_versions.is_empty());
    }

    #[test]
    fn test_conflict_cleanup_keeps_same_family_links() {
        let mut records = store_with(&["a", "b"]);
        records.get_mut("b").unwrap().family_id = Some("453428".into());
        {
            let mut graph = LinkGraph::new(&mut records);
            graph
                .add_edge("a", "b", confirmed(), confirmed().reciprocal())
                .unwrap();
        }

        let mut graph = LinkGraph::new(&mut records);
        assert!(graph.remove_conflicting_edges("a", "453428").is_empty());
        assert!(records["a"].related_versions.contains("b"));
    }

    #[test]
    fn test_upgrade_edge_confirms_both_sides() {
        let mut records = store_with(&["a", "b"]);
        {
            let mut graph = LinkGraph::new(&mut records);
            let assumed = LinkInfo::assumed("100", "v1.0", 0.5);
            let far = assumed.reciprocal();
            graph.add_edge("a", "b", assumed, far).unwrap();
        }

        let mut graph = LinkGraph::new(&mut records);
        assert!(graph.upgrade_edge("a", "b", "100"));

        for (near, far) in [("a", "b"), ("b", "a")] {
            let meta = &records[near].link_metadata[far];
            assert_eq!(meta.link_type, LinkType::Confirmed);
            assert_eq!(meta.method, LinkMethod::CivitaiId);
        }
    }

    #[test]
    fn test_upgrade_edge_absent_is_noop() {
        let mut records = store_with(&["a", "b"]);
        let mut graph = LinkGraph::new(&mut records);
        assert!(!graph.upgrade_edge("a", "b", "100"));
        assert!(records["a"].link_metadata.is_empty());
    }
}
