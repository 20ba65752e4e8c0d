//! Catalog types and data structures.
//!
//! JSON field names are camelCase to stay compatible with the store
//! documents written by the scanner and the web frontend.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Confidence class of a version link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkType {
    /// Established via exact cryptographic or registry-authoritative
    /// identifier evidence.
    Confirmed,
    /// Inferred only from approximate evidence (file size proximity).
    Assumed,
}

impl LinkType {
    /// Return the canonical lowercase string for this link type.
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkType::Confirmed => "confirmed",
            LinkType::Assumed => "assumed",
        }
    }
}

/// How a version link was established.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkMethod {
    /// Identical file hash (full or registry short form).
    HashMatch,
    /// Matching registry family + version identifiers.
    CivitaiId,
    /// File size within tolerance, no hash data available.
    FileSize,
}

impl LinkMethod {
    /// Return the canonical snake_case string for this method.
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkMethod::HashMatch => "hash_match",
            LinkMethod::CivitaiId => "civitai_id",
            LinkMethod::FileSize => "file_size",
        }
    }
}

/// Per-edge metadata stored on each side of a version link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkInfo {
    #[serde(rename = "type")]
    pub link_type: LinkType,
    pub method: LinkMethod,
    /// Remote version id the linked record was matched to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_id: Option<String>,
    /// Remote version display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_name: Option<String>,
    /// Size delta in percent, present on assumed links for auditability.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_diff_percent: Option<f64>,
}

impl LinkInfo {
    /// Metadata for a confirmed link.
    pub fn confirmed(
        method: LinkMethod,
        version_id: impl Into<String>,
        version_name: impl Into<String>,
    ) -> Self {
        Self {
            link_type: LinkType::Confirmed,
            method,
            version_id: Some(version_id.into()),
            version_name: Some(version_name.into()),
            size_diff_percent: None,
        }
    }

    /// Metadata for an assumed (size-based) link.
    pub fn assumed(
        version_id: impl Into<String>,
        version_name: impl Into<String>,
        size_diff_percent: f64,
    ) -> Self {
        Self {
            link_type: LinkType::Assumed,
            method: LinkMethod::FileSize,
            version_id: Some(version_id.into()),
            version_name: Some(version_name.into()),
            size_diff_percent: Some(size_diff_percent),
        }
    }

    /// Metadata for the far side of an edge. Same type and method; the
    /// version fields describe the near side's remote version, so they are
    /// dropped, while the size delta is kept on both sides.
    pub fn reciprocal(&self) -> Self {
        Self {
            link_type: self.link_type,
            method: self.method,
            version_id: None,
            version_name: None,
            size_diff_percent: self.size_diff_percent,
        }
    }
}

/// Secondary hashes for precision variants of the same model file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantHashes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub high_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub low_hash: Option<String>,
}

/// One locally known model file.
///
/// Records are keyed by their `path` in [`StoreDocument::models`]; the path
/// does not repeat inside the record. The linking engine mutates only
/// `related_versions`, `link_metadata`, and `newer_version_info` — every
/// other field belongs to the scanner or the user.
///
/// [`StoreDocument::models`]: crate::store::StoreDocument
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelRecord {
    /// Display name, if the scanner or user set one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// SHA256 of the file: 64 hex chars, or the registry's 10-char short
    /// form when that is all we have.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_hash: Option<String>,
    /// File size in bytes. 0 means unknown.
    #[serde(default)]
    pub file_size: u64,
    /// Registry family identifier, once known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family_id: Option<String>,
    /// Registry version identifier, once known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_id: Option<String>,
    /// Registry page URL; the family id can be parsed out of it when the
    /// structured field above is absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry_url: Option<String>,
    /// Hashes of precision variants, if the scanner produced any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variants: Option<VariantHashes>,
    /// Paths of records linked as versions of the same family.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub related_versions: BTreeSet<String>,
    /// Per-edge metadata; its key set always mirrors `related_versions`.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub link_metadata: BTreeMap<String, LinkInfo>,
    /// Last scrape snapshot for this record's family.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scraped_versions: Option<ScrapeData>,
    /// Derived flag set by the newer-version detector.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub newer_version_info: Option<NewerVersionInfo>,
}

impl ModelRecord {
    /// All hashes known for this record, primary first.
    pub fn hash_candidates(&self) -> impl Iterator<Item = &str> {
        self.file_hash
            .as_deref()
            .into_iter()
            .chain(
                self.variants
                    .iter()
                    .flat_map(|v| [v.high_hash.as_deref(), v.low_hash.as_deref()])
                    .flatten(),
            )
            .filter(|h| !h.is_empty())
    }

    /// Display name with a fallback to the record's path.
    pub fn display_name<'a>(&'a self, path: &'a str) -> &'a str {
        self.name.as_deref().unwrap_or(path)
    }
}

/// One scrape event: everything the registry said about one model family.
///
/// Also stored verbatim on the scraped record as `scrapedVersions`, where
/// the newer-version detector reads it back.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeData {
    /// Registry family identifier the scrape was resolved against.
    pub family_id: String,
    /// The scraped record's own version id, when the page revealed it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_version_id: Option<String>,
    /// Every released version the registry lists for this family.
    #[serde(default)]
    pub versions: Vec<ScrapedVersion>,
}

/// One released version as described by the registry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapedVersion {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// ISO-8601 publish timestamp; the registry usually emits a `Z` suffix.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_model: Option<String>,
    #[serde(default)]
    pub files: Vec<VersionFile>,
}

/// One downloadable file attached to a scraped version.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionFile {
    #[serde(default)]
    pub name: String,
    /// File size in bytes. 0 means the registry did not report one.
    #[serde(default)]
    pub size_bytes: u64,
    /// Full SHA256 or the registry's 10-char short form.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
}

/// A version newer than the one a record currently holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewerVersion {
    pub version_id: String,
    pub version_name: String,
    pub published_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_model: Option<String>,
}

/// Derived newer-version flag stored on a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewerVersionInfo {
    /// The most recently published newer version.
    pub newest: NewerVersion,
    /// All newer versions, newest first.
    pub all: Vec<NewerVersion>,
    pub count: usize,
}

/// One link produced by a pass, as reported back to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkMatch {
    /// Path of the matched local record.
    pub path: String,
    /// Display name of the matched record, when it has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub method: LinkMethod,
    /// Remote version the record was matched to.
    pub version_id: String,
    pub version_name: String,
    /// Present on assumed matches only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_diff_percent: Option<f64>,
}

/// Pass counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkStats {
    pub total_versions: usize,
    pub confirmed_count: usize,
    pub assumed_count: usize,
}

/// Result of one linking pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkReport {
    pub confirmed: Vec<LinkMatch>,
    pub assumed: Vec<LinkMatch>,
    pub stats: LinkStats,
}

impl LinkReport {
    /// An empty report for a pass that produced no links.
    pub fn empty(total_versions: usize) -> Self {
        Self {
            stats: LinkStats {
                total_versions,
                ..Default::default()
            },
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_info_json_shape() {
        let info = LinkInfo::confirmed(LinkMethod::HashMatch, "2176505", "v2.0");
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["type"], "confirmed");
        assert_eq!(json["method"], "hash_match");
        assert_eq!(json["versionId"], "2176505");
        assert_eq!(json["versionName"], "v2.0");
        assert!(json.get("sizeDiffPercent").is_none());
    }

    #[test]
    fn test_assumed_reciprocal_keeps_size_delta() {
        let info = LinkInfo::assumed("101", "v1.1", 0.42);
        let far = info.reciprocal();
        assert_eq!(far.link_type, LinkType::Assumed);
        assert_eq!(far.method, LinkMethod::FileSize);
        assert_eq!(far.size_diff_percent, Some(0.42));
        assert!(far.version_id.is_none());
    }

    #[test]
    fn test_record_hash_candidates_include_variants() {
        let record = ModelRecord {
            file_hash: Some("AAAA".into()),
            variants: Some(VariantHashes {
                high_hash: Some("BBBB".into()),
                low_hash: None,
            }),
            ..Default::default()
        };
        let hashes: Vec<&str> = record.hash_candidates().collect();
        assert_eq!(hashes, vec!["AAAA", "BBBB"]);
    }

    #[test]
    fn test_record_roundtrip_with_defaults() {
        // Documents written before linking ran have none of the link fields.
        let raw = r#"{"name": "Aduare Style", "fileSize": 151552000}"#;
        let record: ModelRecord = serde_json::from_str(raw).unwrap();
        assert_eq!(record.name.as_deref(), Some("Aduare Style"));
        assert_eq!(record.file_size, 151_552_000);
        assert!(record.related_versions.is_empty());
        assert!(record.link_metadata.is_empty());

        let json = serde_json::to_value(&record).unwrap();
        assert!(json.get("relatedVersions").is_none());
    }

    #[test]
    fn test_scrape_data_field_names() {
        let raw = r#"{
            "familyId": "453428",
            "currentVersionId": "2311163",
            "versions": [
                {"id": "2311163", "name": "v1.0", "baseModel": "SDXL 1.0",
                 "files": [{"name": "m.safetensors", "sizeBytes": 1024, "hash": "ABCDEF1234"}]}
            ]
        }"#;
        let scrape: ScrapeData = serde_json::from_str(raw).unwrap();
        assert_eq!(scrape.family_id, "453428");
        assert_eq!(scrape.versions.len(), 1);
        assert_eq!(scrape.versions[0].files[0].size_bytes, 1024);
    }
}
