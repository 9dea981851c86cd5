//! Core data models shared across the collector.
//!
//! [`ArtifactItem`] is the tracked identity (one per artifact per repository
//! per server), [`BinaryArtifactRecord`] is one concrete build output of an
//! item keyed by version, and [`BuildLinkage`] ties a record to the CI build
//! that produced or consumed it. [`RawArtifact`] is the wire shape returned
//! by the server's query API.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use log::error;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::SLASH;
use crate::coordinate::ArtifactCoordinate;

/// A tracked artifact identity.
///
/// Two items are equal iff the four identity fields match; that tuple is the
/// deduplication key for "is this artifact already tracked". Items are
/// created on first observation and never deleted by the collector; disabling
/// is the only terminal transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactItem {
    /// Store-assigned identity; `None` until first saved
    pub id: Option<Uuid>,
    pub instance_url: String,
    pub repo_name: String,
    pub artifact_name: String,
    pub path: String,
    pub description: Option<String>,
    pub enabled: bool,
    /// Last-synchronized checkpoint for this item
    pub last_updated: Option<DateTime<Utc>>,
}

impl ArtifactItem {
    pub fn new(instance_url: &str, repo_name: &str, artifact_name: &str, path: &str) -> Self {
        ArtifactItem {
            id: None,
            instance_url: instance_url.to_string(),
            repo_name: repo_name.to_string(),
            artifact_name: artifact_name.to_string(),
            path: path.to_string(),
            description: None,
            enabled: false,
            last_updated: None,
        }
    }

    /// The four identity fields as a tuple.
    pub fn identity(&self) -> (&str, &str, &str, &str) {
        (
            &self.instance_url,
            &self.repo_name,
            &self.artifact_name,
            &self.path,
        )
    }

    /// Canonicalize the identity fields in place.
    ///
    /// Instance URL, artifact name and path lose leading/trailing separators,
    /// the repository name is truncated at its first interior separator, and
    /// a path with no interior separator is prefixed with the repository
    /// name. Items arriving from external callers are normalized before any
    /// store lookup so the identity tuple compares consistently.
    pub fn normalize(&mut self) {
        self.instance_url = trim_separators(&self.instance_url);
        self.artifact_name = trim_separators(&self.artifact_name);
        self.repo_name = truncate_repo_name(&self.repo_name);
        self.path = normalize_item_path(&self.path, &self.repo_name);
    }
}

impl PartialEq for ArtifactItem {
    fn eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}

impl Eq for ArtifactItem {}

impl std::hash::Hash for ArtifactItem {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.identity().hash(state);
    }
}

/// Reference to a build execution attached to a record.
///
/// Once attached, linkage survives metadata-only updates of the record
/// unless explicitly superseded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildLinkage {
    pub build_url: String,
    pub build_number: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub started_by: Option<String>,
}

/// One concrete build output of an [`ArtifactItem`], keyed by version.
///
/// At most one current record exists per (item, version): a later observation
/// of the same version updates the existing record in place rather than
/// creating a sibling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BinaryArtifactRecord {
    /// Store-assigned identity; `None` until first saved
    pub id: Option<Uuid>,
    /// Owning collector item; resolved before the record is persisted
    pub collector_item_id: Option<Uuid>,
    pub canonical_name: String,
    pub repo: String,
    pub path: String,
    pub item_type: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub created_by: Option<String>,
    pub modified_at: Option<DateTime<Utc>>,
    pub modified_by: Option<String>,
    pub md5: Option<String>,
    pub sha1: Option<String>,
    pub virtual_repos: Vec<String>,
    /// Coordinate fields extracted by the active pattern
    pub coordinate: ArtifactCoordinate,
    pub build_url: Option<String>,
    pub build_number: Option<String>,
    pub job_name: Option<String>,
    pub job_url: Option<String>,
    pub build_instance_url: Option<String>,
    pub scm_url: Option<String>,
    pub scm_branch: Option<String>,
    pub scm_revision: Option<String>,
    /// Free-form property metadata not promoted to a dedicated field
    pub metadata: HashMap<String, String>,
    /// Attached CI build references
    pub build_linkages: Vec<BuildLinkage>,
    /// When this observation was made
    pub observed_at: DateTime<Utc>,
}

impl BinaryArtifactRecord {
    /// Build a record from a raw query-API item.
    ///
    /// Well-known provenance properties are promoted to dedicated fields;
    /// everything else lands in the metadata map with dotted keys rewritten
    /// (the record store rejects dots in keys).
    pub fn from_raw(raw: &RawArtifact, observed_at: DateTime<Utc>) -> Self {
        let mut record = BinaryArtifactRecord {
            id: None,
            collector_item_id: None,
            canonical_name: raw.name.clone(),
            repo: raw.repo.clone(),
            path: raw.path.clone(),
            item_type: raw.item_type.clone(),
            created_at: raw.created.as_deref().and_then(parse_timestamp),
            created_by: raw.created_by.clone(),
            modified_at: raw.modified.as_deref().and_then(parse_timestamp),
            modified_by: raw.modified_by.clone(),
            md5: raw.actual_md5.clone(),
            sha1: raw.actual_sha1.clone(),
            virtual_repos: raw.virtual_repos.clone(),
            coordinate: ArtifactCoordinate::default(),
            build_url: None,
            build_number: None,
            job_name: None,
            job_url: None,
            build_instance_url: None,
            scm_url: None,
            scm_branch: None,
            scm_revision: None,
            metadata: HashMap::new(),
            build_linkages: Vec::new(),
            observed_at,
        };

        for property in &raw.properties {
            record.absorb_property(&property.key, &property.value);
        }

        record
    }

    /// Overwrite the pattern-extracted fields from a parsed coordinate.
    pub fn apply_coordinate(&mut self, coordinate: ArtifactCoordinate) {
        self.coordinate = coordinate;
    }

    /// The extracted version string, when the active pattern produced one.
    pub fn version(&self) -> Option<&str> {
        self.coordinate.version.as_deref()
    }

    /// The timestamp this record sorts by: modification time when present,
    /// creation time otherwise.
    pub fn effective_timestamp(&self) -> Option<DateTime<Utc>> {
        self.modified_at.or(self.created_at)
    }

    fn absorb_property(&mut self, key: &str, value: &str) {
        match key {
            "build.url" | "build_url" | "buildUrl" => self.build_url = Some(value.to_string()),
            "build.number" | "build_number" | "buildNumber" => {
                self.build_number = Some(value.to_string())
            }
            "job.url" | "job_url" | "jobUrl" => self.job_url = Some(value.to_string()),
            "job.name" | "job_name" | "jobName" => self.job_name = Some(value.to_string()),
            "instance.url" | "instance_url" | "instanceUrl" => {
                self.build_instance_url = Some(value.to_string())
            }
            "vcs.url" | "vcs_url" | "vcsUrl" => self.scm_url = Some(value.to_string()),
            "vcs.branch" | "vcs_branch" | "vcsBranch" => self.scm_branch = Some(value.to_string()),
            "vcs.revision" | "vcs_revision" | "vcsRevision" => {
                self.scm_revision = Some(value.to_string())
            }
            _ => {
                let key = rewrite_dotted_key(key);
                if !key.is_empty() {
                    self.metadata.insert(key, value.to_string());
                }
            }
        }
    }
}

/// Raw key/value property attached to a raw artifact.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawProperty {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub value: String,
}

/// One item as returned by the server's query API.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawArtifact {
    #[serde(default)]
    pub repo: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub item_type: Option<String>,
    #[serde(default)]
    pub created: Option<String>,
    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(default)]
    pub modified: Option<String>,
    #[serde(default)]
    pub modified_by: Option<String>,
    #[serde(default)]
    pub actual_md5: Option<String>,
    #[serde(default)]
    pub actual_sha1: Option<String>,
    #[serde(default)]
    pub properties: Vec<RawProperty>,
    #[serde(default)]
    pub virtual_repos: Vec<String>,
}

impl RawArtifact {
    /// Directory path joined with the file name; the string the coordinate
    /// patterns run against.
    pub fn full_path(&self) -> String {
        format!("{}/{}", self.path.trim_end_matches(SLASH), self.name)
    }
}

/// A repository discovered on a server, tracked by repo-based collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoRecord {
    /// Store-assigned identity; `None` until first saved
    pub id: Option<Uuid>,
    pub instance_url: String,
    pub repo_name: String,
    pub repo_url: String,
    pub description: Option<String>,
    pub enabled: bool,
    /// Last-synchronized checkpoint for this repository
    pub last_updated: Option<DateTime<Utc>>,
}

impl PartialEq for RepoRecord {
    fn eq(&self, other: &Self) -> bool {
        self.instance_url == other.instance_url && self.repo_name == other.repo_name
    }
}

impl Eq for RepoRecord {}

/// Parse a query-API timestamp, logging and discarding malformed values.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    match DateTime::parse_from_rfc3339(value) {
        Ok(ts) => Some(ts.with_timezone(&Utc)),
        Err(e) => {
            error!("Parsing artifact timestamp '{}': {}", value, e);
            None
        }
    }
}

/// Strip leading and trailing path separators.
pub fn trim_separators(value: &str) -> String {
    value.trim_matches(SLASH).to_string()
}

/// Reduce a repository name to its first path segment.
fn truncate_repo_name(name: &str) -> String {
    let name = trim_separators(name);
    match name.find(SLASH) {
        Some(idx) if idx > 0 => name[..idx].to_string(),
        _ => name,
    }
}

/// Ensure an item path carries its repository prefix.
fn normalize_item_path(path: &str, repo_name: &str) -> String {
    let path = trim_separators(path);
    if path.find(SLASH).map_or(false, |idx| idx > 0) {
        return path;
    }
    format!("{}{}{}", repo_name, SLASH, path)
}

/// Rewrite a dotted key by dropping each dot and upper-casing the letter
/// that follows it.
fn rewrite_dotted_key(key: &str) -> String {
    if !key.contains('.') {
        return key.to_string();
    }
    let mut rewritten = String::with_capacity(key.len());
    let mut upper_next = false;
    for c in key.chars() {
        if c == '.' {
            upper_next = true;
            continue;
        }
        if upper_next {
            rewritten.extend(c.to_uppercase());
            upper_next = false;
        } else {
            rewritten.push(c);
        }
    }
    rewritten
}
