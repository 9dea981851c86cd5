//! Record store trait boundary and in-memory implementation.
//!
//! The persistent store is an external collaborator; the engine only assumes
//! per-record atomicity and these single-record / small-batch operations. No
//! multi-record transactions exist; reconciliation is written to be
//! idempotently resumable instead.

mod memory;

pub use memory::{InMemoryItemStore, InMemoryRecordStore, InMemoryRepoStore};

use anyhow::Result;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::coordinate::ArtifactCoordinate;
use crate::models::{ArtifactItem, BinaryArtifactRecord, RepoRecord};

/// Storage boundary for binary artifact records.
pub trait RecordStore {
    /// Latest record for a (collector item, version) pair, by observation
    /// timestamp descending.
    fn find_by_item_and_version(
        &self,
        item_id: Uuid,
        version: &str,
    ) -> Option<BinaryArtifactRecord>;

    /// Latest record of the item that carries non-empty build linkage.
    fn find_latest_with_linkage(&self, item_id: Uuid) -> Option<BinaryArtifactRecord>;

    /// Records matching an (artifact name, version) pair across all items.
    fn find_by_name_and_version(
        &self,
        artifact_name: &str,
        version: &str,
    ) -> Vec<BinaryArtifactRecord>;

    /// Records of an item matching the full extracted coordinate.
    fn find_by_coordinate(
        &self,
        item_id: Uuid,
        coordinate: &ArtifactCoordinate,
    ) -> Vec<BinaryArtifactRecord>;

    /// Records of an item observed in `[start, end)`.
    fn find_in_range(
        &self,
        item_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Vec<BinaryArtifactRecord>;

    /// Insert or replace a record; assigns an id on first save. Single-record
    /// atomicity is all that is assumed of the backing store.
    fn save(&mut self, record: BinaryArtifactRecord) -> Result<BinaryArtifactRecord>;

    fn delete(&mut self, id: Uuid) -> Result<()>;
}

/// Storage boundary for tracked artifact items.
pub trait ItemStore {
    fn all(&self) -> Vec<ArtifactItem>;

    fn find_enabled(&self) -> Vec<ArtifactItem>;

    /// Items matching the full identity tuple.
    fn find_by_identity(
        &self,
        instance_url: &str,
        repo_name: &str,
        artifact_name: &str,
        path: &str,
    ) -> Vec<ArtifactItem>;

    fn find_by_artifact_name(&self, artifact_name: &str) -> Vec<ArtifactItem>;

    /// Insert or replace an item; assigns an id on first save.
    fn save(&mut self, item: ArtifactItem) -> Result<ArtifactItem>;
}

/// Storage boundary for discovered repositories.
pub trait RepoStore {
    fn for_instance(&self, instance_url: &str) -> Vec<RepoRecord>;

    fn find_enabled(&self, instance_url: &str) -> Vec<RepoRecord>;

    /// Insert or replace a repository; assigns an id on first save.
    fn save(&mut self, repo: RepoRecord) -> Result<RepoRecord>;
}
