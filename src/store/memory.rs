//! In-memory store implementations.
//!
//! Reference implementations of the store traits, used by the binary for
//! standalone runs and by the test suites. Deployments substitute their own
//! persistent implementations at the trait boundary.

use anyhow::Result;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{ItemStore, RecordStore, RepoStore};
use crate::coordinate::ArtifactCoordinate;
use crate::models::{ArtifactItem, BinaryArtifactRecord, RepoRecord};

#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    records: Vec<BinaryArtifactRecord>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[BinaryArtifactRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl RecordStore for InMemoryRecordStore {
    fn find_by_item_and_version(
        &self,
        item_id: Uuid,
        version: &str,
    ) -> Option<BinaryArtifactRecord> {
        self.records
            .iter()
            .filter(|r| r.collector_item_id == Some(item_id) && r.version() == Some(version))
            .max_by_key(|r| r.observed_at)
            .cloned()
    }

    fn find_latest_with_linkage(&self, item_id: Uuid) -> Option<BinaryArtifactRecord> {
        self.records
            .iter()
            .filter(|r| r.collector_item_id == Some(item_id) && !r.build_linkages.is_empty())
            .max_by_key(|r| r.observed_at)
            .cloned()
    }

    fn find_by_name_and_version(
        &self,
        artifact_name: &str,
        version: &str,
    ) -> Vec<BinaryArtifactRecord> {
        self.records
            .iter()
            .filter(|r| {
                r.coordinate.artifact.as_deref() == Some(artifact_name)
                    && r.version() == Some(version)
            })
            .cloned()
            .collect()
    }

    fn find_by_coordinate(
        &self,
        item_id: Uuid,
        coordinate: &ArtifactCoordinate,
    ) -> Vec<BinaryArtifactRecord> {
        self.records
            .iter()
            .filter(|r| r.collector_item_id == Some(item_id) && &r.coordinate == coordinate)
            .cloned()
            .collect()
    }

    fn find_in_range(
        &self,
        item_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Vec<BinaryArtifactRecord> {
        self.records
            .iter()
            .filter(|r| {
                r.collector_item_id == Some(item_id)
                    && r.observed_at >= start
                    && r.observed_at < end
            })
            .cloned()
            .collect()
    }

    fn save(&mut self, mut record: BinaryArtifactRecord) -> Result<BinaryArtifactRecord> {
        match record.id {
            Some(id) => {
                if let Some(existing) = self.records.iter_mut().find(|r| r.id == Some(id)) {
                    *existing = record.clone();
                } else {
                    self.records.push(record.clone());
                }
            }
            None => {
                record.id = Some(Uuid::new_v4());
                self.records.push(record.clone());
            }
        }
        Ok(record)
    }

    fn delete(&mut self, id: Uuid) -> Result<()> {
        self.records.retain(|r| r.id != Some(id));
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryItemStore {
    items: Vec<ArtifactItem>,
}

impl InMemoryItemStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[ArtifactItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl ItemStore for InMemoryItemStore {
    fn all(&self) -> Vec<ArtifactItem> {
        self.items.clone()
    }

    fn find_enabled(&self) -> Vec<ArtifactItem> {
        self.items.iter().filter(|i| i.enabled).cloned().collect()
    }

    fn find_by_identity(
        &self,
        instance_url: &str,
        repo_name: &str,
        artifact_name: &str,
        path: &str,
    ) -> Vec<ArtifactItem> {
        self.items
            .iter()
            .filter(|i| i.identity() == (instance_url, repo_name, artifact_name, path))
            .cloned()
            .collect()
    }

    fn find_by_artifact_name(&self, artifact_name: &str) -> Vec<ArtifactItem> {
        self.items
            .iter()
            .filter(|i| i.artifact_name == artifact_name)
            .cloned()
            .collect()
    }

    fn save(&mut self, mut item: ArtifactItem) -> Result<ArtifactItem> {
        match item.id {
            Some(id) => {
                if let Some(existing) = self.items.iter_mut().find(|i| i.id == Some(id)) {
                    *existing = item.clone();
                } else {
                    self.items.push(item.clone());
                }
            }
            None => {
                item.id = Some(Uuid::new_v4());
                self.items.push(item.clone());
            }
        }
        Ok(item)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryRepoStore {
    repos: Vec<RepoRecord>,
}

impl InMemoryRepoStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn repos(&self) -> &[RepoRecord] {
        &self.repos
    }
}

impl RepoStore for InMemoryRepoStore {
    fn for_instance(&self, instance_url: &str) -> Vec<RepoRecord> {
        self.repos
            .iter()
            .filter(|r| r.instance_url == instance_url)
            .cloned()
            .collect()
    }

    fn find_enabled(&self, instance_url: &str) -> Vec<RepoRecord> {
        self.repos
            .iter()
            .filter(|r| r.instance_url == instance_url && r.enabled)
            .cloned()
            .collect()
    }

    fn save(&mut self, mut repo: RepoRecord) -> Result<RepoRecord> {
        match repo.id {
            Some(id) => {
                if let Some(existing) = self.repos.iter_mut().find(|r| r.id == Some(id)) {
                    *existing = repo.clone();
                } else {
                    self.repos.push(repo.clone());
                }
            }
            None => {
                repo.id = Some(Uuid::new_v4());
                self.repos.push(repo.clone());
            }
        }
        Ok(repo)
    }
}
