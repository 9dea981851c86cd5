//! Insert/update/skip reconciliation against the record store.
//!
//! For every observed artifact version the engine decides one of three
//! outcomes: skip (unusable coordinate), update in place (version already
//! tracked, so descriptive fields are overwritten and build linkage carried
//! forward), or insert (new version, inheriting the item's most recent known
//! build linkage). Writes happen immediately per record, so a crash mid-cycle
//! can never leave the store in a state where a retry would create duplicates.

use anyhow::Result;
use log::{debug, info};
use uuid::Uuid;

use crate::models::{ArtifactItem, BinaryArtifactRecord};
use crate::store::RecordStore;

/// Outcome of reconciling one observed record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileDecision {
    Inserted,
    Updated,
    Skipped,
}

/// Reconcile one observed record into the store under the given item.
///
/// - No usable version: skipped (logged, not stored).
/// - Existing record for (item, version): the observation overwrites the
///   descriptive fields in place, and the existing record's build linkage is
///   copied forward verbatim: an update never erases linkage a prior insert
///   or build event established.
/// - New version: the record inherits the item's most recent non-empty build
///   linkage, if any. Linkage follows the producing pipeline rather than a
///   specific version, so the latest known linkage is the best available
///   signal until a build system supersedes it.
pub fn upsert(
    records: &mut dyn RecordStore,
    item_id: Uuid,
    mut record: BinaryArtifactRecord,
) -> Result<ReconcileDecision> {
    let version = match record.version() {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => {
            debug!(
                "No version for artifact {} in repo {}, skipping",
                record.canonical_name, record.repo
            );
            return Ok(ReconcileDecision::Skipped);
        }
    };

    record.collector_item_id = Some(item_id);

    if let Some(existing) = records.find_by_item_and_version(item_id, &version) {
        record.id = existing.id;
        if !existing.build_linkages.is_empty() {
            record.build_linkages = existing.build_linkages;
        }
        records.save(record)?;
        Ok(ReconcileDecision::Updated)
    } else {
        if let Some(latest) = records.find_latest_with_linkage(item_id) {
            record.build_linkages = latest.build_linkages;
        }
        // Saved immediately so a crash before the rest of the batch cannot
        // duplicate this (item, version) on retry
        records.save(record)?;
        Ok(ReconcileDecision::Inserted)
    }
}

/// Carry identity forward from records created before their owning item.
///
/// When items are discovered out of order, a record for this (artifact name,
/// version) may already exist under a different collector item. Its build
/// linkage is inherited and the stale record deleted; the caller then
/// reconciles the record under `item_id` via [`upsert`]. Records already
/// owned by `item_id` are left alone for [`upsert`] to update in place.
pub fn migrate_prior_records(
    records: &mut dyn RecordStore,
    item_id: Uuid,
    record: &mut BinaryArtifactRecord,
) -> Result<()> {
    let (artifact_name, version) = match (record.coordinate.artifact.as_deref(), record.version()) {
        (Some(name), Some(version)) if !name.is_empty() && !version.is_empty() => {
            (name.to_string(), version.to_string())
        }
        _ => return Ok(()),
    };

    let stale = records.find_by_name_and_version(&artifact_name, &version);
    for old in stale {
        if old.collector_item_id == Some(item_id) {
            continue;
        }
        if !old.build_linkages.is_empty() {
            record.build_linkages = old.build_linkages.clone();
        }
        if let Some(id) = old.id {
            info!(
                "Migrating prior record for {} {} from item {:?}",
                artifact_name, version, old.collector_item_id
            );
            records.delete(id)?;
        }
    }
    Ok(())
}

/// One item identity with the records observed for it in a batch.
#[derive(Debug, Clone)]
pub struct ObservedArtifact {
    pub item: ArtifactItem,
    pub records: Vec<BinaryArtifactRecord>,
}

/// Group observed (item, record) pairs by item identity, preserving first-seen
/// order of items and observation order of records.
pub fn group_by_item(
    observations: Vec<(ArtifactItem, BinaryArtifactRecord)>,
) -> Vec<ObservedArtifact> {
    let mut groups: Vec<ObservedArtifact> = Vec::new();
    for (item, record) in observations {
        match groups.iter_mut().find(|g| g.item == item) {
            Some(group) => group.records.push(record),
            None => groups.push(ObservedArtifact {
                item,
                records: vec![record],
            }),
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BuildLinkage, RawArtifact};
    use crate::store::{InMemoryRecordStore, RecordStore};
    use chrono::{Duration, Utc};

    fn record(version: Option<&str>) -> BinaryArtifactRecord {
        let raw = RawArtifact {
            repo: "release".to_string(),
            path: "com/acme/widget/x".to_string(),
            name: "widget.jar".to_string(),
            actual_md5: Some("md5-original".to_string()),
            ..Default::default()
        };
        let mut record = BinaryArtifactRecord::from_raw(&raw, Utc::now());
        record.coordinate.artifact = Some("widget".to_string());
        record.coordinate.version = version.map(|v| v.to_string());
        record
    }

    fn linkage(url: &str) -> BuildLinkage {
        BuildLinkage {
            build_url: url.to_string(),
            build_number: Some("1".to_string()),
            started_at: None,
            started_by: None,
        }
    }

    #[test]
    fn test_upsert_skips_missing_version() {
        let mut store = InMemoryRecordStore::new();
        let decision = upsert(&mut store, Uuid::new_v4(), record(None)).unwrap();
        assert_eq!(decision, ReconcileDecision::Skipped);
        assert!(store.is_empty());

        let decision = upsert(&mut store, Uuid::new_v4(), record(Some(""))).unwrap();
        assert_eq!(decision, ReconcileDecision::Skipped);
        assert!(store.is_empty());
    }

    #[test]
    fn test_upsert_inserts_new_version() {
        let mut store = InMemoryRecordStore::new();
        let item = Uuid::new_v4();

        let decision = upsert(&mut store, item, record(Some("1.2.3"))).unwrap();
        assert_eq!(decision, ReconcileDecision::Inserted);
        assert_eq!(store.len(), 1);

        let stored = store.find_by_item_and_version(item, "1.2.3").unwrap();
        assert_eq!(stored.collector_item_id, Some(item));
        assert!(stored.build_linkages.is_empty());
    }

    #[test]
    fn test_update_preserves_linkage_and_identity() {
        let mut store = InMemoryRecordStore::new();
        let item = Uuid::new_v4();

        let mut first = record(Some("1.2.3"));
        first.build_linkages = vec![linkage("http://ci.local/b1")];
        first.collector_item_id = Some(item);
        let first = store.save(first).unwrap();

        // New observation of the same version: different hash, no linkage
        let mut second = record(Some("1.2.3"));
        second.md5 = Some("md5-new".to_string());
        let decision = upsert(&mut store, item, second).unwrap();
        assert_eq!(decision, ReconcileDecision::Updated);

        // Updated in place, not duplicated
        assert_eq!(store.len(), 1);
        let stored = store.find_by_item_and_version(item, "1.2.3").unwrap();
        assert_eq!(stored.id, first.id);
        assert_eq!(stored.md5.as_deref(), Some("md5-new"));
        assert_eq!(stored.build_linkages, vec![linkage("http://ci.local/b1")]);
    }

    #[test]
    fn test_insert_inherits_latest_linkage() {
        let mut store = InMemoryRecordStore::new();
        let item = Uuid::new_v4();

        let mut old = record(Some("1.0"));
        old.observed_at = Utc::now() - Duration::hours(4);
        old.build_linkages = vec![linkage("http://ci.local/old")];
        old.collector_item_id = Some(item);
        store.save(old).unwrap();

        let mut newer = record(Some("1.1"));
        newer.observed_at = Utc::now() - Duration::hours(2);
        newer.build_linkages = vec![linkage("http://ci.local/newer")];
        newer.collector_item_id = Some(item);
        store.save(newer).unwrap();

        let decision = upsert(&mut store, item, record(Some("2.0"))).unwrap();
        assert_eq!(decision, ReconcileDecision::Inserted);

        let stored = store.find_by_item_and_version(item, "2.0").unwrap();
        // Inherits the most recent linkage, by descending timestamp
        assert_eq!(stored.build_linkages, vec![linkage("http://ci.local/newer")]);
    }

    #[test]
    fn test_upsert_is_idempotent() {
        let mut store = InMemoryRecordStore::new();
        let item = Uuid::new_v4();

        upsert(&mut store, item, record(Some("1.2.3"))).unwrap();
        let decision = upsert(&mut store, item, record(Some("1.2.3"))).unwrap();
        assert_eq!(decision, ReconcileDecision::Updated);
        assert_eq!(store.len(), 1, "re-observation must not duplicate");
    }

    #[test]
    fn test_migrate_prior_records_inherits_and_deletes() {
        let mut store = InMemoryRecordStore::new();
        let stale_item = Uuid::new_v4();
        let new_item = Uuid::new_v4();

        let mut stale = record(Some("1.2.3"));
        stale.collector_item_id = Some(stale_item);
        stale.build_linkages = vec![linkage("http://ci.local/b1")];
        store.save(stale).unwrap();

        let mut fresh = record(Some("1.2.3"));
        migrate_prior_records(&mut store, new_item, &mut fresh).unwrap();

        assert_eq!(fresh.build_linkages, vec![linkage("http://ci.local/b1")]);
        assert!(store.is_empty(), "stale record must be deleted");

        // Reconciled under the newly assigned item, linkage intact
        upsert(&mut store, new_item, fresh).unwrap();
        let stored = store.find_by_item_and_version(new_item, "1.2.3").unwrap();
        assert_eq!(stored.build_linkages, vec![linkage("http://ci.local/b1")]);
    }

    #[test]
    fn test_migrate_leaves_own_records_alone() {
        let mut store = InMemoryRecordStore::new();
        let item = Uuid::new_v4();

        let mut owned = record(Some("1.2.3"));
        owned.collector_item_id = Some(item);
        store.save(owned).unwrap();

        let mut fresh = record(Some("1.2.3"));
        migrate_prior_records(&mut store, item, &mut fresh).unwrap();

        // The record already owned by this item stays for upsert to update
        assert_eq!(store.len(), 1);
        let decision = upsert(&mut store, item, fresh).unwrap();
        assert_eq!(decision, ReconcileDecision::Updated);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_migrate_prior_records_without_identity_is_noop() {
        let mut store = InMemoryRecordStore::new();
        let mut existing = record(Some("1.0"));
        existing.collector_item_id = Some(Uuid::new_v4());
        store.save(existing).unwrap();

        let mut nameless = record(Some("1.0"));
        nameless.coordinate.artifact = None;
        migrate_prior_records(&mut store, Uuid::new_v4(), &mut nameless).unwrap();
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_group_by_item_merges_same_identity() {
        let item_a = ArtifactItem::new("http://repo.local", "release", "widget", "com.acme/widget");
        let item_a_again = item_a.clone();
        let item_b = ArtifactItem::new("http://repo.local", "release", "gadget", "com.acme/gadget");

        let groups = group_by_item(vec![
            (item_a, record(Some("1.0"))),
            (item_b, record(Some("9.9"))),
            (item_a_again, record(Some("2.0"))),
        ]);

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].item.artifact_name, "widget");
        assert_eq!(groups[0].records.len(), 2);
        assert_eq!(groups[1].item.artifact_name, "gadget");
        assert_eq!(groups[1].records.len(), 1);
    }
}
