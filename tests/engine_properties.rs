//! End-to-end checks of the engine's core guarantees: coordinate extraction,
//! linkage preservation, idempotent reconciliation, lookback clamping, and
//! sub-repository remapping.

use chrono::{Duration, Utc};
use regex::Regex;
use uuid::Uuid;

use binrepo_collector::config::{CollectorSettings, RepoPatterns, ServerSettings};
use binrepo_collector::coordinate::{parse, parse_strict};
use binrepo_collector::models::{BinaryArtifactRecord, BuildLinkage, RawArtifact};
use binrepo_collector::patterns::PatternResolver;
use binrepo_collector::reconcile::{upsert, ReconcileDecision};
use binrepo_collector::store::{InMemoryRecordStore, RecordStore};
use binrepo_collector::window::WindowPlanner;

fn observed_record(version: Option<&str>, md5: &str) -> BinaryArtifactRecord {
    let raw = RawArtifact {
        repo: "release".to_string(),
        path: "com/acme/widget/x".to_string(),
        name: "widget.jar".to_string(),
        actual_md5: Some(md5.to_string()),
        ..Default::default()
    };
    let mut record = BinaryArtifactRecord::from_raw(&raw, Utc::now());
    record.coordinate.artifact = Some("widget".to_string());
    record.coordinate.version = version.map(|v| v.to_string());
    record
}

#[test]
fn test_coordinate_extraction_from_maven_style_path() {
    let pattern = Regex::new(r"com/acme/(?<artifact>[^/]+)/(?<version>[^/]+)/.*").unwrap();

    let (coordinate, complete) =
        parse_strict(&pattern, "com/acme/widget/1.2.3/widget-1.2.3.jar").unwrap();
    assert!(complete);
    assert_eq!(coordinate.artifact.as_deref(), Some("widget"));
    assert_eq!(coordinate.version.as_deref(), Some("1.2.3"));

    // A path from another tree does not match at all
    assert!(parse(&pattern, "org/other/widget/1.2.3/widget.jar").is_none());
}

#[test]
fn test_update_keeps_linkage_and_takes_new_hash() {
    let mut store = InMemoryRecordStore::new();
    let item = Uuid::new_v4();

    let mut existing = observed_record(Some("1.2.3"), "md5-one");
    existing.collector_item_id = Some(item);
    existing.build_linkages = vec![BuildLinkage {
        build_url: "b1".to_string(),
        build_number: None,
        started_at: None,
        started_by: None,
    }];
    store.save(existing).unwrap();

    // Same version observed again with a different hash and no linkage
    let decision = upsert(&mut store, item, observed_record(Some("1.2.3"), "md5-two")).unwrap();
    assert_eq!(decision, ReconcileDecision::Updated);

    let result = store.find_by_item_and_version(item, "1.2.3").unwrap();
    assert_eq!(result.md5.as_deref(), Some("md5-two"));
    assert_eq!(result.build_linkages.len(), 1);
    assert_eq!(result.build_linkages[0].build_url, "b1");
    assert_eq!(store.len(), 1);
}

#[test]
fn test_reconciling_a_batch_twice_equals_once() {
    let item = Uuid::new_v4();
    let batch = || {
        vec![
            observed_record(Some("1.0.0"), "a"),
            observed_record(Some("1.1.0"), "b"),
            observed_record(Some("2.0.0"), "c"),
        ]
    };

    let mut store = InMemoryRecordStore::new();
    for record in batch() {
        upsert(&mut store, item, record).unwrap();
    }
    let after_once: Vec<_> = store
        .records()
        .iter()
        .map(|r| (r.version().unwrap().to_string(), r.md5.clone()))
        .collect();

    for record in batch() {
        upsert(&mut store, item, record).unwrap();
    }
    let after_twice: Vec<_> = store
        .records()
        .iter()
        .map(|r| (r.version().unwrap().to_string(), r.md5.clone()))
        .collect();

    assert_eq!(store.len(), 3);
    assert_eq!(after_once, after_twice);
}

#[test]
fn test_versionless_observation_is_never_stored() {
    let mut store = InMemoryRecordStore::new();
    let item = Uuid::new_v4();

    assert_eq!(
        upsert(&mut store, item, observed_record(None, "a")).unwrap(),
        ReconcileDecision::Skipped
    );
    assert_eq!(
        upsert(&mut store, item, observed_record(Some(""), "a")).unwrap(),
        ReconcileDecision::Skipped
    );
    assert!(store.is_empty());
}

#[test]
fn test_stale_checkpoint_never_reaches_past_ceiling() {
    let now = Utc::now();
    let planner = WindowPlanner::new(Duration::days(3), Duration::days(1), Duration::zero());

    let window = planner.plan_single(Some(now - Duration::days(10)), now);
    assert_eq!(window.start, now - Duration::days(3));
    assert_eq!(window.end, now);
}

#[test]
fn test_sub_repo_rolls_up_to_parent() {
    let settings = CollectorSettings {
        servers: vec![ServerSettings {
            url: "http://repo.local/".to_string(),
            username: None,
            api_key: None,
            repo_and_patterns: vec![RepoPatterns {
                repo: "release".to_string(),
                sub_repos: vec!["release-docker".to_string()],
                patterns: vec![r"(?<artifact>[^/]+)/(?<version>[^/]+)/.*".to_string()],
            }],
        }],
        ..Default::default()
    };
    let resolver = PatternResolver::from_settings(&settings).unwrap();

    assert_eq!(resolver.remap_sub_repo("release-docker"), Some("release"));
    assert_eq!(resolver.remap_sub_repo("release"), Some("release"));
    assert_eq!(resolver.remap_sub_repo("third-party"), None);

    // The alias inherits the parent's patterns
    let spec = resolver.resolve("release-docker").unwrap();
    assert!(spec.parse_complete("widget/1.0/widget.jar").is_some());
}
