//! Exposed resync and version-lookup operations.
//!
//! Both operations are synchronous and report aggregate counts rather than
//! structured results; callers inspect the record store for authoritative
//! detail. Missing data is reported as a count, never as an error.

use anyhow::Result;
use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use regex::Regex;
use serde::Serialize;

use crate::client::{RepoServerClient, RestGateway};
use crate::models::{ArtifactItem, BinaryArtifactRecord};
use crate::patterns::PatternResolver;
use crate::reconcile::{upsert, ReconcileDecision};
use crate::store::{ItemStore, RecordStore};
use crate::window::{FetchWindow, WindowPlanner};

/// Request to re-synchronize a set of tracked targets over a time range.
#[derive(Debug, Clone)]
pub struct ResyncRequest {
    /// Artifact names of the targets to resync
    pub targets: Vec<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Re-pull from the transport, or only re-evaluate stored data
    pub refetch: bool,
}

/// Aggregate counts reported by [`resync`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct ResyncSummary {
    pub targets_requested: usize,
    pub targets_unknown: usize,
    pub items_considered: usize,
    pub items_without_data: usize,
}

/// Re-synchronize the tracked items behind a set of target names.
///
/// Each matched item is normalized and re-enabled; with `refetch` its records
/// are re-pulled through the reconciliation engine first. Items with no
/// stored record in `[start, end)` are counted, not failed.
pub fn resync<G: RestGateway>(
    request: &ResyncRequest,
    client: &RepoServerClient<G>,
    resolver: &PatternResolver,
    planner: &WindowPlanner,
    items: &mut dyn ItemStore,
    records: &mut dyn RecordStore,
) -> Result<ResyncSummary> {
    let mut summary = ResyncSummary {
        targets_requested: request.targets.len(),
        ..Default::default()
    };

    for target in &request.targets {
        let matched = items.find_by_artifact_name(target);
        if matched.is_empty() {
            info!("Target {} has no tracked items", target);
            summary.targets_unknown += 1;
            continue;
        }

        for mut item in matched {
            item.normalize();
            summary.items_considered += 1;

            if request.refetch {
                if let Err(e) = refetch_item(client, resolver, planner, records, &item) {
                    warn!("Refetching {}: {:#}", item.artifact_name, e);
                }
            }

            let has_data = item
                .id
                .map(|id| !records.find_in_range(id, request.start, request.end).is_empty())
                .unwrap_or(false);
            if !has_data {
                info!(
                    "repoName={}, artifactName={}, path={} has no data",
                    item.repo_name, item.artifact_name, item.path
                );
                summary.items_without_data += 1;
            }

            item.enabled = true;
            items.save(item)?;
        }
    }

    info!(
        "Resync finished: targets={}, unknown={}, considered={}, withoutData={}",
        summary.targets_requested,
        summary.targets_unknown,
        summary.items_considered,
        summary.items_without_data
    );
    Ok(summary)
}

/// Re-pull one item's records from the transport and reconcile them.
/// Returns how many records were inserted or updated.
pub fn refetch_item<G: RestGateway>(
    client: &RepoServerClient<G>,
    resolver: &PatternResolver,
    planner: &WindowPlanner,
    records: &mut dyn RecordStore,
    item: &ArtifactItem,
) -> Result<usize> {
    let item_id = match item.id {
        Some(id) => id,
        None => return Ok(0),
    };
    let spec = match resolver.resolve(&item.repo_name) {
        Some(spec) => spec,
        None => {
            warn!("No patterns configured for repository {}", item.repo_name);
            return Ok(0);
        }
    };

    let window = planner.plan_single(item.last_updated, Utc::now());
    let raws = client.query_window(
        &item.instance_url,
        &item.repo_name,
        &window,
        Some(&item.path),
    )?;

    let mut reconciled = 0;
    for raw in raws {
        let full_path = raw.full_path();
        let coordinate = match spec.parse_complete(&full_path) {
            Some(coordinate) => coordinate,
            None => {
                debug!("Not enough data for artifact at {}", full_path);
                continue;
            }
        };
        let mut record = BinaryArtifactRecord::from_raw(&raw, Utc::now());
        record.apply_coordinate(coordinate);
        if upsert(records, item_id, record)? != ReconcileDecision::Skipped {
            reconciled += 1;
        }
    }
    Ok(reconciled)
}

/// Lookup request for records of one version of one tracked identity.
#[derive(Debug, Clone)]
pub struct VersionQuery {
    pub instance_url: String,
    pub repo_name: String,
    pub artifact_name: String,
    pub path: String,
    pub version: String,
    pub since: DateTime<Utc>,
}

/// Find the records matching a full identity tuple and version.
///
/// Matching items are re-pulled since `since`, strict-parsed, filtered to the
/// requested version (case-insensitive), reconciled, and returned. A failing
/// query for one item is logged and skips that item only.
pub fn find_versions<G: RestGateway>(
    query: &VersionQuery,
    client: &RepoServerClient<G>,
    resolver: &PatternResolver,
    items: &dyn ItemStore,
    records: &mut dyn RecordStore,
) -> Result<Vec<BinaryArtifactRecord>> {
    let mut probe = ArtifactItem::new(
        &query.instance_url,
        &query.repo_name,
        &query.artifact_name,
        &query.path,
    );
    probe.normalize();

    let matched = items.find_by_identity(
        &probe.instance_url,
        &probe.repo_name,
        &probe.artifact_name,
        &probe.path,
    );

    let mut results = Vec::new();
    for mut item in matched {
        item.normalize();
        let item_id = match item.id {
            Some(id) => id,
            None => continue,
        };
        let spec = match resolver.resolve(&item.repo_name) {
            Some(spec) => spec,
            None => {
                warn!("No patterns configured for repository {}", item.repo_name);
                continue;
            }
        };

        let window = FetchWindow {
            start: query.since,
            end: Utc::now(),
        };
        let raws = match client.query_window(
            &item.instance_url,
            &item.repo_name,
            &window,
            Some(&item.path),
        ) {
            Ok(raws) => raws,
            Err(e) => {
                error!(
                    "No artifacts found for repo={} path={}: {:#}",
                    item.repo_name, item.path, e
                );
                continue;
            }
        };

        for raw in raws {
            let full_path = raw.full_path();
            let coordinate = match spec.parse_complete(&full_path) {
                Some(coordinate) => coordinate,
                None => {
                    debug!("Not enough data found for artifact at {}", full_path);
                    continue;
                }
            };
            let version = match coordinate.version.as_deref() {
                Some(version) => version.to_string(),
                None => continue,
            };
            if !version.eq_ignore_ascii_case(&query.version) {
                continue;
            }

            let mut record = BinaryArtifactRecord::from_raw(&raw, Utc::now());
            record.apply_coordinate(coordinate);
            upsert(records, item_id, record)?;
            if let Some(stored) = records.find_by_item_and_version(item_id, &version) {
                results.push(stored);
            }
        }
    }
    Ok(results)
}

/// Extract the (group, artifact name) correlation key from externally
/// observed build-event text using the configured two-group capture pattern.
///
/// The pattern is applied as a search, not a whole-string match. A missing or
/// empty artifact name yields `None`.
pub fn correlation_key(capture_pattern: &Regex, raw: &str) -> Option<(String, String)> {
    let caps = capture_pattern.captures(raw)?;
    let group = caps.get(1)?.as_str().trim().to_string();
    let artifact = caps.get(2)?.as_str().trim().to_string();
    if artifact.is_empty() {
        return None;
    }
    Some((group, artifact))
}
