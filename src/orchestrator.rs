//! Collection cycle driver.
//!
//! One invocation processes all configured servers and repositories
//! sequentially, in one of three modes. There is no intra-cycle parallelism
//! and no overlap between cycles; the scheduler is expected to serialize
//! invocations. An error fetching one server or repository is logged and
//! never aborts processing of its siblings.

use std::collections::{HashMap, HashSet};

use anyhow::Result;
use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};

use crate::client::{RepoServerClient, RestGateway};
use crate::config::{CollectionMode, CollectorSettings, ServerSettings};
use crate::constants::SLASH;
use crate::models::{ArtifactItem, BinaryArtifactRecord, RawArtifact, RepoRecord};
use crate::patterns::{PatternResolver, PatternSpec};
use crate::reconcile::{group_by_item, migrate_prior_records, upsert, ObservedArtifact, ReconcileDecision};
use crate::store::{ItemStore, RecordStore, RepoStore};
use crate::summary::CycleSummary;
use crate::window::WindowPlanner;

/// Collector-wide checkpoint, advanced at the end of each successful cycle.
/// The caller owns its persistence.
#[derive(Debug, Clone, Copy, Default)]
pub struct CollectorState {
    pub last_executed: Option<DateTime<Utc>>,
}

/// The injected persistence collaborators for one cycle.
pub struct Stores<'a> {
    pub items: &'a mut dyn ItemStore,
    pub records: &'a mut dyn RecordStore,
    pub repos: &'a mut dyn RepoStore,
}

/// Drives one full collection pass over the configured servers.
pub struct CollectionOrchestrator<'a, G: RestGateway> {
    settings: &'a CollectorSettings,
    resolver: &'a PatternResolver,
    planner: WindowPlanner,
    client: &'a RepoServerClient<'a, G>,
}

impl<'a, G: RestGateway> CollectionOrchestrator<'a, G> {
    pub fn new(
        settings: &'a CollectorSettings,
        resolver: &'a PatternResolver,
        planner: WindowPlanner,
        client: &'a RepoServerClient<'a, G>,
    ) -> Self {
        CollectionOrchestrator {
            settings,
            resolver,
            planner,
            client,
        }
    }

    /// Run one collection cycle in the configured mode.
    pub fn run(&self, stores: &mut Stores, state: &mut CollectorState) -> Result<CycleSummary> {
        let cycle_start = Utc::now();
        info!("Collection mode = {}", self.settings.mode);
        let mut summary = CycleSummary::new(self.settings.mode, cycle_start);

        match self.settings.mode {
            CollectionMode::RepoBased => self.collect_repo_based(stores, cycle_start, &mut summary)?,
            CollectionMode::ArtifactBased => {
                self.collect_artifact_based(stores, state, cycle_start, &mut summary)?
            }
            CollectionMode::Hybrid => {
                self.collect_hybrid(stores, state, cycle_start, &mut summary)?
            }
        }

        summary.finish(Utc::now());
        info!(
            "Collection cycle finished: inserted={}, updated={}, skipped={}, unresolvedWindows={}",
            summary.records_inserted,
            summary.records_updated,
            summary.records_skipped,
            summary.unresolved_windows
        );
        Ok(summary)
    }

    fn server_url_valid(url: &str) -> bool {
        if url.ends_with(SLASH) {
            return true;
        }
        error!("Error with server url: {}. Url does not end with '/'", url);
        false
    }

    /// Repo-based mode: discover repositories, reconcile their enabled state
    /// against configuration, and pull each enabled repository since its own
    /// checkpoint. Records are stored when new by full coordinate identity.
    fn collect_repo_based(
        &self,
        stores: &mut Stores,
        cycle_start: DateTime<Utc>,
        summary: &mut CycleSummary,
    ) -> Result<()> {
        for server in &self.settings.servers {
            if !Self::server_url_valid(&server.url) {
                continue;
            }
            info!("======> collecting {}", server.url);

            let discovered = match self.client.list_repos(&server.url) {
                Ok(repos) => repos,
                Err(e) => {
                    error!("Fetching repositories from {}: {:#}", server.url, e);
                    continue;
                }
            };
            reconcile_repo_states(stores.repos, server, discovered)?;

            for mut repo in stores.repos.find_enabled(&server.url) {
                let repo_id = match repo.id {
                    Some(id) => id,
                    None => {
                        warn!("Enabled repo {} has no id, skipping", repo.repo_name);
                        continue;
                    }
                };

                let window = self.planner.plan_single(repo.last_updated, cycle_start);
                let raws = match self
                    .client
                    .query_window(&server.url, &repo.repo_name, &window, None)
                {
                    Ok(raws) => raws,
                    Err(e) => {
                        error!("Querying repo {}: {:#}", repo.repo_name, e);
                        summary.unresolved_windows += 1;
                        continue;
                    }
                };

                for raw in raws {
                    let full_path = raw.full_path();
                    let coordinate = match self.resolver.parse_any(&full_path) {
                        Some(coordinate) => coordinate,
                        None => {
                            summary.records_skipped += 1;
                            continue;
                        }
                    };
                    let mut record = BinaryArtifactRecord::from_raw(&raw, Utc::now());
                    record.apply_coordinate(coordinate);

                    if stores
                        .records
                        .find_by_coordinate(repo_id, &record.coordinate)
                        .is_empty()
                    {
                        record.collector_item_id = Some(repo_id);
                        stores.records.save(record)?;
                        summary.records_inserted += 1;
                    } else {
                        summary.records_skipped += 1;
                    }
                }

                repo.last_updated = Some(cycle_start);
                stores.repos.save(repo)?;
                summary.repos_processed += 1;
            }
            summary.servers_processed += 1;
        }
        Ok(())
    }

    /// Artifact-based mode: chunked windows against the collector-wide
    /// checkpoint, classifying raw items into item identities plus records,
    /// then creating unseen items and reconciling every record.
    fn collect_artifact_based(
        &self,
        stores: &mut Stores,
        state: &mut CollectorState,
        cycle_start: DateTime<Utc>,
        summary: &mut CycleSummary,
    ) -> Result<()> {
        let checkpoint = state.last_executed;
        let mut halt_at: Option<DateTime<Utc>> = None;

        for server in &self.settings.servers {
            if !Self::server_url_valid(&server.url) {
                continue;
            }
            for repo_patterns in &server.repo_and_patterns {
                let repo = &repo_patterns.repo;
                let spec = match self.resolver.spec_for(repo) {
                    Some(spec) => spec,
                    None => continue,
                };
                info!("Collecting repository ====>>> {}", repo);

                let mut observations: Vec<(ArtifactItem, BinaryArtifactRecord)> = Vec::new();
                for window in self.planner.plan_chunked(checkpoint, cycle_start) {
                    match self.client.query_window(&server.url, repo, &window, None) {
                        Ok(raws) => {
                            for raw in raws {
                                observations.push(self.classify(server, repo, spec, &raw));
                            }
                        }
                        Err(e) => {
                            error!("Querying repo {} window {}: {:#}", repo, window, e);
                            summary.unresolved_windows += 1;
                            halt_at =
                                Some(halt_at.map_or(window.start, |h| h.min(window.start)));
                            // Sibling windows still run; only the checkpoint
                            // is held back
                        }
                    }
                }

                for group in group_by_item(observations) {
                    persist_group(
                        stores,
                        group,
                        cycle_start,
                        self.settings.collect_enabled_items_only,
                        summary,
                    )?;
                }
                summary.repos_processed += 1;
            }
            summary.servers_processed += 1;
        }

        advance_checkpoint(state, halt_at, cycle_start);
        Ok(())
    }

    /// Turn one raw item into the (item identity, record) pair it belongs to.
    fn classify(
        &self,
        server: &ServerSettings,
        queried_repo: &str,
        spec: &PatternSpec,
        raw: &RawArtifact,
    ) -> (ArtifactItem, BinaryArtifactRecord) {
        let full_path = raw.full_path();
        let mut record = BinaryArtifactRecord::from_raw(raw, Utc::now());

        let (artifact_name, item_path) = match spec.parse(&full_path) {
            Some(coordinate) => {
                let name = coordinate.artifact.clone().unwrap_or_default();
                let path = coordinate
                    .item_path()
                    .unwrap_or_else(|| raw.path.trim_matches(SLASH).to_string());
                record.apply_coordinate(coordinate);
                (name, path)
            }
            None => (String::new(), raw.path.trim_matches(SLASH).to_string()),
        };

        let repo_name = if raw.repo.is_empty() {
            queried_repo
        } else {
            &raw.repo
        };
        let mut item = ArtifactItem::new(&server.url, repo_name, &artifact_name, &item_path);
        item.description = Some(artifact_name);
        item.normalize();
        (item, record)
    }

    /// Hybrid mode: one full-repository query per logical repo, reconciled
    /// only against items already marked enabled, after normalization and
    /// sub-repository remapping.
    fn collect_hybrid(
        &self,
        stores: &mut Stores,
        state: &mut CollectorState,
        cycle_start: DateTime<Utc>,
        summary: &mut CycleSummary,
    ) -> Result<()> {
        let server = match self.settings.servers.first() {
            Some(server) => server,
            None => return Ok(()),
        };
        if !Self::server_url_valid(&server.url) {
            return Ok(());
        }

        let enabled = stores.items.find_enabled();
        info!("Total enabled artifact items = {}", enabled.len());
        let mut halt_at: Option<DateTime<Utc>> = None;

        let repo_names: Vec<String> = self.resolver.logical_repos().map(str::to_string).collect();
        for repo in &repo_names {
            let spec = match self.resolver.spec_for(repo) {
                Some(spec) => spec,
                None => continue,
            };

            let window = self.planner.plan_single(state.last_executed, cycle_start);
            let raws = match self.client.query_window(&server.url, repo, &window, None) {
                Ok(raws) => raws,
                Err(e) => {
                    error!("Querying repo {}: {:#}", repo, e);
                    summary.unresolved_windows += 1;
                    halt_at = Some(halt_at.map_or(window.start, |h| h.min(window.start)));
                    continue;
                }
            };

            // Strict-parsed records grouped by the item identity they imply
            let mut processing: HashMap<ArtifactItem, Vec<BinaryArtifactRecord>> = HashMap::new();
            for raw in raws {
                let full_path = raw.full_path();
                let coordinate = match spec.parse_complete(&full_path) {
                    Some(coordinate) => coordinate,
                    None => {
                        debug!("Not enough data for artifact at {}", full_path);
                        summary.records_skipped += 1;
                        continue;
                    }
                };
                let (artifact_name, item_path) =
                    match (coordinate.artifact.clone(), coordinate.item_path()) {
                        (Some(name), Some(path)) => (name, path),
                        _ => {
                            debug!("No artifact identity for {}", full_path);
                            summary.records_skipped += 1;
                            continue;
                        }
                    };

                let mut record = BinaryArtifactRecord::from_raw(&raw, Utc::now());
                record.apply_coordinate(coordinate);

                let mut item = ArtifactItem::new(&server.url, repo, &artifact_name, &item_path);
                item.normalize();
                processing.entry(item).or_default().push(record);
            }

            let mut updated = 0;
            for item in &enabled {
                let mut item = item.clone();
                item.normalize();
                match self.resolver.remap_sub_repo(&item.repo_name) {
                    Some(root) => item.repo_name = root.to_string(),
                    None => warn!(
                        "Repository {} resolves to no configured repo or sub-repo; carrying item forward",
                        item.repo_name
                    ),
                }

                let records = match processing.get(&item) {
                    Some(records) => records,
                    None => continue,
                };
                let item_id = match item.id {
                    Some(id) => id,
                    None => {
                        warn!("Enabled item {} has no id, skipping", item.artifact_name);
                        continue;
                    }
                };
                info!(
                    "processing artifact={}, repo={}",
                    item.artifact_name, item.repo_name
                );

                for record in records.clone() {
                    match upsert(stores.records, item_id, record)? {
                        ReconcileDecision::Inserted => summary.records_inserted += 1,
                        ReconcileDecision::Updated => summary.records_updated += 1,
                        ReconcileDecision::Skipped => summary.records_skipped += 1,
                    }
                }

                item.last_updated = Some(cycle_start);
                stores.items.save(item)?;
                summary.items_updated += 1;
                updated += 1;
            }
            info!("updated artifacts for repo={}, updatedCount={}", repo, updated);
            summary.repos_processed += 1;
        }
        summary.servers_processed += 1;

        advance_checkpoint(state, halt_at, cycle_start);
        Ok(())
    }
}

/// Advance the collector checkpoint to cycle start, or hold it at the
/// earliest unresolved window so the next cycle re-covers the gap.
fn advance_checkpoint(
    state: &mut CollectorState,
    halt_at: Option<DateTime<Utc>>,
    cycle_start: DateTime<Utc>,
) {
    state.last_executed = Some(match (state.last_executed, halt_at) {
        (_, None) => cycle_start,
        (Some(previous), Some(halt)) => previous.max(halt.min(cycle_start)),
        (None, Some(halt)) => halt.min(cycle_start),
    });
}

/// Flip tracked repositories' enabled state to match configuration and save
/// newly discovered repositories (disabled until the next reconciliation).
fn reconcile_repo_states(
    repos: &mut dyn RepoStore,
    server: &ServerSettings,
    discovered: Vec<RepoRecord>,
) -> Result<()> {
    let configured: HashSet<&str> = server
        .repo_and_patterns
        .iter()
        .map(|r| r.repo.as_str())
        .collect();

    let existing = repos.for_instance(&server.url);
    let mut flipped = 0;
    for repo in &existing {
        let should_collect = configured.contains(repo.repo_name.as_str());
        if repo.enabled != should_collect {
            let mut changed = repo.clone();
            changed.enabled = should_collect;
            repos.save(changed)?;
            flipped += 1;
        }
    }
    if flipped > 0 {
        info!("Repo state changes: {}", flipped);
    }

    let mut added = 0;
    for mut repo in discovered {
        if !existing.contains(&repo) {
            repo.enabled = false;
            repo.description = Some(repo.repo_name.clone());
            repos.save(repo)?;
            added += 1;
        }
    }
    info!("New repos: {}", added);
    Ok(())
}

/// Resolve or create the owning item for one observed group, then reconcile
/// its records under the resolved id.
///
/// Records observed in the same pass that first sees their item resolve to
/// the just-assigned id; they are never persisted with a stale or default
/// owner. With `enabled_only`, groups whose item is untracked or disabled
/// are skipped instead of creating new items.
fn persist_group(
    stores: &mut Stores,
    group: ObservedArtifact,
    cycle_start: DateTime<Utc>,
    enabled_only: bool,
    summary: &mut CycleSummary,
) -> Result<()> {
    let ObservedArtifact { mut item, records } = group;

    let existing = stores
        .items
        .find_by_identity(
            &item.instance_url,
            &item.repo_name,
            &item.artifact_name,
            &item.path,
        )
        .into_iter()
        .next();

    if enabled_only && !existing.as_ref().map_or(false, |found| found.enabled) {
        debug!(
            "Skipping {} records for untracked or disabled item {}",
            records.len(),
            item.artifact_name
        );
        summary.records_skipped += records.len();
        return Ok(());
    }

    let saved = match existing {
        Some(mut found) => {
            found.last_updated = Some(cycle_start);
            let saved = stores.items.save(found)?;
            summary.items_updated += 1;
            saved
        }
        None => {
            item.last_updated = Some(cycle_start);
            let saved = stores.items.save(item)?;
            summary.items_created += 1;
            saved
        }
    };
    let item_id = match saved.id {
        Some(id) => id,
        None => {
            warn!("Item {} was saved without an id", saved.artifact_name);
            return Ok(());
        }
    };

    for mut record in records {
        migrate_prior_records(stores.records, item_id, &mut record)?;
        match upsert(stores.records, item_id, record)? {
            ReconcileDecision::Inserted => summary.records_inserted += 1,
            ReconcileDecision::Updated => summary.records_updated += 1,
            ReconcileDecision::Skipped => summary.records_skipped += 1,
        }
    }
    Ok(())
}
