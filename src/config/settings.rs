use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Duration;
use log::{debug, info};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// How a collection cycle discovers work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionMode {
    /// Discover repositories per server and pull per-repository since each
    /// repository's own checkpoint
    RepoBased,
    /// Pull artifact items directly in chunked windows against a
    /// collector-wide checkpoint
    ArtifactBased,
    /// One full-repository query per configured repo, reconciled against
    /// already-enabled items only
    Hybrid,
}

impl std::fmt::Display for CollectionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CollectionMode::RepoBased => write!(f, "repo_based"),
            CollectionMode::ArtifactBased => write!(f, "artifact_based"),
            CollectionMode::Hybrid => write!(f, "hybrid"),
        }
    }
}

/// Unit of the lookback ceiling; also the chunk size of chunked window plans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeGranularity {
    Minutes,
    Hours,
    Days,
}

impl TimeGranularity {
    /// `count` units as a duration.
    pub fn duration(&self, count: i64) -> Duration {
        match self {
            TimeGranularity::Minutes => Duration::minutes(count),
            TimeGranularity::Hours => Duration::hours(count),
            TimeGranularity::Days => Duration::days(count),
        }
    }
}

/// Pattern configuration for one logical repository.
///
/// Patterns are tried in declared order. Sub-repositories inherit the
/// parent's patterns and roll up to the parent for identity lookups.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoPatterns {
    pub repo: String,
    #[serde(default)]
    pub sub_repos: Vec<String>,
    pub patterns: Vec<String>,
}

/// One binary-repository server to collect from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Base URL; must end with the path separator
    pub url: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub repo_and_patterns: Vec<RepoPatterns>,
}

/// Collector-wide settings, loaded from a YAML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectorSettings {
    pub mode: CollectionMode,
    pub servers: Vec<ServerSettings>,
    /// Optional extra path segment between the server URL and the API suffix
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Lookback ceiling, in units of `granularity`
    #[serde(default = "default_lookback")]
    pub lookback: i64,
    #[serde(default = "default_granularity")]
    pub granularity: TimeGranularity,
    /// Overlap slack subtracted from every checkpoint, in milliseconds;
    /// absorbed by idempotent reconciliation
    #[serde(default)]
    pub overlap_slack_ms: i64,
    /// Two-group capture pattern correlating build-event text to tracked
    /// items: group 1 is the artifact group, group 2 the artifact name
    #[serde(default)]
    pub capture_pattern: Option<String>,
    #[serde(default)]
    pub collect_enabled_items_only: bool,
}

fn default_lookback() -> i64 {
    3
}

fn default_granularity() -> TimeGranularity {
    TimeGranularity::Days
}

impl Default for CollectorSettings {
    fn default() -> Self {
        CollectorSettings {
            mode: CollectionMode::Hybrid,
            servers: vec![ServerSettings {
                url: "http://localhost:8081/artifactory/".to_string(),
                username: None,
                api_key: None,
                repo_and_patterns: vec![RepoPatterns {
                    repo: "release".to_string(),
                    sub_repos: Vec::new(),
                    patterns: default_patterns(),
                }],
            }],
            endpoint: None,
            lookback: default_lookback(),
            granularity: default_granularity(),
            overlap_slack_ms: 0,
            capture_pattern: None,
            collect_enabled_items_only: false,
        }
    }
}

/// Default layout patterns: a Maven-style tree and a flat
/// group/artifact/version tree.
fn default_patterns() -> Vec<String> {
    vec![
        r"(?<group>.+)/(?<module>[^/]+)/(?<version>[^/]+)/(?<artifact>[^/]+)\.(?<ext>[^./]+)"
            .to_string(),
        r"(?<group>[^/]+)/(?<artifact>[^/]+)/(?<version>[^/]+)/[^/]+\.(?<ext>[^./]+)".to_string(),
    ]
}

impl CollectorSettings {
    /// Load settings from a YAML file.
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .context(format!("Failed to read settings file: {}", path.display()))?;

        let settings: CollectorSettings =
            serde_yaml::from_str(&content).context("Failed to parse YAML settings")?;

        debug!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Save settings to a YAML file.
    pub fn save_to_yaml_file(&self, path: &Path) -> Result<()> {
        let yaml = serde_yaml::to_string(self).context("Failed to serialize settings to YAML")?;

        fs::write(path, yaml).context(format!("Failed to write settings to {}", path.display()))?;

        info!("Saved settings to {}", path.display());
        Ok(())
    }

    /// The lookback ceiling as a duration.
    pub fn lookback_ceiling(&self) -> Duration {
        self.granularity.duration(self.lookback)
    }

    /// One unit of the configured granularity; the chunk size of chunked
    /// window plans.
    pub fn chunk(&self) -> Duration {
        self.granularity.duration(1)
    }

    /// The checkpoint overlap slack as a duration.
    pub fn overlap_slack(&self) -> Duration {
        Duration::milliseconds(self.overlap_slack_ms)
    }

    /// Compile the configured build-event capture pattern, if any.
    ///
    /// An unparseable pattern is a configuration error; callers validate at
    /// startup rather than discovering it on the first build event.
    pub fn capture_regex(&self) -> Result<Option<Regex>> {
        self.capture_pattern
            .as_deref()
            .map(|pattern| {
                Regex::new(pattern).context(format!("Invalid capture pattern: {}", pattern))
            })
            .transpose()
    }
}

/// Load a settings file or create a default one.
///
/// With a path: load it if it exists, otherwise write the default settings
/// there and return them. Without a path: return the defaults.
pub fn load_or_create_settings(path: Option<&Path>) -> Result<CollectorSettings> {
    match path {
        Some(path) => {
            if path.exists() {
                CollectorSettings::from_yaml_file(path)
            } else {
                info!("Creating default settings at {}", path.display());
                let settings = CollectorSettings::default();
                settings.save_to_yaml_file(path)?;
                Ok(settings)
            }
        }
        None => {
            info!("No settings path provided, using defaults");
            Ok(CollectorSettings::default())
        }
    }
}
