//! Query client for the binary-repository server's REST API.
//!
//! The [`RestGateway`] trait is the transport seam: production code uses the
//! blocking [`HttpGateway`], tests substitute a mock. [`RepoServerClient`]
//! holds the query semantics: endpoint construction, credentials lookup,
//! single-retry policy, and response decoding into [`RawArtifact`]s.

pub mod query;
mod rest;

pub use rest::HttpGateway;

use anyhow::{Context, Result};
use log::{debug, info};
use serde::Deserialize;

use crate::config::CollectorSettings;
use crate::constants::{REPOS_URL_SUFFIX, SEARCH_URL_SUFFIX, SLASH};
use crate::models::{RawArtifact, RepoRecord};
use crate::retry::RetryPolicy;
use crate::window::FetchWindow;

/// Credentials for one server, sent as a Basic authorization header.
#[derive(Debug, Clone)]
pub struct BasicAuth {
    pub username: String,
    pub api_key: String,
}

/// Blocking transport boundary.
#[cfg_attr(test, mockall::automock)]
pub trait RestGateway {
    fn get(&self, url: &str, auth: &Option<BasicAuth>) -> Result<String>;
    fn post_query(&self, url: &str, body: &str, auth: &Option<BasicAuth>) -> Result<String>;
}

#[derive(Debug, Deserialize)]
struct RawRepo {
    key: String,
    #[serde(default)]
    url: String,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    results: Vec<RawArtifact>,
}

/// Query client over an injected gateway.
pub struct RepoServerClient<'a, G: RestGateway> {
    gateway: G,
    settings: &'a CollectorSettings,
    retry: RetryPolicy,
}

impl<'a, G: RestGateway> RepoServerClient<'a, G> {
    pub fn new(gateway: G, settings: &'a CollectorSettings) -> Self {
        RepoServerClient {
            gateway,
            settings,
            retry: RetryPolicy::single_retry(),
        }
    }

    /// The underlying gateway; test suites use this to inspect traffic.
    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    /// Credentials of the server matching this instance URL, when both the
    /// username and the api key are configured.
    fn auth_for(&self, instance_url: &str) -> Option<BasicAuth> {
        self.settings
            .servers
            .iter()
            .find(|server| server.url.contains(instance_url))
            .and_then(|server| match (&server.username, &server.api_key) {
                (Some(username), Some(api_key)) => Some(BasicAuth {
                    username: username.clone(),
                    api_key: api_key.clone(),
                }),
                _ => None,
            })
    }

    fn api_url(&self, instance_url: &str, suffix: &str) -> String {
        let mut segments: Vec<&str> = Vec::new();
        if let Some(endpoint) = self.settings.endpoint.as_deref() {
            segments.push(endpoint);
        }
        segments.push(suffix);
        join_url(instance_url, &segments)
    }

    /// List the repositories on a server.
    pub fn list_repos(&self, instance_url: &str) -> Result<Vec<RepoRecord>> {
        let url = self.api_url(instance_url, REPOS_URL_SUFFIX);
        let auth = self.auth_for(instance_url);
        let body = self
            .retry
            .run("repository listing", || self.gateway.get(&url, &auth))?;

        let raw_repos: Vec<RawRepo> =
            serde_json::from_str(&body).context("Failed to parse repository listing")?;

        let repos = raw_repos
            .into_iter()
            .map(|raw| {
                debug!("repoName: {} repoURL: {}", raw.key, raw.url);
                RepoRecord {
                    id: None,
                    instance_url: instance_url.to_string(),
                    repo_name: raw.key,
                    repo_url: raw.url,
                    description: None,
                    enabled: false,
                    last_updated: None,
                }
            })
            .collect();
        Ok(repos)
    }

    /// Pull the raw items of one repository for one time window, ascending by
    /// modification time. Retries once on failure before giving up.
    pub fn query_window(
        &self,
        instance_url: &str,
        repo: &str,
        window: &FetchWindow,
        path_prefix: Option<&str>,
    ) -> Result<Vec<RawArtifact>> {
        let body = query::find_items(repo, window, path_prefix);
        info!("Artifact query ==> {}", body);

        let url = self.api_url(instance_url, SEARCH_URL_SUFFIX);
        let auth = self.auth_for(instance_url);
        let response_body = self.retry.run(
            &format!("item query for repo '{}' window {}", repo, window),
            || self.gateway.post_query(&url, &body, &auth),
        )?;

        let response: QueryResponse =
            serde_json::from_str(&response_body).context("Failed to parse item query response")?;
        info!("Total raw artifacts -- {}", response.results.len());
        Ok(response.results)
    }
}

/// Join a base URL with path segments, tolerating stray separators on either
/// side of each joint.
pub fn join_url(base: &str, paths: &[&str]) -> String {
    let mut result = String::from(base);
    for path in paths {
        let segment = path.trim_start_matches(SLASH);
        if segment.is_empty() {
            continue;
        }
        if !result.ends_with(SLASH) {
            result.push(SLASH);
        }
        result.push_str(segment);
    }
    result
}
