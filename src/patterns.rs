//! Repository name to pattern-spec resolution.
//!
//! Configuration maps each logical repository to an ordered list of path
//! patterns, optionally with sub-repository aliases that inherit the parent's
//! patterns. Resolution is substring-based: a configured key applies to any
//! repository name that contains it, which supports prefixed and
//! environment-qualified names. First configured entry wins; the order is
//! stable across runs.

use anyhow::{bail, Context, Result};
use log::{debug, info, warn};
use regex::Regex;

use crate::config::CollectorSettings;
use crate::coordinate::{self, ArtifactCoordinate};

/// Ordered, compiled path patterns for one logical repository.
#[derive(Debug, Clone)]
pub struct PatternSpec {
    sources: Vec<String>,
    compiled: Vec<Regex>,
}

impl PatternSpec {
    fn compile(sources: &[String]) -> Result<Self> {
        let mut compiled = Vec::with_capacity(sources.len());
        for source in sources {
            let regex = Regex::new(source).context(format!("Invalid pattern: {}", source))?;
            info!("Adding pattern {}", source);
            compiled.push(regex);
        }
        Ok(PatternSpec {
            sources: sources.to_vec(),
            compiled,
        })
    }

    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    pub fn regexes(&self) -> &[Regex] {
        &self.compiled
    }

    /// Lenient extraction: the first structurally-matching template wins.
    pub fn parse(&self, path: &str) -> Option<ArtifactCoordinate> {
        self.compiled
            .iter()
            .find_map(|regex| coordinate::parse(regex, path))
    }

    /// Strict extraction: the first template that matches and yields a
    /// complete coordinate wins. Templates that match with missing data are
    /// passed over in favor of later ones.
    pub fn parse_complete(&self, path: &str) -> Option<ArtifactCoordinate> {
        for regex in &self.compiled {
            if let Some((coordinate, complete)) = coordinate::parse_strict(regex, path) {
                if complete {
                    return Some(coordinate);
                }
                debug!("Pattern matched {} but coordinate is incomplete", path);
            }
        }
        None
    }
}

/// Resolves repository names to their pattern specs.
///
/// Built once at startup from settings; construction fails when no usable
/// pattern exists or when a sub-repository alias is claimed by two parents.
#[derive(Debug, Clone)]
pub struct PatternResolver {
    entries: Vec<(String, PatternSpec)>,
    aliases: Vec<(String, usize)>,
}

impl PatternResolver {
    /// Compile and validate the configured pattern map.
    pub fn from_settings(settings: &CollectorSettings) -> Result<Self> {
        let mut entries: Vec<(String, PatternSpec)> = Vec::new();
        let mut aliases: Vec<(String, usize)> = Vec::new();

        for server in &settings.servers {
            for repo_patterns in &server.repo_and_patterns {
                if entries.iter().any(|(name, _)| name == &repo_patterns.repo) {
                    bail!(
                        "Repository '{}' is configured more than once",
                        repo_patterns.repo
                    );
                }
                let spec = PatternSpec::compile(&repo_patterns.patterns)?;
                let entry_idx = entries.len();
                entries.push((repo_patterns.repo.clone(), spec));

                for sub_repo in &repo_patterns.sub_repos {
                    if let Some((_, existing_idx)) =
                        aliases.iter().find(|(alias, _)| alias == sub_repo)
                    {
                        if *existing_idx != entry_idx {
                            bail!(
                                "Sub-repository '{}' is aliased under both '{}' and '{}'",
                                sub_repo,
                                entries[*existing_idx].0,
                                repo_patterns.repo
                            );
                        }
                        continue;
                    }
                    aliases.push((sub_repo.clone(), entry_idx));
                }
            }
        }

        let total_patterns: usize = entries.iter().map(|(_, spec)| spec.regexes().len()).sum();
        if total_patterns == 0 {
            bail!("No valid artifact patterns configured. Aborting.");
        }

        let resolver = PatternResolver { entries, aliases };
        resolver.warn_shadowed_keys();
        Ok(resolver)
    }

    /// Substring matching means an earlier key that is contained in a later
    /// key swallows the later key's repositories. Preserved behavior; flagged
    /// so operators can spot it.
    fn warn_shadowed_keys(&self) {
        for (i, (earlier, _)) in self.entries.iter().enumerate() {
            for (later, _) in self.entries.iter().skip(i + 1) {
                if later.contains(earlier.as_str()) {
                    warn!(
                        "Repository key '{}' shadows '{}': names matching the latter resolve to the former",
                        earlier, later
                    );
                }
            }
        }
    }

    /// Resolve a repository name to its pattern spec.
    ///
    /// Logical keys are consulted first, then sub-repository aliases; within
    /// each phase the first configured key contained in `repo_name` wins.
    pub fn resolve(&self, repo_name: &str) -> Option<&PatternSpec> {
        if let Some((_, spec)) = self
            .entries
            .iter()
            .find(|(key, _)| repo_name.contains(key.as_str()))
        {
            return Some(spec);
        }
        self.aliases
            .iter()
            .find(|(alias, _)| repo_name.contains(alias.as_str()))
            .map(|(_, idx)| &self.entries[*idx].1)
    }

    /// Map a repository name to its parent logical repository.
    ///
    /// A configured logical key maps to itself; a registered sub-repository
    /// maps to its parent; anything else yields `None` and the caller carries
    /// the item forward unresolved.
    pub fn remap_sub_repo(&self, repo_name: &str) -> Option<&str> {
        if let Some((key, _)) = self.entries.iter().find(|(key, _)| key == repo_name) {
            return Some(key);
        }
        self.aliases
            .iter()
            .find(|(alias, _)| alias == repo_name)
            .map(|(_, idx)| self.entries[*idx].0.as_str())
    }

    /// Configured logical repository names, in configured order.
    pub fn logical_repos(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    /// Exact lookup of a logical repository's pattern spec.
    pub fn spec_for(&self, logical_repo: &str) -> Option<&PatternSpec> {
        self.entries
            .iter()
            .find(|(name, _)| name == logical_repo)
            .map(|(_, spec)| spec)
    }

    /// Lenient extraction against every configured pattern, across all
    /// repositories, in configured order. Used where a repository's items may
    /// follow any configured layout.
    pub fn parse_any(&self, path: &str) -> Option<ArtifactCoordinate> {
        for (idx, regex) in self
            .entries
            .iter()
            .flat_map(|(_, spec)| spec.regexes())
            .enumerate()
        {
            if let Some(coordinate) = coordinate::parse(regex, path) {
                debug!("Artifact at {} matched pattern {}", path, idx);
                return Some(coordinate);
            }
        }
        debug!("Artifact at {} did not match any patterns", path);
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RepoPatterns, ServerSettings};

    fn settings_with(repos: Vec<RepoPatterns>) -> CollectorSettings {
        CollectorSettings {
            servers: vec![ServerSettings {
                url: "http://repo.local/".to_string(),
                username: None,
                api_key: None,
                repo_and_patterns: repos,
            }],
            ..Default::default()
        }
    }

    fn repo(name: &str, sub_repos: &[&str], patterns: &[&str]) -> RepoPatterns {
        RepoPatterns {
            repo: name.to_string(),
            sub_repos: sub_repos.iter().map(|s| s.to_string()).collect(),
            patterns: patterns.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_resolve_exact_and_substring() {
        let settings = settings_with(vec![
            repo("release", &[], &[r"(?<artifact>[^/]+)/(?<version>[^/]+)/.*"]),
            repo("snapshot", &[], &[r".*"]),
        ]);
        let resolver = PatternResolver::from_settings(&settings).unwrap();

        assert!(resolver.resolve("release").is_some());
        // Environment-qualified name contains the configured key
        assert!(resolver.resolve("eu-release-prod").is_some());
        assert!(resolver.resolve("unknown-repo").is_none());
    }

    #[test]
    fn test_resolve_prefers_first_configured() {
        let settings = settings_with(vec![
            repo("rel", &[], &[r"rel/(?<version>[^/]+)"]),
            repo("release", &[], &[r"release/(?<version>[^/]+)"]),
        ]);
        let resolver = PatternResolver::from_settings(&settings).unwrap();

        // "release" contains "rel", and "rel" is configured first
        let spec = resolver.resolve("release").unwrap();
        assert_eq!(spec.sources()[0], r"rel/(?<version>[^/]+)");
    }

    #[test]
    fn test_resolve_falls_back_to_aliases() {
        let settings = settings_with(vec![repo(
            "release",
            &["docker-prod"],
            &[r"(?<artifact>[^/]+)/(?<version>[^/]+)/.*"],
        )]);
        let resolver = PatternResolver::from_settings(&settings).unwrap();

        // "docker-prod" contains no logical key; only the alias map resolves
        // it, to the parent's patterns
        let spec = resolver.resolve("docker-prod").unwrap();
        assert_eq!(spec.sources().len(), 1);
        assert!(resolver.resolve("docker").is_none());
    }

    #[test]
    fn test_remap_sub_repo() {
        let settings = settings_with(vec![
            repo(
                "release",
                &["release-docker", "release-npm"],
                &[r"(?<artifact>[^/]+)/(?<version>[^/]+)/.*"],
            ),
            repo("snapshot", &[], &[r".*"]),
        ]);
        let resolver = PatternResolver::from_settings(&settings).unwrap();

        assert_eq!(resolver.remap_sub_repo("release"), Some("release"));
        assert_eq!(resolver.remap_sub_repo("release-docker"), Some("release"));
        assert_eq!(resolver.remap_sub_repo("release-npm"), Some("release"));
        assert_eq!(resolver.remap_sub_repo("unrelated"), None);
    }

    #[test]
    fn test_ambiguous_alias_is_fatal() {
        let settings = settings_with(vec![
            repo("release", &["shared-sub"], &[r".*"]),
            repo("snapshot", &["shared-sub"], &[r".*"]),
        ]);
        let result = PatternResolver::from_settings(&settings);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("shared-sub"));
    }

    #[test]
    fn test_duplicate_repo_is_fatal() {
        let settings = settings_with(vec![
            repo("release", &[], &[r".*"]),
            repo("release", &[], &[r".*"]),
        ]);
        assert!(PatternResolver::from_settings(&settings).is_err());
    }

    #[test]
    fn test_no_patterns_is_fatal() {
        let settings = settings_with(vec![repo("release", &[], &[])]);
        let result = PatternResolver::from_settings(&settings);
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("No valid artifact patterns"));
    }

    #[test]
    fn test_invalid_pattern_is_fatal() {
        let settings = settings_with(vec![repo("release", &[], &["(?<version>[unclosed"])]);
        let result = PatternResolver::from_settings(&settings);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Invalid pattern"));
    }

    #[test]
    fn test_spec_parse_first_match_wins() {
        let spec = PatternSpec::compile(&[
            r"ivy/(?<artifact>[^/]+)/(?<version>[^/]+)/.*".to_string(),
            r"(?<group>.+)/(?<artifact>[^/]+)/(?<version>[^/]+)/[^/]+".to_string(),
        ])
        .unwrap();

        let coordinate = spec.parse("ivy/widget/1.0/widget.jar").unwrap();
        // First template matched, so no group was extracted
        assert_eq!(coordinate.group, None);
        assert_eq!(coordinate.artifact.as_deref(), Some("widget"));
    }

    #[test]
    fn test_spec_parse_complete_skips_partial_templates() {
        let spec = PatternSpec::compile(&[
            // Matches but can yield an empty version
            r"(?<artifact>[^/]+)/(?<version>[^/]*)/?file\.jar".to_string(),
            r"(?<artifact>[^/]+)/(?<version>[^/]+)/file\.jar".to_string(),
        ])
        .unwrap();

        assert!(spec.parse_complete("widget//file.jar").is_none());
        let coordinate = spec.parse_complete("widget/1.0/file.jar").unwrap();
        assert_eq!(coordinate.version.as_deref(), Some("1.0"));
    }

    #[test]
    fn test_parse_any_spans_repositories() {
        let settings = settings_with(vec![
            repo("release", &[], &[r"release/(?<version>[^/]+)/[^/]+"]),
            repo("docker", &[], &[r"docker/(?<version>[^/]+)/[^/]+"]),
        ]);
        let resolver = PatternResolver::from_settings(&settings).unwrap();

        assert!(resolver.parse_any("docker/1.0/image.tar").is_some());
        assert!(resolver.parse_any("release/2.0/widget.jar").is_some());
        assert!(resolver.parse_any("generic/3.0/blob.bin").is_none());
    }

    #[test]
    fn test_logical_repos_order() {
        let settings = settings_with(vec![
            repo("release", &[], &[r".*"]),
            repo("snapshot", &[], &[r".*"]),
        ]);
        let resolver = PatternResolver::from_settings(&settings).unwrap();
        let repos: Vec<&str> = resolver.logical_repos().collect();
        assert_eq!(repos, vec!["release", "snapshot"]);
    }
}
