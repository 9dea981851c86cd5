//! Global constants for the collector.
//!
//! Centralizes the named-capture vocabulary shared between pattern
//! configuration and the coordinate parser, plus the server API suffixes.

// Named capture groups recognized in configured path patterns
/// Organization / group id segment; path separators are rewritten to dots
pub const GROUP_CAPTURE: &str = "group";

/// Module segment
pub const MODULE_CAPTURE: &str = "module";

/// Artifact name segment
pub const ARTIFACT_CAPTURE: &str = "artifact";

/// Version segment
pub const VERSION_CAPTURE: &str = "version";

/// Classifier segment
pub const CLASSIFIER_CAPTURE: &str = "classifier";

/// File extension segment; exempt from the completeness gate
pub const EXT_CAPTURE: &str = "ext";

// Server API endpoints
/// Suffix for repository discovery
pub const REPOS_URL_SUFFIX: &str = "api/repositories";

/// Suffix for the declarative item-search endpoint
pub const SEARCH_URL_SUFFIX: &str = "api/search/aql";

/// Timestamp format the query API expects (millisecond precision, UTC)
pub const QUERY_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Path separator used in repository paths and server URLs
pub const SLASH: char = '/';
