//! # binrepo-collector
//!
//! A collector that ingests binary-artifact metadata from binary-repository
//! servers, normalizes repository-layout conventions into canonical artifact
//! coordinates, and reconciles the result against a record store without
//! creating duplicates or losing previously-attached build linkage.
//!
//! ## Overview
//!
//! Each collection cycle walks the configured servers and repositories,
//! plans bounded time windows since the last synchronized checkpoint, pulls
//! raw artifact metadata through the query API, classifies every item with
//! the repository's configured path patterns, and merges the result into the
//! record store. Re-running a cycle over the same data is a no-op: existing
//! versions are updated in place and their build linkage is carried forward.
//!
//! ## Usage
//!
//! ```no_run
//! use binrepo_collector::config::CollectorSettings;
//! use binrepo_collector::patterns::PatternResolver;
//!
//! # fn main() -> anyhow::Result<()> {
//! let settings = CollectorSettings::default();
//! // Refuses to start without at least one valid path pattern.
//! let resolver = PatternResolver::from_settings(&settings)?;
//! assert!(resolver.resolve("release").is_some());
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - [`cli`]: Command-line interface definitions and argument parsing
//! - [`config`]: Settings file loading and repository/pattern configuration
//! - [`models`]: Core data models (items, records, build linkage)
//! - [`coordinate`]: Path-to-coordinate extraction with named captures
//! - [`patterns`]: Repository name to pattern-spec resolution
//! - [`window`]: Lookback-clamped fetch window planning
//! - [`retry`]: Bounded retry policy for transport calls
//! - [`client`]: Query client over the server's REST API
//! - [`store`]: Record store trait boundary and in-memory implementation
//! - [`reconcile`]: Insert/update/skip reconciliation engine
//! - [`orchestrator`]: Collection cycle driver for the three modes
//! - [`ops`]: Exposed resync and version-lookup operations
//! - [`summary`]: Structured cycle summary reporting

/// Command-line interface definitions and argument parsing
pub mod cli;

/// Query client for the binary-repository server's REST API
pub mod client;

/// Settings file loading and repository/pattern configuration
pub mod config;

/// Application-wide constants
pub mod constants;

/// Artifact coordinate extraction from repository paths
pub mod coordinate;

/// Core data models shared across the collector
pub mod models;

/// Exposed resync and version-lookup operations
pub mod ops;

/// Collection cycle driver
pub mod orchestrator;

/// Repository name to pattern-spec resolution
pub mod patterns;

/// Insert/update/skip reconciliation against the record store
pub mod reconcile;

/// Bounded retry policy for transport calls
pub mod retry;

/// Record store trait boundary and in-memory implementation
pub mod store;

/// Structured cycle summary reporting
pub mod summary;

/// Lookback-clamped fetch window planning
pub mod window;
