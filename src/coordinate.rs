//! Artifact coordinate extraction from repository paths.
//!
//! A configured pattern is a regular expression over the full repository path
//! (directory path joined with the file name) that may declare any subset of
//! the named captures listed in [`crate::constants`]. Matching is always
//! whole-string: a pattern that only matches a substring of the path does not
//! produce a coordinate.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::constants::{
    ARTIFACT_CAPTURE, CLASSIFIER_CAPTURE, EXT_CAPTURE, GROUP_CAPTURE, MODULE_CAPTURE,
    VERSION_CAPTURE,
};

/// Structured identity extracted from a repository path.
///
/// Every field is optional: a field is populated only when the active pattern
/// declares the corresponding named capture. Absence is a valid value, not an
/// error; callers that need a usable coordinate go through [`parse_strict`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactCoordinate {
    /// Organization id, dot-separated (path separators rewritten to dots)
    pub group: Option<String>,
    pub module: Option<String>,
    pub version: Option<String>,
    /// Artifact name
    pub artifact: Option<String>,
    pub classifier: Option<String>,
    pub extension: Option<String>,
}

impl ArtifactCoordinate {
    /// True when no capture produced any data.
    pub fn is_empty(&self) -> bool {
        self.group.is_none()
            && self.module.is_none()
            && self.version.is_none()
            && self.artifact.is_none()
            && self.classifier.is_none()
            && self.extension.is_none()
    }

    /// Canonical item path `<group>/<artifact>` when both segments are known.
    pub fn item_path(&self) -> Option<String> {
        match (self.group.as_deref(), self.artifact.as_deref()) {
            (Some(group), Some(artifact)) => Some(format!("{}/{}", group, artifact)),
            _ => None,
        }
    }
}

/// Whether the pattern declares a capture with the given name.
fn declares(pattern: &Regex, name: &str) -> bool {
    pattern.capture_names().flatten().any(|n| n == name)
}

/// Extract a coordinate from `path`, or `None` when the pattern does not
/// match the path in its entirety.
///
/// Non-match is a normal outcome. Declared captures that matched empty text
/// are carried through as empty strings; [`parse_strict`] is the variant that
/// gates on that.
pub fn parse(pattern: &Regex, path: &str) -> Option<ArtifactCoordinate> {
    let caps = pattern.captures(path)?;
    let whole = caps.get(0)?;
    if whole.start() != 0 || whole.end() != path.len() {
        return None;
    }

    let grab = |name: &str| caps.name(name).map(|m| m.as_str().to_string());

    Some(ArtifactCoordinate {
        group: grab(GROUP_CAPTURE).map(|g| g.replace('/', ".")),
        module: grab(MODULE_CAPTURE),
        version: grab(VERSION_CAPTURE),
        artifact: grab(ARTIFACT_CAPTURE),
        classifier: grab(CLASSIFIER_CAPTURE),
        extension: grab(EXT_CAPTURE),
    })
}

/// Extract a coordinate and evaluate completeness.
///
/// The result is complete only when every capture the pattern declares,
/// other than the extension, yielded non-empty text. An incomplete result
/// means the pattern matched syntactically but the path lacks the structure
/// of a usable coordinate; callers must not store such items (the version in
/// particular must never be empty for a record to be stored).
pub fn parse_strict(pattern: &Regex, path: &str) -> Option<(ArtifactCoordinate, bool)> {
    let coordinate = parse(pattern, path)?;

    let gated = [
        (GROUP_CAPTURE, &coordinate.group),
        (MODULE_CAPTURE, &coordinate.module),
        (VERSION_CAPTURE, &coordinate.version),
        (ARTIFACT_CAPTURE, &coordinate.artifact),
        (CLASSIFIER_CAPTURE, &coordinate.classifier),
    ];
    let complete = gated.iter().all(|(name, value)| {
        !declares(pattern, name) || value.as_deref().is_some_and(|v| !v.is_empty())
    });

    Some((coordinate, complete))
}
