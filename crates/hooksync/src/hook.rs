//! Desired webhook state and GitHub repository identity.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

/// Annotation that excludes a BuildConfig from synchronisation when set to a
/// true boolean value.
pub const IGNORE_ANNOTATION: &str = "openshift-github-hooks-sync/ignore";

static GITHUB_REPO_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"github\.com[:/]([^/]+)/([^.]+)").expect("valid regex"));

/// A repository on GitHub, identified by owner and name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GithubRepository {
    pub owner: String,
    pub name: String,
}

impl GithubRepository {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }

    /// Extract the repository from a git source URI.
    ///
    /// Accepts both `https://github.com/owner/name(.git)` and
    /// `git@github.com:owner/name(.git)` shapes. The name stops at the first
    /// `.` so a trailing `.git` is dropped.
    pub fn parse(uri: &str) -> Option<Self> {
        let caps = GITHUB_REPO_RE.captures(uri)?;
        Some(Self::new(&caps[1], &caps[2]))
    }
}

impl fmt::Display for GithubRepository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// A webhook as it should (or should not) exist on GitHub.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hook {
    /// `true` if the hook must exist, `false` if it must be removed.
    pub enabled: bool,
    /// Delivery URL pointing at the OpenShift webhook endpoint.
    pub target_url: String,
    pub repository: GithubRepository,
}

impl Hook {
    pub fn new(enabled: bool, target_url: impl Into<String>, repository: GithubRepository) -> Self {
        Self {
            enabled,
            target_url: target_url.into(),
            repository,
        }
    }

    /// Same hook with the `enabled` flag replaced.
    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.repository, self.target_url)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid boolean value: {0:?}")]
pub struct ParseBoolError(pub String);

/// Parse an annotation value as a boolean.
///
/// Accepts `1 t T TRUE true True` and `0 f F FALSE false False`.
pub fn parse_annotation_bool(value: &str) -> Result<bool, ParseBoolError> {
    match value {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Ok(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Ok(false),
        other => Err(ParseBoolError(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_repository_rejects_non_github_uris() {
        for uri in [
            "",
            "owner/name",
            "git@bitbucket.org:owner/name.git",
            "https://github.com/owner",
        ] {
            assert_eq!(GithubRepository::parse(uri), None, "uri: {uri:?}");
        }
    }

    #[test]
    fn test_parse_repository_accepts_canonical_shapes() {
        for uri in [
            "https://github.com/owner/name",
            "https://github.com/owner/name.git",
            "git@github.com:owner/name.git",
            "https://www.github.com/owner/name",
        ] {
            assert_eq!(
                GithubRepository::parse(uri),
                Some(GithubRepository::new("owner", "name")),
                "uri: {uri:?}"
            );
        }
    }

    #[test]
    fn test_repository_display() {
        let repo = GithubRepository::new("openshift", "origin");
        assert_eq!(repo.to_string(), "openshift/origin");
    }

    #[test]
    fn test_hook_with_enabled() {
        let hook = Hook::new(true, "https://x/github", GithubRepository::new("o", "n"));
        let disabled = hook.clone().with_enabled(false);
        assert!(!disabled.enabled);
        assert_eq!(disabled.target_url, hook.target_url);
        assert_eq!(disabled.repository, hook.repository);
    }

    #[test]
    fn test_parse_annotation_bool() {
        for value in ["1", "t", "T", "TRUE", "true", "True"] {
            assert_eq!(parse_annotation_bool(value), Ok(true), "value: {value}");
        }
        for value in ["0", "f", "F", "FALSE", "false", "False"] {
            assert_eq!(parse_annotation_bool(value), Ok(false), "value: {value}");
        }
        for value in ["", "whatever", "yes", "tRuE"] {
            assert!(parse_annotation_bool(value).is_err(), "value: {value}");
        }
    }
}
