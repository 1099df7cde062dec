//! Kernel type metadata and backend provenance.
//!
//! A `KernelSpec` describes an installable kernel type. Specs are immutable once
//! fetched from a backend; the only thing the mixing layer ever changes is the
//! presentation name, via [`KernelSpec::with_display_suffix`].

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Which backend hosts a kernel type (and therefore every kernel started from it).
#[derive(
    Clone, Copy, Debug, Hash, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum BackendKind {
    /// Locally supervised kernel processes.
    Local,
    /// Kernels delegated to a remote gateway.
    Remote,
}

impl BackendKind {
    /// True for [`BackendKind::Remote`].
    pub fn is_remote(self) -> bool {
        matches!(self, BackendKind::Remote)
    }
}

/// A named kernel type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KernelSpec {
    /// Lookup key. Never altered by the mixing layer.
    pub name: String,
    /// Human-facing name (e.g. "Python 3").
    pub display_name: String,
    /// Language the kernel executes.
    pub language: String,
    /// Backend-specific extra metadata, passed through untouched.
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl KernelSpec {
    /// Create a spec with empty metadata.
    pub fn new(
        name: impl Into<String>,
        display_name: impl Into<String>,
        language: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            display_name: display_name.into(),
            language: language.into(),
            metadata: serde_json::Map::new(),
        }
    }

    /// Attach a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Copy of this spec whose display name carries a provenance suffix.
    ///
    /// Only `display_name` changes; `name` stays the lookup key.
    pub fn with_display_suffix(&self, suffix: &str) -> Self {
        let mut spec = self.clone();
        if !suffix.is_empty() && !spec.display_name.ends_with(suffix) {
            spec.display_name.push_str(suffix);
        }
        spec
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suffix_changes_display_only() {
        let spec = KernelSpec::new("python3", "Python 3", "python");
        let suffixed = spec.with_display_suffix(" (Local)");
        assert_eq!(suffixed.name, "python3");
        assert_eq!(suffixed.display_name, "Python 3 (Local)");
        assert_eq!(spec.display_name, "Python 3");
    }

    #[test]
    fn test_suffix_not_doubled() {
        let spec = KernelSpec::new("r", "R", "r").with_display_suffix(" (Remote)");
        let again = spec.with_display_suffix(" (Remote)");
        assert_eq!(again.display_name, "R (Remote)");
    }

    #[test]
    fn test_empty_suffix_is_identity() {
        let spec = KernelSpec::new("julia", "Julia", "julia");
        assert_eq!(spec.with_display_suffix(""), spec);
    }

    #[test]
    fn test_backend_kind_strings() {
        assert_eq!(BackendKind::Local.to_string(), "local");
        assert_eq!("remote".parse::<BackendKind>().unwrap(), BackendKind::Remote);
        assert!(BackendKind::Remote.is_remote());
        assert!(!BackendKind::Local.is_remote());
    }

    #[test]
    fn test_metadata_omitted_when_empty() {
        let spec = KernelSpec::new("python3", "Python 3", "python");
        let json = serde_json::to_value(&spec).unwrap();
        assert!(json.get("metadata").is_none());

        let spec = spec.with_metadata("debugger", serde_json::json!(true));
        let json = serde_json::to_value(&spec).unwrap();
        assert_eq!(json["metadata"]["debugger"], true);
    }
}
