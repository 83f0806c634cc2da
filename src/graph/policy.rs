//! Suppression of noisy forward references.

use serde::{Deserialize, Serialize};

/// Forward single references whose target type is suppressed are not
/// followed, unless the referring entity's type is exempt.
///
/// With the defaults, owner history is kept once at the project root and
/// dropped everywhere else. Type names compare ASCII case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExclusionPolicy {
    pub suppressed_types: Vec<String>,
    pub exempt_source_types: Vec<String>,
}

impl Default for ExclusionPolicy {
    fn default() -> Self {
        Self {
            suppressed_types: vec!["IfcOwnerHistory".to_string()],
            exempt_source_types: vec!["IfcProject".to_string()],
        }
    }
}

impl ExclusionPolicy {
    pub fn new(suppressed_types: Vec<String>, exempt_source_types: Vec<String>) -> Self {
        Self {
            suppressed_types,
            exempt_source_types,
        }
    }

    /// Follow every reference
    pub fn none() -> Self {
        Self::new(Vec::new(), Vec::new())
    }

    /// Whether the reference `source_type -> target_type` is dropped
    pub fn skips(&self, source_type: &str, target_type: &str) -> bool {
        let listed = |types: &[String], name: &str| types.iter().any(|t| t.eq_ignore_ascii_case(name));
        listed(&self.suppressed_types, target_type) && !listed(&self.exempt_source_types, source_type)
    }
}
