//! Timeline computation configuration
//!
//! Loaded from TOML. Every field has a default, so a config file only needs
//! the keys it changes:
//!
//! ```toml
//! orphan_prefix = "orphan-"
//! max_pattern_length = 100
//! detect_patterns = true
//! link_indirect = true
//! indirect_roots = false
//! cluster_name = "default"
//! workspace_roots = ["/home/me/project/frontend", "/home/me/project/backend"]
//! ```

use crate::error::{Result, TimelineError};
use crate::event::DEFAULT_ORPHAN_PREFIX;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Upper bound on the length of a repeated location subsequence
pub const MAX_PATTERN_LENGTH: usize = 100;

/// Configuration for one timeline computation
///
/// # Example
/// ```
/// use tracelines::config::TimelineConfig;
///
/// let config = TimelineConfig::default();
/// assert_eq!(config.max_pattern_length, 100);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimelineConfig {
    /// Parent ids starting with this prefix (or empty) are root families
    pub orphan_prefix: String,

    /// Longest subsequence the pattern detector tries, in spans
    pub max_pattern_length: usize,

    /// Run loop/recursion detection on every family
    pub detect_patterns: bool,

    /// Attach temporally nested families that were not directly invoked
    pub link_indirect: bool,

    /// Let root families be indirect children of the spans they run inside
    ///
    /// Needed to nest a callback whose own parent is an orphan id (scheduled
    /// from a different root) under the span it ran inside.
    pub indirect_roots: bool,

    /// Name of the cluster holding roots that match no workspace root
    pub cluster_name: String,

    /// Filepath prefixes used to split root families into clusters
    pub workspace_roots: Vec<String>,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            orphan_prefix: DEFAULT_ORPHAN_PREFIX.to_string(),
            max_pattern_length: MAX_PATTERN_LENGTH,
            detect_patterns: true,
            link_indirect: true,
            indirect_roots: false,
            cluster_name: "default".to_string(),
            workspace_roots: Vec::new(),
        }
    }
}

impl TimelineConfig {
    /// Skip pattern detection and indirect linking (direct structure only)
    pub fn structure_only() -> Self {
        Self {
            detect_patterns: false,
            link_indirect: false,
            ..Self::default()
        }
    }

    /// Parse configuration from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| TimelineError::Config(format!("Failed to parse TOML: {}", e)))?;
        config.validate().map_err(TimelineError::Config)?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| {
            TimelineError::Config(format!(
                "Failed to read config file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Self::from_toml_str(&content)
    }

    /// Validate configuration
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.orphan_prefix.is_empty() {
            return Err("orphan_prefix must not be empty".to_string());
        }

        if !(1..=MAX_PATTERN_LENGTH).contains(&self.max_pattern_length) {
            return Err(format!(
                "max_pattern_length must be in [1, {}], got {}",
                MAX_PATTERN_LENGTH, self.max_pattern_length
            ));
        }

        if self.cluster_name.is_empty() {
            return Err("cluster_name must not be empty".to_string());
        }

        if self.workspace_roots.iter().any(|root| root.is_empty()) {
            return Err("workspace_roots must not contain empty paths".to_string());
        }

        Ok(())
    }
}
