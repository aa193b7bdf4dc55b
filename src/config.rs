//! Runtime settings for geometry processing.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::util::Result;

/// Tunables for the parallel parts of the geometry set API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Run `modify_geometry_sets` callbacks on the rayon pool.
    pub parallel_modify: bool,
    /// Below this many gathered nodes callbacks run on the calling thread.
    pub min_parallel_nodes: usize,
    /// Size of a dedicated thread pool; `None` uses the global rayon pool.
    pub num_threads: Option<usize>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            parallel_modify: true,
            min_parallel_nodes: 2,
            num_threads: None,
        }
    }
}

impl Settings {
    /// Parse settings from a JSON string. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let mut settings: Self = serde_json::from_str(json)?;
        settings.min_parallel_nodes = settings.min_parallel_nodes.max(2);
        Ok(settings)
    }

    /// Load settings from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Save settings as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Whether `nodes` gathered geometry sets should be dispatched in parallel.
    #[inline]
    pub fn use_parallel(&self, nodes: usize) -> bool {
        self.parallel_modify && nodes >= self.min_parallel_nodes.max(2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_partial_json() {
        let settings = Settings::from_json(r#"{ "num_threads": 4 }"#).unwrap();
        assert_eq!(settings.num_threads, Some(4));
        assert!(settings.parallel_modify);
        assert_eq!(settings.min_parallel_nodes, 2);
    }

    #[test]
    fn test_single_node_never_parallel() {
        let settings = Settings { min_parallel_nodes: 0, ..Default::default() };
        assert!(!settings.use_parallel(1));
        assert!(settings.use_parallel(2));
    }

    #[test]
    fn test_invalid_json() {
        assert!(Settings::from_json("{ not json").is_err());
    }
}
