//! Mist Analytics
//!
//! Network analytics for an agent social network:
//! - Interaction graph construction from posts and comments
//! - Structural metrics (PageRank, betweenness, closeness, clustering)
//! - Louvain community detection
//! - Composite influence scoring and tiering
//! - Tier-filtered result bundles for the visualization side

pub mod graph;

#[cfg(test)]
pub(crate) mod test_helpers;

use serde::Deserialize;
use std::path::{Path, PathBuf};

use graph::{AnalysisSettings, AnalyticsConfig, ExportConfig, InfluenceConfig};

// ============================================================================
// YAML config structs (deserialization targets)
// ============================================================================

/// Top-level YAML configuration file structure
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub data: DataYamlConfig,
    pub analytics: AnalyticsConfig,
    pub influence: InfluenceConfig,
    pub export: ExportConfig,
}

/// Data location section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DataYamlConfig {
    /// Directory holding the collector's JSON files
    pub data_dir: String,
    /// Path of the produced result bundle
    pub output: String,
}

impl Default for DataYamlConfig {
    fn default() -> Self {
        Self {
            data_dir: "data".into(),
            output: "site/data/visualization.json".into(),
        }
    }
}

// ============================================================================
// Runtime config (what the application actually uses)
// ============================================================================

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    pub output: PathBuf,
    pub settings: AnalysisSettings,
}

impl Config {
    /// Load configuration from an optional YAML file, then override with env vars.
    ///
    /// Priority: env var > YAML > default
    ///
    /// If `yaml_path` is None, tries "config.yaml" in CWD. If the file doesn't
    /// exist, falls back to pure env var / defaults.
    pub fn from_yaml_and_env(yaml_path: Option<&Path>) -> Self {
        let yaml = Self::load_yaml(yaml_path);
        Self::from_parts(yaml, |key| std::env::var(key).ok())
    }

    /// Apply env overrides from `lookup` on top of a parsed YAML config.
    fn from_parts(yaml: YamlConfig, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut analytics = yaml.analytics;
        if let Some(damping) = parse_env(&lookup, "MIST_DAMPING") {
            analytics.pagerank_damping = damping;
        }

        let mut export = yaml.export;
        if let Some(tier) = lookup("MIST_TIER") {
            export.tier = tier;
        }
        if let Some(top_n) = parse_env(&lookup, "MIST_TOP_N") {
            export.top_n = Some(top_n);
        }

        Self {
            data_dir: lookup("MIST_DATA_DIR")
                .unwrap_or(yaml.data.data_dir)
                .into(),
            output: lookup("MIST_OUTPUT").unwrap_or(yaml.data.output).into(),
            settings: AnalysisSettings {
                analytics,
                influence: yaml.influence,
                export,
            },
        }
    }

    /// Try to load and parse a YAML config file. Returns defaults on any failure.
    fn load_yaml(yaml_path: Option<&Path>) -> YamlConfig {
        let default_path = Path::new("config.yaml");
        let path = yaml_path.unwrap_or(default_path);

        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_yaml::from_str(&contents) {
                Ok(config) => {
                    tracing::info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                    YamlConfig::default()
                }
            },
            Err(_) => {
                tracing::debug!(
                    "No config file at {}, using env vars / defaults",
                    path.display()
                );
                YamlConfig::default()
            }
        }
    }
}

/// Parse an env override, ignoring (and logging) unparsable values.
fn parse_env<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("Ignoring {}={:?}: not a valid value", key, raw);
            None
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
