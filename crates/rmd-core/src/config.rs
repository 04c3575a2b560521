//! Configuration for rmd-core
//!
//! Centralized configuration for duplicate detection thresholds, auto-merge
//! source priority, and server settings.

use std::path::{Path, PathBuf};

use rmd_domain::ImportSource;
use serde::{Deserialize, Serialize};

/// System-wide configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RmdConfig {
    /// Duplicate detection parameters
    pub deduplication: DeduplicationConfig,
    /// Automatic merge behavior
    pub auto_merge: AutoMergeConfig,
    /// HTTP server settings
    pub server: ServerConfig,
}

/// Duplicate detection configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeduplicationConfig {
    /// Minimum normalized title similarity (0.0 - 1.0)
    pub title_threshold: f64,
    /// Allowed difference between publication years when both are known
    pub year_tolerance: u32,
    /// Treat equal DOIs as duplicates regardless of title
    pub match_on_doi: bool,
}

impl Default for DeduplicationConfig {
    fn default() -> Self {
        Self {
            title_threshold: 0.9,
            year_tolerance: 0,
            match_on_doi: true,
        }
    }
}

/// Automatic merge configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoMergeConfig {
    /// Merge groups whose members all carry the same DOI
    pub merge_on_doi: bool,
    /// Merge two-member groups pairing a Pure record with an Activity Insight record
    pub merge_pure_activity_insight_pairs: bool,
    /// Import sources in survivor preference order (first wins)
    pub source_priority: Vec<ImportSource>,
}

impl Default for AutoMergeConfig {
    fn default() -> Self {
        Self {
            merge_on_doi: true,
            merge_pure_activity_insight_pairs: true,
            source_priority: vec![
                ImportSource::Pure,
                ImportSource::ActivityInsight,
                ImportSource::Manual,
            ],
        }
    }
}

impl AutoMergeConfig {
    /// Rank of a source; lower is preferred. Unlisted sources rank last.
    pub fn rank(&self, source: ImportSource) -> usize {
        self.source_priority
            .iter()
            .position(|s| *s == source)
            .unwrap_or(self.source_priority.len())
    }
}

/// Server configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address
    pub addr: String,
    /// SQLite database file
    pub database_path: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:8080".to_string(),
            database_path: PathBuf::from("rmd.db"),
        }
    }
}

impl RmdConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml_str).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Serialize configuration to TOML
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Load configuration from a JSON string
    pub fn from_json(json_str: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json_str)
    }

    /// Serialize configuration to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Read and validate a TOML configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;
        let config = Self::from_toml(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// `<config dir>/rmd/config.toml`, if the platform has a config dir
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("rmd").join("config.toml"))
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        let threshold = self.deduplication.title_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ConfigError::OutOfRange(
                "title_threshold must be between 0.0 and 1.0".to_string(),
            ));
        }

        if self.auto_merge.source_priority.is_empty() {
            return Err(ConfigError::MissingField(
                "auto_merge.source_priority".to_string(),
            ));
        }

        let mut seen = Vec::new();
        for source in &self.auto_merge.source_priority {
            if seen.contains(source) {
                return Err(ConfigError::InvalidValue(format!(
                    "{} listed twice in source_priority",
                    source
                )));
            }
            seen.push(*source);
        }

        if self.server.addr.trim().is_empty() {
            return Err(ConfigError::MissingField("server.addr".to_string()));
        }

        Ok(())
    }
}

/// Configuration error
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    /// Value is out of valid range
    #[error("Value out of range: {0}")]
    OutOfRange(String),

    /// Value is not acceptable
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    /// Required field is missing
    #[error("Missing field: {0}")]
    MissingField(String),

    /// File could not be read
    #[error("IO error: {0}")]
    Io(String),

    /// TOML could not be parsed or written
    #[error("Parse error: {0}")]
    Parse(String),
}
