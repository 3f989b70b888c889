//! Configuration file support for the dedup driver

use anyhow::{Context, Result};
use bibdedup_core::FormatMapper;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Complete driver configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DriverConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub dedup: DedupConfig,
    /// Format-mapping tables for the match predicate's format rule
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formats: Option<FormatMapConfig>,
}

impl DriverConfig {
    /// Load configuration from a file (YAML or TOML)
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let extension = path.extension().and_then(|s| s.to_str()).unwrap_or("");

        match extension {
            "yaml" | "yml" => serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display())),
            "toml" => toml::from_str(&content)
                .with_context(|| format!("Failed to parse TOML config: {}", path.display())),
            _ => Err(anyhow::anyhow!(
                "Unsupported config file format: {}. Use .yaml, .yml, or .toml",
                extension
            )),
        }
    }

    /// Load from an optional path, falling back to defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Build the format mapper the engine consumes
    pub fn format_mapper(&self) -> TableFormatMapper {
        self.formats.clone().unwrap_or_default().into_mapper()
    }
}

/// Document store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory of the sled database
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("bibdedup-store"),
        }
    }
}

/// Dedup run configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DedupConfig {
    /// Number of worker threads (None = auto-detect)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workers: Option<usize>,
    /// Records fetched per driver sweep
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_batch_size() -> usize {
    1_000
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            workers: None,
            batch_size: default_batch_size(),
        }
    }
}

/// Format-mapping tables: a default table plus per-source overrides
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FormatMapConfig {
    /// Mappings applied for every source
    #[serde(default)]
    pub default: HashMap<String, String>,
    /// Per-source mapping tables, keyed by source id
    #[serde(default)]
    pub sources: HashMap<String, HashMap<String, String>>,
}

impl FormatMapConfig {
    pub fn into_mapper(self) -> TableFormatMapper {
        TableFormatMapper {
            default: self.default,
            sources: self.sources,
        }
    }
}

/// Format mapper backed by the config tables
///
/// Lookup order: the source's own table, then the default table, then
/// the format unchanged.
#[derive(Debug, Clone, Default)]
pub struct TableFormatMapper {
    default: HashMap<String, String>,
    sources: HashMap<String, HashMap<String, String>>,
}

impl FormatMapper for TableFormatMapper {
    fn map_format(&self, source_id: &str, format: &str) -> String {
        self.sources
            .get(source_id)
            .and_then(|table| table.get(format))
            .or_else(|| self.default.get(format))
            .cloned()
            .unwrap_or_else(|| format.to_string())
    }
}
