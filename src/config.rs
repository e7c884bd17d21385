use crate::model::columns::{default_columns, ColumnDef};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Table configuration
///
/// Every field has a default so a partial JSON file (or `{}`) is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TableConfig {
    /// Base URL of the paging API. The search endpoint is `<api_url>/search`.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Rows per page; also the granularity of fetches and eviction
    #[serde(default = "default_limit")]
    pub limit: u64,

    /// Height of one row in pixels (terminal host: one cell row is one unit)
    #[serde(default = "default_row_height")]
    pub row_height: f64,

    /// Extra rows rendered above and below the visible range
    #[serde(default = "default_buffer")]
    pub buffer: u64,

    /// Cached row count above which out-of-window pages are evicted
    #[serde(default = "default_cleanup_threshold")]
    pub cleanup_threshold: usize,

    /// Distance in rows from the edge of the requested span that triggers a prefetch
    #[serde(default = "default_preload_threshold")]
    pub preload_threshold: u64,

    /// Initial dataset size; updated from response envelopes
    #[serde(default = "default_total_rows")]
    pub total_rows: u64,

    /// HTTP timeout for page and search requests
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Minimum scrollbar thumb length in host units
    #[serde(default = "default_min_thumb")]
    pub min_thumb: f64,

    /// Lower bound for the side panel width in host units
    #[serde(default = "default_min_panel_width")]
    pub min_panel_width: u32,

    /// Columns in display order
    #[serde(default = "default_columns")]
    pub columns: Vec<ColumnDef>,
}

fn default_api_url() -> String {
    "http://127.0.0.1:5000/api/table/users".to_string()
}

fn default_limit() -> u64 {
    100
}

fn default_row_height() -> f64 {
    45.0
}

fn default_buffer() -> u64 {
    20
}

fn default_cleanup_threshold() -> usize {
    400
}

fn default_preload_threshold() -> u64 {
    50
}

fn default_total_rows() -> u64 {
    10_000
}

fn default_request_timeout_ms() -> u64 {
    5_000
}

fn default_min_thumb() -> f64 {
    crate::view::scrollbar::MIN_THUMB_PX
}

fn default_min_panel_width() -> u32 {
    crate::view::layout::DEFAULT_MIN_PANEL
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            limit: default_limit(),
            row_height: default_row_height(),
            buffer: default_buffer(),
            cleanup_threshold: default_cleanup_threshold(),
            preload_threshold: default_preload_threshold(),
            total_rows: default_total_rows(),
            request_timeout_ms: default_request_timeout_ms(),
            min_thumb: default_min_thumb(),
            min_panel_width: default_min_panel_width(),
            columns: default_columns(),
        }
    }
}

impl TableConfig {
    /// Load configuration from a JSON file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        let config: TableConfig =
            serde_json::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// JSON schema describing the configuration file
    pub fn json_schema() -> Result<String, ConfigError> {
        let schema = schemars::schema_for!(TableConfig);
        serde_json::to_string_pretty(&schema).map_err(|e| ConfigError::SerializeError(e.to_string()))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_url.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "api_url cannot be empty".to_string(),
            ));
        }

        if self.limit == 0 {
            return Err(ConfigError::ValidationError(
                "limit must be greater than 0".to_string(),
            ));
        }

        if !self.row_height.is_finite() || self.row_height <= 0.0 {
            return Err(ConfigError::ValidationError(
                "row_height must be a positive number".to_string(),
            ));
        }

        // A threshold below one page would evict the page just loaded
        if (self.cleanup_threshold as u64) < self.limit {
            return Err(ConfigError::ValidationError(format!(
                "cleanup_threshold ({}) must be >= limit ({})",
                self.cleanup_threshold, self.limit
            )));
        }

        let mut seen = HashSet::new();
        for column in &self.columns {
            if column.key.is_empty() {
                return Err(ConfigError::ValidationError(
                    "column key cannot be empty".to_string(),
                ));
            }
            if !seen.insert(column.key.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "duplicate column key '{}'",
                    column.key
                )));
            }
        }

        Ok(())
    }
}

/// Configuration error types
#[derive(Debug)]
pub enum ConfigError {
    IoError(String),
    ParseError(String),
    SerializeError(String),
    ValidationError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(msg) => write!(f, "IO error: {msg}"),
            ConfigError::ParseError(msg) => write!(f, "Parse error: {msg}"),
            ConfigError::SerializeError(msg) => write!(f, "Serialize error: {msg}"),
            ConfigError::ValidationError(msg) => write!(f, "Validation error: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}
