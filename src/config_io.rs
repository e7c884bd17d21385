//! Locating and loading configuration for the terminal host.

use crate::config::{ConfigError, TableConfig};
use std::path::{Path, PathBuf};

/// Directory paths for table state and configuration
///
/// Only the top-level `main` function should use `dirs::*` to construct this;
/// all other code receives it by parameter passing so tests can point it at a
/// temp directory.
#[derive(Debug, Clone)]
pub struct DirectoryContext {
    /// Persistent state (column settings, logs)
    /// e.g., ~/.local/share/telemetry-table on Linux
    pub data_dir: PathBuf,

    /// User configuration
    /// e.g., ~/.config/telemetry-table on Linux
    pub config_dir: PathBuf,
}

impl DirectoryContext {
    /// Create a DirectoryContext from the system directories
    /// This should ONLY be called from main()
    pub fn from_system() -> std::io::Result<Self> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| {
                std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "Could not determine data directory",
                )
            })?
            .join("telemetry-table");

        let config_dir = dirs::config_dir()
            .ok_or_else(|| {
                std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "Could not determine config directory",
                )
            })?
            .join("telemetry-table");

        Ok(Self {
            data_dir,
            config_dir,
        })
    }

    /// Create a DirectoryContext rooted in a temp directory
    pub fn for_testing(temp_dir: &Path) -> Self {
        Self {
            data_dir: temp_dir.join("data"),
            config_dir: temp_dir.join("config"),
        }
    }

    /// Get the config file path
    pub fn config_path(&self) -> PathBuf {
        self.config_dir.join("config.json")
    }

    /// Get the column settings file path
    pub fn column_settings_path(&self) -> PathBuf {
        self.data_dir.join("columns.json")
    }

    /// Get the default log file path
    pub fn log_path(&self) -> PathBuf {
        self.data_dir.join("telemetry-table.log")
    }
}

/// Resolve the effective configuration.
///
/// An explicit path must exist and parse. Without one, the user config file
/// is used when present, otherwise the built-in defaults.
pub fn resolve_config(
    dir_context: &DirectoryContext,
    explicit: Option<&Path>,
) -> Result<TableConfig, ConfigError> {
    if let Some(path) = explicit {
        tracing::info!("Loading config from {}", path.display());
        return TableConfig::load_from_file(path);
    }

    let user_path = dir_context.config_path();
    if user_path.exists() {
        tracing::info!("Loading user config from {}", user_path.display());
        return TableConfig::load_from_file(&user_path);
    }

    tracing::debug!("No config file found, using defaults");
    Ok(TableConfig::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_paths_are_under_context() {
        let temp_dir = TempDir::new().unwrap();
        let ctx = DirectoryContext::for_testing(temp_dir.path());
        assert!(ctx.config_path().starts_with(temp_dir.path()));
        assert!(ctx.column_settings_path().ends_with("data/columns.json"));
    }

    #[test]
    fn test_resolve_defaults_without_files() {
        let temp_dir = TempDir::new().unwrap();
        let ctx = DirectoryContext::for_testing(temp_dir.path());
        assert_eq!(resolve_config(&ctx, None).unwrap(), TableConfig::default());
    }

    #[test]
    fn test_resolve_prefers_user_file() {
        let temp_dir = TempDir::new().unwrap();
        let ctx = DirectoryContext::for_testing(temp_dir.path());
        std::fs::create_dir_all(&ctx.config_dir).unwrap();
        std::fs::write(ctx.config_path(), r#"{"buffer": 5}"#).unwrap();

        let config = resolve_config(&ctx, None).unwrap();
        assert_eq!(config.buffer, 5);
    }

    #[test]
    fn test_resolve_explicit_missing_is_error() {
        let temp_dir = TempDir::new().unwrap();
        let ctx = DirectoryContext::for_testing(temp_dir.path());
        let missing = temp_dir.path().join("nope.json");
        assert!(resolve_config(&ctx, Some(&missing)).is_err());
    }
}
