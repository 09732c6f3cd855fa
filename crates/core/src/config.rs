//! Configuration management for the Campus Assistant.
//!
//! This module handles loading and merging configuration from multiple sources:
//! - Built-in defaults
//! - Config files (.campus/config.yaml)
//! - Environment variables
//! - Command-line flags
//!
//! The configuration is workspace-centric, with index state stored in `.campus/`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{AppError, AppResult};

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (contains .campus/)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Index storage backend
    pub store: StoreBackend,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,

    /// Chunking, vector space and ranking settings
    pub retrieval: RetrievalSettings,
}

/// Where per-document indexes are persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Three files per document under `.campus/index/`
    #[default]
    Fs,
    /// One SQLite row per document in `.campus/index/index.sqlite`
    Sqlite,
}

impl StoreBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreBackend::Fs => "fs",
            StoreBackend::Sqlite => "sqlite",
        }
    }
}

impl fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StoreBackend {
    type Err = AppError;

    fn from_str(s: &str) -> AppResult<Self> {
        match s.to_ascii_lowercase().as_str() {
            "fs" | "file" | "files" => Ok(StoreBackend::Fs),
            "sqlite" => Ok(StoreBackend::Sqlite),
            other => Err(AppError::Config(format!(
                "Unknown store backend: {}. Supported: fs, sqlite",
                other
            ))),
        }
    }
}

/// Retrieval settings from config.yaml.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalSettings {
    /// Maximum characters per chunk
    #[serde(default = "default_chunk_size", rename = "chunkSize")]
    pub chunk_size: usize,

    /// Characters shared between neighbouring chunks (overlapping splitter only)
    #[serde(default = "default_chunk_overlap", rename = "chunkOverlap")]
    pub chunk_overlap: usize,

    /// Vocabulary cap for the fitted vector space
    #[serde(default = "default_max_features", rename = "maxFeatures")]
    pub max_features: usize,

    /// Default number of chunks returned by a query
    #[serde(default = "default_top_k", rename = "topK")]
    pub top_k: usize,
}

fn default_chunk_size() -> usize {
    1000
}

fn default_chunk_overlap() -> usize {
    200
}

fn default_max_features() -> usize {
    384
}

fn default_top_k() -> usize {
    3
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            max_features: default_max_features(),
            top_k: default_top_k(),
        }
    }
}

/// Full configuration file structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConfigFile {
    workspace: Option<WorkspaceConfig>,
    logging: Option<LoggingConfig>,
    store: Option<StoreBackend>,
    retrieval: Option<RetrievalSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WorkspaceConfig {
    path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingConfig {
    level: Option<String>,
    color: Option<bool>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            store: StoreBackend::default(),
            log_level: None,
            verbose: false,
            no_color: false,
            retrieval: RetrievalSettings::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, the YAML config file and environment variables.
    ///
    /// Environment variables:
    /// - `CAMPUS_WORKSPACE`: Override workspace path
    /// - `CAMPUS_CONFIG`: Path to config file
    /// - `CAMPUS_STORE`: Index store backend (`fs` or `sqlite`)
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    ///
    /// # Example
    /// ```no_run
    /// use campus_core::config::AppConfig;
    ///
    /// let config = AppConfig::load().expect("Failed to load config");
    /// println!("Index dir: {:?}", config.index_dir());
    /// ```
    pub fn load() -> AppResult<Self> {
        Self::load_from(None, None)
    }

    /// Like [`AppConfig::load`], with an explicit workspace and config file
    /// taking precedence over `CAMPUS_WORKSPACE` and `CAMPUS_CONFIG`.
    pub fn load_from(workspace: Option<PathBuf>, config_file: Option<PathBuf>) -> AppResult<Self> {
        let mut config = Self::default();

        let workspace =
            workspace.or_else(|| std::env::var("CAMPUS_WORKSPACE").ok().map(PathBuf::from));
        if let Some(workspace) = workspace {
            config.workspace = workspace;
        }

        let config_file =
            config_file.or_else(|| std::env::var("CAMPUS_CONFIG").ok().map(PathBuf::from));
        if let Some(config_file) = config_file {
            config.config_file = Some(config_file);
        }

        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        let config_path = config
            .config_file
            .clone()
            .unwrap_or_else(|| config.campus_dir().join("config.yaml"));

        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
        }

        // Environment variables override YAML config
        if let Ok(store) = std::env::var("CAMPUS_STORE") {
            config.store = store.parse()?;
        }

        if let Ok(level) = std::env::var("RUST_LOG") {
            config.log_level = Some(level);
        }

        if std::env::var("NO_COLOR").is_ok() {
            config.no_color = true;
        }

        Ok(config)
    }

    /// Merge a YAML configuration file into this config.
    fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        self.merge_yaml_str(&contents)
            .map_err(|e| AppError::Config(format!("Failed to parse config file {:?}: {}", path, e)))
    }

    fn merge_yaml_str(&self, contents: &str) -> AppResult<Self> {
        let config_file: ConfigFile = serde_yaml::from_str(contents)?;

        let mut result = self.clone();

        if let Some(ws) = config_file.workspace {
            if let Some(path) = ws.path {
                result.workspace = PathBuf::from(path);
            }
        }

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
        }

        if let Some(store) = config_file.store {
            result.store = store;
        }

        if let Some(retrieval) = config_file.retrieval {
            result.retrieval = retrieval;
        }

        Ok(result)
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// Command-line flags take precedence over environment variables and
    /// the config file.
    pub fn with_overrides(
        mut self,
        workspace: Option<PathBuf>,
        config_file: Option<PathBuf>,
        store: Option<StoreBackend>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
    ) -> Self {
        if let Some(workspace) = workspace {
            self.workspace = workspace;
        }

        if let Some(config_file) = config_file {
            self.config_file = Some(config_file);
        }

        if let Some(store) = store {
            self.store = store;
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            // Verbose mode implies debug logging
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        self
    }

    /// Get the path to the .campus directory.
    pub fn campus_dir(&self) -> PathBuf {
        self.workspace.join(".campus")
    }

    /// Directory holding persisted document indexes.
    pub fn index_dir(&self) -> PathBuf {
        self.campus_dir().join("index")
    }

    /// Ensure the .campus directory exists.
    pub fn ensure_campus_dir(&self) -> AppResult<()> {
        let campus_dir = self.campus_dir();
        if !campus_dir.exists() {
            std::fs::create_dir_all(&campus_dir).map_err(|e| {
                AppError::Config(format!("Failed to create .campus directory: {}", e))
            })?;
        }
        Ok(())
    }

    /// Validate retrieval settings.
    pub fn validate(&self) -> AppResult<()> {
        let r = &self.retrieval;

        if r.chunk_size == 0 {
            return Err(AppError::Config("chunkSize must be greater than 0".to_string()));
        }

        if r.chunk_overlap >= r.chunk_size {
            return Err(AppError::Config(format!(
                "chunkOverlap ({}) must be smaller than chunkSize ({})",
                r.chunk_overlap, r.chunk_size
            )));
        }

        if r.max_features == 0 {
            return Err(AppError::Config(
                "maxFeatures must be greater than 0".to_string(),
            ));
        }

        if r.top_k == 0 {
            return Err(AppError::Config("topK must be greater than 0".to_string()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.store, StoreBackend::Fs);
        assert_eq!(config.retrieval.chunk_size, 1000);
        assert_eq!(config.retrieval.chunk_overlap, 200);
        assert_eq!(config.retrieval.max_features, 384);
        assert_eq!(config.retrieval.top_k, 3);
        assert!(!config.verbose);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_index_dir() {
        let config = AppConfig::default();
        assert!(config.index_dir().ends_with(".campus/index"));
    }

    #[test]
    fn test_with_overrides() {
        let config = AppConfig::default();
        let overridden = config.with_overrides(
            Some(PathBuf::from("/tmp/ws")),
            None,
            Some(StoreBackend::Sqlite),
            None,
            true,
            false,
        );

        assert_eq!(overridden.workspace, PathBuf::from("/tmp/ws"));
        assert_eq!(overridden.store, StoreBackend::Sqlite);
        assert!(overridden.verbose);
        assert_eq!(overridden.log_level, Some("debug".to_string()));
    }

    #[test]
    fn test_merge_yaml_partial_retrieval() {
        let yaml = r#"
store: sqlite
logging:
  level: warn
  color: false
retrieval:
  chunkSize: 500
"#;
        let merged = AppConfig::default().merge_yaml_str(yaml).unwrap();
        assert_eq!(merged.store, StoreBackend::Sqlite);
        assert_eq!(merged.log_level, Some("warn".to_string()));
        assert!(merged.no_color);
        assert_eq!(merged.retrieval.chunk_size, 500);
        // Unset keys fall back to defaults
        assert_eq!(merged.retrieval.max_features, 384);
    }

    #[test]
    fn test_merge_yaml_from_file() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("config.yaml");
        std::fs::write(&path, "retrieval:\n  topK: 5\n").unwrap();

        let merged = AppConfig::default().merge_yaml(&path).unwrap();
        assert_eq!(merged.retrieval.top_k, 5);
    }

    #[test]
    fn test_store_backend_parse() {
        assert_eq!("fs".parse::<StoreBackend>().unwrap(), StoreBackend::Fs);
        assert_eq!("SQLite".parse::<StoreBackend>().unwrap(), StoreBackend::Sqlite);
        assert!("redis".parse::<StoreBackend>().is_err());
    }

    #[test]
    fn test_validate_overlap() {
        let mut config = AppConfig::default();
        config.retrieval.chunk_overlap = config.retrieval.chunk_size;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_zero_features() {
        let mut config = AppConfig::default();
        config.retrieval.max_features = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_explicit_config_file() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("custom.yaml");
        std::fs::write(&path, "retrieval:\n  topK: 7\n").unwrap();

        let config = AppConfig::load_from(Some(temp.path().to_path_buf()), Some(path)).unwrap();
        assert_eq!(config.workspace, temp.path());
        assert_eq!(config.retrieval.top_k, 7);
    }

    #[test]
    fn test_load_from_missing_workspace() {
        let result = AppConfig::load_from(Some(PathBuf::from("/nonexistent/campus/ws")), None);
        assert!(matches!(result, Err(AppError::Config(_))));
    }
}
