//! Pipeline configuration loading
//!
//! Configuration file resolution order:
//! 1. Explicit path (command-line `--config`)
//! 2. `HANJA_CONFIG` environment variable
//! 3. `<config_dir>/hanja/pipeline.toml` if it exists
//! 4. Built-in defaults (bundled reference tables, default ruleset)
//!
//! Individual values may then be overridden from the command line
//! (see [`ConfigOverrides`]). Everything the algorithms depend on (batch size,
//! error mode, source list, ruleset weights) comes from here; nothing is
//! hardcoded at the point of use.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "HANJA_CONFIG";

/// Complete pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// SQLite database holding the dictionary
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// Directory for stage batch files, results, checkpoint and report
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,

    /// Records per Load transaction
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Stage failure handling (abort the run, or record and continue)
    #[serde(default)]
    pub error_mode: ErrorMode,

    /// Worker threads for record-level parallel work
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Load records that failed validation (flagged) instead of skipping them
    #[serde(default)]
    pub include_invalid: bool,

    /// Maximum time to keep retrying a locked database write
    #[serde(default = "default_max_lock_wait_ms")]
    pub max_lock_wait_ms: u64,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub ruleset: RulesetConfig,

    #[serde(default = "default_sources")]
    pub sources: Vec<SourceConfig>,
}

/// Stage failure handling
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorMode {
    /// A fatal stage failure stops the run
    #[default]
    Abort,
    /// A fatal stage failure is recorded and later stages run on empty input
    Continue,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

/// Versioned conflict-resolution policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RulesetConfig {
    /// Version tag stamped on every resolved record
    #[serde(default = "default_ruleset_version")]
    pub version: String,

    /// Minimum accumulated weight for a unique top element to resolve automatically
    #[serde(default = "default_auto_threshold")]
    pub auto_threshold: f64,

    #[serde(default)]
    pub weights: MechanismWeights,

    /// Add stroke-count evidence when no source supplied it
    #[serde(default)]
    pub derive_stroke_element: bool,

    /// Add reading-sound evidence when no source supplied it
    #[serde(default)]
    pub derive_sound_element: bool,
}

impl Default for RulesetConfig {
    fn default() -> Self {
        Self {
            version: default_ruleset_version(),
            auto_threshold: default_auto_threshold(),
            weights: MechanismWeights::default(),
            derive_stroke_element: false,
            derive_sound_element: false,
        }
    }
}

/// Evidence weight per classification mechanism
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MechanismWeights {
    #[serde(default = "default_base_weight")]
    pub base: f64,
    #[serde(default = "default_expanded_weight")]
    pub expanded: f64,
    #[serde(default = "default_rule_weight")]
    pub stroke_rule: f64,
    #[serde(default = "default_rule_weight")]
    pub sound_rule: f64,
}

impl Default for MechanismWeights {
    fn default() -> Self {
        Self {
            base: default_base_weight(),
            expanded: default_expanded_weight(),
            stroke_rule: default_rule_weight(),
            sound_rule: default_rule_weight(),
        }
    }
}

/// Where a source's records come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Reference table compiled into the binary (`table` = "base" | "expanded")
    Bundled,
    /// JSON array of entries on disk (`path`)
    JsonFile,
    /// JSON array fetched over HTTP GET (`url`)
    Http,
}

/// One configured record source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Source identifier stamped on every record
    pub name: String,

    pub kind: SourceKind,

    #[serde(default)]
    pub table: Option<String>,

    #[serde(default)]
    pub path: Option<PathBuf>,

    #[serde(default)]
    pub url: Option<String>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Classification mechanism for entries that do not name one
    #[serde(default = "default_mechanism")]
    pub mechanism: String,

    /// Merge tie-break rank (lower wins)
    #[serde(default = "default_priority")]
    pub priority: u32,
}

fn default_database_path() -> PathBuf {
    default_data_dir().join("hanja.db")
}

fn default_work_dir() -> PathBuf {
    default_data_dir().join("pipeline")
}

fn default_batch_size() -> usize {
    100
}

fn default_workers() -> usize {
    4
}

fn default_max_lock_wait_ms() -> u64 {
    5000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_ruleset_version() -> String {
    "oheng-v1".to_string()
}

fn default_auto_threshold() -> f64 {
    0.5
}

fn default_base_weight() -> f64 {
    0.4
}

fn default_expanded_weight() -> f64 {
    0.4
}

fn default_rule_weight() -> f64 {
    0.3
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_mechanism() -> String {
    "base".to_string()
}

fn default_priority() -> u32 {
    100
}

fn default_sources() -> Vec<SourceConfig> {
    vec![
        SourceConfig {
            name: "base_table".to_string(),
            kind: SourceKind::Bundled,
            table: Some("base".to_string()),
            path: None,
            url: None,
            timeout_secs: default_timeout_secs(),
            mechanism: "base".to_string(),
            priority: 1,
        },
        SourceConfig {
            name: "expanded_table".to_string(),
            kind: SourceKind::Bundled,
            table: Some("expanded".to_string()),
            path: None,
            url: None,
            timeout_secs: default_timeout_secs(),
            mechanism: "expanded".to_string(),
            priority: 2,
        },
    ]
}

/// OS-dependent data directory for the database and work files
pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("hanja"))
        .unwrap_or_else(|| PathBuf::from("./hanja_data"))
}

/// Default config file location (may not exist)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("hanja").join("pipeline.toml"))
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            work_dir: default_work_dir(),
            batch_size: default_batch_size(),
            error_mode: ErrorMode::default(),
            workers: default_workers(),
            include_invalid: false,
            max_lock_wait_ms: default_max_lock_wait_ms(),
            logging: LoggingConfig::default(),
            ruleset: RulesetConfig::default(),
            sources: default_sources(),
        }
    }
}

impl PipelineConfig {
    /// Resolve and load configuration, then validate it
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let config = match resolve_config_path(explicit_path) {
            Some(path) => {
                let config = Self::from_file(&path)?;
                info!("Loaded configuration from {}", path.display());
                config
            }
            None => {
                info!("No configuration file found, using built-in defaults");
                Self::default()
            }
        };

        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML configuration file (no validation)
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML text (no validation)
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Failed to parse TOML: {}", e)))
    }

    /// Apply command-line overrides
    pub fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(path) = overrides.database_path {
            self.database_path = path;
        }
        if let Some(dir) = overrides.work_dir {
            self.work_dir = dir;
        }
        if let Some(level) = overrides.log_level {
            self.logging.level = level;
        }
        if let Some(mode) = overrides.error_mode {
            self.error_mode = mode;
        }
    }

    /// Check value domains; returns `Error::Config` naming the first problem
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(Error::Config("batch_size must be at least 1".to_string()));
        }
        if self.workers == 0 {
            return Err(Error::Config("workers must be at least 1".to_string()));
        }

        self.ruleset.validate()?;

        let mut seen = std::collections::HashSet::new();
        for source in &self.sources {
            if source.name.trim().is_empty() {
                return Err(Error::Config("source name must not be empty".to_string()));
            }
            if !seen.insert(source.name.as_str()) {
                return Err(Error::Config(format!("duplicate source name '{}'", source.name)));
            }
            let missing = match source.kind {
                SourceKind::Bundled => source.table.is_none().then_some("table"),
                SourceKind::JsonFile => source.path.is_none().then_some("path"),
                SourceKind::Http => source.url.is_none().then_some("url"),
            };
            if let Some(field) = missing {
                return Err(Error::Config(format!(
                    "source '{}' ({:?}) requires '{}'",
                    source.name, source.kind, field
                )));
            }
        }

        debug!(
            sources = self.sources.len(),
            ruleset = %self.ruleset.version,
            "Configuration validated"
        );
        Ok(())
    }
}

impl RulesetConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version.trim().is_empty() {
            return Err(Error::Config("ruleset.version must not be empty".to_string()));
        }
        if !(self.auto_threshold > 0.0 && self.auto_threshold <= 1.0) {
            return Err(Error::Config(format!(
                "ruleset.auto_threshold must be in (0, 1], got {}",
                self.auto_threshold
            )));
        }
        let weights = [
            ("base", self.weights.base),
            ("expanded", self.weights.expanded),
            ("stroke_rule", self.weights.stroke_rule),
            ("sound_rule", self.weights.sound_rule),
        ];
        for (name, weight) in weights {
            if !(0.0..=1.0).contains(&weight) {
                return Err(Error::Config(format!(
                    "ruleset.weights.{} must be in [0, 1], got {}",
                    name, weight
                )));
            }
        }
        Ok(())
    }
}

/// Command-line configuration overrides
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub database_path: Option<PathBuf>,
    pub work_dir: Option<PathBuf>,
    pub log_level: Option<String>,
    pub error_mode: Option<ErrorMode>,
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    default_config_path().filter(|path| path.exists())
}
