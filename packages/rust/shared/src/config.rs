//! Application configuration for docgraph.
//!
//! User config lives at `~/.docgraph/docgraph.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{DocGraphError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "docgraph.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".docgraph";

// ---------------------------------------------------------------------------
// Config structs (matching docgraph.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Graph store connection settings.
    #[serde(default)]
    pub store: StoreConfig,

    /// Pipeline behaviour.
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Collector settings.
    #[serde(default)]
    pub collector: CollectorConfig,
}

/// `[store]` section. Credentials are never read from the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Graph store address (`neo4j://...`, `bolt://...`, `libsql:<path>`).
    #[serde(default = "default_addr")]
    pub addr: String,

    /// Realm (database name) to connect to.
    #[serde(default = "default_realm")]
    pub realm: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            addr: default_addr(),
            realm: default_realm(),
        }
    }
}

fn default_addr() -> String {
    "neo4j://localhost:7687".into()
}
fn default_realm() -> String {
    "neo4j".into()
}

/// `[pipeline]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Capacity of the shared collector channel; full channels block collectors.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// When merged graphs are written to the store.
    #[serde(default)]
    pub merge_mode: MergeMode,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
            merge_mode: MergeMode::default(),
        }
    }
}

fn default_channel_capacity() -> usize {
    64
}

/// `[collector]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectorConfig {
    /// Interval between re-walks when polling.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval(),
        }
    }
}

fn default_poll_interval() -> u64 {
    1000
}

/// Granularity of graph store writes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MergeMode {
    /// One write per document, holding every graph ingested from it.
    #[default]
    PerDocument,
    /// One write per run, holding every graph ingested during the run.
    PerRun,
}

impl std::str::FromStr for MergeMode {
    type Err = DocGraphError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "per-document" => Ok(Self::PerDocument),
            "per-run" => Ok(Self::PerRun),
            other => Err(DocGraphError::validation(format!(
                "unknown merge mode '{other}': expected 'per-document' or 'per-run'"
            ))),
        }
    }
}

impl std::fmt::Display for MergeMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PerDocument => write!(f, "per-document"),
            Self::PerRun => write!(f, "per-run"),
        }
    }
}

// ---------------------------------------------------------------------------
// Flags and resolved options
// ---------------------------------------------------------------------------

/// Raw flag values for the `files` command, already merged with config values.
#[derive(Debug, Clone)]
pub struct RawFlags {
    pub db_addr: String,
    /// `user:pass`.
    pub creds: String,
    pub realm: String,
    pub poll: bool,
    pub poll_interval_ms: u64,
    pub merge_mode: String,
    pub channel_capacity: usize,
}

impl RawFlags {
    /// Start from config values; the CLI overrides fields it received.
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            db_addr: config.store.addr.clone(),
            creds: String::new(),
            realm: config.store.realm.clone(),
            poll: false,
            poll_interval_ms: config.collector.poll_interval_ms,
            merge_mode: config.pipeline.merge_mode.to_string(),
            channel_capacity: config.pipeline.channel_capacity,
        }
    }
}

/// Validated configuration for one ingestion run. Immutable once built.
#[derive(Clone)]
pub struct Options {
    pub db_addr: String,
    pub user: String,
    pub pass: String,
    pub realm: String,
    /// Path to the folder (or file) with documents to collect.
    pub path: PathBuf,
    pub poll: bool,
    pub poll_interval: Duration,
    pub merge_mode: MergeMode,
    pub channel_capacity: usize,
}

impl std::fmt::Debug for Options {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Options")
            .field("db_addr", &self.db_addr)
            .field("user", &self.user)
            .field("pass", &"<redacted>")
            .field("realm", &self.realm)
            .field("path", &self.path)
            .field("poll", &self.poll)
            .field("poll_interval", &self.poll_interval)
            .field("merge_mode", &self.merge_mode)
            .field("channel_capacity", &self.channel_capacity)
            .finish()
    }
}

/// Turn raw flag values and positional arguments into [`Options`].
///
/// Pure string handling: nothing touches the network or the filesystem.
pub fn validate_flags(flags: &RawFlags, args: &[String]) -> Result<Options> {
    let (user, pass) = match flags.creds.split(':').collect::<Vec<_>>().as_slice() {
        [user, pass] => (user.to_string(), pass.to_string()),
        _ => {
            return Err(DocGraphError::validation(
                "creds flag not in correct format user:pass",
            ));
        }
    };

    let path = match args {
        [path] => PathBuf::from(path),
        _ => {
            return Err(DocGraphError::validation(
                "expected positional argument for file_path",
            ));
        }
    };

    let merge_mode = flags.merge_mode.parse::<MergeMode>()?;

    if flags.channel_capacity == 0 {
        return Err(DocGraphError::validation(
            "channel capacity must be greater than zero",
        ));
    }

    Ok(Options {
        db_addr: flags.db_addr.clone(),
        user,
        pass,
        realm: flags.realm.clone(),
        path,
        poll: flags.poll,
        poll_interval: Duration::from_millis(flags.poll_interval_ms),
        merge_mode,
        channel_capacity: flags.channel_capacity,
    })
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.docgraph/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| DocGraphError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.docgraph/docgraph.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| DocGraphError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| DocGraphError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| DocGraphError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| DocGraphError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| DocGraphError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
