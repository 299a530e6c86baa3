//! Configuration for the broker server.
//!
//! Loaded in order of precedence:
//! 1. Environment variables (highest priority)
//! 2. Config file (`~/.config/horde-broker/config.toml`)
//! 3. Built-in defaults (lowest priority)

use serde::Deserialize;
use std::net::SocketAddr;
use std::path::PathBuf;

mod observability;

#[cfg(test)]
mod tests;

pub use observability::{FileLogging, LogRotation, LoggingConfig};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the HTTP API binds to.
    pub bind_addr: SocketAddr,

    /// Directory holding `users.json`, `servers.json`, `stats.json`.
    pub db_dir: PathBuf,

    /// Whether unauthenticated requests are served as the anonymous user.
    pub allow_anonymous: bool,

    /// How often the store is snapshotted to `db_dir`.
    pub snapshot_interval_secs: u64,

    /// How often the stale-prompt sweeper runs.
    pub stale_prompt_sweep_secs: u64,

    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:7001".parse().unwrap(),
            db_dir: PathBuf::from("./db"),
            allow_anonymous: true,
            snapshot_interval_secs: 3,
            stale_prompt_sweep_secs: 10,
            logging: LoggingConfig::default(),
        }
    }
}

/// Config file structure (subset of `Config` that makes sense to persist).
#[derive(Debug, Deserialize, Default)]
pub(crate) struct FileConfig {
    pub bind_addr: Option<String>,
    pub db_dir: Option<String>,
    pub allow_anonymous: Option<bool>,
    pub snapshot_interval_secs: Option<u64>,
    pub stale_prompt_sweep_secs: Option<u64>,
    pub logging: Option<FileLogging>,
}

impl Config {
    /// `~/.config/horde-broker/config.toml`.
    pub fn config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|p| p.join(".config").join("horde-broker").join("config.toml"))
    }

    /// Write a default config file if none exists yet.
    pub fn ensure_config_exists() {
        let Some(path) = Self::config_path() else {
            return;
        };
        if path.exists() {
            return;
        }
        if let Some(parent) = path.parent() {
            if std::fs::create_dir_all(parent).is_err() {
                return;
            }
        }
        let _ = std::fs::write(&path, Self::default().to_toml());
    }

    /// Loads the config file, if any.
    ///
    /// # Panics
    /// A present-but-unparseable config file is a fatal, fail-fast error
    /// rather than a silent fall-back to defaults.
    fn load_file_config() -> FileConfig {
        let Some(path) = Self::config_path() else {
            return FileConfig::default();
        };

        match std::fs::read_to_string(&path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("CONFIG ERROR: failed to parse {}", path.display());
                    eprintln!("  {}", e);
                    eprintln!("  To reset, delete the file and restart.");
                    std::process::exit(1);
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => FileConfig::default(),
            Err(e) => {
                eprintln!("CONFIG ERROR: cannot read {}: {}", path.display(), e);
                std::process::exit(1);
            }
        }
    }

    /// Loads configuration: env > file > defaults.
    pub fn from_env() -> Self {
        let file = Self::load_file_config();
        let defaults = Self::default();

        let bind_addr = std::env::var("HORDE_BIND")
            .ok()
            .or(file.bind_addr)
            .map(|s| s.parse().expect("invalid bind address"))
            .unwrap_or(defaults.bind_addr);

        let db_dir = std::env::var("HORDE_DB_DIR")
            .ok()
            .or(file.db_dir)
            .map(PathBuf::from)
            .unwrap_or(defaults.db_dir);

        let allow_anonymous = std::env::var("HORDE_ALLOW_ANONYMOUS")
            .ok()
            .and_then(|v| v.parse().ok())
            .or(file.allow_anonymous)
            .unwrap_or(defaults.allow_anonymous);

        let snapshot_interval_secs = std::env::var("HORDE_SNAPSHOT_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .or(file.snapshot_interval_secs)
            .unwrap_or(defaults.snapshot_interval_secs);

        let stale_prompt_sweep_secs = std::env::var("HORDE_STALE_SWEEP_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .or(file.stale_prompt_sweep_secs)
            .unwrap_or(defaults.stale_prompt_sweep_secs);

        let logging = LoggingConfig::from_file(file.logging);

        Self {
            bind_addr,
            db_dir,
            allow_anonymous,
            snapshot_interval_secs,
            stale_prompt_sweep_secs,
            logging,
        }
    }

    /// Serialize to TOML; the single source of truth for the config file
    /// template written by `ensure_config_exists`/`config --reset`.
    pub fn to_toml(&self) -> String {
        format!(
            r#"# horde-broker configuration

bind_addr = "{bind_addr}"
db_dir = "{db_dir}"
allow_anonymous = {allow_anonymous}
snapshot_interval_secs = {snapshot_interval_secs}
stale_prompt_sweep_secs = {stale_prompt_sweep_secs}

[logging]
level = "{level}"
file_enabled = {file_enabled}
file_dir = "{file_dir}"
file_rotation = "{file_rotation}"
file_prefix = "{file_prefix}"
"#,
            bind_addr = self.bind_addr,
            db_dir = self.db_dir.display(),
            allow_anonymous = self.allow_anonymous,
            snapshot_interval_secs = self.snapshot_interval_secs,
            stale_prompt_sweep_secs = self.stale_prompt_sweep_secs,
            level = self.logging.level,
            file_enabled = self.logging.file_enabled,
            file_dir = self.logging.file_dir.display(),
            file_rotation = self.logging.file_rotation.as_str(),
            file_prefix = self.logging.file_prefix,
        )
    }
}
