//! Configuration loading and root folder resolution
//!
//! Bootstrap configuration follows a four-tier priority order:
//! 1. Command-line argument (highest priority, applied by the binary)
//! 2. Environment variable
//! 3. TOML config file
//! 4. OS-dependent compiled default (fallback)
//!
//! A missing TOML file is not an error: defaults are used and the binary
//! logs a warning once tracing is initialized. A TOML file that exists but cannot be parsed is an error.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// File name of the SQLite database inside the root folder
pub const DATABASE_FILE_NAME: &str = "hireflow.db";

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "HIREFLOW_CONFIG";

/// Environment variables consulted for the root folder, in priority order
pub const ROOT_FOLDER_ENV_VARS: [&str; 2] = ["HIREFLOW_ROOT_FOLDER", "HIREFLOW_ROOT"];

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TomlConfig {
    /// Data directory holding the database file
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    /// Interface the HTTP server binds to
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub sla: SlaSweepConfig,

    #[serde(default)]
    pub calendar: CalendarConfig,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            root_folder: None,
            bind_addr: default_bind_addr(),
            port: default_port(),
            logging: LoggingConfig::default(),
            auth: AuthConfig::default(),
            sla: SlaSweepConfig::default(),
            calendar: CalendarConfig::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
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

/// Access token configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    /// Token signing secret. When absent a random secret is generated once
    /// and persisted in the settings table.
    #[serde(default)]
    pub token_secret: Option<String>,

    /// Lifetime of issued access tokens
    #[serde(default = "default_token_ttl_hours")]
    pub token_ttl_hours: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_secret: None,
            token_ttl_hours: default_token_ttl_hours(),
        }
    }
}

/// Background SLA sweep configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SlaSweepConfig {
    /// Seconds between sweeps; 0 disables the sweeper
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

impl Default for SlaSweepConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

/// OAuth client credentials for a calendar provider
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OAuthClientConfig {
    pub client_id: String,
    pub client_secret: String,
    /// Directory tenant (Microsoft only)
    #[serde(default = "default_tenant")]
    pub tenant: String,
}

/// Calendar integration configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CalendarConfig {
    /// OAuth redirect URL registered with the providers
    #[serde(default)]
    pub redirect_url: Option<String>,

    #[serde(default)]
    pub google: Option<OAuthClientConfig>,

    #[serde(default)]
    pub microsoft: Option<OAuthClientConfig>,

    /// First bookable hour of the day (UTC)
    #[serde(default = "default_working_hours_start")]
    pub working_hours_start: u32,

    /// Hour at which bookable time ends (UTC, exclusive)
    #[serde(default = "default_working_hours_end")]
    pub working_hours_end: u32,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            redirect_url: None,
            google: None,
            microsoft: None,
            working_hours_start: default_working_hours_start(),
            working_hours_end: default_working_hours_end(),
        }
    }
}

fn default_bind_addr() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5780
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_token_ttl_hours() -> i64 {
    12
}

fn default_sweep_interval_secs() -> u64 {
    900
}

fn default_tenant() -> String {
    "common".to_string()
}

fn default_working_hours_start() -> u32 {
    9
}

fn default_working_hours_end() -> u32 {
    17
}

impl TomlConfig {
    /// Parse configuration from TOML text and validate it
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: TomlConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make the service misbehave at runtime
    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            return Err(Error::Config("port must be non-zero".to_string()));
        }
        if self.auth.token_ttl_hours < 1 {
            return Err(Error::Config(
                "auth.token_ttl_hours must be at least 1".to_string(),
            ));
        }
        if let Some(secret) = &self.auth.token_secret {
            if secret.len() < 16 {
                return Err(Error::Config(
                    "auth.token_secret must be at least 16 characters".to_string(),
                ));
            }
        }
        let cal = &self.calendar;
        if cal.working_hours_start >= cal.working_hours_end || cal.working_hours_end > 24 {
            return Err(Error::Config(format!(
                "calendar working hours {}..{} are invalid",
                cal.working_hours_start, cal.working_hours_end
            )));
        }
        Ok(())
    }
}

/// A loaded configuration and the file it came from
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: TomlConfig,
    /// `None` when built-in defaults were used
    pub path: Option<PathBuf>,
}

impl LoadedConfig {
    /// Report where the configuration came from
    ///
    /// Loading runs before the subscriber exists, so the binary calls this
    /// once logging is up.
    pub fn log_source(&self) {
        match &self.path {
            Some(path) => info!("Loaded configuration from {}", path.display()),
            None => warn!("No configuration file found, using built-in defaults"),
        }
    }
}

/// Load the TOML configuration
///
/// Search order: explicit path, `$HIREFLOW_CONFIG`, the user config
/// directory, then `/etc/hireflow/hireflow.toml` on Linux. Falls back to
/// defaults when no file exists.
pub fn load_toml_config(explicit_path: Option<&Path>) -> Result<LoadedConfig> {
    let Some(path) = locate_config_file(explicit_path) else {
        return Ok(LoadedConfig {
            config: TomlConfig::default(),
            path: None,
        });
    };

    let content = std::fs::read_to_string(&path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    let config = TomlConfig::from_toml_str(&content)?;
    Ok(LoadedConfig {
        config,
        path: Some(path),
    })
}

/// Find the first existing config file candidate
fn locate_config_file(explicit_path: Option<&Path>) -> Option<PathBuf> {
    let mut candidates = Vec::new();

    if let Some(path) = explicit_path {
        candidates.push(path.to_path_buf());
    }
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        candidates.push(PathBuf::from(path));
    }
    if let Some(dir) = dirs::config_dir() {
        candidates.push(dir.join("hireflow").join("hireflow.toml"));
    }
    if cfg!(target_os = "linux") {
        candidates.push(PathBuf::from("/etc/hireflow/hireflow.toml"));
    }

    candidates.into_iter().find(|p| {
        if p.exists() {
            true
        } else {
            tracing::debug!("Config candidate not present: {}", p.display());
            false
        }
    })
}

/// Resolve the root folder following the four-tier priority order
pub fn resolve_root_folder(cli_arg: Option<&Path>, toml_config: &TomlConfig) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    // Priority 2: Environment variables
    for var in ROOT_FOLDER_ENV_VARS {
        if let Ok(path) = std::env::var(var) {
            if !path.trim().is_empty() {
                return PathBuf::from(path);
            }
        }
    }

    // Priority 3: TOML config file
    if let Some(path) = &toml_config.root_folder {
        return path.clone();
    }

    // Priority 4: OS-dependent compiled default
    default_root_folder()
}

/// OS-dependent default root folder path
pub fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("hireflow"))
        .unwrap_or_else(|| PathBuf::from("./hireflow_data"))
}

/// Database path inside a root folder
pub fn database_path(root_folder: &Path) -> PathBuf {
    root_folder.join(DATABASE_FILE_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = TomlConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.port, 5780);
        assert_eq!(config.bind_addr, "127.0.0.1");
        assert_eq!(config.auth.token_ttl_hours, 12);
        assert_eq!(config.sla.sweep_interval_secs, 900);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config = TomlConfig::from_toml_str("port = 6000\n[logging]\nlevel = \"debug\"\n")
            .unwrap();
        assert_eq!(config.port, 6000);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.calendar.working_hours_start, 9);
        assert!(config.calendar.google.is_none());
    }

    #[test]
    fn test_microsoft_tenant_defaults_to_common() {
        let config = TomlConfig::from_toml_str(
            "[calendar.microsoft]\nclient_id = \"id\"\nclient_secret = \"secret\"\n",
        )
        .unwrap();
        assert_eq!(config.calendar.microsoft.unwrap().tenant, "common");
    }

    #[test]
    fn test_malformed_toml_is_config_error() {
        let err = TomlConfig::from_toml_str("port = \"not a number\"").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_invalid_working_hours_rejected() {
        let err = TomlConfig::from_toml_str(
            "[calendar]\nworking_hours_start = 18\nworking_hours_end = 9\n",
        )
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_short_token_secret_rejected() {
        let err = TomlConfig::from_toml_str("[auth]\ntoken_secret = \"short\"\n").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_database_path_joins_file_name() {
        let path = database_path(Path::new("/tmp/hf"));
        assert_eq!(path, PathBuf::from("/tmp/hf/hireflow.db"));
    }
}
