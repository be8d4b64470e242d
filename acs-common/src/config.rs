//! Configuration loading and root folder resolution

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming the root folder
pub const ROOT_FOLDER_ENV: &str = "ACS_ROOT_FOLDER";

/// Database file name inside the root folder
pub const DATABASE_FILE: &str = "access_control.db";

/// Server settings read from the TOML config file
///
/// Every field has a default, so a missing or partial file still yields a
/// usable configuration.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct TomlConfig {
    /// Root folder holding the database (overridden by CLI/env)
    pub root_folder: Option<PathBuf>,
    /// Address the HTTP server binds to
    pub bind_address: String,
    /// HTTP port
    pub port: u16,
    /// Seconds between SSE keepalive events
    pub keepalive_secs: u64,
    /// Events buffered per subscriber before a slow subscriber starts skipping
    pub event_capacity: usize,
    /// Default tracing filter when RUST_LOG is unset
    pub log_level: String,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            root_folder: None,
            bind_address: "0.0.0.0".to_string(),
            port: 3000,
            keepalive_secs: 15,
            event_capacity: 256,
            log_level: "info".to_string(),
        }
    }
}

impl TomlConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Invalid TOML: {}", e)))
    }

    /// Load configuration from an explicit path, or from the platform
    /// config locations when `path` is `None`.
    ///
    /// A missing file is not an error: defaults are returned with a warning.
    /// A file that exists but does not parse is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => match locate_config_file() {
                Ok(p) => p,
                Err(e) => {
                    warn!("{}; using default configuration", e);
                    return Ok(Self::default());
                }
            },
        };

        if !config_path.exists() {
            warn!(
                "Config file {} not found; using default configuration",
                config_path.display()
            );
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&config_path)?;
        let config = Self::from_toml_str(&content)?;
        info!("Loaded configuration from {}", config_path.display());
        Ok(config)
    }
}

/// Root folder resolution priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. TOML config file
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_root_folder(
    cli_arg: Option<&Path>,
    env_var_name: &str,
    config: &TomlConfig,
) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }

    // Priority 3: TOML config file
    if let Some(root_folder) = &config.root_folder {
        return root_folder.clone();
    }

    // Priority 4: OS-dependent compiled default
    default_root_folder()
}

/// Ensure the root folder exists and return the database path inside it
pub fn prepare_root_folder(root_folder: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(root_folder)?;
    Ok(root_folder.join(DATABASE_FILE))
}

/// Find the config file for the platform
fn locate_config_file() -> Result<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("acs").join("config.toml"));

    if let Some(path) = user_config {
        if path.exists() {
            return Ok(path);
        }
    }

    if cfg!(unix) {
        let system_config = PathBuf::from("/etc/acs/config.toml");
        if system_config.exists() {
            return Ok(system_config);
        }
    }

    Err(Error::Config("No config file found".to_string()))
}

/// Get OS-dependent default root folder path
fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/acs (or /var/lib/acs for system-wide)
        dirs::data_local_dir()
            .map(|d| d.join("acs"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/acs"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("acs"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/acs"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("acs"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\acs"))
    } else {
        PathBuf::from("./acs_data")
    }
}
