use std::{env, fs, path};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read { path: path::PathBuf, source: std::io::Error },
    #[error("failed to write {path}: {source}")]
    Write { path: path::PathBuf, source: std::io::Error },
    #[error("failed to parse {path}: {source}")]
    Parse { path: path::PathBuf, source: toml::de::Error },
    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("no usable configuration directory (set XDG_CONFIG_HOME or HOME)")]
    ConfigPathUnavailable,
    #[error("host entry {index} has an empty name")]
    EmptyHostName { index: usize },
}

/// One watched host. Immutable for the lifetime of the process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostSpec {
    /// Display name used in status records and digests.
    pub name: String,
    /// Hostname or IP address to probe.
    pub address: String,
    /// TCP services to test; empty means "skip port checks".
    #[serde(default)]
    pub ports: Vec<u16>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Schedule {
    /// Gap between cycle completions in repeating mode.
    pub check_interval_seconds: u64,
    /// Minimum gap enforced between two dispatched digests.
    pub email_interval_seconds: i64,
}

impl Default for Schedule {
    fn default() -> Self {
        Self { check_interval_seconds: 120, email_interval_seconds: 1800 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeSettings {
    /// ICMP echo requests sent per host per cycle.
    pub icmp_count: u32,
    /// Per-packet echo reply deadline.
    pub icmp_timeout_seconds: u64,
    /// TCP connect deadline per port.
    pub port_timeout_seconds: u64,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self { icmp_count: 3, icmp_timeout_seconds: 1, port_timeout_seconds: 5 }
    }
}

/// SMTP endpoint and addressing for digest delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Email {
    pub server: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    /// Digests are sent from `hostwatch@<sender_domain>`.
    pub sender_domain: String,
    pub recipients: Vec<String>,
}

impl Default for Email {
    fn default() -> Self {
        Self {
            server: "mail.example.com".into(),
            port: 587,
            user: String::new(),
            password: String::new(),
            sender_domain: "example.net".into(),
            recipients: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// Location of the local status database.
    pub path: String,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self { path: env::temp_dir().join("hostwatch.db").to_string_lossy().into_owned() }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub hosts: Vec<HostSpec>,
    pub schedule: Schedule,
    pub probe: ProbeSettings,
    pub email: Email,
    pub database: DatabaseSettings,
}

/// Used to ensure we are actually reading a toml file
fn normalize_toml_path(path: &path::Path) -> path::PathBuf {
    let mut path = path.to_path_buf();
    if path.extension().map(|ext| ext != "toml").unwrap_or(true) {
        path.set_extension("toml");
    }
    path
}

/// Get default config path ($XDG_CONFIG_HOME/hostwatch/config.toml or
/// $HOME/.config/...)
fn default_config_path() -> Result<path::PathBuf, ConfigError> {
    let path = if let Ok(config_home) = env::var("XDG_CONFIG_HOME") {
        path::PathBuf::from(config_home)
    } else if let Some(home_dir) = env::home_dir() {
        home_dir.join(".config")
    } else {
        return Err(ConfigError::ConfigPathUnavailable);
    };

    Ok(path.join("hostwatch/config.toml"))
}

impl Config {
    /// Generate Config structure from file
    ///
    /// Creates a default config in ~/.config/hostwatch/config.toml
    /// or the specified path, with the name config.toml, if one does not
    /// exist yet.
    pub fn from_config(optional_path: Option<impl AsRef<path::Path>>) -> Result<Self, ConfigError> {
        let config_path: path::PathBuf = if let Some(path) = optional_path {
            normalize_toml_path(path.as_ref())
        } else {
            default_config_path()?
        };

        let config = if config_path.exists() {
            let raw_string = fs::read_to_string(&config_path)
                .map_err(|source| ConfigError::Read { path: config_path.clone(), source })?;
            toml::from_str(raw_string.as_str())
                .map_err(|source| ConfigError::Parse { path: config_path.clone(), source })?
        } else {
            let config = Self::default();
            config.write_config(&config_path)?;
            config
        };

        config.validate()?;
        Ok(config)
    }

    /// Serialize and write a config to a file
    pub fn write_config(&self, path: &path::Path) -> Result<(), ConfigError> {
        let config_str: String = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|source| ConfigError::Write { path: path.to_path_buf(), source })?;
        }

        fs::write(path, config_str)
            .map_err(|source| ConfigError::Write { path: path.to_path_buf(), source })
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (index, host) in self.hosts.iter().enumerate() {
            if host.name.trim().is_empty() {
                return Err(ConfigError::EmptyHostName { index });
            }
        }
        Ok(())
    }
}
