use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

const ENV_PREFIX: &str = "GOCOAX_";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Clone, Serialize, Deserialize, Default)]
pub struct DeviceConfig {
    #[serde(default)]
    pub name: String,
    /// `host` or `host:port`; port 80 is assumed when omitted.
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub username: String,
    #[serde(default, skip_serializing)]
    pub password: String,
}

impl fmt::Debug for DeviceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceConfig")
            .field("name", &self.name)
            .field("address", &self.address)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// `host:port`, or `:port` for all interfaces.
    #[serde(default = "default_listen_address")]
    pub listen_address: String,
    /// Per-device scrape timeout in seconds.
    #[serde(default = "default_scrape_timeout")]
    pub scrape_timeout: u64,
    #[serde(default)]
    pub devices: Vec<DeviceConfig>,
}

fn default_listen_address() -> String {
    ":9090".to_string()
}

fn default_scrape_timeout() -> u64 {
    10
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_address: default_listen_address(),
            scrape_timeout: default_scrape_timeout(),
            devices: Vec::new(),
        }
    }
}

impl Config {
    /// Read, apply environment overrides, and validate.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&content, |key| std::env::var(key).ok())
    }

    /// Parse YAML with an explicit environment lookup.
    pub fn from_yaml<F>(content: &str, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config: Config = serde_yaml::from_str(content)?;
        if config.listen_address.is_empty() {
            config.listen_address = default_listen_address();
        }
        if config.scrape_timeout == 0 {
            config.scrape_timeout = default_scrape_timeout();
        }
        config.apply_env(env);
        config.validate()?;
        Ok(config)
    }

    fn apply_env<F>(&mut self, env: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| env(&format!("{ENV_PREFIX}{key}")).filter(|v| !v.is_empty());

        if let Some(addr) = var("LISTEN_ADDRESS") {
            self.listen_address = addr;
        }
        if let Some(timeout) = var("SCRAPE_TIMEOUT") {
            match timeout.parse::<u64>() {
                Ok(t) if t > 0 => self.scrape_timeout = t,
                _ => tracing::warn!(value = %timeout, "Ignoring invalid GOCOAX_SCRAPE_TIMEOUT"),
            }
        }

        for (i, device) in self.devices.iter_mut().enumerate() {
            let field = |name: &str| var(&format!("DEVICE_{i}_{name}"));
            if let Some(name) = field("NAME") {
                device.name = name;
            }
            if let Some(address) = field("ADDRESS") {
                device.address = address;
            }
            if let Some(username) = field("USERNAME") {
                device.username = username;
            }
            if let Some(password) = field("PASSWORD") {
                device.password = password;
            }
        }
    }

    /// Check required fields and normalize device addresses to `host:port`.
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        if self.devices.is_empty() {
            return Err(invalid("at least one device must be configured"));
        }
        if self.scrape_timeout < 1 {
            return Err(invalid("scrape_timeout must be at least 1 second"));
        }

        for (i, device) in self.devices.iter_mut().enumerate() {
            if device.name.is_empty() {
                return Err(invalid(format!("device {i}: name is required")));
            }
            let name = device.name.clone();
            if device.address.is_empty() {
                return Err(invalid(format!("device {i} ({name}): address is required")));
            }
            if !device.address.contains(':') {
                device.address.push_str(":80");
            }

            let (host, port) = device
                .address
                .rsplit_once(':')
                .ok_or_else(|| invalid(format!("device {i} ({name}): invalid address format")))?;
            // IPv6 hosts must be bracketed, as in `[::1]:80`.
            let host = match host.strip_prefix('[') {
                Some(inner) => inner.strip_suffix(']').ok_or_else(|| {
                    invalid(format!("device {i} ({name}): missing ']' in address"))
                })?,
                None if host.contains(':') => {
                    return Err(invalid(format!(
                        "device {i} ({name}): too many colons in address"
                    )))
                }
                None => host,
            };
            if host.is_empty() {
                return Err(invalid(format!("device {i} ({name}): empty hostname")));
            }
            match port.parse::<u16>() {
                Ok(p) if p >= 1 => {}
                _ => return Err(invalid(format!("device {i} ({name}): invalid port number"))),
            }

            if device.username.is_empty() {
                return Err(invalid(format!("device {i} ({name}): username is required")));
            }
            if device.password.is_empty() {
                return Err(invalid(format!("device {i} ({name}): password is required")));
            }
        }

        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.scrape_timeout)
    }

    /// Socket address to bind; a bare `:port` listens on every interface.
    pub fn bind_address(&self) -> String {
        if self.listen_address.starts_with(':') {
            format!("0.0.0.0{}", self.listen_address)
        } else {
            self.listen_address.clone()
        }
    }
}

fn invalid(msg: impl Into<String>) -> ConfigError {
    ConfigError::Invalid(msg.into())
}
