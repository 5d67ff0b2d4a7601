//! TOML configuration with `PROMPTDESK_*` environment overrides.
//!
//! Every setting can be given in the file, left to its default, or replaced
//! by an environment variable. Which settings came from the environment is
//! remembered in [`EnvOverrides`] so `status`-style output can say so.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Setting key (`section.field`) to the variable that replaced it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvOverrides {
    applied: BTreeMap<&'static str, &'static str>,
}

impl EnvOverrides {
    pub fn is_overridden(&self, key: &str) -> bool {
        self.applied.contains_key(key)
    }

    /// Variable that supplied `key`, if any.
    pub fn source_of(&self, key: &str) -> Option<&'static str> {
        self.applied.get(key).copied()
    }

    /// `(key, variable)` pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &'static str)> + '_ {
        self.applied.iter().map(|(k, v)| (*k, *v))
    }

    pub fn is_empty(&self) -> bool {
        self.applied.is_empty()
    }

    /// Replace `slot` with the parsed value of `var` when it is set and parses.
    fn apply<T>(
        &mut self,
        key: &'static str,
        var: &'static str,
        slot: &mut T,
        parse: impl FnOnce(&str) -> Option<T>,
    ) {
        let Ok(raw) = std::env::var(var) else { return };
        match parse(&raw) {
            Some(value) => {
                *slot = value;
                self.applied.insert(key, var);
            }
            None => tracing::warn!(var, value = %raw, "Ignoring unparsable environment override"),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(skip)]
    pub env_overrides: EnvOverrides,
}

/// `[api]`: where the backend lives and how long to wait for it.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            timeout_secs: 30,
            connect_timeout_secs: 10,
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// `[storage]`: which backend holds the session and workspace preference.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Directory for the file backend.
    pub dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            dir: default_storage_dir(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    File,
    Keyring,
    Memory,
}

impl StorageBackend {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Keyring => "keyring",
            Self::Memory => "memory",
        }
    }
}

impl std::fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [Self::File, Self::Keyring, Self::Memory]
            .into_iter()
            .find(|b| b.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("Unknown storage backend '{s}'. Use file, keyring or memory"))
    }
}

/// `[session]`
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    /// How long before `expires_at` the refresh timer fires.
    pub refresh_lead_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            refresh_lead_secs: 300,
        }
    }
}

impl SessionConfig {
    pub fn refresh_lead(&self) -> Duration {
        Duration::from_secs(self.refresh_lead_secs)
    }
}

/// `[logging]`. `RUST_LOG` still wins over `level`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// `$XDG_DATA_HOME/promptdesk`, else `~/.local/share/promptdesk`.
fn default_storage_dir() -> PathBuf {
    let base = match std::env::var_os("XDG_DATA_HOME") {
        Some(dir) => PathBuf::from(dir),
        None => std::env::var_os("HOME")
            .map(|home| PathBuf::from(home).join(".local/share"))
            .unwrap_or_else(|| PathBuf::from(".")),
    };
    base.join("promptdesk")
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl Config {
    /// Read `path` (defaults if it does not exist), apply environment
    /// overrides, then validate.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = match std::fs::read_to_string(path) {
            Ok(text) => toml::from_str::<Config>(&text)
                .map_err(|e| anyhow::anyhow!("Invalid config file {}: {e}", path.display()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(path = %path.display(), "No config file, using defaults");
                Self::default()
            }
            Err(e) => anyhow::bail!("Cannot read config file {}: {e}", path.display()),
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Write the file-level settings (overrides excluded) as TOML.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let text = toml::to_string_pretty(self)?;
        std::fs::write(path, text)?;
        Ok(())
    }

    /// Catch settings that would otherwise only fail at request time.
    pub fn validate(&self) -> anyhow::Result<()> {
        let url = url::Url::parse(&self.api.base_url)
            .map_err(|e| anyhow::anyhow!("Invalid api.base_url '{}': {e}", self.api.base_url))?;
        if !matches!(url.scheme(), "http" | "https") {
            anyhow::bail!("api.base_url must be http or https, got '{}'", url.scheme());
        }
        if self.api.timeout_secs == 0 {
            anyhow::bail!("api.timeout_secs must be greater than zero");
        }
        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        let mut ov = EnvOverrides::default();

        ov.apply("api.base_url", "PROMPTDESK_API_URL", &mut self.api.base_url, |v| {
            Some(v.to_string())
        });
        ov.apply("api.timeout_secs", "PROMPTDESK_API_TIMEOUT", &mut self.api.timeout_secs, |v| {
            v.trim().parse().ok()
        });
        ov.apply(
            "api.connect_timeout_secs",
            "PROMPTDESK_API_CONNECT_TIMEOUT",
            &mut self.api.connect_timeout_secs,
            |v| v.trim().parse().ok(),
        );
        ov.apply("storage.backend", "PROMPTDESK_STORAGE_BACKEND", &mut self.storage.backend, |v| {
            v.parse().ok()
        });
        ov.apply("storage.dir", "PROMPTDESK_STORAGE_DIR", &mut self.storage.dir, |v| {
            Some(PathBuf::from(v))
        });
        ov.apply(
            "session.refresh_lead_secs",
            "PROMPTDESK_REFRESH_LEAD",
            &mut self.session.refresh_lead_secs,
            |v| v.trim().parse().ok(),
        );
        ov.apply("logging.level", "PROMPTDESK_LOG_LEVEL", &mut self.logging.level, |v| {
            Some(v.to_string())
        });
        ov.apply("logging.json", "PROMPTDESK_LOG_JSON", &mut self.logging.json, parse_flag);

        self.env_overrides = ov;
    }
}
