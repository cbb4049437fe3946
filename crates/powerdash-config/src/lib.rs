//! Shared configuration for the powerdash CLI.
//!
//! TOML profiles, layered loading (defaults, file, `POWERDASH_*` env) and
//! translation to `powerdash_core::EngineConfig`. The CLI adds flag-aware
//! wrappers on top.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use powerdash_core::{AssetKind, EngineConfig, KindPorts, PortTable};

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named simulator profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,

    /// Per-kind socket geometry replacing the built-in table.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub ports: HashMap<AssetKind, KindPorts>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
            ports: HashMap::new(),
        }
    }
}

impl Config {
    /// Profile by name, falling back to `default_profile`.
    pub fn profile(&self, name: Option<&str>) -> Result<(String, &Profile), ConfigError> {
        let name = name
            .map(str::to_owned)
            .or_else(|| self.default_profile.clone())
            .unwrap_or_else(|| "default".into());
        self.profiles
            .get(&name)
            .map(|p| (name.clone(), p))
            .ok_or_else(|| ConfigError::Validation {
                field: "profile".into(),
                reason: format!("no profile named '{name}'"),
            })
    }

    /// Built-in port table with this config's overrides applied.
    pub fn port_table(&self) -> PortTable {
        let mut table = PortTable::default();
        for (kind, ports) in &self.ports {
            table.set(*kind, ports.clone());
        }
        table
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            timeout: default_timeout(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_timeout() -> u64 {
    30
}

/// A named simulator profile.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Profile {
    /// Simulator websocket URL (e.g., "ws://localhost:8000/simengine").
    pub url: String,

    /// Seconds between reconnect attempts.
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_secs: u64,

    /// Send `subscribe` + `get_sys_status` on every (re)connect.
    #[serde(default = "default_subscribe")]
    pub subscribe: bool,

    /// Override timeout.
    pub timeout: Option<u64>,
}

fn default_reconnect_delay() -> u64 {
    5
}
fn default_subscribe() -> bool {
    true
}

impl Profile {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            reconnect_delay_secs: default_reconnect_delay(),
            subscribe: default_subscribe(),
            timeout: None,
        }
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("io", "powerdash", "powerdash").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("powerdash");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from an explicit file, still layering `POWERDASH_*` env vars.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("POWERDASH_").split("_"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if the file doesn't exist.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(&config_path(), cfg)
}

pub fn save_config_to(path: &Path, cfg: &Config) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Engine config ───────────────────────────────────────────────────

/// Build an `EngineConfig` from a profile, no CLI flag overrides.
pub fn profile_to_engine_config(
    profile: &Profile,
    profile_name: &str,
    ports: PortTable,
) -> Result<EngineConfig, ConfigError> {
    let url: url::Url = profile.url.parse().map_err(|_| ConfigError::Validation {
        field: format!("profiles.{profile_name}.url"),
        reason: format!("invalid URL: {}", profile.url),
    })?;
    if !matches!(url.scheme(), "ws" | "wss") {
        return Err(ConfigError::Validation {
            field: format!("profiles.{profile_name}.url"),
            reason: format!("expected a ws:// or wss:// URL, got '{}'", url.scheme()),
        });
    }
    if profile.reconnect_delay_secs == 0 {
        return Err(ConfigError::Validation {
            field: format!("profiles.{profile_name}.reconnect_delay_secs"),
            reason: "must be at least 1".into(),
        });
    }

    let mut config = EngineConfig::new(url);
    config.reconnect_delay = Duration::from_secs(profile.reconnect_delay_secs);
    config.timeout = Duration::from_secs(profile.timeout.unwrap_or_else(default_timeout));
    config.subscribe = profile.subscribe;
    config.ports = ports;
    Ok(config)
}

// ── Tests ───────────────────────────────────────────────────────────
