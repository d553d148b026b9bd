//! TOML configuration for the outagewatch daemon.
//!
//! Layered: compiled-in defaults, then a config file, then a couple of
//! environment overrides for secrets.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::notify::telegram::DEFAULT_API_BASE;
use crate::probes::role::DEFAULT_ROUTER_PATTERN;
use crate::probes::{PatternRoleClassifier, ProbeRole};

pub const CONFIG_ENV: &str = "OUTAGEWATCH_CONFIG";
pub const SYSTEM_CONFIG_PATH: &str = "/etc/outagewatch/outagewatch.toml";

/// Upper bound for every `*_secs` setting (30 days).
pub const MAX_DURATION_SECS: u64 = 30 * 24 * 60 * 60;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Root configuration for the daemon.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from a TOML file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config = Self::from_toml(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;
        info!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Resolve configuration, in order:
    /// 1. An explicit path (from the command line); failure to load it is an error.
    /// 2. The path in the `OUTAGEWATCH_CONFIG` environment variable.
    /// 3. `/etc/outagewatch/outagewatch.toml`.
    /// 4. Compiled-in defaults.
    ///
    /// Environment overrides are applied and the result validated.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::load(path)?,
            None => Self::load_or_default(),
        };
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    fn load_or_default() -> Self {
        if let Ok(env_path) = std::env::var(CONFIG_ENV) {
            let path = Path::new(&env_path);
            match Self::load(path) {
                Ok(cfg) => return cfg,
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "OUTAGEWATCH_CONFIG set but file could not be loaded, trying fallback"
                    );
                }
            }
        }

        let system_path = Path::new(SYSTEM_CONFIG_PATH);
        if system_path.exists() {
            match Self::load(system_path) {
                Ok(cfg) => return cfg,
                Err(e) => {
                    warn!(
                        path = %system_path.display(),
                        error = %e,
                        "system config file exists but could not be loaded, using defaults"
                    );
                }
            }
        }

        debug!("no config file found, using compiled-in defaults");
        Self::default()
    }

    /// `TELEGRAM_BOT_TOKEN` / `TELEGRAM_CHAT_ID` win over the file.
    pub fn apply_env(&mut self) {
        if let Ok(token) = std::env::var("TELEGRAM_BOT_TOKEN") {
            self.notify.telegram_bot_token = token;
        }
        if let Ok(chat) = std::env::var("TELEGRAM_CHAT_ID") {
            self.notify.telegram_chat_id = chat;
        }
    }

    pub fn validate(&self) -> Result<()> {
        let a = &self.analysis;
        for (name, secs) in [
            ("analysis.window_secs", a.window_secs),
            ("analysis.tick_secs", a.tick_secs),
            ("notify.cooldown_secs", self.notify.cooldown_secs),
        ] {
            if secs > MAX_DURATION_SECS {
                anyhow::bail!("{} ({}) must not exceed {} seconds", name, secs, MAX_DURATION_SECS);
            }
        }
        if a.window_secs == 0 {
            anyhow::bail!("analysis.window_secs must be greater than zero");
        }
        if a.tick_secs == 0 {
            anyhow::bail!("analysis.tick_secs must be greater than zero");
        }
        if a.tick_secs > a.window_secs {
            anyhow::bail!(
                "analysis.tick_secs ({}) must not exceed analysis.window_secs ({})",
                a.tick_secs,
                a.window_secs
            );
        }
        PatternRoleClassifier::new(&a.router_pattern)?;
        self.server
            .bind
            .parse::<std::net::SocketAddr>()
            .with_context(|| format!("invalid server.bind '{}'", self.server.bind))?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address for the webhook and JSON API listener.
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:5000".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: "data/outagewatch.db".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Analysis
// ---------------------------------------------------------------------------

/// A probe declared up front, optionally pinning its role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeConfig {
    pub name: String,
    #[serde(default)]
    pub role: Option<ProbeRole>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Trailing window over which the latest status per probe counts.
    pub window_secs: u64,
    /// Periodic re-evaluation interval. Must not exceed the window.
    pub tick_secs: u64,
    /// Monitor names matching this regex are routers.
    pub router_pattern: String,
    pub probes: Vec<ProbeConfig>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            window_secs: 300,
            tick_secs: 60,
            router_pattern: DEFAULT_ROUTER_PATTERN.to_string(),
            probes: Vec::new(),
        }
    }
}

impl AnalysisConfig {
    pub fn window(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.window_secs as i64)
    }

    pub fn tick(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.tick_secs)
    }
}

// ---------------------------------------------------------------------------
// Notify
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    /// Minimum interval between two alerts with the same cause and affected set.
    pub cooldown_secs: u64,
    pub telegram_bot_token: String,
    pub telegram_chat_id: String,
    /// Bot API host; point at a self-hosted Bot API server if needed.
    pub telegram_api_base: String,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            cooldown_secs: 300,
            telegram_bot_token: String::new(),
            telegram_chat_id: String::new(),
            telegram_api_base: DEFAULT_API_BASE.to_string(),
        }
    }
}

impl NotifyConfig {
    pub fn cooldown(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.cooldown_secs as i64)
    }

    pub fn telegram_configured(&self) -> bool {
        !self.telegram_bot_token.trim().is_empty() && !self.telegram_chat_id.trim().is_empty()
    }
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
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
