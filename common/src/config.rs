// common/src/config.rs
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use config::{Config as ConfigFile, File, Environment};

/// Central configuration for the gateway
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    pub gateway_addr: String,

    // Must match the cookie settings of the HTTP subsystem that issues sessions
    pub session: SessionConfig,

    pub store: StoreConfig,
    pub heartbeat: HeartbeatConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Name of the signed session cookie, e.g. `express.sid`
    pub cookie_name: String,
    /// Shared secret the session cookie was signed with
    pub secret: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoreConfig {
    pub lookup_timeout_ms: u64,
    /// Optional JSON file of `{ "<session id>": { ...record } }` loaded at startup
    #[serde(default)]
    pub seed_file: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HeartbeatConfig {
    pub interval_secs: u64,
    pub timeout_secs: u64,
}

impl StoreConfig {
    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_millis(self.lookup_timeout_ms)
    }
}

impl HeartbeatConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gateway_addr: "127.0.0.1:3000".to_string(),
            session: SessionConfig {
                cookie_name: "express.sid".to_string(),
                secret: "dev_secret".to_string(),
            },
            store: StoreConfig {
                lookup_timeout_ms: 5000,
                seed_file: None,
            },
            heartbeat: HeartbeatConfig {
                interval_secs: 5,
                timeout_secs: 30,
            },
        }
    }
}

// Environment variables with prefix "APP", e.g. APP__SESSION__SECRET
fn environment() -> Environment {
    Environment::with_prefix("APP").separator("__")
}

impl Config {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self, config::ConfigError> {
        // Get the run mode, defaulting to "development"
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        // Locate the config directory
        let config_dir = env::var("CONFIG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                // Check if we're in the project root or a subcrate
                let mut path = PathBuf::from("./config");
                if !path.exists() {
                    path = PathBuf::from("../config");
                }
                path
            });

        tracing::info!("Loading configuration from {}", config_dir.display());
        tracing::info!("Using run mode: {}", run_mode);

        let defaults = Config::default();

        let config = ConfigFile::builder()
            // Built-in defaults so partial files still deserialize
            .set_default("gateway_addr", defaults.gateway_addr)?
            .set_default("session.cookie_name", defaults.session.cookie_name)?
            .set_default("session.secret", defaults.session.secret)?
            .set_default("store.lookup_timeout_ms", defaults.store.lookup_timeout_ms as i64)?
            .set_default("heartbeat.interval_secs", defaults.heartbeat.interval_secs as i64)?
            .set_default("heartbeat.timeout_secs", defaults.heartbeat.timeout_secs as i64)?
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Add environment specific config
            .add_source(File::from(config_dir.join(format!("{}.toml", run_mode))).required(false))
            // Add a local config file for local overrides
            .add_source(File::from(config_dir.join("local.toml")).required(false))
            .add_source(environment())
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Load from files, falling back to plain environment variables
    pub fn from_env() -> Self {
        match Self::load() {
            Ok(config) => {
                tracing::info!("Configuration loaded from files and environment");
                config
            },
            Err(e) => {
                tracing::warn!("Failed to load configuration from files: {}", e);
                tracing::info!("Falling back to environment variables only");

                let defaults = Config::default();

                let gateway_addr = env::var("GATEWAY_ADDR")
                    .unwrap_or(defaults.gateway_addr);

                let cookie_name = env::var("SESSION_COOKIE_NAME")
                    .unwrap_or(defaults.session.cookie_name);

                let secret = env::var("SESSION_SECRET")
                    .unwrap_or(defaults.session.secret);

                let lookup_timeout_ms = env::var("STORE_LOOKUP_TIMEOUT_MS")
                    .ok()
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(defaults.store.lookup_timeout_ms);

                let seed_file = env::var("STORE_SEED_FILE").ok();

                let interval_secs = env::var("HEARTBEAT_INTERVAL_SECS")
                    .ok()
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(defaults.heartbeat.interval_secs);

                let timeout_secs = env::var("HEARTBEAT_TIMEOUT_SECS")
                    .ok()
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(defaults.heartbeat.timeout_secs);

                Self {
                    gateway_addr,
                    session: SessionConfig { cookie_name, secret },
                    store: StoreConfig { lookup_timeout_ms, seed_file },
                    heartbeat: HeartbeatConfig { interval_secs, timeout_secs },
                }
            }
        }
    }
}
