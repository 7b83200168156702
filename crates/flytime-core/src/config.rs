use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Seconds between two decrements of an active entity's flight time.
pub const DEFAULT_TICK_INTERVAL_SECS: u64 = 30;

/// Top-level config (flytime.toml + FLYTIME_* env overrides).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FlytimeConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

/// Which `DurationStore` implementation backs the durable records.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum StoreBackend {
    #[default]
    Sqlite,
    /// Shared PostgreSQL server named by `database.url`.
    Postgres,
    /// Process-local map; records are lost on exit. Useful for demos and tests.
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    /// SQLite file, used by the `sqlite` backend.
    #[serde(default = "default_db_path")]
    pub path: String,
    /// Connection URL, required by the `postgres` backend.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            path: default_db_path(),
            url: None,
            max_connections: default_max_connections(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Tick cadence. Must be at least one second.
    #[serde(default = "default_tick_interval_secs")]
    pub tick_interval_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: DEFAULT_TICK_INTERVAL_SECS,
        }
    }
}

impl SchedulerConfig {
    pub fn tick_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.tick_interval_secs.max(1))
    }
}

fn default_tick_interval_secs() -> u64 {
    DEFAULT_TICK_INTERVAL_SECS
}

fn default_max_connections() -> u32 {
    5
}

fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.flytime/flytime.db", home)
}

impl FlytimeConfig {
    /// Load config from a TOML file with FLYTIME_* env var overrides.
    ///
    /// Checks in order:
    ///   1. Explicit path argument
    ///   2. ~/.flytime/flytime.toml
    ///
    /// A missing file is not an error; built-in defaults fill every field.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);
        tracing::debug!(%path, "loading config");

        // `__` separates nesting levels so field names keep their underscores:
        // FLYTIME_SCHEDULER__TICK_INTERVAL_SECS=10
        let config: FlytimeConfig = Figment::from(Serialized::defaults(FlytimeConfig::default()))
            .merge(Toml::file(&path))
            .merge(Env::prefixed("FLYTIME_").split("__"))
            .extract()
            .map_err(|e| crate::error::FlytimeError::Config(e.to_string()))?;

        if config.scheduler.tick_interval_secs == 0 {
            return Err(crate::error::FlytimeError::Config(
                "scheduler.tick_interval_secs must be at least 1".to_string(),
            ));
        }

        if config.database.backend == StoreBackend::Postgres && config.database.url.is_none() {
            return Err(crate::error::FlytimeError::Config(
                "database.url is required for the postgres backend".to_string(),
            ));
        }

        Ok(config)
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.flytime/flytime.toml", home)
}
