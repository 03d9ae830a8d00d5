use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

use crate::notifier::BroadcastNotifier;

pub static CONFIG: OnceCell<Config> = OnceCell::new();

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    const HOST: &str = "127.0.0.1";
    const PORT: u16 = 8080;

    fn ensure_valid(&mut self) {
        let trimmed = self.host.trim();
        if trimmed.is_empty() {
            eprintln!(
                "Config error: server host is empty - using default of '{}'",
                Self::HOST
            );
            self.host = Self::HOST.to_owned();
        } else {
            self.host = trimmed.to_owned();
        }

        if self.port == 0 {
            eprintln!(
                "Config error: server port of 0 is invalid - using default of {}",
                Self::PORT
            );
            self.port = Self::PORT;
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: Self::HOST.to_string(),
            port: Self::PORT,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct LoggingConfig {
    pub activity_feed: String,
    pub axum: String,
    /// When set, logs are written to rotating files in this directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,
}

impl LoggingConfig {
    const LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];
    const ACTIVITY_FEED_LEVEL: &str = "info";
    const AXUM_LEVEL: &str = "warn";

    /// Level spec understood by flexi_logger, e.g. `activity_feed=info, axum=warn`
    pub fn level_spec(&self) -> String {
        format!("activity_feed={}, axum={}", self.activity_feed, self.axum)
    }

    fn ensure_valid(&mut self) {
        self.activity_feed =
            Self::valid_level("activity_feed", &self.activity_feed, Self::ACTIVITY_FEED_LEVEL);
        self.axum = Self::valid_level("axum", &self.axum, Self::AXUM_LEVEL);
    }

    fn valid_level(name: &str, value: &str, default: &str) -> String {
        let normalized = value.trim().to_ascii_lowercase();
        if Self::LOG_LEVELS.contains(&normalized.as_str()) {
            normalized
        } else {
            eprintln!(
                "Config error: {} log level of '{}' is invalid - using default of '{}'",
                name, value, default
            );
            default.to_owned()
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            activity_feed: Self::ACTIVITY_FEED_LEVEL.to_string(),
            axum: Self::AXUM_LEVEL.to_string(),
            directory: None,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ActivitiesConfig {
    /// Start with the three demo records
    pub seed_mock_data: bool,
    /// Publish created activities to real-time subscribers
    pub broadcast: bool,
    pub broadcast_capacity: usize,
}

impl ActivitiesConfig {
    fn ensure_valid(&mut self) {
        if self.broadcast_capacity == 0 {
            eprintln!(
                "Config error: broadcast_capacity of 0 is invalid - using default of {}",
                BroadcastNotifier::DEFAULT_CAPACITY
            );
            self.broadcast_capacity = BroadcastNotifier::DEFAULT_CAPACITY;
        }
    }
}

impl Default for ActivitiesConfig {
    fn default() -> Self {
        ActivitiesConfig {
            seed_mock_data: true,
            broadcast: true,
            broadcast_capacity: BroadcastNotifier::DEFAULT_CAPACITY,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub activities: ActivitiesConfig,
}

impl Config {
    pub const ENV_PREFIX: &str = "ACTIVITY_FEED_";
    const FILE_NAME: &str = "config.toml";

    /// Loads the configuration from `config.toml` in the app's data directory,
    /// writing the defaults there first if no file exists.
    pub fn load_config(project_dirs: &ProjectDirs) -> Self {
        let config_path = project_dirs.data_local_dir().join(Self::FILE_NAME);

        if !config_path.exists() {
            Self::write_default(&config_path);
        }

        Self::load_from(&config_path)
    }

    /// Defaults, then the TOML file at `config_path` (if present), then
    /// `ACTIVITY_FEED_*` environment variables. On error, defaults are used.
    pub fn load_from(config_path: &Path) -> Self {
        let default_config = Config::default();

        let figment = Figment::from(Serialized::defaults(default_config.clone()))
            .merge(Toml::file(config_path))
            .merge(Env::prefixed(Self::ENV_PREFIX).split("__"));

        let mut config = figment.extract().unwrap_or_else(|err| {
            eprintln!(
                "Could not load config file {}: {}. Using default configuration.",
                config_path.display(),
                err
            );
            default_config
        });

        config.ensure_valid();

        config
    }

    /// Command-line values win over everything else
    pub fn apply_overrides(&mut self, host: Option<String>, port: Option<u16>) {
        if let Some(host) = host {
            self.server.host = host;
        }
        if let Some(port) = port {
            self.server.port = port;
        }
        self.server.ensure_valid();
    }

    fn write_default(config_path: &Path) {
        if let Some(parent) = config_path.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                eprintln!(
                    "Failed to create configuration directory {}: {}",
                    parent.display(),
                    e
                );
            }
        }
        match toml::to_string_pretty(&Config::default()) {
            Ok(toml_string) => {
                if let Err(e) = fs::write(config_path, toml_string) {
                    eprintln!(
                        "Failed to write default config to {}: {}",
                        config_path.display(),
                        e
                    );
                }
            }
            Err(e) => eprintln!("Failed to serialize default config: {}", e),
        }
    }

    fn ensure_valid(&mut self) {
        self.server.ensure_valid();
        self.logging.ensure_valid();
        self.activities.ensure_valid();
    }
}
