use serde::{Deserialize, Serialize};
use std::{env, fs, path::PathBuf};
use thiserror::Error;

pub const ENV_HOST: &str = "MOCKGPT_HOST";
pub const ENV_PORT: &str = "MOCKGPT_PORT";
pub const ENV_LOG_LEVEL: &str = "MOCKGPT_LOG_LEVEL";
pub const ENV_LOG_FORMAT: &str = "MOCKGPT_LOG_FORMAT";
pub const ENV_CONFIG_DOCUMENT: &str = "MOCKGPT_CONFIG_DOCUMENT";
pub const ENV_CHUNK_DELAY_MICROS: &str = "MOCKGPT_CHUNK_DELAY_MICROS";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration file {path}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("Unsupported configuration format. Use 'yaml', 'json' or 'toml'.")]
    UnsupportedFormat,
    #[error("Invalid {name} value: {message}")]
    InvalidEnv { name: &'static str, message: String },
    #[error("Invalid server port. Must be greater than 0.")]
    InvalidPort,
}

/// Deployment profile used to seed defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    Dev,
    Test,
    Prod,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format '{other}'")),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct CorsConfig {
    /// Empty means any origin.
    pub allowed_origins: Vec<String>,
    pub max_age_seconds: u64,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: Vec::new(),
            max_age_seconds: 600,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub request_id_header: String,
    pub cors: CorsConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5001,
            request_id_header: "x-request-id".to_string(),
            cors: CorsConfig::default(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct StoreConfig {
    /// Location of the JSON configuration document.
    pub document_path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            document_path: PathBuf::from("config.json"),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct StreamingConfig {
    /// Pause between synthesized SSE frames.
    pub chunk_delay_micros: u64,
    /// Frames buffered between a stream producer and the HTTP body.
    pub channel_capacity: usize,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            chunk_delay_micros: 500,
            channel_capacity: 32,
        }
    }
}

/// Process settings for the MockGPT server.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub store: StoreConfig,
    pub streaming: StreamingConfig,
}

impl Config {
    /// Generates the default configuration for a profile.
    #[must_use]
    pub fn default_for_profile(profile: Profile) -> Self {
        let mut config = Self::default();
        match profile {
            Profile::Dev => {
                config.logging.level = "debug".to_string();
            }
            Profile::Test => {
                config.server.host = "127.0.0.1".to_string();
                config.logging.level = "warn".to_string();
                config.streaming.chunk_delay_micros = 0;
            }
            Profile::Prod => {
                config.logging.format = LogFormat::Json;
            }
        }
        config
    }

    /// Loads the configuration from a file, environment variables, or defaults.
    ///
    /// Precedence, lowest first: defaults, file, environment, `port_override`.
    ///
    /// # Arguments
    /// * `config_path` - Optional path to a YAML, JSON or TOML settings file.
    /// * `port_override` - Optional port number to override the configuration.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed, an environment
    /// variable holds an invalid value, or the resulting port is zero.
    pub fn load_config(
        config_path: Option<PathBuf>,
        port_override: Option<u16>,
    ) -> Result<Self, ConfigError> {
        let mut config = match config_path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        config.apply_env_overrides()?;

        if let Some(port) = port_override {
            config.server.port = port;
        }

        if config.server.port == 0 {
            return Err(ConfigError::InvalidPort);
        }

        Ok(config)
    }

    fn from_file(path: PathBuf) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;

        let parsed = match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml" | "yml") => serde_yml::from_str(&content).map_err(|err| err.to_string()),
            Some("json") => serde_json::from_str(&content).map_err(|err| err.to_string()),
            Some("toml") => toml::from_str(&content).map_err(|err| err.to_string()),
            _ => return Err(ConfigError::UnsupportedFormat),
        };

        parsed.map_err(|message| ConfigError::Parse { path, message })
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(host) = env::var(ENV_HOST) {
            self.server.host = host;
        }
        if let Ok(port) = env::var(ENV_PORT) {
            self.server.port = port.parse().map_err(|_| ConfigError::InvalidEnv {
                name: ENV_PORT,
                message: "must be a valid number between 1 and 65535".to_string(),
            })?;
        }
        if let Ok(level) = env::var(ENV_LOG_LEVEL) {
            self.logging.level = level;
        }
        if let Ok(format) = env::var(ENV_LOG_FORMAT) {
            self.logging.format = format.parse().map_err(|message| ConfigError::InvalidEnv {
                name: ENV_LOG_FORMAT,
                message,
            })?;
        }
        if let Ok(path) = env::var(ENV_CONFIG_DOCUMENT) {
            self.store.document_path = PathBuf::from(path);
        }
        if let Ok(delay) = env::var(ENV_CHUNK_DELAY_MICROS) {
            self.streaming.chunk_delay_micros =
                delay.parse().map_err(|_| ConfigError::InvalidEnv {
                    name: ENV_CHUNK_DELAY_MICROS,
                    message: "must be a non-negative integer".to_string(),
                })?;
        }
        Ok(())
    }
}
