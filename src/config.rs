use crate::error::{Result, SawmillError};
use crate::simulator::TargetValues;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SawmillConfig {
    pub server: ServerConfig,
    pub simulation: SimulationConfig,
    pub targets: TargetValues,
    pub feed: FeedConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub endpoint_path: String,
    pub application_name: String,
    pub application_uri: String,
    pub product_uri: String,
    pub namespace_uri: String,
    pub pki_dir: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 4840,
            endpoint_path: "/freeopcua/server/".to_string(),
            application_name: "Sawmill OPC UA Server".to_string(),
            application_uri: "urn:sawmill:server".to_string(),
            product_uri: "urn:sawmill-sim".to_string(),
            namespace_uri: "http://examples.freeopcua.github.io".to_string(),
            pki_dir: "./pki".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub tick_ms: u64,
    pub toggle_period_secs: u32,
    /// Fixed RNG seed for reproducible runs.
    pub seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tick_ms: 1000,
            toggle_period_secs: 10,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
        }
    }
}

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

impl SawmillConfig {
    /// Loads the file when given, otherwise falls back to built-in defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = Self::read(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Like [`SawmillConfig::load`] but without validation, so CLI overrides
    /// can be applied first.
    pub fn read(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(SawmillError::invalid_config("server.port", "must be non-zero"));
        }
        if !self.server.endpoint_path.starts_with('/') {
            return Err(SawmillError::invalid_config(
                "server.endpoint_path",
                "must start with '/'",
            ));
        }
        if self.server.namespace_uri.trim().is_empty() {
            return Err(SawmillError::invalid_config(
                "server.namespace_uri",
                "must not be empty",
            ));
        }
        if self.simulation.tick_ms == 0 {
            return Err(SawmillError::invalid_config(
                "simulation.tick_ms",
                "must be greater than zero",
            ));
        }
        if self.simulation.toggle_period_secs == 0 {
            return Err(SawmillError::invalid_config(
                "simulation.toggle_period_secs",
                "must be greater than zero",
            ));
        }
        let targets = &self.targets;
        for (field, value) in [
            ("targets.cutting_speed", targets.cutting_speed),
            ("targets.motor_speed", targets.motor_speed),
            ("targets.power_consumption", targets.power_consumption),
            ("targets.temperature", targets.temperature),
            ("targets.vibration", targets.vibration),
            ("targets.pressure", targets.pressure),
        ] {
            if !value.is_finite() {
                return Err(SawmillError::invalid_config(field, "must be a finite number"));
            }
        }
        if self.feed.enabled {
            if self.feed.port == 0 {
                return Err(SawmillError::invalid_config("feed.port", "must be non-zero"));
            }
            if format!("{}:{}", self.feed.host, self.feed.port)
                .parse::<std::net::SocketAddr>()
                .is_err()
            {
                return Err(SawmillError::invalid_config(
                    "feed.host",
                    "must be an IP address",
                ));
            }
            if self.feed.port == self.server.port && self.feed.host == self.server.host {
                return Err(SawmillError::invalid_config(
                    "feed.port",
                    format!("collides with the OPC UA port {}", self.server.port),
                ));
            }
        }
        if !LOG_LEVELS.contains(&self.logging.level.to_ascii_lowercase().as_str()) {
            return Err(SawmillError::invalid_config(
                "logging.level",
                format!("expected one of {}", LOG_LEVELS.join(", ")),
            ));
        }
        Ok(())
    }

    pub fn endpoint_url(&self) -> String {
        format!(
            "opc.tcp://{}:{}{}",
            self.server.host, self.server.port, self.server.endpoint_path
        )
    }

    /// Endpoint a local client should dial; the server usually binds 0.0.0.0.
    pub fn local_endpoint_url(&self) -> String {
        let host = match self.server.host.as_str() {
            "0.0.0.0" | "::" => "localhost",
            host => host,
        };
        format!(
            "opc.tcp://{}:{}{}",
            host, self.server.port, self.server.endpoint_path
        )
    }
}
