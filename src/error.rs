use opcua::types::StatusCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SawmillError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Config serialize error: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid config value for `{field}`: {message}")]
    InvalidConfig { field: String, message: String },

    #[error("Failed to build OPC UA server: {message}")]
    ServerBuild { message: String },

    #[error("Failed to build OPC UA client: {message}")]
    ClientBuild { message: String },

    #[error("OPC UA server stopped unexpectedly")]
    ServerStopped,

    #[error("Address space error: {message}")]
    AddressSpace { message: String },

    #[error("OPC UA client error: {0}")]
    Client(StatusCode),

    #[error("Task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl SawmillError {
    pub fn invalid_config(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn address_space(message: impl Into<String>) -> Self {
        Self::AddressSpace {
            message: message.into(),
        }
    }
}

impl From<StatusCode> for SawmillError {
    fn from(status: StatusCode) -> Self {
        Self::Client(status)
    }
}

pub type Result<T> = std::result::Result<T, SawmillError>;
