pub mod cli;
pub mod config;
pub mod error;
pub mod logger;
pub mod opcua_server;
pub mod simulator;
pub mod ws_bridge;

pub use config::SawmillConfig;
pub use error::{Result, SawmillError};
pub use opcua_server::SawmillServer;
pub use simulator::{Sawmill, SawmillState, TargetValues};
