use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::SawmillConfig;

#[derive(Parser, Debug)]
#[command(name = "sawmill-sim", version, about = "Sawmill digital twin exposed over OPC UA")]
pub struct Cli {
    /// TOML configuration file; built-in defaults when omitted
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Debug logging for the simulator
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Run the OPC UA server and the simulation (default)
    Serve(ServeArgs),
    /// Connect to a running server and print the sawmill variables as JSON
    Probe {
        /// e.g. opc.tcp://localhost:4840/freeopcua/server/
        #[arg(long)]
        endpoint: Option<String>,
    },
    /// Print the effective configuration as TOML
    Config,
}

impl Default for Command {
    fn default() -> Self {
        Command::Serve(ServeArgs::default())
    }
}

#[derive(Args, Debug, Clone, Default, PartialEq)]
pub struct ServeArgs {
    #[arg(long)]
    pub host: Option<String>,

    #[arg(long)]
    pub port: Option<u16>,

    /// Disable the WebSocket snapshot feed
    #[arg(long)]
    pub no_feed: bool,
}

impl ServeArgs {
    pub fn apply(&self, config: &mut SawmillConfig) {
        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if self.no_feed {
            config.feed.enabled = false;
        }
    }
}
