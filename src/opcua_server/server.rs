use chrono::{DateTime, Utc};
use opcua::server::prelude::*;
use opcua::sync::RwLock;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;

use super::nodes::SawmillNodes;
use crate::config::{SawmillConfig, ServerConfig, SimulationConfig};
use crate::error::{Result, SawmillError};
use crate::simulator::{Sawmill, SawmillState, TargetValues};

pub struct SawmillServer {
    config: SawmillConfig,
    server: Arc<RwLock<Server>>,
    nodes: SawmillNodes,
    snapshots: broadcast::Sender<SawmillState>,
}

impl SawmillServer {
    /// Builds the OPC UA server and populates the sawmill address space.
    /// Every simulation tick publishes the resulting state on `snapshots`.
    pub fn new(config: SawmillConfig, snapshots: broadcast::Sender<SawmillState>) -> Result<Self> {
        let server = build_server(&config.server)?;

        let nodes = {
            let address_space = server.address_space();
            let mut address_space = address_space.write();
            let initial = SawmillState::at_rest(&config.targets);
            SawmillNodes::register(&mut address_space, &config.server.namespace_uri, &initial)?
        };

        Ok(Self {
            config,
            server: Arc::new(RwLock::new(server)),
            nodes,
            snapshots,
        })
    }

    pub fn nodes(&self) -> SawmillNodes {
        self.nodes
    }

    /// Serves until `shutdown` resolves or the OPC UA server stops on its own.
    pub async fn run<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let SawmillServer {
            config,
            server,
            nodes,
            snapshots,
        } = self;

        tracing::info!("Starting server...");

        let address_space = server.read().address_space();
        let simulation = tokio::spawn(run_simulation(
            address_space,
            nodes,
            config.simulation.clone(),
            config.targets.clone(),
            snapshots,
        ));

        tracing::info!("OPC UA Server started at: {}", config.endpoint_url());

        let server_stopped = tokio::select! {
            _ = shutdown => false,
            _ = Server::new_server_task(server.clone()) => true,
        };

        tracing::info!("Stopping server...");
        server.write().abort();
        simulation.abort();

        server_exit(server_stopped)
    }
}

/// A server task that ends before shutdown was requested is a failure.
fn server_exit(server_stopped: bool) -> Result<()> {
    if server_stopped {
        tracing::error!("OPC UA server terminated");
        return Err(SawmillError::ServerStopped);
    }
    Ok(())
}

fn build_server(config: &ServerConfig) -> Result<Server> {
    let user_token_ids = vec![ANONYMOUS_USER_TOKEN_ID.to_string()];

    ServerBuilder::new()
        .application_name(&config.application_name)
        .application_uri(&config.application_uri)
        .product_uri(&config.product_uri)
        .create_sample_keypair(true)
        .pki_dir(&config.pki_dir)
        .discovery_server_url(None)
        .host_and_port(&config.host, config.port)
        .discovery_urls(vec![config.endpoint_path.clone()])
        .endpoint(
            "none",
            ServerEndpoint::new_none(&config.endpoint_path, &user_token_ids),
        )
        .server()
        .ok_or_else(|| SawmillError::ServerBuild {
            message: format!(
                "invalid server configuration for {}:{}{}",
                config.host, config.port, config.endpoint_path
            ),
        })
}

async fn run_simulation(
    address_space: Arc<RwLock<AddressSpace>>,
    nodes: SawmillNodes,
    simulation: SimulationConfig,
    targets: TargetValues,
    snapshots: broadcast::Sender<SawmillState>,
) {
    let mut sawmill = Sawmill::new(targets, simulation.toggle_period_secs);
    let mut rng = match simulation.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let mut last = sawmill.initial_state();

    let mut interval = tokio::time::interval(Duration::from_millis(simulation.tick_ms));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tracing::info!("Simulation loop started");

    loop {
        interval.tick().await;

        let result = {
            let mut address_space = address_space.write();
            simulate_tick(&mut address_space, &nodes, &mut sawmill, &last, Utc::now(), &mut rng)
        };

        match result {
            Ok(state) => {
                last = state.clone();
                // no subscribers is fine
                let _ = snapshots.send(state);
            }
            Err(e) => tracing::error!("Error in simulation update: {}", e),
        }
    }
}

/// One pass of read address space, step the model, write back.
pub fn simulate_tick<R: Rng + ?Sized>(
    address_space: &mut AddressSpace,
    nodes: &SawmillNodes,
    sawmill: &mut Sawmill,
    previous: &SawmillState,
    now: DateTime<Utc>,
    rng: &mut R,
) -> Result<SawmillState> {
    let mut state = nodes.read_state(address_space, previous);
    let outcome = sawmill.step(&mut state, now, rng);
    tracing::debug!(?outcome, pieces = state.pieces_count, "tick");
    nodes.write_state(address_space, &state)?;
    Ok(state)
}
