use clap::Parser;
use sawmill_sim::cli::{Cli, Command};
use sawmill_sim::opcua_server::{probe, SawmillServer};
use sawmill_sim::{logger, ws_bridge, Result, SawmillConfig};
use tokio::sync::broadcast;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = SawmillConfig::read(cli.config.as_deref())?;
    let command = cli.command.unwrap_or_default();
    if let Command::Serve(args) = &command {
        args.apply(&mut config);
    }
    config.validate()?;

    logger::init_logger(&config.logging, cli.verbose);

    match command {
        Command::Serve(_) => serve(config).await,
        Command::Probe { endpoint } => {
            let endpoint = endpoint.unwrap_or_else(|| config.local_endpoint_url());
            let state = probe(endpoint, config.server.namespace_uri.clone()).await?;
            println!("{}", serde_json::to_string_pretty(&state)?);
            Ok(())
        }
        Command::Config => {
            print!("{}", config.to_toml_string()?);
            Ok(())
        }
    }
}

async fn serve(config: SawmillConfig) -> Result<()> {
    tracing::info!("Starting Sawmill digital twin with OPC UA");

    // Simulation snapshots for the WebSocket feed
    let (tx, _rx) = broadcast::channel(100);

    let feed = config.feed.enabled.then(|| {
        let tx_ws = tx.clone();
        let feed_config = config.feed.clone();
        tokio::spawn(async move {
            if let Err(e) = ws_bridge::start_ws_server(feed_config, tx_ws).await {
                tracing::error!("WebSocket server error: {}", e);
            }
        })
    });

    tracing::info!("Backend initialized:");
    tracing::info!("  - OPC UA server on {}", config.endpoint_url());
    if config.feed.enabled {
        tracing::info!("  - WebSocket on {}:{}", config.feed.host, config.feed.port);
    }

    let server = SawmillServer::new(config, tx)?;
    let result = server.run(shutdown_signal()).await;

    if let Some(feed) = feed {
        feed.abort();
    }
    tracing::info!("Shutting down");
    result
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}
