use axum::extract::ws::Message;
use axum::{
    extract::{
        ws::{WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use std::net::SocketAddr;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tower_http::cors::CorsLayer;

use crate::config::FeedConfig;
use crate::error::{Result, SawmillError};
use crate::simulator::SawmillState;

#[derive(Clone)]
pub struct AppState {
    pub tx: broadcast::Sender<SawmillState>,
}

pub fn router(tx: broadcast::Sender<SawmillState>) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .layer(CorsLayer::permissive())
        .with_state(AppState { tx })
}

pub async fn start_ws_server(config: FeedConfig, tx: broadcast::Sender<SawmillState>) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| SawmillError::invalid_config("feed.host", format!("{e}")))?;
    tracing::info!("WebSocket snapshot feed listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(tx)).await?;

    Ok(())
}

pub fn snapshot_message(state: &SawmillState, timestamp: DateTime<Utc>) -> serde_json::Value {
    serde_json::json!({
        "type": "snapshot",
        "timestamp": timestamp.to_rfc3339(),
        "sawmill": state,
    })
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: AppState) {
    tracing::info!("New WebSocket connection");

    let mut rx = state.tx.subscribe();

    loop {
        tokio::select! {
            snapshot = rx.recv() => {
                let sawmill = match snapshot {
                    Ok(sawmill) => sawmill,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::debug!("WebSocket client lagged, skipped {} snapshots", skipped);
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                };

                let msg = snapshot_message(&sawmill, Utc::now());
                if socket.send(Message::Text(msg.to_string())).await.is_err() {
                    tracing::info!("Client disconnected");
                    break;
                }
            }
            result = socket.recv() => {
                match result {
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::error!("WebSocket error: {}", e);
                        break;
                    }
                    None => {
                        tracing::info!("WebSocket connection closed");
                        break;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn snapshot_message_shape() {
        let state = SawmillState::default();
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let msg = snapshot_message(&state, ts);

        assert_eq!(msg["type"], "snapshot");
        assert_eq!(msg["timestamp"], "2024-05-01T12:00:00+00:00");
        assert_eq!(msg["sawmill"]["is_stopped"], true);
        assert_eq!(msg["sawmill"]["pieces_count"], 0);
        assert_eq!(msg["sawmill"]["motor_speed"], 1800.0);
    }

    #[tokio::test]
    async fn rejects_unparseable_host() {
        let (tx, _rx) = broadcast::channel(4);
        let config = FeedConfig {
            enabled: true,
            host: "not a host".to_string(),
            port: 3000,
        };
        assert!(start_ws_server(config, tx).await.is_err());
    }
}
