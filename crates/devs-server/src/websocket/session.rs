//! WebSocket session lifecycle, from upgrade through disconnect.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use metrics::{counter, gauge, histogram};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::connection::{ClientConnection, ClientId};
use crate::config::ServerConfig;
use crate::metrics::{
    WS_CONNECTION_DURATION_SECONDS, WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL,
    WS_DISCONNECTIONS_TOTAL,
};
use crate::router::MessageRouter;

/// Run a WebSocket session for a connected client.
///
/// 1. Registers the client with the router's registry
/// 2. Forwards queued outbound frames and sends periodic Pings
/// 3. Hands every inbound text frame to the router on its own task
/// 4. On disconnect, cancels the client's token (stopping its watch
///    sessions) and unregisters it
#[instrument(skip_all, fields(client_id = %client_id))]
pub async fn run_ws_session(
    ws: WebSocket,
    client_id: ClientId,
    router: Arc<MessageRouter>,
    config: Arc<ServerConfig>,
    shutdown: CancellationToken,
) {
    let (mut ws_tx, mut ws_rx) = ws.split();

    let (send_tx, mut send_rx) = mpsc::channel::<Arc<String>>(config.send_queue_size.max(1));
    let connection = Arc::new(ClientConnection::new(client_id.clone(), send_tx));

    info!("client connected");
    counter!(WS_CONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).increment(1.0);

    router.clients().add(connection.clone()).await;

    let outbound_conn = connection.clone();
    let heartbeat_interval = config.heartbeat_interval().max(std::time::Duration::from_secs(1));
    let heartbeat_timeout = config.heartbeat_timeout();
    let outbound = tokio::spawn(async move {
        let mut ping_interval = tokio::time::interval(heartbeat_interval);
        // Skip the immediate first tick
        let _ = ping_interval.tick().await;

        loop {
            tokio::select! {
                msg = send_rx.recv() => {
                    let Some(text) = msg else { break };
                    let text = Arc::unwrap_or_clone(text);
                    if ws_tx.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                _ = ping_interval.tick() => {
                    if !outbound_conn.check_alive()
                        && outbound_conn.last_pong_elapsed() > heartbeat_timeout
                    {
                        warn!("client unresponsive for {heartbeat_timeout:?}, disconnecting");
                        break;
                    }
                    if ws_tx.send(Message::Ping(Vec::new().into())).await.is_err() {
                        break;
                    }
                }
            }
        }
        let _ = ws_tx.close().await;
    });

    loop {
        let msg = tokio::select! {
            () = shutdown.cancelled() => {
                debug!("server shutting down, closing session");
                break;
            }
            msg = ws_rx.next() => msg,
        };
        let Some(Ok(msg)) = msg else { break };

        let text = match msg {
            Message::Text(t) => t.as_str().to_owned(),
            Message::Binary(data) => {
                let Ok(text) = String::from_utf8(data.to_vec()) else {
                    debug!(len = data.len(), "ignoring non-UTF8 binary frame");
                    continue;
                };
                text
            }
            Message::Close(_) => {
                info!("client sent close frame");
                break;
            }
            Message::Ping(_) | Message::Pong(_) => {
                connection.mark_alive();
                continue;
            }
        };
        connection.mark_alive();

        let router = router.clone();
        let connection = connection.clone();
        drop(tokio::spawn(async move {
            router.handle_frame(&connection, &text).await;
        }));
    }

    info!(dropped = connection.drop_count(), "client disconnected");
    connection.disconnect();
    outbound.abort();
    let _ = router.clients().remove(&client_id).await;
    counter!(WS_DISCONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).decrement(1.0);
    histogram!(WS_CONNECTION_DURATION_SECONDS).record(connection.age().as_secs_f64());
}
