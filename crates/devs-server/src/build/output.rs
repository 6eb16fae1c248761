//! Forwarding of tool output to connected clients.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::debug;

use devs_core::protocol::{OutputEvent, events};

use crate::websocket::registry::ClientRegistry;

/// Send every [`OutputEvent`] from `rx` to all connected clients as an
/// `"output"` event. Returns when the sending side is dropped.
pub async fn forward_output(clients: Arc<ClientRegistry>, mut rx: mpsc::Receiver<OutputEvent>) {
    while let Some(event) = rx.recv().await {
        let _ = clients.broadcast_event(events::OUTPUT, &event).await;
    }
    debug!("output forwarder stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::websocket::connection::ClientConnection;
    use devs_core::protocol::OutputFrom;

    #[tokio::test]
    async fn forwards_until_sender_dropped() {
        let clients = Arc::new(ClientRegistry::new());
        let (conn_tx, mut conn_rx) = mpsc::channel(8);
        clients
            .add(Arc::new(ClientConnection::new("a".into(), conn_tx)))
            .await;

        let (tx, rx) = mpsc::channel(8);
        let task = tokio::spawn(forward_output(clients, rx));
        tx.send(OutputEvent {
            from: OutputFrom::Dev,
            lines: vec!["compiling main.ts".into()],
        })
        .await
        .unwrap();
        drop(tx);
        task.await.unwrap();

        let msg: serde_json::Value = serde_json::from_str(&conn_rx.recv().await.unwrap()).unwrap();
        assert_eq!(msg["ev"], "output");
        assert_eq!(msg["data"]["from"], "dev");
        assert_eq!(msg["data"]["lines"][0], "compiling main.ts");
    }
}
