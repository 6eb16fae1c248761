//! `DevtoolsServer`: Axum HTTP + WebSocket server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use chrono::{DateTime, Utc};
use metrics::counter;
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::config::ServerConfig;
use crate::health::{self, HealthResponse};
use crate::metrics::WS_CONNECTIONS_REJECTED_TOTAL;
use crate::router::MessageRouter;
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::connection::ClientId;
use crate::websocket::session::run_ws_session;

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Message router, which also owns the client registry.
    pub router: Arc<MessageRouter>,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Shutdown coordinator.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// Monotonic start time, for uptime.
    pub start_time: Instant,
    /// Wall-clock start time.
    pub started_at: DateTime<Utc>,
    /// Prometheus handle for `/metrics`, when a recorder is installed.
    pub metrics: Option<PrometheusHandle>,
    /// One permit per allowed connection, held by the session.
    pub connection_slots: Arc<Semaphore>,
}

/// The devtools server.
pub struct DevtoolsServer {
    config: Arc<ServerConfig>,
    router: Arc<MessageRouter>,
    shutdown: Arc<ShutdownCoordinator>,
    metrics: Option<PrometheusHandle>,
    connection_slots: Arc<Semaphore>,
    start_time: Instant,
    started_at: DateTime<Utc>,
}

impl DevtoolsServer {
    /// Create a new server.
    pub fn new(config: ServerConfig, router: MessageRouter) -> Self {
        let slots = config.max_connections.min(Semaphore::MAX_PERMITS);
        Self {
            connection_slots: Arc::new(Semaphore::new(slots)),
            config: Arc::new(config),
            router: Arc::new(router),
            shutdown: Arc::new(ShutdownCoordinator::new()),
            metrics: None,
            start_time: Instant::now(),
            started_at: Utc::now(),
        }
    }

    /// Serve `/metrics` from `handle`.
    #[must_use]
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            router: self.router.clone(),
            config: self.config.clone(),
            shutdown: self.shutdown.clone(),
            start_time: self.start_time,
            started_at: self.started_at,
            metrics: self.metrics.clone(),
            connection_slots: self.connection_slots.clone(),
        };

        Router::new()
            .route("/ws", get(ws_handler))
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .with_state(state)
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
    }

    /// Bind the configured address and serve until shutdown is triggered.
    ///
    /// Returns the bound address (useful with port `0`) and the serve task.
    pub async fn listen(&self) -> std::io::Result<(SocketAddr, JoinHandle<()>)> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&addr).await?;
        let local_addr = listener.local_addr()?;
        let app = self.router();
        let token = self.shutdown.token();

        info!(%local_addr, "devtools server listening");
        let handle = tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async move { token.cancelled().await })
                .await;
            if let Err(e) = result {
                error!(error = %e, "server terminated with error");
            }
        });
        Ok((local_addr, handle))
    }

    /// Get the message router.
    pub fn message_router(&self) -> &Arc<MessageRouter> {
        &self.router
    }

    /// Get the shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

/// GET /ws
///
/// A connection slot is reserved before the upgrade and released when the
/// session ends, so concurrent upgrades cannot exceed `max_connections`.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let Ok(slot) = state.connection_slots.clone().try_acquire_owned() else {
        counter!(WS_CONNECTIONS_REJECTED_TOTAL).increment(1);
        warn!(max = state.config.max_connections, "connection limit reached");
        return (StatusCode::SERVICE_UNAVAILABLE, "too many connections").into_response();
    };

    let client_id = ClientId::new();
    let shutdown = state.shutdown.token();
    ws.max_message_size(state.config.max_message_size)
        .on_upgrade(move |socket| async move {
            run_ws_session(socket, client_id, state.router, state.config, shutdown).await;
            drop(slot);
        })
        .into_response()
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let connections = state.router.clients().connection_count().await;
    let builds = state.router.builds();
    Json(health::health_check(
        state.started_at,
        state.start_time,
        connections,
        builds.watch_sessions(),
        builds.last_ok_build(),
    ))
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::testing::ScriptedPipeline;
    use crate::build::{BuildCoordinator, NullDeviceBus};
    use crate::websocket::registry::ClientRegistry;
    use axum::body::Body;
    use axum::http::Request;
    use devs_core::specs::StaticCatalog;
    use devs_core::version::{IMG_VERSION, VersionReporter};
    use metrics_exporter_prometheus::PrometheusBuilder;
    use tower::ServiceExt;

    fn make_router() -> MessageRouter {
        let builds = BuildCoordinator::new(Arc::new(ScriptedPipeline::new()), Arc::new(NullDeviceBus));
        let versions = VersionReporter::new(Arc::new(StaticCatalog::builtin()), "0.0.0", IMG_VERSION);
        MessageRouter::new(Arc::new(ClientRegistry::new()), Arc::new(builds), versions)
    }

    fn make_server() -> DevtoolsServer {
        DevtoolsServer::new(ServerConfig::default(), make_router())
    }

    async fn get(app: Router, uri: &str) -> Response {
        let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
        app.oneshot(req).await.unwrap()
    }

    #[test]
    fn server_with_default_config() {
        let server = make_server();
        assert_eq!(server.config().host, "127.0.0.1");
        assert_eq!(server.config().port, 0);
    }

    #[test]
    fn shutdown_coordinator_accessible() {
        let server = make_server();
        assert!(!server.shutdown().is_shutting_down());
    }

    #[tokio::test]
    async fn health_endpoint_returns_ok() {
        let server = make_server();
        let resp = get(server.router(), "/health").await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body = axum::body::to_bytes(resp.into_body(), 10_000).await.unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed["status"], "ok");
        assert_eq!(parsed["connections"], 0);
        assert_eq!(parsed["active_watches"], 0);
        assert!(parsed["started_at"].is_string());
    }

    #[tokio::test]
    async fn metrics_absent_without_recorder() {
        let server = make_server();
        let resp = get(server.router(), "/metrics").await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn metrics_rendered_with_handle() {
        let handle = PrometheusBuilder::new().build_recorder().handle();
        let server = make_server().with_metrics(handle);
        let resp = get(server.router(), "/metrics").await;
        assert_eq!(resp.status(), StatusCode::OK);
        let content_type = resp.headers()[header::CONTENT_TYPE].to_str().unwrap();
        assert!(content_type.starts_with("text/plain"));
    }

    #[test]
    fn connection_slots_match_limit() {
        let config = ServerConfig {
            max_connections: 3,
            ..ServerConfig::default()
        };
        let server = DevtoolsServer::new(config, make_router());
        assert_eq!(server.connection_slots.available_permits(), 3);
    }

    #[tokio::test]
    async fn ws_requires_upgrade() {
        let server = make_server();
        let resp = get(server.router(), "/ws").await;
        assert!(resp.status().is_client_error());
    }

    #[tokio::test]
    async fn unknown_route_returns_404() {
        let server = make_server();
        let resp = get(server.router(), "/nonexistent").await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn listen_binds_ephemeral_port_and_stops() {
        let server = make_server();
        let (addr, handle) = server.listen().await.unwrap();
        assert_ne!(addr.port(), 0);

        server.shutdown().shutdown();
        tokio::time::timeout(std::time::Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
