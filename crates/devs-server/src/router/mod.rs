//! Message router: decodes side-channel frames, dispatches them to the
//! typed handlers and sends correlated replies.

pub mod errors;

pub use errors::HandlerError;

use std::sync::Arc;
use std::time::{Duration, Instant};

use metrics::{counter, histogram};
use tracing::field::Empty;
use tracing::{Span, debug, instrument, warn};

use devs_core::protocol::{
    EmptyPayload, ErrorData, InboundFrame, SideRequest, SideResponse, decode_frame,
    encode_error, encode_response,
};
use devs_core::version::VersionReporter;

use crate::build::BuildCoordinator;
use crate::metrics::{
    SIDE_ERRORS_TOTAL, SIDE_FRAMES_DROPPED_TOTAL, SIDE_REQUEST_DURATION_SECONDS,
    SIDE_REQUESTS_TOTAL,
};
use crate::websocket::connection::ClientConnection;
use crate::websocket::registry::ClientRegistry;

/// Default time after which a pending request is reported as slow.
const DEFAULT_SLOW_REQUEST: Duration = Duration::from_secs(30);

/// Routes inbound frames from every client.
pub struct MessageRouter {
    clients: Arc<ClientRegistry>,
    builds: Arc<BuildCoordinator>,
    versions: VersionReporter,
    slow_request: Duration,
}

impl MessageRouter {
    /// Create a router over the shared client registry and build coordinator.
    pub fn new(
        clients: Arc<ClientRegistry>,
        builds: Arc<BuildCoordinator>,
        versions: VersionReporter,
    ) -> Self {
        Self {
            clients,
            builds,
            versions,
            slow_request: DEFAULT_SLOW_REQUEST,
        }
    }

    /// Warn about requests still pending after `threshold`.
    #[must_use]
    pub fn with_slow_request_threshold(mut self, threshold: Duration) -> Self {
        self.slow_request = threshold;
        self
    }

    /// Connected clients.
    pub fn clients(&self) -> &Arc<ClientRegistry> {
        &self.clients
    }

    /// Build coordinator.
    pub fn builds(&self) -> &Arc<BuildCoordinator> {
        &self.builds
    }

    /// Process one raw frame from `client`.
    ///
    /// Frames that are not JSON objects are dropped. A frame without `seq`
    /// is relayed verbatim to every other side-channel client, tagged or
    /// not, and its handler (if any) runs without a reply. A frame with
    /// `seq` and a string `req` always gets exactly one reply: the handler
    /// result, or an `"error"` response.
    #[instrument(skip_all, fields(client_id = %client.id, tag = Empty, seq = Empty))]
    pub async fn handle_frame(&self, client: &Arc<ClientConnection>, raw: &str) {
        let Some(frame) = decode_frame(raw) else {
            counter!(SIDE_FRAMES_DROPPED_TOTAL).increment(1);
            debug!(len = raw.len(), "dropping undecodable frame");
            return;
        };
        if frame.is_relayed() {
            let _ = self.clients.relay_side_channel(&client.id, raw).await;
        }

        let InboundFrame { req, seq, data } = frame;
        let span = Span::current();
        if let Some(seq) = seq {
            let _ = span.record("seq", seq);
        }
        let Some(req) = req else {
            if seq.is_some() {
                counter!(SIDE_FRAMES_DROPPED_TOTAL).increment(1);
                debug!("dropping correlated frame without a tag");
            }
            return;
        };
        let _ = span.record("tag", req.as_str());

        let result = match SideRequest::parse(&req, data) {
            Ok(Some(request)) => self.run(client, request).await,
            Ok(None) => {
                if let Some(seq) = seq {
                    counter!(SIDE_ERRORS_TOTAL, "tag" => "unknown", "error_type" => "unknown_tag")
                        .increment(1);
                    debug!(tag = %req, "no handler for tag");
                    reply_error(client, seq, &ErrorData::unknown_tag(&req)).await;
                }
                return;
            }
            Err(e) => Err(HandlerError::from(e)),
        };

        match (seq, result) {
            (Some(seq), Ok(response)) => reply(client, seq, &response).await,
            (Some(seq), Err(e)) => reply_error(client, seq, &e.to_error_data()).await,
            (None, Ok(_)) => {}
            (None, Err(e)) => debug!(error = %e, "uncorrelated request failed"),
        }
    }

    /// Dispatch with metrics and the slow-request watchdog.
    async fn run(
        &self,
        client: &Arc<ClientConnection>,
        request: SideRequest,
    ) -> Result<SideResponse, HandlerError> {
        let tag = request.tag();
        counter!(SIDE_REQUESTS_TOTAL, "tag" => tag).increment(1);
        let start = Instant::now();

        let fut = self.dispatch(client, request);
        tokio::pin!(fut);
        let result = match tokio::time::timeout(self.slow_request, &mut fut).await {
            Ok(result) => result,
            Err(_elapsed) => {
                warn!(
                    tag,
                    threshold_secs = self.slow_request.as_secs_f64(),
                    "slow side-channel request still pending"
                );
                fut.await
            }
        };

        histogram!(SIDE_REQUEST_DURATION_SECONDS, "tag" => tag)
            .record(start.elapsed().as_secs_f64());
        if let Err(e) = &result {
            counter!(SIDE_ERRORS_TOTAL, "tag" => tag, "error_type" => e.error_type()).increment(1);
            warn!(tag, error = %e, "side-channel request failed");
        }
        result
    }

    async fn dispatch(
        &self,
        client: &Arc<ClientConnection>,
        request: SideRequest,
    ) -> Result<SideResponse, HandlerError> {
        match request {
            SideRequest::Bcast(args) => {
                client.set_side_channel(args.enabled);
                debug!(enabled = args.enabled, "side channel toggled");
                Ok(SideResponse::Bcast(EmptyPayload))
            }
            SideRequest::Build(args) => Ok(SideResponse::Build(self.builds.build(&args).await?)),
            SideRequest::Watch(args) => {
                self.builds.watch(Arc::clone(client), args).await?;
                Ok(SideResponse::Watch(EmptyPayload))
            }
            SideRequest::Connect(args) => {
                self.builds.connect(&args).await?;
                Ok(SideResponse::Connect(EmptyPayload))
            }
            SideRequest::Specs(EmptyPayload) => Ok(SideResponse::Specs(self.versions.snapshot())),
        }
    }
}

async fn reply(client: &ClientConnection, seq: i64, response: &SideResponse) {
    match encode_response(response.tag(), seq, response) {
        Ok(frame) => {
            if !client.send_reply(frame).await {
                debug!(seq, "client gone before response was queued");
            }
        }
        Err(e) => {
            warn!(seq, error = %e, "failed to encode response");
            let error = ErrorData::new(format!("failed to encode response: {e}"));
            reply_error(client, seq, &error).await;
        }
    }
}

async fn reply_error(client: &ClientConnection, seq: i64, error: &ErrorData) {
    match encode_error(seq, error) {
        Ok(frame) => {
            if !client.send_reply(frame).await {
                debug!(seq, "client gone before error response was queued");
            }
        }
        Err(e) => warn!(seq, error = %e, "failed to encode error response"),
    }
}
