//! # devs-server
//!
//! Devtools side-channel server.
//!
//! - `WebSocket` gateway: connection management, heartbeat, one task per inbound frame
//! - Message router: request decoding, typed dispatch, correlated responses, side-channel relay
//! - Build coordination: one-shot builds, watch sessions streamed as events, device bus connect
//! - HTTP endpoints: health check, Prometheus metrics
//! - Graceful shutdown via `CancellationToken`

#![deny(unsafe_code)]

pub mod build;
pub mod config;
pub mod health;
pub mod metrics;
pub mod router;
pub mod server;
pub mod shutdown;
pub mod websocket;
