//! WebSocket connection management, client registry and session lifecycle.

pub mod connection;
pub mod registry;
pub mod session;
