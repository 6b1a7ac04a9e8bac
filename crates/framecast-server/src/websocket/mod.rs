//! WebSocket transport: per-connection state, session loop, frame dispatch, heartbeat.

pub mod connection;
pub mod handler;
pub mod heartbeat;
pub mod session;
