//! # framecast-server
//!
//! The notification broker. Peers connect over WebSocket, declare an app
//! identity, and publish notifications that are fanned out to every open
//! connection and kept in a bounded in-memory history.
//!
//! - [`broker`]: Connection Registry, History Buffer, Message Router, heartbeat sweep
//! - [`websocket`]: session loop, frame dispatch, per-connection queues
//! - [`gateway`]: HTTP fallback for peers without a connection
//! - [`server`]: Axum router, listener lifecycle, graceful shutdown
//! - [`sms`]: optional SMS side channel
//! - [`auth`]: App Registration keys and permissions

#![deny(unsafe_code)]

pub mod auth;
pub mod broker;
pub mod config;
pub mod errors;
pub mod gateway;
pub mod health;
pub mod history;
pub mod metrics;
pub mod server;
pub mod shutdown;
pub mod sms;
pub mod websocket;

pub use broker::{Broker, PublishError, PublishPath, RegisterOutcome, SweepReport};
pub use config::ServerConfig;
pub use errors::ServerError;
pub use server::{FramecastServer, ServerHandle};
