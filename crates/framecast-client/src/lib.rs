//! # framecast-client
//!
//! Peer side of the framecast notification broker. A [`PeerClient`] holds a
//! WebSocket to the broker, re-registers after every reconnect, and fans
//! inbound notifications out to local listeners. When the connection is
//! unavailable it publishes over the HTTP fallback, and after the reconnect
//! budget is spent it polls `GET /notifications` instead.
//!
//! - [`client`]: connection driver, publish path, local listeners
//! - [`options`]: client and reconnect configuration
//! - [`fallback`]: HTTP fallback gateway
//! - [`inbox`]: received notifications with read flags
//! - [`demo`]: synthetic data for demo mode

#![deny(unsafe_code)]

pub mod client;
pub mod demo;
pub mod errors;
pub mod fallback;
pub mod inbox;
pub mod listeners;
pub mod options;
pub mod state;

pub use client::{LifecycleHooks, PeerClient};
pub use errors::ClientError;
pub use inbox::InboxEntry;
pub use listeners::Disposer;
pub use options::{ClientOptions, ReconnectPolicy, SendOptions};
pub use state::ConnectionState;
