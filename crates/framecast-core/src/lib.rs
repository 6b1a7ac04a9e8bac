//! # framecast-core
//!
//! Foundation types shared by the broker and the peer client:
//!
//! - [`notification`]: the canonical Notification Record and the inbound draft shape
//! - [`protocol`]: client ↔ broker wire messages as tagged sum types
//! - [`ids`]: branded ID newtypes
//! - [`retry`]: exponential backoff math used by the client reconnect loop
//! - [`constants`]: protocol-wide defaults (heartbeat interval, history size)

#![deny(unsafe_code)]

pub mod constants;
pub mod ids;
pub mod notification;
pub mod protocol;
pub mod retry;

pub use ids::{ConnectionId, NotificationId};
pub use notification::{NotificationDraft, NotificationRecord, NotificationType};
pub use protocol::{ClientEvent, ClientMessage, ProtocolError, ServerMessage};
