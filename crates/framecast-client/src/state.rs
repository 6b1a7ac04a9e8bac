//! Connection state machine.

use std::fmt;
use std::time::Duration;

use tokio::sync::watch;

/// Where the client's connection currently is.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConnectionState {
    /// No connection and none being opened.
    #[default]
    Disconnected,
    /// Handshake in progress.
    Connecting,
    /// Open and registered.
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
        })
    }
}

/// Observable connection state.
#[derive(Debug)]
pub struct StateCell {
    tx: watch::Sender<ConnectionState>,
}

impl Default for StateCell {
    fn default() -> Self {
        Self::new()
    }
}

impl StateCell {
    /// Starts `Disconnected`.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(ConnectionState::Disconnected);
        Self { tx }
    }

    /// Current state.
    pub fn get(&self) -> ConnectionState {
        *self.tx.borrow()
    }

    /// Transition; returns the previous state.
    pub fn set(&self, next: ConnectionState) -> ConnectionState {
        self.tx.send_replace(next)
    }

    /// Subscribe to transitions.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.tx.subscribe()
    }

    /// Wait until the state equals `target`, up to `timeout`.
    pub async fn wait_for(&self, target: ConnectionState, timeout: Duration) -> bool {
        let mut rx = self.subscribe();
        tokio::time::timeout(timeout, rx.wait_for(|s| *s == target))
            .await
            .is_ok_and(|r| r.is_ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_disconnected() {
        assert_eq!(StateCell::new().get(), ConnectionState::Disconnected);
    }

    #[test]
    fn set_returns_previous() {
        let cell = StateCell::new();
        assert_eq!(cell.set(ConnectionState::Connecting), ConnectionState::Disconnected);
        assert_eq!(cell.get(), ConnectionState::Connecting);
    }

    #[tokio::test]
    async fn wait_for_sees_later_transition() {
        let cell = std::sync::Arc::new(StateCell::new());
        let setter = std::sync::Arc::clone(&cell);
        let _handle = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            let _ = setter.set(ConnectionState::Connected);
        });
        assert!(cell.wait_for(ConnectionState::Connected, Duration::from_secs(2)).await);
    }

    #[tokio::test]
    async fn wait_for_times_out() {
        let cell = StateCell::new();
        assert!(!cell.wait_for(ConnectionState::Connected, Duration::from_millis(20)).await);
    }

    #[test]
    fn display_lowercase() {
        assert_eq!(ConnectionState::Connecting.to_string(), "connecting");
    }
}
