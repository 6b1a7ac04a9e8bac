//! Heartbeat Monitor: periodic liveness sweep over all connections.

use std::sync::Arc;
use std::time::Duration;

use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::broker::Broker;

/// Run [`Broker::sweep`] every `interval` until `cancel` fires.
///
/// The first sweep happens one full interval after start, so a freshly
/// accepted connection always gets a whole interval to answer.
pub async fn run_heartbeat(broker: Arc<Broker>, interval: Duration, cancel: CancellationToken) {
    let mut ticker = time::interval(interval);
    ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
    let _ = ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let _ = broker.sweep();
            }
            () = cancel.cancelled() => {
                debug!("heartbeat monitor stopped");
                return;
            }
        }
    }
}
