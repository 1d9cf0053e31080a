//! Ingest socket liveness.
//!
//! Each sweep pings every consumer that answered the previous ping and
//! terminates every consumer that did not. A terminated socket is dropped
//! without a close handshake; its reader then detaches it from the registry.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::core::session::{Outbound, SessionRegistry};

/// Interval between sweeps.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Outcome of one sweep.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepStats {
    pub pinged: usize,
    pub terminated: usize,
}

/// Run one liveness sweep over every session.
pub fn sweep(registry: &SessionRegistry) -> SweepStats {
    let mut stats = SweepStats::default();
    registry.for_each(|session| {
        for client in session.clients() {
            if client.take_alive() {
                client.send(Outbound::Ping);
                stats.pinged += 1;
            } else {
                debug!(
                    call_id = session.call_id(),
                    client_id = %client.id(),
                    "No pong since last sweep, terminating"
                );
                client.send(Outbound::Terminate);
                stats.terminated += 1;
            }
        }
    });
    stats
}

/// Sweep every `interval` until `cancel` fires.
pub fn spawn_heartbeat(
    registry: Arc<SessionRegistry>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let stats = sweep(&registry);
                    if stats.terminated > 0 {
                        info!(terminated = stats.terminated, pinged = stats.pinged, "Heartbeat sweep");
                    }
                }
            }
        }
        debug!("Heartbeat stopped");
    })
}
