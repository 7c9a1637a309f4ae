use std::{sync::Weak, time::Duration};

use shared::domain::{PlayerName, RoomId};
use tokio::{
    task::JoinHandle,
    time::{interval_at, Instant, MissedTickBehavior},
};
use tracing::{debug, info};

use crate::GameClient;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncSettings {
    pub poll_interval: Duration,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Tag drawn by every status request, in initiation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SyncTicket(u64);

/// Decides which status replies may still be applied.
///
/// A reply is admitted only if its ticket is newer than both the last applied ticket and the
/// last invalidation, so the latest-initiated request always wins and replies that outlive a
/// stopped driver are dropped.
#[derive(Debug, Default)]
pub struct SyncGate {
    issued: u64,
    floor: u64,
}

impl SyncGate {
    pub fn issue(&mut self) -> SyncTicket {
        self.issued += 1;
        SyncTicket(self.issued)
    }

    /// Consumes the ticket if it may be applied; callers apply under the same lock.
    pub fn admit(&mut self, ticket: SyncTicket) -> bool {
        if ticket.0 <= self.floor {
            return false;
        }
        self.floor = ticket.0;
        true
    }

    /// Refuses every ticket issued so far.
    pub fn invalidate(&mut self) {
        self.floor = self.issued;
    }
}

/// Identity a running driver polls for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Membership {
    pub room_id: RoomId,
    pub player_name: PlayerName,
}

/// The single live polling task of a client.
pub struct SyncTask {
    membership: Membership,
    handle: JoinHandle<()>,
}

impl SyncTask {
    pub fn spawn(client: Weak<GameClient>, membership: Membership, period: Duration) -> Self {
        info!(
            room_id = %membership.room_id,
            player = %membership.player_name,
            interval_ms = period.as_millis() as u64,
            "sync: starting driver"
        );
        let handle = tokio::spawn(poll_loop(client, period));
        Self { membership, handle }
    }

    /// A task for the same membership that is still running needs no restart.
    pub fn serves(&self, membership: &Membership) -> bool {
        self.membership == *membership && !self.handle.is_finished()
    }

    pub fn stop(self) {
        info!(
            room_id = %self.membership.room_id,
            player = %self.membership.player_name,
            "sync: stopping driver"
        );
        self.handle.abort();
    }
}

async fn poll_loop(client: Weak<GameClient>, period: Duration) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        let Some(client) = client.upgrade() else {
            debug!("sync: client dropped, ending driver");
            return;
        };
        // Failures are "no update this tick"; refresh already logged them.
        let _ = client.refresh().await;
    }
}

#[cfg(test)]
#[path = "tests/sync_tests.rs"]
mod tests;
