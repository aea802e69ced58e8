//! Ephemeral user presence.
//!
//! Presence is a lease: a connection marks the user online, heartbeats
//! refresh the lease, and closing the last connection flips the user
//! offline. A background sweeper expires leases that stopped heartbeating
//! (crashed client, dropped network) so presence self-corrects even on
//! ungraceful disconnects. Nothing here is persisted beyond the last known
//! state in memory.

use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceState {
    Online,
    Offline,
}

#[derive(Debug, Clone)]
struct Lease {
    state: PresenceState,
    /// Unix milliseconds of the last state change or heartbeat
    last_changed: i64,
    /// Number of live connections for this user
    connections: u32,
}

/// Presence snapshot for one user, as returned by the API
#[derive(Debug, Clone, Serialize)]
pub struct UserPresence {
    pub user_id: String,
    pub state: PresenceState,
    pub last_changed: i64,
}

/// In-process presence registry shared by all connections.
pub struct PresenceRegistry {
    leases: DashMap<String, Lease>,
    lease_ttl: Duration,
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

impl PresenceRegistry {
    pub fn new(lease_ttl: Duration) -> Self {
        Self {
            leases: DashMap::new(),
            lease_ttl,
        }
    }

    /// Register a live connection; the user is online as long as at least
    /// one connection holds the lease.
    pub fn connect(&self, user_id: &str) {
        let mut lease = self.leases.entry(user_id.to_string()).or_insert(Lease {
            state: PresenceState::Offline,
            last_changed: now_millis(),
            connections: 0,
        });
        lease.connections += 1;
        lease.state = PresenceState::Online;
        lease.last_changed = now_millis();
    }

    /// Refresh the lease for a connected user.
    pub fn heartbeat(&self, user_id: &str) {
        if let Some(mut lease) = self.leases.get_mut(user_id) {
            if lease.state == PresenceState::Online {
                lease.last_changed = now_millis();
            }
        }
    }

    /// Drop one connection; the last one flips the user offline.
    pub fn disconnect(&self, user_id: &str) {
        if let Some(mut lease) = self.leases.get_mut(user_id) {
            lease.connections = lease.connections.saturating_sub(1);
            if lease.connections == 0 {
                lease.state = PresenceState::Offline;
                lease.last_changed = now_millis();
            }
        }
    }

    /// Last known state of every user seen since startup.
    pub fn snapshot(&self) -> Vec<UserPresence> {
        let mut all: Vec<UserPresence> = self
            .leases
            .iter()
            .map(|entry| UserPresence {
                user_id: entry.key().clone(),
                state: entry.value().state,
                last_changed: entry.value().last_changed,
            })
            .collect();
        all.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        all
    }

    pub fn state_of(&self, user_id: &str) -> PresenceState {
        self.leases
            .get(user_id)
            .map(|l| l.state)
            .unwrap_or(PresenceState::Offline)
    }

    /// Expire online leases that have not heartbeat within the TTL.
    ///
    /// Returns the number of users flipped offline.
    pub fn sweep(&self) -> usize {
        let cutoff = now_millis() - self.lease_ttl.as_millis() as i64;
        let mut expired = 0;

        for mut entry in self.leases.iter_mut() {
            let lease = entry.value_mut();
            if lease.state == PresenceState::Online && lease.last_changed < cutoff {
                lease.state = PresenceState::Offline;
                lease.last_changed = now_millis();
                lease.connections = 0;
                expired += 1;
            }
        }

        if expired > 0 {
            tracing::debug!(expired = expired, "Expired stale presence leases");
        }
        expired
    }

    /// Spawn the background task that periodically expires stale leases.
    pub fn spawn_sweeper(self: &Arc<Self>, sweep_interval: Duration) -> tokio::task::JoinHandle<()> {
        let registry = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = interval(sweep_interval);
            loop {
                ticker.tick().await;
                registry.sweep();
            }
        })
    }

    #[cfg(test)]
    fn backdate(&self, user_id: &str, millis_ago: i64) {
        if let Some(mut lease) = self.leases.get_mut(user_id) {
            lease.last_changed = now_millis() - millis_ago;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> PresenceRegistry {
        PresenceRegistry::new(Duration::from_secs(60))
    }

    #[test]
    fn test_connect_marks_online() {
        let registry = registry();
        assert_eq!(registry.state_of("u1"), PresenceState::Offline);

        registry.connect("u1");
        assert_eq!(registry.state_of("u1"), PresenceState::Online);
    }

    #[test]
    fn test_last_disconnect_flips_offline() {
        let registry = registry();
        registry.connect("u1");
        registry.connect("u1"); // second tab

        registry.disconnect("u1");
        assert_eq!(registry.state_of("u1"), PresenceState::Online);

        registry.disconnect("u1");
        assert_eq!(registry.state_of("u1"), PresenceState::Offline);
    }

    #[test]
    fn test_sweep_expires_stale_leases() {
        let registry = registry();
        registry.connect("u1");
        registry.connect("u2");

        // u1 stops heartbeating
        registry.backdate("u1", 120_000);

        let expired = registry.sweep();
        assert_eq!(expired, 1);
        assert_eq!(registry.state_of("u1"), PresenceState::Offline);
        assert_eq!(registry.state_of("u2"), PresenceState::Online);
    }

    #[test]
    fn test_heartbeat_keeps_lease_alive() {
        let registry = registry();
        registry.connect("u1");
        registry.backdate("u1", 120_000);

        // A heartbeat arrives before the sweeper runs
        registry.heartbeat("u1");
        assert_eq!(registry.sweep(), 0);
        assert_eq!(registry.state_of("u1"), PresenceState::Online);
    }

    #[test]
    fn test_heartbeat_does_not_resurrect_offline_user() {
        let registry = registry();
        registry.connect("u1");
        registry.disconnect("u1");

        registry.heartbeat("u1");
        assert_eq!(registry.state_of("u1"), PresenceState::Offline);
    }

    #[test]
    fn test_snapshot_lists_last_known_states() {
        let registry = registry();
        registry.connect("u1");
        registry.connect("u2");
        registry.disconnect("u2");

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].user_id, "u1");
        assert_eq!(snapshot[0].state, PresenceState::Online);
        assert_eq!(snapshot[1].user_id, "u2");
        assert_eq!(snapshot[1].state, PresenceState::Offline);
    }
}
