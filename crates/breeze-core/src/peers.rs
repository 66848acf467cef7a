//! Live peer table.
//!
//! Discovery feeds this table; the send path and the CLI read snapshots
//! from it. It is the only state shared between the background tasks, and
//! every operation takes the single table-wide lock for its full duration.
//! Nothing awaits while holding the lock.

use std::collections::HashMap;
use std::net::IpAddr;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::Mutex;
use uuid::Uuid;

/// A device currently announcing itself on the local network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Peer {
    /// Unique device identifier, the table key
    pub device_id: Uuid,
    /// Device display name
    pub alias: String,
    /// Address the announce arrived from
    pub address: IpAddr,
    /// TCP port where the peer accepts transfers
    pub port: u16,
    /// When the most recent announce arrived, seconds since the Unix epoch
    pub last_active: u64,
}

/// Concurrent map of device id → peer record.
#[derive(Debug, Default)]
pub struct PeerTable {
    inner: Mutex<HashMap<Uuid, Peer>>,
}

impl PeerTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// Insert or refresh a peer. Last write wins on every field.
    pub async fn add_or_update(&self, peer: Peer) {
        self.inner.lock().await.insert(peer.device_id, peer);
    }

    /// Look up a peer by device id.
    pub async fn get(&self, device_id: Uuid) -> Option<Peer> {
        self.inner.lock().await.get(&device_id).cloned()
    }

    /// Evict every peer whose last announce is older than `max_age_secs`.
    ///
    /// The current time is read once per call.
    pub async fn remove_stale(&self, max_age_secs: u64) {
        let now = now_epoch_secs();
        self.inner
            .lock()
            .await
            .retain(|_, peer| now.saturating_sub(peer.last_active) <= max_age_secs);
    }

    /// Return an owned copy of all peers. Iteration order is unspecified.
    pub async fn snapshot(&self) -> Vec<Peer> {
        self.inner.lock().await.values().cloned().collect()
    }

    /// Number of peers currently in the table.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    /// Whether the table is empty.
    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.is_empty()
    }
}

/// Current time as seconds since the Unix epoch.
#[must_use]
pub fn now_epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn sample_peer(alias: &str, last_active: u64) -> Peer {
        Peer {
            device_id: Uuid::new_v4(),
            alias: alias.to_string(),
            address: IpAddr::V4(Ipv4Addr::new(192, 168, 1, 20)),
            port: 53318,
            last_active,
        }
    }

    #[tokio::test]
    async fn test_add_then_snapshot() {
        let table = PeerTable::new();
        table.add_or_update(sample_peer("a", now_epoch_secs())).await;
        table.add_or_update(sample_peer("b", now_epoch_secs())).await;

        assert_eq!(table.len().await, 2);
        assert_eq!(table.snapshot().await.len(), 2);
    }

    #[tokio::test]
    async fn test_reannounce_overwrites_all_fields() {
        let table = PeerTable::new();
        let mut peer = sample_peer("old-name", 100);
        table.add_or_update(peer.clone()).await;

        peer.alias = "new-name".to_string();
        peer.port = 60000;
        peer.last_active = 200;
        table.add_or_update(peer.clone()).await;

        assert_eq!(table.len().await, 1);
        let stored = table.get(peer.device_id).await.expect("present");
        assert_eq!(stored, peer);
    }

    #[tokio::test]
    async fn test_add_or_update_is_idempotent() {
        let table = PeerTable::new();
        let peer = sample_peer("same", now_epoch_secs());

        table.add_or_update(peer.clone()).await;
        let once = table.snapshot().await;

        table.add_or_update(peer).await;
        let twice = table.snapshot().await;

        assert_eq!(once, twice);
    }

    #[tokio::test]
    async fn test_remove_stale_keeps_fresh_peers() {
        let table = PeerTable::new();
        let now = now_epoch_secs();
        table.add_or_update(sample_peer("fresh", now)).await;
        table.add_or_update(sample_peer("stale", now - 60)).await;

        table.remove_stale(15).await;

        let peers = table.snapshot().await;
        assert_eq!(peers.len(), 1);
        assert_eq!(peers[0].alias, "fresh");
        assert!(peers.iter().all(|p| now - p.last_active <= 15));
    }

    #[tokio::test]
    async fn test_remove_stale_boundary_is_inclusive() {
        let table = PeerTable::new();
        let now = now_epoch_secs();
        table.add_or_update(sample_peer("edge", now - 15)).await;

        table.remove_stale(15).await;
        assert_eq!(table.len().await, 1);
    }

    #[tokio::test]
    async fn test_snapshot_is_an_owned_copy() {
        let table = PeerTable::new();
        table.add_or_update(sample_peer("a", now_epoch_secs())).await;

        let snapshot = table.snapshot().await;
        table.remove_stale(0).await;
        table.add_or_update(sample_peer("b", now_epoch_secs())).await;

        // The copy is unaffected by later table mutation
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].alias, "a");
    }
}
