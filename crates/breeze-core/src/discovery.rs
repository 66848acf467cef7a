//! UDP broadcast peer discovery.
//!
//! Every breeze device broadcasts a small announce datagram to
//! `255.255.255.255:53317` every 5 seconds and listens on the same port,
//! maintaining a live [`PeerTable`] of everything it hears.
//!
//! ## Protocol
//!
//! One raw JSON object per datagram, no length prefix:
//!
//! ```json
//! {"alias":"Marcus-Laptop","device_id":"<uuid>","version":1,"port":53318}
//! ```
//!
//! `port` is the TCP port where the announcing device accepts transfer
//! connections. The 5 s cadence against the 15 s staleness threshold gives
//! a peer three missed announces before eviction, tolerating transient
//! packet loss. Both loops are best-effort: send and parse failures are
//! logged and skipped, never surfaced.

use std::net::{Ipv4Addr, SocketAddrV4};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::peers::{now_epoch_secs, Peer, PeerTable};
use crate::protocol::Announce;
use crate::STALE_PEER_SECS;

/// Receive buffer for announce datagrams.
const RECV_BUFFER_SIZE: usize = 2048;

/// How often the listener sweeps stale peers from the table.
const PRUNE_INTERVAL: Duration = Duration::from_secs(5);

/// Open a discovery UDP socket on `0.0.0.0:bind_port` and hand it to
/// tokio.
///
/// All discovery sockets get `SO_REUSEADDR` (plus `SO_REUSEPORT` on Unix,
/// so several breeze processes on one host can share the port); the
/// broadcaster additionally needs `SO_BROADCAST`.
fn open_udp_socket(bind_port: u16, broadcast: bool) -> Result<UdpSocket> {
    let socket = socket2::Socket::new(
        socket2::Domain::IPV4,
        socket2::Type::DGRAM,
        Some(socket2::Protocol::UDP),
    )?;

    socket.set_reuse_address(true)?;
    #[cfg(unix)]
    socket.set_reuse_port(true)?;
    if broadcast {
        socket.set_broadcast(true)?;
    }

    let addr = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, bind_port);
    socket.bind(&addr.into())?;
    socket.set_nonblocking(true)?;

    Ok(UdpSocket::from_std(socket.into())?)
}

/// Periodically broadcasts this device's announce.
#[derive(Debug)]
pub struct Broadcaster {
    /// UDP socket for broadcasting, bound to an ephemeral port
    socket: Arc<UdpSocket>,
    /// Discovery port the announces are sent to
    port: u16,
    /// Wakes the announce loop so it can exit
    shutdown: Arc<Notify>,
    /// Running announce loop, if any
    task: Option<JoinHandle<()>>,
}

impl Broadcaster {
    /// Open a broadcast-capable socket targeting the given discovery port.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket cannot be created.
    pub async fn new(port: u16) -> Result<Self> {
        let socket = open_udp_socket(0, true)?;

        Ok(Self {
            socket: Arc::new(socket),
            port,
            shutdown: Arc::new(Notify::new()),
            task: None,
        })
    }

    /// Open a broadcaster targeting the well-known discovery port.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket cannot be created.
    pub async fn new_default() -> Result<Self> {
        Self::new(crate::DISCOVERY_PORT).await
    }

    /// Spawn the announce loop, sending one datagram every `interval`.
    ///
    /// The announce is serialized exactly once, up front; after that the
    /// loop only resends the same bytes, and individual send failures are
    /// logged and skipped. Calling `start` while already running is a
    /// no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the announce cannot be serialized.
    pub async fn start(&mut self, announce: Announce, interval: Duration) -> Result<()> {
        if self.task.is_some() {
            return Ok(());
        }

        let datagram =
            serde_json::to_vec(&announce).map_err(|e| Error::Serialization(e.to_string()))?;

        let socket = Arc::clone(&self.socket);
        let shutdown = Arc::clone(&self.shutdown);
        let destination = SocketAddrV4::new(Ipv4Addr::BROADCAST, self.port);

        self.task = Some(tokio::spawn(async move {
            loop {
                if let Err(e) = socket.send_to(&datagram, destination).await {
                    tracing::warn!("Announce send failed: {}", e);
                }

                // Sleep out the interval unless stop() wakes us first
                if timeout(interval, shutdown.notified()).await.is_ok() {
                    tracing::debug!("Announce loop stopping");
                    break;
                }
            }
        }));

        Ok(())
    }

    /// Ask the announce loop to exit and wait until it has.
    pub async fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            self.shutdown.notify_one();
            let _ = task.await;
        }
    }

    /// Whether the announce loop is running.
    #[must_use]
    pub fn is_broadcasting(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }
}

/// Listens for announces and keeps a [`PeerTable`] current.
#[derive(Debug)]
pub struct PeerListener {
    /// UDP socket bound to the discovery port
    socket: Arc<UdpSocket>,
    /// Table fed by received announces
    table: Arc<PeerTable>,
    /// This device's id, used to drop self-echoes
    local_device_id: Uuid,
    /// Wakes the listen loop so it can exit
    shutdown: Arc<Notify>,
    /// Running listen loop, if any
    task: Option<JoinHandle<()>>,
}

impl PeerListener {
    /// Create a listener bound to `0.0.0.0:port`.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket cannot be created or bound.
    pub async fn new(port: u16, local_device_id: Uuid, table: Arc<PeerTable>) -> Result<Self> {
        let socket = open_udp_socket(port, false)?;

        Ok(Self {
            socket: Arc::new(socket),
            table,
            local_device_id,
            shutdown: Arc::new(Notify::new()),
            task: None,
        })
    }

    /// Create a listener on the well-known discovery port.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket cannot be created or bound.
    pub async fn new_default(local_device_id: Uuid, table: Arc<PeerTable>) -> Result<Self> {
        Self::new(crate::DISCOVERY_PORT, local_device_id, table).await
    }

    /// The table this listener feeds.
    #[must_use]
    pub fn table(&self) -> Arc<PeerTable> {
        Arc::clone(&self.table)
    }

    /// Spawn the listen loop.
    ///
    /// Malformed datagrams and announces carrying our own device id are
    /// dropped; everything else upserts the peer table. Stale peers are
    /// swept every few seconds. Calling `start` while already running is a
    /// no-op.
    pub async fn start(&mut self) {
        if self.task.is_some() {
            return;
        }

        let socket = Arc::clone(&self.socket);
        let table = Arc::clone(&self.table);
        let local_device_id = self.local_device_id;
        let shutdown = Arc::clone(&self.shutdown);

        self.task = Some(tokio::spawn(async move {
            let mut buf = [0u8; RECV_BUFFER_SIZE];
            let mut prune = tokio::time::interval(PRUNE_INTERVAL);

            loop {
                tokio::select! {
                    () = shutdown.notified() => {
                        tracing::debug!("Listen loop stopping");
                        break;
                    }
                    _ = prune.tick() => {
                        table.remove_stale(STALE_PEER_SECS).await;
                    }
                    result = socket.recv_from(&mut buf) => {
                        match result {
                            Ok((len, source)) => {
                                if let Ok(announce) =
                                    serde_json::from_slice::<Announce>(&buf[..len])
                                {
                                    apply_announce(&table, local_device_id, announce, source.ip())
                                        .await;
                                }
                            }
                            Err(e) => {
                                tracing::warn!("Error receiving announce: {}", e);
                            }
                        }
                    }
                }
            }
        }));
    }

    /// Ask the listen loop to exit and wait until it has.
    pub async fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            self.shutdown.notify_one();
            let _ = task.await;
        }
    }

    /// Whether the listen loop is running.
    #[must_use]
    pub fn is_listening(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }
}

/// Fold one announce into the table. Returns false for self-echoes.
async fn apply_announce(
    table: &PeerTable,
    local_device_id: Uuid,
    announce: Announce,
    source: std::net::IpAddr,
) -> bool {
    if announce.device_id == local_device_id {
        return false;
    }

    table
        .add_or_update(Peer {
            device_id: announce.device_id,
            alias: announce.alias,
            address: source,
            port: announce.port,
            last_active: now_epoch_secs(),
        })
        .await;

    true
}
