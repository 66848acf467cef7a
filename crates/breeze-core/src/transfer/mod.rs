//! File transfer engine.
//!
//! This module implements both halves of a transfer:
//!
//! - [`TransferServer`] accepts connections and runs the receive-side state
//!   machine (offer → accept/reject → per-file streaming → complete)
//! - [`SendSession`] dials a peer and runs the mirrored send side
//!
//! [`run_listen`] and [`run_send`] compose these with discovery into the
//! two top-level operations a frontend drives. The frontend supplies two
//! callbacks: an offer decision and a progress observer.
//!
//! Within one connection the message order is fixed; the state machines
//! assume and enforce it. File payloads stream as raw bytes in 512 KiB
//! chunks between the framed `file_header` and `file_complete` messages,
//! so memory stays bounded regardless of file size. TCP flow control is
//! the only backpressure mechanism.

mod client;
mod server;

pub use client::SendSession;
pub use server::TransferServer;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::net::TcpStream;

use crate::config::Config;
use crate::discovery::{Broadcaster, PeerListener};
use crate::error::Result;
use crate::file::collect_entries;
use crate::peers::{Peer, PeerTable};
use crate::protocol::{Announce, TransferOffer};
use crate::{BROADCAST_INTERVAL, SOCKET_BUFFER_SIZE};

/// Decision callback invoked with each inbound offer; return `true` to
/// accept.
pub type OfferCallback = Box<dyn Fn(&TransferOffer) -> bool + Send + Sync>;

/// Observer callback invoked as transfer progress updates.
pub type ProgressCallback = Box<dyn Fn(&TransferProgress) + Send + Sync>;

/// Progress information for a transfer.
#[derive(Debug, Clone)]
pub struct TransferProgress {
    /// Current file index
    pub current_file: usize,
    /// Total number of files
    pub total_files: usize,
    /// Current file name
    pub current_file_name: String,
    /// Bytes transferred for the current file
    pub file_bytes_transferred: u64,
    /// Total bytes for the current file
    pub file_total_bytes: u64,
    /// Bytes transferred across all files
    pub total_bytes_transferred: u64,
    /// Total bytes across all files
    pub total_bytes: u64,
    /// Transfer speed in bytes per second
    pub speed_bps: u64,
    /// Estimated time remaining
    pub eta: Option<Duration>,
    /// When the transfer started
    pub started_at: Instant,
}

impl TransferProgress {
    /// Create a new progress tracker.
    #[must_use]
    pub fn new(total_files: usize, total_bytes: u64) -> Self {
        Self {
            current_file: 0,
            total_files,
            current_file_name: String::new(),
            file_bytes_transferred: 0,
            file_total_bytes: 0,
            total_bytes_transferred: 0,
            total_bytes,
            speed_bps: 0,
            eta: None,
            started_at: Instant::now(),
        }
    }

    /// Get overall progress as a percentage (0.0 - 100.0).
    #[must_use]
    pub fn percentage(&self) -> f64 {
        if self.total_bytes == 0 {
            100.0
        } else {
            (self.total_bytes_transferred as f64 / self.total_bytes as f64) * 100.0
        }
    }

    /// Move the tracker onto the next file.
    pub(crate) fn begin_file(&mut self, index: usize, name: &str, size: u64) {
        self.current_file = index;
        self.current_file_name = name.to_string();
        self.file_bytes_transferred = 0;
        self.file_total_bytes = size;
    }

    /// Account for `bytes` more payload and refresh speed/ETA.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub(crate) fn advance(&mut self, bytes: u64) {
        self.file_bytes_transferred += bytes;
        self.total_bytes_transferred += bytes;

        let elapsed = self.started_at.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.speed_bps = (self.total_bytes_transferred as f64 / elapsed) as u64;
            if self.speed_bps > 0 {
                let remaining = self.total_bytes.saturating_sub(self.total_bytes_transferred);
                self.eta = Some(Duration::from_secs(remaining / self.speed_bps));
            }
        }
    }
}

/// Tune a transfer socket: disable Nagle, widen both buffers.
pub(crate) fn tune_stream(stream: &TcpStream) -> Result<()> {
    stream.set_nodelay(true)?;

    let sock = socket2::SockRef::from(stream);
    sock.set_send_buffer_size(SOCKET_BUFFER_SIZE)?;
    sock.set_recv_buffer_size(SOCKET_BUFFER_SIZE)?;

    Ok(())
}

/// Announce this device and serve inbound transfers until shutdown.
///
/// Starts the discovery broadcaster and listener, then runs the transfer
/// server's accept loop on `config.listen_port`. `on_offer` decides each
/// inbound offer; `on_progress` observes receive progress.
///
/// # Errors
///
/// Returns an error if a socket cannot be bound or the announce cannot be
/// serialized. Per-connection failures are logged and do not end the loop.
pub async fn run_listen(
    config: &Config,
    on_offer: OfferCallback,
    on_progress: ProgressCallback,
) -> Result<()> {
    let table = Arc::new(PeerTable::new());

    let mut broadcaster = Broadcaster::new_default().await?;
    broadcaster
        .start(
            Announce::new(&config.alias, config.device_id, config.listen_port),
            BROADCAST_INTERVAL,
        )
        .await?;

    let mut listener = PeerListener::new_default(config.device_id, table).await?;
    listener.start().await;

    let server = TransferServer::bind(
        config.listen_port,
        config.download_dir.clone(),
        on_offer,
        on_progress,
    )
    .await?;

    let result = server.run().await;

    broadcaster.stop().await;
    listener.stop().await;

    result
}

/// Send files to a previously discovered peer.
///
/// Enumerates `paths` into file entries, dials the peer's transfer port,
/// and drives the send-side state machine to the final `ack`.
///
/// # Errors
///
/// Returns [`crate::Error::TransferRejected`] if the peer declines, or the
/// first fatal protocol, checksum, or I/O error otherwise.
pub async fn run_send(
    config: &Config,
    peer: &Peer,
    paths: &[PathBuf],
    on_progress: &ProgressCallback,
) -> Result<()> {
    let entries = collect_entries(paths)?;

    let addr = SocketAddr::new(peer.address, peer.port);
    let session = SendSession::connect(addr, config.device_id, &config.alias).await?;
    session.send(&entries, on_progress).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[allow(clippy::float_cmp)]
    fn test_progress_new() {
        let progress = TransferProgress::new(5, 1000);
        assert_eq!(progress.total_files, 5);
        assert_eq!(progress.total_bytes, 1000);
        assert_eq!(progress.percentage(), 0.0);
    }

    #[test]
    #[allow(clippy::float_cmp)]
    fn test_progress_percentage() {
        let mut progress = TransferProgress::new(2, 1000);
        progress.total_bytes_transferred = 500;
        assert_eq!(progress.percentage(), 50.0);

        progress.total_bytes_transferred = 1000;
        assert_eq!(progress.percentage(), 100.0);
    }

    #[test]
    #[allow(clippy::float_cmp)]
    fn test_empty_transfer_is_complete() {
        let progress = TransferProgress::new(0, 0);
        assert_eq!(progress.percentage(), 100.0);
    }

    #[test]
    fn test_begin_file_resets_file_counters() {
        let mut progress = TransferProgress::new(2, 20);
        progress.advance(10);
        progress.begin_file(1, "b.txt", 10);

        assert_eq!(progress.current_file, 1);
        assert_eq!(progress.current_file_name, "b.txt");
        assert_eq!(progress.file_bytes_transferred, 0);
        assert_eq!(progress.total_bytes_transferred, 10);
    }
}
