//! Receive side of the transfer engine.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::path::PathBuf;

use sha2::{Digest, Sha256};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use crate::error::{Error, Result};
use crate::file::is_safe_relative_path;
use crate::protocol::{read_message, write_message, Message, TransferResponse};
use crate::CHUNK_SIZE;

use super::{tune_stream, OfferCallback, ProgressCallback, TransferProgress};

/// TCP server accepting inbound transfers.
///
/// Connections are served one at a time; a failure aborts only the
/// connection it happened on.
pub struct TransferServer {
    /// Listening socket
    listener: TcpListener,
    /// Directory received files are written under
    download_dir: PathBuf,
    /// Decides each inbound offer
    on_offer: OfferCallback,
    /// Observes receive progress
    on_progress: ProgressCallback,
}

impl std::fmt::Debug for TransferServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransferServer")
            .field("download_dir", &self.download_dir)
            .finish_non_exhaustive()
    }
}

impl TransferServer {
    /// Bind the transfer listener on `0.0.0.0:port` with `SO_REUSEADDR`.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket cannot be created or bound.
    pub async fn bind(
        port: u16,
        download_dir: PathBuf,
        on_offer: OfferCallback,
        on_progress: ProgressCallback,
    ) -> Result<Self> {
        let socket = socket2::Socket::new(
            socket2::Domain::IPV4,
            socket2::Type::STREAM,
            Some(socket2::Protocol::TCP),
        )?;

        socket.set_reuse_address(true)?;

        let addr = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port);
        socket.bind(&addr.into())?;
        socket.listen(128)?;

        socket.set_nonblocking(true)?;

        let std_listener: std::net::TcpListener = socket.into();
        let listener = TcpListener::from_std(std_listener)?;

        Ok(Self {
            listener,
            download_dir,
            on_offer,
            on_progress,
        })
    }

    /// The address the server is listening on.
    ///
    /// # Errors
    ///
    /// Returns an error if the local address cannot be read.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept and serve connections until the task is dropped.
    ///
    /// Accept failures and per-connection errors are logged and the loop
    /// continues; this function only returns through cancellation.
    pub async fn run(&self) -> Result<()> {
        loop {
            match self.listener.accept().await {
                Ok((stream, peer_addr)) => {
                    tracing::info!("Connection from {}", peer_addr);
                    if let Err(e) = self.handle_connection(stream, peer_addr).await {
                        tracing::warn!("Transfer from {} failed: {}", peer_addr, e);
                    }
                }
                Err(e) => {
                    tracing::warn!("Accept failed: {}", e);
                }
            }
        }
    }

    /// Accept exactly one connection and serve it to completion.
    ///
    /// # Errors
    ///
    /// Returns the error that aborted the connection, if any.
    pub async fn accept_one(&self) -> Result<()> {
        let (stream, peer_addr) = self.listener.accept().await?;
        self.handle_connection(stream, peer_addr).await
    }

    /// Drive the receive-side state machine over one connection.
    async fn handle_connection(&self, mut stream: TcpStream, peer_addr: SocketAddr) -> Result<()> {
        tune_stream(&stream)?;

        let offer = match read_message(&mut stream).await? {
            Message::TransferOffer(offer) => offer,
            other => {
                return Err(Error::UnexpectedMessage {
                    expected: "transfer_offer".to_string(),
                    actual: other.variant().to_string(),
                })
            }
        };

        let accepted = (self.on_offer)(&offer);
        write_message(
            &mut stream,
            &Message::TransferResponse(TransferResponse {
                transfer_id: offer.transfer_id,
                accepted,
            }),
        )
        .await?;

        if !accepted {
            tracing::info!("Declined offer {} from '{}'", offer.transfer_id, offer.alias);
            let _ = stream.shutdown().await;
            return Ok(());
        }

        let mut progress = TransferProgress::new(offer.files.len(), offer.total_size);

        for index in 0..offer.files.len() {
            self.receive_file(&mut stream, peer_addr, index, &mut progress)
                .await?;
        }

        match read_message(&mut stream).await? {
            Message::TransferComplete {} => {}
            other => {
                return Err(Error::UnexpectedMessage {
                    expected: "transfer_complete".to_string(),
                    actual: other.variant().to_string(),
                })
            }
        }

        write_message(&mut stream, &Message::Ack {}).await?;
        stream.shutdown().await?;

        tracing::info!(
            "Received {} file(s) from '{}'",
            offer.files.len(),
            offer.alias
        );

        Ok(())
    }

    /// Receive one file: header, raw payload, checksum trailer.
    async fn receive_file(
        &self,
        stream: &mut TcpStream,
        peer_addr: SocketAddr,
        index: usize,
        progress: &mut TransferProgress,
    ) -> Result<()> {
        let header = match read_message(stream).await? {
            Message::FileHeader(header) => header,
            other => {
                return Err(Error::UnexpectedMessage {
                    expected: "file_header".to_string(),
                    actual: other.variant().to_string(),
                })
            }
        };

        // The path comes from an untrusted peer; nothing touches the
        // filesystem until it passes.
        if !is_safe_relative_path(&header.path) {
            return Err(Error::PathInvalid(header.path));
        }

        let output_path = self.download_dir.join(&header.path);
        if let Some(parent) = output_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let file_name = header.path.rsplit('/').next().unwrap_or(&header.path);
        progress.begin_file(index, file_name, header.size);

        let checksum = {
            let mut file = tokio::fs::File::create(&output_path).await?;
            let mut hasher = Sha256::new();
            let mut buf = vec![0u8; CHUNK_SIZE];
            let mut remaining = header.size;

            while remaining > 0 {
                #[allow(clippy::cast_possible_truncation)]
                let want = remaining.min(buf.len() as u64) as usize;
                let n = stream.read(&mut buf[..want]).await?;
                if n == 0 {
                    return Err(Error::ConnectionLost(peer_addr));
                }

                hasher.update(&buf[..n]);
                file.write_all(&buf[..n]).await?;
                remaining -= n as u64;

                progress.advance(n as u64);
                (self.on_progress)(progress);
            }

            file.flush().await?;
            format!("{:x}", hasher.finalize())
        };
        // File handle is closed here, before any verification verdict.

        let complete = match read_message(stream).await? {
            Message::FileComplete(complete) => complete,
            other => {
                return Err(Error::UnexpectedMessage {
                    expected: "file_complete".to_string(),
                    actual: other.variant().to_string(),
                })
            }
        };

        if complete.checksum != checksum {
            if let Err(e) = tokio::fs::remove_file(&output_path).await {
                tracing::warn!(
                    "Failed to remove corrupt file {}: {}",
                    output_path.display(),
                    e
                );
            }
            return Err(Error::ChecksumMismatch { file: header.path });
        }

        (self.on_progress)(progress);

        Ok(())
    }
}
