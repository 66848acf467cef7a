//! Send side of the transfer engine.

use std::net::SocketAddr;

use sha2::{Digest, Sha256};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::file::{is_safe_relative_path, FileEntry};
use crate::protocol::{
    read_message, write_message, FileComplete, FileHeader, FileInfo, Message, TransferOffer,
};
use crate::CHUNK_SIZE;

use super::{tune_stream, ProgressCallback, TransferProgress};

/// An outbound transfer connection to one peer.
pub struct SendSession {
    /// Connection to the peer's transfer port
    stream: TcpStream,
    /// This device's id, carried in the offer
    device_id: Uuid,
    /// This device's display name, carried in the offer
    alias: String,
}

impl std::fmt::Debug for SendSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SendSession")
            .field("device_id", &self.device_id)
            .field("alias", &self.alias)
            .finish_non_exhaustive()
    }
}

impl SendSession {
    /// Dial a peer's transfer port and tune the socket.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    pub async fn connect(addr: SocketAddr, device_id: Uuid, alias: &str) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        tune_stream(&stream)?;

        tracing::info!("Connected to {}", addr);

        Ok(Self {
            stream,
            device_id,
            alias: alias.to_string(),
        })
    }

    /// Offer `entries` to the peer and, if accepted, stream every file and
    /// wait for the closing `ack`.
    ///
    /// An empty `entries` slice is a valid transfer; it degenerates to the
    /// offer/response and complete/ack exchanges.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TransferRejected`] if the peer declines, or the
    /// first fatal protocol, filesystem, or I/O error otherwise.
    #[allow(clippy::cast_possible_truncation)]
    pub async fn send(
        mut self,
        entries: &[FileEntry],
        on_progress: &ProgressCallback,
    ) -> Result<()> {
        for entry in entries {
            if !is_safe_relative_path(&entry.relative_path) {
                return Err(Error::PathInvalid(entry.relative_path.clone()));
            }
        }

        let files: Vec<FileInfo> = entries
            .iter()
            .map(|entry| FileInfo {
                id: Uuid::new_v4(),
                path: entry.relative_path.clone(),
                size: entry.size,
                modified: entry.modified,
            })
            .collect();
        let total_size: u64 = entries.iter().map(|entry| entry.size).sum();
        let transfer_id = Uuid::new_v4();

        write_message(
            &mut self.stream,
            &Message::TransferOffer(TransferOffer {
                transfer_id,
                device_id: self.device_id,
                alias: self.alias.clone(),
                files: files.clone(),
                total_size,
                total_files: files.len() as u32,
            }),
        )
        .await?;

        let response = match read_message(&mut self.stream).await? {
            Message::TransferResponse(response) => response,
            other => {
                return Err(Error::UnexpectedMessage {
                    expected: "transfer_response".to_string(),
                    actual: other.variant().to_string(),
                })
            }
        };

        if !response.accepted {
            let _ = self.stream.shutdown().await;
            return Err(Error::TransferRejected);
        }

        let mut progress = TransferProgress::new(entries.len(), total_size);

        for (index, (entry, info)) in entries.iter().zip(&files).enumerate() {
            progress.begin_file(index, entry.file_name(), entry.size);
            self.stream_file(entry, info, &mut progress, on_progress)
                .await?;
        }

        write_message(&mut self.stream, &Message::TransferComplete {}).await?;

        match read_message(&mut self.stream).await? {
            Message::Ack {} => {}
            other => {
                return Err(Error::UnexpectedMessage {
                    expected: "ack".to_string(),
                    actual: other.variant().to_string(),
                })
            }
        }

        self.stream.shutdown().await?;

        tracing::info!("Sent {} file(s), transfer {}", entries.len(), transfer_id);

        Ok(())
    }

    /// Send one file: header, raw payload, checksum trailer.
    async fn stream_file(
        &mut self,
        entry: &FileEntry,
        info: &FileInfo,
        progress: &mut TransferProgress,
        on_progress: &ProgressCallback,
    ) -> Result<()> {
        write_message(
            &mut self.stream,
            &Message::FileHeader(FileHeader {
                id: info.id,
                path: entry.relative_path.clone(),
                size: entry.size,
            }),
        )
        .await?;

        let mut file = tokio::fs::File::open(&entry.absolute_path).await?;
        let mut hasher = Sha256::new();
        let mut buf = vec![0u8; CHUNK_SIZE];

        loop {
            let n = file.read(&mut buf).await?;
            if n == 0 {
                break;
            }

            hasher.update(&buf[..n]);
            self.stream.write_all(&buf[..n]).await?;

            progress.advance(n as u64);
            on_progress(progress);
        }

        write_message(
            &mut self.stream,
            &Message::FileComplete(FileComplete {
                id: info.id,
                checksum: format!("{:x}", hasher.finalize()),
            }),
        )
        .await?;

        on_progress(progress);

        Ok(())
    }
}
