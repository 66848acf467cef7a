//! Wire protocol for breeze.
//!
//! Peers speak length-prefixed JSON over TCP:
//!
//! ```text
//! ┌──────────────┬──────────────────────────────┐
//! │    Length    │          JSON body           │
//! │   4 bytes    │      (variable length)       │
//! │ (big-endian) │                              │
//! └──────────────┴──────────────────────────────┘
//! ```
//!
//! The body is a single-key object naming the message variant, e.g.
//! `{"transfer_offer":{...}}`. Bodies carry only metadata and are capped at
//! 1 MiB; file contents are streamed as raw bytes between a `file_header`
//! and the matching `file_complete`, outside the framing.
//!
//! The `announce` message also exists as a raw, unframed JSON datagram on
//! the UDP discovery channel.

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Maximum framed message size (1 MiB)
pub const MAX_MESSAGE_SIZE: usize = 1024 * 1024;

/// Presence announcement, broadcast periodically over UDP.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Announce {
    /// Device display name
    pub alias: String,
    /// Unique device identifier
    pub device_id: Uuid,
    /// Announce protocol version
    pub version: u32,
    /// TCP port where this device accepts transfers
    pub port: u16,
}

impl Announce {
    /// Create an announce for this device.
    #[must_use]
    pub fn new(alias: &str, device_id: Uuid, port: u16) -> Self {
        Self {
            alias: alias.to_string(),
            device_id,
            version: crate::PROTOCOL_VERSION,
            port,
        }
    }
}

/// Metadata for one file within a transfer offer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    /// Sender-assigned id pairing the `file_header` with its
    /// `file_complete`
    pub id: Uuid,
    /// Relative path for the receiver, `/`-separated
    pub path: String,
    /// File size in bytes
    pub size: u64,
    /// Modification time, seconds since the Unix epoch
    pub modified: i64,
}

/// Proposal to transfer a set of files, sent by the dialing peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferOffer {
    /// Id of this transfer session
    pub transfer_id: Uuid,
    /// Sender's device id
    pub device_id: Uuid,
    /// Sender's display name
    pub alias: String,
    /// Files on offer, in transfer order
    pub files: Vec<FileInfo>,
    /// Sum of all file sizes
    pub total_size: u64,
    /// Number of files on offer
    pub total_files: u32,
}

/// Receiver's verdict on an offer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferResponse {
    /// Id of the transfer being answered
    pub transfer_id: Uuid,
    /// Whether the receiver accepts the transfer
    pub accepted: bool,
}

/// Introduces one file; exactly `size` raw bytes follow on the stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileHeader {
    /// File id from the offer
    pub id: Uuid,
    /// Relative path for the receiver
    pub path: String,
    /// Number of raw payload bytes that follow
    pub size: u64,
}

/// Closes one file's payload with its integrity checksum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileComplete {
    /// File id from the matching header
    pub id: Uuid,
    /// Lowercase hex SHA-256 of the payload bytes
    pub checksum: String,
}

/// A breeze protocol message.
///
/// Serializes as a single-key JSON object keyed by the variant name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Message {
    /// Presence announcement (UDP discovery channel only)
    Announce(Announce),
    /// Transfer proposal
    TransferOffer(TransferOffer),
    /// Accept/reject verdict for an offer
    TransferResponse(TransferResponse),
    /// Per-file header, followed by unframed payload bytes
    FileHeader(FileHeader),
    /// Per-file checksum trailer
    FileComplete(FileComplete),
    /// All files sent
    TransferComplete {},
    /// Final acknowledgment from the receiver
    Ack {},
}

impl Message {
    /// Wire name of this message's variant, for diagnostics.
    #[must_use]
    pub fn variant(&self) -> &'static str {
        match self {
            Self::Announce(_) => "announce",
            Self::TransferOffer(_) => "transfer_offer",
            Self::TransferResponse(_) => "transfer_response",
            Self::FileHeader(_) => "file_header",
            Self::FileComplete(_) => "file_complete",
            Self::TransferComplete {} => "transfer_complete",
            Self::Ack {} => "ack",
        }
    }
}

/// Read one framed message from a stream.
///
/// The length prefix is validated against [`MAX_MESSAGE_SIZE`] before the
/// body is read, so a hostile peer cannot force an unbounded allocation.
///
/// # Errors
///
/// Returns [`Error::MessageTooLarge`] for an oversized prefix,
/// [`Error::Protocol`] for a malformed or unknown body, and an I/O error
/// for a short read.
pub async fn read_message<R>(reader: &mut R) -> Result<Message>
where
    R: AsyncReadExt + Unpin,
{
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf).await?;

    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_MESSAGE_SIZE {
        return Err(Error::MessageTooLarge(len));
    }

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;

    serde_json::from_slice(&body).map_err(|e| Error::Protocol(format!("malformed message: {e}")))
}

/// Write one framed message to a stream and flush.
///
/// # Errors
///
/// Returns [`Error::MessageTooLarge`] if the serialized body exceeds
/// [`MAX_MESSAGE_SIZE`], or an I/O error if writing fails.
#[allow(clippy::cast_possible_truncation)]
pub async fn write_message<W>(writer: &mut W, msg: &Message) -> Result<()>
where
    W: AsyncWriteExt + Unpin,
{
    let body = serde_json::to_vec(msg).map_err(|e| Error::Serialization(e.to_string()))?;
    if body.len() > MAX_MESSAGE_SIZE {
        return Err(Error::MessageTooLarge(body.len()));
    }

    writer.write_all(&(body.len() as u32).to_be_bytes()).await?;
    writer.write_all(&body).await?;
    writer.flush().await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sample_offer() -> Message {
        Message::TransferOffer(TransferOffer {
            transfer_id: Uuid::new_v4(),
            device_id: Uuid::new_v4(),
            alias: "laptop".to_string(),
            files: vec![FileInfo {
                id: Uuid::new_v4(),
                path: "notes/todo.txt".to_string(),
                size: 42,
                modified: 1_700_000_000,
            }],
            total_size: 42,
            total_files: 1,
        })
    }

    fn all_variants() -> Vec<Message> {
        vec![
            Message::Announce(Announce::new("laptop", Uuid::new_v4(), 53318)),
            sample_offer(),
            Message::TransferResponse(TransferResponse {
                transfer_id: Uuid::new_v4(),
                accepted: true,
            }),
            Message::FileHeader(FileHeader {
                id: Uuid::new_v4(),
                path: "a/b.txt".to_string(),
                size: 7,
            }),
            Message::FileComplete(FileComplete {
                id: Uuid::new_v4(),
                checksum: "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
                    .to_string(),
            }),
            Message::TransferComplete {},
            Message::Ack {},
        ]
    }

    #[tokio::test]
    async fn test_roundtrip_every_variant() {
        for msg in all_variants() {
            let mut buffer = Vec::new();
            write_message(&mut buffer, &msg).await.expect("write");

            let mut cursor = Cursor::new(buffer);
            let decoded = read_message(&mut cursor).await.expect("read");
            assert_eq!(decoded, msg);
        }
    }

    #[tokio::test]
    async fn test_frame_prefix_is_body_length() {
        let mut buffer = Vec::new();
        write_message(&mut buffer, &sample_offer())
            .await
            .expect("write");

        let len = u32::from_be_bytes([buffer[0], buffer[1], buffer[2], buffer[3]]) as usize;
        assert_eq!(len, buffer.len() - 4);
    }

    #[test]
    fn test_single_key_wire_shape() {
        let json = serde_json::to_value(Message::Ack {}).expect("serialize");
        assert_eq!(json, serde_json::json!({"ack": {}}));

        let json = serde_json::to_value(Message::TransferComplete {}).expect("serialize");
        assert_eq!(json, serde_json::json!({"transfer_complete": {}}));

        let json = serde_json::to_value(sample_offer()).expect("serialize");
        let object = json.as_object().expect("object");
        assert_eq!(object.len(), 1);
        assert!(object.contains_key("transfer_offer"));
    }

    #[test]
    fn test_announce_wire_fields() {
        let device_id = Uuid::new_v4();
        let json =
            serde_json::to_value(Announce::new("desk", device_id, 53318)).expect("serialize");

        assert_eq!(json["alias"], "desk");
        assert_eq!(json["device_id"], device_id.to_string());
        assert_eq!(json["version"], 1);
        assert_eq!(json["port"], 53318);
    }

    #[tokio::test]
    async fn test_oversized_prefix_rejected_before_body() {
        // Only the 4-byte prefix is present; a body read would hit EOF,
        // so MessageTooLarge proves the body was never touched.
        let buffer = 1_048_577u32.to_be_bytes().to_vec();

        let mut cursor = Cursor::new(buffer);
        let result = read_message(&mut cursor).await;
        assert!(matches!(result, Err(Error::MessageTooLarge(1_048_577))));
    }

    #[tokio::test]
    async fn test_oversized_write_rejected() {
        let msg = Message::FileComplete(FileComplete {
            id: Uuid::new_v4(),
            checksum: "a".repeat(2 * 1024 * 1024),
        });

        let mut buffer = Vec::new();
        let result = write_message(&mut buffer, &msg).await;
        assert!(matches!(result, Err(Error::MessageTooLarge(_))));
        assert!(buffer.is_empty(), "nothing should be written");
    }

    #[tokio::test]
    async fn test_unknown_variant_is_fatal() {
        let body = br#"{"bogus":{}}"#;
        let mut buffer = Vec::new();
        buffer.extend_from_slice(&(body.len() as u32).to_be_bytes());
        buffer.extend_from_slice(body);

        let mut cursor = Cursor::new(buffer);
        let result = read_message(&mut cursor).await;
        assert!(matches!(result, Err(Error::Protocol(_))));
    }

    #[tokio::test]
    async fn test_truncated_body_is_fatal() {
        let mut buffer = Vec::new();
        write_message(&mut buffer, &Message::Ack {})
            .await
            .expect("write");
        buffer.truncate(buffer.len() - 2);

        let mut cursor = Cursor::new(buffer);
        let result = read_message(&mut cursor).await;
        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[test]
    fn test_variant_names() {
        assert_eq!(Message::Ack {}.variant(), "ack");
        assert_eq!(sample_offer().variant(), "transfer_offer");
    }
}
