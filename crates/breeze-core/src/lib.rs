//! # Breeze Core Library
//!
//! `breeze-core` provides the core functionality for breeze, a peer-to-peer
//! local network file transfer tool.
//!
//! ## Features
//!
//! - **Automatic discovery**: devices on the same broadcast domain find each
//!   other via periodic UDP announces
//! - **Direct transfers**: files stream peer-to-peer over TCP with per-file
//!   SHA-256 verification
//! - **Bounded memory**: file payloads stream in fixed-size chunks, never
//!   buffered whole
//!
//! ## Modules
//!
//! - [`config`] - Configuration and device identity
//! - [`discovery`] - UDP broadcast peer discovery
//! - [`mod@file`] - File enumeration and path safety
//! - [`peers`] - Live peer table
//! - [`protocol`] - Wire messages and length-prefixed codec
//! - [`transfer`] - File transfer engine (server and client)
//!
//! ## Example
//!
//! ```rust,ignore
//! use breeze_core::config::Config;
//! use breeze_core::transfer;
//!
//! // Announce this device and wait for incoming transfers
//! let config = Config::load_or_init()?;
//! transfer::run_listen(&config, on_offer, on_progress).await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::unused_async)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::cast_precision_loss)]

pub mod config;
pub mod discovery;
pub mod error;
pub mod file;
pub mod peers;
pub mod protocol;
pub mod transfer;

pub use error::{Error, Result};

use std::time::Duration;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Announce protocol version
pub const PROTOCOL_VERSION: u32 = 1;

/// Well-known discovery port (UDP)
pub const DISCOVERY_PORT: u16 = 53317;

/// Default transfer port (TCP)
pub const DEFAULT_TRANSFER_PORT: u16 = 53318;

/// How often a device announces itself
pub const BROADCAST_INTERVAL: Duration = Duration::from_secs(5);

/// Age after which a silent peer is evicted (three missed announces)
pub const STALE_PEER_SECS: u64 = 15;

/// Chunk size for streaming file payloads (512 KiB)
pub const CHUNK_SIZE: usize = 512 * 1024;

/// Socket send/receive buffer size for transfer connections (2 MiB)
pub const SOCKET_BUFFER_SIZE: usize = 2 * 1024 * 1024;
