//! breeze CLI - peer-to-peer local network file transfer
//!
//! Devices running `breeze listen` announce themselves on the local
//! network; `breeze send` discovers them and streams files directly.
//!
//! ## Quick Start
//!
//! ```bash
//! # Receive files (announces this device)
//! breeze listen
//!
//! # Send files (on another device)
//! breeze send Marcus-Laptop ./document.pdf
//! ```

#![allow(clippy::doc_markdown)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::unused_async)]

use anyhow::Result;
use clap::Parser;

mod commands;

use commands::{Cli, Command};

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let cli = Cli::parse();

    match cli.command {
        Command::Listen(args) => commands::listen::run(args).await,
        Command::Send(args) => commands::send::run(args).await,
        Command::Peers(args) => commands::peers::run(args).await,
        Command::Config(args) => commands::config::run(args).await,
    }
}

fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,breeze=info,breeze_core=info"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).without_time())
        .with(filter)
        .init();
}
