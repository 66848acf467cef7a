//! CLI command definitions and handlers.

use std::io::{self, Write};
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use breeze_core::file::format_size;
use breeze_core::transfer::TransferProgress;

pub mod config;
pub mod listen;
pub mod peers;
pub mod send;

/// breeze - peer-to-peer local network file transfer
#[derive(Parser)]
#[command(name = "breeze")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand)]
pub enum Command {
    /// Announce this device and receive incoming transfers
    Listen(ListenArgs),

    /// Send files to a device on the network
    Send(SendArgs),

    /// List devices announcing on the network
    Peers(PeersArgs),

    /// Show or edit configuration
    Config(ConfigArgs),
}

/// Arguments for the listen command
#[derive(Parser)]
pub struct ListenArgs {
    /// Directory for received files (overrides the configured one)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Accept every offer without prompting
    #[arg(short, long)]
    pub yes: bool,

    /// Minimal output
    #[arg(short, long)]
    pub quiet: bool,
}

/// Arguments for the send command
#[derive(Parser)]
pub struct SendArgs {
    /// Alias or device id of the target device
    pub device: String,

    /// Files and folders to send
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Seconds to wait for the device to announce itself
    #[arg(long, default_value_t = 10)]
    pub wait: u64,

    /// Minimal output
    #[arg(short, long)]
    pub quiet: bool,
}

/// Arguments for the peers command
#[derive(Parser)]
pub struct PeersArgs {
    /// Seconds to listen for announces
    #[arg(long, default_value_t = 6)]
    pub wait: u64,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the config command
#[derive(Parser)]
pub struct ConfigArgs {
    /// The configuration action
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Configuration subcommands
#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the resolved configuration
    Show,

    /// Update configuration values
    Set {
        /// Display name announced to the network
        #[arg(long)]
        alias: Option<String>,

        /// TCP port for incoming transfers
        #[arg(long)]
        listen_port: Option<u16>,

        /// Directory for received files
        #[arg(long)]
        download_dir: Option<PathBuf>,
    },
}

/// Render one `\r`-style progress line.
pub(crate) fn render_progress(progress: &TransferProgress) {
    let eta = progress
        .eta
        .map_or_else(|| "--".to_string(), |d| format!("{}s", d.as_secs()));

    print!(
        "\r  [{:>6.2}%] {} - {}/s - ETA: {}    ",
        progress.percentage(),
        progress.current_file_name,
        format_size(progress.speed_bps),
        eta
    );
    let _ = io::stdout().flush();
}
