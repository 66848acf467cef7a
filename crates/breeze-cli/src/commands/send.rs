//! Send command implementation.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;

use breeze_core::config::Config;
use breeze_core::discovery::PeerListener;
use breeze_core::error::Error;
use breeze_core::peers::{Peer, PeerTable};
use breeze_core::transfer::{self, ProgressCallback};

use super::{render_progress, SendArgs};

/// Run the send command.
pub async fn run(args: SendArgs) -> Result<()> {
    let config = Config::load_or_init()?;

    if !args.quiet {
        println!();
        println!("  Looking for '{}'...", args.device);
    }

    let table = Arc::new(PeerTable::new());
    let mut listener = PeerListener::new_default(config.device_id, Arc::clone(&table)).await?;
    listener.start().await;

    let found = wait_for_peer(&table, &args.device, Duration::from_secs(args.wait)).await;
    listener.stop().await;

    let Some(peer) = found else {
        anyhow::bail!(Error::PeerNotFound(args.device));
    };

    if !args.quiet {
        println!("  Found '{}' at {}:{}", peer.alias, peer.address, peer.port);
        println!();
    }

    let quiet = args.quiet;
    let on_progress: ProgressCallback = Box::new(move |progress| {
        if !quiet {
            render_progress(progress);
        }
    });

    transfer::run_send(&config, &peer, &args.paths, &on_progress).await?;

    if !args.quiet {
        println!();
        println!();
        println!("  Transfer complete!");
        println!();
    }

    Ok(())
}

/// Poll the table until a peer matches `query` by alias or device id.
async fn wait_for_peer(table: &PeerTable, query: &str, timeout: Duration) -> Option<Peer> {
    let deadline = Instant::now() + timeout;

    loop {
        for peer in table.snapshot().await {
            if peer.alias.eq_ignore_ascii_case(query)
                || peer.device_id.to_string().eq_ignore_ascii_case(query)
            {
                return Some(peer);
            }
        }

        if Instant::now() >= deadline {
            return None;
        }

        tokio::time::sleep(Duration::from_millis(250)).await;
    }
}
