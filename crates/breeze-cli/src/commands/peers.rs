//! Peers command implementation.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use breeze_core::config::Config;
use breeze_core::discovery::PeerListener;
use breeze_core::peers::PeerTable;

use super::PeersArgs;

/// Run the peers command.
pub async fn run(args: PeersArgs) -> Result<()> {
    let config = Config::load_or_init()?;

    let table = Arc::new(PeerTable::new());
    let mut listener = PeerListener::new_default(config.device_id, Arc::clone(&table)).await?;
    listener.start().await;

    if !args.json {
        println!();
        println!("  Listening for announces ({}s)...", args.wait);
    }

    tokio::time::sleep(Duration::from_secs(args.wait)).await;
    listener.stop().await;

    let mut devices = table.snapshot().await;
    devices.sort_by(|a, b| a.alias.cmp(&b.alias));

    if args.json {
        let output = serde_json::json!({
            "peers": devices.iter().map(|p| serde_json::json!({
                "device_id": p.device_id.to_string(),
                "alias": p.alias,
                "address": p.address.to_string(),
                "port": p.port,
                "last_active": p.last_active,
            })).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!();
    println!("Devices on Network:");
    println!("{}", "─".repeat(78));
    println!(
        "  {:16}  {:36}  {:15}  {:5}",
        "Alias", "Device Id", "Address", "Port"
    );
    println!("{}", "─".repeat(78));

    if devices.is_empty() {
        println!("  (no devices found)");
    } else {
        for peer in &devices {
            println!(
                "  {:16}  {:36}  {:15}  {:5}",
                peer.alias,
                peer.device_id.to_string(),
                peer.address.to_string(),
                peer.port
            );
        }
    }

    println!("{}", "─".repeat(78));

    Ok(())
}
