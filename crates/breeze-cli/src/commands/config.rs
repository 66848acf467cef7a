//! Config command implementation.

use anyhow::Result;

use breeze_core::config::Config;

use super::{ConfigAction, ConfigArgs};

/// Run the config command.
pub async fn run(args: ConfigArgs) -> Result<()> {
    match args.action {
        ConfigAction::Show => {
            let config = Config::load_or_init()?;

            println!();
            println!("  Config file: {}", Config::config_path().display());
            println!();
            println!("  device_id    = {}", config.device_id);
            println!("  alias        = {}", config.alias);
            println!("  listen_port  = {}", config.listen_port);
            println!("  download_dir = {}", config.download_dir.display());
            println!();
        }
        ConfigAction::Set {
            alias,
            listen_port,
            download_dir,
        } => {
            let mut config = Config::load_or_init()?;

            if let Some(alias) = alias {
                config.alias = alias;
            }
            if let Some(port) = listen_port {
                config.listen_port = port;
            }
            if let Some(dir) = download_dir {
                config.download_dir = dir;
            }

            config.save()?;
            println!("  Saved {}", Config::config_path().display());
        }
    }

    Ok(())
}
