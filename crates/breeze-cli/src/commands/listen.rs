//! Listen command implementation.

use std::io::{self, Write};

use anyhow::Result;

use breeze_core::config::Config;
use breeze_core::file::format_size;
use breeze_core::transfer::{self, OfferCallback, ProgressCallback};

use super::{render_progress, ListenArgs};

/// Run the listen command.
pub async fn run(args: ListenArgs) -> Result<()> {
    let mut config = Config::load_or_init()?;
    if let Some(output) = args.output {
        config.download_dir = output;
    }

    if !args.quiet {
        println!();
        println!("breeze v{}", breeze_core::VERSION);
        println!("{}", "-".repeat(37));
        println!();
        println!("  Announcing as '{}' ({})", config.alias, config.device_id);
        println!("  Saving received files to {}", config.download_dir.display());
        println!();
        println!("  Waiting for transfers... (Ctrl-C to stop)");
        println!();
    }

    let auto_accept = args.yes;
    let quiet = args.quiet;

    let on_offer: OfferCallback = Box::new(move |offer| {
        if !quiet {
            println!(
                "  Offer from '{}': {} item(s), {}",
                offer.alias,
                offer.total_files,
                format_size(offer.total_size)
            );
            for file in &offer.files {
                println!("    {} ({})", file.path, format_size(file.size));
            }
        }

        if auto_accept {
            return true;
        }

        prompt_accept().unwrap_or(false)
    });

    let on_progress: ProgressCallback = Box::new(move |progress| {
        if !quiet {
            render_progress(progress);
            if progress.total_bytes_transferred >= progress.total_bytes {
                println!();
            }
        }
    });

    transfer::run_listen(&config, on_offer, on_progress).await?;

    Ok(())
}

fn prompt_accept() -> io::Result<bool> {
    print!("  Accept transfer? [Y/n] ");
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let input = input.trim().to_lowercase();

    Ok(input.is_empty() || input == "y" || input == "yes")
}
