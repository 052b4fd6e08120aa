//! qflasher - Firmware flasher for Quectel cellular modems
//!
//! Flashes firmware over USB using the Qualcomm download protocols:
//! - **Download loader** (modem switched by its firmware) - images are
//!   pulled by the device in a multi-image Sahara session
//! - **EDL** (boot-ROM emergency download) - a Firehose programmer is loaded
//!   over Sahara and then driven by a rawprogram script
//!
//! The flow is chosen from the mode the modem enumerates in.

mod cli;
mod commands;
mod lock;
mod progress;

use clap::Parser;
use cli::{Cli, Commands};

fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    if let Err(e) = run(cli) {
        log::error!("{}", e);
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Flash { fw, session } => {
            commands::flash::run_flash(&fw, &session.to_config(), &cli.lock_file)
        }
        Commands::Mode => commands::mode::run_mode(),
        #[cfg(feature = "gpio")]
        Commands::Reset { chip, line } => {
            commands::reset::run_reset(&chip, line, &cli.lock_file)
        }
        Commands::Firehose { dir, session } => {
            commands::firehose::run_firehose(&dir, &session.to_config(), &cli.lock_file)
        }
        Commands::Parse { script } => commands::parse::run_parse(&script),
    }
}
