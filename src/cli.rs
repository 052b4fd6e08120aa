//! CLI argument parsing

use clap::{Parser, Subcommand};
use qflasher_core::config::{
    FlashConfig, StorageType, DEFAULT_PROGRAMMER_NAME, DEFAULT_RESET_DELAY_SECS,
    DEFAULT_SAHARA_IDLE_LIMIT, DEFAULT_SCRIPT_NAME,
};
use std::path::PathBuf;

/// Lock file held while the modem is being flashed or reset
pub const DEFAULT_LOCK_FILE: &str = "/run/lock/power_override/qmodemhelper.lock";

#[derive(Parser)]
#[command(name = "qflasher")]
#[command(author, version, about = "Quectel modem firmware flasher", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Lock file announcing that the modem is busy
    #[arg(long, global = true, default_value = DEFAULT_LOCK_FILE)]
    pub lock_file: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

/// Firehose session options shared across commands
#[derive(clap::Args, Debug, Clone)]
pub struct SessionArgs {
    /// Storage medium of the modem
    #[arg(long, default_value = "nand")]
    pub storage: StorageType,

    /// Send setbootablestoragedrive before the final reset
    #[arg(long)]
    pub set_bootable: bool,

    /// Rawprogram script inside the oem directory
    #[arg(long, default_value = DEFAULT_SCRIPT_NAME)]
    pub script: String,

    /// Firehose programmer inside the oem directory
    #[arg(long, default_value = DEFAULT_PROGRAMMER_NAME)]
    pub programmer: String,

    /// Delay in seconds requested in the final reset
    #[arg(long, default_value_t = DEFAULT_RESET_DELAY_SECS)]
    pub reset_delay: u32,

    /// Consecutive empty reads tolerated in a multi-image transfer
    #[arg(long, default_value_t = DEFAULT_SAHARA_IDLE_LIMIT)]
    pub idle_limit: u32,
}

impl SessionArgs {
    /// Session configuration for the core engines
    pub fn to_config(&self) -> FlashConfig {
        FlashConfig {
            storage: self.storage,
            script_name: self.script.clone(),
            programmer_name: self.programmer.clone(),
            set_bootable: self.set_bootable,
            reset_delay_secs: self.reset_delay,
            sahara_idle_limit: self.idle_limit,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Flash firmware images to the modem
    Flash {
        /// Firmware directories, e.g. main:/fw/main,oem:/fw/oem,carrier:/fw/carrier
        #[arg(long)]
        fw: String,

        #[command(flatten)]
        session: SessionArgs,
    },

    /// Print `true` when the modem is in a download mode
    Mode,

    /// Reset the modem by pulsing its reset GPIO line
    #[cfg(feature = "gpio")]
    Reset {
        /// GPIO chip, as /dev/gpiochipN or N
        #[arg(long)]
        chip: String,

        /// Line offset of the reset pin
        #[arg(long)]
        line: u32,
    },

    /// Run only the Firehose phase against an already loaded programmer
    Firehose {
        /// Directory holding the rawprogram script and its images
        #[arg(long)]
        dir: PathBuf,

        #[command(flatten)]
        session: SessionArgs,
    },

    /// Parse and validate a rawprogram script without a device
    Parse {
        /// Rawprogram script
        #[arg(long)]
        script: PathBuf,
    },
}
