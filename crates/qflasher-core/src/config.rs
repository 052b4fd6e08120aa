//! Session configuration
//!
//! Settings threaded into the Sahara and Firehose engines at construction.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::Error;

/// Default rawprogram script file name
pub const DEFAULT_SCRIPT_NAME: &str = "rawprogram_nand_p2K_b128K_recovery.xml";
/// Default Firehose programmer file name
pub const DEFAULT_PROGRAMMER_NAME: &str = "prog_nand_firehose_9x55.mbn";
/// Default delay requested in the Firehose reset command
pub const DEFAULT_RESET_DELAY_SECS: u32 = 10;
/// Default number of consecutive empty reads tolerated in a multi-image session
pub const DEFAULT_SAHARA_IDLE_LIMIT: u32 = 12;

/// Storage medium advertised in the Firehose configure command
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StorageType {
    /// Raw NAND
    #[default]
    Nand,
    /// eMMC
    Emmc,
    /// UFS
    Ufs,
}

impl StorageType {
    /// Name used in the `MemoryName` attribute
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageType::Nand => "nand",
            StorageType::Emmc => "emmc",
            StorageType::Ufs => "ufs",
        }
    }
}

impl fmt::Display for StorageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StorageType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "nand" => Ok(StorageType::Nand),
            "emmc" => Ok(StorageType::Emmc),
            "ufs" => Ok(StorageType::Ufs),
            other => Err(Error::InvalidArgument(format!(
                "unknown storage type '{}' (expected nand, emmc or ufs)",
                other
            ))),
        }
    }
}

/// Flashing session configuration
#[derive(Debug, Clone)]
pub struct FlashConfig {
    /// Storage medium of the target
    pub storage: StorageType,
    /// Rawprogram script file name inside the oem directory
    pub script_name: String,
    /// Firehose programmer file name inside the oem directory
    pub programmer_name: String,
    /// Send `setbootablestoragedrive` before the final reset
    pub set_bootable: bool,
    /// Delay requested in the Firehose reset command
    pub reset_delay_secs: u32,
    /// Consecutive empty reads tolerated while waiting in a multi-image
    /// Sahara session
    pub sahara_idle_limit: u32,
}

impl Default for FlashConfig {
    fn default() -> Self {
        Self {
            storage: StorageType::default(),
            script_name: DEFAULT_SCRIPT_NAME.to_string(),
            programmer_name: DEFAULT_PROGRAMMER_NAME.to_string(),
            set_bootable: false,
            reset_delay_secs: DEFAULT_RESET_DELAY_SECS,
            sahara_idle_limit: DEFAULT_SAHARA_IDLE_LIMIT,
        }
    }
}

impl FlashConfig {
    /// Upper bound on how long a multi-image session waits for the device
    pub fn sahara_idle_budget(&self) -> Duration {
        crate::sahara::READ_TIMEOUT * self.sahara_idle_limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_parse() {
        assert_eq!("nand".parse::<StorageType>().unwrap(), StorageType::Nand);
        assert_eq!("UFS".parse::<StorageType>().unwrap(), StorageType::Ufs);
        assert!("sdcard".parse::<StorageType>().is_err());
        assert_eq!(StorageType::Emmc.to_string(), "emmc");
    }

    #[test]
    fn test_defaults() {
        let config = FlashConfig::default();
        assert_eq!(config.storage, StorageType::Nand);
        assert_eq!(config.script_name, DEFAULT_SCRIPT_NAME);
        assert!(!config.set_bootable);
        assert_eq!(config.sahara_idle_budget(), Duration::from_secs(60));
    }
}
