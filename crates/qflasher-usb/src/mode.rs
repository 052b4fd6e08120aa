//! Modem mode detection

use qflasher_core::usb::{parse_descriptors, ModemMode};

use crate::device::read_descriptors;
use crate::discovery::candidates;
use crate::error::Result;

/// Report the mode of the attached modem
///
/// A device in EDL wins over one in the download loader; no recognized
/// device at all reads as [`ModemMode::Normal`].
pub fn detect_mode() -> Result<ModemMode> {
    let mut modes = Vec::new();
    for info in candidates()? {
        let blob = match read_descriptors(&info) {
            Ok(blob) => blob,
            Err(e) => {
                log::debug!(
                    "Skipping bus {} address {}: {}",
                    info.busnum(),
                    info.device_address(),
                    e
                );
                continue;
            }
        };
        match parse_descriptors(&blob) {
            Ok(set) => modes.extend(ModemMode::classify(&set)),
            Err(e) => log::debug!("Unreadable descriptors: {}", e),
        }
    }
    Ok(combine(modes))
}

fn combine(modes: impl IntoIterator<Item = ModemMode>) -> ModemMode {
    let mut mode = ModemMode::Normal;
    for m in modes {
        match m {
            ModemMode::Edl => return ModemMode::Edl,
            ModemMode::Sbl => mode = ModemMode::Sbl,
            ModemMode::Normal => {}
        }
    }
    mode
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_combine() {
        assert_eq!(combine(Vec::<ModemMode>::new()), ModemMode::Normal);
        assert_eq!(combine([ModemMode::Normal, ModemMode::Sbl]), ModemMode::Sbl);
        assert_eq!(combine([ModemMode::Sbl, ModemMode::Edl]), ModemMode::Edl);
        assert_eq!(combine([ModemMode::Edl, ModemMode::Normal]), ModemMode::Edl);
    }
}
