//! Flash command

use std::path::Path;

use qflasher_core::config::FlashConfig;
use qflasher_core::flows;
use qflasher_core::layout::FirmwareLayout;
use qflasher_core::usb::ModemMode;

use crate::lock::LockGuard;
use crate::progress::IndicatifProgress;

/// Flash the firmware in `fw` using the flow matching the modem's mode
pub fn run_flash(
    fw: &str,
    config: &FlashConfig,
    lock_file: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let layout = FirmwareLayout::parse(fw)?;
    let _lock = LockGuard::acquire(lock_file)?;

    let mode = qflasher_usb::detect_mode()?;
    log::info!("Modem mode: {:?}", mode);
    if mode == ModemMode::Normal {
        return Err("modem is not in a download mode; switch it to download mode first".into());
    }

    let mut modem = qflasher_usb::open_modem()?;
    let mut progress = IndicatifProgress::new();

    if modem.is_edl() {
        println!("Modem is in EDL mode, loading programmer");
        let report = flows::flash_edl(&mut modem, &layout, config, &mut progress)?;
        super::print_report(&report);
    } else {
        flows::flash_all(&mut modem, &layout, config, &mut progress)?;
        println!("All images flashed");
    }
    Ok(())
}
