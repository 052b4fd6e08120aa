//! Mode command

/// Print whether the modem is in a download mode
pub fn run_mode() -> Result<(), Box<dyn std::error::Error>> {
    let mode = qflasher_usb::detect_mode()?;
    log::debug!("Modem mode: {:?}", mode);
    println!("{}", mode.is_download());
    Ok(())
}
