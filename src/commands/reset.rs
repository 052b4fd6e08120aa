//! Reset command

use std::path::Path;

use crate::lock::LockGuard;

/// Pulse the modem reset line
pub fn run_reset(
    chip: &str,
    line: u32,
    lock_file: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let _lock = LockGuard::acquire(lock_file)?;
    qflasher_gpio::reset_modem(chip, line)?;
    println!("Modem reset");
    Ok(())
}
