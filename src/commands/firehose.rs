//! Firehose-only command

use std::path::Path;

use qflasher_core::config::FlashConfig;
use qflasher_core::firehose::FirehoseSession;

use crate::lock::LockGuard;
use crate::progress::IndicatifProgress;

/// Run the rawprogram script in `dir` against a modem whose programmer is
/// already running
pub fn run_firehose(
    dir: &Path,
    config: &FlashConfig,
    lock_file: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let _lock = LockGuard::acquire(lock_file)?;

    let modem = qflasher_usb::open_modem()?;
    let mut session = FirehoseSession::from_dir(modem, dir, config)?;
    println!("Loaded {} commands", session.commands().len());

    let report = session.run(&mut IndicatifProgress::new())?;
    super::print_report(&report);
    Ok(())
}
