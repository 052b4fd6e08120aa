//! End-to-end flash flows
//!
//! A modem that enumerates with the boot-ROM vendor id only speaks Sahara
//! single-image: it takes the Firehose programmer and then answers Firehose
//! commands over the same pipe. A modem already running its download loader
//! takes the firmware images directly in a multi-image Sahara session.

use crate::config::FlashConfig;
use crate::error::{Error, Result};
use crate::firehose::{load_script, FirehoseReport, FirehoseSession};
use crate::layout::FirmwareLayout;
use crate::progress::FlashProgress;
use crate::sahara::{ImageSource, Sahara};
use crate::transport::Transport;

/// Flash every configured image in one multi-image Sahara session
pub fn flash_all<T: Transport + ?Sized>(
    transport: &mut T,
    layout: &FirmwareLayout,
    config: &FlashConfig,
    progress: &mut dyn FlashProgress,
) -> Result<()> {
    if layout.is_empty() {
        return Err(Error::InvalidArgument("no firmware directories given".into()));
    }
    let images = layout.multi_image_sources();
    log::info!(
        "Flashing {} images (idle budget {:?})",
        images.len(),
        config.sahara_idle_budget()
    );

    let mut sahara = Sahara::new(transport);
    sahara.run_multi_image(&images, config.sahara_idle_limit, progress)?;
    log::info!("All images transferred");
    Ok(())
}

/// Load the programmer over Sahara, then run the rawprogram script from the
/// oem directory through Firehose
pub fn flash_edl<T: Transport + ?Sized>(
    transport: &mut T,
    layout: &FirmwareLayout,
    config: &FlashConfig,
    progress: &mut dyn FlashProgress,
) -> Result<FirehoseReport> {
    let dir = layout.oem_dir()?;
    let programmer = layout.programmer_path(&config.programmer_name)?;
    if !programmer.is_file() {
        return Err(Error::ImageOpen {
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "programmer not found"),
            path: programmer,
        });
    }
    // Parse before touching the device so a broken script fails early
    let commands = load_script(&dir.join(&config.script_name))?;

    log::info!("Loading programmer {}", programmer.display());
    Sahara::new(&mut *transport).run_single_image(&ImageSource::File(programmer), progress)?;

    FirehoseSession::new(transport, dir, commands, config).run(progress)
}
