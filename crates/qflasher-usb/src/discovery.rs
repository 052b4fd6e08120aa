//! Modem discovery

use nusb::{DeviceInfo, MaybeFuture};
use qflasher_core::usb::is_recognized_vendor;

use crate::device::UsbDevice;
use crate::error::{Result, UsbError};

/// List attached devices with a recognized vendor id
pub fn candidates() -> Result<Vec<DeviceInfo>> {
    let devices = nusb::list_devices()
        .wait()
        .map_err(|e| UsbError::EnumerationFailed(e.to_string()))?
        .filter(|d| is_recognized_vendor(d.vendor_id()))
        .collect();
    Ok(devices)
}

/// Open the first candidate that exposes a download interface
///
/// Candidates that fail the descriptor walk or cannot be claimed are
/// skipped.
pub fn open_modem() -> Result<UsbDevice> {
    for info in candidates()? {
        match UsbDevice::open(&info) {
            Ok(modem) => return Ok(modem),
            Err(e) => log::debug!(
                "Skipping {:04x}:{:04x} at bus {} address {}: {}",
                info.vendor_id(),
                info.product_id(),
                info.busnum(),
                info.device_address(),
                e
            ),
        }
    }
    Err(UsbError::DeviceNotFound)
}
