//! Modem bulk pipe over nusb
//!
//! [`UsbDevice`] owns the claimed download interface of one modem and
//! implements the core [`Transport`] trait on its bulk endpoints.

use std::path::PathBuf;
use std::time::Duration;

use nusb::transfer::{Buffer, Bulk, In, Out, TransferError};
use nusb::{DeviceInfo, Endpoint, MaybeFuture};
use qflasher_core::transport::Transport;
use qflasher_core::usb::{probe, BulkInterface, Probe};

use crate::error::{Result, UsbError};

/// Path of the usbfs node for a device
///
/// Reading the node yields the device descriptor followed by every
/// configuration descriptor, which is the blob the core walker expects.
pub fn usbfs_path(info: &DeviceInfo) -> PathBuf {
    PathBuf::from(format!(
        "/dev/bus/usb/{:03}/{:03}",
        info.busnum(),
        info.device_address()
    ))
}

/// Read the raw descriptor blob of a device
pub fn read_descriptors(info: &DeviceInfo) -> Result<Vec<u8>> {
    std::fs::read(usbfs_path(info)).map_err(UsbError::DescriptorRead)
}

/// An opened modem in a download mode
pub struct UsbDevice {
    /// Bulk OUT endpoint for host to device traffic
    out_ep: Endpoint<Bulk, Out>,
    /// Bulk IN endpoint for device to host traffic
    in_ep: Endpoint<Bulk, In>,
    /// The selected interface and its endpoints
    pipe: BulkInterface,
    /// Boot-ROM emergency download mode
    edl: bool,
    bus: u8,
    address: u8,
}

impl UsbDevice {
    /// Open a candidate device
    ///
    /// Walks the raw descriptors, selects the download interface, detaches
    /// any kernel driver from it and claims it.
    pub fn open(info: &DeviceInfo) -> Result<Self> {
        let blob = read_descriptors(info)?;
        let probed = probe(&blob)?;
        let pipe = *probed.interface();
        let edl = matches!(probed, Probe::Edl(_));

        log::info!(
            "Opening modem {:04x}:{:04x} at bus {} address {}{}",
            info.vendor_id(),
            info.product_id(),
            info.busnum(),
            info.device_address(),
            if edl { " (EDL)" } else { "" }
        );

        let device = info
            .open()
            .wait()
            .map_err(|e| UsbError::OpenFailed(e.to_string()))?;

        let interface = device
            .detach_and_claim_interface(pipe.interface_number)
            .wait()
            .map_err(|e| UsbError::ClaimFailed(e.to_string()))?;
        log::debug!("Claimed interface {}", pipe.interface_number);

        let out_ep = interface
            .endpoint::<Bulk, Out>(pipe.out_endpoint)
            .map_err(|e| UsbError::ClaimFailed(e.to_string()))?;
        let in_ep = interface
            .endpoint::<Bulk, In>(pipe.in_endpoint)
            .map_err(|e| UsbError::ClaimFailed(e.to_string()))?;

        Ok(Self {
            out_ep,
            in_ep,
            pipe,
            edl,
            bus: info.busnum(),
            address: info.device_address(),
        })
    }

    /// Returns true when the modem enumerated in boot-ROM download mode
    pub fn is_edl(&self) -> bool {
        self.edl
    }

    /// The claimed interface and endpoints
    pub fn pipe(&self) -> &BulkInterface {
        &self.pipe
    }

    fn transfer_out(&mut self, data: &[u8], timeout: Duration) -> Result<usize> {
        let mut buf = Buffer::new(data.len());
        buf.extend_from_slice(data);

        let completion = self.out_ep.transfer_blocking(buf, timeout);
        let actual = completion.actual_len;
        completion
            .into_result()
            .map_err(|e| UsbError::TransferFailed(e.to_string()))?;

        log::trace!("USB write {} bytes", actual);
        Ok(actual)
    }
}

impl Transport for UsbDevice {
    fn out_max_packet_size(&self) -> usize {
        self.out_ep.max_packet_size()
    }

    fn bulk_read(
        &mut self,
        buffer: &mut [u8],
        timeout: Duration,
    ) -> qflasher_core::Result<usize> {
        let max_packet_size = self.in_ep.max_packet_size();
        // Request length must be multiple of max packet size
        let request_len = buffer.len().div_ceil(max_packet_size) * max_packet_size;
        let mut in_buf = Buffer::new(request_len);
        in_buf.set_requested_len(request_len);

        let completion = self.in_ep.transfer_blocking(in_buf, timeout);
        let received = read_len(completion.status, completion.actual_len)?;
        let received = received.min(buffer.len());
        buffer[..received].copy_from_slice(&completion.buffer[..received]);
        log::trace!("USB read {} bytes", received);
        Ok(received)
    }

    fn bulk_write(&mut self, data: &[u8], timeout: Duration) -> qflasher_core::Result<usize> {
        Ok(self.transfer_out(data, timeout)?)
    }

    fn submit_write(
        &mut self,
        data: &[u8],
        zero_packet: bool,
        timeout: Duration,
    ) -> qflasher_core::Result<usize> {
        let written = self.transfer_out(data, timeout)?;
        let max_packet_size = self.out_ep.max_packet_size();
        if zero_packet && !data.is_empty() && data.len() % max_packet_size == 0 {
            self.transfer_out(&[], timeout)?;
        }
        Ok(written)
    }
}

impl Drop for UsbDevice {
    fn drop(&mut self) {
        log::debug!(
            "Releasing modem at bus {} address {}",
            self.bus,
            self.address
        );
    }
}

/// Bytes delivered by a finished IN transfer
///
/// A cancelled transfer is a timed out read and yields zero. Data that
/// arrived before the cancellation is discarded.
fn read_len(status: std::result::Result<(), TransferError>, actual_len: usize) -> Result<usize> {
    match status {
        Ok(()) => Ok(actual_len),
        Err(TransferError::Cancelled) => {
            if actual_len > 0 {
                log::debug!("USB read timed out after {} bytes", actual_len);
            }
            Ok(0)
        }
        Err(e) => Err(UsbError::TransferFailed(e.to_string())),
    }
}
