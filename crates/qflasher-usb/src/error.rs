//! Error types for the USB transport

use std::fmt;

/// Result type for USB operations
pub type Result<T> = std::result::Result<T, UsbError>;

/// Errors that can occur when opening or driving a modem over USB
#[derive(Debug)]
pub enum UsbError {
    /// No recognized modem attached
    DeviceNotFound,
    /// Failed to enumerate USB devices
    EnumerationFailed(String),
    /// Failed to read the raw descriptors of a device
    DescriptorRead(std::io::Error),
    /// Failed to open device
    OpenFailed(String),
    /// Failed to claim interface
    ClaimFailed(String),
    /// USB transfer failed
    TransferFailed(String),
    /// Core library error
    Core(qflasher_core::Error),
}

impl fmt::Display for UsbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UsbError::DeviceNotFound => write!(
                f,
                "No Quectel modem found (VID:2c7c or VID:05c6 PID:9008)"
            ),
            UsbError::EnumerationFailed(msg) => {
                write!(f, "Failed to enumerate USB devices: {}", msg)
            }
            UsbError::DescriptorRead(e) => write!(f, "Failed to read descriptors: {}", e),
            UsbError::OpenFailed(msg) => write!(f, "Failed to open modem: {}", msg),
            UsbError::ClaimFailed(msg) => write!(f, "Failed to claim interface: {}", msg),
            UsbError::TransferFailed(msg) => write!(f, "USB transfer failed: {}", msg),
            UsbError::Core(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for UsbError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            UsbError::DescriptorRead(e) => Some(e),
            UsbError::Core(e) => Some(e),
            _ => None,
        }
    }
}

impl From<qflasher_core::Error> for UsbError {
    fn from(e: qflasher_core::Error) -> Self {
        UsbError::Core(e)
    }
}

impl From<nusb::Error> for UsbError {
    fn from(e: nusb::Error) -> Self {
        UsbError::TransferFailed(e.to_string())
    }
}

impl From<std::io::Error> for UsbError {
    fn from(e: std::io::Error) -> Self {
        UsbError::DescriptorRead(e)
    }
}

impl From<UsbError> for qflasher_core::Error {
    fn from(e: UsbError) -> Self {
        match e {
            UsbError::Core(e) => e,
            UsbError::DeviceNotFound => qflasher_core::Error::DeviceNotFound,
            other => qflasher_core::Error::Transport(other.to_string()),
        }
    }
}
