//! qflasher-usb - USB transport for Quectel modems
//!
//! This crate finds a Quectel modem in one of its download modes, claims its
//! vendor-specific bulk interface with nusb and exposes it as a
//! [`qflasher_core::transport::Transport`].
//!
//! # Example
//!
//! ```no_run
//! use qflasher_core::transport::Transport;
//!
//! let mut modem = qflasher_usb::open_modem()?;
//! println!("EDL: {}", modem.is_edl());
//! println!("max packet: {}", modem.out_max_packet_size());
//! # Ok::<(), qflasher_usb::UsbError>(())
//! ```

mod device;
mod discovery;
mod error;
mod mode;

pub use device::{read_descriptors, usbfs_path, UsbDevice};
pub use discovery::{candidates, open_modem};
pub use error::{Result, UsbError};
pub use mode::detect_mode;
