//! qflasher-core - Protocol engines for Qualcomm modem firmware flashing
//!
//! This crate implements the two protocols spoken by a Quectel/Qualcomm
//! modem once it has been switched into a download mode:
//!
//! - **Sahara** - the boot-ROM handshake in which the device pulls image
//!   bytes from the host by issuing read requests
//! - **Firehose** - the XML command protocol served by a programmer image,
//!   used to erase partitions and stream raw program data
//!
//! Both engines are written against the [`transport::Transport`] trait, so
//! they can run over a real USB bulk pipe (see the `qflasher-usb` crate) or
//! over an in-memory transport in tests.
//!
//! # Example
//!
//! ```no_run
//! use qflasher_core::config::FlashConfig;
//! use qflasher_core::flows;
//! use qflasher_core::layout::FirmwareLayout;
//! use qflasher_core::progress::NoProgress;
//! # fn open() -> Box<dyn qflasher_core::transport::Transport> { unimplemented!() }
//!
//! let layout = FirmwareLayout::parse("main:/fw/main,oem:/fw/oem,carrier:/fw/carrier")?;
//! let config = FlashConfig::default();
//! let mut transport = open();
//! flows::flash_all(&mut *transport, &layout, &config, &mut NoProgress)?;
//! # Ok::<(), qflasher_core::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod config;
pub mod error;
pub mod firehose;
pub mod flows;
pub mod layout;
pub mod progress;
pub mod sahara;
pub mod sparse;
pub mod transport;
pub mod usb;

pub use error::{Error, Result};
