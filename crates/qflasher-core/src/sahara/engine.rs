//! Sahara session state machine

use std::io::{Seek, SeekFrom};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::progress::FlashProgress;
use crate::sparse::{read_full, SingleImageHeader};
use crate::transport::Transport;

use super::image::ImageSource;
use super::packet::{SaharaPacket, MODE_IMAGE_TX_PENDING, MODE_MULTI_IMAGE, PROTOCOL_VERSION};

/// Timeout of each Sahara bulk read
pub const READ_TIMEOUT: Duration = Duration::from_millis(5000);
/// Size of the command receive buffer
pub const RX_BUFFER_SIZE: usize = 4096;
/// Image data write size in single-image sessions
pub const SINGLE_IMAGE_CHUNK_SIZE: usize = 4 * 1024;
/// Image data write size in multi-image sessions
pub const MULTI_IMAGE_CHUNK_SIZE: usize = 8 * 1024;

/// Sahara session state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaharaState {
    /// Waiting for the device hello
    AwaitHello,
    /// Hello received, response being sent
    Negotiating,
    /// Serving read requests
    TransferringImages,
    /// Session completed
    Done,
    /// Session aborted
    Failed,
}

/// Outcome of one image in a multi-image session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ImageOutcome {
    Flashed,
    Rejected,
}

/// Sahara protocol engine
///
/// Owns the transport for the duration of the session; pass `&mut device`
/// to keep using the device afterwards.
pub struct Sahara<T: Transport> {
    transport: T,
    state: SaharaState,
    rx: Vec<u8>,
}

impl<T: Transport> Sahara<T> {
    /// Create an engine waiting for the device hello
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            state: SaharaState::AwaitHello,
            rx: vec![0u8; RX_BUFFER_SIZE],
        }
    }

    /// Current state
    pub fn state(&self) -> SaharaState {
        self.state
    }

    /// Give the transport back
    pub fn into_inner(self) -> T {
        self.transport
    }

    /// Run a single-image session
    ///
    /// Serves `image` until the device reports the end of the image, sends
    /// the done request and waits for the done response.
    pub fn run_single_image(
        &mut self,
        image: &ImageSource,
        progress: &mut dyn FlashProgress,
    ) -> Result<()> {
        progress.image_started(&image.to_string());
        let result = self.single_image(image);
        progress.image_finished(result.is_ok());
        self.track(result)
    }

    /// Run a multi-image session
    ///
    /// Each image in `images` is served until the device sends its firmware
    /// update end report. `idle_limit` bounds the number of consecutive
    /// empty reads while waiting for the device. A rejected image does not
    /// stop the session; the images that follow are still offered.
    pub fn run_multi_image(
        &mut self,
        images: &[ImageSource],
        idle_limit: u32,
        progress: &mut dyn FlashProgress,
    ) -> Result<()> {
        let result = self.multi_image(images, idle_limit, progress);
        self.track(result)
    }

    fn track(&mut self, result: Result<()>) -> Result<()> {
        if let Err(e) = &result {
            self.state = SaharaState::Failed;
            log::error!("Sahara session failed: {}", e);
        }
        result
    }

    fn single_image(&mut self, image: &ImageSource) -> Result<()> {
        self.handshake(MODE_IMAGE_TX_PENDING)?;

        loop {
            let Some(packet) = self.receive()? else {
                log::error!("No Sahara message while transferring {}", image);
                return Err(Error::PeerDisconnected);
            };

            match packet {
                SaharaPacket::ReadData { offset, length, .. } => {
                    self.serve_read(image, offset, length, false, SINGLE_IMAGE_CHUNK_SIZE)?;
                }
                SaharaPacket::EndOfImage { image: id, status } => {
                    if status != 0 {
                        log::error!("Image {} transfer failed with status {:#x}", id, status);
                        return Err(Error::ImageTransferFailed {
                            image: u64::from(id),
                            status,
                        });
                    }
                    log::info!("Image {} transferred, sending done", id);
                    self.send(&SaharaPacket::Done)?;
                }
                SaharaPacket::DoneResponse { status } => {
                    log::info!("Sahara done (image transfer status {})", status);
                    self.state = SaharaState::Done;
                    return Ok(());
                }
                other => log::debug!("Ignoring {}", other.name()),
            }
        }
    }

    fn multi_image(
        &mut self,
        images: &[ImageSource],
        idle_limit: u32,
        progress: &mut dyn FlashProgress,
    ) -> Result<()> {
        self.handshake(MODE_MULTI_IMAGE)?;

        let mut failed = 0;
        for image in images {
            log::info!("Flashing {}", image);
            progress.image_started(&image.to_string());
            let outcome = self.transfer_image(image, idle_limit, progress);
            progress.image_finished(matches!(outcome, Ok(ImageOutcome::Flashed)));
            if outcome? == ImageOutcome::Rejected {
                failed += 1;
            }
        }

        if failed > 0 {
            return Err(Error::FlashFailed {
                failed,
                total: images.len(),
            });
        }
        self.state = SaharaState::Done;
        Ok(())
    }

    fn transfer_image(
        &mut self,
        image: &ImageSource,
        idle_limit: u32,
        progress: &mut dyn FlashProgress,
    ) -> Result<ImageOutcome> {
        let mut idle = 0;
        loop {
            let Some(packet) = self.receive()? else {
                idle += 1;
                if idle >= idle_limit {
                    log::error!("Device silent for {} reads while flashing {}", idle, image);
                    return Err(Error::PeerDisconnected);
                }
                log::debug!("Waiting for device ({}/{})", idle, idle_limit);
                continue;
            };
            idle = 0;

            match packet {
                SaharaPacket::ReadData { offset, length, .. } => {
                    self.serve_read(image, offset, length, true, MULTI_IMAGE_CHUNK_SIZE)?;
                }
                SaharaPacket::FwUpdateProgress { percent, .. } => {
                    log::debug!("{}: {}%", image, percent);
                    progress.image_progress(percent);
                }
                SaharaPacket::FwUpdateEnd { successful, .. } => {
                    if successful == 0 {
                        log::info!("{} flashed successfully", image);
                        return Ok(ImageOutcome::Flashed);
                    }
                    log::error!("{} failed to flash (device status {})", image, successful);
                    return Ok(ImageOutcome::Rejected);
                }
                SaharaPacket::EndOfImage { image: id, status } => {
                    log::debug!("End of image {} (status {:#x})", id, status);
                }
                other => log::debug!("Ignoring {}", other.name()),
            }
        }
    }

    fn handshake(&mut self, mode: u32) -> Result<()> {
        if self.state != SaharaState::AwaitHello {
            return Err(Error::InvalidArgument(format!(
                "Sahara hello already exchanged (state {:?})",
                self.state
            )));
        }

        let Some(packet) = self.receive()? else {
            log::error!("No hello from device");
            return Err(Error::PeerDisconnected);
        };
        let SaharaPacket::Hello {
            version,
            compatible,
            max_length,
            mode: device_mode,
        } = packet
        else {
            return Err(Error::UnexpectedCommand {
                got: packet.command(),
                name: packet.name(),
                expected: "HELLO",
            });
        };

        log::info!(
            "Sahara hello: version {}, compatible {}, max length {}, mode {}",
            version,
            compatible,
            max_length,
            device_mode
        );
        self.state = SaharaState::Negotiating;

        self.send(&SaharaPacket::HelloResponse {
            version: PROTOCOL_VERSION,
            compatible,
            status: 0,
            mode,
        })?;
        self.state = SaharaState::TransferringImages;
        Ok(())
    }

    /// Read one packet; `None` when nothing arrived
    fn receive(&mut self) -> Result<Option<SaharaPacket>> {
        let n = self.transport.read(&mut self.rx, READ_TIMEOUT);
        if n == 0 {
            return Ok(None);
        }

        let data = &self.rx[..n];
        let (_, declared) = SaharaPacket::header(data)?;
        if declared as usize != n {
            log::error!("Sahara packet length {} does not match {} bytes read", declared, n);
            log::trace!("Packet: {:02x?}", data);
            return Err(Error::LengthMismatch {
                declared,
                received: n,
            });
        }

        let packet = SaharaPacket::decode(data)?;
        log::debug!("RECV <- {}", packet.name());
        Ok(Some(packet))
    }

    fn send(&mut self, packet: &SaharaPacket) -> Result<()> {
        log::debug!("SEND -> {}", packet.name());
        self.transport.write(&packet.encode())?;
        Ok(())
    }

    /// Stream `length` bytes of `image` from `offset`
    fn serve_read(
        &mut self,
        image: &ImageSource,
        offset: u64,
        length: u64,
        container: bool,
        chunk_size: usize,
    ) -> Result<()> {
        log::debug!(
            "Read request for {}: offset {:#x}, length {:#x}",
            image,
            offset,
            length
        );

        let mut reader = image.open()?;
        if container {
            SingleImageHeader::read_from(&mut reader, &image.to_string())?;
        }
        reader.seek(SeekFrom::Start(offset))?;

        let mut buf = vec![0u8; chunk_size];
        let mut remaining = length;
        while remaining > 0 {
            let want = remaining.min(chunk_size as u64) as usize;
            let got = read_full(&mut reader, &mut buf[..want])?;
            if got < want {
                log::error!(
                    "{} ended at offset {:#x}: wanted {} more bytes, got {}",
                    image,
                    offset + (length - remaining),
                    want,
                    got
                );
                return Err(Error::ShortRead {
                    what: image.to_string(),
                    wanted: want,
                    got,
                });
            }
            self.transport.write(&buf[..want])?;
            remaining -= want as u64;
        }
        Ok(())
    }
}
