//! Sahara packet codec
//!
//! Every packet starts with a little-endian `{command, length}` header where
//! `length` covers the whole packet. Packets are decoded into a tagged enum
//! keyed by the command id; payload fields are only read once the command
//! id says which layout applies.

use crate::error::{Error, Result};

/// Sahara command ids
pub mod commands {
    /// Hello request (device to host)
    pub const HELLO: u32 = 0x01;
    /// Hello response (host to device)
    pub const HELLO_RESPONSE: u32 = 0x02;
    /// Read data request, 32-bit fields
    pub const READ_DATA: u32 = 0x03;
    /// End of image transfer
    pub const END_OF_IMAGE: u32 = 0x04;
    /// Done request (host to device)
    pub const DONE: u32 = 0x05;
    /// Done response
    pub const DONE_RESPONSE: u32 = 0x06;
    /// Reset request
    pub const RESET: u32 = 0x07;
    /// Reset response
    pub const RESET_RESPONSE: u32 = 0x08;
    /// Memory debug
    pub const MEMORY_DEBUG: u32 = 0x09;
    /// Memory read
    pub const MEMORY_READ: u32 = 0x0a;
    /// Command mode ready
    pub const CMD_READY: u32 = 0x0b;
    /// Switch mode
    pub const SWITCH_MODE: u32 = 0x0c;
    /// Execute
    pub const EXECUTE: u32 = 0x0d;
    /// Execute response
    pub const EXECUTE_RESPONSE: u32 = 0x0e;
    /// Execute data
    pub const EXECUTE_DATA: u32 = 0x0f;
    /// 64-bit memory debug
    pub const MEMORY_DEBUG_64: u32 = 0x10;
    /// 64-bit memory read
    pub const MEMORY_READ_64: u32 = 0x11;
    /// Read data request, 64-bit fields
    pub const READ_DATA_64: u32 = 0x12;
    /// Vendor firmware update progress report
    pub const FW_UPDATE_PROGRESS: u32 = 0x20;
    /// Vendor firmware update end report
    pub const FW_UPDATE_END: u32 = 0x21;
}

/// Size of the packet header
pub const HEADER_SIZE: usize = 8;
/// Length of hello and hello response packets
pub const HELLO_LENGTH: u32 = 0x30;
/// Protocol version sent in the hello response
pub const PROTOCOL_VERSION: u32 = 2;
/// Hello response mode: image transfer pending
pub const MODE_IMAGE_TX_PENDING: u32 = 0x00;
/// Hello response mode requesting the vendor multi-image session
///
/// The value is observed vendor behaviour and is sent as-is.
pub const MODE_MULTI_IMAGE: u32 = 0x10;

/// Name of a command id for log messages
pub fn command_name(id: u32) -> &'static str {
    match id {
        0x00 => "NO_CMD",
        commands::HELLO => "HELLO",
        commands::HELLO_RESPONSE => "HELLO_RESP",
        commands::READ_DATA => "READ_DATA",
        commands::END_OF_IMAGE => "END_IMAGE_TX",
        commands::DONE => "DONE",
        commands::DONE_RESPONSE => "DONE_RESP",
        commands::RESET => "RESET",
        commands::RESET_RESPONSE => "RESET_RESP",
        commands::MEMORY_DEBUG => "MEMORY_DEBUG",
        commands::MEMORY_READ => "MEMORY_READ",
        commands::CMD_READY => "CMD_READY",
        commands::SWITCH_MODE => "CMD_SWITCH_MODE",
        commands::EXECUTE => "CMD_EXEC",
        commands::EXECUTE_RESPONSE => "CMD_EXEC_RESP",
        commands::EXECUTE_DATA => "CMD_EXEC_DATA",
        commands::MEMORY_DEBUG_64 => "64_BITS_MEMORY_DEBUG",
        commands::MEMORY_READ_64 => "64_BITS_MEMORY_READ",
        commands::READ_DATA_64 => "64_BITS_READ_DATA",
        commands::FW_UPDATE_PROGRESS => "FW_UPDATE_PROCESS_REPORT",
        commands::FW_UPDATE_END => "FW_UPDATE_END",
        _ => "UNKNOWN",
    }
}

/// A decoded Sahara packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaharaPacket {
    /// Hello request
    Hello {
        /// Device protocol version
        version: u32,
        /// Oldest version the device is compatible with
        compatible: u32,
        /// Maximum command packet length
        max_length: u32,
        /// Requested mode
        mode: u32,
    },
    /// Hello response
    HelloResponse {
        /// Host protocol version
        version: u32,
        /// Echo of the device compatible value
        compatible: u32,
        /// Status, 0 for success
        status: u32,
        /// Selected mode
        mode: u32,
    },
    /// Read request; `wide` is set for the 64-bit form
    ReadData {
        /// Image id
        image: u64,
        /// Byte offset into the image
        offset: u64,
        /// Number of bytes requested
        length: u64,
        /// Decoded from the 64-bit form
        wide: bool,
    },
    /// End of image transfer
    EndOfImage {
        /// Image id
        image: u32,
        /// Status, 0 for success
        status: u32,
    },
    /// Done request
    Done,
    /// Done response
    DoneResponse {
        /// Image transfer status
        status: u32,
    },
    /// Vendor firmware update progress report
    FwUpdateProgress {
        /// Image id
        image: u32,
        /// Offset of the data being written
        offset: u32,
        /// Length of the data being written
        length: u32,
        /// Completion percentage
        percent: u32,
    },
    /// Vendor firmware update end report
    FwUpdateEnd {
        /// Image id
        image: u32,
        /// End flag
        end_flag: u32,
        /// 0 when the image was written successfully
        successful: u32,
    },
    /// Any other command, carried opaquely
    Other {
        /// Command id
        command: u32,
    },
}

/// Cursor over little-endian payload words
struct Fields<'a> {
    bytes: &'a [u8],
    command: u32,
}

impl<'a> Fields<'a> {
    fn u32(&mut self) -> Result<u32> {
        let (head, rest) = self
            .bytes
            .split_first_chunk::<4>()
            .ok_or_else(|| self.truncated())?;
        self.bytes = rest;
        Ok(u32::from_le_bytes(*head))
    }

    fn u64(&mut self) -> Result<u64> {
        let (head, rest) = self
            .bytes
            .split_first_chunk::<8>()
            .ok_or_else(|| self.truncated())?;
        self.bytes = rest;
        Ok(u64::from_le_bytes(*head))
    }

    fn truncated(&self) -> Error {
        Error::MalformedPacket(format!(
            "{} payload is truncated",
            command_name(self.command)
        ))
    }
}

impl SaharaPacket {
    /// Decode the header of a received buffer
    ///
    /// Returns `(command, length)`.
    pub fn header(buf: &[u8]) -> Result<(u32, u32)> {
        let (head, _) = buf
            .split_first_chunk::<HEADER_SIZE>()
            .ok_or_else(|| Error::MalformedPacket(format!("{} byte packet", buf.len())))?;
        let command = u32::from_le_bytes([head[0], head[1], head[2], head[3]]);
        let length = u32::from_le_bytes([head[4], head[5], head[6], head[7]]);
        Ok((command, length))
    }

    /// Decode a complete packet
    ///
    /// The header length must lie within the buffer; bytes past it are
    /// ignored.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        let (command, length) = Self::header(buf)?;
        let length = length as usize;
        if length < HEADER_SIZE || length > buf.len() {
            return Err(Error::MalformedPacket(format!(
                "{} declares length {} in a {} byte buffer",
                command_name(command),
                length,
                buf.len()
            )));
        }

        let mut f = Fields {
            bytes: &buf[HEADER_SIZE..length],
            command,
        };

        let packet = match command {
            commands::HELLO => SaharaPacket::Hello {
                version: f.u32()?,
                compatible: f.u32()?,
                max_length: f.u32()?,
                mode: f.u32()?,
            },
            commands::HELLO_RESPONSE => SaharaPacket::HelloResponse {
                version: f.u32()?,
                compatible: f.u32()?,
                status: f.u32()?,
                mode: f.u32()?,
            },
            commands::READ_DATA => SaharaPacket::ReadData {
                image: u64::from(f.u32()?),
                offset: u64::from(f.u32()?),
                length: u64::from(f.u32()?),
                wide: false,
            },
            commands::READ_DATA_64 => SaharaPacket::ReadData {
                image: f.u64()?,
                offset: f.u64()?,
                length: f.u64()?,
                wide: true,
            },
            commands::END_OF_IMAGE => SaharaPacket::EndOfImage {
                image: f.u32()?,
                status: f.u32()?,
            },
            commands::DONE => SaharaPacket::Done,
            commands::DONE_RESPONSE => SaharaPacket::DoneResponse { status: f.u32()? },
            commands::FW_UPDATE_PROGRESS => SaharaPacket::FwUpdateProgress {
                image: f.u32()?,
                offset: f.u32()?,
                length: f.u32()?,
                percent: f.u32()?,
            },
            commands::FW_UPDATE_END => SaharaPacket::FwUpdateEnd {
                image: f.u32()?,
                end_flag: f.u32()?,
                successful: f.u32()?,
            },
            command => SaharaPacket::Other { command },
        };
        Ok(packet)
    }

    /// Command id of this packet
    pub fn command(&self) -> u32 {
        match self {
            SaharaPacket::Hello { .. } => commands::HELLO,
            SaharaPacket::HelloResponse { .. } => commands::HELLO_RESPONSE,
            SaharaPacket::ReadData { wide: false, .. } => commands::READ_DATA,
            SaharaPacket::ReadData { wide: true, .. } => commands::READ_DATA_64,
            SaharaPacket::EndOfImage { .. } => commands::END_OF_IMAGE,
            SaharaPacket::Done => commands::DONE,
            SaharaPacket::DoneResponse { .. } => commands::DONE_RESPONSE,
            SaharaPacket::FwUpdateProgress { .. } => commands::FW_UPDATE_PROGRESS,
            SaharaPacket::FwUpdateEnd { .. } => commands::FW_UPDATE_END,
            SaharaPacket::Other { command } => *command,
        }
    }

    /// Name of this packet's command for log messages
    pub fn name(&self) -> &'static str {
        command_name(self.command())
    }

    /// Encode a host-to-device packet
    pub fn encode(&self) -> Vec<u8> {
        let words: Vec<u32> = match *self {
            SaharaPacket::Hello {
                version,
                compatible,
                max_length,
                mode,
            } => {
                let mut w = vec![version, compatible, max_length, mode];
                w.resize(10, 0);
                w
            }
            SaharaPacket::HelloResponse {
                version,
                compatible,
                status,
                mode,
            } => {
                // Followed by six reserved words
                let mut w = vec![version, compatible, status, mode];
                w.resize(10, 0);
                w
            }
            SaharaPacket::ReadData {
                image,
                offset,
                length,
                wide: true,
            } => {
                let mut out = Self::frame(self.command(), 24);
                out.extend_from_slice(&image.to_le_bytes());
                out.extend_from_slice(&offset.to_le_bytes());
                out.extend_from_slice(&length.to_le_bytes());
                return out;
            }
            SaharaPacket::ReadData {
                image,
                offset,
                length,
                wide: false,
            } => vec![image as u32, offset as u32, length as u32],
            SaharaPacket::EndOfImage { image, status } => vec![image, status],
            SaharaPacket::Done => Vec::new(),
            SaharaPacket::DoneResponse { status } => vec![status],
            SaharaPacket::FwUpdateProgress {
                image,
                offset,
                length,
                percent,
            } => vec![image, offset, length, percent],
            SaharaPacket::FwUpdateEnd {
                image,
                end_flag,
                successful,
            } => vec![image, end_flag, successful],
            SaharaPacket::Other { .. } => Vec::new(),
        };

        let mut out = Self::frame(self.command(), words.len() * 4);
        for word in words {
            out.extend_from_slice(&word.to_le_bytes());
        }
        out
    }

    fn frame(command: u32, payload_len: usize) -> Vec<u8> {
        let length = (HEADER_SIZE + payload_len) as u32;
        let mut out = Vec::with_capacity(length as usize);
        out.extend_from_slice(&command.to_le_bytes());
        out.extend_from_slice(&length.to_le_bytes());
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(words: &[u32]) -> Vec<u8> {
        words.iter().flat_map(|w| w.to_le_bytes()).collect()
    }

    #[test]
    fn test_decode_hello() {
        let buf = raw(&[1, 0x30, 2, 1, 0x400, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(
            SaharaPacket::decode(&buf).unwrap(),
            SaharaPacket::Hello {
                version: 2,
                compatible: 1,
                max_length: 0x400,
                mode: 0
            }
        );
    }

    #[test]
    fn test_hello_response_layout() {
        let pkt = SaharaPacket::HelloResponse {
            version: PROTOCOL_VERSION,
            compatible: 2,
            status: 0,
            mode: MODE_MULTI_IMAGE,
        };
        let bytes = pkt.encode();
        assert_eq!(bytes.len(), HELLO_LENGTH as usize);
        assert_eq!(&bytes[..8], &raw(&[2, 0x30])[..]);
        assert_eq!(&bytes[8..24], &raw(&[2, 2, 0, 0x10])[..]);
        assert!(bytes[24..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_decode_read_data() {
        let buf = raw(&[3, 20, 13, 0x1000, 0x2000]);
        assert_eq!(
            SaharaPacket::decode(&buf).unwrap(),
            SaharaPacket::ReadData {
                image: 13,
                offset: 0x1000,
                length: 0x2000,
                wide: false
            }
        );
    }

    #[test]
    fn test_decode_read_data_64() {
        let mut buf = raw(&[0x12, 32]);
        buf.extend_from_slice(&7u64.to_le_bytes());
        buf.extend_from_slice(&0x1_0000_0000u64.to_le_bytes());
        buf.extend_from_slice(&512u64.to_le_bytes());
        let pkt = SaharaPacket::decode(&buf).unwrap();
        assert_eq!(
            pkt,
            SaharaPacket::ReadData {
                image: 7,
                offset: 0x1_0000_0000,
                length: 512,
                wide: true
            }
        );
        assert_eq!(pkt.encode(), buf);
    }

    #[test]
    fn test_decode_vendor_reports() {
        let progress = raw(&[0x20, 24, 1, 0, 4096, 42]);
        assert!(matches!(
            SaharaPacket::decode(&progress).unwrap(),
            SaharaPacket::FwUpdateProgress { percent: 42, .. }
        ));

        let end = raw(&[0x21, 20, 1, 1, 0]);
        assert_eq!(
            SaharaPacket::decode(&end).unwrap(),
            SaharaPacket::FwUpdateEnd {
                image: 1,
                end_flag: 1,
                successful: 0
            }
        );
    }

    #[test]
    fn test_decode_unknown_command() {
        let buf = raw(&[0x0b, 8]);
        let pkt = SaharaPacket::decode(&buf).unwrap();
        assert_eq!(pkt, SaharaPacket::Other { command: 0x0b });
        assert_eq!(pkt.name(), "CMD_READY");
    }

    #[test]
    fn test_decode_rejects_bad_length() {
        // Declared length beyond the buffer
        assert!(SaharaPacket::decode(&raw(&[3, 64, 0, 0, 0])).is_err());
        // Declared length shorter than the header
        assert!(SaharaPacket::decode(&raw(&[5, 4])).is_err());
        // Read request without its payload
        assert!(matches!(
            SaharaPacket::decode(&raw(&[3, 12, 0])),
            Err(Error::MalformedPacket(_))
        ));
        assert!(SaharaPacket::decode(&[1, 0, 0]).is_err());
    }

    #[test]
    fn test_encode_done() {
        assert_eq!(SaharaPacket::Done.encode(), raw(&[5, 8]));
    }
}
