//! On-disk image headers
//!
//! Binary layouts consumed while flashing:
//!
//! - the Android sparse image header and chunk header, read when a Firehose
//!   program entry is marked `sparse="true"`
//! - the vendor single-image container header that prefixes every image
//!   served during a multi-image Sahara session
//!
//! All multi-byte fields are little-endian on disk; the zerocopy byte-order
//! aware integer types make that explicit on every host.

use std::io::Read;

use zerocopy::little_endian::{U16, U32};
use zerocopy::{FromBytes, FromZeros, Immutable, IntoBytes, KnownLayout};

use crate::error::{Error, Result};

/// Sparse image magic
pub const SPARSE_HEADER_MAGIC: u32 = 0xed26_ff3a;
/// Size of [`SparseHeader`] on disk
pub const SPARSE_HEADER_SIZE: usize = 28;
/// Size of [`ChunkHeader`] on disk
pub const CHUNK_HEADER_SIZE: usize = 12;

/// Sparse chunk types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ChunkType {
    /// Chunk data follows verbatim
    Raw = 0xcac1,
    /// A 4-byte fill pattern follows
    Fill = 0xcac2,
    /// Region is not written
    DontCare = 0xcac3,
    /// A CRC32 of the data so far follows
    Crc32 = 0xcac4,
}

impl ChunkType {
    /// Decode a raw chunk type value
    pub fn from_raw(value: u16) -> Option<Self> {
        match value {
            0xcac1 => Some(ChunkType::Raw),
            0xcac2 => Some(ChunkType::Fill),
            0xcac3 => Some(ChunkType::DontCare),
            0xcac4 => Some(ChunkType::Crc32),
            _ => None,
        }
    }
}

/// Sparse image file header
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct SparseHeader {
    /// [`SPARSE_HEADER_MAGIC`]
    pub magic: U32,
    /// Major format version (1)
    pub major_version: U16,
    /// Minor format version
    pub minor_version: U16,
    /// Size of this header (28)
    pub file_hdr_sz: U16,
    /// Size of each chunk header (12)
    pub chunk_hdr_sz: U16,
    /// Block size in bytes, a multiple of 4
    pub blk_sz: U32,
    /// Number of blocks in the expanded image
    pub total_blks: U32,
    /// Number of chunks in the sparse file
    pub total_chunks: U32,
    /// CRC32 of the expanded image
    pub image_checksum: U32,
}

impl SparseHeader {
    /// Parse a header from the start of `bytes`
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        Self::read_from_prefix(bytes).ok().map(|(header, _)| header)
    }

    /// Read a header from the start of a file or stream
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let mut buf = [0u8; SPARSE_HEADER_SIZE];
        let got = read_full(reader, &mut buf)?;
        if got < SPARSE_HEADER_SIZE {
            return Err(Error::ShortRead {
                what: "sparse header".into(),
                wanted: SPARSE_HEADER_SIZE,
                got,
            });
        }
        Self::parse(&buf).ok_or_else(|| Error::MalformedPacket("sparse header".into()))
    }

    /// Returns true when the header carries the sparse magic
    pub fn is_sparse(&self) -> bool {
        self.magic.get() == SPARSE_HEADER_MAGIC
    }

    /// Size of the expanded image in bytes
    pub fn unsparsed_size(&self) -> u64 {
        u64::from(self.total_blks.get()) * u64::from(self.blk_sz.get())
    }
}

/// Sparse chunk header
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct ChunkHeader {
    /// One of [`ChunkType`]
    pub chunk_type: U16,
    /// Reserved, zero
    pub reserved1: U16,
    /// Chunk size in blocks of the expanded image
    pub chunk_sz: U32,
    /// Chunk size in bytes including this header
    pub total_sz: U32,
}

impl ChunkHeader {
    /// Decoded chunk type
    pub fn kind(&self) -> Option<ChunkType> {
        ChunkType::from_raw(self.chunk_type.get())
    }
}

/// Size of a single-image container header
pub const SINGLE_IMAGE_HEADER_SIZE: usize = 4096;
/// Number of layout entries in a container header
pub const SINGLE_IMAGE_MAX_LAYOUTS: usize = 36;
/// Magic of the synthetic reset image
pub const RESET_IMAGE_MAGIC: [u8; 4] = *b"RST\0";

/// One sub-image inside a container
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct ImageLayout {
    /// Sequence number
    pub sequence: U32,
    /// Offset of the sub-image in the container file
    pub file_offset: U32,
    /// Length of the sub-image in the container file
    pub file_len: U32,
    /// Destination offset in NAND
    pub nand_offset: U32,
    /// Destination length in NAND
    pub nand_len: U32,
    /// CRC of the sub-image
    pub crc: U32,
}

/// Vendor container header, 4096 bytes
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct SingleImageHeader {
    /// Container magic
    pub magic: [u8; 4],
    /// CRC of the header
    pub header_crc: U32,
    /// CRC of the body
    pub body_crc: U32,
    /// Total image size
    pub image_size: U32,
    /// Module identifier, NUL padded
    pub module_id: [u8; 32],
    /// Module firmware version, NUL padded
    pub module_version: [u8; 64],
    /// Non-zero when the image is signed
    pub is_auth: U32,
    /// Signing scheme version
    pub auth_version: [u8; 8],
    /// Reserved
    pub reserve: [u8; 20],
    /// Number of valid entries in `image_list`
    pub image_num: U32,
    /// Sub-image layouts
    pub image_list: [ImageLayout; SINGLE_IMAGE_MAX_LAYOUTS],
    /// Pads the header to 4096 bytes
    pub padding: [u8; 3084],
}

impl SingleImageHeader {
    /// Zeroed header carrying the reset magic
    ///
    /// Served as the last image of a multi-image session; the device resets
    /// once it has consumed it.
    pub fn reset_marker() -> Self {
        let mut header = Self::new_zeroed();
        header.magic = RESET_IMAGE_MAGIC;
        header
    }

    /// Read a header from the start of an image
    pub fn read_from<R: Read>(reader: &mut R, what: &str) -> Result<Self> {
        let mut buf = vec![0u8; SINGLE_IMAGE_HEADER_SIZE];
        let got = read_full(reader, &mut buf)?;
        if got < SINGLE_IMAGE_HEADER_SIZE {
            log::error!("{} is shorter than its {} byte header", what, SINGLE_IMAGE_HEADER_SIZE);
            return Err(Error::ShortRead {
                what: what.to_string(),
                wanted: SINGLE_IMAGE_HEADER_SIZE,
                got,
            });
        }
        Self::read_from_bytes(&buf)
            .map_err(|_| Error::MalformedPacket(format!("{} header", what)))
    }

    /// Module version as text
    pub fn module_version(&self) -> String {
        c_string(&self.module_version)
    }

    /// Module id as text
    pub fn module_id(&self) -> String {
        c_string(&self.module_id)
    }
}

fn c_string(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

/// Read until `buf` is full or the reader is exhausted
pub(crate) fn read_full<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}
