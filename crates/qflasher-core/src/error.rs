//! Error types for qflasher-core
//!
//! The variants follow the failure classes of a flashing session: transport
//! failures and protocol desynchronisation abort the session, data errors
//! fail a single Firehose command, negotiation errors abort the whole run.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Core error type
#[derive(Debug, Error)]
pub enum Error {
    // Transport errors
    /// A USB bulk transfer failed
    #[error("USB transfer failed: {0}")]
    Transport(String),
    /// No modem in a download mode was found
    #[error("no modem in download mode found")]
    DeviceNotFound,
    /// The raw descriptor blob could not be walked
    #[error("malformed USB descriptor: {0}")]
    Descriptor(String),
    /// The selected interface has an unusable endpoint
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    // Protocol sequencing errors
    /// The device sent a command that is not valid in the current state
    #[error("unexpected Sahara command {got:#04x} ({name}) while waiting for {expected}")]
    UnexpectedCommand {
        /// Command id received
        got: u32,
        /// Human readable name of the received command
        name: &'static str,
        /// What the engine was waiting for
        expected: &'static str,
    },
    /// The device stopped sending data where a message was required
    #[error("device stopped responding")]
    PeerDisconnected,
    /// A Sahara packet could not be decoded
    #[error("malformed Sahara packet: {0}")]
    MalformedPacket(String),
    /// The declared Sahara packet length does not match what was received
    #[error("Sahara packet declares {declared} bytes but {received} were received")]
    LengthMismatch {
        /// Length field of the packet header
        declared: u32,
        /// Number of bytes actually read
        received: usize,
    },
    /// The device reported a failed image transfer
    #[error("image {image} failed with status {status:#x}")]
    ImageTransferFailed {
        /// Sahara image id
        image: u64,
        /// Status reported by the device
        status: u32,
    },
    /// One or more images of a multi-image session were rejected
    #[error("{failed} of {total} images failed to flash")]
    FlashFailed {
        /// Number of failed images
        failed: usize,
        /// Number of images attempted
        total: usize,
    },

    // Data errors
    /// An image file could not be opened
    #[error("failed to open image {path}: {source}")]
    ImageOpen {
        /// Path of the image
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
    /// An image ended before the requested range was read
    #[error("short read from {what}: wanted {wanted} bytes, got {got}")]
    ShortRead {
        /// What was being read
        what: String,
        /// Bytes requested
        wanted: usize,
        /// Bytes available
        got: usize,
    },
    /// A program entry has `SECTOR_SIZE_IN_BYTES="0"`
    #[error("program entry {filename} has a zero sector size")]
    ZeroSectorSize {
        /// File named by the entry
        filename: String,
    },
    /// A program entry references an empty file
    #[error("{} is empty", path.display())]
    EmptyFile {
        /// Resolved file path
        path: PathBuf,
    },
    /// Generic I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Negotiation errors
    /// The Firehose target did not accept the configure command
    #[error("firehose configure rejected: {0}")]
    ConfigureRejected(String),
    /// The Firehose target did not acknowledge the final reset
    #[error("firehose target did not acknowledge reset")]
    ResetNotAcknowledged,
    /// No response arrived in time
    #[error("timed out after {timeout:?} waiting for {what}")]
    Timeout {
        /// How long the engine waited
        timeout: Duration,
        /// What the engine was waiting for
        what: &'static str,
    },
    /// A Firehose message from the target could not be understood
    #[error("malformed firehose message: {0}")]
    MalformedResponse(String),
    /// The Firehose target answered NAK or with an unexpected raw mode
    #[error("firehose target rejected {0}")]
    Nak(String),

    // Script errors
    /// The rawprogram script contains an unsupported tag
    #[error("malformed rawprogram script at line {line}: {text}")]
    MalformedScript {
        /// 1-based line number
        line: usize,
        /// Offending text
        text: String,
    },
    /// The rawprogram script has more commands than the table holds
    #[error("rawprogram script has more than {0} commands")]
    TooManyCommands(usize),

    // Bounds errors
    /// A constructed value exceeds its fixed limit
    #[error("{what} is {len} bytes, exceeding the {limit} byte limit")]
    ValueTooLong {
        /// What was being built
        what: &'static str,
        /// Actual length
        len: usize,
        /// Limit
        limit: usize,
    },
    /// A command line or layout argument could not be parsed
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, Error>;
