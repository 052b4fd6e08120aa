//! Sahara boot-ROM image transfer protocol
//!
//! After a hello exchange the device drives the session: it asks for byte
//! ranges of the current image and the host answers each read request with
//! exactly the bytes requested.
//!
//! Two session shapes are supported:
//!
//! - **single image** - the boot ROM pulls one programmer image, reports the
//!   end of the image and is told it is done
//! - **multi image** - the download loader pulls a list of container images,
//!   reporting progress and a final status for each

mod engine;
mod image;
mod packet;

pub use engine::{
    Sahara, SaharaState, MULTI_IMAGE_CHUNK_SIZE, READ_TIMEOUT, RX_BUFFER_SIZE,
    SINGLE_IMAGE_CHUNK_SIZE,
};
pub use image::{ImageReader, ImageSource};
pub use packet::{
    command_name, commands, SaharaPacket, HEADER_SIZE, HELLO_LENGTH, MODE_IMAGE_TX_PENDING,
    MODE_MULTI_IMAGE, PROTOCOL_VERSION,
};
