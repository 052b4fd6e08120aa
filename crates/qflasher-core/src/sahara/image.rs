//! Image sources served to Sahara read requests

use std::fmt;
use std::fs::File;
use std::io::{Cursor, Read, Seek};
use std::path::{Path, PathBuf};

use zerocopy::IntoBytes;

use crate::error::{Error, Result};
use crate::sparse::SingleImageHeader;

/// Readable and seekable image data
pub trait ImageReader: Read + Seek {}

impl<T: Read + Seek> ImageReader for T {}

/// Where the bytes of one Sahara image come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    /// An image file on disk
    File(PathBuf),
    /// The in-memory reset image that ends a multi-image session
    ResetPlaceholder,
}

impl ImageSource {
    /// Image backed by a file
    pub fn file(path: impl AsRef<Path>) -> Self {
        ImageSource::File(path.as_ref().to_path_buf())
    }

    /// Open the image for one read request
    pub fn open(&self) -> Result<Box<dyn ImageReader>> {
        match self {
            ImageSource::File(path) => {
                let file = File::open(path).map_err(|source| {
                    log::error!("Failed to open {}: {}", path.display(), source);
                    Error::ImageOpen {
                        path: path.clone(),
                        source,
                    }
                })?;
                Ok(Box::new(file))
            }
            ImageSource::ResetPlaceholder => Ok(Box::new(Cursor::new(
                SingleImageHeader::reset_marker().as_bytes().to_vec(),
            ))),
        }
    }
}

impl fmt::Display for ImageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageSource::File(path) => write!(f, "{}", path.display()),
            ImageSource::ResetPlaceholder => write!(f, "<reset>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sparse::SINGLE_IMAGE_HEADER_SIZE;

    #[test]
    fn test_reset_placeholder_contents() {
        let mut reader = ImageSource::ResetPlaceholder.open().unwrap();
        let mut data = Vec::new();
        reader.read_to_end(&mut data).unwrap();
        assert_eq!(data.len(), SINGLE_IMAGE_HEADER_SIZE);
        assert_eq!(&data[..4], b"RST\0");
    }

    #[test]
    fn test_missing_file() {
        let src = ImageSource::file("/nonexistent/qflasher/main.bin");
        assert!(matches!(src.open(), Err(Error::ImageOpen { .. })));
    }
}
