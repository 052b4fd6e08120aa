//! Firmware directory layout
//!
//! Firmware is delivered as type-named directories, each holding one
//! conventionally named image. The oem directory also carries the Firehose
//! programmer and rawprogram script.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::sahara::ImageSource;

/// Image file name inside the main directory
pub const MAIN_IMAGE: &str = "main.bin";
/// Image file name inside the oem directory
pub const OEM_IMAGE: &str = "oem.bin";
/// Image file name inside the carrier directory
pub const CARRIER_IMAGE: &str = "carrier.bin";

/// Resolved firmware image locations
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FirmwareLayout {
    /// Directory holding `main.bin`
    pub main: Option<PathBuf>,
    /// Directory holding `oem.bin`, the programmer and the rawprogram script
    pub oem: Option<PathBuf>,
    /// Directory holding `carrier.bin`
    pub carrier: Option<PathBuf>,
}

impl FirmwareLayout {
    /// Parse a `type:dir[,type:dir...]` argument
    ///
    /// Recognised types are `main`, `oem` and `carrier`; unknown types are
    /// skipped with a warning.
    pub fn parse(arg: &str) -> Result<Self> {
        let mut layout = Self::default();

        for entry in arg.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let Some((kind, dir)) = entry.split_once(':') else {
                return Err(Error::InvalidArgument(format!(
                    "firmware entry '{}' is not of the form type:dir",
                    entry
                )));
            };
            let dir = dir.trim();
            if dir.is_empty() {
                return Err(Error::InvalidArgument(format!(
                    "firmware entry '{}' has an empty directory",
                    entry
                )));
            }

            let slot = match kind.trim() {
                "main" => &mut layout.main,
                "oem" => &mut layout.oem,
                "carrier" => &mut layout.carrier,
                other => {
                    log::warn!("Ignoring unknown firmware type '{}'", other);
                    continue;
                }
            };
            *slot = Some(PathBuf::from(dir));
        }

        if layout.is_empty() {
            return Err(Error::InvalidArgument(format!(
                "no firmware directories in '{}'",
                arg
            )));
        }
        Ok(layout)
    }

    /// Returns true when no directory is set
    pub fn is_empty(&self) -> bool {
        self.main.is_none() && self.oem.is_none() && self.carrier.is_none()
    }

    /// Path of `main.bin`
    pub fn main_image(&self) -> Option<PathBuf> {
        self.main.as_ref().map(|d| d.join(MAIN_IMAGE))
    }

    /// Path of `oem.bin`
    pub fn oem_image(&self) -> Option<PathBuf> {
        self.oem.as_ref().map(|d| d.join(OEM_IMAGE))
    }

    /// Path of `carrier.bin`
    pub fn carrier_image(&self) -> Option<PathBuf> {
        self.carrier.as_ref().map(|d| d.join(CARRIER_IMAGE))
    }

    /// The oem directory, required by the EDL flow
    pub fn oem_dir(&self) -> Result<&Path> {
        self.oem
            .as_deref()
            .ok_or_else(|| Error::InvalidArgument("no oem directory given".into()))
    }

    /// Path of the Firehose programmer inside the oem directory
    pub fn programmer_path(&self, programmer_name: &str) -> Result<PathBuf> {
        Ok(self.oem_dir()?.join(programmer_name))
    }

    /// Images served in a multi-image session, in transfer order
    ///
    /// Main, carrier and oem images that are configured, followed by the
    /// in-memory reset image.
    pub fn multi_image_sources(&self) -> Vec<ImageSource> {
        [self.main_image(), self.carrier_image(), self.oem_image()]
            .into_iter()
            .flatten()
            .map(ImageSource::File)
            .chain(std::iter::once(ImageSource::ResetPlaceholder))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full() {
        let layout = FirmwareLayout::parse("main:/fw/a,oem:/fw/b,carrier:/fw/c").unwrap();
        assert_eq!(layout.main_image(), Some(PathBuf::from("/fw/a/main.bin")));
        assert_eq!(layout.oem_image(), Some(PathBuf::from("/fw/b/oem.bin")));
        assert_eq!(layout.carrier_image(), Some(PathBuf::from("/fw/c/carrier.bin")));
        assert_eq!(
            layout.programmer_path("prog.mbn").unwrap(),
            PathBuf::from("/fw/b/prog.mbn")
        );
    }

    #[test]
    fn test_parse_unknown_type_ignored() {
        let layout = FirmwareLayout::parse("oem:/fw/b,modem:/fw/x").unwrap();
        assert!(layout.main.is_none());
        assert_eq!(layout.oem, Some(PathBuf::from("/fw/b")));
    }

    #[test]
    fn test_parse_errors() {
        assert!(FirmwareLayout::parse("").is_err());
        assert!(FirmwareLayout::parse("main").is_err());
        assert!(FirmwareLayout::parse("main:").is_err());
        assert!(FirmwareLayout::parse("modem:/x").is_err());
    }

    #[test]
    fn test_multi_image_order() {
        let layout = FirmwareLayout::parse("oem:/o,carrier:/c,main:/m").unwrap();
        let sources = layout.multi_image_sources();
        assert_eq!(
            sources,
            vec![
                ImageSource::file("/m/main.bin"),
                ImageSource::file("/c/carrier.bin"),
                ImageSource::file("/o/oem.bin"),
                ImageSource::ResetPlaceholder,
            ]
        );
    }

    #[test]
    fn test_missing_oem() {
        let layout = FirmwareLayout::parse("main:/m").unwrap();
        assert!(layout.programmer_path("prog.mbn").is_err());
        assert_eq!(layout.multi_image_sources().len(), 2);
    }
}
