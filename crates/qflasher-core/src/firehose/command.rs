//! Firehose command model
//!
//! Commands parsed from the rawprogram script keep their original tag text:
//! erase and program entries are sent to the target as written, except for
//! attributes corrected during validation.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use crate::config::StorageType;
use crate::error::{Error, Result};
use crate::sparse::SparseHeader;

use super::xml::{self, attr, bool_attr, number_attr};

/// Longest accepted script tag
pub const MAX_FRAGMENT_LEN: usize = 1024;
/// Longest framed command sent to the target
pub const MAX_COMMAND_LEN: usize = 2048;

/// Filename patch entries must target
pub const PATCH_TARGET_DISK: &str = "DISK";

const XML_PROLOGUE: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\" ?>";

/// Value of a `<response>` element
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseValue {
    /// Command accepted
    Ack,
    /// Command rejected
    Nak,
    /// Anything else the target sent
    Other(String),
}

impl ResponseValue {
    fn parse(value: &str) -> Self {
        match value {
            "ACK" => ResponseValue::Ack,
            "NAK" => ResponseValue::Nak,
            other => ResponseValue::Other(other.to_string()),
        }
    }

    fn as_str(&self) -> &str {
        match self {
            ResponseValue::Ack => "ACK",
            ResponseValue::Nak => "NAK",
            ResponseValue::Other(s) => s,
        }
    }
}

/// `<erase>` script entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EraseCommand {
    /// `SECTOR_SIZE_IN_BYTES`
    pub sector_size: u32,
    /// `start_sector`, `None` when symbolic
    pub start_sector: Option<u64>,
    /// `num_partition_sectors`
    pub num_partition_sectors: u64,
    /// `last_sector`
    pub last_sector: Option<u64>,
    /// `physical_partition_number`
    pub physical_partition_number: u32,
    /// Original tag text
    pub xml: String,
}

/// `<program>` script entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramCommand {
    /// `filename`, relative to the script directory
    pub filename: String,
    /// `sparse`
    pub sparse: bool,
    /// `SECTOR_SIZE_IN_BYTES`
    pub sector_size: u32,
    /// `start_sector`, `None` when symbolic
    pub start_sector: Option<u64>,
    /// `num_partition_sectors`, corrected by [`ProgramCommand::validate`]
    pub num_partition_sectors: u64,
    /// `physical_partition_number`
    pub physical_partition_number: u32,
    /// `file_sector_offset`
    pub file_sector_offset: u64,
    /// Expanded size of a sparse image, set by validation
    pub unsparse_file_size: Option<u64>,
    /// Size of the file on disk, set by validation
    pub file_size: u64,
    /// Tag text sent to the target
    pub xml: String,
}

/// `<patch>` script entry, retained but never executed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchCommand {
    /// `filename`, always [`PATCH_TARGET_DISK`]
    pub filename: String,
    /// `SECTOR_SIZE_IN_BYTES`
    pub sector_size: u32,
    /// `physical_partition_number`
    pub physical_partition_number: u32,
    /// Original tag text
    pub xml: String,
}

/// `<response>` from the target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseCommand {
    /// ACK, NAK or other
    pub value: ResponseValue,
    /// `rawmode="true"`
    pub raw_mode: bool,
    /// Payload size the target supports, when advertised
    pub max_payload_size_to_target: Option<u32>,
}

impl ResponseCommand {
    /// Returns true for an ACK
    pub fn is_ack(&self) -> bool {
        self.value == ResponseValue::Ack
    }
}

/// `<configure>` sent to the target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigureCommand {
    /// `MemoryName`
    pub memory_name: StorageType,
    /// `Verbose`
    pub verbose: bool,
    /// `AlwaysValidate`
    pub always_validate: bool,
    /// `MaxDigestTableSizeInBytes`
    pub max_digest_table_size: u32,
    /// `MaxPayloadSizeToTargetInBytes`
    pub max_payload_size_to_target: u32,
    /// `ZlpAwareHost`
    pub zlp_aware_host: bool,
    /// `SkipStorageInit`
    pub skip_storage_init: bool,
}

impl ConfigureCommand {
    /// Default configure for `storage`
    pub fn new(storage: StorageType, max_payload_size_to_target: u32) -> Self {
        Self {
            memory_name: storage,
            verbose: false,
            always_validate: false,
            max_digest_table_size: 2048,
            max_payload_size_to_target,
            zlp_aware_host: true,
            skip_storage_init: false,
        }
    }
}

/// A Firehose command or message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FirehoseCommand {
    /// Vendor-tagged entry, retained but not executed
    Vendor {
        /// Original tag text
        xml: String,
    },
    /// Erase a partition range
    Erase(EraseCommand),
    /// Program a file
    Program(ProgramCommand),
    /// Patch an on-disk value
    Patch(PatchCommand),
    /// Response from the target
    Response(ResponseCommand),
    /// Log message from the target
    Log {
        /// Message text
        message: String,
    },
    /// Configure the session
    Configure(ConfigureCommand),
    /// Reset the target
    Reset {
        /// Delay before the reset
        delay_secs: u32,
    },
    /// Select the boot storage drive
    SetBootableStorageDrive {
        /// Drive number
        value: u32,
    },
}

fn u32_attr(fragment: &str, key: &str) -> u32 {
    number_attr(fragment, key)
        .and_then(|v| u32::try_from(v).ok())
        .unwrap_or(0)
}

impl FirehoseCommand {
    /// Parse one rawprogram tag
    ///
    /// Returns `Ok(None)` for entries that are recognised but skipped:
    /// program entries without a file and patch entries that do not target
    /// `DISK`.
    pub fn from_script_tag(fragment: &str) -> Result<Option<Self>> {
        if fragment.len() > MAX_FRAGMENT_LEN {
            return Err(Error::ValueTooLong {
                what: "rawprogram tag",
                len: fragment.len(),
                limit: MAX_FRAGMENT_LEN,
            });
        }
        let xml = fragment.to_string();

        if attr(fragment, "vendor") == Some("quectel") {
            return Ok(Some(FirehoseCommand::Vendor { xml }));
        }

        if fragment.starts_with("<erase ") {
            return Ok(Some(FirehoseCommand::Erase(EraseCommand {
                sector_size: u32_attr(fragment, "SECTOR_SIZE_IN_BYTES"),
                start_sector: number_attr(fragment, "start_sector"),
                num_partition_sectors: number_attr(fragment, "num_partition_sectors").unwrap_or(0),
                last_sector: number_attr(fragment, "last_sector"),
                physical_partition_number: u32_attr(fragment, "physical_partition_number"),
                xml,
            })));
        }

        if fragment.starts_with("<program ") {
            let filename = attr(fragment, "filename").unwrap_or_default();
            if filename.trim().is_empty() {
                log::debug!("Skipping program entry without a file: {}", fragment);
                return Ok(None);
            }
            return Ok(Some(FirehoseCommand::Program(ProgramCommand {
                filename: filename.to_string(),
                sparse: bool_attr(fragment, "sparse"),
                sector_size: u32_attr(fragment, "SECTOR_SIZE_IN_BYTES"),
                start_sector: number_attr(fragment, "start_sector"),
                num_partition_sectors: number_attr(fragment, "num_partition_sectors").unwrap_or(0),
                physical_partition_number: u32_attr(fragment, "physical_partition_number"),
                file_sector_offset: number_attr(fragment, "file_sector_offset").unwrap_or(0),
                unsparse_file_size: None,
                file_size: 0,
                xml,
            })));
        }

        if fragment.starts_with("<patch ") {
            let filename = attr(fragment, "filename").unwrap_or_default();
            if filename != PATCH_TARGET_DISK {
                log::info!("Skipping patch entry for '{}'", filename);
                return Ok(None);
            }
            return Ok(Some(FirehoseCommand::Patch(PatchCommand {
                filename: filename.to_string(),
                sector_size: u32_attr(fragment, "SECTOR_SIZE_IN_BYTES"),
                physical_partition_number: u32_attr(fragment, "physical_partition_number"),
                xml,
            })));
        }

        Err(Error::MalformedScript {
            line: 0,
            text: fragment.to_string(),
        })
    }

    /// Parse one element of a target message
    pub fn from_target_element(element: &str) -> Result<Self> {
        if element.starts_with("<response ") {
            return Ok(FirehoseCommand::Response(ResponseCommand {
                value: ResponseValue::parse(attr(element, "value").unwrap_or_default()),
                raw_mode: bool_attr(element, "rawmode"),
                max_payload_size_to_target: number_attr(element, "MaxPayloadSizeToTargetInBytes")
                    .and_then(|v| u32::try_from(v).ok()),
            }));
        }
        if element.starts_with("<log ") {
            return Ok(FirehoseCommand::Log {
                message: attr(element, "value").unwrap_or_default().to_string(),
            });
        }
        Err(Error::MalformedResponse(element.to_string()))
    }

    /// Short name of the command type
    pub fn kind(&self) -> &'static str {
        match self {
            FirehoseCommand::Vendor { .. } => "vendor",
            FirehoseCommand::Erase(_) => "erase",
            FirehoseCommand::Program(_) => "program",
            FirehoseCommand::Patch(_) => "patch",
            FirehoseCommand::Response(_) => "response",
            FirehoseCommand::Log { .. } => "log",
            FirehoseCommand::Configure(_) => "configure",
            FirehoseCommand::Reset { .. } => "reset",
            FirehoseCommand::SetBootableStorageDrive { .. } => "setbootablestoragedrive",
        }
    }

    /// XML element of this command
    pub fn to_xml(&self) -> String {
        match self {
            FirehoseCommand::Vendor { xml } => xml.clone(),
            FirehoseCommand::Erase(e) => e.xml.clone(),
            FirehoseCommand::Program(p) => p.xml.clone(),
            FirehoseCommand::Patch(p) => p.xml.clone(),
            FirehoseCommand::Response(r) => {
                let mut s = format!(
                    "<response value=\"{}\" rawmode=\"{}\"",
                    r.value.as_str(),
                    r.raw_mode
                );
                if let Some(size) = r.max_payload_size_to_target {
                    s.push_str(&format!(" MaxPayloadSizeToTargetInBytes=\"{}\"", size));
                }
                s.push_str(" />");
                s
            }
            FirehoseCommand::Log { message } => format!("<log value=\"{}\" />", message),
            FirehoseCommand::Configure(c) => format!(
                "<configure MemoryName=\"{}\" Verbose=\"{}\" AlwaysValidate=\"{}\" \
                 MaxDigestTableSizeInBytes=\"{}\" MaxPayloadSizeToTargetInBytes=\"{}\"  \
                 ZlpAwareHost=\"{}\" SkipStorageInit=\"{}\" />",
                c.memory_name,
                u8::from(c.verbose),
                u8::from(c.always_validate),
                c.max_digest_table_size,
                c.max_payload_size_to_target,
                u8::from(c.zlp_aware_host),
                u8::from(c.skip_storage_init)
            ),
            FirehoseCommand::Reset { delay_secs } => {
                format!("<power DelayInSeconds=\"{}\" value=\"reset\" />", delay_secs)
            }
            FirehoseCommand::SetBootableStorageDrive { value } => {
                format!("<setbootablestoragedrive value=\"{}\" />", value)
            }
        }
    }

    /// Complete message as sent on the wire
    pub fn frame(&self) -> Result<Vec<u8>> {
        let trailer = match self {
            FirehoseCommand::Configure(_)
            | FirehoseCommand::Reset { .. }
            | FirehoseCommand::SetBootableStorageDrive { .. } => "\n",
            _ => "",
        };
        let text = format!(
            "{}\n<data>\n{}\n</data>{}",
            XML_PROLOGUE,
            self.to_xml(),
            trailer
        );
        if text.len() > MAX_COMMAND_LEN {
            return Err(Error::ValueTooLong {
                what: "firehose command",
                len: text.len(),
                limit: MAX_COMMAND_LEN,
            });
        }
        Ok(text.into_bytes())
    }
}

/// Resolve a script file name against the script directory
///
/// Windows path separators are converted.
pub fn resolve_path(dir: &Path, filename: &str) -> PathBuf {
    dir.join(filename.replace('\\', "/"))
}

impl ProgramCommand {
    /// Check the referenced file and correct the sector count
    ///
    /// On success `num_partition_sectors` equals the file size rounded up to
    /// whole sectors, in both the parsed field and the tag text, and the
    /// resolved file path is returned.
    pub fn validate(&mut self, dir: &Path) -> Result<PathBuf> {
        if self.sector_size == 0 {
            return Err(Error::ZeroSectorSize {
                filename: self.filename.clone(),
            });
        }

        let path = resolve_path(dir, &self.filename);
        let size = fs::metadata(&path)
            .map_err(|source| Error::ImageOpen {
                path: path.clone(),
                source,
            })?
            .len();
        if size == 0 {
            return Err(Error::EmptyFile { path });
        }

        let mut unsparse_file_size = self.unsparse_file_size;
        if self.sparse {
            let mut file = File::open(&path).map_err(|source| Error::ImageOpen {
                path: path.clone(),
                source,
            })?;
            let header = SparseHeader::read_from(&mut file)?;
            if header.is_sparse() {
                unsparse_file_size = Some(header.unsparsed_size());
            } else {
                log::warn!("{} is marked sparse but has no sparse header", path.display());
            }
        }

        let sectors = size.div_ceil(u64::from(self.sector_size));
        let xml = self.render(sectors, unsparse_file_size)?;
        if sectors != self.num_partition_sectors {
            log::info!(
                "Correcting num_partition_sectors of {} from {} to {}",
                self.filename,
                self.num_partition_sectors,
                sectors
            );
        }
        self.num_partition_sectors = sectors;
        self.unsparse_file_size = unsparse_file_size;
        self.file_size = size;
        self.xml = xml;

        Ok(path)
    }

    /// Build the tag text for the given sector count and unsparsed size
    ///
    /// The command itself is left untouched.
    fn render(&self, sectors: u64, unsparse_file_size: Option<u64>) -> Result<String> {
        let xml = if let Some(unsparse) = unsparse_file_size {
            format!(
                "<program filename=\"{}\" SECTOR_SIZE_IN_BYTES=\"{}\" num_partition_sectors=\"{}\" \
                 physical_partition_number=\"{}\" start_sector=\"{}\" file_sector_offset=\"{}\" \
                 sparse=\"true\" UNSPARSE_FILE_SIZE=\"{}\" />",
                self.filename,
                self.sector_size,
                sectors,
                self.physical_partition_number,
                self.start_sector.unwrap_or(0),
                self.file_sector_offset,
                unsparse
            )
        } else {
            let mut xml = self.xml.clone();
            let sectors = sectors.to_string();
            if !xml::set_attr(&mut xml, "num_partition_sectors", &sectors) {
                let at = "<program".len();
                xml.insert_str(at, &format!(" num_partition_sectors=\"{}\"", sectors));
            }
            xml
        };

        if xml.len() > MAX_FRAGMENT_LEN {
            return Err(Error::ValueTooLong {
                what: "program tag",
                len: xml.len(),
                limit: MAX_FRAGMENT_LEN,
            });
        }
        Ok(xml)
    }
}
