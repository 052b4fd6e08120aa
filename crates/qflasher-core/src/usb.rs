//! Raw USB descriptor walking
//!
//! The Linux usbfs `descriptors` file holds the device descriptor followed
//! by every configuration descriptor and its interface, endpoint and
//! class-specific descriptors, back to back. This module walks that blob
//! with explicit bounds checks and picks the vendor-specific bulk interface
//! used by Sahara and Firehose.

use crate::error::{Error, Result};

/// Vendor id of modems in normal operation or in the download loader
pub const VENDOR_ID_QUECTEL: u16 = 0x2c7c;
/// Vendor id of modems in boot-ROM emergency download mode
pub const VENDOR_ID_QUALCOMM: u16 = 0x05c6;
/// Product id of the boot-ROM emergency download device
pub const PRODUCT_ID_EDL: u16 = 0x9008;

/// Interface protocol bytes accepted for the download interface
pub const DOWNLOAD_PROTOCOLS: [u8; 3] = [0xff, 0x10, 0x11];

const MAX_INTERFACES: usize = 32;
const MAX_ENDPOINTS: usize = 30;

/// Descriptor type codes
mod dt {
    pub const DEVICE: u8 = 0x01;
    pub const CONFIG: u8 = 0x02;
    pub const INTERFACE: u8 = 0x04;
    pub const ENDPOINT: u8 = 0x05;
}

const DEVICE_DESCRIPTOR_SIZE: usize = 18;
const CONFIG_DESCRIPTOR_SIZE: usize = 9;
const INTERFACE_DESCRIPTOR_SIZE: usize = 9;
const ENDPOINT_DESCRIPTOR_SIZE: usize = 7;

const ENDPOINT_DIR_IN: u8 = 0x80;
const TRANSFER_TYPE_MASK: u8 = 0x03;
const TRANSFER_TYPE_BULK: u8 = 0x02;

/// Returns true for the two vendor ids this tool talks to
pub fn is_recognized_vendor(vendor_id: u16) -> bool {
    vendor_id == VENDOR_ID_QUECTEL || vendor_id == VENDOR_ID_QUALCOMM
}

/// One endpoint descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointDescriptor {
    /// Endpoint address including the direction bit
    pub address: u8,
    /// bmAttributes
    pub attributes: u8,
    /// Max packet size (low 11 bits of wMaxPacketSize)
    pub max_packet_size: u16,
}

impl EndpointDescriptor {
    /// Returns true for a bulk endpoint
    pub fn is_bulk(&self) -> bool {
        self.attributes & TRANSFER_TYPE_MASK == TRANSFER_TYPE_BULK
    }

    /// Returns true for an IN (device to host) endpoint
    pub fn is_in(&self) -> bool {
        self.address & ENDPOINT_DIR_IN != 0
    }
}

/// One interface descriptor with the endpoints that follow it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceDescriptor {
    /// bInterfaceNumber
    pub number: u8,
    /// bAlternateSetting
    pub alternate_setting: u8,
    /// bInterfaceClass
    pub class: u8,
    /// bInterfaceSubClass
    pub subclass: u8,
    /// bInterfaceProtocol
    pub protocol: u8,
    /// bNumEndpoints as declared
    pub num_endpoints: u8,
    /// Endpoint descriptors found after the interface descriptor
    pub endpoints: Vec<EndpointDescriptor>,
}

/// Device and first-configuration descriptors of one USB device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptorSet {
    /// idVendor
    pub vendor_id: u16,
    /// idProduct
    pub product_id: u16,
    /// bNumInterfaces of the first configuration
    pub num_interfaces: u8,
    /// Interface descriptors of the first configuration
    pub interfaces: Vec<InterfaceDescriptor>,
}

/// The bulk pipe selected for Sahara and Firehose traffic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BulkInterface {
    /// Interface number to claim
    pub interface_number: u8,
    /// Bulk IN endpoint address
    pub in_endpoint: u8,
    /// Bulk OUT endpoint address
    pub out_endpoint: u8,
    /// Max packet size of the IN endpoint
    pub in_max_packet_size: u16,
    /// Max packet size of the OUT endpoint
    pub out_max_packet_size: u16,
}

/// Result of probing a candidate device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Probe {
    /// Device is already in boot-ROM emergency download mode
    Edl(BulkInterface),
    /// Device exposes the download-loader interface
    Loader(BulkInterface),
}

impl Probe {
    /// The selected bulk interface
    pub fn interface(&self) -> &BulkInterface {
        match self {
            Probe::Edl(i) | Probe::Loader(i) => i,
        }
    }
}

fn le_u16(bytes: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([bytes[offset], bytes[offset + 1]])
}

/// Split a descriptor blob into `(type, bytes)` records
fn split_descriptors(blob: &[u8]) -> Result<Vec<(u8, &[u8])>> {
    let mut records = Vec::new();
    let mut pos = 0;
    while pos < blob.len() {
        let remaining = &blob[pos..];
        if remaining.len() < 2 {
            return Err(Error::Descriptor(format!(
                "truncated descriptor header at offset {}",
                pos
            )));
        }
        let len = remaining[0] as usize;
        if len < 2 || len > remaining.len() {
            return Err(Error::Descriptor(format!(
                "descriptor at offset {} has invalid length {}",
                pos, len
            )));
        }
        records.push((remaining[1], &remaining[..len]));
        pos += len;
    }
    Ok(records)
}

/// Walk a raw descriptor blob
///
/// Only the first configuration is considered; descriptors of other types
/// (class-specific, SuperSpeed companions) are skipped.
pub fn parse_descriptors(blob: &[u8]) -> Result<DescriptorSet> {
    let records = split_descriptors(blob)?;
    let mut iter = records.into_iter();

    let device = match iter.next() {
        Some((dt::DEVICE, d)) if d.len() >= DEVICE_DESCRIPTOR_SIZE => d,
        _ => return Err(Error::Descriptor("missing device descriptor".into())),
    };
    let vendor_id = le_u16(device, 8);
    let product_id = le_u16(device, 10);
    log::trace!("Device descriptor {:04x}:{:04x}", vendor_id, product_id);

    let num_interfaces = match iter.next() {
        Some((dt::CONFIG, c)) if c.len() >= CONFIG_DESCRIPTOR_SIZE => c[4],
        _ => return Err(Error::Descriptor("missing configuration descriptor".into())),
    };
    if num_interfaces == 0 {
        return Err(Error::Descriptor("configuration has no interfaces".into()));
    }

    let mut interfaces: Vec<InterfaceDescriptor> = Vec::new();
    for (kind, bytes) in iter {
        match kind {
            dt::CONFIG => break,
            dt::INTERFACE => {
                if bytes.len() < INTERFACE_DESCRIPTOR_SIZE {
                    return Err(Error::Descriptor("short interface descriptor".into()));
                }
                if interfaces.len() == MAX_INTERFACES {
                    return Err(Error::Descriptor(format!(
                        "more than {} interface descriptors",
                        MAX_INTERFACES
                    )));
                }
                let intf = InterfaceDescriptor {
                    number: bytes[2],
                    alternate_setting: bytes[3],
                    num_endpoints: bytes[4],
                    class: bytes[5],
                    subclass: bytes[6],
                    protocol: bytes[7],
                    endpoints: Vec::new(),
                };
                log::trace!(
                    "Interface {} alt {}: {:02x}/{:02x}/{:02x}, {} endpoints",
                    intf.number,
                    intf.alternate_setting,
                    intf.class,
                    intf.subclass,
                    intf.protocol,
                    intf.num_endpoints
                );
                interfaces.push(intf);
            }
            dt::ENDPOINT => {
                if bytes.len() < ENDPOINT_DESCRIPTOR_SIZE {
                    return Err(Error::Descriptor("short endpoint descriptor".into()));
                }
                let Some(intf) = interfaces.last_mut() else {
                    return Err(Error::Descriptor(
                        "endpoint descriptor before any interface".into(),
                    ));
                };
                if intf.endpoints.len() == MAX_ENDPOINTS {
                    return Err(Error::Descriptor(format!(
                        "interface {} has more than {} endpoints",
                        intf.number, MAX_ENDPOINTS
                    )));
                }
                let ep = EndpointDescriptor {
                    address: bytes[2],
                    attributes: bytes[3],
                    max_packet_size: le_u16(bytes, 4) & 0x07ff,
                };
                log::trace!(
                    "  endpoint {:#04x} attr {:#04x} mps {}",
                    ep.address,
                    ep.attributes,
                    ep.max_packet_size
                );
                intf.endpoints.push(ep);
            }
            other => log::trace!("Skipping descriptor type {:#04x}", other),
        }
    }

    Ok(DescriptorSet {
        vendor_id,
        product_id,
        num_interfaces,
        interfaces,
    })
}

impl DescriptorSet {
    /// Returns true for the boot-ROM emergency download device
    pub fn is_edl(&self) -> bool {
        self.vendor_id == VENDOR_ID_QUALCOMM && self.product_id == PRODUCT_ID_EDL
    }

    /// Select the first vendor-specific interface with a bulk IN/OUT pair
    pub fn find_download_interface(&self) -> Result<BulkInterface> {
        let intf = self
            .interfaces
            .iter()
            .find(|i| {
                i.class == 0xff && i.subclass == 0xff && DOWNLOAD_PROTOCOLS.contains(&i.protocol)
            })
            .ok_or_else(|| Error::Descriptor("no vendor-specific download interface".into()))?;

        let bulk_in = intf.endpoints.iter().find(|e| e.is_bulk() && e.is_in());
        let bulk_out = intf.endpoints.iter().find(|e| e.is_bulk() && !e.is_in());
        let (Some(bulk_in), Some(bulk_out)) = (bulk_in, bulk_out) else {
            return Err(Error::InvalidEndpoint(format!(
                "interface {} lacks a bulk IN/OUT pair",
                intf.number
            )));
        };

        for ep in [bulk_in, bulk_out] {
            if ep.max_packet_size == 0 {
                return Err(Error::InvalidEndpoint(format!(
                    "endpoint {:#04x} has a zero max packet size",
                    ep.address
                )));
            }
        }

        Ok(BulkInterface {
            interface_number: intf.number,
            in_endpoint: bulk_in.address,
            out_endpoint: bulk_out.address,
            in_max_packet_size: bulk_in.max_packet_size,
            out_max_packet_size: bulk_out.max_packet_size,
        })
    }
}

/// Classify a candidate device from its raw descriptors
///
/// Unknown vendors are rejected; the EDL product id is reported as
/// [`Probe::Edl`] so callers can tell a device already in download mode
/// apart from one running the download loader.
pub fn probe(blob: &[u8]) -> Result<Probe> {
    let set = parse_descriptors(blob)?;
    if !is_recognized_vendor(set.vendor_id) {
        return Err(Error::Descriptor(format!(
            "unsupported vendor {:04x}",
            set.vendor_id
        )));
    }

    let intf = set.find_download_interface()?;
    log::debug!(
        "Download interface {}: in {:#04x} ({}), out {:#04x} ({})",
        intf.interface_number,
        intf.in_endpoint,
        intf.in_max_packet_size,
        intf.out_endpoint,
        intf.out_max_packet_size
    );

    if set.is_edl() {
        log::info!(
            "Device {:04x}:{:04x} is already in EDL mode",
            set.vendor_id,
            set.product_id
        );
        Ok(Probe::Edl(intf))
    } else {
        Ok(Probe::Loader(intf))
    }
}

/// Operating mode of an attached modem
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModemMode {
    /// Normal operation; a mode switch is needed before flashing
    Normal,
    /// Download loader exposed by the running firmware
    Sbl,
    /// Boot-ROM emergency download mode
    Edl,
}

impl ModemMode {
    /// Returns true for either download mode
    pub fn is_download(&self) -> bool {
        matches!(self, ModemMode::Sbl | ModemMode::Edl)
    }

    /// Classify a single device
    ///
    /// A device carrying the boot-ROM vendor id is in EDL. A normal-vendor
    /// device whose four-interface configuration starts with an MBIM
    /// control interface without endpoints is running the download loader.
    pub fn classify(set: &DescriptorSet) -> Option<Self> {
        match set.vendor_id {
            VENDOR_ID_QUALCOMM => Some(ModemMode::Edl),
            VENDOR_ID_QUECTEL => {
                let first = set.interfaces.iter().find(|i| i.number == 0);
                let sbl = set.num_interfaces == 4
                    && first.is_some_and(|i| {
                        i.class == 0x02
                            && i.subclass == 0x0e
                            && i.protocol == 0x00
                            && i.num_endpoints == 0
                    });
                Some(if sbl { ModemMode::Sbl } else { ModemMode::Normal })
            }
            _ => None,
        }
    }
}

#[cfg(test)]
pub(crate) mod test_blobs {
    /// Build a descriptor blob for a single-configuration device
    pub fn device_blob(
        vid: u16,
        pid: u16,
        interfaces: &[(u8, [u8; 3], &[(u8, u8, u16)])],
    ) -> Vec<u8> {
        let mut blob = vec![18, 0x01, 0x00, 0x02, 0, 0, 0, 64];
        blob.extend_from_slice(&vid.to_le_bytes());
        blob.extend_from_slice(&pid.to_le_bytes());
        blob.extend_from_slice(&[0x00, 0x01, 1, 2, 3, 1]);
        blob.extend_from_slice(&[9, 0x02, 0, 0, interfaces.len() as u8, 1, 0, 0x80, 250]);
        for (number, [class, sub, proto], eps) in interfaces {
            blob.extend_from_slice(&[
                9,
                0x04,
                *number,
                0,
                eps.len() as u8,
                *class,
                *sub,
                *proto,
                0,
            ]);
            for (addr, attr, mps) in eps.iter() {
                blob.extend_from_slice(&[7, 0x05, *addr, *attr]);
                blob.extend_from_slice(&mps.to_le_bytes());
                blob.push(0);
                // SuperSpeed endpoint companion
                blob.extend_from_slice(&[6, 0x30, 0, 0, 0, 0]);
            }
        }
        blob
    }
}

#[cfg(test)]
mod tests {
    use super::test_blobs::device_blob;
    use super::*;

    const BULK_PAIR: &[(u8, u8, u16)] = &[(0x81, 0x02, 512), (0x01, 0x02, 512)];
    const NO_ENDPOINTS: &[(u8, u8, u16)] = &[];

    #[test]
    fn test_probe_loader_interface() {
        let blob = device_blob(
            VENDOR_ID_QUECTEL,
            0x0306,
            &[
                (0, [0x02, 0x0e, 0x00], NO_ENDPOINTS),
                (3, [0xff, 0xff, 0x10], BULK_PAIR),
            ],
        );
        let probe = probe(&blob).unwrap();
        assert_eq!(
            probe,
            Probe::Loader(BulkInterface {
                interface_number: 3,
                in_endpoint: 0x81,
                out_endpoint: 0x01,
                in_max_packet_size: 512,
                out_max_packet_size: 512,
            })
        );
    }

    #[test]
    fn test_probe_edl() {
        let blob = device_blob(
            VENDOR_ID_QUALCOMM,
            PRODUCT_ID_EDL,
            &[(0, [0xff, 0xff, 0xff], BULK_PAIR)],
        );
        assert!(matches!(probe(&blob).unwrap(), Probe::Edl(_)));
    }

    #[test]
    fn test_probe_rejects_unknown_vendor() {
        let blob = device_blob(0x1234, 0x5678, &[(0, [0xff, 0xff, 0xff], BULK_PAIR)]);
        assert!(matches!(probe(&blob), Err(Error::Descriptor(_))));
    }

    #[test]
    fn test_probe_rejects_other_protocol() {
        let blob = device_blob(VENDOR_ID_QUECTEL, 0x0125, &[(0, [0xff, 0xff, 0x30], BULK_PAIR)]);
        assert!(matches!(probe(&blob), Err(Error::Descriptor(_))));
    }

    #[test]
    fn test_probe_rejects_zero_packet_size() {
        let eps: &[(u8, u8, u16)] = &[(0x81, 0x02, 0), (0x01, 0x02, 512)];
        let blob = device_blob(VENDOR_ID_QUECTEL, 0x0125, &[(0, [0xff, 0xff, 0xff], eps)]);
        assert!(matches!(probe(&blob), Err(Error::InvalidEndpoint(_))));
    }

    #[test]
    fn test_interrupt_endpoints_ignored() {
        let eps: &[(u8, u8, u16)] = &[(0x83, 0x03, 8), (0x81, 0x02, 64), (0x01, 0x02, 64)];
        let blob = device_blob(VENDOR_ID_QUECTEL, 0x0125, &[(0, [0xff, 0xff, 0x11], eps)]);
        let intf = *probe(&blob).unwrap().interface();
        assert_eq!(intf.in_endpoint, 0x81);
        assert_eq!(intf.in_max_packet_size, 64);
    }

    #[test]
    fn test_truncated_blob() {
        let mut blob =
            device_blob(VENDOR_ID_QUECTEL, 0x0125, &[(0, [0xff, 0xff, 0xff], BULK_PAIR)]);
        blob.truncate(blob.len() - 3);
        assert!(matches!(parse_descriptors(&blob), Err(Error::Descriptor(_))));
    }

    #[test]
    fn test_zero_length_descriptor() {
        let mut blob = device_blob(VENDOR_ID_QUECTEL, 0x0125, &[]);
        blob.extend_from_slice(&[0, 0x04]);
        assert!(parse_descriptors(&blob).is_err());
    }

    #[test]
    fn test_classify_modes() {
        let sbl = parse_descriptors(&device_blob(
            VENDOR_ID_QUECTEL,
            0x0306,
            &[
                (0, [0x02, 0x0e, 0x00], NO_ENDPOINTS),
                (1, [0x0a, 0x00, 0x02], BULK_PAIR),
                (2, [0xff, 0xff, 0xff], BULK_PAIR),
                (3, [0xff, 0xff, 0x10], BULK_PAIR),
            ],
        ))
        .unwrap();
        assert_eq!(ModemMode::classify(&sbl), Some(ModemMode::Sbl));

        let normal = parse_descriptors(&device_blob(
            VENDOR_ID_QUECTEL,
            0x0306,
            &[
                (0, [0x02, 0x0e, 0x00], &[(0x82, 0x03, 64)][..]),
                (1, [0x0a, 0x00, 0x02], BULK_PAIR),
            ],
        ))
        .unwrap();
        assert_eq!(ModemMode::classify(&normal), Some(ModemMode::Normal));

        let edl = parse_descriptors(&device_blob(
            VENDOR_ID_QUALCOMM,
            PRODUCT_ID_EDL,
            &[(0, [0xff, 0xff, 0xff], BULK_PAIR)],
        ))
        .unwrap();
        assert_eq!(ModemMode::classify(&edl), Some(ModemMode::Edl));

        let other =
            parse_descriptors(&device_blob(0x1d6b, 0x0002, &[(0, [0x09, 0, 0], NO_ENDPOINTS)]))
                .unwrap();
        assert_eq!(ModemMode::classify(&other), None);
    }
}
