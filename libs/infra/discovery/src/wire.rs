use std::io::Cursor;
use std::net::Ipv4Addr;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use pinchot_model::{EncoderFlags, FirmwareVersion, ProductType, ScanSyncRecord};

use crate::error::DiscoveryError;

/// Distinguishes a discovery datagram from unrelated UDP traffic landing on
/// the shared discovery port.
const DISCOVERY_MAGIC: u8 = 0xDC;

const KIND_SCAN_HEAD: u8 = 0;
const KIND_SCAN_SYNC: u8 = 1;

/// A scan head's reply to a discovery solicitation.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanHeadDiscoveryRecord {
    pub serial: u32,
    pub product_type: ProductType,
    pub firmware_version: FirmwareVersion,
    pub ip: Ipv4Addr,
}

/// One responder's reply, tagged by device family. ScanSync modules reuse
/// the model crate's `ScanSyncRecord` directly since discovery and the
/// periodic ScanSync announcement carry the same fields.
#[derive(Debug, Clone, PartialEq)]
pub enum DiscoveryRecord {
    ScanHead(ScanHeadDiscoveryRecord),
    ScanSync(ScanSyncRecord),
}

impl DiscoveryRecord {
    pub fn serial(&self) -> u32 {
        match self {
            DiscoveryRecord::ScanHead(record) => record.serial,
            DiscoveryRecord::ScanSync(record) => record.serial,
        }
    }
}

/// A broadcast solicitation carries no payload beyond the magic byte: any
/// reachable device that recognises it replies with its own record.
pub fn encode_probe() -> Vec<u8> {
    vec![DISCOVERY_MAGIC]
}

pub fn encode_scan_head_response(record: &ScanHeadDiscoveryRecord) -> Vec<u8> {
    let mut out = Vec::with_capacity(16);
    out.write_u8(DISCOVERY_MAGIC).unwrap();
    out.write_u8(KIND_SCAN_HEAD).unwrap();
    out.write_u32::<BigEndian>(record.serial).unwrap();
    out.write_u32::<BigEndian>(record.product_type.into()).unwrap();
    out.write_u16::<BigEndian>(record.firmware_version.major).unwrap();
    out.write_u16::<BigEndian>(record.firmware_version.minor).unwrap();
    out.write_u16::<BigEndian>(record.firmware_version.patch).unwrap();
    out.extend_from_slice(&record.ip.octets());
    out
}

/// Encodes a ScanSync record. Firmware below 2.1.0 omits IP/version on the
/// wire (§4.2); this is modelled by `firmware_version`/`ip` being `None`.
pub fn encode_scan_sync_response(record: &ScanSyncRecord) -> Vec<u8> {
    let mut out = Vec::with_capacity(16);
    out.write_u8(DISCOVERY_MAGIC).unwrap();
    out.write_u8(KIND_SCAN_SYNC).unwrap();
    out.write_u32::<BigEndian>(record.serial).unwrap();
    match (record.firmware_version, record.ip) {
        (Some(version), Some(ip)) => {
            out.write_u8(1).unwrap();
            out.write_u16::<BigEndian>(version.major).unwrap();
            out.write_u16::<BigEndian>(version.minor).unwrap();
            out.write_u16::<BigEndian>(version.patch).unwrap();
            out.extend_from_slice(&ip.octets());
        }
        _ => out.write_u8(0).unwrap(),
    }
    out.write_u32::<BigEndian>(record.flags.bits()).unwrap();
    out
}

pub fn decode_response(bytes: &[u8]) -> Result<DiscoveryRecord, DiscoveryError> {
    let mut cursor = Cursor::new(bytes);
    let magic = cursor
        .read_u8()
        .map_err(|_| DiscoveryError::Truncated { needed: 1, got: bytes.len() })?;
    if magic != DISCOVERY_MAGIC {
        return Err(DiscoveryError::BadMagic(magic));
    }
    let kind = cursor
        .read_u8()
        .map_err(|_| DiscoveryError::Truncated { needed: 2, got: bytes.len() })?;
    let serial = cursor
        .read_u32::<BigEndian>()
        .map_err(|_| DiscoveryError::Truncated { needed: 6, got: bytes.len() })?;

    match kind {
        KIND_SCAN_HEAD => {
            let product_type = cursor
                .read_u32::<BigEndian>()
                .map_err(|_| DiscoveryError::Truncated { needed: 10, got: bytes.len() })?
                .into();
            let major = cursor
                .read_u16::<BigEndian>()
                .map_err(|_| DiscoveryError::Truncated { needed: 12, got: bytes.len() })?;
            let minor = cursor
                .read_u16::<BigEndian>()
                .map_err(|_| DiscoveryError::Truncated { needed: 14, got: bytes.len() })?;
            let patch = cursor
                .read_u16::<BigEndian>()
                .map_err(|_| DiscoveryError::Truncated { needed: 16, got: bytes.len() })?;
            let mut octets = [0u8; 4];
            std::io::Read::read_exact(&mut cursor, &mut octets)
                .map_err(|_| DiscoveryError::Truncated { needed: 20, got: bytes.len() })?;

            Ok(DiscoveryRecord::ScanHead(ScanHeadDiscoveryRecord {
                serial,
                product_type,
                firmware_version: FirmwareVersion::new(major, minor, patch),
                ip: Ipv4Addr::from(octets),
            }))
        }
        KIND_SCAN_SYNC => {
            let has_identity = cursor
                .read_u8()
                .map_err(|_| DiscoveryError::Truncated { needed: 7, got: bytes.len() })?;
            let (firmware_version, ip) = if has_identity != 0 {
                let major = cursor
                    .read_u16::<BigEndian>()
                    .map_err(|_| DiscoveryError::Truncated { needed: 9, got: bytes.len() })?;
                let minor = cursor
                    .read_u16::<BigEndian>()
                    .map_err(|_| DiscoveryError::Truncated { needed: 11, got: bytes.len() })?;
                let patch = cursor
                    .read_u16::<BigEndian>()
                    .map_err(|_| DiscoveryError::Truncated { needed: 13, got: bytes.len() })?;
                let mut octets = [0u8; 4];
                std::io::Read::read_exact(&mut cursor, &mut octets)
                    .map_err(|_| DiscoveryError::Truncated { needed: 17, got: bytes.len() })?;
                (Some(FirmwareVersion::new(major, minor, patch)), Some(Ipv4Addr::from(octets)))
            } else {
                (None, None)
            };
            let flags = EncoderFlags::from_bits_truncate(
                cursor
                    .read_u32::<BigEndian>()
                    .map_err(|_| DiscoveryError::Truncated { needed: cursor.position() as usize + 4, got: bytes.len() })?,
            );

            Ok(DiscoveryRecord::ScanSync(ScanSyncRecord {
                serial,
                firmware_version,
                ip,
                flags,
            }))
        }
        other => Err(DiscoveryError::UnknownKind(other)),
    }
}
