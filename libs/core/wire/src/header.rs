use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::Cursor;

use pinchot_model::{DataType, PacketFlags};

use crate::error::WireError;

/// Marks a datagram as a profile packet rather than some other UDP traffic
/// landing on the same port (e.g. a stray discovery response).
pub const PROFILE_MAGIC: u8 = 0xAA;

/// Upper bound on the number of simultaneous encoder channels a ScanSync
/// can report per profile; bounds the fixed-layout header so decoding never
/// has to trust an attacker-controlled count without a ceiling.
pub const MAX_ENCODER_CHANNELS: usize = 8;

/// Fixed-layout header preceding every profile packet fragment. All
/// multi-byte fields are big-endian, matching the real head firmware's wire
/// order.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfilePacketHeader {
    pub head_serial: u32,
    pub camera: u8,
    pub laser: u8,
    pub sequence: u32,
    pub timestamp_ns: u64,
    pub data_types: DataType,
    pub flags: PacketFlags,
    pub fragment_index: u16,
    pub fragment_count: u16,
    pub encoder_values: Vec<i64>,
    /// Length of the payload region that follows the header in the same
    /// datagram.
    pub payload_len: u32,
}

impl ProfilePacketHeader {
    pub fn encoded_len(&self) -> usize {
        1 + 4 + 1 + 1 + 4 + 8 + 2 + 2 + 2 + 2 + 1 + self.encoder_values.len() * 8 + 4
    }

    pub fn encode(&self, out: &mut Vec<u8>) -> Result<(), WireError> {
        out.write_u8(PROFILE_MAGIC).expect("write to Vec cannot fail");
        out.write_u32::<BigEndian>(self.head_serial).unwrap();
        out.write_u8(self.camera).unwrap();
        out.write_u8(self.laser).unwrap();
        out.write_u32::<BigEndian>(self.sequence).unwrap();
        out.write_u64::<BigEndian>(self.timestamp_ns).unwrap();
        out.write_u16::<BigEndian>(self.data_types.bits()).unwrap();
        out.write_u16::<BigEndian>(self.flags.bits()).unwrap();
        out.write_u16::<BigEndian>(self.fragment_index).unwrap();
        out.write_u16::<BigEndian>(self.fragment_count).unwrap();
        out.write_u8(self.encoder_values.len() as u8).unwrap();
        for value in &self.encoder_values {
            out.write_i64::<BigEndian>(*value).unwrap();
        }
        out.write_u32::<BigEndian>(self.payload_len).unwrap();
        Ok(())
    }

    /// Decodes a header from the front of `bytes`, returning the header and
    /// the number of bytes consumed. The payload itself is not consumed;
    /// callers slice `bytes[consumed..]` for the fragment payload.
    pub fn decode(bytes: &[u8]) -> Result<(Self, usize), WireError> {
        if bytes.is_empty() {
            return Err(WireError::Truncated {
                needed: 1,
                got: 0,
            });
        }
        if bytes[0] != PROFILE_MAGIC {
            return Err(WireError::NotAProfilePacket(bytes[0]));
        }

        let mut cursor = Cursor::new(bytes);
        cursor.read_u8().map_err(|_| truncated(1, bytes.len()))?;

        let head_serial = cursor
            .read_u32::<BigEndian>()
            .map_err(|_| truncated(5, bytes.len()))?;
        let camera = cursor.read_u8().map_err(|_| truncated(6, bytes.len()))?;
        let laser = cursor.read_u8().map_err(|_| truncated(7, bytes.len()))?;
        let sequence = cursor
            .read_u32::<BigEndian>()
            .map_err(|_| truncated(11, bytes.len()))?;
        let timestamp_ns = cursor
            .read_u64::<BigEndian>()
            .map_err(|_| truncated(19, bytes.len()))?;
        let data_types = DataType::from_bits_truncate(
            cursor
                .read_u16::<BigEndian>()
                .map_err(|_| truncated(21, bytes.len()))?,
        );
        let flags = PacketFlags::from_bits_truncate(
            cursor
                .read_u16::<BigEndian>()
                .map_err(|_| truncated(23, bytes.len()))?,
        );
        let fragment_index = cursor
            .read_u16::<BigEndian>()
            .map_err(|_| truncated(25, bytes.len()))?;
        let fragment_count = cursor
            .read_u16::<BigEndian>()
            .map_err(|_| truncated(27, bytes.len()))?;
        let encoder_count = cursor.read_u8().map_err(|_| truncated(28, bytes.len()))? as usize;
        let encoder_count = encoder_count.min(MAX_ENCODER_CHANNELS);

        let mut encoder_values = Vec::with_capacity(encoder_count);
        for _ in 0..encoder_count {
            let needed = cursor.position() as usize + 8;
            encoder_values.push(
                cursor
                    .read_i64::<BigEndian>()
                    .map_err(|_| truncated(needed, bytes.len()))?,
            );
        }

        let needed = cursor.position() as usize + 4;
        let payload_len = cursor
            .read_u32::<BigEndian>()
            .map_err(|_| truncated(needed, bytes.len()))?;

        let header = ProfilePacketHeader {
            head_serial,
            camera,
            laser,
            sequence,
            timestamp_ns,
            data_types,
            flags,
            fragment_index,
            fragment_count,
            encoder_values,
            payload_len,
        };
        Ok((header, cursor.position() as usize))
    }
}

fn truncated(needed: usize, got: usize) -> WireError {
    WireError::Truncated { needed, got }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_header() -> ProfilePacketHeader {
        ProfilePacketHeader {
            head_serial: 1001,
            camera: 0,
            laser: 1,
            sequence: 42,
            timestamp_ns: 123_456_789,
            data_types: DataType::XY | DataType::BRIGHTNESS,
            flags: PacketFlags::empty(),
            fragment_index: 0,
            fragment_count: 1,
            encoder_values: vec![1_000_000, -42],
            payload_len: 64,
        }
    }

    #[test]
    fn encode_then_decode_round_trips_bit_for_bit() {
        let header = sample_header();
        let mut buf = Vec::new();
        header.encode(&mut buf).unwrap();
        assert_eq!(buf.len(), header.encoded_len());

        let (decoded, consumed) = ProfilePacketHeader::decode(&buf).unwrap();
        assert_eq!(consumed, buf.len());
        assert_eq!(decoded, header);
    }

    #[test]
    fn rejects_wrong_magic_byte() {
        let mut buf = Vec::new();
        sample_header().encode(&mut buf).unwrap();
        buf[0] = 0x00;
        assert!(matches!(
            ProfilePacketHeader::decode(&buf),
            Err(WireError::NotAProfilePacket(0x00))
        ));
    }

    #[test]
    fn rejects_truncated_packet() {
        let mut buf = Vec::new();
        sample_header().encode(&mut buf).unwrap();
        buf.truncate(10);
        assert!(matches!(
            ProfilePacketHeader::decode(&buf),
            Err(WireError::Truncated { .. })
        ));
    }
}
