use pinchot_model::{DataType, ProfilePoint};

use crate::error::WireError;
use crate::header::ProfilePacketHeader;

/// One fragment's payload bytes, borrowed from the datagram buffer that
/// produced it. The receiver copies these into a reassembly slot; this
/// type exists purely to make that copy step's intent explicit at call
/// sites.
pub struct FragmentPayload<'a> {
    pub bytes: &'a [u8],
}

/// Decodes a profile packet fragment: header plus the payload bytes that
/// follow it in the same datagram. Validates that the header's declared
/// `payload_len` matches what's actually present.
pub fn decode_profile_fragment(
    bytes: &[u8],
) -> Result<(ProfilePacketHeader, FragmentPayload<'_>), WireError> {
    let (header, consumed) = ProfilePacketHeader::decode(bytes)?;
    let payload = &bytes[consumed..];
    if payload.len() != header.payload_len as usize {
        return Err(WireError::PayloadLengthMismatch {
            declared: header.payload_len as usize,
            actual: payload.len(),
        });
    }
    Ok((header, FragmentPayload { bytes: payload }))
}

/// Encodes a header and its payload into one datagram's worth of bytes.
/// `header.payload_len` is overwritten to match `payload.len()` so callers
/// cannot accidentally desynchronise the two.
pub fn encode_profile_fragment(mut header: ProfilePacketHeader, payload: &[u8]) -> Vec<u8> {
    header.payload_len = payload.len() as u32;
    let mut out = Vec::with_capacity(header.encoded_len() + payload.len());
    header
        .encode(&mut out)
        .expect("encoding into an in-memory Vec cannot fail");
    out.extend_from_slice(payload);
    out
}

/// Channels are laid out in this fixed order within each point's stride,
/// matching `DataType`'s declared bit order low-to-high.
const CHANNEL_ORDER: [DataType; 6] = [
    DataType::BRIGHTNESS,
    DataType::XY,
    DataType::PEAK_WIDTH,
    DataType::VARIANCE,
    DataType::SUBPIXEL,
    DataType::IMAGE,
];

/// Decodes a fully reassembled payload (all fragments concatenated in
/// fragment-index order) into `point_count` points, according to the
/// channels declared in `data_types`.
pub fn decode_points(
    data_types: DataType,
    payload: &[u8],
    point_count: usize,
) -> Result<Vec<ProfilePoint>, WireError> {
    let stride = data_types.point_stride_bytes();
    let expected_len = stride * point_count;
    if payload.len() != expected_len {
        return Err(WireError::PayloadLengthMismatch {
            declared: expected_len,
            actual: payload.len(),
        });
    }

    let mut points = Vec::with_capacity(point_count);
    let mut offset = 0usize;
    for _ in 0..point_count {
        let mut point = ProfilePoint::default();
        for channel in CHANNEL_ORDER {
            if !data_types.contains(channel) {
                continue;
            }
            let width = channel.channel_width_bytes();
            let bytes = &payload[offset..offset + width];
            match channel {
                DataType::BRIGHTNESS => point.brightness = bytes[0],
                DataType::XY => {
                    point.x = i16::from_be_bytes([bytes[0], bytes[1]]) as f64;
                    point.y = i16::from_be_bytes([bytes[2], bytes[3]]) as f64;
                }
                DataType::PEAK_WIDTH => point.peak_width = u16::from_be_bytes([bytes[0], bytes[1]]),
                DataType::VARIANCE => point.variance = u16::from_be_bytes([bytes[0], bytes[1]]),
                DataType::SUBPIXEL => point.subpixel = u16::from_be_bytes([bytes[0], bytes[1]]),
                DataType::IMAGE => point.image = bytes[0],
                _ => unreachable!("CHANNEL_ORDER only lists single-bit DataType values"),
            }
            offset += width;
        }
        points.push(point);
    }
    Ok(points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pinchot_model::PacketFlags;

    fn header(payload_len: u32) -> ProfilePacketHeader {
        ProfilePacketHeader {
            head_serial: 1,
            camera: 0,
            laser: 0,
            sequence: 0,
            timestamp_ns: 0,
            data_types: DataType::XY,
            flags: PacketFlags::empty(),
            fragment_index: 0,
            fragment_count: 1,
            encoder_values: vec![],
            payload_len,
        }
    }

    #[test]
    fn fragment_round_trips() {
        let payload = vec![1, 2, 3, 4];
        let encoded = encode_profile_fragment(header(0), &payload);
        let (decoded_header, decoded_payload) = decode_profile_fragment(&encoded).unwrap();
        assert_eq!(decoded_header.payload_len as usize, payload.len());
        assert_eq!(decoded_payload.bytes, &payload[..]);
    }

    #[test]
    fn mismatched_payload_length_is_rejected() {
        let mut encoded = encode_profile_fragment(header(0), &[1, 2, 3, 4]);
        encoded.extend_from_slice(&[9, 9]); // trailing garbage not accounted for in payload_len
        assert!(matches!(
            decode_profile_fragment(&encoded),
            Err(WireError::PayloadLengthMismatch { .. })
        ));
    }

    #[test]
    fn decode_points_reads_xy_and_brightness_channels() {
        let data_types = DataType::XY | DataType::BRIGHTNESS;
        // one point: brightness=200, x=10, y=-5; channels are laid out in
        // `CHANNEL_ORDER` (brightness before XY), not declaration order.
        let mut payload = Vec::new();
        payload.push(200);
        payload.extend_from_slice(&10i16.to_be_bytes());
        payload.extend_from_slice(&(-5i16).to_be_bytes());

        let points = decode_points(data_types, &payload, 1).unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].x, 10.0);
        assert_eq!(points[0].y, -5.0);
        assert_eq!(points[0].brightness, 200);
    }
}
