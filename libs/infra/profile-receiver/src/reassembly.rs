use std::time::Instant;

use pinchot_model::Profile;
use pinchot_wire::{decode_points, ProfilePacketHeader, WireError};

/// In-flight reassembly state for one (camera, laser, sequence) profile.
/// Fragments are stored by index rather than concatenated eagerly so
/// out-of-order arrival (required by §6) never needs to shift already-
/// received bytes around.
pub struct ReassemblySlot {
    header: ProfilePacketHeader,
    fragments: Vec<Option<Vec<u8>>>,
    received: usize,
    first_seen: Instant,
}

impl ReassemblySlot {
    pub fn new(header: ProfilePacketHeader, now: Instant) -> Self {
        let fragment_count = header.fragment_count as usize;
        Self {
            fragments: vec![None; fragment_count.max(1)],
            header,
            received: 0,
            first_seen: now,
        }
    }

    pub fn age(&self, now: Instant) -> std::time::Duration {
        now.saturating_duration_since(self.first_seen)
    }

    /// Stores one fragment's payload. Returns `true` if this insertion
    /// completed the slot (all fragments now present). A duplicate
    /// fragment index is simply overwritten, matching "tolerate
    /// out-of-order arrival" without special-casing retransmission.
    pub fn insert_fragment(&mut self, fragment_index: u16, payload: &[u8]) -> bool {
        let index = fragment_index as usize;
        if index >= self.fragments.len() {
            return false;
        }
        if self.fragments[index].is_none() {
            self.received += 1;
        }
        self.fragments[index] = Some(payload.to_vec());
        self.is_complete()
    }

    pub fn is_complete(&self) -> bool {
        self.received == self.fragments.len()
    }

    /// Concatenates fragments in index order and decodes the resulting
    /// payload into a `Profile`. Only valid once `is_complete()` is true.
    pub fn decode(self) -> Result<Profile, WireError> {
        let mut payload = Vec::new();
        for fragment in &self.fragments {
            payload.extend_from_slice(
                fragment
                    .as_deref()
                    .expect("decode called before slot was complete"),
            );
        }

        let stride = self.header.data_types.point_stride_bytes();
        let point_count = if stride == 0 { 0 } else { payload.len() / stride };
        let points = decode_points(self.header.data_types, &payload, point_count)?;

        Ok(Profile {
            head_id: self.header.head_serial,
            camera: self.header.camera,
            laser: self.header.laser,
            encoder_values: self.header.encoder_values.clone(),
            timestamp_ns: self.header.timestamp_ns,
            sequence: self.header.sequence,
            flags: self.header.flags,
            data_types: self.header.data_types,
            points,
            raw_camera_points: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pinchot_model::{DataType, PacketFlags};

    fn header(fragment_count: u16) -> ProfilePacketHeader {
        ProfilePacketHeader {
            head_serial: 1,
            camera: 0,
            laser: 0,
            sequence: 7,
            timestamp_ns: 0,
            data_types: DataType::XY,
            flags: PacketFlags::empty(),
            fragment_index: 0,
            fragment_count,
            encoder_values: vec![],
            payload_len: 0,
        }
    }

    #[test]
    fn completes_only_once_every_fragment_index_has_arrived() {
        let mut slot = ReassemblySlot::new(header(2), Instant::now());
        assert!(!slot.insert_fragment(1, &[5, 6, 7, 8]));
        assert!(!slot.is_complete());
        assert!(slot.insert_fragment(0, &[1, 2, 3, 4]));
        assert!(slot.is_complete());
    }

    #[test]
    fn decode_concatenates_fragments_in_index_order_regardless_of_arrival_order() {
        let mut slot = ReassemblySlot::new(header(2), Instant::now());
        slot.insert_fragment(1, &(-5i16).to_be_bytes().iter().chain(&0i16.to_be_bytes()).copied().collect::<Vec<u8>>());
        slot.insert_fragment(0, &10i16.to_be_bytes().iter().chain(&20i16.to_be_bytes()).copied().collect::<Vec<u8>>());

        let profile = slot.decode().unwrap();
        assert_eq!(profile.points.len(), 2);
        assert_eq!(profile.points[0].x, 10.0);
        assert_eq!(profile.points[0].y, 20.0);
        assert_eq!(profile.points[1].x, -5.0);
        assert_eq!(profile.points[1].y, 0.0);
    }
}
