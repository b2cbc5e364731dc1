use crate::profile::Profile;

/// One profile per phased element for a given scan cycle sequence number.
/// Slots follow the fixed order of the active phase table; a `None` slot
/// means that element's queue could not supply a profile for this
/// sequence (see the frame assembler's fill algorithm).
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub sequence: u32,
    slots: Vec<Option<Profile>>,
    is_complete: bool,
}

impl Frame {
    pub fn new(sequence: u32, slots: Vec<Option<Profile>>) -> Self {
        let is_complete = !slots.is_empty() && slots.iter().all(Option::is_some);
        Self {
            sequence,
            slots,
            is_complete,
        }
    }

    pub fn count(&self) -> usize {
        self.slots.len()
    }

    pub fn is_complete(&self) -> bool {
        self.is_complete
    }

    pub fn slot(&self, index: usize) -> Option<&Profile> {
        self.slots.get(index).and_then(|slot| slot.as_ref())
    }

    pub fn slots(&self) -> &[Option<Profile>] {
        &self.slots
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::{DataType, PacketFlags};

    fn sample_profile(sequence: u32) -> Profile {
        Profile {
            head_id: 1,
            camera: 0,
            laser: 0,
            encoder_values: vec![0],
            timestamp_ns: 0,
            sequence,
            flags: PacketFlags::empty(),
            data_types: DataType::XY,
            points: Vec::new(),
            raw_camera_points: None,
        }
    }

    #[test]
    fn frame_is_complete_only_when_every_slot_is_filled() {
        let frame = Frame::new(5, vec![Some(sample_profile(5)), Some(sample_profile(5))]);
        assert!(frame.is_complete());

        let partial = Frame::new(5, vec![Some(sample_profile(5)), None]);
        assert!(!partial.is_complete());
    }

    #[test]
    fn count_matches_slot_array_length_regardless_of_completeness() {
        let frame = Frame::new(1, vec![None, None, Some(sample_profile(1))]);
        assert_eq!(frame.count(), 3);
    }
}
