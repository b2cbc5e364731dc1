use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Which payload channels a profile packet carries. Fixed per-channel
    /// widths (bytes per point): Brightness=1, Image=1, Subpixel=2,
    /// PeakWidth=2, Variance=2, XY=4.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct DataType: u16 {
        const BRIGHTNESS = 0b0000_0001;
        const XY         = 0b0000_0010;
        const PEAK_WIDTH = 0b0000_0100;
        const VARIANCE   = 0b0000_1000;
        const SUBPIXEL   = 0b0001_0000;
        const IMAGE      = 0b0010_0000;
    }
}

impl DataType {
    /// Per-point byte width for one declared channel. Callers sum this over
    /// `iter()` to compute a packet's expected payload stride.
    pub fn channel_width_bytes(self) -> usize {
        match self {
            DataType::BRIGHTNESS => 1,
            DataType::XY => 4,
            DataType::PEAK_WIDTH => 2,
            DataType::VARIANCE => 2,
            DataType::SUBPIXEL => 2,
            DataType::IMAGE => 1,
            _ => 0,
        }
    }

    /// Total bytes one point occupies given the full declared channel set.
    pub fn point_stride_bytes(self) -> usize {
        self.iter().map(DataType::channel_width_bytes).sum()
    }
}

bitflags! {
    /// Forward-compatible packet-level flags. The spec names "packet flags"
    /// as a Profile attribute without enumerating bits; only the one bit
    /// consumed elsewhere in this crate (fragment-incomplete, set by the
    /// receiver when an assembly timeout truncates a profile) is named.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct PacketFlags: u16 {
        const FRAGMENT_INCOMPLETE = 0b0000_0001;
    }
}

/// One (camera, laser) measurement for one scan cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub head_id: u32,
    pub camera: u8,
    pub laser: u8,
    pub encoder_values: Vec<i64>,
    pub timestamp_ns: u64,
    pub sequence: u32,
    pub flags: PacketFlags,
    pub data_types: DataType,
    pub points: Vec<ProfilePoint>,
    /// Raw camera-space coordinates, present only when the head was
    /// configured to include them; conversion to world units is a
    /// geometry-helper concern (out of scope).
    pub raw_camera_points: Option<Vec<(i32, i32)>>,
}

/// A single laser-line sample. Fields absent from the profile's declared
/// `DataType` set are left at their default (0) rather than modelled as
/// `Option`, since which fields are meaningful is already carried by
/// `data_types` and per-point `Option`s would just double-encode that.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfilePoint {
    pub x: f64,
    pub y: f64,
    pub brightness: u8,
    pub peak_width: u16,
    pub variance: u16,
    pub subpixel: u16,
    pub image: u8,
}

impl Profile {
    /// True once every fragment indicated by the wire header has been
    /// received; a profile the receiver handed to a queue is always
    /// complete (partial profiles are dropped, not enqueued), but this
    /// flag is retained as a defensive record of why.
    pub fn is_complete(&self) -> bool {
        !self.flags.contains(PacketFlags::FRAGMENT_INCOMPLETE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_stride_sums_declared_channels() {
        let data_types = DataType::XY | DataType::BRIGHTNESS;
        assert_eq!(data_types.point_stride_bytes(), 4 + 1);
    }

    #[test]
    fn empty_data_types_have_zero_stride() {
        assert_eq!(DataType::empty().point_stride_bytes(), 0);
    }
}
