use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use serde::{Deserialize, Serialize};
use std::io::Cursor;

use pinchot_model::{DataType, DirtyFlags, EncoderFlags, ScanHeadConfiguration};

use crate::error::WireError;

/// Control frames are length-prefixed: a u32 body length followed by a u8
/// message-kind tag and a JSON body. This stands in for the bit-exact
/// schema-tagged transport named as an out-of-scope external collaborator
/// in the spec; it plays the same request/response role.
pub const MAX_CONTROL_FRAME_BYTES: usize = 1024 * 1024;

/// Scan mode negotiated by `StartScanning`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanMode {
    Profile,
    Frame,
}

/// Which diagnostic image a head should return for `GetDiagnosticImage`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiagnosticImageKind {
    Raw,
    Processed,
}

/// Bounds a head actually supports, as distinct from the configuration a
/// caller wants to apply; `ApplyConfiguration` is validated against these
/// by the scan-head layer before upload.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScanHeadCapabilities {
    pub camera_count: u8,
    pub laser_count: u8,
    pub max_laser_on_us: u32,
    pub max_camera_exposure_us: u32,
    pub max_fragment_payload_bytes: u16,
}

/// Returned by `GetStatus`; carries the per-head counters the spec requires
/// to be exposed here rather than silently dropped (§7).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScanHeadStatus {
    pub global_time_ns: u64,
    pub encoder_flags: EncoderFlags,
    pub is_scanning: bool,
    pub late_drop_count: u64,
    pub incomplete_drop_count: u64,
    pub profiles_sent_count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ControlRequest {
    GetStatus,
    GetCapabilities,
    ApplyConfiguration {
        snapshot: ScanHeadConfiguration,
        dirty_mask: DirtyFlags,
    },
    SetWindow {
        /// Serialized `ScanWindow`; kept as an opaque JSON value here so
        /// this crate does not need to depend on `pinchot-model`'s window
        /// module beyond what `serde_json::Value` already captures.
        window: serde_json::Value,
    },
    SetExclusionMask {
        mask: Vec<u8>,
    },
    SetBrightnessCorrection {
        correction: Vec<u8>,
    },
    StartScanning {
        period_us: u32,
        data_format: DataType,
        mode: ScanMode,
    },
    StopScanning,
    GetDiagnosticImage {
        camera: u8,
        kind: DiagnosticImageKind,
    },
    KeepAlive,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ControlResponse {
    Status(ScanHeadStatus),
    Capabilities(ScanHeadCapabilities),
    DiagnosticImage(Vec<u8>),
    Ack,
    Rejected { reason: String },
}

fn tag_of_request(request: &ControlRequest) -> u8 {
    match request {
        ControlRequest::GetStatus => 0,
        ControlRequest::GetCapabilities => 1,
        ControlRequest::ApplyConfiguration { .. } => 2,
        ControlRequest::SetWindow { .. } => 3,
        ControlRequest::SetExclusionMask { .. } => 4,
        ControlRequest::SetBrightnessCorrection { .. } => 5,
        ControlRequest::StartScanning { .. } => 6,
        ControlRequest::StopScanning => 7,
        ControlRequest::GetDiagnosticImage { .. } => 8,
        ControlRequest::KeepAlive => 9,
    }
}

/// Encodes a length-prefixed control frame: `[u32 body_len][u8 tag][json]`.
pub fn encode_control_request(request: &ControlRequest) -> Vec<u8> {
    let tag = tag_of_request(request);
    let body = serde_json::to_vec(request).expect("ControlRequest always serializes");
    let mut out = Vec::with_capacity(5 + body.len());
    out.write_u32::<BigEndian>((body.len() + 1) as u32).unwrap();
    out.write_u8(tag).unwrap();
    out.extend_from_slice(&body);
    out
}

pub fn decode_control_request(bytes: &[u8]) -> Result<ControlRequest, WireError> {
    let mut cursor = Cursor::new(bytes);
    let declared_len = cursor
        .read_u32::<BigEndian>()
        .map_err(|_| WireError::Truncated {
            needed: 4,
            got: bytes.len(),
        })? as usize;
    if declared_len > MAX_CONTROL_FRAME_BYTES {
        return Err(WireError::ControlFrameTooLarge {
            declared: declared_len,
            max: MAX_CONTROL_FRAME_BYTES,
        });
    }
    let body_start = cursor.position() as usize;
    let available = bytes.len().saturating_sub(body_start);
    if available < declared_len {
        return Err(WireError::Truncated {
            needed: declared_len,
            got: available,
        });
    }
    let _tag = cursor.read_u8().map_err(|_| WireError::Truncated {
        needed: body_start + 1,
        got: bytes.len(),
    })?;
    let json_start = cursor.position() as usize;
    let json_end = body_start + declared_len;
    let request = serde_json::from_slice(&bytes[json_start..json_end])?;
    Ok(request)
}

pub fn encode_control_response(response: &ControlResponse) -> Vec<u8> {
    let body = serde_json::to_vec(response).expect("ControlResponse always serializes");
    let mut out = Vec::with_capacity(4 + body.len());
    out.write_u32::<BigEndian>(body.len() as u32).unwrap();
    out.extend_from_slice(&body);
    out
}

pub fn decode_control_response(bytes: &[u8]) -> Result<ControlResponse, WireError> {
    let mut cursor = Cursor::new(bytes);
    let declared_len = cursor
        .read_u32::<BigEndian>()
        .map_err(|_| WireError::Truncated {
            needed: 4,
            got: bytes.len(),
        })? as usize;
    if declared_len > MAX_CONTROL_FRAME_BYTES {
        return Err(WireError::ControlFrameTooLarge {
            declared: declared_len,
            max: MAX_CONTROL_FRAME_BYTES,
        });
    }
    let body_start = cursor.position() as usize;
    if bytes.len() - body_start < declared_len {
        return Err(WireError::Truncated {
            needed: declared_len,
            got: bytes.len() - body_start,
        });
    }
    let response = serde_json::from_slice(&bytes[body_start..body_start + declared_len])?;
    Ok(response)
}
