//! Decode of fixed-layout profile packets and framed control messages;
//! encode of client-to-head commands.
//!
//! The bit-exact flatbuffer-style schemas the real head firmware speaks are
//! a named external collaborator and out of scope here (see the top-level
//! spec). This crate implements an equivalent fixed-layout profile header
//! (matching the field list and per-channel widths the spec specifies
//! exactly) and a length-prefixed, tag-discriminated control frame that
//! plays the same request/response role without claiming bit-for-bit
//! parity with the real schema.

pub mod control;
pub mod error;
pub mod header;
pub mod profile_codec;

pub use control::{
    decode_control_request, decode_control_response, encode_control_request,
    encode_control_response, ControlRequest, ControlResponse, DiagnosticImageKind, ScanHeadCapabilities,
    ScanHeadStatus, ScanMode, MAX_CONTROL_FRAME_BYTES,
};
pub use error::WireError;
pub use header::{ProfilePacketHeader, MAX_ENCODER_CHANNELS, PROFILE_MAGIC};
pub use profile_codec::{decode_points, decode_profile_fragment, encode_profile_fragment, FragmentPayload};
