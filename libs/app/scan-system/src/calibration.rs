use async_trait::async_trait;

use crate::error::ScanSystemError;

/// Seam to the calibration REST side-channel (§6): a head's calibration
/// record is consumed as an opaque JSON blob and handed to whatever
/// geometry collaborator the caller wires up downstream. This crate does
/// not parse or interpret it.
#[async_trait]
pub trait CalibrationSource: Send + Sync {
    async fn get_calibration(&self, head_id: u32) -> Result<serde_json::Value, ScanSystemError>;
}

/// Default source for callers that have not wired up the REST endpoint:
/// every lookup fails, matching "calibration is optional input, not a
/// hard dependency of connecting or scanning" (§6).
pub struct NoCalibrationSource;

#[async_trait]
impl CalibrationSource for NoCalibrationSource {
    async fn get_calibration(&self, head_id: u32) -> Result<serde_json::Value, ScanSystemError> {
        Err(ScanSystemError::Calibration {
            head_id,
            reason: "no calibration source configured".into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn no_calibration_source_always_errors() {
        let source = NoCalibrationSource;
        assert!(source.get_calibration(1).await.is_err());
    }
}
