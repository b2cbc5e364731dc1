use crate::error::ScanHeadError;

/// Lifecycle state of one scan head, as seen by the owning client.
///
/// `Scanning` and `IdleScanning` are both entered via `StartScanning` and
/// both accept `StopScanning`; `IdleScanning` additionally distinguishes a
/// head that has stopped producing profiles (e.g. laser disabled upstream)
/// without the client having called `StopScanning`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanHeadState {
    Disconnected,
    Connected,
    Scanning,
    IdleScanning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    CreateScanHead,
    Configure,
    SetWindow,
    SetAlignment,
    SetOrientation,
    Dispose,
    RequestStatus,
    ApplyConfiguration,
    StartScanning,
    Disconnect,
    StopScanning,
    TryTakeNextProfile,
    TryTakeFrame,
    MarkIdle,
    MarkActive,
}

impl ScanHeadState {
    /// Checks whether `op` is legal in this state, per the state table in
    /// §4.8: each state enumerates the operations it accepts; everything
    /// else is `InvalidState`.
    pub fn check(&self, op: Operation) -> Result<(), ScanHeadError> {
        use Operation::*;
        use ScanHeadState::*;

        let allowed = match (self, op) {
            (Disconnected, CreateScanHead | Configure | SetWindow | SetAlignment | SetOrientation | Dispose) => true,
            (Connected, RequestStatus | ApplyConfiguration | SetWindow | StartScanning | Disconnect) => true,
            (Scanning | IdleScanning, StopScanning | TryTakeNextProfile | TryTakeFrame | RequestStatus | Disconnect) => true,
            (Scanning, MarkIdle) => true,
            (IdleScanning, MarkActive) => true,
            _ => false,
        };

        if allowed {
            Ok(())
        } else {
            Err(ScanHeadError::InvalidState { current: *self })
        }
    }

    pub fn is_scanning(&self) -> bool {
        matches!(self, ScanHeadState::Scanning | ScanHeadState::IdleScanning)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disconnected_accepts_configure_but_not_start_scanning() {
        assert!(ScanHeadState::Disconnected.check(Operation::Configure).is_ok());
        assert!(matches!(
            ScanHeadState::Disconnected.check(Operation::StartScanning),
            Err(ScanHeadError::InvalidState { current: ScanHeadState::Disconnected })
        ));
    }

    #[test]
    fn scanning_accepts_stop_and_take_but_not_configure() {
        assert!(ScanHeadState::Scanning.check(Operation::StopScanning).is_ok());
        assert!(ScanHeadState::Scanning.check(Operation::TryTakeNextProfile).is_ok());
        assert!(matches!(
            ScanHeadState::Scanning.check(Operation::Configure),
            Err(ScanHeadError::InvalidState { .. })
        ));
    }

    #[test]
    fn connected_accepts_start_scanning_and_disconnect() {
        assert!(ScanHeadState::Connected.check(Operation::StartScanning).is_ok());
        assert!(ScanHeadState::Connected.check(Operation::Disconnect).is_ok());
    }
}
