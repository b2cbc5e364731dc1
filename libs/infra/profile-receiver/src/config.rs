use std::time::Duration;

/// Tunables for one receiver instance. Defaults match §4.4/§6.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiverConfig {
    /// How far behind the per-element cursor a sequence may be before its
    /// fragments are dropped outright rather than reassembled.
    pub late_drop_window: u32,
    /// How long an incomplete reassembly slot is kept before it is evicted
    /// and counted as an incomplete-drop.
    pub assembly_timeout: Duration,
    /// How often the receiver sweeps for timed-out reassembly slots.
    pub sweep_interval: Duration,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            late_drop_window: 64,
            assembly_timeout: Duration::from_millis(250),
            sweep_interval: Duration::from_millis(50),
        }
    }
}
