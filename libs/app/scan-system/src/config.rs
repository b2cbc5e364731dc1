use pinchot_model::Units;

/// System-wide settings decided once, at construction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SystemConfig {
    /// Display/geometry units every head's points are reported in.
    pub units: Units,
    /// Total profile-queue capacity for one scan cycle, divided evenly
    /// across every active element when `start_scanning` allocates queues.
    pub total_queue_capacity: usize,
    /// Fixed per-phase-transition cost fed to `min_scan_period_us`.
    pub inter_phase_overhead_us: u32,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            units: Units::Millimetres,
            total_queue_capacity: 1_000,
            inter_phase_overhead_us: 50,
        }
    }
}
