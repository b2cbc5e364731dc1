use pinchot_model::PhaseElement;

/// Supplies the per-element timing facts the scheduler needs, and whether a
/// referenced head is currently connected. Implemented by the scan-head
/// layer (which owns connection state and configuration); kept as a trait
/// here so this crate has no dependency on sockets or state machines.
pub trait ElementTiming {
    fn is_head_connected(&self, head_id: u32) -> bool;

    /// Lower bound, in microseconds, for firing this element: laser-on
    /// time + camera readout + window row cost. `None` if the element's
    /// head is unknown to the implementor.
    fn element_lower_bound_us(&self, element: &PhaseElement) -> Option<u32>;
}
