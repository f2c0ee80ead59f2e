//! Capability shared by every component whose activity is driven by a
//! self-rescheduling tick event, rather than a virtual method dispatched
//! through an owning pointer.

pub trait TickingComponent {
    fn name(&self) -> &str;

    /// Cycle length in scheduler time units.
    fn period(&self) -> u64;

    /// Advance the component by one tick. Must only mutate ports this
    /// component owns and its own internal state.
    fn tick(&mut self, now: u64);

    /// Clear all internal state (pipeline slots, counters) without
    /// detaching ports or connections.
    fn reset(&mut self);
}
