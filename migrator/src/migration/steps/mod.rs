pub mod devices;
pub mod network;

/// Result of one idempotent step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// The step was performed now
    Applied,
    /// A state check showed the vendor already has the desired state
    AlreadyDone,
}
