//! Control flow signals

/* ===================== Control Flow ===================== */

/// Control flow state returned by every executed statement.
///
/// When a statement returns anything other than `None`, the enclosing
/// statement lists stop and hand the signal outwards until a loop (for
/// `Leave` and `Continue`) or the iteration driver (for the rest) handles it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    None,
    /// Exit the nearest enclosing loop
    Leave,
    /// Jump to the nearest enclosing loop's re-test or increment
    Continue,
    /// End the iteration without implicit output (DELETE, false subsetting IF)
    Delete,
    /// End the iteration; implicit output still applies
    Return,
    /// End the step after this iteration, without its implicit output
    Stop,
}

impl Control {
    /// Whether this signal ends the current iteration
    pub fn ends_iteration(self) -> bool {
        matches!(self, Control::Delete | Control::Return | Control::Stop)
    }
}
