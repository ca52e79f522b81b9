//! Shared timing constants

use std::time::Duration;

/// Poll loop cadence
pub mod polling {
    use super::Duration;

    /// Default interval between two ticks of the poll loop
    pub const STANDARD: Duration = Duration::from_secs(1);

    /// Fast cadence for short-lived commands
    pub const FAST: Duration = Duration::from_millis(50);
}

/// Shutdown escalation
pub mod shutdown {
    use super::Duration;

    /// Default time between the graceful signal and the forced kill
    pub const GRACE: Duration = Duration::from_secs(30);
}
