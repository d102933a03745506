use std::time::Duration;

/// Deadlines applied to every outbound call of the lifecycle service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Deadline for each store call.
    pub store: Duration,
    /// Deadline for the payment gateway round trip.
    pub gateway: Duration,
}

impl Timeouts {
    pub const DEFAULT_STORE: Duration = Duration::from_secs(5);
    pub const DEFAULT_GATEWAY: Duration = Duration::from_secs(10);

    pub fn new(store: Duration, gateway: Duration) -> Self {
        Self { store, gateway }
    }
}

impl Default for Timeouts {
    fn default() -> Self {
        Self::new(Self::DEFAULT_STORE, Self::DEFAULT_GATEWAY)
    }
}
