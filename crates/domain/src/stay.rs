//! Stay periods and the overlap rule used for double-booking detection.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Half-open interval `[check_in, check_out)` a reservation occupies.
///
/// The check-out instant is exclusive, so a stay ending at 11:00 never
/// conflicts with one starting at 11:00 the same day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StayPeriod {
    pub check_in: DateTime<Utc>,
    pub check_out: DateTime<Utc>,
}

impl StayPeriod {
    /// Shortest stay accepted at validation.
    pub fn minimum_stay() -> Duration {
        Duration::days(1)
    }

    pub fn new(check_in: DateTime<Utc>, check_out: DateTime<Utc>) -> Self {
        Self {
            check_in,
            check_out,
        }
    }

    /// Length of the stay. Negative when the period is inverted.
    pub fn duration(&self) -> Duration {
        self.check_out - self.check_in
    }

    /// Returns true when the two periods share at least one instant.
    pub fn overlaps(&self, other: &StayPeriod) -> bool {
        self.check_in < other.check_out && other.check_in < self.check_out
    }
}
