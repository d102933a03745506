//! Value objects for the reservation domain.

use serde::{Deserialize, Serialize};

/// Free-form JSON object carried through the core verbatim.
///
/// Used for price elements, guest data and additional requests. The core
/// persists and returns these maps but never reads their contents.
pub type Attributes = serde_json::Map<String, serde_json::Value>;

/// A price in whole cents.
///
/// Stored and compared as an integer. Converted to a decimal amount only at
/// the payment service boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Money {
    cents: i64,
}

impl Money {
    pub fn from_cents(cents: i64) -> Self {
        Self { cents }
    }

    pub fn zero() -> Self {
        Self { cents: 0 }
    }

    pub fn cents(&self) -> i64 {
        self.cents
    }

    /// The amount in currency units, e.g. `500.25` for 50025 cents.
    pub fn as_decimal(&self) -> f64 {
        self.cents as f64 / 100.0
    }

    /// Refunds and credits are not prices; validation rejects them.
    pub fn is_negative(&self) -> bool {
        self.cents < 0
    }
}

impl Default for Money {
    fn default() -> Self {
        Self::zero()
    }
}
