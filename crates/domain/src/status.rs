//! Reservation status state machine.

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// The status of a reservation in its lifecycle.
///
/// State transitions:
/// ```text
/// Pending ──► PaymentRequired ──► Confirmed ──► CheckedIn ──► CheckedOut ──► Completed
///    │  │            │                │              │
///    │  └────────────┴──► Confirmed   │              │
///    ├──► Rejected                    │              │
///    └────────────────────────────────┴──────────────┴──► Cancelled
/// ```
///
/// `Pending` may jump straight to `Confirmed`; every non-terminal status
/// before `CheckedOut` may be cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    /// Reservation stored, payment not yet initiated.
    #[default]
    Pending,

    /// Payment initiated, waiting for the payment outcome.
    PaymentRequired,

    /// Payment received or reservation confirmed manually.
    Confirmed,

    /// Guest has arrived.
    CheckedIn,

    /// Guest has left.
    CheckedOut,

    /// Stay settled (terminal state).
    Completed,

    /// Cancelled by guest or operator (terminal state).
    Cancelled,

    /// Declined before confirmation (terminal state).
    Rejected,
}

impl ReservationStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [ReservationStatus; 8] = [
        ReservationStatus::Pending,
        ReservationStatus::PaymentRequired,
        ReservationStatus::Confirmed,
        ReservationStatus::CheckedIn,
        ReservationStatus::CheckedOut,
        ReservationStatus::Completed,
        ReservationStatus::Cancelled,
        ReservationStatus::Rejected,
    ];

    /// Returns the statuses reachable from this one in a single step.
    pub fn allowed_transitions(&self) -> &'static [ReservationStatus] {
        use ReservationStatus::*;
        match self {
            Pending => &[PaymentRequired, Confirmed, Cancelled, Rejected],
            PaymentRequired => &[Confirmed, Cancelled],
            Confirmed => &[CheckedIn, Cancelled],
            CheckedIn => &[CheckedOut, Cancelled],
            CheckedOut => &[Completed],
            Completed | Cancelled | Rejected => &[],
        }
    }

    /// Returns true if moving to `next` is permitted.
    ///
    /// Moving to the current status is always permitted.
    pub fn can_transition_to(&self, next: ReservationStatus) -> bool {
        *self == next || self.allowed_transitions().contains(&next)
    }

    /// Validates a transition, returning the status to store.
    pub fn transition_to(&self, next: ReservationStatus) -> Result<ReservationStatus, DomainError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(DomainError::InvalidTransition {
                from: *self,
                to: next,
            })
        }
    }

    /// Returns true if this is a terminal status (no further transitions possible).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ReservationStatus::Completed | ReservationStatus::Cancelled | ReservationStatus::Rejected
        )
    }

    /// Returns true if a reservation in this status still occupies its dates.
    pub fn blocks_availability(&self) -> bool {
        !matches!(
            self,
            ReservationStatus::Cancelled | ReservationStatus::Rejected
        )
    }

    /// Returns the status name as stored and sent over the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Pending => "pending",
            ReservationStatus::PaymentRequired => "payment_required",
            ReservationStatus::Confirmed => "confirmed",
            ReservationStatus::CheckedIn => "checked_in",
            ReservationStatus::CheckedOut => "checked_out",
            ReservationStatus::Completed => "completed",
            ReservationStatus::Cancelled => "cancelled",
            ReservationStatus::Rejected => "rejected",
        }
    }
}

impl std::fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ReservationStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ReservationStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| DomainError::InvalidStatusValue(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ReservationStatus::*;

    const TABLE: &[(ReservationStatus, ReservationStatus)] = &[
        (Pending, PaymentRequired),
        (Pending, Confirmed),
        (Pending, Cancelled),
        (Pending, Rejected),
        (PaymentRequired, Confirmed),
        (PaymentRequired, Cancelled),
        (Confirmed, CheckedIn),
        (Confirmed, Cancelled),
        (CheckedIn, CheckedOut),
        (CheckedIn, Cancelled),
        (CheckedOut, Completed),
    ];

    #[test]
    fn test_default_status_is_pending() {
        assert_eq!(ReservationStatus::default(), Pending);
    }

    #[test]
    fn test_transition_table_is_exhaustive() {
        for from in ReservationStatus::ALL {
            for to in ReservationStatus::ALL {
                let expected = from == to || TABLE.contains(&(from, to));
                assert_eq!(
                    from.can_transition_to(to),
                    expected,
                    "{from} -> {to} should be {expected}"
                );
            }
        }
    }

    #[test]
    fn test_same_status_is_a_no_op() {
        for status in ReservationStatus::ALL {
            assert_eq!(status.transition_to(status).unwrap(), status);
        }
    }

    #[test]
    fn test_invalid_transition_names_both_statuses() {
        let err = Pending.transition_to(CheckedIn).unwrap_err();
        assert!(matches!(
            err,
            DomainError::InvalidTransition {
                from: Pending,
                to: CheckedIn
            }
        ));
        assert_eq!(
            err.to_string(),
            "Invalid status transition from pending to checked_in"
        );
    }

    #[test]
    fn test_terminal_statuses_have_no_exits() {
        for status in [Completed, Cancelled, Rejected] {
            assert!(status.is_terminal());
            assert!(status.allowed_transitions().is_empty());
        }
        assert!(!CheckedOut.is_terminal());
    }

    #[test]
    fn test_only_cancelled_and_rejected_free_the_dates() {
        for status in ReservationStatus::ALL {
            let expected = !matches!(status, Cancelled | Rejected);
            assert_eq!(status.blocks_availability(), expected);
        }
    }

    #[test]
    fn test_parse_round_trips_through_display() {
        for status in ReservationStatus::ALL {
            assert_eq!(status.to_string().parse::<ReservationStatus>().unwrap(), status);
        }
    }

    #[test]
    fn test_parse_rejects_unknown_values() {
        let err = "CONFIRMED".parse::<ReservationStatus>().unwrap_err();
        assert!(matches!(err, DomainError::InvalidStatusValue(ref v) if v == "CONFIRMED"));
    }

    #[test]
    fn test_serialization_uses_snake_case() {
        let json = serde_json::to_string(&PaymentRequired).unwrap();
        assert_eq!(json, "\"payment_required\"");
        let deserialized: ReservationStatus = serde_json::from_str("\"checked_out\"").unwrap();
        assert_eq!(deserialized, CheckedOut);
    }
}
