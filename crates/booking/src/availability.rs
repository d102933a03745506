//! Double-booking detection.

use common::{PropertyId, ReservationId};
use domain::StayPeriod;
use store::ReservationStore;

/// Answers whether a property is free for a stay.
///
/// Two stays on the same property conflict when `a.check_in < b.check_out`
/// and `b.check_in < a.check_out`. Cancelled and rejected reservations never
/// block. This is an advisory read: the store re-checks the same rule
/// atomically on every write.
pub struct AvailabilityChecker<'a, S: ReservationStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: ReservationStore + ?Sized> AvailabilityChecker<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Returns true if no active reservation on the property overlaps `stay`.
    ///
    /// `exclude` skips one reservation, so an edit does not collide with itself.
    pub async fn is_available(
        &self,
        property_id: PropertyId,
        stay: StayPeriod,
        exclude: Option<ReservationId>,
    ) -> store::Result<bool> {
        let overlapping = self
            .store
            .exists_overlapping(property_id, stay, exclude)
            .await?;
        Ok(!overlapping)
    }
}
