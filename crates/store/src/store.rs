use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{CustomerId, OrganizationId, PropertyId, ReservationId};
use domain::{Reservation, ReservationStatus, StayPeriod};

use crate::{QueryOrder, ReservationQuery, Result};

/// Core trait for reservation store implementations.
///
/// Writes are the only place where the no-double-booking invariant is
/// enforced atomically: `insert` and `update_full` re-evaluate the overlap
/// predicate in the same critical section as the write and fail with
/// `StoreError::Overlap` if another active reservation on the property
/// overlaps. Cancelled and rejected records are written without that check.
///
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait ReservationStore: Send + Sync {
    /// Retrieves a reservation by its identifier.
    ///
    /// Returns None if the reservation doesn't exist.
    async fn get_by_id(&self, id: ReservationId) -> Result<Option<Reservation>>;

    /// Retrieves reservations matching a query.
    async fn query(&self, query: ReservationQuery) -> Result<Vec<Reservation>>;

    /// Returns true if an active reservation on `property_id` overlaps `stay`.
    ///
    /// `exclude` ignores one reservation, typically the one being edited.
    async fn exists_overlapping(
        &self,
        property_id: PropertyId,
        stay: StayPeriod,
        exclude: Option<ReservationId>,
    ) -> Result<bool>;

    /// Stores a new reservation.
    ///
    /// Fails with `AlreadyExists` on a duplicate id and with `Overlap` if the
    /// stay collides with another active reservation.
    async fn insert(&self, reservation: &Reservation) -> Result<()>;

    /// Replaces every stored field of an existing reservation.
    ///
    /// `reservation.version` must equal the stored version, otherwise the
    /// write fails with `VersionConflict`. Returns the new stored version.
    /// Fails with `NotFound` if the id is unknown and with `Overlap` if the
    /// new stay collides with another active reservation.
    async fn update_full(&self, reservation: &Reservation) -> Result<i64>;

    /// Removes a reservation permanently.
    ///
    /// Fails with `NotFound` if the id is unknown.
    async fn delete(&self, id: ReservationId) -> Result<()>;
}

#[async_trait]
impl<T: ReservationStore + ?Sized> ReservationStore for Arc<T> {
    async fn get_by_id(&self, id: ReservationId) -> Result<Option<Reservation>> {
        (**self).get_by_id(id).await
    }

    async fn query(&self, query: ReservationQuery) -> Result<Vec<Reservation>> {
        (**self).query(query).await
    }

    async fn exists_overlapping(
        &self,
        property_id: PropertyId,
        stay: StayPeriod,
        exclude: Option<ReservationId>,
    ) -> Result<bool> {
        (**self).exists_overlapping(property_id, stay, exclude).await
    }

    async fn insert(&self, reservation: &Reservation) -> Result<()> {
        (**self).insert(reservation).await
    }

    async fn update_full(&self, reservation: &Reservation) -> Result<i64> {
        (**self).update_full(reservation).await
    }

    async fn delete(&self, id: ReservationId) -> Result<()> {
        (**self).delete(id).await
    }
}

/// Extension trait providing the read queries exposed by the service.
#[async_trait]
pub trait ReservationStoreExt: ReservationStore {
    /// Lists every reservation, newest first.
    async fn list(&self) -> Result<Vec<Reservation>> {
        self.query(ReservationQuery::new()).await
    }

    /// Lists reservations of a property, latest check-in first.
    async fn list_by_property(&self, property_id: PropertyId) -> Result<Vec<Reservation>> {
        self.query(ReservationQuery::for_property(property_id).order(QueryOrder::CheckInDesc))
            .await
    }

    /// Lists reservations of a customer, newest first.
    async fn list_by_customer(&self, customer_id: CustomerId) -> Result<Vec<Reservation>> {
        self.query(ReservationQuery::for_customer(customer_id)).await
    }

    /// Lists reservations of an organization, newest first.
    async fn list_by_organization(
        &self,
        organization_id: OrganizationId,
    ) -> Result<Vec<Reservation>> {
        self.query(ReservationQuery::for_organization(organization_id))
            .await
    }

    /// Lists reservations in a status, newest first.
    async fn list_by_status(&self, status: ReservationStatus) -> Result<Vec<Reservation>> {
        self.query(ReservationQuery::new().status(status)).await
    }

    /// Lists reservations checking in within `[start, end]`, earliest first.
    async fn list_by_date_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Reservation>> {
        self.query(
            ReservationQuery::new()
                .check_in_between(start, end)
                .order(QueryOrder::CheckInAsc),
        )
        .await
    }

    /// Lists non-terminal reservations checking in after `now`, earliest first.
    async fn list_upcoming(&self, now: DateTime<Utc>) -> Result<Vec<Reservation>> {
        self.query(
            ReservationQuery::new()
                .check_in_after(now)
                .exclude_terminal()
                .order(QueryOrder::CheckInAsc),
        )
        .await
    }
}

// Blanket implementation for all ReservationStore implementations
impl<T: ReservationStore + ?Sized> ReservationStoreExt for T {}
