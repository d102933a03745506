//! Reservation aggregate.

use chrono::{DateTime, Utc};
use common::{CustomerId, OrganizationId, PropertyId, ReservationId};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::request::{NewReservation, ReservationChanges};
use crate::status::ReservationStatus;
use crate::stay::StayPeriod;
use crate::value_objects::{Attributes, Money};

/// Reservation aggregate root.
///
/// Holds a booking of one property for one stay, from creation through
/// payment and check-out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: ReservationId,
    pub organization_id: OrganizationId,
    pub property_id: PropertyId,
    pub customer_id: CustomerId,
    pub check_in: DateTime<Utc>,
    pub check_out: DateTime<Utc>,
    pub status: ReservationStatus,
    pub total_price: Money,
    pub price_elements: Attributes,
    pub guests: u32,
    pub guest_data: Attributes,
    pub additional_requests: Attributes,
    /// Reference returned by the payment gateway once payment is initiated.
    pub payment_reference: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Number of writes since creation. The store rejects a write whose
    /// version no longer matches the stored one.
    #[serde(default)]
    pub version: i64,
}

impl Reservation {
    /// Builds a new reservation in the initial status with a fresh identity.
    ///
    /// The request is expected to have been validated already.
    pub fn create(request: NewReservation, now: DateTime<Utc>) -> Self {
        Self {
            id: ReservationId::new(),
            organization_id: request.organization_id,
            property_id: request.property_id,
            customer_id: request.customer_id,
            check_in: request.check_in,
            check_out: request.check_out,
            status: ReservationStatus::default(),
            total_price: request.total_price,
            price_elements: request.price_elements,
            guests: request.guests,
            guest_data: request.guest_data,
            additional_requests: request.additional_requests,
            payment_reference: None,
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    /// The period this reservation occupies on its property.
    pub fn stay(&self) -> StayPeriod {
        StayPeriod::new(self.check_in, self.check_out)
    }

    /// Returns true if the reservation can no longer be edited.
    pub fn is_locked(&self) -> bool {
        self.status.is_terminal()
    }

    /// Returns true if the reservation still blocks its dates.
    pub fn is_active(&self) -> bool {
        self.status.blocks_availability()
    }

    /// Moves to `next` if the state machine allows it.
    ///
    /// Returns `Ok(false)` without touching the record when `next` equals the
    /// current status.
    pub fn transition_to(
        &mut self,
        next: ReservationStatus,
        now: DateTime<Utc>,
    ) -> Result<bool, DomainError> {
        let target = self.status.transition_to(next)?;
        if target == self.status {
            return Ok(false);
        }
        self.status = target;
        self.updated_at = now;
        Ok(true)
    }

    /// Records a successfully initiated payment and waits for its outcome.
    pub fn record_payment_initiated(
        &mut self,
        reference: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        self.transition_to(ReservationStatus::PaymentRequired, now)?;
        self.payment_reference = Some(reference.into());
        self.updated_at = now;
        Ok(())
    }

    /// Overwrites the mutable fields.
    pub fn apply_changes(&mut self, changes: ReservationChanges, now: DateTime<Utc>) {
        self.check_in = changes.check_in;
        self.check_out = changes.check_out;
        self.guests = changes.guests;
        self.total_price = changes.total_price;
        self.price_elements = changes.price_elements;
        self.guest_data = changes.guest_data;
        self.additional_requests = changes.additional_requests;
        self.updated_at = now;
    }
}
