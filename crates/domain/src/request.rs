//! Typed requests accepted by the reservation lifecycle and their validation.

use chrono::{DateTime, Utc};
use common::{CustomerId, OrganizationId, PropertyId};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::stay::StayPeriod;
use crate::value_objects::{Attributes, Money};

/// Request to create a reservation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewReservation {
    pub organization_id: OrganizationId,
    pub property_id: PropertyId,
    pub customer_id: CustomerId,
    pub check_in: DateTime<Utc>,
    pub check_out: DateTime<Utc>,
    pub guests: u32,
    pub total_price: Money,
    #[serde(default)]
    pub price_elements: Attributes,
    #[serde(default)]
    pub guest_data: Attributes,
    #[serde(default)]
    pub additional_requests: Attributes,
}

impl NewReservation {
    /// Creates a request for a single guest at zero price with empty maps.
    pub fn new(
        organization_id: OrganizationId,
        property_id: PropertyId,
        customer_id: CustomerId,
        check_in: DateTime<Utc>,
        check_out: DateTime<Utc>,
    ) -> Self {
        Self {
            organization_id,
            property_id,
            customer_id,
            check_in,
            check_out,
            guests: 1,
            total_price: Money::zero(),
            price_elements: Attributes::new(),
            guest_data: Attributes::new(),
            additional_requests: Attributes::new(),
        }
    }

    pub fn with_guests(mut self, guests: u32) -> Self {
        self.guests = guests;
        self
    }

    pub fn with_total_price(mut self, total_price: Money) -> Self {
        self.total_price = total_price;
        self
    }

    pub fn with_price_elements(mut self, price_elements: Attributes) -> Self {
        self.price_elements = price_elements;
        self
    }

    pub fn with_guest_data(mut self, guest_data: Attributes) -> Self {
        self.guest_data = guest_data;
        self
    }

    pub fn with_additional_requests(mut self, additional_requests: Attributes) -> Self {
        self.additional_requests = additional_requests;
        self
    }

    /// The stay this request would occupy.
    pub fn stay(&self) -> StayPeriod {
        StayPeriod::new(self.check_in, self.check_out)
    }

    /// Checks required fields and date semantics.
    ///
    /// Reports the first offending field.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.organization_id.is_nil() {
            return Err(ValidationError::new(
                "organization_id",
                "organization ID is required",
            ));
        }
        if self.property_id.is_nil() {
            return Err(ValidationError::new("property_id", "property ID is required"));
        }
        if self.customer_id.is_nil() {
            return Err(ValidationError::new("customer_id", "customer ID is required"));
        }
        validate_stay_terms(self.stay(), self.guests, self.total_price)
    }
}

/// Replacement values for the mutable fields of an existing reservation.
///
/// Scope keys (organization, property, customer) are fixed at creation and
/// therefore absent here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReservationChanges {
    pub check_in: DateTime<Utc>,
    pub check_out: DateTime<Utc>,
    pub guests: u32,
    pub total_price: Money,
    #[serde(default)]
    pub price_elements: Attributes,
    #[serde(default)]
    pub guest_data: Attributes,
    #[serde(default)]
    pub additional_requests: Attributes,
}

impl ReservationChanges {
    /// Creates changes for a single guest at zero price with empty maps.
    pub fn new(check_in: DateTime<Utc>, check_out: DateTime<Utc>) -> Self {
        Self {
            check_in,
            check_out,
            guests: 1,
            total_price: Money::zero(),
            price_elements: Attributes::new(),
            guest_data: Attributes::new(),
            additional_requests: Attributes::new(),
        }
    }

    pub fn with_guests(mut self, guests: u32) -> Self {
        self.guests = guests;
        self
    }

    pub fn with_total_price(mut self, total_price: Money) -> Self {
        self.total_price = total_price;
        self
    }

    pub fn with_guest_data(mut self, guest_data: Attributes) -> Self {
        self.guest_data = guest_data;
        self
    }

    pub fn stay(&self) -> StayPeriod {
        StayPeriod::new(self.check_in, self.check_out)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_stay_terms(self.stay(), self.guests, self.total_price)
    }
}

fn validate_stay_terms(stay: StayPeriod, guests: u32, total_price: Money) -> Result<(), ValidationError> {
    if stay.check_out <= stay.check_in {
        return Err(ValidationError::new(
            "check_out",
            "check-out date must be after check-in date",
        ));
    }
    if stay.duration() < StayPeriod::minimum_stay() {
        return Err(ValidationError::new("check_out", "minimum stay is 1 night"));
    }
    if guests < 1 {
        return Err(ValidationError::new(
            "guests",
            "number of guests must be at least 1",
        ));
    }
    if total_price.is_negative() {
        return Err(ValidationError::new(
            "total_price",
            "total price cannot be negative",
        ));
    }
    Ok(())
}
