use chrono::{DateTime, Utc};
use common::{CustomerId, OrganizationId, PropertyId};
use domain::{Reservation, ReservationStatus};

/// Sort order applied to query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryOrder {
    /// Newest reservations first.
    #[default]
    CreatedAtDesc,
    /// Latest arrivals first.
    CheckInDesc,
    /// Earliest arrivals first.
    CheckInAsc,
}

impl QueryOrder {
    /// SQL `ORDER BY` clause for this ordering.
    pub fn sql(&self) -> &'static str {
        match self {
            QueryOrder::CreatedAtDesc => " ORDER BY created_at DESC, id ASC",
            QueryOrder::CheckInDesc => " ORDER BY check_in DESC, id ASC",
            QueryOrder::CheckInAsc => " ORDER BY check_in ASC, id ASC",
        }
    }

    /// Sorts reservations in memory the same way the SQL clause would.
    pub fn sort(&self, reservations: &mut [Reservation]) {
        match self {
            QueryOrder::CreatedAtDesc => reservations
                .sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id))),
            QueryOrder::CheckInDesc => {
                reservations.sort_by(|a, b| b.check_in.cmp(&a.check_in).then(a.id.cmp(&b.id)))
            }
            QueryOrder::CheckInAsc => {
                reservations.sort_by(|a, b| a.check_in.cmp(&b.check_in).then(a.id.cmp(&b.id)))
            }
        }
    }
}

/// Builder for constructing reservation queries.
///
/// All filters are combined with AND. An empty query lists every reservation.
#[derive(Debug, Clone, Default)]
pub struct ReservationQuery {
    /// Filter by property.
    pub property_id: Option<PropertyId>,

    /// Filter by customer.
    pub customer_id: Option<CustomerId>,

    /// Filter by organization.
    pub organization_id: Option<OrganizationId>,

    /// Filter by exact status.
    pub status: Option<ReservationStatus>,

    /// Check-in at or after this instant (inclusive).
    pub check_in_from: Option<DateTime<Utc>>,

    /// Check-in at or before this instant (inclusive).
    pub check_in_to: Option<DateTime<Utc>>,

    /// Check-in strictly after this instant.
    pub check_in_after: Option<DateTime<Utc>>,

    /// Drop completed, cancelled and rejected reservations.
    pub exclude_terminal: bool,

    /// Maximum number of reservations to return.
    pub limit: Option<usize>,

    /// Number of reservations to skip.
    pub offset: Option<usize>,

    pub order: QueryOrder,
}

impl ReservationQuery {
    /// Creates a new empty query.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a query for a specific property.
    pub fn for_property(property_id: PropertyId) -> Self {
        Self {
            property_id: Some(property_id),
            ..Default::default()
        }
    }

    /// Creates a query for a specific customer.
    pub fn for_customer(customer_id: CustomerId) -> Self {
        Self {
            customer_id: Some(customer_id),
            ..Default::default()
        }
    }

    /// Creates a query for a specific organization.
    pub fn for_organization(organization_id: OrganizationId) -> Self {
        Self {
            organization_id: Some(organization_id),
            ..Default::default()
        }
    }

    /// Filters by status.
    pub fn status(mut self, status: ReservationStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Filters to check-ins within `[from, to]`.
    pub fn check_in_between(mut self, from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        self.check_in_from = Some(from);
        self.check_in_to = Some(to);
        self
    }

    /// Filters to check-ins strictly after `instant`.
    pub fn check_in_after(mut self, instant: DateTime<Utc>) -> Self {
        self.check_in_after = Some(instant);
        self
    }

    /// Drops reservations in a terminal status.
    pub fn exclude_terminal(mut self) -> Self {
        self.exclude_terminal = true;
        self
    }

    /// Limits the number of reservations returned.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Skips this many reservations before returning results.
    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn order(mut self, order: QueryOrder) -> Self {
        self.order = order;
        self
    }

    /// Returns true if the reservation passes every filter of this query.
    pub fn matches(&self, reservation: &Reservation) -> bool {
        if let Some(id) = self.property_id
            && reservation.property_id != id
        {
            return false;
        }
        if let Some(id) = self.customer_id
            && reservation.customer_id != id
        {
            return false;
        }
        if let Some(id) = self.organization_id
            && reservation.organization_id != id
        {
            return false;
        }
        if let Some(status) = self.status
            && reservation.status != status
        {
            return false;
        }
        if let Some(from) = self.check_in_from
            && reservation.check_in < from
        {
            return false;
        }
        if let Some(to) = self.check_in_to
            && reservation.check_in > to
        {
            return false;
        }
        if let Some(after) = self.check_in_after
            && reservation.check_in <= after
        {
            return false;
        }
        if self.exclude_terminal && reservation.status.is_terminal() {
            return false;
        }
        true
    }
}
