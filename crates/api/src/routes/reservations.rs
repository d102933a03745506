//! Reservation lifecycle endpoints.

use std::str::FromStr;
use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use booking::ReservationError;
use chrono::{DateTime, Utc};
use common::{CustomerId, OrganizationId, PropertyId, ReservationId};
use domain::{Attributes, Money, NewReservation, Reservation, ReservationChanges, ReservationStatus};
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::error::ApiError;

// -- Request types --

fn default_guests() -> u32 {
    1
}

#[derive(Deserialize)]
pub struct CreateReservationRequest {
    pub organization_id: String,
    pub property_id: String,
    pub customer_id: String,
    pub check_in: DateTime<Utc>,
    pub check_out: DateTime<Utc>,
    #[serde(default = "default_guests")]
    pub guests: u32,
    #[serde(default)]
    pub total_price_cents: i64,
    #[serde(default)]
    pub price_elements: Attributes,
    #[serde(default)]
    pub guest_data: Attributes,
    #[serde(default)]
    pub additional_requests: Attributes,
}

#[derive(Deserialize)]
pub struct UpdateReservationRequest {
    pub check_in: DateTime<Utc>,
    pub check_out: DateTime<Utc>,
    #[serde(default = "default_guests")]
    pub guests: u32,
    #[serde(default)]
    pub total_price_cents: i64,
    #[serde(default)]
    pub price_elements: Attributes,
    #[serde(default)]
    pub guest_data: Attributes,
    #[serde(default)]
    pub additional_requests: Attributes,
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

#[derive(Deserialize)]
pub struct DateRangeParams {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

// -- Response types --

#[derive(Serialize)]
pub struct ReservationResponse {
    pub id: String,
    pub organization_id: String,
    pub property_id: String,
    pub customer_id: String,
    pub check_in: String,
    pub check_out: String,
    pub status: String,
    pub total_price_cents: i64,
    pub price_elements: Attributes,
    pub guests: u32,
    pub guest_data: Attributes,
    pub additional_requests: Attributes,
    pub payment_reference: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Reservation> for ReservationResponse {
    fn from(r: Reservation) -> Self {
        Self {
            id: r.id.to_string(),
            organization_id: r.organization_id.to_string(),
            property_id: r.property_id.to_string(),
            customer_id: r.customer_id.to_string(),
            check_in: r.check_in.to_rfc3339(),
            check_out: r.check_out.to_rfc3339(),
            status: r.status.to_string(),
            total_price_cents: r.total_price.cents(),
            price_elements: r.price_elements,
            guests: r.guests,
            guest_data: r.guest_data,
            additional_requests: r.additional_requests,
            payment_reference: r.payment_reference,
            created_at: r.created_at.to_rfc3339(),
            updated_at: r.updated_at.to_rfc3339(),
        }
    }
}

fn respond_one(reservation: Reservation) -> Json<ReservationResponse> {
    Json(reservation.into())
}

fn respond_many(reservations: Vec<Reservation>) -> Json<Vec<ReservationResponse>> {
    Json(reservations.into_iter().map(Into::into).collect())
}

// -- Handlers --

/// POST /reservations: create a pending reservation and start its payment.
#[tracing::instrument(skip(state, req))]
pub async fn create(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateReservationRequest>,
) -> Result<(StatusCode, Json<ReservationResponse>), ApiError> {
    let request = NewReservation::new(
        parse_id::<OrganizationId>("organization_id", &req.organization_id)?,
        parse_id::<PropertyId>("property_id", &req.property_id)?,
        parse_id::<CustomerId>("customer_id", &req.customer_id)?,
        req.check_in,
        req.check_out,
    )
    .with_guests(req.guests)
    .with_total_price(Money::from_cents(req.total_price_cents))
    .with_price_elements(req.price_elements)
    .with_guest_data(req.guest_data)
    .with_additional_requests(req.additional_requests);

    let reservation = state.service.create(request).await?;
    Ok((StatusCode::CREATED, respond_one(reservation)))
}

/// GET /reservations
#[tracing::instrument(skip(state))]
pub async fn list(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<ReservationResponse>>, ApiError> {
    Ok(respond_many(state.service.list().await?))
}

/// GET /reservations/{id}
#[tracing::instrument(skip(state))]
pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ReservationResponse>, ApiError> {
    let id = parse_id::<ReservationId>("id", &id)?;
    Ok(respond_one(state.service.get(id).await?))
}

/// PUT /reservations/{id}: replace the stay terms of an editable reservation.
#[tracing::instrument(skip(state, req))]
pub async fn update(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateReservationRequest>,
) -> Result<Json<ReservationResponse>, ApiError> {
    let id = parse_id::<ReservationId>("id", &id)?;
    let changes = ReservationChanges {
        check_in: req.check_in,
        check_out: req.check_out,
        guests: req.guests,
        total_price: Money::from_cents(req.total_price_cents),
        price_elements: req.price_elements,
        guest_data: req.guest_data,
        additional_requests: req.additional_requests,
    };
    Ok(respond_one(state.service.update(id, changes).await?))
}

/// DELETE /reservations/{id}
#[tracing::instrument(skip(state))]
pub async fn delete(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id::<ReservationId>("id", &id)?;
    state.service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PATCH /reservations/{id}/status with body `{"status": "..."}`.
#[tracing::instrument(skip(state, req))]
pub async fn update_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<Json<ReservationResponse>, ApiError> {
    let id = parse_id::<ReservationId>("id", &id)?;
    Ok(respond_one(
        state.service.update_status(id, &req.status).await?,
    ))
}

/// Declares a handler that applies one named lifecycle transition.
macro_rules! transition_handler {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[tracing::instrument(skip(state))]
        pub async fn $name(
            State(state): State<Arc<AppState>>,
            Path(id): Path<String>,
        ) -> Result<Json<ReservationResponse>, ApiError> {
            let id = parse_id::<ReservationId>("id", &id)?;
            Ok(respond_one(state.service.$name(id).await?))
        }
    };
}

transition_handler!(
    /// POST /reservations/{id}/cancel
    cancel
);
transition_handler!(
    /// POST /reservations/{id}/confirm
    confirm
);
transition_handler!(
    /// POST /reservations/{id}/check-in
    check_in
);
transition_handler!(
    /// POST /reservations/{id}/check-out
    check_out
);
transition_handler!(
    /// POST /reservations/{id}/complete
    complete
);
transition_handler!(
    /// POST /reservations/{id}/reject
    reject
);

/// GET /reservations/upcoming: active stays that have not started yet.
#[tracing::instrument(skip(state))]
pub async fn upcoming(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<ReservationResponse>>, ApiError> {
    Ok(respond_many(state.service.upcoming().await?))
}

/// GET /reservations/status/{status}
#[tracing::instrument(skip(state))]
pub async fn by_status(
    State(state): State<Arc<AppState>>,
    Path(status): Path<String>,
) -> Result<Json<Vec<ReservationResponse>>, ApiError> {
    let status: ReservationStatus = status.parse().map_err(ReservationError::from)?;
    Ok(respond_many(state.service.by_status(status).await?))
}

/// GET /reservations/range?start=&end=: check-in inside the inclusive range.
#[tracing::instrument(skip(state, params))]
pub async fn by_date_range(
    State(state): State<Arc<AppState>>,
    Query(params): Query<DateRangeParams>,
) -> Result<Json<Vec<ReservationResponse>>, ApiError> {
    if params.end < params.start {
        return Err(ApiError::BadRequest(
            "Range end must not be before its start".to_string(),
        ));
    }
    Ok(respond_many(
        state
            .service
            .by_date_range(params.start, params.end)
            .await?,
    ))
}

/// GET /customers/{id}/reservations
#[tracing::instrument(skip(state))]
pub async fn by_customer(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<ReservationResponse>>, ApiError> {
    let id = parse_id::<CustomerId>("customer id", &id)?;
    Ok(respond_many(state.service.by_customer(id).await?))
}

/// GET /properties/{id}/reservations
#[tracing::instrument(skip(state))]
pub async fn by_property(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<ReservationResponse>>, ApiError> {
    let id = parse_id::<PropertyId>("property id", &id)?;
    Ok(respond_many(state.service.by_property(id).await?))
}

/// GET /organizations/{id}/reservations
#[tracing::instrument(skip(state))]
pub async fn by_organization(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<ReservationResponse>>, ApiError> {
    let id = parse_id::<OrganizationId>("organization id", &id)?;
    Ok(respond_many(state.service.by_organization(id).await?))
}

fn parse_id<T>(field: &str, value: &str) -> Result<T, ApiError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e| ApiError::BadRequest(format!("Invalid {field} format: {e}")))
}
