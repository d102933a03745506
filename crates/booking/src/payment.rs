//! Payment gateway port with in-memory and HTTP implementations.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use common::{CustomerId, OrganizationId, ReservationId};
use domain::Money;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use thiserror::Error;

/// Everything the payment service needs to start collecting a payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentRequest {
    pub organization_id: OrganizationId,
    pub reservation_id: ReservationId,
    pub customer_id: CustomerId,
    pub amount: Money,
}

/// Opaque handle returned by the payment service, typically a checkout URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PaymentReference(String);

impl PaymentReference {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for PaymentReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Errors raised while initiating a payment.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// The request never got a response.
    #[error("Payment service unreachable: {0}")]
    Transport(String),

    /// The payment service answered with a status other than 200 or 201.
    #[error("Payment service returned status: {0}")]
    UnexpectedStatus(u16),

    /// The payment service accepted the request but sent no reference.
    #[error("Payment service returned an empty reference")]
    EmptyReference,

    /// The payment service refused the request.
    #[error("Payment declined: {0}")]
    Declined(String),
}

/// Trait for starting payments on the external payment service.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Asks the payment service to collect `request.amount` for a reservation.
    async fn initiate(&self, request: PaymentRequest) -> Result<PaymentReference, PaymentError>;
}

#[async_trait]
impl<T: PaymentGateway + ?Sized> PaymentGateway for Arc<T> {
    async fn initiate(&self, request: PaymentRequest) -> Result<PaymentReference, PaymentError> {
        (**self).initiate(request).await
    }
}

#[derive(Debug, Default)]
struct InMemoryPaymentState {
    requests: Vec<PaymentRequest>,
    next_id: u32,
    fail_on_initiate: bool,
    delay: Option<Duration>,
}

/// In-memory payment gateway for testing and local runs.
///
/// Issues sequential references like `PAY-0001` and records every request.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentGateway {
    state: Arc<Mutex<InMemoryPaymentState>>,
}

impl InMemoryPaymentGateway {
    /// Creates a new in-memory payment gateway.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, InMemoryPaymentState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Configures the gateway to decline subsequent requests.
    pub fn set_fail_on_initiate(&self, fail: bool) {
        self.state().fail_on_initiate = fail;
    }

    /// Makes each call wait before answering.
    pub fn set_delay(&self, delay: Option<Duration>) {
        self.state().delay = delay;
    }

    /// Returns the requests received so far, including declined ones.
    pub fn requests(&self) -> Vec<PaymentRequest> {
        self.state().requests.clone()
    }

    pub fn request_count(&self) -> usize {
        self.state().requests.len()
    }
}

#[async_trait]
impl PaymentGateway for InMemoryPaymentGateway {
    async fn initiate(&self, request: PaymentRequest) -> Result<PaymentReference, PaymentError> {
        let delay = self.state().delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state();
        state.requests.push(request);

        if state.fail_on_initiate {
            return Err(PaymentError::Declined("payment service unavailable".to_string()));
        }

        state.next_id += 1;
        Ok(PaymentReference::new(format!("PAY-{:04}", state.next_id)))
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InitiatePaymentBody {
    organization_id: OrganizationId,
    reservation_id: ReservationId,
    customer_id: CustomerId,
    amount: f64,
}

impl From<&PaymentRequest> for InitiatePaymentBody {
    fn from(request: &PaymentRequest) -> Self {
        Self {
            organization_id: request.organization_id,
            reservation_id: request.reservation_id,
            customer_id: request.customer_id,
            amount: request.amount.as_decimal(),
        }
    }
}

/// Payment gateway talking JSON over HTTP.
///
/// POSTs `{organizationId, reservationId, customerId, amount}` to the
/// configured URL. A 200 or 201 response carries the payment reference as its
/// plain-text body.
#[derive(Debug, Clone)]
pub struct HttpPaymentGateway {
    client: Client,
    url: String,
}

impl HttpPaymentGateway {
    /// Creates a gateway posting to `url` with a default client.
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), url)
    }

    pub fn with_client(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    #[tracing::instrument(skip(self, request), fields(reservation_id = %request.reservation_id))]
    async fn initiate(&self, request: PaymentRequest) -> Result<PaymentReference, PaymentError> {
        let response = self
            .client
            .post(&self.url)
            .json(&InitiatePaymentBody::from(&request))
            .send()
            .await
            .map_err(|e| PaymentError::Transport(e.to_string()))?;

        let status = response.status();
        if status != StatusCode::OK && status != StatusCode::CREATED {
            let error_body = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), body = %error_body, "payment service rejected request");
            return Err(PaymentError::UnexpectedStatus(status.as_u16()));
        }

        let body = response
            .text()
            .await
            .map_err(|e| PaymentError::Transport(e.to_string()))?;
        let reference = body.trim();
        if reference.is_empty() {
            return Err(PaymentError::EmptyReference);
        }

        Ok(PaymentReference::new(reference))
    }
}
