//! HTTP clients for collaborators running in another process.
//!
//! Each client talks to the `/api/v1` surface of a remote Railseat service.
//! Domain errors come back as `400 {code, message}` and are rebuilt into the
//! same [`ReservationError`]; everything else (connection refused, 5xx,
//! unreadable body) is `Unavailable`. No retries.
//!
//! The orchestrator only reads through these clients. The seat and counter
//! writes are for operators and tools driving a remote service directly.

use crate::app::collaborators::{RiderLookup, SeatLookup, TrainLookup};
use crate::error::{ReservationError, ReservationResult};
use crate::types::{RiderId, RiderProfile, Seat, SeatId, TrainId, TrainRun};
use async_trait::async_trait;
use railseat_web::ErrorBody;
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Transport-level failures of a collaborator call.
#[derive(Error, Debug)]
pub enum ClientError {
    /// The request never got a response
    #[error("request to {url} failed: {reason}")]
    RequestFailed {
        /// Target URL
        url: String,
        /// Transport error
        reason: String,
    },

    /// The response body did not parse
    #[error("unreadable response from {url}: {reason}")]
    ResponseParseFailed {
        /// Target URL
        url: String,
        /// Parse error
        reason: String,
    },

    /// A status the domain does not produce
    #[error("{url} answered {status}: {body}")]
    UnexpectedStatus {
        /// Target URL
        url: String,
        /// HTTP status code
        status: u16,
        /// Raw body
        body: String,
    },
}

impl From<ClientError> for ReservationError {
    fn from(error: ClientError) -> Self {
        Self::Unavailable(error.to_string())
    }
}

/// Shared HTTP plumbing for the three collaborator clients.
#[derive(Clone, Debug)]
pub struct ServiceClient {
    client: Client,
    base_url: String,
}

impl ServiceClient {
    /// Client for the service whose API root is `base_url`
    /// (e.g. `http://seats.internal:8080/api/v1`).
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// API root this client calls.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> ReservationResult<T> {
        self.send_json(Method::GET, path).await
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
    ) -> ReservationResult<T> {
        let url = format!("{}{path}", self.base_url);
        tracing::debug!(method = %method, url = %url, "Collaborator call");

        let response = self
            .client
            .request(method, &url)
            .send()
            .await
            .map_err(|e| ClientError::RequestFailed {
                url: url.clone(),
                reason: e.to_string(),
            })?;

        match response.status() {
            status if status.is_success() => {
                response
                    .json::<T>()
                    .await
                    .map_err(|e| {
                        ClientError::ResponseParseFailed {
                            url,
                            reason: e.to_string(),
                        }
                        .into()
                    })
            },
            StatusCode::BAD_REQUEST => {
                let body = response.json::<ErrorBody>().await.map_err(|e| {
                    ClientError::ResponseParseFailed {
                        url: url.clone(),
                        reason: e.to_string(),
                    }
                })?;
                Err(ReservationError::from_remote(&body.code, &body.message, None))
            },
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(ClientError::UnexpectedStatus {
                    url,
                    status: status.as_u16(),
                    body,
                }
                .into())
            },
        }
    }
}

/// User directory over HTTP.
#[derive(Clone, Debug)]
pub struct HttpUserDirectory(ServiceClient);

impl HttpUserDirectory {
    /// Client for the user directory at `base_url`.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self(ServiceClient::new(base_url))
    }
}

#[async_trait]
impl RiderLookup for HttpUserDirectory {
    async fn rider(&self, id: RiderId) -> ReservationResult<RiderProfile> {
        self.0.get_json(&format!("/users/{id}")).await
    }
}

/// Train inventory over HTTP.
#[derive(Clone, Debug)]
pub struct HttpTrainInventory(ServiceClient);

impl HttpTrainInventory {
    /// Client for the train inventory at `base_url`.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self(ServiceClient::new(base_url))
    }

    /// Set the counter of `id` (`PUT /trains/{id}/seats`).
    ///
    /// # Errors
    ///
    /// `NotFound(train)`, `InvalidInput` above capacity, or `Unavailable`.
    pub async fn update_available_seats(
        &self,
        id: TrainId,
        available_seats: u32,
    ) -> ReservationResult<TrainRun> {
        self.0
            .send_json(
                Method::PUT,
                &format!("/trains/{id}/seats?availableSeats={available_seats}"),
            )
            .await
    }
}

#[async_trait]
impl TrainLookup for HttpTrainInventory {
    async fn train(&self, id: TrainId) -> ReservationResult<TrainRun> {
        self.0.get_json(&format!("/trains/{id}")).await
    }
}

/// Seat store over HTTP.
#[derive(Clone, Debug)]
pub struct HttpSeatStore(ServiceClient);

impl HttpSeatStore {
    /// Client for the seat store at `base_url`.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self(ServiceClient::new(base_url))
    }

    /// Mark seat `id` reserved (`POST /seats/{id}/reserve`).
    ///
    /// # Errors
    ///
    /// `NotFound(seat)`, `Conflict(SeatAlreadyReserved)`, or `Unavailable`.
    pub async fn reserve(&self, id: SeatId) -> ReservationResult<Seat> {
        self.0
            .send_json(Method::POST, &format!("/seats/{id}/reserve"))
            .await
    }

    /// Clear the reserved flag of seat `id` (`POST /seats/{id}/cancel`).
    ///
    /// # Errors
    ///
    /// `NotFound(seat)`, `Conflict(SeatNotReserved)`, or `Unavailable`.
    pub async fn cancel(&self, id: SeatId) -> ReservationResult<Seat> {
        self.0
            .send_json(Method::POST, &format!("/seats/{id}/cancel"))
            .await
    }
}

#[async_trait]
impl SeatLookup for HttpSeatStore {
    async fn seats_for_train(&self, train_id: TrainId) -> ReservationResult<Vec<Seat>> {
        self.0.get_json(&format!("/seats?trainId={train_id}")).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_loses_trailing_slash() {
        let client = ServiceClient::new("http://localhost:8080/api/v1/");
        assert_eq!(client.base_url(), "http://localhost:8080/api/v1");
    }

    #[tokio::test]
    async fn refused_connection_is_unavailable() {
        let trains = HttpTrainInventory::new("http://127.0.0.1:9/api/v1");
        let result = trains.train(TrainId::new(1)).await;
        assert!(matches!(result, Err(ReservationError::Unavailable(_))));
    }
}
