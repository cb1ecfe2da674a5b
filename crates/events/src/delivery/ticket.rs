//! Ticket collaborator client with exponential-backoff retry.
//!
//! [`TicketService`] accepts a structured failure payload and returns a
//! ticket reference. [`dispatch_with_retry`] retries failed attempts on a
//! backoff schedule; a failure never invalidates the analysis run that
//! triggered it.

use std::time::Duration;

use async_trait::async_trait;
use pqa_core::remediation::TicketPayload;
use serde::Deserialize;

/// Default retry delays in seconds (exponential backoff: 1s, 2s, 4s).
pub const DEFAULT_RETRY_DELAYS_SECS: [u64; 3] = [1, 2, 4];

/// HTTP request timeout for a single attempt.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum TicketError {
    /// The underlying HTTP request failed (network, DNS, timeout, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The ticket service returned a non-2xx status code.
    #[error("Ticket service returned HTTP {0}")]
    HttpStatus(u16),

    /// The ticket service answered without a usable ticket reference.
    #[error("Invalid ticket service response: {0}")]
    InvalidResponse(String),

    /// The ticket service is not reachable or refused the request.
    #[error("Ticket service unavailable: {0}")]
    Unavailable(String),
}

// ---------------------------------------------------------------------------
// TicketService
// ---------------------------------------------------------------------------

/// Creates remediation tickets.
#[async_trait]
pub trait TicketService: Send + Sync {
    /// Open a ticket and return its reference.
    async fn create_ticket(&self, payload: &TicketPayload) -> Result<String, TicketError>;
}

/// Result of a dispatch with retries.
#[derive(Debug)]
pub struct DispatchReport {
    /// Attempts made, including the successful one.
    pub attempts: u32,
    pub outcome: Result<String, TicketError>,
}

/// Try to open a ticket, sleeping `delays[i]` after the `i`-th failure.
///
/// Makes `delays.len() + 1` attempts at most.
pub async fn dispatch_with_retry(
    service: &dyn TicketService,
    payload: &TicketPayload,
    delays: &[Duration],
) -> DispatchReport {
    let mut attempts = 0;
    let mut schedule = delays.iter();
    loop {
        attempts += 1;
        match service.create_ticket(payload).await {
            Ok(ticket_ref) => {
                return DispatchReport {
                    attempts,
                    outcome: Ok(ticket_ref),
                }
            }
            Err(e) => match schedule.next() {
                Some(delay) => {
                    tracing::warn!(
                        attempt = attempts,
                        run_id = %payload.run_id,
                        threshold = %payload.threshold_name,
                        error = %e,
                        "Ticket creation attempt failed, retrying"
                    );
                    tokio::time::sleep(*delay).await;
                }
                None => {
                    tracing::error!(
                        attempts,
                        run_id = %payload.run_id,
                        threshold = %payload.threshold_name,
                        error = %e,
                        "Ticket creation failed after all retries"
                    );
                    return DispatchReport {
                        attempts,
                        outcome: Err(e),
                    };
                }
            },
        }
    }
}

// ---------------------------------------------------------------------------
// HttpTicketService
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct TicketResponse {
    #[serde(alias = "id", alias = "key")]
    ticket_ref: String,
}

/// Posts ticket payloads as JSON to an external tracker endpoint.
pub struct HttpTicketService {
    client: reqwest::Client,
    url: String,
}

impl HttpTicketService {
    pub fn new(url: impl Into<String>) -> Result<Self, TicketError> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl TicketService for HttpTicketService {
    async fn create_ticket(&self, payload: &TicketPayload) -> Result<String, TicketError> {
        let response = self.client.post(&self.url).json(payload).send().await?;
        if !response.status().is_success() {
            return Err(TicketError::HttpStatus(response.status().as_u16()));
        }
        let body: TicketResponse = response
            .json()
            .await
            .map_err(|e| TicketError::InvalidResponse(e.to_string()))?;
        if body.ticket_ref.trim().is_empty() {
            return Err(TicketError::InvalidResponse("empty ticket reference".into()));
        }
        Ok(body.ticket_ref)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
