//! Ticket API client: one authenticated submission to the ticketing backend.
//!
//! The backend's wire contract nests JSON inside form encoding: the request
//! body is URL-form-encoded with a single `input_data` field whose value is
//! the JSON-serialized payload. That double encoding must be preserved
//! exactly; the backend rejects plain JSON bodies.

use axum::http::header;
use serde_json::Value;

/// Versioned media type the backend requires on every request.
const ACCEPT_MEDIA_TYPE: &str = "application/vnd.manageengine.sdp.v3+json";

/// Vendor token scheme for the Authorization header.
const AUTH_SCHEME: &str = "Zoho-oauthtoken";

/// Result type for ticket submission
pub type Result<T> = std::result::Result<T, TicketError>;

/// Errors that can occur while submitting a ticket
#[derive(Debug, thiserror::Error)]
pub enum TicketError {
    /// The ticketing backend could not be reached (includes timeouts)
    #[error("Ticketing backend unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    /// The payload could not be serialized for the wire
    #[error("Failed to encode ticket payload: {0}")]
    Encode(serde_json::Error),

    /// The backend reported success but returned a body that is not JSON
    #[error("Ticketing backend returned a malformed success body: {0}")]
    InvalidBody(serde_json::Error),
}

/// The ticketing backend's response, passed through largely unmodified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketResponse {
    pub status: u16,
    pub body: String,
    /// Content type reported by the backend, relayed on passthrough responses
    pub content_type: Option<String>,
}

impl TicketResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Issues one authenticated outbound call per relay operation.
pub struct TicketClient {
    http: reqwest::Client,
}

impl TicketClient {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    /// Submit the normalized payload as a ticket.
    ///
    /// On HTTP 200 the body is parsed and re-serialized so the caller always
    /// relays compact JSON; any other status comes back with the raw body
    /// verbatim, with no reinterpretation.
    pub async fn submit(&self, url: &str, access_token: &str, payload: &Value) -> Result<TicketResponse> {
        let input_data = serde_json::to_string(payload).map_err(TicketError::Encode)?;

        let response = self
            .http
            .post(url)
            .header(header::ACCEPT, ACCEPT_MEDIA_TYPE)
            .header(header::AUTHORIZATION, format!("{AUTH_SCHEME} {access_token}"))
            .form(&[("input_data", input_data.as_str())])
            .send()
            .await?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = response.text().await?;

        if status == 200 {
            let parsed: Value = serde_json::from_str(&body).map_err(TicketError::InvalidBody)?;
            let body = serde_json::to_string(&parsed).map_err(TicketError::InvalidBody)?;
            tracing::debug!(status, "Ticket created");
            return Ok(TicketResponse {
                status,
                body,
                content_type,
            });
        }

        tracing::debug!(status, "Ticketing backend returned non-200");
        Ok(TicketResponse {
            status,
            body,
            content_type,
        })
    }
}
