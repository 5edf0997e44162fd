//! Service error taxonomy and HTTP mapping.
//!
//! Every lower-layer failure is converted here at the handler boundary: axum
//! handlers return `Result<_, Error>`, and the `IntoResponse` impl turns each
//! category into an HTTP status plus a JSON `{"error": ...}` envelope. The one
//! exception is `UpstreamTicket`, which passes the ticketing backend's status
//! code and raw body through unchanged.

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error as ThisError;

use crate::secrets::SecretError;
use crate::tickets::TicketError;
use crate::tokens::TokenError;

#[derive(ThisError, Debug)]
pub enum Error {
    /// Client sent a request the relay cannot process
    #[error("{message}")]
    InvalidRequest { message: String },

    /// The refresh-grant exchange failed
    #[error(transparent)]
    TokenRenewal(TokenError),

    /// The ticketing backend rejected the submission; status, body, and
    /// content type pass through
    #[error("Ticketing backend returned HTTP {status}")]
    UpstreamTicket {
        status: u16,
        body: String,
        content_type: Option<String>,
    },

    /// The ticketing backend could not be reached or returned an unusable body
    #[error(transparent)]
    Ticket(#[from] TicketError),

    /// Credential store read/write failure
    #[error(transparent)]
    Store(#[from] SecretError),

    /// Generic internal service error
    #[error("Failed to {operation}")]
    Internal { operation: String },

    /// Unexpected error with full context chain
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Store failures inside a renewal keep their own category so the handler
/// reports them as store errors, not renewal errors.
impl From<TokenError> for Error {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Store(e) => Error::Store(e),
            other => Error::TokenRenewal(other),
        }
    }
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::InvalidRequest { .. } => StatusCode::BAD_REQUEST,
            Error::UpstreamTicket { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            Error::TokenRenewal(_) | Error::Ticket(_) | Error::Store(_) | Error::Internal { .. } | Error::Other(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message placed in the error envelope body
    pub fn user_message(&self) -> String {
        self.to_string()
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        // Log full error details here - different log levels based on severity
        match &self {
            Error::InvalidRequest { .. } => {
                tracing::debug!("Client error: {}", self);
            }
            Error::UpstreamTicket { status, .. } => {
                tracing::warn!(status, "Ticketing backend rejected submission");
            }
            Error::TokenRenewal(_) | Error::Ticket(_) | Error::Store(_) => {
                tracing::warn!("Upstream failure: {:#}", self);
            }
            Error::Internal { .. } | Error::Other(_) => {
                tracing::error!("Internal service error: {:#}", self);
            }
        }

        let status = self.status_code();

        match self {
            // Backend rejections pass through verbatim, no envelope; the
            // backend's own content type is relayed when it sent one
            Error::UpstreamTicket { body, content_type, .. } => {
                let mut response = (status, body).into_response();
                match content_type.and_then(|value| HeaderValue::from_str(&value).ok()) {
                    Some(value) => {
                        response.headers_mut().insert(header::CONTENT_TYPE, value);
                    }
                    None => {
                        response.headers_mut().remove(header::CONTENT_TYPE);
                    }
                }
                response
            }
            _ => (status, Json(json!({ "error": self.user_message() }))).into_response(),
        }
    }
}

/// Type alias for service operation results
pub type Result<T> = std::result::Result<T, Error>;
