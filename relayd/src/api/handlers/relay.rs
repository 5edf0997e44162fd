//! Webhook ingest handler: the top-level entry point for one relay operation.
//!
//! Validates the inbound request, obtains a valid access token (renewing
//! lazily if needed), submits the normalized payload to the ticketing backend,
//! and maps the result to a response envelope. Every failure path surfaces as
//! a structured JSON error via [`Error`]; nothing propagates uncaught.

use axum::{
    body::Bytes,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::Value;

use crate::AppState;
use crate::errors::Error;

/// POST /webhook - relay one monitoring alert to the ticketing backend.
///
/// Expects a JSON body of the shape `{"input_data": <any JSON>}`. Validation
/// happens in order; the first failing check wins and maps to HTTP 400.
pub async fn relay_webhook(State(state): State<AppState>, body: Bytes) -> Result<Response, Error> {
    if body.is_empty() {
        return Err(Error::InvalidRequest {
            message: "Missing request body".to_string(),
        });
    }

    let parsed: Value = serde_json::from_slice(&body).map_err(|e| Error::InvalidRequest {
        message: format!("Request body is not valid JSON: {e}"),
    })?;

    let Some(input_data) = parsed.get("input_data") else {
        return Err(Error::InvalidRequest {
            message: "Request body missing 'input_data'".to_string(),
        });
    };

    let (access_token, record) = state.token_manager.get_valid_token(&state.config.secret_name).await?;

    // Explicit config override beats the URL stored with the credential
    let ticket_url = state
        .config
        .ticket_url
        .as_ref()
        .map(url::Url::as_str)
        .or(record.endpoint_url.as_deref())
        .ok_or_else(|| Error::Internal {
            operation: "resolve ticketing endpoint: no URL configured or stored with the credential".to_string(),
        })?;

    let ticket = state.ticket_client.submit(ticket_url, &access_token, input_data).await?;

    if ticket.is_success() {
        tracing::info!(status = ticket.status, "Relayed alert to ticketing backend");
        Ok((
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/json")],
            ticket.body,
        )
            .into_response())
    } else {
        Err(Error::UpstreamTicket {
            status: ticket.status,
            body: ticket.body,
            content_type: ticket.content_type,
        })
    }
}
