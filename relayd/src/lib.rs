//! # relayd: OAuth Webhook-to-Ticket Relay
//!
//! `relayd` relays alert/event notifications from a monitoring source to a
//! ticketing backend that requires OAuth2 credential management. It keeps a
//! long-lived refresh credential usable, lazily renews short-lived access
//! tokens, persists renewed records durably in a secret store, and forwards
//! normalized payloads to the backend.
//!
//! ## Request Flow
//!
//! A webhook `POST /webhook` with body `{"input_data": <any JSON>}` goes
//! through the ingest handler ([`api::handlers::relay`]), which validates the
//! request shape, asks the [`tokens::TokenManager`] for a valid access token
//! (loading the credential record fresh from the [`secrets::SecretStore`] and
//! renewing via the refresh grant when the stored token is absent or expired),
//! and submits the payload through the [`tickets::TicketClient`]. A 2xx from
//! the backend maps to a 200 with the backend's JSON body; a non-2xx passes
//! through with status and body unchanged; every other failure becomes a
//! structured `{"error": ...}` envelope.
//!
//! Each relay operation is an independent, stateless unit: no mutable state is
//! shared across concurrent operations, and every store and network call is
//! bounded by the configured per-operation timeout. There are no internal
//! retries; callers retry at a higher layer.
//!
//! Authentication of inbound webhook callers is performed by an external
//! gateway and is out of scope here.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

pub mod api;
pub mod config;
pub mod errors;
pub mod secrets;
pub mod telemetry;
pub mod tickets;
pub mod tokens;

pub use config::Config;
pub use errors::{Error, Result};

use secrets::SecretStore;
use tickets::TicketClient;
use tokens::TokenManager;

/// Shared application state passed to all HTTP handlers.
///
/// Everything here is immutable after startup; per-request work allocates
/// nothing shared.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn SecretStore>,
    pub token_manager: Arc<TokenManager>,
    pub ticket_client: Arc<TicketClient>,
}

/// Build the HTTP client shared by the token manager, ticket client, and
/// network-backed secret stores. The timeout bounds every outbound call; TLS
/// certificate verification is always enabled.
fn build_http_client(timeout: Duration) -> anyhow::Result<reqwest::Client> {
    let client = reqwest::Client::builder().timeout(timeout).build()?;
    Ok(client)
}

/// Assemble the service router.
fn build_router(state: AppState) -> Router {
    let max_body_bytes = state.config.max_body_bytes;

    Router::new()
        .route("/webhook", post(api::handlers::relay::relay_webhook))
        .route("/health/live", get(api::handlers::probes::live))
        .route("/health/ready", get(api::handlers::probes::ready))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub struct Application {
    router: Router,
    config: Arc<Config>,
}

impl Application {
    /// Create a new application instance with all components initialized
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let http = build_http_client(config.request_timeout)?;
        let store = secrets::create_store(&config.secrets, http.clone());
        Self::from_parts(config, store, http)
    }

    /// Create an application with an externally supplied secret store (tests)
    #[cfg(test)]
    pub(crate) fn with_store(config: Config, store: Arc<dyn SecretStore>) -> anyhow::Result<Self> {
        let http = build_http_client(config.request_timeout)?;
        Self::from_parts(config, store, http)
    }

    fn from_parts(config: Config, store: Arc<dyn SecretStore>, http: reqwest::Client) -> anyhow::Result<Self> {
        let config = Arc::new(config);

        let token_manager = Arc::new(TokenManager::new(
            http.clone(),
            store.clone(),
            config.token_url.clone(),
            config.redirect_uri.clone(),
        ));
        let ticket_client = Arc::new(TicketClient::new(http));

        let state = AppState {
            config: config.clone(),
            store,
            token_manager,
            ticket_client,
        };

        Ok(Self {
            router: build_router(state),
            config,
        })
    }

    /// Convert application into a test server (for tests)
    #[cfg(test)]
    pub(crate) fn into_test_server(self) -> axum_test::TestServer {
        axum_test::TestServer::new(self.router).expect("Failed to create test server")
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!("Relay listening on http://{bind_addr}");

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Relay shut down");
        Ok(())
    }
}
