//! Token lifecycle management: lazy access-token renewal via the refresh grant.
//!
//! Each relay operation loads the credential record fresh from the secret
//! store, uses the stored access token while it is unexpired, and otherwise
//! performs a refresh-grant exchange against the token endpoint and persists
//! the renewed record before continuing.
//!
//! Renewal is triggered lazily per request; there is no standing background
//! refresher. Concurrent operations that both observe an expired token each
//! renew and write independently. Under the store's last-writer-wins semantics
//! this is safe only because the refresh credential itself is never rotated
//! per renewal; a provider that rotates refresh tokens on every use would need
//! a single-flight lock or a compare-and-swap write here.

use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use url::Url;

use crate::secrets::{CredentialRecord, SecretError, SecretStore};

/// Access-token lifetime assumed when the grant response omits `expires_in`.
const DEFAULT_EXPIRES_IN: i64 = 3600;

/// Result type for token lifecycle operations
pub type Result<T> = std::result::Result<T, TokenError>;

/// Errors that can occur while obtaining a valid access token
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    /// The token endpoint rejected the refresh grant or returned an unusable
    /// response. Carries the raw response body for diagnostics.
    #[error("Token renewal failed: {body}")]
    Renewal { body: String },

    /// The token endpoint could not be reached (includes timeouts)
    #[error("Token endpoint unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    /// Loading or persisting the credential record failed
    #[error(transparent)]
    Store(#[from] SecretError),
}

/// Successful refresh-grant response. Fields beyond these are ignored.
#[derive(Debug, Deserialize)]
struct GrantResponse {
    access_token: Option<String>,
    expires_in: Option<i64>,
}

/// Decides whether the stored access token is usable and renews it when not.
pub struct TokenManager {
    http: reqwest::Client,
    store: Arc<dyn SecretStore>,
    token_url: Url,
    redirect_uri: String,
}

impl TokenManager {
    pub fn new(http: reqwest::Client, store: Arc<dyn SecretStore>, token_url: Url, redirect_uri: String) -> Self {
        Self {
            http,
            store,
            token_url,
            redirect_uri,
        }
    }

    /// Return a usable access token plus the record it came from.
    ///
    /// Loads the record fresh from the store each call. If the stored token is
    /// absent or past its expiry, performs a renewal (which persists the
    /// updated record) before returning.
    pub async fn get_valid_token(&self, name: &str) -> Result<(String, CredentialRecord)> {
        let record = self.store.load(name).await?;
        let now = Utc::now().timestamp();

        if record.has_valid_token(now) {
            // has_valid_token guarantees the token is present
            if let Some(token) = record.access_token.clone() {
                tracing::debug!(expiry = record.token_expiry, "Using stored access token");
                return Ok((token, record));
            }
        }
        tracing::debug!(expiry = record.token_expiry, now, "Stored access token absent or expired, renewing");

        let renewed = self.renew(name, record).await?;
        let token = renewed.access_token.clone().ok_or_else(|| TokenError::Renewal {
            body: "renewed record missing access token".to_string(),
        })?;
        Ok((token, renewed))
    }

    /// Exchange the refresh credential for a new access token and persist the
    /// updated record.
    ///
    /// The expiry is stamped as renewal-time plus the granted lifetime
    /// (`expires_in`, defaulting to 3600 seconds when the grant omits it).
    pub async fn renew(&self, name: &str, mut record: CredentialRecord) -> Result<CredentialRecord> {
        let params = [
            ("refresh_token", record.refresh_token.as_str()),
            ("grant_type", "refresh_token"),
            ("client_id", record.client_id.as_str()),
            ("client_secret", record.client_secret.as_str()),
            ("redirect_uri", self.redirect_uri.as_str()),
        ];

        let response = self.http.post(self.token_url.clone()).form(&params).send().await?;
        let status = response.status();
        let body = response.text().await?;

        // The grant contract is exactly HTTP 200 with a JSON body; any other
        // status (even an anomalous 2xx) is a renewal failure
        if status != reqwest::StatusCode::OK {
            tracing::warn!(status = status.as_u16(), "Refresh grant rejected by token endpoint");
            return Err(TokenError::Renewal { body });
        }

        let grant: GrantResponse = serde_json::from_str(&body).map_err(|_| TokenError::Renewal { body: body.clone() })?;
        let Some(access_token) = grant.access_token else {
            tracing::warn!("Grant response missing access_token");
            return Err(TokenError::Renewal { body });
        };

        let expires_in = grant.expires_in.unwrap_or(DEFAULT_EXPIRES_IN);
        record.access_token = Some(access_token);
        record.token_expiry = Some(Utc::now().timestamp() + expires_in);

        self.store.save(name, &record).await?;
        tracing::info!(expires_in, "Renewed access token and persisted record");
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secrets::{MemoryStore, test_record};
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const NAME: &str = "integration";

    fn manager(server: &MockServer, store: Arc<MemoryStore>) -> TokenManager {
        TokenManager::new(
            reqwest::Client::new(),
            store,
            Url::parse(&format!("{}/oauth/v2/token", server.uri())).expect("mock url"),
            "https://relay.example.com/callback".to_string(),
        )
    }

    #[tokio::test]
    async fn missing_token_triggers_exactly_one_renewal() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/v2/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains("refresh_token=1000.refresh.abc"))
            .and(body_string_contains("client_id=1000.CLIENTID"))
            .and(body_string_contains("client_secret=clientsecret"))
            .and(body_string_contains("redirect_uri="))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "fresh-token",
                "expires_in": 600
            })))
            .expect(1)
            .mount(&server)
            .await;

        let store = Arc::new(MemoryStore::with_record(NAME, test_record()));
        let manager = manager(&server, store.clone());

        let before = Utc::now().timestamp();
        let (token, record) = manager.get_valid_token(NAME).await.expect("renewal succeeds");
        assert_eq!(token, "fresh-token");

        // Renewed record was persisted with expiry = renewal time + expires_in
        let stored = store.load(NAME).await.expect("record persisted");
        assert_eq!(stored, record);
        assert_eq!(stored.access_token.as_deref(), Some("fresh-token"));
        let expiry = stored.token_expiry.expect("expiry stamped");
        assert!(expiry >= before + 600 && expiry <= Utc::now().timestamp() + 600);
    }

    #[tokio::test]
    async fn expired_token_is_renewed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "fresh-token",
                "expires_in": 3600
            })))
            .expect(1)
            .mount(&server)
            .await;

        let expired = CredentialRecord {
            access_token: Some("stale-token".to_string()),
            token_expiry: Some(Utc::now().timestamp() - 60),
            ..test_record()
        };
        let store = Arc::new(MemoryStore::with_record(NAME, expired));
        let manager = manager(&server, store.clone());

        let (token, _) = manager.get_valid_token(NAME).await.expect("renewal succeeds");
        assert_eq!(token, "fresh-token");
    }

    #[tokio::test]
    async fn unexpired_token_never_hits_the_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let expiry = Utc::now().timestamp() + 3600;
        let valid = CredentialRecord {
            access_token: Some("still-good".to_string()),
            token_expiry: Some(expiry),
            ..test_record()
        };
        let store = Arc::new(MemoryStore::with_record(NAME, valid.clone()));
        let manager = manager(&server, store);

        let (token, record) = manager.get_valid_token(NAME).await.expect("no renewal needed");
        assert_eq!(token, "still-good");
        assert_eq!(record, valid, "record returned unchanged");
    }

    #[tokio::test]
    async fn missing_expires_in_defaults_to_an_hour() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "fresh-token"
            })))
            .mount(&server)
            .await;

        let store = Arc::new(MemoryStore::with_record(NAME, test_record()));
        let manager = manager(&server, store.clone());

        let before = Utc::now().timestamp();
        manager.get_valid_token(NAME).await.expect("renewal succeeds");

        let stored = store.load(NAME).await.expect("record persisted");
        let expiry = stored.token_expiry.expect("expiry stamped");
        assert!(expiry >= before + 3600 && expiry <= Utc::now().timestamp() + 3600);
    }

    #[tokio::test]
    async fn rejected_grant_carries_the_raw_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string(r#"{"error":"invalid_token"}"#))
            .mount(&server)
            .await;

        let store = Arc::new(MemoryStore::with_record(NAME, test_record()));
        let manager = manager(&server, store.clone());

        let err = manager.get_valid_token(NAME).await.expect_err("renewal should fail");
        match err {
            TokenError::Renewal { body } => assert!(body.contains("invalid_token")),
            other => panic!("expected Renewal error, got {other:?}"),
        }

        // Failed renewal persists nothing
        let stored = store.load(NAME).await.expect("record still present");
        assert!(stored.access_token.is_none());
    }

    #[tokio::test]
    async fn expiry_equal_to_now_triggers_renewal() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "fresh-token",
                "expires_in": 3600
            })))
            .expect(1)
            .mount(&server)
            .await;

        // expiry <= now counts as expired; the clock only moves forward, so a
        // record stamped with the current second must renew
        let boundary = CredentialRecord {
            access_token: Some("stale-token".to_string()),
            token_expiry: Some(Utc::now().timestamp()),
            ..test_record()
        };
        let store = Arc::new(MemoryStore::with_record(NAME, boundary));
        let manager = manager(&server, store);

        let (token, _) = manager.get_valid_token(NAME).await.expect("renewal succeeds");
        assert_eq!(token, "fresh-token");
    }

    #[tokio::test]
    async fn non_200_success_status_is_a_renewal_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let store = Arc::new(MemoryStore::with_record(NAME, test_record()));
        let manager = manager(&server, store.clone());

        let err = manager.get_valid_token(NAME).await.expect_err("renewal should fail");
        assert!(matches!(err, TokenError::Renewal { .. }));

        // Nothing was persisted
        let stored = store.load(NAME).await.expect("record still present");
        assert!(stored.access_token.is_none());
    }

    #[tokio::test]
    async fn success_without_access_token_is_a_renewal_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"error":"invalid_client"}"#))
            .mount(&server)
            .await;

        let store = Arc::new(MemoryStore::with_record(NAME, test_record()));
        let manager = manager(&server, store);

        let err = manager.get_valid_token(NAME).await.expect_err("renewal should fail");
        assert!(matches!(err, TokenError::Renewal { .. }));
    }

    #[tokio::test]
    async fn missing_record_surfaces_store_error() {
        let server = MockServer::start().await;
        let store = Arc::new(MemoryStore::new());
        let manager = manager(&server, store);

        let err = manager.get_valid_token(NAME).await.expect_err("load should fail");
        assert!(matches!(err, TokenError::Store(SecretError::NotFound { .. })));
    }

    #[tokio::test]
    async fn renewal_strictly_increases_expiry() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "fresh-token",
                "expires_in": 3600
            })))
            .mount(&server)
            .await;

        let old_expiry = Utc::now().timestamp() - 10;
        let expired = CredentialRecord {
            access_token: Some("stale-token".to_string()),
            token_expiry: Some(old_expiry),
            ..test_record()
        };
        let store = Arc::new(MemoryStore::with_record(NAME, expired));
        let manager = manager(&server, store.clone());

        manager.get_valid_token(NAME).await.expect("renewal succeeds");
        let stored = store.load(NAME).await.expect("record persisted");
        assert!(stored.token_expiry.expect("expiry stamped") > old_expiry);
    }
}
