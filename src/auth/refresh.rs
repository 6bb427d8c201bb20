//! Access token refresh
//!
//! Runs on its own reqwest client so a failing refresh can never loop back
//! through the 401 handling of the main client.

use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use super::tokens::{TokenRecord, TokenStore};
use crate::api::client::unwrap_data;
use crate::models::User;

/// Lifetime assumed when `/refresh` does not say.
pub const DEFAULT_REFRESH_EXPIRES_IN: u64 = 3600;

/// Why a refresh failed. Cloneable so every waiter gets its own copy.
#[derive(Debug, Clone, Error)]
pub enum RefreshError {
    #[error("no refresh token stored")]
    MissingRefreshToken,
    #[error("refresh request failed: {0}")]
    Transport(String),
    #[error("refresh rejected (HTTP {status}): {body}")]
    Rejected { status: u16, body: String },
    #[error("invalid refresh response: {0}")]
    InvalidResponse(String),
}

/// Token fields of a `/login` or `/refresh` response. Everything is optional
/// here; callers decide which fallbacks apply.
#[derive(Debug, Default, Deserialize)]
pub struct TokenPayload {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_in: Option<u64>,
    pub user: Option<User>,
}

impl TokenPayload {
    /// Parse a payload that may or may not be wrapped in a `data` envelope.
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(unwrap_data(value))
    }

    /// Non-empty access token, if the server sent one.
    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref().filter(|t| !t.is_empty())
    }

    /// Non-empty refresh token, if the server sent one.
    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref().filter(|t| !t.is_empty())
    }

    /// Token lifetime; zero counts as not given.
    pub fn expires_in(&self) -> Option<u64> {
        self.expires_in.filter(|&secs| secs > 0)
    }
}

#[derive(Clone)]
pub struct Refresher {
    http: reqwest::Client,
    url: String,
}

impl Refresher {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            url: format!("{}/refresh", base_url.trim_end_matches('/')),
        })
    }

    /// Exchange the stored refresh token for a new access token.
    ///
    /// On any failure the token store is cleared before the error is returned.
    pub async fn refresh(&self, store: &TokenStore) -> Result<String, RefreshError> {
        let result = self.exchange(store).await;
        match &result {
            Ok(_) => tracing::info!("Access token refreshed"),
            Err(e) => {
                tracing::warn!("Token refresh failed: {}", e);
                store.clear_tokens();
            }
        }
        result
    }

    async fn exchange(&self, store: &TokenStore) -> Result<String, RefreshError> {
        let refresh_token = store
            .refresh_token()
            .ok_or(RefreshError::MissingRefreshToken)?;

        tracing::info!("Refreshing access token...");
        tracing::debug!("POST {}", self.url);

        let resp = self
            .http
            .post(&self.url)
            .json(&serde_json::json!({ "refresh_token": refresh_token }))
            .send()
            .await
            .map_err(|e| RefreshError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(RefreshError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let value: Value = resp
            .json()
            .await
            .map_err(|e| RefreshError::InvalidResponse(e.to_string()))?;
        let payload =
            TokenPayload::from_value(value).map_err(|e| RefreshError::InvalidResponse(e.to_string()))?;

        let access_token = payload
            .access_token()
            .ok_or_else(|| RefreshError::InvalidResponse("missing access_token".to_string()))?
            .to_string();

        store.set_tokens(&TokenRecord {
            access_token: access_token.clone(),
            refresh_token: payload
                .refresh_token()
                .map(String::from)
                .unwrap_or(refresh_token),
            expires_in: payload.expires_in().unwrap_or(DEFAULT_REFRESH_EXPIRES_IN),
        });

        Ok(access_token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::tokens::unix_now;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn store_with_refresh(refresh: &str) -> TokenStore {
        let store = TokenStore::in_memory();
        store.set_tokens(&TokenRecord {
            access_token: "stale".to_string(),
            refresh_token: refresh.to_string(),
            expires_in: 3600,
        });
        store
    }

    fn refresher(server: &MockServer) -> Refresher {
        Refresher::new(&server.uri(), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_refresh_stores_new_tokens() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/refresh"))
            .and(body_json(json!({ "refresh_token": "r1" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "a2",
                "refresh_token": "r2",
                "expires_in": 600
            })))
            .expect(1)
            .mount(&server)
            .await;

        let store = store_with_refresh("r1");
        let token = refresher(&server).refresh(&store).await.unwrap();

        assert_eq!(token, "a2");
        assert_eq!(store.access_token().as_deref(), Some("a2"));
        assert_eq!(store.refresh_token().as_deref(), Some("r2"));
        let expires_at = store.expires_at().unwrap();
        assert!(expires_at >= unix_now() + 590 && expires_at <= unix_now() + 600);
    }

    #[tokio::test]
    async fn test_refresh_falls_back_to_previous_refresh_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/refresh"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "data": { "access_token": "a2" } })),
            )
            .mount(&server)
            .await;

        let store = store_with_refresh("r1");
        refresher(&server).refresh(&store).await.unwrap();

        assert_eq!(store.access_token().as_deref(), Some("a2"));
        assert_eq!(store.refresh_token().as_deref(), Some("r1"));
        let expires_at = store.expires_at().unwrap();
        assert!(expires_at + 10 >= unix_now() + DEFAULT_REFRESH_EXPIRES_IN);
    }

    #[tokio::test]
    async fn test_refresh_ignores_empty_refresh_token_and_zero_lifetime() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/refresh"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "a2",
                "refresh_token": "",
                "expires_in": 0
            })))
            .mount(&server)
            .await;

        let store = store_with_refresh("r1");
        refresher(&server).refresh(&store).await.unwrap();

        assert_eq!(store.refresh_token().as_deref(), Some("r1"));
        assert!(store.is_authenticated());
        let expires_at = store.expires_at().unwrap();
        assert!(expires_at + 10 >= unix_now() + DEFAULT_REFRESH_EXPIRES_IN);
        assert!(expires_at <= unix_now() + DEFAULT_REFRESH_EXPIRES_IN);
    }

    #[tokio::test]
    async fn test_refresh_without_refresh_token_clears_store() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/refresh"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let store = store_with_refresh("");
        let err = refresher(&server).refresh(&store).await.unwrap_err();

        assert!(matches!(err, RefreshError::MissingRefreshToken));
        assert!(store.access_token().is_none());
    }

    #[tokio::test]
    async fn test_refresh_rejected_clears_store() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/refresh"))
            .respond_with(ResponseTemplate::new(401).set_body_string("refresh token revoked"))
            .mount(&server)
            .await;

        let store = store_with_refresh("r1");
        let err = refresher(&server).refresh(&store).await.unwrap_err();

        match err {
            RefreshError::Rejected { status, body } => {
                assert_eq!(status, 401);
                assert_eq!(body, "refresh token revoked");
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(store.access_token().is_none());
        assert!(store.refresh_token().is_none());
    }

    #[tokio::test]
    async fn test_refresh_malformed_payload_clears_store() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/refresh"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "token": "nope" })))
            .mount(&server)
            .await;

        let store = store_with_refresh("r1");
        let err = refresher(&server).refresh(&store).await.unwrap_err();

        assert!(matches!(err, RefreshError::InvalidResponse(_)));
        assert!(store.refresh_token().is_none());
    }

    #[test]
    fn test_payload_envelope_unwrapped() {
        let payload = TokenPayload::from_value(json!({
            "data": { "access_token": "a", "expires_in": 10 }
        }))
        .unwrap();
        assert_eq!(payload.access_token(), Some("a"));
        assert_eq!(payload.expires_in, Some(10));

        let bare = TokenPayload::from_value(json!({ "access_token": "" })).unwrap();
        assert_eq!(bare.access_token(), None);
    }
}
