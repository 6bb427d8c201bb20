//! Authenticated HTTP client for the recruiting backend
//!
//! Wraps reqwest::Client with bearer token injection and recovery from 401:
//! the first request to see a 401 starts a refresh, every other request that
//! fails meanwhile waits on that same refresh, and all of them are replayed
//! once with the new token.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use futures::future::{AbortHandle, Abortable, BoxFuture, FutureExt, Shared};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::multipart::{Form, Part};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::auth::{RefreshError, Refresher, TokenStore};
use crate::config::{Config, Timeouts};
use crate::router::{Navigator, Route};

type RefreshFuture = Shared<BoxFuture<'static, Result<String, RefreshError>>>;

/// The refresh in flight, plus whether its failure must send the user to
/// the login route. The flag is set by any request-path caller that joins.
struct InflightRefresh {
    future: RefreshFuture,
    redirect: Arc<AtomicBool>,
}

/// Errors surfaced by [`ApiClient`].
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{method} {url} failed: {source}")]
    Transport {
        method: Method,
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP {status} for {url}: {body}")]
    Status {
        status: u16,
        url: String,
        body: String,
    },

    /// 401 that is not (or no longer) recoverable by a refresh.
    #[error("401 Unauthorized for {url}")]
    Unauthorized { url: String, body: String },

    #[error("Session expired: {0}")]
    SessionExpired(#[source] RefreshError),

    /// A newer poll of the same endpoint replaced this one.
    #[error("Poll of {0} superseded by a newer one")]
    Cancelled(String),

    #[error("Failed to decode response from {url}: {message}")]
    Decode { url: String, message: String },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ApiError {
    /// HTTP status the server answered with, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Unauthorized { .. } => Some(StatusCode::UNAUTHORIZED.as_u16()),
            _ => None,
        }
    }

    /// Response body text of a failed request, if any.
    pub fn body(&self) -> Option<&str> {
        match self {
            Self::Status { body, .. } | Self::Unauthorized { body, .. } => Some(body),
            _ => None,
        }
    }
}

/// Timeout class of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// User-initiated calls.
    Interactive,
    /// Uploads and downloads.
    Transfer,
    /// Background list refreshes; fail fast.
    Polling,
}

/// One field of a multipart form.
#[derive(Debug, Clone)]
pub enum FormPart {
    Text {
        name: String,
        value: String,
    },
    File {
        name: String,
        file_name: String,
        mime: String,
        bytes: Vec<u8>,
    },
}

#[derive(Debug, Clone)]
pub enum RequestBody {
    Empty,
    Json(Value),
    /// Kept as raw parts so the form can be rebuilt on replay.
    Multipart(Vec<FormPart>),
}

/// A request description that can be sent, and re-sent, by [`ApiClient`].
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    path: String,
    body: RequestBody,
    kind: RequestKind,
    refresh_on_401: bool,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: RequestBody::Empty,
            kind: RequestKind::Interactive,
            refresh_on_401: true,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = RequestBody::Json(body);
        self
    }

    pub fn multipart(mut self, parts: Vec<FormPart>) -> Self {
        self.body = RequestBody::Multipart(parts);
        self
    }

    pub fn kind(mut self, kind: RequestKind) -> Self {
        self.kind = kind;
        self
    }

    /// Treat a 401 as final: no refresh, no replay.
    pub fn without_refresh(mut self) -> Self {
        self.refresh_on_401 = false;
        self
    }
}

/// Unwrap a `{ "data": ... }` envelope. Objects that already look like a
/// payload (they carry `id` or `access_token`) are returned untouched.
pub fn unwrap_data(mut value: Value) -> Value {
    let wrapped = match &value {
        Value::Object(map) => {
            !map.contains_key("id")
                && !map.contains_key("access_token")
                && matches!(map.get("data"), Some(Value::Object(_) | Value::Array(_)))
        }
        _ => false,
    };
    if wrapped {
        value["data"].take()
    } else {
        value
    }
}

/// Authenticated client. Constructed once and shared behind an `Arc`.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    timeouts: Timeouts,
    store: Arc<TokenStore>,
    refresher: Refresher,
    navigator: Arc<dyn Navigator>,
    /// The refresh currently in flight, if any.
    inflight: Arc<Mutex<Option<InflightRefresh>>>,
    /// Outstanding polls per endpoint key, tagged with a generation.
    polls: Mutex<HashMap<String, (u64, AbortHandle)>>,
    poll_seq: AtomicU64,
}

impl ApiClient {
    pub fn new(
        config: &Config,
        store: Arc<TokenStore>,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .context("Failed to build HTTP client")?;
        let base_url = config.base_url.trim_end_matches('/').to_string();
        let refresher = Refresher::new(&base_url, config.timeouts.refresh())
            .context("Failed to build refresh client")?;

        Ok(Self {
            http,
            base_url,
            timeouts: config.timeouts,
            store,
            refresher,
            navigator,
            inflight: Arc::new(Mutex::new(None)),
            polls: Mutex::new(HashMap::new()),
            poll_seq: AtomicU64::new(0),
        })
    }

    pub fn token_store(&self) -> &Arc<TokenStore> {
        &self.store
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send a request, recovering from a 401 with at most one refresh and
    /// one replay. Non-2xx answers come back as [`ApiError::Status`].
    pub async fn send(&self, request: &ApiRequest) -> Result<reqwest::Response, ApiError> {
        let url = self.url(&request.path);
        let mut token = self.store.valid_access_token();
        let mut retried = false;

        loop {
            let resp = self.dispatch(request, &url, token.as_deref()).await?;
            if resp.status() != StatusCode::UNAUTHORIZED {
                return check_response(resp, &url).await;
            }

            let body = resp.text().await.unwrap_or_default();
            if !request.refresh_on_401 || retried {
                tracing::warn!("401 Unauthorized for {}", url);
                return Err(ApiError::Unauthorized { url, body });
            }
            retried = true;

            // Another request may already have replaced the token we sent.
            token = match self.store.valid_access_token() {
                Some(current) if token.as_ref() != Some(&current) => {
                    tracing::debug!("Token changed while {} was in flight, replaying", url);
                    Some(current)
                }
                _ => {
                    tracing::info!("401 for {}, refreshing session...", url);
                    Some(self.refresh_after_401().await?)
                }
            };
        }
    }

    /// Send and decode a JSON response, unwrapping a `data` envelope.
    pub async fn send_json<T: DeserializeOwned>(&self, request: &ApiRequest) -> Result<T, ApiError> {
        let resp = self.send(request).await?;
        decode_json(resp).await
    }

    /// Send a background poll. A newer poll with the same `key` cancels this
    /// one, so at most one poll per endpoint is outstanding.
    pub async fn poll(&self, key: &str, request: &ApiRequest) -> Result<reqwest::Response, ApiError> {
        let (handle, registration) = AbortHandle::new_pair();
        let generation = self.poll_seq.fetch_add(1, Ordering::Relaxed);
        {
            let mut polls = self.polls.lock().unwrap_or_else(|e| e.into_inner());
            if let Some((_, previous)) = polls.insert(key.to_string(), (generation, handle)) {
                tracing::debug!("Cancelling in-flight poll for {}", key);
                previous.abort();
            }
        }

        let request = request.clone().kind(RequestKind::Polling);
        let outcome = Abortable::new(self.send(&request), registration).await;

        {
            let mut polls = self.polls.lock().unwrap_or_else(|e| e.into_inner());
            if polls.get(key).is_some_and(|(g, _)| *g == generation) {
                polls.remove(key);
            }
        }

        match outcome {
            Ok(result) => result,
            Err(_aborted) => Err(ApiError::Cancelled(key.to_string())),
        }
    }

    pub async fn poll_json<T: DeserializeOwned>(
        &self,
        key: &str,
        request: &ApiRequest,
    ) -> Result<T, ApiError> {
        let resp = self.poll(key, request).await?;
        decode_json(resp).await
    }

    /// Join (or start) the shared refresh without any navigation side effect.
    pub async fn refresh_session(&self) -> Result<String, RefreshError> {
        self.join_refresh(false).await
    }

    async fn refresh_after_401(&self) -> Result<String, ApiError> {
        self.join_refresh(true)
            .await
            .map_err(ApiError::SessionExpired)
    }

    /// Returns the in-flight refresh, starting one if there is none.
    ///
    /// With `redirect` set, a failed refresh signals the login route once,
    /// from the refresh itself, so it does not depend on which waiter is
    /// still around to see the failure.
    fn join_refresh(&self, redirect: bool) -> RefreshFuture {
        let mut slot = self.inflight.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(existing) = slot.as_ref() {
            tracing::debug!("Refresh already in flight, waiting on it");
            if redirect {
                existing.redirect.store(true, Ordering::SeqCst);
            }
            return existing.future.clone();
        }

        let refresher = self.refresher.clone();
        let store = Arc::clone(&self.store);
        let navigator = Arc::clone(&self.navigator);
        let inflight = Arc::clone(&self.inflight);
        let wants_redirect = Arc::new(AtomicBool::new(redirect));
        let flag = Arc::clone(&wants_redirect);
        let refresh = async move {
            let result = refresher.refresh(&store).await;
            // Back to idle before any waiter resumes. Joiners set the flag
            // under this lock, so it is final once the slot is cleared.
            inflight.lock().unwrap_or_else(|e| e.into_inner()).take();
            if result.is_err() && flag.load(Ordering::SeqCst) {
                redirect_to_login(navigator.as_ref());
            }
            result
        }
        .boxed()
        .shared();

        *slot = Some(InflightRefresh {
            future: refresh.clone(),
            redirect: wants_redirect,
        });
        refresh
    }

    async fn dispatch(
        &self,
        request: &ApiRequest,
        url: &str,
        token: Option<&str>,
    ) -> Result<reqwest::Response, ApiError> {
        let mut builder = self
            .http
            .request(request.method.clone(), url)
            .timeout(self.timeouts.for_kind(request.kind));

        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }

        builder = match &request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(body) => builder.json(body),
            RequestBody::Multipart(parts) => builder.multipart(build_form(parts)?),
        };

        tracing::debug!(
            "{} {} (auth: {})",
            request.method,
            url,
            if token.is_some() { "Bearer ***" } else { "Not set" }
        );

        let resp = builder
            .send()
            .await
            .map_err(|source| ApiError::Transport {
                method: request.method.clone(),
                url: url.to_string(),
                source,
            })?;

        tracing::debug!("{} {} -> {}", request.method, url, resp.status().as_u16());
        Ok(resp)
    }
}

fn redirect_to_login(navigator: &dyn Navigator) {
    if navigator.current_route() != Some(Route::Login) {
        navigator.navigate(Route::Login);
    }
}

fn build_form(parts: &[FormPart]) -> Result<Form, ApiError> {
    let mut form = Form::new();
    for part in parts {
        form = match part {
            FormPart::Text { name, value } => form.text(name.clone(), value.clone()),
            FormPart::File {
                name,
                file_name,
                mime,
                bytes,
            } => {
                let file = Part::bytes(bytes.clone())
                    .file_name(file_name.clone())
                    .mime_str(mime)
                    .map_err(|e| ApiError::InvalidRequest(format!("{}: {}", file_name, e)))?;
                form.part(name.clone(), file)
            }
        };
    }
    Ok(form)
}

/// Turn a non-2xx response into an error carrying the response text.
async fn check_response(resp: reqwest::Response, url: &str) -> Result<reqwest::Response, ApiError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(ApiError::Status {
            status: status.as_u16(),
            url: url.to_string(),
            body,
        });
    }
    Ok(resp)
}

async fn decode_json<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, ApiError> {
    let url = resp.url().to_string();
    let value: Value = resp.json().await.map_err(|e| ApiError::Decode {
        url: url.clone(),
        message: e.to_string(),
    })?;
    serde_json::from_value(unwrap_data(value)).map_err(|e| ApiError::Decode {
        url,
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::tokens::TokenRecord;
    use crate::router::RecordingNavigator;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn store_with(access: &str, refresh: &str) -> Arc<TokenStore> {
        let store = Arc::new(TokenStore::in_memory());
        store.set_tokens(&TokenRecord {
            access_token: access.to_string(),
            refresh_token: refresh.to_string(),
            expires_in: 3600,
        });
        store
    }

    fn client_for(
        server: &MockServer,
        store: Arc<TokenStore>,
    ) -> (ApiClient, Arc<RecordingNavigator>) {
        let config = Config {
            base_url: server.uri(),
            ..Config::default()
        };
        let navigator = Arc::new(RecordingNavigator::default());
        let client = ApiClient::new(&config, store, navigator.clone()).unwrap();
        (client, navigator)
    }

    async fn mount_refresh(server: &MockServer, new_token: &str, calls: u64) {
        Mock::given(method("POST"))
            .and(path("/refresh"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({
                        "access_token": new_token,
                        "refresh_token": "r2",
                        "expires_in": 3600
                    }))
                    .set_delay(Duration::from_millis(100)),
            )
            .expect(calls)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_attaches_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/vacancies"))
            .and(header("authorization", "Bearer a1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let (client, _) = client_for(&server, store_with("a1", "r1"));
        let resp = client.send(&ApiRequest::get("/vacancies")).await;
        assert!(resp.is_ok());
    }

    #[tokio::test]
    async fn test_no_authorization_without_valid_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/vacancies"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let store = Arc::new(TokenStore::in_memory());
        store.set_tokens_at(
            &TokenRecord {
                access_token: "expired".to_string(),
                refresh_token: "r1".to_string(),
                expires_in: 3600,
            },
            0,
        );
        let (client, _) = client_for(&server, store);
        client.send(&ApiRequest::get("/vacancies")).await.unwrap();

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].headers.get("authorization").is_none());
    }

    #[tokio::test]
    async fn test_concurrent_401s_share_one_refresh() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/candidates"))
            .and(header("authorization", "Bearer old"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/candidates"))
            .and(header("authorization", "Bearer new"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(5)
            .mount(&server)
            .await;
        mount_refresh(&server, "new", 1).await;

        let store = store_with("old", "r1");
        let (client, navigator) = client_for(&server, store.clone());

        let request = ApiRequest::get("/candidates");
        let results =
            futures::future::join_all((0..5).map(|_| client.send(&request))).await;

        for result in results {
            assert_eq!(result.unwrap().status().as_u16(), 200);
        }
        assert_eq!(store.access_token().as_deref(), Some("new"));
        assert_eq!(store.refresh_token().as_deref(), Some("r2"));
        assert!(navigator.visits().is_empty());
    }

    #[tokio::test]
    async fn test_second_401_after_retry_propagates() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/vacancies"))
            .respond_with(ResponseTemplate::new(401).set_body_string("still no"))
            .expect(2)
            .mount(&server)
            .await;
        mount_refresh(&server, "new", 1).await;

        let (client, _) = client_for(&server, store_with("old", "r1"));
        let err = client.send(&ApiRequest::get("/vacancies")).await.unwrap_err();

        match err {
            ApiError::Unauthorized { body, .. } => assert_eq!(body, "still no"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_refresh_failure_rejects_all_and_redirects_once() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/candidates"))
            .respond_with(ResponseTemplate::new(401))
            .expect(3)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/refresh"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_string("bad refresh token")
                    .set_delay(Duration::from_millis(100)),
            )
            .expect(1)
            .mount(&server)
            .await;

        let store = store_with("old", "r1");
        let (client, navigator) = client_for(&server, store.clone());

        let request = ApiRequest::get("/candidates");
        let results =
            futures::future::join_all((0..3).map(|_| client.send(&request))).await;

        for result in results {
            assert!(matches!(result, Err(ApiError::SessionExpired(_))));
        }
        assert!(store.access_token().is_none());
        assert!(store.refresh_token().is_none());
        assert_eq!(navigator.visits(), vec![Route::Login]);
    }

    #[tokio::test]
    async fn test_refresh_failure_redirects_after_starting_poll_is_superseded() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/candidates"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/refresh"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_string("bad refresh token")
                    .set_delay(Duration::from_millis(300)),
            )
            .expect(1)
            .mount(&server)
            .await;

        let (client, navigator) = client_for(&server, store_with("old", "r1"));
        let request = ApiRequest::get("/candidates");

        let (first, second) = tokio::join!(client.poll("candidates", &request), async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            client.poll("candidates", &request).await
        });

        assert!(matches!(first, Err(ApiError::Cancelled(_))));
        assert!(matches!(second, Err(ApiError::SessionExpired(_))));
        assert_eq!(navigator.visits(), vec![Route::Login]);
    }

    #[tokio::test]
    async fn test_session_refresh_failure_does_not_redirect() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/refresh"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;

        let (client, navigator) = client_for(&server, store_with("old", "r1"));
        assert!(client.refresh_session().await.is_err());
        assert!(navigator.visits().is_empty());
        assert!(client.inflight.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_401_without_refresh_token_does_not_call_refresh() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/me"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;
        mount_refresh(&server, "new", 0).await;

        let (client, navigator) = client_for(&server, Arc::new(TokenStore::in_memory()));
        let err = client.send(&ApiRequest::get("/me")).await.unwrap_err();

        assert!(matches!(
            err,
            ApiError::SessionExpired(RefreshError::MissingRefreshToken)
        ));
        assert_eq!(navigator.visits(), vec![Route::Login]);
    }

    #[tokio::test]
    async fn test_no_redirect_when_already_on_login() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/me"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let (client, navigator) = client_for(&server, Arc::new(TokenStore::in_memory()));
        navigator.navigate(Route::Login);
        let _ = client.send(&ApiRequest::get("/me")).await;

        assert_eq!(navigator.visits(), vec![Route::Login]);
    }

    #[tokio::test]
    async fn test_without_refresh_skips_interception() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/login"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad credentials"))
            .expect(1)
            .mount(&server)
            .await;
        mount_refresh(&server, "new", 0).await;

        let (client, navigator) = client_for(&server, store_with("old", "r1"));
        let err = client
            .send(&ApiRequest::post("/login").json(json!({})).without_refresh())
            .await
            .unwrap_err();

        assert_eq!(err.status(), Some(401));
        assert_eq!(err.body(), Some("bad credentials"));
        assert!(navigator.visits().is_empty());
    }

    #[tokio::test]
    async fn test_non_401_error_propagates_unchanged() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/candidate/7"))
            .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
            .mount(&server)
            .await;
        mount_refresh(&server, "new", 0).await;

        let (client, _) = client_for(&server, store_with("a1", "r1"));
        let err = client
            .send(&ApiRequest::delete("/candidate/7"))
            .await
            .unwrap_err();

        match err {
            ApiError::Status { status, body, .. } => {
                assert_eq!(status, 404);
                assert_eq!(body, "not found");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_transport_error_propagates() {
        let config = Config {
            base_url: "http://127.0.0.1:9".to_string(),
            ..Config::default()
        };
        let navigator = Arc::new(RecordingNavigator::default());
        let client = ApiClient::new(&config, store_with("a1", "r1"), navigator).unwrap();

        let err = client.send(&ApiRequest::get("/vacancies")).await.unwrap_err();
        assert!(matches!(err, ApiError::Transport { .. }));
    }

    #[tokio::test]
    async fn test_multipart_body_is_replayed_after_refresh() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/vacancy"))
            .and(header("authorization", "Bearer old"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/vacancy"))
            .and(header("authorization", "Bearer new"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": 1 })))
            .expect(1)
            .mount(&server)
            .await;
        mount_refresh(&server, "new", 1).await;

        let (client, _) = client_for(&server, store_with("old", "r1"));
        let request = ApiRequest::post("/vacancy").multipart(vec![FormPart::File {
            name: "info_cv".to_string(),
            file_name: "cv.pdf".to_string(),
            mime: "application/pdf".to_string(),
            bytes: b"%PDF-1.4".to_vec(),
        }]);
        client.send(&request).await.unwrap();

        let requests = server.received_requests().await.unwrap();
        let replay = requests.last().unwrap();
        let body = String::from_utf8_lossy(&replay.body);
        assert!(body.contains("name=\"info_cv\""));
        assert!(body.contains("%PDF-1.4"));
    }

    #[tokio::test]
    async fn test_newer_poll_cancels_previous() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/candidates"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!([]))
                    .set_delay(Duration::from_millis(300)),
            )
            .mount(&server)
            .await;

        let (client, _) = client_for(&server, store_with("a1", "r1"));
        let request = ApiRequest::get("/candidates");

        let (first, second) = tokio::join!(client.poll("candidates", &request), async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            client.poll("candidates", &request).await
        });

        assert!(matches!(first, Err(ApiError::Cancelled(_))));
        assert!(second.is_ok());
        assert!(client.polls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_polls_of_different_endpoints_coexist() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!([]))
                    .set_delay(Duration::from_millis(100)),
            )
            .mount(&server)
            .await;

        let (client, _) = client_for(&server, store_with("a1", "r1"));
        let vacancies_request = ApiRequest::get("/vacancies");
        let candidates_request = ApiRequest::get("/candidates");
        let (vacancies, candidates) = tokio::join!(
            client.poll("vacancies", &vacancies_request),
            client.poll("candidates", &candidates_request),
        );
        assert!(vacancies.is_ok());
        assert!(candidates.is_ok());
    }

    #[test]
    fn test_unwrap_data_envelope() {
        assert_eq!(unwrap_data(json!({ "data": [1, 2] })), json!([1, 2]));
        assert_eq!(unwrap_data(json!([1])), json!([1]));
        assert_eq!(
            unwrap_data(json!({ "id": 1, "data": { "x": 1 } })),
            json!({ "id": 1, "data": { "x": 1 } })
        );
        assert_eq!(
            unwrap_data(json!({ "data": "plain", "success": true })),
            json!({ "data": "plain", "success": true })
        );
    }
}
