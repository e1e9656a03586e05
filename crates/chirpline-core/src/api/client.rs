//! API client for communicating with the Chirpline REST API.
//!
//! Every call goes through [`ApiClient::execute`], which plays the part of a
//! request/response interceptor pair:
//!
//! - before sending, the access token from the [`TokenStore`] (if any) is
//!   attached as a bearer credential;
//! - after a 401, a request that has not been retried yet exchanges the
//!   refresh token for a new access token and is resubmitted exactly once.
//!   If the refresh fails both tokens are cleared and
//!   [`AuthEvent::SignInRequired`] is broadcast.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use crate::auth::{AuthEvent, TokenStore};
use crate::models::{RefreshRequest, RefreshResponse, TokenPair};

use super::request::{ApiRequest, RequestBody};
use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// HTTP request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Endpoint exchanging a refresh token for a new access token
pub(crate) const TOKEN_REFRESH_PATH: &str = "/users/token/refresh/";

/// Capacity of the auth event channel. Events are rare; a lagging
/// subscriber only needs to learn that sign-in is required.
const AUTH_EVENT_CAPACITY: usize = 16;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeout: Duration,
    /// Share one in-flight refresh between requests that hit 401 together
    pub coalesce_refresh: bool,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
            coalesce_refresh: false,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_coalesced_refresh(mut self, coalesce: bool) -> Self {
        self.coalesce_refresh = coalesce;
        self
    }
}

/// API client for the Chirpline backend.
/// Clone is cheap - reqwest::Client and the token store are reference counted,
/// and clones share the same event channel and refresh gate.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    tokens: Arc<dyn TokenStore>,
    events: broadcast::Sender<AuthEvent>,
    refresh_gate: Option<Arc<Mutex<()>>>,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(config: ClientConfig, tokens: Arc<dyn TokenStore>) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        let (events, _) = broadcast::channel(AUTH_EVENT_CAPACITY);

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            tokens,
            events,
            refresh_gate: config.coalesce_refresh.then(|| Arc::new(Mutex::new(()))),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn tokens(&self) -> &Arc<dyn TokenStore> {
        &self.tokens
    }

    /// Subscribe to authentication events (e.g. sign-in required after a
    /// failed refresh).
    pub fn subscribe_events(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: Response) -> Result<Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    /// Build and send one attempt of `request`, attaching the bearer token.
    /// Returns the response and the token that was sent.
    async fn dispatch(
        &self,
        request: &ApiRequest,
        access_override: Option<String>,
    ) -> Result<(Response, Option<String>), ApiError> {
        let url = self.url(&request.path);
        let mut builder = self.client.request(request.method.clone(), &url);

        let token = access_override.or_else(|| self.tokens.load_access());
        if let Some(ref token) = token {
            builder = builder.bearer_auth(token);
        }

        builder = match &request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(value),
            RequestBody::Multipart(parts) => builder.multipart(ApiRequest::build_form(parts)?),
        };

        let response = builder.send().await?;
        debug!(
            method = %request.method,
            path = %request.path,
            status = %response.status(),
            authenticated = token.is_some(),
            retried = request.retried,
            "Response received"
        );
        Ok((response, token))
    }

    /// Send a request through the pipeline.
    ///
    /// A 401 on a request that has not been retried, with a refresh token
    /// available, triggers one refresh and one resubmission. Every other
    /// failure comes back as the matching [`ApiError`].
    pub async fn execute(&self, mut request: ApiRequest) -> Result<Response, ApiError> {
        let (response, sent_token) = self.dispatch(&request, None).await?;

        if response.status() != StatusCode::UNAUTHORIZED
            || request.retried
            || !request.recover_unauthorized
        {
            return Self::check_response(response).await;
        }

        let Some(refresh_token) = self.tokens.load_refresh() else {
            debug!(path = %request.path, "Unauthorized with no refresh token stored");
            return Self::check_response(response).await;
        };

        request.retried = true;

        match self.obtain_fresh_access(&refresh_token, sent_token.as_deref()).await {
            Ok(access) => {
                info!(path = %request.path, "Access token refreshed, resubmitting request");
                let (retry, _) = self.dispatch(&request, Some(access)).await?;
                Self::check_response(retry).await
            }
            Err(e) => {
                debug!(path = %request.path, error = %e, "No fresh access token, returning original error");
                Self::check_response(response).await
            }
        }
    }

    /// Get a usable access token after a 401, refreshing if needed.
    ///
    /// With coalescing on, the exchange and the sign-out after a failed
    /// refresh both run under the gate.
    async fn obtain_fresh_access(
        &self,
        refresh_token: &str,
        stale_access: Option<&str>,
    ) -> Result<String, ApiError> {
        let Some(gate) = &self.refresh_gate else {
            return self.refresh_or_sign_out(refresh_token).await;
        };

        let _guard = gate.lock().await;

        // Another request may have refreshed while this one waited
        if let Some(current) = self.tokens.load_access() {
            if Some(current.as_str()) != stale_access {
                debug!("Reusing access token refreshed by a concurrent request");
                return Ok(current);
            }
        }

        match self.tokens.load_refresh() {
            Some(refresh) => self.refresh_or_sign_out(&refresh).await,
            // An earlier waiter's refresh failed and already signed out
            None => Err(ApiError::Unauthorized),
        }
    }

    /// Refresh, and on failure clear both tokens and broadcast
    /// [`AuthEvent::SignInRequired`].
    async fn refresh_or_sign_out(&self, refresh_token: &str) -> Result<String, ApiError> {
        match self.refresh_access_token(refresh_token).await {
            Ok(access) => Ok(access),
            Err(e) => {
                warn!(error = %e, "Token refresh failed, sign-in required");
                if let Err(e) = self.tokens.clear() {
                    warn!(error = %e, "Failed to clear tokens after refresh failure");
                }
                // No subscribers is fine; nobody is listening for navigation
                let _ = self.events.send(AuthEvent::SignInRequired);
                Err(e)
            }
        }
    }

    /// Exchange the refresh token for a new access token and persist it.
    /// The refresh call is sent without a bearer header.
    async fn refresh_access_token(&self, refresh_token: &str) -> Result<String, ApiError> {
        let url = self.url(TOKEN_REFRESH_PATH);
        let body = RefreshRequest {
            refresh: refresh_token.to_string(),
        };

        let response = self.client.post(&url).json(&body).send().await?;
        let response = Self::check_response(response).await?;

        let refreshed: RefreshResponse = response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse refresh response: {}", e)))?;

        if refreshed.access.is_empty() {
            return Err(ApiError::InvalidResponse(
                "Refresh response contained an empty access token".to_string(),
            ));
        }

        let persisted = match refreshed.refresh {
            Some(rotated) if !rotated.is_empty() => self.tokens.save(&TokenPair {
                access: refreshed.access.clone(),
                refresh: rotated,
            }),
            _ => self.tokens.save_access(&refreshed.access),
        };
        if let Err(e) = persisted {
            // The retry still carries the new token explicitly
            warn!(error = %e, "Failed to persist refreshed access token");
        }

        Ok(refreshed.access)
    }

    // ===== Typed helpers used by the endpoint bindings =====

    async fn parse_json<T: DeserializeOwned>(response: Response, path: &str) -> Result<T, ApiError> {
        response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse JSON response from {}: {}", path, e)))
    }

    /// Execute a request and decode its JSON body.
    pub async fn send_json<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, ApiError> {
        let path = request.path.clone();
        let response = self.execute(request).await?;
        Self::parse_json(response, &path).await
    }

    /// Execute a request whose response body is not needed.
    pub async fn send_unit(&self, request: ApiRequest) -> Result<(), ApiError> {
        self.execute(request).await.map(|_| ())
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.send_json(ApiRequest::get(path)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::MemoryTokenStore;
    use std::sync::atomic::{AtomicU32, Ordering};
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};

    fn client_with(server: &MockServer, store: Arc<MemoryTokenStore>) -> ApiClient {
        ApiClient::new(ClientConfig::new(server.uri()), store).expect("client should build")
    }

    fn stored(access: &str, refresh: &str) -> Arc<MemoryTokenStore> {
        Arc::new(MemoryTokenStore::with_pair(TokenPair {
            access: access.to_string(),
            refresh: refresh.to_string(),
        }))
    }

    // =========================================================================
    // Request interceptor
    // =========================================================================

    #[tokio::test]
    async fn test_bearer_attached_when_token_present() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/tweets/feed/"))
            .and(header("authorization", "Bearer access-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let api = client_with(&server, stored("access-1", "refresh-1"));
        let feed: Vec<serde_json::Value> = api.get("/tweets/feed/").await.unwrap();
        assert!(feed.is_empty());
    }

    #[tokio::test]
    async fn test_no_bearer_without_token() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/users/"))
            .respond_with(|req: &Request| {
                if req.headers.contains_key("authorization") {
                    ResponseTemplate::new(400)
                } else {
                    ResponseTemplate::new(200).set_body_json(serde_json::json!([]))
                }
            })
            .mount(&server)
            .await;

        let api = client_with(&server, Arc::new(MemoryTokenStore::new()));
        let users: Vec<serde_json::Value> = api.get("/users/").await.unwrap();
        assert!(users.is_empty());
    }

    #[test]
    fn test_url_joins_base_and_path() {
        let store: Arc<dyn TokenStore> = Arc::new(MemoryTokenStore::new());
        let api = ApiClient::new(ClientConfig::new("http://localhost:8001/api/"), store).unwrap();
        assert_eq!(api.base_url(), "http://localhost:8001/api");
        assert_eq!(api.url("/users/me/"), "http://localhost:8001/api/users/me/");
        assert_eq!(api.url("users/me/"), "http://localhost:8001/api/users/me/");
    }

    // =========================================================================
    // Response interceptor
    // =========================================================================

    #[tokio::test]
    async fn test_refresh_and_retry_once_on_401() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/users/me/"))
            .and(header("authorization", "Bearer expired"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/users/token/refresh/"))
            .and(body_json(serde_json::json!({"refresh": "refresh-1"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"access": "fresh"})))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/users/me/"))
            .and(header("authorization", "Bearer fresh"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": 1})))
            .expect(1)
            .mount(&server)
            .await;

        let store = stored("expired", "refresh-1");
        let api = client_with(&server, store.clone());

        let body: serde_json::Value = api.get("/users/me/").await.unwrap();
        assert_eq!(body["id"], 1);

        // New access token persisted, refresh token untouched
        assert_eq!(store.load_access().as_deref(), Some("fresh"));
        assert_eq!(store.load_refresh().as_deref(), Some("refresh-1"));
    }

    #[tokio::test]
    async fn test_next_request_uses_refreshed_token() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/users/me/"))
            .and(header("authorization", "Bearer expired"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/users/token/refresh/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"access": "fresh"})))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/users/me/"))
            .and(header("authorization", "Bearer fresh"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": 1})))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/tweets/feed/"))
            .and(header("authorization", "Bearer fresh"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let api = client_with(&server, stored("expired", "refresh-1"));
        api.get::<serde_json::Value>("/users/me/").await.unwrap();

        // Goes straight out with the new token; the refresh mock allows one call
        let feed: Vec<serde_json::Value> = api.get("/tweets/feed/").await.unwrap();
        assert!(feed.is_empty());
    }

    #[tokio::test]
    async fn test_refresh_call_is_unauthenticated() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/tweets/"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/users/token/refresh/"))
            .respond_with(|req: &Request| {
                if req.headers.contains_key("authorization") {
                    ResponseTemplate::new(500)
                } else {
                    ResponseTemplate::new(401)
                }
            })
            .expect(1)
            .mount(&server)
            .await;

        let api = client_with(&server, stored("expired", "refresh-1"));
        let err = api.get::<serde_json::Value>("/tweets/").await.unwrap_err();
        // 401 from the refresh (not 500) proves no bearer was sent
        assert!(err.is_unauthorized());
    }

    #[tokio::test]
    async fn test_second_401_not_retried_again() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/tweets/feed/"))
            .respond_with(ResponseTemplate::new(401))
            .expect(2)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/users/token/refresh/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"access": "fresh"})))
            .expect(1)
            .mount(&server)
            .await;

        let store = stored("expired", "refresh-1");
        let api = client_with(&server, store.clone());

        let err = api.get::<serde_json::Value>("/tweets/feed/").await.unwrap_err();
        assert!(err.is_unauthorized());
        // Refresh itself succeeded, so the session is kept
        assert_eq!(store.load_access().as_deref(), Some("fresh"));
    }

    #[tokio::test]
    async fn test_failed_refresh_clears_tokens_and_requires_sign_in() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/tweets/feed/"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/users/token/refresh/"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "detail": "Token is invalid or expired"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let store = stored("expired", "revoked");
        let api = client_with(&server, store.clone());
        let mut events = api.subscribe_events();

        let err = api.get::<serde_json::Value>("/tweets/feed/").await.unwrap_err();

        // Original error propagates
        assert!(err.is_unauthorized());
        assert_eq!(store.load_access(), None);
        assert_eq!(store.load_refresh(), None);
        assert_eq!(events.try_recv().unwrap(), AuthEvent::SignInRequired);
    }

    #[tokio::test]
    async fn test_401_without_refresh_token_passes_through() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/users/me/"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/users/token/refresh/"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let store = Arc::new(MemoryTokenStore::new());
        store.save_access("orphan").unwrap();
        let api = client_with(&server, store.clone());
        let mut events = api.subscribe_events();

        let err = api.get::<serde_json::Value>("/users/me/").await.unwrap_err();
        assert!(err.is_unauthorized());
        // Nothing cleared, nothing broadcast
        assert_eq!(store.load_access().as_deref(), Some("orphan"));
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_other_errors_pass_through_without_refresh() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/users/7/follow/"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "Cannot follow yourself"
            })))
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/users/token/refresh/"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let api = client_with(&server, stored("access-1", "refresh-1"));
        let err = api.send_unit(ApiRequest::post("/users/7/follow/")).await.unwrap_err();
        match err {
            ApiError::Validation(errors) => assert_eq!(errors.to_string(), "Cannot follow yourself"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_without_recovery_skips_refresh() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/users/login/"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/users/token/refresh/"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let store = stored("access-1", "refresh-1");
        let api = client_with(&server, store.clone());
        let err = api
            .send_unit(ApiRequest::post("/users/login/").without_recovery())
            .await
            .unwrap_err();
        assert!(err.is_unauthorized());
        assert_eq!(store.load_refresh().as_deref(), Some("refresh-1"));
    }

    #[tokio::test]
    async fn test_rotated_refresh_token_persisted() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/users/me/"))
            .and(header("authorization", "Bearer expired"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/users/token/refresh/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access": "fresh",
                "refresh": "rotated"
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/users/me/"))
            .and(header("authorization", "Bearer fresh"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        let store = stored("expired", "refresh-1");
        let api = client_with(&server, store.clone());
        api.get::<serde_json::Value>("/users/me/").await.unwrap();

        assert_eq!(store.load_refresh().as_deref(), Some("rotated"));
    }

    // =========================================================================
    // Concurrent refresh policy
    // =========================================================================

    async fn mount_concurrent_scenario(server: &MockServer, refresh_calls: Arc<AtomicU32>) {
        Mock::given(method("GET"))
            .and(path("/tweets/feed/"))
            .and(header("authorization", "Bearer expired"))
            .respond_with(ResponseTemplate::new(401))
            .mount(server)
            .await;

        Mock::given(method("POST"))
            .and(path("/users/token/refresh/"))
            .respond_with(move |_: &Request| {
                let n = refresh_calls.fetch_add(1, Ordering::SeqCst);
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"access": format!("fresh-{}", n)}))
                    .set_delay(Duration::from_millis(100))
            })
            .mount(server)
            .await;

        Mock::given(method("GET"))
            .and(path("/tweets/feed/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_concurrent_401s_refresh_independently_by_default() {
        let server = MockServer::start().await;
        let refresh_calls = Arc::new(AtomicU32::new(0));
        mount_concurrent_scenario(&server, refresh_calls.clone()).await;

        let api = client_with(&server, stored("expired", "refresh-1"));
        let (a, b) = tokio::join!(
            api.get::<Vec<serde_json::Value>>("/tweets/feed/"),
            api.get::<Vec<serde_json::Value>>("/tweets/feed/")
        );
        assert!(a.is_ok() && b.is_ok());
        assert_eq!(refresh_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_concurrent_401s_share_refresh_when_coalesced() {
        let server = MockServer::start().await;
        let refresh_calls = Arc::new(AtomicU32::new(0));
        mount_concurrent_scenario(&server, refresh_calls.clone()).await;

        let store = stored("expired", "refresh-1");
        let api = ApiClient::new(
            ClientConfig::new(server.uri()).with_coalesced_refresh(true),
            store,
        )
        .unwrap();

        let (a, b) = tokio::join!(
            api.get::<Vec<serde_json::Value>>("/tweets/feed/"),
            api.get::<Vec<serde_json::Value>>("/tweets/feed/")
        );
        assert!(a.is_ok() && b.is_ok());
        assert_eq!(refresh_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_coalesced_failed_refresh_signs_out_once() {
        let server = MockServer::start().await;
        let refresh_calls = Arc::new(AtomicU32::new(0));

        Mock::given(method("GET"))
            .and(path("/tweets/feed/"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let calls = refresh_calls.clone();
        Mock::given(method("POST"))
            .and(path("/users/token/refresh/"))
            .respond_with(move |_: &Request| {
                calls.fetch_add(1, Ordering::SeqCst);
                ResponseTemplate::new(401).set_delay(Duration::from_millis(100))
            })
            .mount(&server)
            .await;

        let store = stored("expired", "revoked");
        let api = ApiClient::new(
            ClientConfig::new(server.uri()).with_coalesced_refresh(true),
            store.clone(),
        )
        .unwrap();
        let mut events = api.subscribe_events();

        let (a, b) = tokio::join!(
            api.get::<Vec<serde_json::Value>>("/tweets/feed/"),
            api.get::<Vec<serde_json::Value>>("/tweets/feed/")
        );
        assert!(a.unwrap_err().is_unauthorized());
        assert!(b.unwrap_err().is_unauthorized());

        // The revoked refresh token is sent once and sign-out happens once
        assert_eq!(refresh_calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.load_refresh(), None);
        assert_eq!(events.try_recv().unwrap(), AuthEvent::SignInRequired);
        assert!(events.try_recv().is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_coalesced_failed_refresh_on_multi_thread_runtime() {
        let server = MockServer::start().await;
        let refresh_calls = Arc::new(AtomicU32::new(0));

        Mock::given(method("GET"))
            .and(path("/tweets/feed/"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let calls = refresh_calls.clone();
        Mock::given(method("POST"))
            .and(path("/users/token/refresh/"))
            .respond_with(move |_: &Request| {
                calls.fetch_add(1, Ordering::SeqCst);
                ResponseTemplate::new(401).set_delay(Duration::from_millis(50))
            })
            .mount(&server)
            .await;

        let api = ApiClient::new(
            ClientConfig::new(server.uri()).with_coalesced_refresh(true),
            stored("expired", "revoked"),
        )
        .unwrap();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let api = api.clone();
                tokio::spawn(async move { api.get::<Vec<serde_json::Value>>("/tweets/feed/").await })
            })
            .collect();
        for handle in handles {
            assert!(handle.await.unwrap().unwrap_err().is_unauthorized());
        }
        assert_eq!(refresh_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_client_config_defaults() {
        let config = ClientConfig::new("http://localhost:8001/api");
        assert_eq!(config.timeout, Duration::from_secs(REQUEST_TIMEOUT_SECS));
        assert!(!config.coalesce_refresh);

        let config = config
            .with_timeout(Duration::from_secs(5))
            .with_coalesced_refresh(true);
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert!(config.coalesce_refresh);
    }
}
