//! Axum HTTP front door.
//!
//! `POST /token` validates the body, answers from the token cache when it can,
//! and otherwise asks a token worker through the [`TokenBridge`], caching the
//! new token before responding. `GET /health` is a liveness probe.

use std::sync::Arc;
use std::time::Duration;

use axum::Json;
use axum::Router;
use axum::body::Bytes;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use gateway_nats::RequestClient;
use serde::{Deserialize, Serialize};
use token_cache::TokenCache;
use tracing::{debug, error, info, warn};

use crate::bridge::{BridgeError, TokenBridge};
use crate::validator::{self, CredentialError};

const CACHED_TOKEN_TYPE: &str = "Bearer";

pub struct GatewayState<N> {
    pub cache: Arc<TokenCache>,
    pub bridge: TokenBridge<N>,
    /// Upper bound on waiting for a worker reply.
    pub request_timeout: Duration,
    /// Lifetime of a token cached after a successful exchange.
    pub cache_ttl: Duration,
}

impl<N: Clone> Clone for GatewayState<N> {
    fn clone(&self) -> Self {
        Self {
            cache: Arc::clone(&self.cache),
            bridge: self.bridge.clone(),
            request_timeout: self.request_timeout,
            cache_ttl: self.cache_ttl,
        }
    }
}

/// Build the axum router for the gateway.
pub fn router<N: RequestClient>(state: GatewayState<N>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/token", post(handle_token::<N>))
        .with_state(state)
}

async fn health() -> &'static str {
    "OK"
}

#[derive(Debug, Default, Deserialize)]
pub struct TokenQuery {
    skip_cache: Option<String>,
}

impl TokenQuery {
    /// `skip_cache=1` or `skip_cache=true` bypasses both cache read and write.
    pub fn bypass_cache(&self) -> bool {
        matches!(self.skip_cache.as_deref(), Some("1" | "true"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenSource {
    Cache,
    Idp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenReply {
    pub access_token: String,
    pub token_type: String,
    pub source: TokenSource,
}

async fn handle_token<N: RequestClient>(
    State(state): State<GatewayState<N>>,
    query: Result<Query<TokenQuery>, QueryRejection>,
    body: Bytes,
) -> Result<Json<TokenReply>, GatewayError> {
    let Query(query) = query?;
    let credentials = validator::validate(&body)?;
    let client_id = credentials.client_id.as_str();
    let bypass = query.bypass_cache();

    if bypass {
        debug!(client_id = %client_id, "Cache bypass requested");
    } else if let Some(access_token) = state.cache.get(client_id) {
        info!(client_id = %client_id, "Serving token from cache");
        return Ok(Json(TokenReply {
            access_token,
            token_type: CACHED_TOKEN_TYPE.to_string(),
            source: TokenSource::Cache,
        }));
    }

    let response = state
        .bridge
        .request_token(client_id, &credentials.client_secret, state.request_timeout)
        .await?;

    if !bypass {
        state
            .cache
            .set(client_id, response.access_token.clone(), state.cache_ttl);
    }

    info!(client_id = %client_id, "Serving token from IDP");
    Ok(Json(TokenReply {
        access_token: response.access_token,
        token_type: response.token_type,
        source: TokenSource::Idp,
    }))
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
}

/// Errors the token handler can produce, mapped to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error(transparent)]
    InvalidQuery(#[from] QueryRejection),
    #[error(transparent)]
    InvalidRequest(#[from] CredentialError),
    #[error(transparent)]
    Upstream(#[from] BridgeError),
}

const PROCESSING_FAILED: &str = "Failed to process request";

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        match &self {
            Self::InvalidQuery(e) => {
                debug!(error = %e, "Rejected token request query");
                json_error(StatusCode::BAD_REQUEST, &e.body_text())
            }
            Self::InvalidRequest(e) => {
                debug!(error = %e, "Rejected token request");
                json_error(StatusCode::BAD_REQUEST, &e.to_string())
            }
            Self::Upstream(BridgeError::Rejected(reason)) => {
                warn!(error = %reason, "IDP rejected token request");
                json_error(StatusCode::BAD_REQUEST, reason)
            }
            Self::Upstream(BridgeError::Timeout) => {
                warn!("Token request timed out");
                (StatusCode::GATEWAY_TIMEOUT, BridgeError::Timeout.to_string()).into_response()
            }
            Self::Upstream(e) => {
                error!(error = %e, "Token request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, PROCESSING_FAILED).into_response()
            }
        }
    }
}

fn json_error(status: StatusCode, message: &str) -> Response {
    (status, Json(ErrorBody { error: message })).into_response()
}

#[cfg(test)]
mod tests {
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use bytes::Bytes;
    use gateway_nats::MockNatsClient;
    use tower::ServiceExt;

    use super::*;
    use crate::messages::{TokenRequest, TokenResponse};
    use crate::subjects::DEFAULT_TOKEN_SUBJECT;

    const TTL: Duration = Duration::from_secs(55 * 60);

    fn state(mock: &MockNatsClient) -> GatewayState<MockNatsClient> {
        GatewayState {
            cache: Arc::new(TokenCache::new()),
            bridge: TokenBridge::new(mock.clone(), DEFAULT_TOKEN_SUBJECT),
            request_timeout: Duration::from_secs(5),
            cache_ttl: TTL,
        }
    }

    fn worker_issues(mock: &MockNatsClient, token: &'static str) {
        mock.respond_with(DEFAULT_TOKEN_SUBJECT, move |payload| {
            let request: TokenRequest = serde_json::from_slice(payload).unwrap();
            let response =
                TokenResponse::success(request.request_id, token, "Bearer", 3600, None);
            Bytes::from(serde_json::to_vec(&response).unwrap())
        });
    }

    fn token_request(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn send(app: Router, req: Request<Body>) -> (StatusCode, String) {
        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    const CREDS: &str = r#"{"client_id":"client-1","client_secret":"s3cret"}"#;

    #[tokio::test]
    async fn health_is_ok() {
        let mock = MockNatsClient::new();
        let req = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();

        let (status, body) = send(router(state(&mock)), req).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "OK");
    }

    #[tokio::test]
    async fn miss_goes_to_worker_and_populates_cache() {
        let mock = MockNatsClient::new();
        worker_issues(&mock, "tok-abc");
        let state = state(&mock);
        let cache = Arc::clone(&state.cache);

        let (status, body) = send(router(state), token_request("/token", CREDS)).await;

        assert_eq!(status, StatusCode::OK);
        let reply: TokenReply = serde_json::from_str(&body).unwrap();
        assert_eq!(reply.access_token, "tok-abc");
        assert_eq!(reply.token_type, "Bearer");
        assert_eq!(reply.source, TokenSource::Idp);
        assert_eq!(cache.get("client-1").as_deref(), Some("tok-abc"));
    }

    #[tokio::test]
    async fn hit_is_served_from_cache_without_worker() {
        let mock = MockNatsClient::new();
        let state = state(&mock);
        state.cache.set("client-1", "tok-cached", TTL);

        let (status, body) = send(router(state), token_request("/token", CREDS)).await;

        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["access_token"], "tok-cached");
        assert_eq!(json["token_type"], "Bearer");
        assert_eq!(json["source"], "cache");
        assert_eq!(mock.request_count(DEFAULT_TOKEN_SUBJECT), 0);
    }

    #[tokio::test]
    async fn skip_cache_bypasses_read_and_write() {
        let mock = MockNatsClient::new();
        worker_issues(&mock, "tok-fresh");
        let state = state(&mock);
        state.cache.set("client-1", "tok-cached", TTL);
        let cache = Arc::clone(&state.cache);
        let app = router(state);

        for uri in ["/token?skip_cache=1", "/token?skip_cache=true"] {
            let (status, body) = send(app.clone(), token_request(uri, CREDS)).await;
            assert_eq!(status, StatusCode::OK);
            let reply: TokenReply = serde_json::from_str(&body).unwrap();
            assert_eq!(reply.source, TokenSource::Idp);
            assert_eq!(reply.access_token, "tok-fresh");
        }

        assert_eq!(mock.request_count(DEFAULT_TOKEN_SUBJECT), 2);
        assert_eq!(cache.get("client-1").as_deref(), Some("tok-cached"));
    }

    #[tokio::test]
    async fn other_skip_cache_values_use_cache() {
        let mock = MockNatsClient::new();
        let state = state(&mock);
        state.cache.set("client-1", "tok-cached", TTL);

        let (_, body) = send(router(state), token_request("/token?skip_cache=yes", CREDS)).await;

        let reply: TokenReply = serde_json::from_str(&body).unwrap();
        assert_eq!(reply.source, TokenSource::Cache);
    }

    #[tokio::test]
    async fn unparsable_query_is_400_json() {
        let mock = MockNatsClient::new();
        let state = state(&mock);
        state.cache.set("client-1", "tok-cached", TTL);

        let (status, body) = send(
            router(state),
            token_request("/token?skip_cache=1&skip_cache=0", CREDS),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        let error = json["error"].as_str().unwrap();
        assert!(error.contains("skip_cache"), "unexpected error: {error}");
        assert_eq!(mock.requests().len(), 0);
    }

    #[tokio::test]
    async fn malformed_body_is_400_json() {
        let mock = MockNatsClient::new();

        let (status, body) = send(router(state(&mock)), token_request("/token", "nope")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["error"], "Invalid request format");
        assert_eq!(mock.requests().len(), 0);
    }

    #[tokio::test]
    async fn missing_secret_is_400_json() {
        let mock = MockNatsClient::new();

        let (status, body) = send(
            router(state(&mock)),
            token_request("/token", r#"{"client_id":"client-1"}"#),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["error"], "Client ID and Client Secret are required");
    }

    #[tokio::test]
    async fn rejection_is_400_with_reason_and_not_cached() {
        let mock = MockNatsClient::new();
        mock.set_response(
            DEFAULT_TOKEN_SUBJECT,
            Bytes::from(r#"{"error":"invalid_client"}"#),
        );
        let state = state(&mock);
        let cache = Arc::clone(&state.cache);

        let (status, body) = send(router(state), token_request("/token", CREDS)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["error"], "invalid_client");
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn silent_worker_is_504() {
        let mock = MockNatsClient::new();
        mock.never_reply(DEFAULT_TOKEN_SUBJECT);
        let state = state(&mock);
        let bridge = state.bridge.clone();

        let (status, body) = send(router(state), token_request("/token", CREDS)).await;

        assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(body, "Request timed out");
        assert_eq!(bridge.in_flight(), 0);
    }

    #[tokio::test]
    async fn no_workers_is_500() {
        let mock = MockNatsClient::new();

        let (status, body) = send(router(state(&mock)), token_request("/token", CREDS)).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, PROCESSING_FAILED);
    }

    #[tokio::test]
    async fn garbage_reply_is_500() {
        let mock = MockNatsClient::new();
        mock.set_response(DEFAULT_TOKEN_SUBJECT, Bytes::from("]["));

        let (status, _) = send(router(state(&mock)), token_request("/token", CREDS)).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn get_on_token_is_405() {
        let mock = MockNatsClient::new();
        let req = Request::builder()
            .uri("/token")
            .body(Body::empty())
            .unwrap();

        let (status, _) = send(router(state(&mock)), req).await;

        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    }

    #[test]
    fn bypass_flag_values() {
        let query = |v: Option<&str>| TokenQuery {
            skip_cache: v.map(str::to_string),
        };
        assert!(query(Some("1")).bypass_cache());
        assert!(query(Some("true")).bypass_cache());
        assert!(!query(Some("TRUE")).bypass_cache());
        assert!(!query(Some("0")).bypass_cache());
        assert!(!query(None).bypass_cache());
    }

    #[test]
    fn error_mapping() {
        let cases = [
            (
                GatewayError::from(CredentialError::MalformedRequest),
                StatusCode::BAD_REQUEST,
            ),
            (
                GatewayError::from(BridgeError::Rejected("no".to_string())),
                StatusCode::BAD_REQUEST,
            ),
            (
                GatewayError::from(BridgeError::Timeout),
                StatusCode::GATEWAY_TIMEOUT,
            ),
            (
                GatewayError::from(BridgeError::Unavailable("down".to_string())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }
}
