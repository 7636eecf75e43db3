//! Turns a cache miss into one NATS request/reply exchange with a bounded wait.
//!
//! Each call sends exactly one [`TokenRequest`] on the token subject and waits
//! for the matching [`TokenResponse`]. There is no retry: a timeout or
//! transport failure is reported to the caller as-is.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use gateway_nats::{RequestClient, RequestFailure, headers_with_trace_context};
use tracing::{debug, warn};

use crate::messages::{TokenRequest, TokenResponse};

#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("Request timed out")]
    Timeout,
    #[error("Token service unavailable: {0}")]
    Unavailable(String),
    #[error("{0}")]
    Rejected(String),
    #[error("Failed to process token message: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Request ids still waiting for a reply.
#[derive(Debug, Default)]
struct InFlightRequests {
    ids: Mutex<HashSet<String>>,
}

impl InFlightRequests {
    fn register(&self, request_id: String) -> InFlightGuard<'_> {
        self.ids
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(request_id.clone());
        InFlightGuard {
            registry: self,
            request_id,
        }
    }

    fn len(&self) -> usize {
        self.ids.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

/// Removes the request id on drop, including when the waiting future is
/// cancelled (client disconnect, handler abort).
struct InFlightGuard<'a> {
    registry: &'a InFlightRequests,
    request_id: String,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.registry
            .ids
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.request_id);
    }
}

/// Request/reply client for the token subject.
///
/// Clones share the same connection and in-flight registry.
pub struct TokenBridge<N> {
    nats: N,
    subject: String,
    in_flight: Arc<InFlightRequests>,
}

impl<N: Clone> Clone for TokenBridge<N> {
    fn clone(&self) -> Self {
        Self {
            nats: self.nats.clone(),
            subject: self.subject.clone(),
            in_flight: Arc::clone(&self.in_flight),
        }
    }
}

impl<N: RequestClient> TokenBridge<N> {
    pub fn new(nats: N, subject: impl Into<String>) -> Self {
        Self {
            nats,
            subject: subject.into(),
            in_flight: Arc::default(),
        }
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Requests that have been sent and are still waiting for a reply.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Ask a token worker for a token, waiting at most `timeout`.
    ///
    /// A successful response is returned untouched; caching it is up to the
    /// caller.
    pub async fn request_token(
        &self,
        client_id: &str,
        client_secret: &str,
        timeout: Duration,
    ) -> Result<TokenResponse, BridgeError> {
        let request = TokenRequest::new(client_id, client_secret);
        let payload = serde_json::to_vec(&request)?;

        let _guard = self.in_flight.register(request.request_id.clone());

        debug!(
            client_id = %client_id,
            request_id = %request.request_id,
            subject = %self.subject,
            "Requesting token from worker"
        );

        let outcome = tokio::time::timeout(
            timeout,
            self.nats.request_with_headers(
                self.subject.clone(),
                headers_with_trace_context(),
                payload.into(),
            ),
        )
        .await;

        let reply = match outcome {
            Err(_elapsed) => {
                warn!(
                    client_id = %client_id,
                    request_id = %request.request_id,
                    timeout_ms = timeout.as_millis() as u64,
                    "Token request timed out"
                );
                return Err(BridgeError::Timeout);
            }
            Ok(Err(e)) => {
                warn!(
                    client_id = %client_id,
                    request_id = %request.request_id,
                    error = %e,
                    "Token request failed"
                );
                return Err(match N::classify(&e) {
                    RequestFailure::TimedOut => BridgeError::Timeout,
                    RequestFailure::NoResponders | RequestFailure::Other => {
                        BridgeError::Unavailable(e.to_string())
                    }
                });
            }
            Ok(Ok(reply)) => reply,
        };

        let response: TokenResponse = serde_json::from_slice(&reply.payload)?;

        if !response.request_id.is_empty() && response.request_id != request.request_id {
            warn!(
                request_id = %request.request_id,
                reply_request_id = %response.request_id,
                "Reply correlated to a different request"
            );
            return Err(BridgeError::Unavailable(format!(
                "reply for request {} does not match request {}",
                response.request_id, request.request_id
            )));
        }

        if let Some(error) = response.error() {
            debug!(
                client_id = %client_id,
                request_id = %request.request_id,
                error = %error,
                "Worker rejected token request"
            );
            return Err(BridgeError::Rejected(error.to_string()));
        }

        Ok(response)
    }
}
