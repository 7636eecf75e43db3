//! Wire messages exchanged between the gateway and the token workers.
//!
//! Both travel as JSON over NATS request/reply: the gateway sends a
//! [`TokenRequest`] on the token subject and a worker answers on the reply
//! inbox with a [`TokenResponse`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Sent by the gateway on a cache miss. `request_id` correlates the reply.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenRequest {
    pub request_id: String,
    pub client_id: String,
    pub client_secret: String,
    pub timestamp: DateTime<Utc>,
}

impl TokenRequest {
    /// A request with a fresh UUID v4 `request_id`, stamped now.
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            timestamp: Utc::now(),
        }
    }
}

impl Default for TokenRequest {
    fn default() -> Self {
        Self {
            request_id: String::new(),
            client_id: String::new(),
            client_secret: String::new(),
            timestamp: Utc::now(),
        }
    }
}

impl std::fmt::Debug for TokenRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenRequest")
            .field("request_id", &self.request_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("timestamp", &self.timestamp)
            .finish()
    }
}

/// Sent by a worker. A non-empty `error` means the IDP refused or failed;
/// otherwise `access_token` is populated.
///
/// Every field is optional on decode so minimal replies such as
/// `{"access_token":"tok","token_type":"Bearer","expires_in":3600}` are
/// accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenResponse {
    pub request_id: String,
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl TokenResponse {
    pub fn success(
        request_id: impl Into<String>,
        access_token: impl Into<String>,
        token_type: impl Into<String>,
        expires_in: u64,
        scope: Option<String>,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            access_token: access_token.into(),
            token_type: token_type.into(),
            expires_in,
            scope: scope.filter(|s| !s.is_empty()),
            ..Self::default()
        }
    }

    pub fn failure(request_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            error: Some(error.into()),
            ..Self::default()
        }
    }

    /// The upstream error, if any. An empty string counts as no error.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref().filter(|e| !e.is_empty())
    }
}

impl Default for TokenResponse {
    fn default() -> Self {
        Self {
            request_id: String::new(),
            access_token: String::new(),
            token_type: String::new(),
            expires_in: 0,
            scope: None,
            error: None,
            timestamp: Utc::now(),
        }
    }
}
