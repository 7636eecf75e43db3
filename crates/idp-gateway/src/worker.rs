//! Token worker: answers token requests by calling the identity provider.
//!
//! Each running instance:
//! 1. Receives [`TokenRequest`] messages from its queue subscription on the
//!    token subject.
//! 2. Exchanges the client credentials for a token via its [`TokenIssuer`].
//! 3. Replies on the message's reply inbox with a [`TokenResponse`], carrying
//!    either the token or the issuer's error message.
//!
//! Messages are handled concurrently; when the subscription ends the worker
//! waits for in-progress replies before returning.

use std::sync::Arc;

use async_nats::Message;
use futures_util::{Stream, StreamExt};
use gateway_nats::{PublishClient, headers_with_trace_context};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::idp::{ClientCredentials, TokenIssuer};
use crate::messages::{TokenRequest, TokenResponse};

const INVALID_REQUEST: &str = "Invalid request format";

#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("message on {subject} has no reply subject")]
    NoReplySubject { subject: String },
    #[error("failed to serialize reply: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("failed to publish reply to {reply}: {error}")]
    Publish { reply: String, error: String },
}

pub struct TokenWorker<I, P> {
    issuer: Arc<I>,
    publisher: P,
    scope: Option<String>,
}

impl<I, P: Clone> Clone for TokenWorker<I, P> {
    fn clone(&self) -> Self {
        Self {
            issuer: Arc::clone(&self.issuer),
            publisher: self.publisher.clone(),
            scope: self.scope.clone(),
        }
    }
}

impl<I: TokenIssuer, P: PublishClient> TokenWorker<I, P> {
    /// `scope` is requested from the IDP for every client; empty means none.
    pub fn new(issuer: I, publisher: P, scope: impl Into<String>) -> Self {
        let scope = scope.into();
        Self {
            issuer: Arc::new(issuer),
            publisher,
            scope: (!scope.is_empty()).then_some(scope),
        }
    }

    /// Serve every message from `messages` until the stream ends.
    pub async fn run<S>(self, mut messages: S)
    where
        S: Stream<Item = Message> + Unpin,
    {
        info!("Token worker started, waiting for requests");

        let mut in_progress = JoinSet::new();
        while let Some(message) = messages.next().await {
            let worker = self.clone();
            in_progress.spawn(async move {
                match worker.handle(message).await {
                    // Logged by `handle`; there is nobody to reply to.
                    Ok(()) | Err(WorkerError::NoReplySubject { .. }) => {}
                    Err(e) => error!(error = %e, "Failed to answer token request"),
                }
            });
            // Reap finished handlers so the set stays small under load.
            while in_progress.try_join_next().is_some() {}
        }

        let remaining = in_progress.len();
        if remaining > 0 {
            info!(remaining, "Subscription closed, finishing in-progress requests");
        }
        while in_progress.join_next().await.is_some() {}

        info!("Token worker stopped");
    }

    /// Answer one request message. Always replies when the message has a
    /// reply subject, even if the payload is unreadable.
    pub async fn handle(&self, message: Message) -> Result<(), WorkerError> {
        let Some(reply) = message.reply.clone() else {
            warn!(subject = %message.subject, "Dropping token request without reply subject");
            return Err(WorkerError::NoReplySubject {
                subject: message.subject.to_string(),
            });
        };

        let response = match serde_json::from_slice::<TokenRequest>(&message.payload) {
            Ok(request) => self.process(request).await,
            Err(e) => {
                warn!(subject = %message.subject, error = %e, "Failed to parse token request");
                TokenResponse::failure("", INVALID_REQUEST)
            }
        };

        let payload = serde_json::to_vec(&response)?;
        self.publisher
            .publish_with_headers(reply.clone(), headers_with_trace_context(), payload.into())
            .await
            .map_err(|e| WorkerError::Publish {
                reply: reply.to_string(),
                error: e.to_string(),
            })
    }

    async fn process(&self, request: TokenRequest) -> TokenResponse {
        info!(
            client_id = %request.client_id,
            request_id = %request.request_id,
            "Received token request"
        );

        let credentials = ClientCredentials {
            client_id: request.client_id,
            client_secret: request.client_secret,
            scope: self.scope.clone(),
        };

        match self.issuer.issue(&credentials).await {
            Ok(token) => {
                debug!(
                    client_id = %credentials.client_id,
                    request_id = %request.request_id,
                    expires_in = token.expires_in,
                    "Token obtained"
                );
                TokenResponse::success(
                    request.request_id,
                    token.access_token,
                    token.token_type,
                    token.expires_in,
                    token.scope,
                )
            }
            Err(e) => {
                warn!(
                    client_id = %credentials.client_id,
                    request_id = %request.request_id,
                    error = %e,
                    "Failed to obtain token"
                );
                TokenResponse::failure(request.request_id, e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use bytes::Bytes;
    use gateway_nats::MockNatsClient;
    use tracing::Level;
    use tracing_subscriber::layer::{Context, SubscriberExt};
    use tracing_subscriber::{Layer, Registry};

    use super::*;
    use crate::idp::{IdpError, IssuedToken};
    use crate::subjects::DEFAULT_TOKEN_SUBJECT;

    /// Issues `tok-<client_id>` unless the secret is `wrong`.
    #[derive(Default)]
    struct FakeIssuer {
        calls: AtomicUsize,
        scopes: Mutex<Vec<Option<String>>>,
    }

    impl TokenIssuer for FakeIssuer {
        async fn issue(&self, credentials: &ClientCredentials) -> Result<IssuedToken, IdpError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.scopes.lock().unwrap().push(credentials.scope.clone());
            if credentials.client_secret == "wrong" {
                return Err(IdpError::Status {
                    status: 401,
                    body: "invalid_client".to_string(),
                });
            }
            Ok(IssuedToken {
                access_token: format!("tok-{}", credentials.client_id),
                token_type: "Bearer".to_string(),
                expires_in: 3600,
                scope: None,
            })
        }
    }

    fn message(payload: impl Into<Bytes>, reply: Option<&str>) -> Message {
        let payload = payload.into();
        Message {
            subject: DEFAULT_TOKEN_SUBJECT.into(),
            reply: reply.map(Into::into),
            length: payload.len(),
            payload,
            headers: None,
            status: None,
            description: None,
        }
    }

    fn request_message(client_id: &str, secret: &str, reply: &str) -> (TokenRequest, Message) {
        let request = TokenRequest::new(client_id, secret);
        let payload = serde_json::to_vec(&request).unwrap();
        (request, message(payload, Some(reply)))
    }

    fn published_response(mock: &MockNatsClient, index: usize) -> TokenResponse {
        serde_json::from_slice(&mock.published()[index].payload).unwrap()
    }

    #[tokio::test]
    async fn replies_with_issued_token() {
        let mock = MockNatsClient::new();
        let worker = TokenWorker::new(FakeIssuer::default(), mock.clone(), "openid profile");
        let (request, msg) = request_message("client-1", "s3cret", "_INBOX.1");

        worker.handle(msg).await.unwrap();

        let published = mock.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].subject, "_INBOX.1");

        let response = published_response(&mock, 0);
        assert_eq!(response.request_id, request.request_id);
        assert_eq!(response.access_token, "tok-client-1");
        assert_eq!(response.token_type, "Bearer");
        assert_eq!(response.expires_in, 3600);
        assert_eq!(response.error(), None);
        assert_eq!(
            worker.issuer.scopes.lock().unwrap().as_slice(),
            &[Some("openid profile".to_string())]
        );
    }

    #[tokio::test]
    async fn issuer_failure_is_replied_as_error() {
        let mock = MockNatsClient::new();
        let worker = TokenWorker::new(FakeIssuer::default(), mock.clone(), "");
        let (request, msg) = request_message("client-1", "wrong", "_INBOX.2");

        worker.handle(msg).await.unwrap();

        let response = published_response(&mock, 0);
        assert_eq!(response.request_id, request.request_id);
        assert_eq!(
            response.error(),
            Some("IDP returned error status: 401, body: invalid_client")
        );
        assert_eq!(worker.issuer.scopes.lock().unwrap().as_slice(), &[None]);
    }

    #[tokio::test]
    async fn unreadable_request_gets_invalid_format_reply() {
        let mock = MockNatsClient::new();
        let worker = TokenWorker::new(FakeIssuer::default(), mock.clone(), "");

        worker
            .handle(message("definitely not json", Some("_INBOX.3")))
            .await
            .unwrap();

        let response = published_response(&mock, 0);
        assert_eq!(response.request_id, "");
        assert_eq!(response.error(), Some("Invalid request format"));
        assert_eq!(worker.issuer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn message_without_reply_is_dropped() {
        let mock = MockNatsClient::new();
        let worker = TokenWorker::new(FakeIssuer::default(), mock.clone(), "");
        let payload = serde_json::to_vec(&TokenRequest::new("client-1", "s3cret")).unwrap();

        let err = worker.handle(message(payload, None)).await.unwrap_err();

        assert!(matches!(err, WorkerError::NoReplySubject { .. }));
        assert!(mock.published().is_empty());
        assert_eq!(worker.issuer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn run_answers_every_message_then_returns() {
        let mock = MockNatsClient::new();
        let worker = TokenWorker::new(FakeIssuer::default(), mock.clone(), "");

        let messages: Vec<Message> = (0..5)
            .map(|i| request_message(&format!("client-{i}"), "s3cret", &format!("_INBOX.{i}")).1)
            .collect();

        tokio::time::timeout(
            Duration::from_secs(5),
            worker.run(futures_util::stream::iter(messages)),
        )
        .await
        .expect("worker did not finish after the stream ended");

        let mut replies: Vec<String> = mock.published().into_iter().map(|m| m.subject).collect();
        replies.sort();
        assert_eq!(
            replies,
            vec!["_INBOX.0", "_INBOX.1", "_INBOX.2", "_INBOX.3", "_INBOX.4"]
        );
    }

    /// Counts events at or above WARN.
    #[derive(Clone, Default)]
    struct WarningCounter(Arc<AtomicUsize>);

    impl<S: tracing::Subscriber> Layer<S> for WarningCounter {
        fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
            if *event.metadata().level() <= Level::WARN {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    #[tokio::test]
    async fn message_without_reply_is_logged_once() {
        let warnings = WarningCounter::default();
        let _subscriber =
            tracing::subscriber::set_default(Registry::default().with(warnings.clone()));

        let mock = MockNatsClient::new();
        let worker = TokenWorker::new(FakeIssuer::default(), mock.clone(), "");
        let payload = serde_json::to_vec(&TokenRequest::new("client-1", "s3cret")).unwrap();

        worker
            .run(futures_util::stream::iter(vec![message(payload, None)]))
            .await;

        assert_eq!(warnings.0.load(Ordering::SeqCst), 1);
        assert!(mock.published().is_empty());
    }
}
