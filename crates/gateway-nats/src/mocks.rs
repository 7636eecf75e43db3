use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_nats::subject::ToSubject;
use bytes::Bytes;

use crate::client::{PublishClient, RequestClient, RequestFailure};

#[derive(Debug, Clone)]
pub struct MockError {
    pub failure: RequestFailure,
    pub message: String,
}

impl MockError {
    fn new(failure: RequestFailure, message: impl Into<String>) -> Self {
        Self {
            failure,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for MockError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for MockError {}

/// Computes a reply payload from a request payload.
type Responder = Arc<dyn Fn(&[u8]) -> Bytes + Send + Sync>;

#[derive(Clone, Debug)]
pub struct RecordedMessage {
    pub subject: String,
    pub payload: Bytes,
}

/// Scriptable stand-in for a NATS connection.
///
/// - subjects with a responder reply with whatever the responder returns
/// - subjects marked with [`never_reply`](Self::never_reply) hang until the
///   caller drops the request future
/// - [`fail_next_request`](Self::fail_next_request) queues transport failures
/// - everything else fails with [`RequestFailure::NoResponders`], like a real
///   server with no subscribers
#[derive(Clone, Default)]
pub struct MockNatsClient {
    responders: Arc<Mutex<HashMap<String, Responder>>>,
    silent: Arc<Mutex<HashSet<String>>>,
    failures: Arc<Mutex<VecDeque<RequestFailure>>>,
    requests: Arc<Mutex<Vec<RecordedMessage>>>,
    published: Arc<Mutex<Vec<RecordedMessage>>>,
    waiting: Arc<AtomicUsize>,
}

impl std::fmt::Debug for MockNatsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockNatsClient")
            .field(
                "responders",
                &format!("{} configured", self.responders.lock().unwrap().len()),
            )
            .field("silent", &self.silent.lock().unwrap())
            .field("requests", &self.requests.lock().unwrap().len())
            .field("published", &self.published.lock().unwrap().len())
            .finish()
    }
}

impl MockNatsClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond_with<F>(&self, subject: &str, responder: F)
    where
        F: Fn(&[u8]) -> Bytes + Send + Sync + 'static,
    {
        self.silent.lock().unwrap().remove(subject);
        self.responders
            .lock()
            .unwrap()
            .insert(subject.to_string(), Arc::new(responder));
    }

    /// Reply with the same payload to every request on `subject`.
    pub fn set_response(&self, subject: &str, response: Bytes) {
        self.respond_with(subject, move |_| response.clone());
    }

    pub fn never_reply(&self, subject: &str) {
        self.responders.lock().unwrap().remove(subject);
        self.silent.lock().unwrap().insert(subject.to_string());
    }

    pub fn fail_next_request(&self, failure: RequestFailure) {
        self.failures.lock().unwrap().push_back(failure);
    }

    pub fn requests(&self) -> Vec<RecordedMessage> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self, subject: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.subject == subject)
            .count()
    }

    pub fn published(&self) -> Vec<RecordedMessage> {
        self.published.lock().unwrap().clone()
    }

    /// Requests currently parked on a silent subject.
    pub fn waiting_requests(&self) -> usize {
        self.waiting.load(Ordering::SeqCst)
    }
}

struct WaitingGuard(Arc<AtomicUsize>);

impl WaitingGuard {
    fn enter(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(counter))
    }
}

impl Drop for WaitingGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl RequestClient for MockNatsClient {
    type RequestError = MockError;

    async fn request_with_headers<S: ToSubject + Send>(
        &self,
        subject: S,
        _headers: async_nats::HeaderMap,
        payload: Bytes,
    ) -> Result<async_nats::Message, MockError> {
        let subject = subject.to_subject().to_string();
        self.requests.lock().unwrap().push(RecordedMessage {
            subject: subject.clone(),
            payload: payload.clone(),
        });

        let queued_failure = self.failures.lock().unwrap().pop_front();
        if let Some(failure) = queued_failure {
            return Err(MockError::new(failure, "simulated request failure"));
        }

        let silent = self.silent.lock().unwrap().contains(&subject);
        if silent {
            let _guard = WaitingGuard::enter(&self.waiting);
            std::future::pending::<()>().await;
        }

        let responder = self.responders.lock().unwrap().get(&subject).cloned();
        let Some(responder) = responder else {
            return Err(MockError::new(
                RequestFailure::NoResponders,
                format!("no responders available for request on {}", subject),
            ));
        };

        let reply = responder(&payload);
        Ok(async_nats::Message {
            subject: subject.into(),
            reply: None,
            length: reply.len(),
            payload: reply,
            headers: None,
            status: None,
            description: None,
        })
    }

    fn classify(error: &MockError) -> RequestFailure {
        error.failure
    }
}

impl PublishClient for MockNatsClient {
    type PublishError = MockError;

    async fn publish_with_headers<S: ToSubject + Send>(
        &self,
        subject: S,
        _headers: async_nats::HeaderMap,
        payload: Bytes,
    ) -> Result<(), MockError> {
        self.published.lock().unwrap().push(RecordedMessage {
            subject: subject.to_subject().to_string(),
            payload,
        });
        Ok(())
    }
}
