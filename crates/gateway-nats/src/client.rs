use std::error::Error;
use std::future::Future;

use async_nats::client::RequestErrorKind;
use async_nats::subject::ToSubject;
use async_nats::{Client as NatsAsyncClient, HeaderMap, Message};
use bytes::Bytes;

/// Why a request/reply round trip produced no reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestFailure {
    /// The transport gave up waiting.
    TimedOut,
    /// Nobody is subscribed to the subject.
    NoResponders,
    /// Anything else: connection closed, publish failed, ...
    Other,
}

pub trait RequestClient: Send + Sync + Clone + 'static {
    type RequestError: Error + Send + Sync;

    /// Send one request and await its reply on a fresh inbox. Dropping the
    /// returned future abandons the inbox.
    fn request_with_headers<S: ToSubject + Send>(
        &self,
        subject: S,
        headers: HeaderMap,
        payload: Bytes,
    ) -> impl Future<Output = Result<Message, Self::RequestError>> + Send;

    fn classify(error: &Self::RequestError) -> RequestFailure;
}

pub trait PublishClient: Send + Sync + Clone + 'static {
    type PublishError: Error + Send + Sync;

    fn publish_with_headers<S: ToSubject + Send>(
        &self,
        subject: S,
        headers: HeaderMap,
        payload: Bytes,
    ) -> impl Future<Output = Result<(), Self::PublishError>> + Send;
}

impl RequestClient for NatsAsyncClient {
    type RequestError = async_nats::client::RequestError;

    async fn request_with_headers<S: ToSubject + Send>(
        &self,
        subject: S,
        headers: HeaderMap,
        payload: Bytes,
    ) -> Result<Message, Self::RequestError> {
        self.request_with_headers(subject, headers, payload).await
    }

    fn classify(error: &Self::RequestError) -> RequestFailure {
        match error.kind() {
            RequestErrorKind::TimedOut => RequestFailure::TimedOut,
            RequestErrorKind::NoResponders => RequestFailure::NoResponders,
            RequestErrorKind::Other => RequestFailure::Other,
        }
    }
}

impl PublishClient for NatsAsyncClient {
    type PublishError = async_nats::client::PublishError;

    async fn publish_with_headers<S: ToSubject + Send>(
        &self,
        subject: S,
        headers: HeaderMap,
        payload: Bytes,
    ) -> Result<(), Self::PublishError> {
        self.publish_with_headers(subject, headers, payload).await
    }
}
