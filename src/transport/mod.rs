//! Backend transport abstraction and implementations
//!
//! This module defines the [`Transport`] trait through which the engine and
//! the session directory reach the chat backend. Concrete implementations
//! live in submodules:
//!
//! - [`http::HttpTransport`] -- reqwest-based client for the REST/streaming
//!   backend.
//! - `fake::FakeTransport` -- in-process scripted fake used in tests
//!   (cfg(test) only).
//!
//! # Streaming contract
//!
//! [`Transport::send_chat`] resolves once the response headers are in. The
//! session id hint (the `X-Session-Id` header) is read at that point, before
//! any body byte is consumed. The body itself is handed back as a lazy
//! [`ByteStream`] that ends with an `Err(ChatError::Cancelled)` item if the
//! bound [`RequestToken`] is signalled while it is being read.

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};

use crate::cancel::RequestToken;
use crate::error::{ChatError, Result};
use crate::types::{ChatRequest, Message, ModelInfo, Session};

pub mod http;

#[cfg(test)]
pub mod fake;

/// Response header carrying the id of a newly created session
pub const SESSION_ID_HEADER: &str = "X-Session-Id";

/// Raw response body, delivered chunk by chunk as it arrives
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// An open streamed chat response
pub struct ChatResponse {
    /// Session id assigned by the backend, present only for new sessions
    pub session_id_hint: Option<i64>,
    /// The streamed reply body
    pub body: ByteStream,
}

impl std::fmt::Debug for ChatResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatResponse")
            .field("session_id_hint", &self.session_id_hint)
            .finish_non_exhaustive()
    }
}

/// Abstraction over the chat backend
///
/// All methods are `async` so implementations can drive I/O without
/// blocking the Tokio executor. Errors are [`ChatError`] values wrapped in
/// `anyhow::Error`.
#[async_trait]
pub trait Transport: Send + Sync + std::fmt::Debug {
    /// `GET /models`
    async fn list_models(&self) -> Result<Vec<ModelInfo>>;

    /// `GET /sessions`, most recent first
    async fn list_sessions(&self) -> Result<Vec<Session>>;

    /// `GET /sessions/{id}`, full ordered history
    async fn session_history(&self, session_id: i64) -> Result<Vec<Message>>;

    /// `DELETE /sessions/{id}`
    ///
    /// Deleting a session that no longer exists is not an error.
    async fn delete_session(&self, session_id: i64) -> Result<()>;

    /// `POST /chat`, returning once headers are available
    ///
    /// # Errors
    ///
    /// - [`ChatError::Cancelled`] if `token` is signalled before headers arrive
    /// - [`ChatError::BackendFailure`] for a non-success status
    /// - [`ChatError::NetworkFailure`] if the request cannot be completed
    async fn send_chat(&self, request: ChatRequest, token: RequestToken) -> Result<ChatResponse>;
}

/// Bind a raw body stream to a request token
///
/// The returned stream checks the token before every read and races each
/// read against it. Once the token is signalled it yields a single
/// `Err(ChatError::Cancelled)` and ends; the inner stream is dropped with it,
/// which aborts the underlying connection. After any error item the stream
/// also ends.
pub fn cancellable_body<S>(body: S, token: RequestToken) -> ByteStream
where
    S: Stream<Item = Result<Bytes>> + Send + 'static,
{
    let state = (Box::pin(body), token, false);

    Box::pin(stream::unfold(
        state,
        |(mut body, token, finished)| async move {
            if finished {
                return None;
            }

            let next = tokio::select! {
                biased;
                _ = token.cancelled() => None,
                next = body.next() => Some(next),
            };

            match next {
                None => Some((Err(ChatError::Cancelled.into()), (body, token, true))),
                Some(_) if token.is_cancelled() => {
                    Some((Err(ChatError::Cancelled.into()), (body, token, true)))
                }
                Some(Some(Ok(chunk))) => Some((Ok(chunk), (body, token, false))),
                Some(Some(Err(err))) => Some((Err(err), (body, token, true))),
                Some(None) => None,
            }
        },
    ))
}
