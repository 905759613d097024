//! In-process fake backend for unit tests
//!
//! [`FakeTransport`] keeps sessions, histories and models in memory and
//! answers `send_chat` from a queue of scripted [`FakeReply`] values. A
//! [`FakeReply::live`] reply hands the test a [`LiveReply`] sender so chunks
//! can be pushed one at a time while the engine is mid-stream.
//!
//! Like the real backend, a chat that starts a new session (request without
//! `session_id`, reply with a session id) inserts that session at the front
//! of the session list.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::NaiveDate;
use futures::stream;
use tokio::sync::mpsc;

use crate::cancel::RequestToken;
use crate::error::{ChatError, Result};
use crate::transport::{cancellable_body, ChatResponse, Transport};
use crate::types::{ChatRequest, Message, ModelInfo, Session};

/// Scripted answer to one `send_chat` call
#[derive(Debug)]
pub enum FakeReply {
    /// Stream these chunks, then end
    Chunks {
        session_id: Option<i64>,
        chunks: Vec<Vec<u8>>,
    },
    /// Stream whatever the paired [`LiveReply`] sends
    Live {
        session_id: Option<i64>,
        receiver: mpsc::UnboundedReceiver<Result<Bytes>>,
    },
    /// Fail before any body is produced
    Fail(ChatError),
}

impl FakeReply {
    /// Reply with UTF-8 text fragments
    pub fn text(session_id: Option<i64>, fragments: &[&str]) -> Self {
        Self::Chunks {
            session_id,
            chunks: fragments.iter().map(|f| f.as_bytes().to_vec()).collect(),
        }
    }

    /// Reply driven chunk by chunk from the test
    pub fn live(session_id: Option<i64>) -> (Self, LiveReply) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (
            Self::Live {
                session_id,
                receiver,
            },
            LiveReply { sender },
        )
    }

    fn session_id(&self) -> Option<i64> {
        match self {
            Self::Chunks { session_id, .. } | Self::Live { session_id, .. } => *session_id,
            Self::Fail(_) => None,
        }
    }
}

/// Test-side handle of a [`FakeReply::Live`] stream
///
/// Dropping the handle ends the stream normally.
#[derive(Debug, Clone)]
pub struct LiveReply {
    sender: mpsc::UnboundedSender<Result<Bytes>>,
}

impl LiveReply {
    /// Push a text chunk
    pub fn send(&self, text: &str) {
        self.send_bytes(text.as_bytes());
    }

    /// Push raw bytes
    pub fn send_bytes(&self, bytes: &[u8]) {
        let _ = self.sender.send(Ok(Bytes::copy_from_slice(bytes)));
    }

    /// Break the stream with an error
    pub fn fail(&self, error: ChatError) {
        let _ = self.sender.send(Err(error.into()));
    }
}

#[derive(Debug, Default)]
struct FakeState {
    models: Vec<ModelInfo>,
    sessions: Vec<Session>,
    histories: HashMap<i64, Vec<Message>>,
    replies: VecDeque<FakeReply>,
    chat_requests: Vec<ChatRequest>,
    fail_session_listing: bool,
    fail_delete: bool,
    list_sessions_calls: usize,
}

/// In-memory [`Transport`] for tests
#[derive(Debug, Default)]
pub struct FakeTransport {
    state: Mutex<FakeState>,
}

impl FakeTransport {
    /// Empty backend with no sessions, models or scripted replies
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a model
    pub fn with_model(self, id: &str, name: &str) -> Self {
        self.lock().models.push(ModelInfo {
            id: id.to_string(),
            name: name.to_string(),
        });
        self
    }

    /// Register a stored session with its history (appended, so add newest first)
    pub fn with_session(self, id: i64, title: &str, history: Vec<Message>) -> Self {
        {
            let mut state = self.lock();
            state.sessions.push(Session {
                id,
                title: title.to_string(),
                created_at: fixed_timestamp(),
            });
            state.histories.insert(id, history);
        }
        self
    }

    /// Queue the answer to the next `send_chat`
    pub fn push_reply(&self, reply: FakeReply) {
        self.lock().replies.push_back(reply);
    }

    /// Make `list_sessions` fail (or succeed again)
    pub fn set_session_listing_failure(&self, fail: bool) {
        self.lock().fail_session_listing = fail;
    }

    /// Make `delete_session` fail (or succeed again)
    pub fn set_delete_failure(&self, fail: bool) {
        self.lock().fail_delete = fail;
    }

    /// Every request body received by `send_chat`, in order
    pub fn chat_requests(&self) -> Vec<ChatRequest> {
        self.lock().chat_requests.clone()
    }

    /// Number of `list_sessions` calls so far
    pub fn list_sessions_calls(&self) -> usize {
        self.lock().list_sessions_calls
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().expect("fake transport state poisoned")
    }
}

fn fixed_timestamp() -> chrono::NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 5, 1)
        .and_then(|d| d.and_hms_opt(10, 0, 0))
        .expect("valid fixed timestamp")
}

#[async_trait]
impl Transport for FakeTransport {
    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        Ok(self.lock().models.clone())
    }

    async fn list_sessions(&self) -> Result<Vec<Session>> {
        let mut state = self.lock();
        state.list_sessions_calls += 1;
        if state.fail_session_listing {
            return Err(ChatError::BackendFailure {
                status: 500,
                message: "Internal Server Error".to_string(),
            }
            .into());
        }
        Ok(state.sessions.clone())
    }

    async fn session_history(&self, session_id: i64) -> Result<Vec<Message>> {
        Ok(self
            .lock()
            .histories
            .get(&session_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn delete_session(&self, session_id: i64) -> Result<()> {
        let mut state = self.lock();
        if state.fail_delete {
            return Err(ChatError::BackendFailure {
                status: 500,
                message: "Internal Server Error".to_string(),
            }
            .into());
        }
        state.sessions.retain(|s| s.id != session_id);
        state.histories.remove(&session_id);
        Ok(())
    }

    async fn send_chat(&self, request: ChatRequest, token: RequestToken) -> Result<ChatResponse> {
        if token.is_cancelled() {
            return Err(ChatError::Cancelled.into());
        }

        let reply = {
            let mut state = self.lock();
            state.chat_requests.push(request.clone());
            let reply = state
                .replies
                .pop_front()
                .ok_or_else(|| ChatError::NetworkFailure("no scripted reply".to_string()))?;

            if let (None, Some(id)) = (request.session_id, reply.session_id()) {
                let title = format!(
                    "{}...",
                    request.content.split_whitespace().take(4).collect::<Vec<_>>().join(" ")
                );
                state.sessions.insert(
                    0,
                    Session {
                        id,
                        title,
                        created_at: fixed_timestamp(),
                    },
                );
            }
            reply
        };

        match reply {
            FakeReply::Fail(error) => Err(error.into()),
            FakeReply::Chunks { session_id, chunks } => {
                let body = stream::iter(chunks.into_iter().map(|c| Ok(Bytes::from(c))));
                Ok(ChatResponse {
                    session_id_hint: session_id,
                    body: cancellable_body(body, token),
                })
            }
            FakeReply::Live {
                session_id,
                receiver,
            } => {
                let body = stream::unfold(receiver, |mut rx| async move {
                    rx.recv().await.map(|item| (item, rx))
                });
                Ok(ChatResponse {
                    session_id_hint: session_id,
                    body: cancellable_body(body, token),
                })
            }
        }
    }
}
