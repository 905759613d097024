//! Streaming conversation engine
//!
//! [`ChatEngine`] ties the pieces together: it opens a request through the
//! [`Transport`], decodes the body into text fragments, applies each fragment
//! to the shared [`ConversationState`] and settles the reply as completed,
//! aborted or failed.
//!
//! Fragments are pulled one at a time. The next body chunk is only read once
//! the previous fragment has been applied and handed to the caller's
//! callback, so a slow consumer slows the read loop down instead of growing a
//! queue.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::StreamExt;

use crate::cancel::RequestToken;
use crate::conversation::{ConversationSnapshot, ConversationState};
use crate::decoder::decode_stream;
use crate::directory::SessionDirectory;
use crate::error::{ChatError, FailureKind, Result};
use crate::transport::Transport;
use crate::types::{ChatRequest, ModelInfo};

/// How a send ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// The whole reply streamed in
    Completed,
    /// The reply was aborted (or superseded); partial text is kept
    Aborted,
    /// The reply failed and a connectivity notice was appended
    Failed(FailureKind),
}

/// Handle to the active conversation
///
/// Clones share the same conversation and session directory, so one clone
/// can stream a reply while another aborts it.
#[derive(Debug, Clone)]
pub struct ChatEngine {
    transport: Arc<dyn Transport>,
    state: Arc<Mutex<ConversationState>>,
    directory: SessionDirectory,
}

impl ChatEngine {
    /// Create an engine with an empty conversation
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            directory: SessionDirectory::new(transport.clone()),
            transport,
            state: Arc::new(Mutex::new(ConversationState::new())),
        }
    }

    /// The session directory shared with this engine
    pub fn directory(&self) -> &SessionDirectory {
        &self.directory
    }

    /// Copy of the current conversation
    pub fn snapshot(&self) -> ConversationSnapshot {
        self.state().snapshot()
    }

    /// Returns true while a reply is streaming
    pub fn is_streaming(&self) -> bool {
        self.state().is_streaming()
    }

    /// Send a user message and stream the reply into the conversation
    ///
    /// The message goes to the active session, or starts a new one when
    /// there is none. `on_fragment` sees every fragment right after it was
    /// added to the reply. Failures while streaming are absorbed into the
    /// conversation and reported through the returned [`SendOutcome`].
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::AlreadyStreaming`] if another reply is in flight.
    pub async fn send<F>(
        &self,
        content: &str,
        model: &str,
        image_base64: Option<String>,
        mut on_fragment: F,
    ) -> Result<SendOutcome>
    where
        F: FnMut(&str) + Send,
    {
        let (token, session_id) = {
            let mut state = self.state();
            let session_id = state.active_session_id();
            (state.start_send(content, model, session_id)?, session_id)
        };

        let mut request = ChatRequest::new(content, model, session_id);
        if let Some(image) = image_base64 {
            request = request.with_image(image);
        }

        let response = match self.transport.send_chat(request, token.clone()).await {
            Ok(response) => response,
            Err(error) => return Ok(self.settle_failure(&token, error)),
        };

        if let Some(session_id) = response.session_id_hint {
            self.observe_session_id(&token, session_id);
        }

        let mut fragments = decode_stream(response.body);
        let mut applied = 0usize;
        while let Some(fragment) = fragments.next().await {
            let text = match fragment {
                Ok(text) => text,
                Err(error) => return Ok(self.settle_failure(&token, error)),
            };

            if !self.state().apply_fragment(&token, &text) {
                tracing::debug!(generation = token.generation(), "Dropping fragment of stale reply");
                return Ok(SendOutcome::Aborted);
            }
            applied += 1;
            on_fragment(&text);
        }

        if self.state().complete_stream(&token) {
            tracing::debug!(fragments = applied, "Reply streamed");
            Ok(SendOutcome::Completed)
        } else {
            Ok(SendOutcome::Aborted)
        }
    }

    /// Abort the streaming reply, if any
    ///
    /// Returns true if a reply was aborted.
    pub fn abort(&self) -> bool {
        self.state().abort()
    }

    /// Start over with an empty conversation and no session
    pub fn new_chat(&self) {
        self.state().new_chat();
    }

    /// Load a stored session and make it the active conversation
    ///
    /// A streaming reply is aborted.
    ///
    /// # Errors
    ///
    /// Returns the transport error; the current conversation is kept.
    pub async fn open_session(&self, session_id: i64) -> Result<()> {
        let history = self.transport.session_history(session_id).await?;
        tracing::info!(session_id, messages = history.len(), "Session opened");
        self.state().switch_to_session(session_id, history);
        Ok(())
    }

    /// Delete a session, resetting the conversation if it was the active one
    ///
    /// # Errors
    ///
    /// Returns the transport error; nothing is changed locally.
    pub async fn delete_session(&self, session_id: i64) -> Result<()> {
        self.directory.remove(session_id).await?;

        let mut state = self.state();
        if state.active_session_id() == Some(session_id) {
            state.new_chat();
        }
        Ok(())
    }

    /// Models offered by the backend
    pub async fn models(&self) -> Result<Vec<ModelInfo>> {
        self.transport.list_models().await
    }

    fn state(&self) -> MutexGuard<'_, ConversationState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn observe_session_id(&self, token: &RequestToken, session_id: i64) {
        let is_new = {
            let mut state = self.state();
            state.is_current(token) && state.observe_assigned_session_id(session_id)
        };
        if !is_new {
            return;
        }

        let directory = self.directory.clone();
        tokio::spawn(async move {
            if let Err(e) = directory.refresh().await {
                tracing::warn!("Failed to refresh session list: {}", e);
            }
        });
    }

    fn settle_failure(&self, token: &RequestToken, error: anyhow::Error) -> SendOutcome {
        let kind = ChatError::kind_of(&error);
        let mut state = self.state();

        if !state.is_current(token) {
            return SendOutcome::Aborted;
        }
        state.fail_stream(token, &error);

        if kind == FailureKind::Cancelled || token.is_cancelled() {
            SendOutcome::Aborted
        } else {
            tracing::warn!("Reply failed: {:#}", error);
            SendOutcome::Failed(kind)
        }
    }
}
