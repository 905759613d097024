//! Conversation state machine
//!
//! [`ConversationState`] owns the ordered message list and the active session
//! identity of one conversation. A conversation is either idle or streaming
//! exactly one assistant reply:
//!
//! ```text
//! Idle --start_send--> Streaming --complete_stream--> Idle
//!                          |------abort-------------> Idle (partial text kept)
//!                          |------fail_stream-------> Idle (+ notice message)
//! ```
//!
//! Every mutation that belongs to a request takes the [`RequestToken`] that
//! `start_send` returned. Calls carrying any other token (a superseded or
//! aborted request) are ignored, so a late fragment from an old request can
//! never land in a newer reply.

use crate::cancel::{CancellationController, RequestToken};
use crate::error::ChatError;
use crate::types::{Message, Role};

/// Assistant message appended when a reply fails for a reason other than
/// cancellation
pub const CONNECTION_NOTICE: &str =
    "\n\n⚠️ I'm sorry, I couldn't connect to the server. Is the backend running?";

/// Whether a reply is in flight
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// No request in flight
    Idle,
    /// A reply is accumulating in the last message
    Streaming,
}

/// Point-in-time copy of a conversation, safe to hand to renderers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationSnapshot {
    /// Session the conversation belongs to, if the backend assigned one
    pub active_session_id: Option<i64>,
    /// Messages in display order
    pub messages: Vec<Message>,
    /// Streaming status at the time of the snapshot
    pub status: Status,
}

/// Owned, mutable state of the active conversation
///
/// The status is derived from the held token: the conversation is streaming
/// exactly when a token is held, and while it is, the last message is the
/// assistant reply being filled.
#[derive(Debug, Default)]
pub struct ConversationState {
    controller: CancellationController,
    active_session_id: Option<i64>,
    messages: Vec<Message>,
    active_token: Option<RequestToken>,
}

impl ConversationState {
    /// Creates an empty conversation with no active session
    pub fn new() -> Self {
        Self::default()
    }

    /// Current status
    pub fn status(&self) -> Status {
        if self.active_token.is_some() {
            Status::Streaming
        } else {
            Status::Idle
        }
    }

    /// Returns true while a reply is streaming
    pub fn is_streaming(&self) -> bool {
        self.status() == Status::Streaming
    }

    /// Messages in display order
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Session the conversation is bound to
    pub fn active_session_id(&self) -> Option<i64> {
        self.active_session_id
    }

    /// Returns true if `token` belongs to the request currently streaming
    pub fn is_current(&self, token: &RequestToken) -> bool {
        self.active_token
            .as_ref()
            .is_some_and(|active| active.same_request(token))
    }

    /// Copy the visible state
    pub fn snapshot(&self) -> ConversationSnapshot {
        ConversationSnapshot {
            active_session_id: self.active_session_id,
            messages: self.messages.clone(),
            status: self.status(),
        }
    }

    /// Begin a send
    ///
    /// Appends the user message verbatim and an empty assistant placeholder
    /// tagged with `model`, records `session_id` as the optimistic active
    /// session and issues a fresh token for the request.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::AlreadyStreaming`] if a reply is still in flight;
    /// the state is left untouched.
    ///
    /// # Examples
    ///
    /// ```
    /// use madlen_chat::conversation::{ConversationState, Status};
    ///
    /// let mut state = ConversationState::new();
    /// let token = state.start_send("hi", "m1", None).unwrap();
    /// assert_eq!(state.messages().len(), 2);
    /// assert_eq!(state.status(), Status::Streaming);
    /// assert!(state.is_current(&token));
    /// ```
    pub fn start_send(
        &mut self,
        content: &str,
        model: &str,
        session_id: Option<i64>,
    ) -> Result<RequestToken, ChatError> {
        if self.is_streaming() {
            return Err(ChatError::AlreadyStreaming);
        }

        self.messages.push(Message::user(content));
        self.messages.push(Message::assistant_placeholder(model));
        self.active_session_id = session_id;

        let token = self.controller.issue();
        self.active_token = Some(token.clone());
        tracing::debug!(generation = token.generation(), "Reply streaming started");
        Ok(token)
    }

    /// Append a fragment to the reply bound to `token`
    ///
    /// Returns false, leaving the state untouched, when `token` is stale or
    /// signalled, or when the last message is not an assistant message.
    pub fn apply_fragment(&mut self, token: &RequestToken, text: &str) -> bool {
        if !self.is_current(token) || token.is_cancelled() {
            return false;
        }

        match self.messages.last_mut() {
            Some(message) if message.role == Role::Assistant => {
                message.content.push_str(text);
                true
            }
            _ => false,
        }
    }

    /// Finish the reply bound to `token`
    ///
    /// Returns false if `token` is not the current request.
    pub fn complete_stream(&mut self, token: &RequestToken) -> bool {
        if !self.is_current(token) {
            return false;
        }
        self.active_token = None;
        tracing::debug!(generation = token.generation(), "Reply completed");
        true
    }

    /// Stop the current reply, keeping whatever text has arrived
    ///
    /// Signals the request's token so the transport tears the request down.
    /// Returns false (and does nothing) when idle.
    pub fn abort(&mut self) -> bool {
        match self.active_token.take() {
            Some(token) => {
                token.signal();
                tracing::debug!(generation = token.generation(), "Reply aborted");
                true
            }
            None => false,
        }
    }

    /// End the reply bound to `token` because of `cause`
    ///
    /// A cancellation is handled exactly like [`ConversationState::abort`].
    /// Any other cause leaves the partial reply in place and appends a new
    /// assistant message holding [`CONNECTION_NOTICE`]. Returns false if
    /// `token` is not the current request.
    pub fn fail_stream(&mut self, token: &RequestToken, cause: &anyhow::Error) -> bool {
        if !self.is_current(token) {
            return false;
        }

        if token.is_cancelled() || ChatError::is_cancellation(cause) {
            self.abort();
            return true;
        }

        self.active_token = None;
        tracing::debug!(generation = token.generation(), error = %cause, "Reply failed");
        self.messages.push(Message::assistant(CONNECTION_NOTICE));
        true
    }

    /// Latch the session id the backend assigned to a new conversation
    ///
    /// Only the first id is kept. Returns true when the id was recorded, i.e.
    /// a new session now exists and the session list is out of date.
    pub fn observe_assigned_session_id(&mut self, session_id: i64) -> bool {
        if self.active_session_id.is_some() {
            return false;
        }
        self.active_session_id = Some(session_id);
        tracing::info!(session_id, "New session assigned");
        true
    }

    /// Replace the conversation with a loaded session
    ///
    /// A streaming reply is aborted first.
    pub fn switch_to_session(&mut self, session_id: i64, history: Vec<Message>) {
        self.abort();
        self.messages = history;
        self.active_session_id = Some(session_id);
    }

    /// Reset to an empty conversation with no session
    ///
    /// A streaming reply is aborted first.
    pub fn new_chat(&mut self) {
        self.abort();
        self.messages.clear();
        self.active_session_id = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contents(state: &ConversationState) -> Vec<(Role, &str)> {
        state
            .messages()
            .iter()
            .map(|m| (m.role, m.content.as_str()))
            .collect()
    }

    #[test]
    fn test_new_state_is_idle_and_empty() {
        let state = ConversationState::new();
        assert_eq!(state.status(), Status::Idle);
        assert!(state.messages().is_empty());
        assert_eq!(state.active_session_id(), None);
    }

    #[test]
    fn test_start_send_appends_user_and_placeholder() {
        let mut state = ConversationState::new();
        state.start_send("hi", "m", Some(3)).unwrap();

        assert_eq!(state.messages().len(), 2);
        assert_eq!(state.messages()[0], Message::user("hi"));
        assert_eq!(state.messages()[1], Message::assistant_placeholder("m"));
        assert_eq!(state.active_session_id(), Some(3));
        assert!(state.is_streaming());
    }

    #[test]
    fn test_start_send_while_streaming_is_rejected() {
        let mut state = ConversationState::new();
        let first = state.start_send("one", "m", None).unwrap();

        let err = state.start_send("two", "m", None).unwrap_err();
        assert!(matches!(err, ChatError::AlreadyStreaming));
        assert_eq!(state.messages().len(), 2);
        assert!(state.is_current(&first));
    }

    #[test]
    fn test_completed_reply_concatenates_fragments() {
        let mut state = ConversationState::new();
        let token = state.start_send("Hello", "m1", None).unwrap();
        for fragment in ["Hi", " there", "!"] {
            assert!(state.apply_fragment(&token, fragment));
        }
        assert!(state.complete_stream(&token));

        assert_eq!(
            contents(&state),
            vec![(Role::User, "Hello"), (Role::Assistant, "Hi there!")]
        );
        assert_eq!(state.messages()[1].model_used.as_deref(), Some("m1"));
        assert_eq!(state.status(), Status::Idle);
    }

    #[test]
    fn test_abort_keeps_partial_content() {
        let mut state = ConversationState::new();
        let token = state.start_send("Hello", "m1", None).unwrap();
        state.apply_fragment(&token, "Par");

        assert!(state.abort());
        assert!(token.is_cancelled());
        assert_eq!(state.status(), Status::Idle);
        assert_eq!(
            contents(&state),
            vec![(Role::User, "Hello"), (Role::Assistant, "Par")]
        );

        // in-flight fragment after the abort
        assert!(!state.apply_fragment(&token, "tial"));
        assert_eq!(state.messages()[1].content, "Par");
    }

    #[test]
    fn test_abort_when_idle_is_noop() {
        let mut state = ConversationState::new();
        assert!(!state.abort());
        assert!(!state.abort());
        assert!(state.messages().is_empty());
    }

    #[test]
    fn test_backend_failure_appends_notice_after_empty_reply() {
        let mut state = ConversationState::new();
        let token = state.start_send("Hello", "m1", None).unwrap();
        let cause = anyhow::Error::from(ChatError::BackendFailure {
            status: 500,
            message: "boom".to_string(),
        });

        assert!(state.fail_stream(&token, &cause));
        assert_eq!(
            contents(&state),
            vec![
                (Role::User, "Hello"),
                (Role::Assistant, ""),
                (Role::Assistant, CONNECTION_NOTICE),
            ]
        );
        assert_eq!(state.status(), Status::Idle);
    }

    #[test]
    fn test_failure_does_not_overwrite_partial_reply() {
        let mut state = ConversationState::new();
        let token = state.start_send("Hello", "m1", None).unwrap();
        state.apply_fragment(&token, "Half an ans");
        let cause = anyhow::Error::from(ChatError::NetworkFailure("reset".to_string()));

        state.fail_stream(&token, &cause);
        assert_eq!(state.messages()[1].content, "Half an ans");
        assert_eq!(state.messages()[2].content, CONNECTION_NOTICE);
    }

    #[test]
    fn test_cancellation_failure_behaves_like_abort() {
        let mut state = ConversationState::new();
        let token = state.start_send("Hello", "m1", None).unwrap();
        state.apply_fragment(&token, "Par");

        let cause = anyhow::Error::from(ChatError::Cancelled);
        assert!(state.fail_stream(&token, &cause));
        assert_eq!(state.messages().len(), 2);
        assert_eq!(state.messages()[1].content, "Par");
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_stale_fragment_does_not_reach_new_reply() {
        let mut state = ConversationState::new();
        let first = state.start_send("one", "m", None).unwrap();
        state.apply_fragment(&first, "A");
        state.abort();

        let second = state.start_send("two", "m", None).unwrap();
        assert!(!state.apply_fragment(&first, "stale"));
        assert!(state.apply_fragment(&second, "B"));

        assert_eq!(state.messages()[1].content, "A");
        assert_eq!(state.messages()[3].content, "B");
    }

    #[test]
    fn test_stale_token_cannot_finish_or_fail_new_reply() {
        let mut state = ConversationState::new();
        let first = state.start_send("one", "m", None).unwrap();
        state.abort();
        let second = state.start_send("two", "m", None).unwrap();

        assert!(!state.complete_stream(&first));
        let cause = anyhow::Error::from(ChatError::NetworkFailure("late".to_string()));
        assert!(!state.fail_stream(&first, &cause));

        assert!(state.is_current(&second));
        assert_eq!(state.messages().len(), 4);
        assert!(!second.is_cancelled());
    }

    #[test]
    fn test_signalling_stale_token_does_not_cancel_new_request() {
        let mut state = ConversationState::new();
        let first = state.start_send("one", "m", None).unwrap();
        state.abort();
        let second = state.start_send("two", "m", None).unwrap();

        first.signal();
        assert!(state.apply_fragment(&second, "still here"));
    }

    #[test]
    fn test_session_id_latch_keeps_first_value() {
        let mut state = ConversationState::new();
        assert!(state.observe_assigned_session_id(5));
        assert!(!state.observe_assigned_session_id(9));
        assert_eq!(state.active_session_id(), Some(5));
    }

    #[test]
    fn test_existing_session_is_not_replaced_by_hint() {
        let mut state = ConversationState::new();
        state.start_send("hi", "m", Some(2)).unwrap();
        assert!(!state.observe_assigned_session_id(7));
        assert_eq!(state.active_session_id(), Some(2));
    }

    #[test]
    fn test_switch_to_session_while_streaming_aborts_first() {
        let mut state = ConversationState::new();
        let token = state.start_send("hi", "m", None).unwrap();
        let history = vec![Message::user("old"), Message::assistant("reply")];

        state.switch_to_session(4, history.clone());
        assert!(token.is_cancelled());
        assert_eq!(state.status(), Status::Idle);
        assert_eq!(state.messages(), history.as_slice());
        assert_eq!(state.active_session_id(), Some(4));
        assert!(!state.apply_fragment(&token, "late"));
    }

    #[test]
    fn test_new_chat_resets_everything() {
        let mut state = ConversationState::new();
        let token = state.start_send("hi", "m", Some(1)).unwrap();
        state.new_chat();

        assert!(token.is_cancelled());
        assert!(state.messages().is_empty());
        assert_eq!(state.active_session_id(), None);
        assert_eq!(state.status(), Status::Idle);
    }

    #[test]
    fn test_snapshot_reflects_state() {
        let mut state = ConversationState::new();
        let token = state.start_send("hi", "m", None).unwrap();
        state.apply_fragment(&token, "yo");

        let snapshot = state.snapshot();
        assert_eq!(snapshot.status, Status::Streaming);
        assert_eq!(snapshot.messages[1].content, "yo");
        assert_eq!(snapshot.active_session_id, None);
    }
}
