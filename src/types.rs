//! Wire and domain types shared across the client
//!
//! These mirror the JSON documents exchanged with the chat backend. Field
//! names on the wire are snake_case; unknown fields are ignored.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Default model used when neither config nor CLI name one
pub const DEFAULT_MODEL: &str = "google/gemini-2.0-flash-exp:free";

/// Author of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Typed by the user
    User,
    /// Produced by the model (or a synthetic client notice)
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// A single message in a conversation
///
/// `id` is only known for messages loaded from history; locally created
/// messages carry `None` until the session is reloaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Backend-assigned identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    /// Author of the message
    pub role: Role,
    /// Message text; grows while an assistant reply streams in
    #[serde(default)]
    pub content: String,
    /// Model that produced an assistant message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_used: Option<String>,
}

impl Message {
    /// Creates a new user message
    ///
    /// # Examples
    ///
    /// ```
    /// use madlen_chat::types::{Message, Role};
    ///
    /// let msg = Message::user("Hello");
    /// assert_eq!(msg.role, Role::User);
    /// assert_eq!(msg.content, "Hello");
    /// ```
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            id: None,
            role: Role::User,
            content: content.into(),
            model_used: None,
        }
    }

    /// Creates a new assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            id: None,
            role: Role::Assistant,
            content: content.into(),
            model_used: None,
        }
    }

    /// Creates the empty assistant placeholder that a streamed reply fills
    pub fn assistant_placeholder(model: impl Into<String>) -> Self {
        Self {
            model_used: Some(model.into()),
            ..Self::assistant(String::new())
        }
    }
}

/// Summary of a persisted conversation thread
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Backend-assigned identifier
    pub id: i64,
    /// Title derived from the first user message
    pub title: String,
    /// Creation time as reported by the backend (no offset)
    pub created_at: NaiveDateTime,
}

/// A model the backend can route a chat to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Model identifier sent in `ChatRequest::model`
    pub id: String,
    /// Human-readable display name
    pub name: String,
}

/// Body of `POST /chat`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// User message text, sent verbatim
    pub content: String,
    /// Model identifier
    pub model: String,
    /// Existing session, or `None` to let the backend create one
    pub session_id: Option<i64>,
    /// Optional base64-encoded image attachment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_base64: Option<String>,
}

impl ChatRequest {
    /// Build a text-only request
    pub fn new(
        content: impl Into<String>,
        model: impl Into<String>,
        session_id: Option<i64>,
    ) -> Self {
        Self {
            content: content.into(),
            model: model.into(),
            session_id,
            image_base64: None,
        }
    }

    /// Attach an already-encoded image
    pub fn with_image(mut self, image_base64: impl Into<String>) -> Self {
        self.image_base64 = Some(image_base64.into());
        self
    }
}
