//! Madlen Chat - streaming conversational client library
//!
//! This library provides a client for a language-model chat backend: it
//! sends user messages, renders the assistant reply as it streams in,
//! supports cancelling a reply mid-stream, and switches between persisted
//! conversation threads (sessions).
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `transport`: backend access (`Transport` trait, reqwest implementation)
//! - `decoder`: incremental UTF-8 decoding of the streamed body
//! - `cancel`: per-request cancellation tokens
//! - `conversation`: the conversation state machine
//! - `directory`: cached session list
//! - `engine`: `ChatEngine`, which drives a send end to end
//! - `config`: configuration management and validation
//! - `error`: error types and result aliases
//! - `cli` / `commands`: command-line interface and handlers
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use madlen_chat::{ChatEngine, Config};
//! use madlen_chat::transport::http::HttpTransport;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.yaml", &Default::default())?;
//!     config.validate()?;
//!
//!     let engine = ChatEngine::new(Arc::new(HttpTransport::new(&config.backend)?));
//!     engine
//!         .send("Hello", &config.chat.default_model, None, |fragment| print!("{}", fragment))
//!         .await?;
//!     Ok(())
//! }
//! ```

pub mod cancel;
pub mod cli;
pub mod commands;
pub mod config;
pub mod conversation;
pub mod decoder;
pub mod directory;
pub mod engine;
pub mod error;
pub mod transport;
pub mod types;

// Re-export commonly used types
pub use cancel::{CancellationController, RequestToken};
pub use config::Config;
pub use conversation::{ConversationSnapshot, ConversationState, Status};
pub use directory::SessionDirectory;
pub use engine::{ChatEngine, SendOutcome};
pub use error::{ChatError, FailureKind, Result};
pub use types::{ChatRequest, Message, ModelInfo, Role, Session};
