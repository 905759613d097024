//! Command-line interface definition for Madlen Chat
//!
//! This module defines the CLI structure using clap's derive API,
//! providing commands for interactive chat, one-shot messages, session
//! management and model listing.

use clap::{Parser, Subcommand};

/// Madlen Chat - streaming terminal client for the Madlen chat backend
///
/// Talk to language models served by the backend, with replies rendered
/// as they stream in and conversations persisted as sessions.
#[derive(Parser, Debug, Clone)]
#[command(name = "madlen-chat")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/config.yaml")]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Override the backend base URL from config
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for Madlen Chat
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start an interactive chat
    Chat {
        /// Model to use (defaults to chat.default_model)
        #[arg(short, long)]
        model: Option<String>,

        /// Continue an existing session instead of starting a new one
        #[arg(short, long)]
        session: Option<i64>,
    },

    /// Send a single message and stream the reply to stdout
    Send {
        /// Message text
        text: String,

        /// Model to use (defaults to chat.default_model)
        #[arg(short, long)]
        model: Option<String>,

        /// Send into an existing session
        #[arg(short, long)]
        session: Option<i64>,
    },

    /// Manage stored sessions
    Sessions {
        /// Session management subcommand
        #[command(subcommand)]
        command: SessionCommand,
    },

    /// List models offered by the backend
    Models {
        /// Print the list as JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

/// Session management subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum SessionCommand {
    /// List sessions, most recent first
    List,

    /// Print the full history of a session
    Show {
        /// Session id
        id: i64,
    },

    /// Delete a session
    Delete {
        /// Session id
        id: i64,
    },
}

impl Commands {
    /// Model named on the command line, if the command takes one
    pub fn model_override(&self) -> Option<&str> {
        match self {
            Commands::Chat { model, .. } | Commands::Send { model, .. } => model.as_deref(),
            Commands::Sessions { .. } | Commands::Models { .. } => None,
        }
    }
}

impl Cli {
    /// Parse command line arguments
    ///
    /// # Returns
    ///
    /// Returns the parsed CLI structure
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

impl Default for Cli {
    fn default() -> Self {
        Self {
            config: Some("config/config.yaml".to_string()),
            verbose: false,
            base_url: None,
            command: Commands::Models { json: false },
        }
    }
}
