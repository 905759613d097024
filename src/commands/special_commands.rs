//! Special commands parser for interactive chat
//!
//! Lines starting with `/` are handled by the REPL instead of being sent to
//! the backend. They let the user start a new chat, browse, open and delete
//! sessions, list and switch models, show help, and exit.
//!
//! Command names are case-insensitive; arguments keep their case.

use thiserror::Error;

/// Errors that can occur when parsing special commands
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// Unknown command was entered
    #[error("Unknown command: {0}\n\nType '/help' to see available commands")]
    UnknownCommand(String),

    /// Command requires an argument but none was provided
    #[error("Command {command} requires an argument\n\nUsage: {usage}")]
    MissingArgument { command: String, usage: String },

    /// Argument could not be parsed as a session id
    #[error("Invalid session id for {command}: {arg}")]
    InvalidSessionId { command: String, arg: String },
}

/// Special commands that can be executed during interactive chat
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpecialCommand {
    /// Start an empty conversation
    NewChat,

    /// List stored sessions
    ListSessions,

    /// Load a stored session into the conversation
    OpenSession(i64),

    /// Delete a stored session
    DeleteSession(i64),

    /// List models offered by the backend
    ListModels,

    /// Use a different model for the following messages
    SwitchModel(String),

    /// Display help information
    Help,

    /// Exit the interactive session
    Exit,

    /// Not a special command; send the input as a message
    None,
}

/// Parse a line of REPL input
///
/// # Errors
///
/// Returns [`CommandError`] for unknown commands, missing arguments and
/// malformed session ids.
///
/// # Examples
///
/// ```
/// use madlen_chat::commands::special_commands::{parse_special_command, SpecialCommand};
///
/// assert_eq!(parse_special_command("/open 3").unwrap(), SpecialCommand::OpenSession(3));
/// assert_eq!(parse_special_command("hello").unwrap(), SpecialCommand::None);
/// ```
pub fn parse_special_command(input: &str) -> Result<SpecialCommand, CommandError> {
    let trimmed = input.trim();
    let lower = trimmed.to_lowercase();

    if !trimmed.starts_with('/') && lower != "exit" && lower != "quit" {
        return Ok(SpecialCommand::None);
    }

    let mut parts = trimmed.splitn(2, char::is_whitespace);
    let command = parts.next().unwrap_or_default().to_lowercase();
    let arg = parts.next().map(str::trim).unwrap_or_default();

    match command.as_str() {
        "exit" | "quit" | "/exit" | "/quit" | "/q" => Ok(SpecialCommand::Exit),
        "/help" | "/?" => Ok(SpecialCommand::Help),
        "/new" => Ok(SpecialCommand::NewChat),
        "/sessions" => Ok(SpecialCommand::ListSessions),
        "/models" => Ok(SpecialCommand::ListModels),
        "/open" => session_id("/open", "/open <session_id>", arg).map(SpecialCommand::OpenSession),
        "/delete" => {
            session_id("/delete", "/delete <session_id>", arg).map(SpecialCommand::DeleteSession)
        }
        "/model" => {
            if arg.is_empty() {
                Err(CommandError::MissingArgument {
                    command: "/model".to_string(),
                    usage: "/model <model_id>".to_string(),
                })
            } else {
                Ok(SpecialCommand::SwitchModel(arg.to_string()))
            }
        }
        _ => Err(CommandError::UnknownCommand(trimmed.to_string())),
    }
}

fn session_id(command: &str, usage: &str, arg: &str) -> Result<i64, CommandError> {
    if arg.is_empty() {
        return Err(CommandError::MissingArgument {
            command: command.to_string(),
            usage: usage.to_string(),
        });
    }
    arg.parse::<i64>()
        .map_err(|_| CommandError::InvalidSessionId {
            command: command.to_string(),
            arg: arg.to_string(),
        })
}

/// Print the special command reference
pub fn print_help() {
    println!(
        r#"
Special Commands for Interactive Chat
=====================================

CONVERSATION:
  /new            - Start a new conversation
  /sessions       - List stored sessions
  /open <id>      - Load a stored session
  /delete <id>    - Delete a stored session

MODELS:
  /models         - List models offered by the backend
  /model <id>     - Use a different model for the next messages

OTHER:
  /help, /?       - Show this help
  /quit, exit     - Leave the chat

While a reply is streaming, press Ctrl-C to stop it. The text received so
far is kept.
"#
    );
}
