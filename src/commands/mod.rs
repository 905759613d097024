/*!
Command handlers for the CLI

This module provides command handlers invoked by the CLI entrypoint.

It exposes the following command modules:

- `chat`     — Interactive chat and one-shot `send`
- `sessions` — List, show and delete stored sessions
- `models`   — List the backend's models

Every handler builds a [`ChatEngine`] over the HTTP transport and drives it;
none of them talk to the backend directly.
*/

use std::future::Future;
use std::io::Write;
use std::sync::Arc;

use colored::Colorize;

use crate::config::Config;
use crate::conversation::CONNECTION_NOTICE;
use crate::engine::{ChatEngine, SendOutcome};
use crate::error::{ChatError, Result};
use crate::transport::http::HttpTransport;

// Session listing and history rendering
pub mod sessions;

// Special commands parser for the REPL
pub mod special_commands;

// Model listing
pub mod models;

// Chat command handler
pub mod chat {
    //! Interactive chat and one-shot send handlers.
    //!
    //! The REPL reads a line with rustyline, handles `/` commands locally and
    //! streams everything else through the engine, printing fragments as
    //! they arrive. Ctrl-C while a reply streams aborts just that reply.

    use super::special_commands::{parse_special_command, print_help, SpecialCommand};
    use super::*;
    use rustyline::error::ReadlineError;
    use rustyline::DefaultEditor;

    /// Start interactive chat
    ///
    /// # Arguments
    ///
    /// * `config` - Global configuration (consumed)
    /// * `session` - Optional session to continue
    ///
    /// # Errors
    ///
    /// Returns error if the engine cannot be built, the initial session
    /// cannot be loaded, or the terminal cannot be initialized
    pub async fn run_chat(config: Config, session: Option<i64>) -> Result<()> {
        let engine = build_engine(&config)?;
        let mut model = config.chat.default_model.clone();

        if let Some(session_id) = session {
            engine.open_session(session_id).await?;
            sessions::print_history(&engine.snapshot().messages);
        }

        let mut rl = DefaultEditor::new()?;

        print_welcome_banner(&model, config.backend.base_url.as_str());

        loop {
            let prompt = format_prompt(engine.snapshot().active_session_id);
            match rl.readline(&prompt) {
                Ok(line) => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    let _ = rl.add_history_entry(trimmed);

                    match parse_special_command(trimmed) {
                        Ok(SpecialCommand::Exit) => break,
                        Ok(SpecialCommand::Help) => {
                            print_help();
                            continue;
                        }
                        Ok(SpecialCommand::NewChat) => {
                            engine.new_chat();
                            println!("{}\n", "Started a new conversation.".green());
                            continue;
                        }
                        Ok(SpecialCommand::ListSessions) => {
                            match interruptible(engine.directory().refresh()).await {
                                Ok(list) => sessions::print_sessions_table(&list),
                                Err(e) => eprintln!("{}", format!("Error: {}", e).red()),
                            }
                            continue;
                        }
                        Ok(SpecialCommand::OpenSession(session_id)) => {
                            match interruptible(engine.open_session(session_id)).await {
                                Ok(()) => sessions::print_history(&engine.snapshot().messages),
                                Err(e) => eprintln!("{}", format!("Error: {}", e).red()),
                            }
                            continue;
                        }
                        Ok(SpecialCommand::DeleteSession(session_id)) => {
                            match interruptible(engine.delete_session(session_id)).await {
                                Ok(()) => println!(
                                    "{}\n",
                                    format!("Deleted session {}", session_id).green()
                                ),
                                Err(e) => eprintln!("{}", format!("Error: {}", e).red()),
                            }
                            continue;
                        }
                        Ok(SpecialCommand::ListModels) => {
                            match interruptible(engine.models()).await {
                                Ok(list) => models::print_models_table(&list, &model),
                                Err(e) => eprintln!("{}", format!("Error: {}", e).red()),
                            }
                            continue;
                        }
                        Ok(SpecialCommand::SwitchModel(new_model)) => {
                            println!("Switched model from {} to {}\n", model, new_model.cyan());
                            model = new_model;
                            continue;
                        }
                        Ok(SpecialCommand::None) => {}
                        Err(e) => {
                            eprintln!("{}\n", e.to_string().red());
                            continue;
                        }
                    }

                    if let Err(e) = stream_reply(&engine, trimmed, &model).await {
                        eprintln!("{}\n", format!("Error: {}", e).red());
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    println!("CTRL-C");
                    break;
                }
                Err(ReadlineError::Eof) => {
                    println!("CTRL-D");
                    break;
                }
                Err(err) => {
                    tracing::error!("Readline error: {:?}", err);
                    break;
                }
            }
        }

        println!("Goodbye!");
        Ok(())
    }

    /// Send one message and stream the reply to stdout
    ///
    /// The id of a newly created session is printed to stderr so the
    /// conversation can be continued with `--session`.
    ///
    /// # Errors
    ///
    /// Returns error if the session cannot be loaded or the reply failed
    pub async fn run_send(config: Config, text: String, session: Option<i64>) -> Result<()> {
        let engine = build_engine(&config)?;
        if let Some(session_id) = session {
            engine.open_session(session_id).await?;
        }

        let outcome = stream_reply(&engine, &text, &config.chat.default_model).await?;

        if session.is_none() {
            if let Some(session_id) = engine.snapshot().active_session_id {
                eprintln!("Session: {}", session_id);
            }
        }

        match outcome {
            SendOutcome::Failed(kind) => Err(anyhow::anyhow!("Reply failed ({:?})", kind)),
            SendOutcome::Completed | SendOutcome::Aborted => Ok(()),
        }
    }

    fn format_prompt(session_id: Option<i64>) -> String {
        match session_id {
            Some(id) => format!("[#{}] >>> ", id),
            None => "[new] >>> ".to_string(),
        }
    }

    fn print_welcome_banner(model: &str, base_url: &str) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║              Madlen Chat - Interactive Session               ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");
        println!("Backend: {}", base_url.cyan());
        println!("Model:   {}\n", model.cyan());
        println!("Type '/help' for available commands, 'exit' to quit\n");
    }
}

/// Build an engine over the configured HTTP backend
pub fn build_engine(config: &Config) -> Result<ChatEngine> {
    let transport = HttpTransport::new(&config.backend)?;
    tracing::debug!("Using backend at {}", transport.base_url());
    Ok(ChatEngine::new(Arc::new(transport)))
}

/// Run a backend call that Ctrl-C can interrupt
///
/// The Ctrl-C listener installed by `stream_reply` replaces the default
/// SIGINT exit for the rest of the process.
async fn interruptible<T>(work: impl Future<Output = Result<T>>) -> Result<T> {
    until_interrupted(work, async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    })
    .await
}

async fn until_interrupted<T>(
    work: impl Future<Output = Result<T>>,
    interrupt: impl Future<Output = ()>,
) -> Result<T> {
    tokio::select! {
        result = work => result,
        _ = interrupt => Err(ChatError::Cancelled.into()),
    }
}

/// Send `content` and print the reply as it streams
///
/// Ctrl-C during the stream aborts the reply and keeps what arrived.
async fn stream_reply(engine: &ChatEngine, content: &str, model: &str) -> Result<SendOutcome> {
    let watcher = engine.clone();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            watcher.abort();
        }
    });

    let outcome = engine
        .send(content, model, None, |fragment| {
            print!("{}", fragment);
            let _ = std::io::stdout().flush();
        })
        .await;
    interrupt.abort();
    println!();

    let outcome = outcome?;
    match outcome {
        SendOutcome::Completed => println!(),
        SendOutcome::Aborted => println!("{}\n", "[reply stopped]".dimmed()),
        SendOutcome::Failed(kind) => {
            tracing::debug!(?kind, "Reply failed");
            println!("{}\n", CONNECTION_NOTICE.trim_start().red());
        }
    }
    Ok(outcome)
}
