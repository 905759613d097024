use crate::cli::SessionCommand;
use crate::config::Config;
use crate::error::Result;
use crate::types::{Message, Role, Session};
use colored::Colorize;
use prettytable::{format, Table};

const MAX_TITLE_CHARS: usize = 40;

/// Handle session commands
pub async fn handle_sessions(config: &Config, command: SessionCommand) -> Result<()> {
    let engine = super::build_engine(config)?;

    match command {
        SessionCommand::List => {
            let sessions = engine.directory().refresh().await?;
            print_sessions_table(&sessions);
        }
        SessionCommand::Show { id } => {
            engine.open_session(id).await?;
            let messages = engine.snapshot().messages;
            if messages.is_empty() {
                println!("{}", format!("Session {} has no messages.", id).yellow());
            } else {
                print_history(&messages);
            }
        }
        SessionCommand::Delete { id } => {
            engine.delete_session(id).await?;
            println!("{}", format!("Deleted session {}", id).green());
        }
    }

    Ok(())
}

/// Print sessions as a table, most recent first
pub fn print_sessions_table(sessions: &[Session]) {
    if sessions.is_empty() {
        println!("{}", "No sessions found.".yellow());
        return;
    }

    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_BORDERS_ONLY);

    table.add_row(prettytable::row![
        "ID".bold(),
        "Title".bold(),
        "Created".bold()
    ]);

    for session in sessions {
        let created = session.created_at.format("%Y-%m-%d %H:%M").to_string();
        table.add_row(prettytable::row![
            session.id.to_string().cyan(),
            truncate_title(&session.title, MAX_TITLE_CHARS),
            created
        ]);
    }

    println!("\nSessions:");
    table.printstd();
    println!();
    println!(
        "Use {} to continue a session.",
        "madlen-chat chat --session <ID>".cyan()
    );
    println!();
}

/// Print a conversation transcript
pub fn print_history(messages: &[Message]) {
    println!();
    for message in messages {
        match message.role {
            Role::User => println!("{}", "You".cyan().bold()),
            Role::Assistant => match &message.model_used {
                Some(model) => println!("{} {}", "Assistant".green().bold(), model.dimmed()),
                None => println!("{}", "Assistant".green().bold()),
            },
        }
        println!("{}\n", message.content.trim_start());
    }
}

fn truncate_title(title: &str, max_chars: usize) -> String {
    if title.chars().count() <= max_chars {
        return title.to_string();
    }
    let kept: String = title.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{}...", kept)
}
