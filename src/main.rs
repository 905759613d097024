//! Madlen Chat - streaming terminal client
//!
#![doc = "Madlen Chat - streaming terminal client"]
#![doc = "Main entry point for the madlen-chat binary."]

use anyhow::Result;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use madlen_chat::cli::{Cli, Commands};
use madlen_chat::commands;
use madlen_chat::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Initialize tracing
    init_tracing(cli.verbose);

    // Load configuration
    let config_path = cli.config.as_deref().unwrap_or("config/config.yaml");
    let config = Config::load(config_path, &cli)?;

    // Validate configuration
    config.validate()?;

    // Execute command
    match cli.command {
        Commands::Chat { model: _, session } => {
            tracing::info!("Starting interactive chat");
            if let Some(id) = session {
                tracing::debug!("Continuing session: {}", id);
            }
            commands::chat::run_chat(config, session).await?;
            Ok(())
        }
        Commands::Send {
            text,
            model: _,
            session,
        } => {
            commands::chat::run_send(config, text, session).await?;
            Ok(())
        }
        Commands::Sessions { command } => {
            tracing::info!("Starting session command");
            commands::sessions::handle_sessions(&config, command).await?;
            Ok(())
        }
        Commands::Models { json } => {
            commands::models::list_models(&config, json).await?;
            Ok(())
        }
    }
}

/// Initialize tracing subscriber with environment filter
///
/// Logs go to stderr so streamed replies on stdout stay clean.
fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "madlen_chat=debug"
    } else {
        "madlen_chat=info"
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
