//! Model listing command for Madlen Chat
//!
//! Lists the models the backend can route chats to, as a table or as JSON.

use crate::config::Config;
use crate::error::{ChatError, Result};
use crate::types::ModelInfo;
use colored::Colorize;
use prettytable::{row, Table};

/// List models offered by the backend
///
/// # Arguments
///
/// * `config` - Configuration containing backend settings
/// * `json` - Print JSON instead of a table
///
/// # Examples
///
/// ```no_run
/// use madlen_chat::config::Config;
/// use madlen_chat::commands::models::list_models;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::load("config/config.yaml", &Default::default())?;
/// list_models(&config, false).await?;
/// # Ok(())
/// # }
/// ```
pub async fn list_models(config: &Config, json: bool) -> Result<()> {
    tracing::info!("Listing models from {}", config.backend.base_url);

    let engine = super::build_engine(config)?;
    let models = engine.models().await?;

    if json {
        let output = serialize_pretty(&models).map_err(ChatError::Serialization)?;
        println!("{}", output);
    } else {
        print_models_table(&models, &config.chat.default_model);
    }
    Ok(())
}

/// Serialize a value to pretty-printed JSON
fn serialize_pretty<T: serde::Serialize + ?Sized>(
    value: &T,
) -> std::result::Result<String, serde_json::Error> {
    serde_json::to_string_pretty(value)
}

/// Print models as a table, marking the one in use
pub fn print_models_table(models: &[ModelInfo], current: &str) {
    if models.is_empty() {
        println!("{}", "The backend offers no models.".yellow());
        return;
    }

    let mut table = Table::new();
    table.add_row(row!["", "Model ID", "Name"]);

    for model in models {
        let marker = if model.id == current {
            "*".green().bold().to_string()
        } else {
            String::new()
        };
        table.add_row(row![marker, model.id, model.name]);
    }

    println!("\nAvailable models:\n");
    table.printstd();
    println!();
}
