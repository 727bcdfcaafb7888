use std::collections::BTreeMap;

use clap::{Parser, Subcommand};

use crate::clients::calendar_client::HttpCalendarSource;
use crate::config::BindingConfig;
use crate::models::channel::ChannelState;
use crate::runtime;

#[derive(Parser)]
#[command(name = "ical-binding", about = "Publishes current and next iCalendar events")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Keep the calendar in sync and serve channel state over HTTP.
    Run,
    /// Fetch once and print every channel as JSON.
    Show,
    /// Print the resolved configuration.
    CheckConfig,
}

pub async fn cli(cli: Cli, config: BindingConfig) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => runtime::run_binding(config).await?,
        Commands::Show => {
            let source = HttpCalendarSource::new();
            let projection = runtime::project_once(&config, &source).await?;
            let channels: BTreeMap<&str, ChannelState> = projection
                .channels()
                .into_iter()
                .map(|(id, state)| (id.as_str(), state))
                .collect();
            println!("{}", serde_json::to_string_pretty(&channels)?);
        }
        Commands::CheckConfig => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }
    Ok(())
}
