use std::env;
use std::process::ExitCode;

use clap::Parser;
use icalBinding::cli::{self, Cli};
use icalBinding::config::{AppConfig, BindingConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Cli::parse();
    let app_config = match env::var("CONFIG_FILE") {
        Ok(path) => match AppConfig::from_file(&path) {
            Ok(config) => config,
            Err(e) => {
                tracing::error!(error = %e, "unable to load config file");
                return ExitCode::FAILURE;
            }
        },
        Err(_) => AppConfig::default(),
    };

    let config = match BindingConfig::from_props(|key| app_config.get_or_env(key)) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "invalid configuration, binding not started");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = cli::cli(args, config).await {
        tracing::error!(error = %e, "binding stopped with an error");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
