use anyhow::Result;
use banana_core::BananaConfig;
use clap::Parser;
use colored::*;
use tracing::debug;

mod app;
mod cli;
mod logging;
mod output;

use crate::cli::{Args, Command};
use crate::logging::{init_tracing, log_error};

/// Runs one node from the command line, or an interactive chat session
#[tokio::main]
async fn main() -> Result<()> {
    // Pick up credentials from .env before anything reads the environment
    dotenvy::dotenv().ok();

    let args = Args::parse();
    init_tracing(args.verbose);

    let config = match &args.config {
        Some(path) => BananaConfig::load_from_file(path),
        None => BananaConfig::load_default(),
    };
    let config = match config {
        Ok(config) => config,
        Err(e) => {
            log_error(&format!("Failed to load configuration: {}", e));
            eprintln!("{}", "Falling back to the default configuration.".yellow());
            BananaConfig::default()
        }
    };
    debug!(model = ?config.model_name, "Configuration loaded");

    let result = match args.command {
        Command::Generate { request } => app::run_generate(config, request).await,
        Command::Grounding { request, no_search } => {
            app::run_grounding(config, request, !no_search).await
        }
        Command::Aio {
            request,
            count,
            no_search,
        } => app::run_aio(config, request, count, !no_search).await,
        Command::Chat {
            options,
            seed,
            output,
        } => app::run_interactive_chat(config, options, seed, output).await,
        Command::Nodes => {
            app::list_nodes();
            Ok(())
        }
        Command::InitConfig => app::init_config(&config, args.config.as_deref()).map(|_| ()),
    };

    if let Err(e) = result {
        log_error(&format!("{:#}", e));
        std::process::exit(1);
    }

    Ok(())
}
