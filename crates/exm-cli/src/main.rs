//! exm CLI
//!
//! Command-line front end for the namespaced extension manager.

mod cli;
mod commands;
mod error;

use clap::Parser;
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};
use commands::Context;
use error::Result;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("{}: {}", "error".red().bold(), e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("debug"));
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
        tracing::debug!("Verbose mode enabled");
    }

    let ctx = Context::new(cli.namespace, cli.root, &cli.scope)?;

    match cli.command {
        Commands::Install {
            id,
            activate,
            for_namespace,
        } => commands::run_install(&ctx, &id, activate, for_namespace.as_deref()).await,
        Commands::Update => commands::run_update(&ctx).await,
        Commands::Outdated => commands::run_outdated(&ctx).await,
        Commands::List => commands::run_list(&ctx),
        Commands::Resolve { id } => commands::run_resolve(&ctx, &id),
    }
}
