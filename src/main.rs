use crate::generator::workflow::{launch, rewrite};
use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod config;
mod control;
mod generator;
mod i18n;
mod llm;
mod references;
mod types;
mod utils;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();

    let rewrite_target = args.rewrite_target();
    let config = args.into_config()?;
    match rewrite_target {
        Some(target) => rewrite(&config, &target).await,
        None => launch(&config).await,
    }
}
