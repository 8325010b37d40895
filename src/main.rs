mod app;
mod cli;
mod config;
mod db;
mod http;
mod paths;
mod store;

use anyhow::{Context, Result};
use clap::Parser;

use crate::config::Config;

fn setup_logging(filter: &str) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter))
        .format_timestamp_secs()
        .init();
}

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    let config = Config::from_args(&cli.global).context("failed to resolve configuration")?;
    setup_logging(config.log_filter);
    log::debug!("using database {}", config.db_path.display());
    app::run(cli, &config)
}
