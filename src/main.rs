mod app;
mod cli;
mod config;
mod db;
mod http;
mod logging;
mod paths;

use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    let config = config::load_config(cli.config.as_deref())?;
    let _logger = match logging::init_logging(&config.log_level) {
        Ok(handle) => Some(handle),
        Err(err) => {
            eprintln!("logging disabled: {err:#}");
            None
        }
    };
    app::run(cli, config)
}
