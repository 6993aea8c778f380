//! mixlayer monitor - prints the sound topology and follows its changes.

use std::{error::Error, process};

use clap::Parser;
use mixlayer::{
    cli::{self, MonitorArgs, formatting::format_error},
    config::{Config, LogLevel},
    tracing_config,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = MonitorArgs::parse();

    if args.print_schema {
        println!("{}", Config::json_schema()?);
        return Ok(());
    }

    let config = match args.config.as_deref() {
        Some(path) => Config::load(path),
        None => Config::load_or_default(),
    };
    let config = match config {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{}", format_error(&err.to_string()));
            process::exit(2);
        }
    };

    let level = if args.debug {
        LogLevel::Debug
    } else {
        config.general.log_level
    };
    let _guard = if args.log_file {
        Some(tracing_config::init_with_file(level)?)
    } else {
        tracing_config::init(level)?;
        None
    };

    if let Err(err) = cli::run(&args, &config).await {
        tracing::error!(error = %err, "Monitor stopped");
        process::exit(1);
    }

    Ok(())
}
