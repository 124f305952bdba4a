use std::process::ExitCode;

use clap::Parser;
use miette::Result;
use tilecompose::cli::Cli;

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(cli.loglevel.directive())),
        )
        .init();

    let code = tilecompose::cli::run(&cli)?;
    Ok(ExitCode::from(code))
}
