//! flowcheck CLI - static validation of capability-composition workflows.

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;

use cli::Cli;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .without_time()
                .with_writer(std::io::stderr),
        )
        .init();

    match cli::run(cli) {
        Ok(code) => code,
        Err(e) => {
            cli::output::print_error(&format!("{e:#}"));
            ExitCode::from(cli::EXIT_LOAD_ERROR)
        }
    }
}
