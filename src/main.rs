use anyhow::{Context, Result};
use std::io;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use review::app::{self, EXIT_ERROR};
use review::cli;

fn main() -> ExitCode {
    let args = cli::parse_args();

    if let Err(err) = init_logging(&args.log_level) {
        eprintln!("error: {err:#}");
        return ExitCode::from(EXIT_ERROR);
    }

    let options = match args.into_options() {
        Ok(options) => options,
        Err(err) => err.exit(),
    };

    let result = app::run(&options, io::stdin().lock(), io::stdout().lock());
    match &result {
        Ok(0) => {}
        Ok(count) => eprintln!("{count} violations found."),
        Err(err) => {
            debug!(?err, "run failed");
            eprintln!("error: {err}");
        }
    }

    ExitCode::from(app::exit_code(&result))
}

/// Install the stderr log subscriber. Stdout carries only violations.
fn init_logging(filter: &str) -> Result<()> {
    let filter =
        EnvFilter::try_new(filter).with_context(|| format!("invalid log level {filter:?}"))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .without_time()
        .init();

    Ok(())
}
