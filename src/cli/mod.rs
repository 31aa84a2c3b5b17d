use crate::app::{DiffSource, Options};
use crate::correlate::PathOptions;
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use std::path::PathBuf;

const AFTER_HELP: &str = "\
The report file must be in json format as generated by PMD.

Examples:
  Read diff from stdin and output the rule violations in the terminal
    git diff feature..main | review pmd-report.json

  Read diff from a file
    review -d path/to/changes.diff pmd-report.json

Return values:
  0 - no violation found
  1 - one or more violation found
  2 - error during command execution";

#[derive(Parser, Debug)]
#[command(
    name = "review",
    version,
    about = "Narrows linter reports to what has actually changed",
    after_help = AFTER_HELP
)]
pub struct Cli {
    /// PMD json report to filter.
    pub report: Option<PathBuf>,

    /// Diff file location. Use '-' to read from stdin (defaults to stdin).
    #[arg(short, long, env = "REVIEW_DIFF", value_name = "FILE")]
    pub diff: Option<String>,

    /// Project root. Report paths under it are matched relative to it
    /// instead of by their trailing components.
    #[arg(short, long, env = "REVIEW_ROOT", value_name = "DIR")]
    pub root: Option<String>,

    /// Log filter written to stderr, e.g. "debug" or "review=trace".
    #[arg(long, env = "REVIEW_LOG", default_value = "warn", value_name = "FILTER")]
    pub log_level: String,
}

impl Cli {
    /// Resolve the parsed arguments into run options.
    ///
    /// Fails with a usage error when no report file was given.
    pub fn into_options(self) -> Result<Options, clap::Error> {
        let Some(report) = self.report else {
            return Err(Cli::command().error(
                ErrorKind::MissingRequiredArgument,
                "no report file provided",
            ));
        };

        Ok(Options {
            report,
            diff: DiffSource::from_arg(self.diff.as_deref()),
            paths: PathOptions { root: self.root },
        })
    }
}

/// Parse CLI arguments.
pub fn parse_args() -> Cli {
    Cli::parse()
}
