use crate::Violation;
use serde::Deserialize;
use std::fs;
use std::io;
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Errors that can occur while loading a lint report.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("could not read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{} is not a valid PMD json report: {source}", path.display())]
    Format {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, ReportError>;

/// Top level of a report produced by `pmd check --format json`.
#[derive(Debug, Deserialize)]
struct PmdReport {
    files: Vec<PmdFile>,
}

#[derive(Debug, Deserialize)]
struct PmdFile {
    filename: String,
    violations: Vec<PmdViolation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PmdViolation {
    #[serde(rename = "beginline")]
    begin_line: NonZeroU32,
    #[serde(rename = "begincolumn", default)]
    begin_column: Option<u32>,
    description: String,
    rule: String,
    #[serde(default)]
    ruleset: Option<String>,
    priority: Priority,
    #[serde(default)]
    external_info_url: Option<String>,
}

/// PMD writes priority as a number; other tools emitting the same schema
/// use labels such as "major".
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Priority {
    Number(i64),
    Label(String),
}

impl Priority {
    fn into_label(self) -> String {
        match self {
            Self::Number(n) => n.to_string(),
            Self::Label(label) => label,
        }
    }
}

/// Load and parse the report at `path`.
pub fn read_report(path: &Path) -> Result<Vec<Violation>> {
    let text = fs::read_to_string(path).map_err(|source| ReportError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let violations = parse_report(&text).map_err(|source| ReportError::Format {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), violations = violations.len(), "read report");
    Ok(violations)
}

/// Flatten a PMD json document into violations, keeping document order.
///
/// Unknown fields are ignored. Any entry that does not fit the schema,
/// including a line number of zero, fails the whole parse.
pub fn parse_report(text: &str) -> serde_json::Result<Vec<Violation>> {
    let report: PmdReport = serde_json::from_str(text)?;

    Ok(report
        .files
        .into_iter()
        .flat_map(|file| {
            let path = file.filename;
            file.violations.into_iter().map(move |v| Violation {
                path: path.clone(),
                line: v.begin_line.get(),
                column: v.begin_column.filter(|&c| c > 0),
                rule: v.rule,
                ruleset: v.ruleset,
                message: v.description,
                severity: v.priority.into_label(),
                url: v.external_info_url,
            })
        })
        .collect())
}
