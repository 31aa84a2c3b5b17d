use crate::ChangedLines;
use crate::correlate::{PathOptions, correlate};
use crate::parser::{DiffError, parse_diff};
use crate::render::{Reporter, TextReporter};
use crate::report::{ReportError, read_report};
use std::fmt;
use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use thiserror::Error;
use tracing::info;

/// No correlated violations.
pub const EXIT_CLEAN: u8 = 0;
/// At least one violation sits on a changed line.
pub const EXIT_VIOLATIONS: u8 = 1;
/// Bad arguments, unreadable or malformed input, or a failure while writing.
pub const EXIT_ERROR: u8 = 2;

/// Errors that end a run. Each one names the input that failed.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("could not read diff from {input}: {source}")]
    DiffIo {
        input: DiffSource,
        #[source]
        source: io::Error,
    },
    #[error("could not parse diff from {input}: {source}")]
    Diff {
        input: DiffSource,
        #[source]
        source: DiffError,
    },
    #[error("could not read report: {0}")]
    Report(#[from] ReportError),
    #[error("could not write violations: {0}")]
    Output(#[source] io::Error),
}

/// Where the unified diff is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffSource {
    Stdin,
    File(PathBuf),
}

impl DiffSource {
    /// `None` and `-` select stdin, anything else is a file path.
    pub fn from_arg(arg: Option<&str>) -> Self {
        match arg {
            None | Some("") | Some("-") => Self::Stdin,
            Some(path) => Self::File(PathBuf::from(path)),
        }
    }

    /// Read the whole diff text.
    ///
    /// Content lines may come from files in any encoding. Only line prefixes
    /// and headers are interpreted, so invalid UTF-8 is replaced, not rejected.
    pub fn read<R: Read>(&self, mut stdin: R) -> io::Result<String> {
        let bytes = match self {
            Self::Stdin => {
                let mut bytes = Vec::new();
                stdin.read_to_end(&mut bytes)?;
                bytes
            }
            Self::File(path) => fs::read(path)?,
        };
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

impl fmt::Display for DiffSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stdin => f.write_str("<stdin>"),
            Self::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Everything a run needs, resolved from the command line.
#[derive(Debug, Clone)]
pub struct Options {
    pub report: PathBuf,
    pub diff: DiffSource,
    pub paths: PathOptions,
}

/// Read both inputs, keep the violations on changed lines and write them out.
///
/// Both inputs are fully read and parsed before anything is written, so a
/// failing input never leaves partial output behind. Returns the number of
/// violations written.
pub fn run<R: Read, W: Write>(options: &Options, stdin: R, stdout: W) -> Result<usize, RunError> {
    let changed = load_diff(&options.diff, stdin)?;
    let violations = read_report(&options.report)?;

    let relevant = correlate(&changed, &violations, &options.paths);

    let mut reporter = TextReporter::new(stdout);
    let count = reporter.report(&relevant).map_err(RunError::Output)?;
    info!(count, "violations on changed lines");
    Ok(count)
}

fn load_diff<R: Read>(source: &DiffSource, stdin: R) -> Result<ChangedLines, RunError> {
    let text = source.read(stdin).map_err(|source_err| RunError::DiffIo {
        input: source.clone(),
        source: source_err,
    })?;
    parse_diff(&text).map_err(|source_err| RunError::Diff {
        input: source.clone(),
        source: source_err,
    })
}

/// Map the outcome of a run to the process exit code.
pub fn exit_code(result: &Result<usize, RunError>) -> u8 {
    match result {
        Ok(0) => EXIT_CLEAN,
        Ok(_) => EXIT_VIOLATIONS,
        Err(_) => EXIT_ERROR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use tempfile::TempDir;

    const DIFF: &str = r#"diff --git a/a/b.go b/a/b.go
index 1234567..abcdefg 100644
--- a/a/b.go
+++ b/a/b.go
@@ -41,2 +41,2 @@
 func f() {
-	old()
+	changed()
"#;

    const REPORT: &str = r#"{"files": [{"filename": "a/b.go", "violations": [
        {"beginline": 42, "description": "X fired", "rule": "X", "priority": 2},
        {"beginline": 41, "description": "Y fired", "rule": "Y", "priority": 2}
    ]}]}"#;

    fn write_report(dir: &TempDir, text: &str) -> PathBuf {
        let path = dir.path().join("report.json");
        fs::write(&path, text).unwrap();
        path
    }

    fn options(report: &Path, diff: DiffSource) -> Options {
        Options {
            report: report.to_path_buf(),
            diff,
            paths: PathOptions::default(),
        }
    }

    #[test]
    fn run_reports_violations_on_changed_lines() {
        let dir = tempfile::tempdir().unwrap();
        let report = write_report(&dir, REPORT);
        let mut out = Vec::new();

        let result = run(
            &options(&report, DiffSource::Stdin),
            DIFF.as_bytes(),
            &mut out,
        );

        assert_eq!(exit_code(&result), EXIT_VIOLATIONS);
        assert_eq!(result.unwrap(), 1);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "a/b.go:42: X (priority 2) X fired\n"
        );
    }

    #[test]
    fn run_reads_diff_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let report = write_report(&dir, REPORT);
        let diff_path = dir.path().join("changes.diff");
        fs::write(&diff_path, DIFF).unwrap();

        let result = run(
            &options(&report, DiffSource::File(diff_path)),
            io::empty(),
            io::sink(),
        );
        assert_eq!(result.unwrap(), 1);
    }

    #[test]
    fn run_accepts_non_utf8_content_lines() {
        let dir = tempfile::tempdir().unwrap();
        let report = write_report(&dir, REPORT);
        let mut diff = DIFF.as_bytes().to_vec();
        // A second hunk adding a Latin-1 line.
        diff.extend_from_slice(b"@@ -50 +50,2 @@\n line\n+// caf\xE9\n");
        let mut out = Vec::new();

        let result = run(&options(&report, DiffSource::Stdin), &diff[..], &mut out);

        assert_eq!(result.unwrap(), 1);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "a/b.go:42: X (priority 2) X fired\n"
        );
    }

    #[test]
    fn diff_file_with_non_utf8_bytes_is_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("latin1.diff");
        fs::write(&path, b"+++ b/f\n@@ -0,0 +1 @@\n+caf\xE9\n").unwrap();

        let text = DiffSource::File(path).read(io::empty()).unwrap();
        assert!(text.ends_with("+caf\u{FFFD}\n"));
    }

    #[test]
    fn run_with_empty_diff_is_clean() {
        let dir = tempfile::tempdir().unwrap();
        let report = write_report(&dir, REPORT);
        let mut out = Vec::new();

        let result = run(&options(&report, DiffSource::Stdin), io::empty(), &mut out);

        assert_eq!(exit_code(&result), EXIT_CLEAN);
        assert!(out.is_empty());
    }

    #[test]
    fn run_twice_gives_identical_output() {
        let dir = tempfile::tempdir().unwrap();
        let report = write_report(&dir, REPORT);
        let opts = options(&report, DiffSource::Stdin);

        let mut first = Vec::new();
        let mut second = Vec::new();
        let a = run(&opts, DIFF.as_bytes(), &mut first).unwrap();
        let b = run(&opts, DIFF.as_bytes(), &mut second).unwrap();

        assert_eq!(a, b);
        assert_eq!(first, second);
    }

    #[test]
    fn malformed_diff_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let report = write_report(&dir, REPORT);
        let mut out = Vec::new();

        let result = run(
            &options(&report, DiffSource::Stdin),
            "@@ bogus @@\n".as_bytes(),
            &mut out,
        );

        assert_eq!(exit_code(&result), EXIT_ERROR);
        assert!(matches!(result, Err(RunError::Diff { .. })));
        assert!(out.is_empty());
    }

    #[test]
    fn missing_diff_file_names_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let report = write_report(&dir, REPORT);
        let missing = dir.path().join("nope.diff");

        let err = run(
            &options(&report, DiffSource::File(missing)),
            io::empty(),
            io::sink(),
        )
        .unwrap_err();

        assert!(matches!(err, RunError::DiffIo { .. }));
        assert!(err.to_string().contains("nope.diff"));
    }

    #[test]
    fn malformed_report_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let report = write_report(&dir, r#"{"files": "nope"}"#);

        let result = run(
            &options(&report, DiffSource::Stdin),
            DIFF.as_bytes(),
            io::sink(),
        );
        assert!(matches!(
            result,
            Err(RunError::Report(ReportError::Format { .. }))
        ));
    }

    #[test]
    fn diff_source_from_arg() {
        assert_eq!(DiffSource::from_arg(None), DiffSource::Stdin);
        assert_eq!(DiffSource::from_arg(Some("-")), DiffSource::Stdin);
        assert_eq!(
            DiffSource::from_arg(Some("x.diff")),
            DiffSource::File(PathBuf::from("x.diff"))
        );
        assert_eq!(DiffSource::Stdin.to_string(), "<stdin>");
    }
}
