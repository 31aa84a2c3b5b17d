pub mod app;
pub mod cli;
pub mod correlate;
pub mod parser;
pub mod render;
pub mod report;

use std::collections::{BTreeMap, BTreeSet};

/// Lines added or modified by a diff, keyed by the post-change file path.
///
/// Line numbers are 1-based and refer to the new version of each file.
/// A path is only present if at least one line under it changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangedLines {
    files: BTreeMap<String, BTreeSet<u32>>,
}

impl ChangedLines {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `line` as changed in `path`.
    pub fn insert(&mut self, path: &str, line: u32) {
        self.files.entry(path.to_string()).or_default().insert(line);
    }

    /// Changed lines for `path`, if the diff touched it.
    pub fn lines(&self, path: &str) -> Option<&BTreeSet<u32>> {
        self.files.get(path)
    }

    /// Iterate over every changed path with its line set, in path order.
    pub fn files(&self) -> impl Iterator<Item = (&str, &BTreeSet<u32>)> {
        self.files.iter().map(|(path, lines)| (path.as_str(), lines))
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Number of files with at least one changed line.
    pub fn len(&self) -> usize {
        self.files.len()
    }
}

/// A single finding from a lint report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub path: String,
    pub line: u32,
    pub column: Option<u32>,
    pub rule: String,
    pub ruleset: Option<String>,
    pub message: String,
    /// Severity label as the linter reported it. Never interpreted.
    pub severity: String,
    pub url: Option<String>,
}
