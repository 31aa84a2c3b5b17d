use crate::{ChangedLines, Violation};
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, trace};

/// How report paths are reconciled with diff paths.
#[derive(Debug, Clone, Default)]
pub struct PathOptions {
    /// Project root. Report paths under it are made relative before matching.
    pub root: Option<String>,
}

/// A path split into components, independent of separator style.
///
/// Backslashes are treated as separators, empty and `.` components are
/// dropped and `..` removes the component before it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedPath {
    absolute: bool,
    components: Vec<String>,
}

impl NormalizedPath {
    pub fn new(raw: &str) -> Self {
        let raw = raw.trim().replace('\\', "/");
        let absolute = raw.starts_with('/') || has_drive_prefix(&raw);

        let mut components: Vec<String> = Vec::new();
        for part in raw.split('/') {
            match part {
                "" | "." => {}
                ".." if components.last().is_some_and(|c| c != "..") => {
                    components.pop();
                }
                _ => components.push(part.to_string()),
            }
        }

        Self {
            absolute,
            components,
        }
    }

    pub fn is_absolute(&self) -> bool {
        self.absolute
    }

    pub fn components(&self) -> &[String] {
        &self.components
    }

    pub fn file_name(&self) -> Option<&str> {
        self.components.last().map(String::as_str)
    }

    /// The remainder of this path below `root`, as a relative path.
    pub fn strip_root(&self, root: &NormalizedPath) -> Option<NormalizedPath> {
        if self.is_absolute() != root.is_absolute()
            || !self.components.starts_with(&root.components)
        {
            return None;
        }
        Some(Self {
            absolute: false,
            components: self.components[root.components.len()..].to_vec(),
        })
    }

    /// Whether `self`, a report path, names the same file as `diff`.
    ///
    /// Relative report paths must equal the diff path. Absolute report paths
    /// match a relative diff path whose components form their tail.
    fn matches(&self, diff: &NormalizedPath) -> bool {
        match (self.is_absolute(), diff.is_absolute()) {
            (true, false) => self.components.ends_with(&diff.components),
            (false, true) => false,
            _ => self.components == diff.components,
        }
    }
}

fn has_drive_prefix(path: &str) -> bool {
    matches!(path.as_bytes(), [letter, b':', ..] if letter.is_ascii_alphabetic())
}

/// Looks up the changed lines a report path refers to.
pub struct Correlator<'a> {
    by_name: HashMap<String, Vec<(NormalizedPath, &'a BTreeSet<u32>)>>,
    root: Option<NormalizedPath>,
}

impl<'a> Correlator<'a> {
    pub fn new(changed: &'a ChangedLines, options: &PathOptions) -> Self {
        let mut by_name: HashMap<String, Vec<(NormalizedPath, &'a BTreeSet<u32>)>> =
            HashMap::new();
        for (path, lines) in changed.files() {
            let normalized = NormalizedPath::new(path);
            let Some(name) = normalized.file_name().map(str::to_string) else {
                continue;
            };
            by_name.entry(name).or_default().push((normalized, lines));
        }

        Self {
            by_name,
            root: options.root.as_deref().map(NormalizedPath::new),
        }
    }

    /// Changed lines for the file `report_path` refers to, if the diff touched it.
    ///
    /// When several diff paths match an absolute report path, the longest one wins.
    pub fn changed_lines(&self, report_path: &str) -> Option<&'a BTreeSet<u32>> {
        let mut path = NormalizedPath::new(report_path);
        if let Some(root) = &self.root
            && let Some(relative) = path.strip_root(root)
        {
            path = relative;
        }

        self.by_name
            .get(path.file_name()?)?
            .iter()
            .filter(|(diff_path, _)| path.matches(diff_path))
            .max_by_key(|(diff_path, _)| diff_path.components().len())
            .map(|(_, lines)| *lines)
    }

    /// Whether the violation sits on a line the diff added or modified.
    pub fn is_relevant(&self, violation: &Violation) -> bool {
        self.changed_lines(&violation.path)
            .is_some_and(|lines| lines.contains(&violation.line))
    }
}

/// Keep only the violations on changed lines, preserving their order.
pub fn correlate(
    changed: &ChangedLines,
    violations: &[Violation],
    options: &PathOptions,
) -> Vec<Violation> {
    let correlator = Correlator::new(changed, options);
    let kept: Vec<Violation> = violations
        .iter()
        .filter(|v| {
            let relevant = correlator.is_relevant(v);
            if !relevant {
                trace!(path = %v.path, line = v.line, rule = %v.rule, "dropped");
            }
            relevant
        })
        .cloned()
        .collect();

    debug!(
        total = violations.len(),
        kept = kept.len(),
        "correlated violations with diff"
    );
    kept
}
