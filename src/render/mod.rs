use crate::Violation;
use std::io::{self, Write};

/// Presents correlated violations to the user.
pub trait Reporter {
    /// Write every violation in order and return how many were written.
    fn report(&mut self, violations: &[Violation]) -> io::Result<usize>;
}

/// One `path:line:col: rule [ruleset] (priority n) message` line per violation.
pub struct TextReporter<W: Write> {
    out: W,
}

impl<W: Write> TextReporter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Reporter for TextReporter<W> {
    fn report(&mut self, violations: &[Violation]) -> io::Result<usize> {
        for violation in violations {
            writeln!(self.out, "{}", format_violation(violation))?;
        }
        self.out.flush()?;
        Ok(violations.len())
    }
}

fn format_violation(v: &Violation) -> String {
    let mut line = format!("{}:{}", v.path, v.line);
    if let Some(column) = v.column {
        line.push_str(&format!(":{column}"));
    }
    line.push_str(&format!(": {}", v.rule));
    if let Some(ruleset) = &v.ruleset {
        line.push_str(&format!(" [{ruleset}]"));
    }
    line.push_str(&format!(" (priority {}) {}", v.severity, v.message.trim()));
    line
}
