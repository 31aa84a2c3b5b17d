use crate::ChangedLines;
use thiserror::Error;
use tracing::{debug, trace};

const DEV_NULL: &str = "/dev/null";

/// Errors raised while reading unified diff text.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DiffError {
    #[error("line {line}: malformed hunk header: {header:?}")]
    MalformedHunk { line: usize, header: String },
    #[error("line {line}: hunk header without file header")]
    MissingFileHeader { line: usize },
    #[error("line {line}: malformed quoted path: {path}")]
    MalformedPath { line: usize, path: String },
    #[error("line {line}: hunk runs past the largest supported line number")]
    LineOverflow { line: usize },
}

pub type Result<T> = std::result::Result<T, DiffError>;

/// Parse a unified diff into the set of lines it added or modified, per file.
///
/// Paths come from the `+++` marker with any `a/`-style prefix removed. Files
/// whose new side is `/dev/null` were deleted and contribute nothing. Removed
/// lines and context lines are never recorded. A malformed hunk header fails
/// the whole parse.
pub fn parse_diff(input: &str) -> Result<ChangedLines> {
    let mut changed = ChangedLines::new();
    let mut path: Option<String> = None;
    let mut in_file = false;
    let mut hunk: Option<HunkCursor> = None;
    let mut hunks = 0usize;

    for (idx, line) in input.lines().enumerate() {
        let line_no = idx + 1;

        // Inside a hunk the header counts decide what a line is, so a removed
        // "--- x" or added "+++ x" line is never mistaken for a file header.
        if let Some(cursor) = hunk.as_mut()
            && cursor.is_open()
        {
            let overflow = DiffError::LineOverflow { line: line_no };
            match line.as_bytes().first().copied() {
                Some(b'+') => {
                    let new_line = cursor.added().ok_or(overflow)?;
                    if let Some(p) = &path {
                        changed.insert(p, new_line);
                    }
                    continue;
                }
                Some(b'-') => {
                    cursor.removed();
                    continue;
                }
                Some(b' ') | None => {
                    cursor.context().ok_or(overflow)?;
                    continue;
                }
                // "\ No newline at end of file"
                Some(b'\\') => continue,
                // Truncated hunk: fall through and treat the line as a header.
                _ => {}
            }
        }
        if let Some(cursor) = hunk.take() {
            trace!(next_line = cursor.next_line(), "hunk end");
        }

        if line.starts_with("diff --git ") {
            path = None;
            in_file = false;
        } else if let Some(rest) = line.strip_prefix("+++ ") {
            path = new_file_path(rest).ok_or_else(|| DiffError::MalformedPath {
                line: line_no,
                path: rest.to_string(),
            })?;
            in_file = true;
            trace!(path = ?path, "file header");
        } else if line.starts_with("@@") {
            let header = HunkHeader::parse(line).ok_or_else(|| DiffError::MalformedHunk {
                line: line_no,
                header: line.to_string(),
            })?;
            if !in_file {
                return Err(DiffError::MissingFileHeader { line: line_no });
            }
            trace!(?header, "hunk header");
            hunk = Some(HunkCursor::new(&header));
            hunks += 1;
        }
    }

    debug!(files = changed.len(), hunks, "parsed diff");
    Ok(changed)
}

/// The `@@ -old_start,old_count +new_start,new_count @@` line opening a hunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HunkHeader {
    pub old_start: u32,
    pub old_count: u32,
    pub new_start: u32,
    pub new_count: u32,
}

impl HunkHeader {
    /// Parse a hunk header line. Anything after the closing `@@` is section
    /// context and ignored. Returns `None` if the line is not a valid header,
    /// including a new range that starts at line 0 with lines in it or ends
    /// past `u32::MAX`.
    pub fn parse(line: &str) -> Option<Self> {
        let header = line.strip_prefix("@@ ")?;
        let header = &header[..header.find(" @@")?];

        let mut parts = header.split(' ');
        let old_part = parts.next()?.strip_prefix('-')?;
        let new_part = parts.next()?.strip_prefix('+')?;
        if parts.next().is_some() {
            return None;
        }

        let (old_start, old_count) = parse_range(old_part)?;
        let (new_start, new_count) = parse_range(new_part)?;
        if new_start.checked_add(new_count).is_none() || (new_start == 0 && new_count > 0) {
            return None;
        }

        Some(Self {
            old_start,
            old_count,
            new_start,
            new_count,
        })
    }
}

/// Parse a range like "start,count" or "start" (count defaults to 1).
fn parse_range(s: &str) -> Option<(u32, u32)> {
    match s.split_once(',') {
        Some((start, count)) => Some((start.parse().ok()?, count.parse().ok()?)),
        None => Some((s.parse().ok()?, 1)),
    }
}

/// Walks the body of one hunk, tracking the new-file line number.
#[derive(Debug, Clone)]
pub struct HunkCursor {
    next_line: u32,
    old_remaining: u32,
    new_remaining: u32,
}

impl HunkCursor {
    pub fn new(header: &HunkHeader) -> Self {
        Self {
            next_line: header.new_start,
            old_remaining: header.old_count,
            new_remaining: header.new_count,
        }
    }

    /// Whether the header counts still expect body lines.
    pub fn is_open(&self) -> bool {
        self.old_remaining > 0 || self.new_remaining > 0
    }

    /// Line number the next added or context line will occupy in the new file.
    pub fn next_line(&self) -> u32 {
        self.next_line
    }

    /// Consume an added line and return its new-file line number.
    ///
    /// Returns `None` once the line number would overflow `u32`.
    pub fn added(&mut self) -> Option<u32> {
        let line = self.next_line;
        self.next_line = line.checked_add(1)?;
        self.new_remaining = self.new_remaining.saturating_sub(1);
        Some(line)
    }

    pub fn removed(&mut self) {
        self.old_remaining = self.old_remaining.saturating_sub(1);
    }

    pub fn context(&mut self) -> Option<()> {
        self.next_line = self.next_line.checked_add(1)?;
        self.old_remaining = self.old_remaining.saturating_sub(1);
        self.new_remaining = self.new_remaining.saturating_sub(1);
        Some(())
    }
}

/// Extract the path from the text after a `+++ ` marker.
///
/// Drops a trailing tab-separated timestamp, unquotes git's C-style quoting
/// and removes a one-letter diff prefix such as `b/`. The inner `None` means
/// `/dev/null`; the outer `None` means a quoted path could not be decoded.
fn new_file_path(raw: &str) -> Option<Option<String>> {
    let raw = raw.split('\t').next().unwrap_or(raw).trim();
    let path = match raw.strip_prefix('"').and_then(|s| s.strip_suffix('"')) {
        Some(quoted) => unquote(quoted)?,
        None => raw.to_string(),
    };
    if path == DEV_NULL || path.is_empty() {
        return Some(None);
    }
    Some(Some(strip_diff_prefix(&path).to_string()))
}

/// Decode the body of a git-quoted path (`core.quotePath`).
///
/// Escapes are decoded to raw bytes first, so octal sequences such as
/// `\303\251` become one UTF-8 character.
fn unquote(quoted: &str) -> Option<String> {
    let mut bytes = Vec::with_capacity(quoted.len());
    let mut iter = quoted.bytes();

    while let Some(b) = iter.next() {
        if b != b'\\' {
            bytes.push(b);
            continue;
        }
        let decoded = match iter.next()? {
            b'a' => 0x07,
            b'b' => 0x08,
            b'f' => 0x0c,
            b'n' => b'\n',
            b'r' => b'\r',
            b't' => b'\t',
            b'v' => 0x0b,
            b'"' => b'"',
            b'\\' => b'\\',
            first @ b'0'..=b'3' => {
                let mut value = first - b'0';
                for _ in 0..2 {
                    let digit = iter.next()?;
                    if !(b'0'..=b'7').contains(&digit) {
                        return None;
                    }
                    value = value * 8 + (digit - b'0');
                }
                value
            }
            _ => return None,
        };
        bytes.push(decoded);
    }

    String::from_utf8(bytes).ok()
}

/// Remove `a/`, `b/` or a git mnemonic prefix (`c/`, `i/`, `o/`, `w/`).
fn strip_diff_prefix(path: &str) -> &str {
    match path.as_bytes() {
        [b'a' | b'b' | b'c' | b'i' | b'o' | b'w', b'/', ..] => &path[2..],
        _ => path,
    }
}
