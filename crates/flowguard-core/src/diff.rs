//! Diff analysis: normalizes unified/git text, GitHub PR-files JSON and
//! GitLab MR-changes JSON into a single [`ParsedDiff`] model.
//!
//! Parsing is best-effort: malformed JSON for the JSON formats silently falls
//! back to unified parsing, and unrecognized lines are skipped. Nothing in
//! this module returns an error.

use crate::error::FlowguardError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// DiffFormat
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffFormat {
    Git,
    Github,
    Gitlab,
    Unified,
}

impl DiffFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            DiffFormat::Git => "git",
            DiffFormat::Github => "github",
            DiffFormat::Gitlab => "gitlab",
            DiffFormat::Unified => "unified",
        }
    }
}

impl fmt::Display for DiffFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DiffFormat {
    type Err = FlowguardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "git" => Ok(DiffFormat::Git),
            "github" => Ok(DiffFormat::Github),
            "gitlab" => Ok(DiffFormat::Gitlab),
            "unified" => Ok(DiffFormat::Unified),
            _ => Err(FlowguardError::InvalidValue {
                field: "diff format",
                value: s.to_string(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Model
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Added,
    Modified,
    Deleted,
    Renamed,
}

impl FileStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            FileStatus::Added => "added",
            FileStatus::Modified => "modified",
            FileStatus::Deleted => "deleted",
            FileStatus::Renamed => "renamed",
        }
    }

    /// The external view has no rename status; renames read as modifications.
    pub fn simplified(self) -> FileStatus {
        match self {
            FileStatus::Renamed => FileStatus::Modified,
            other => other,
        }
    }
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Addition,
    Deletion,
    Unchanged,
}

/// One line of a hunk. Additions and unchanged lines carry the new-file line
/// number; deletions carry the old-file line number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineChange {
    pub kind: ChangeKind,
    pub line_number: u32,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangedFile {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_path: Option<String>,
    pub status: FileStatus,
    #[serde(default)]
    pub changes: Vec<LineChange>,
}

impl ChangedFile {
    pub fn new(path: impl Into<String>, status: FileStatus) -> Self {
        Self {
            path: path.into(),
            old_path: None,
            status,
            changes: Vec::new(),
        }
    }

    pub fn additions(&self) -> usize {
        self.count(ChangeKind::Addition)
    }

    pub fn deletions(&self) -> usize {
        self.count(ChangeKind::Deletion)
    }

    fn count(&self, kind: ChangeKind) -> usize {
        self.changes.iter().filter(|c| c.kind == kind).count()
    }

    /// Added and deleted lines, in diff order.
    pub fn changed_lines(&self) -> impl Iterator<Item = &LineChange> {
        self.changes.iter().filter(|c| c.kind != ChangeKind::Unchanged)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffStats {
    pub total_files: usize,
    pub total_lines: usize,
    pub additions: usize,
    pub deletions: usize,
    pub added: usize,
    pub modified: usize,
    pub deleted: usize,
    pub renamed: usize,
}

impl DiffStats {
    pub fn compute(files: &[ChangedFile]) -> Self {
        let mut stats = DiffStats {
            total_files: files.len(),
            ..Default::default()
        };
        for file in files {
            match file.status {
                FileStatus::Added => stats.added += 1,
                FileStatus::Modified => stats.modified += 1,
                FileStatus::Deleted => stats.deleted += 1,
                FileStatus::Renamed => stats.renamed += 1,
            }
            stats.additions += file.additions();
            stats.deletions += file.deletions();
        }
        stats.total_lines = stats.additions + stats.deletions;
        stats
    }
}

/// A normalized diff. Built once per verification run and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedDiff {
    pub format: DiffFormat,
    pub files: Vec<ChangedFile>,
    pub stats: DiffStats,
}

impl ParsedDiff {
    pub fn new(format: DiffFormat, files: Vec<ChangedFile>) -> Self {
        let stats = DiffStats::compute(&files);
        Self {
            format,
            files,
            stats,
        }
    }
}

/// Commit metadata describing where a diff came from. Every field is
/// optional; callers fill what they know and [`extract_metadata`] fills the
/// rest from patch headers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffSource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl DiffSource {
    /// Fill any field that is `None` here from `other`.
    pub fn fill_missing(&mut self, other: DiffSource) {
        if self.commit_hash.is_none() {
            self.commit_hash = other.commit_hash;
        }
        if self.branch.is_none() {
            self.branch = other.branch;
        }
        if self.author.is_none() {
            self.author = other.author;
        }
        if self.timestamp.is_none() {
            self.timestamp = other.timestamp;
        }
        if self.message.is_none() {
            self.message = other.message;
        }
    }
}

// ---------------------------------------------------------------------------
// Format detection
// ---------------------------------------------------------------------------

/// Guess the format of `text`. Total: always returns a format.
///
/// Checked in order: a leading `diff --git` (git), a JSON array whose first
/// element has `filename` (github), a JSON object with a `changes` array
/// (gitlab), a hunk header plus at least one `+`/`-` line (unified).
/// Anything else is treated as unified.
pub fn detect_format(text: &str) -> DiffFormat {
    let trimmed = text.trim_start();
    if trimmed.starts_with("diff --git") {
        return DiffFormat::Git;
    }

    if let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) {
        let first_has_filename = value
            .as_array()
            .and_then(|a| a.first())
            .map(|f| f.get("filename").is_some())
            .unwrap_or(false);
        if first_has_filename {
            return DiffFormat::Github;
        }
        if value.get("changes").map(|c| c.is_array()).unwrap_or(false) {
            return DiffFormat::Gitlab;
        }
    }

    let has_change_line = text
        .lines()
        .any(|l| l.starts_with('+') || l.starts_with('-'));
    if text.contains("@@") && has_change_line {
        return DiffFormat::Unified;
    }

    DiffFormat::Unified
}

// ---------------------------------------------------------------------------
// Parsing entry point
// ---------------------------------------------------------------------------

pub fn parse_diff(text: &str, format: DiffFormat) -> ParsedDiff {
    match format {
        DiffFormat::Git | DiffFormat::Unified => {
            ParsedDiff::new(format, UnifiedParser::default().parse(text))
        }
        DiffFormat::Github | DiffFormat::Gitlab => match parse_json_files(text) {
            Some(files) => ParsedDiff::new(format, files),
            None => {
                tracing::debug!(%format, "diff payload is not valid JSON, parsing as unified");
                ParsedDiff::new(DiffFormat::Unified, UnifiedParser::default().parse(text))
            }
        },
    }
}

// ---------------------------------------------------------------------------
// Hunk cursor
// ---------------------------------------------------------------------------

static HUNK_RE: OnceLock<Regex> = OnceLock::new();

fn hunk_re() -> &'static Regex {
    HUNK_RE.get_or_init(|| {
        Regex::new(r"^@@ -(\d+)(?:,(\d+))? \+(\d+)(?:,(\d+))? @@").unwrap()
    })
}

/// Line-number bookkeeping inside `@@` hunks.
#[derive(Debug, Default)]
struct HunkCursor {
    in_hunk: bool,
    old_line: u32,
    new_line: u32,
    old_remaining: u32,
    new_remaining: u32,
}

enum HunkLine {
    Header,
    Change(LineChange),
    Skip,
}

impl HunkCursor {
    fn exhausted(&self) -> bool {
        self.old_remaining == 0 && self.new_remaining == 0
    }

    fn reset(&mut self) {
        *self = HunkCursor::default();
    }

    fn feed(&mut self, line: &str) -> HunkLine {
        if let Some(caps) = hunk_re().captures(line) {
            let num = |i: usize, default: u32| {
                caps.get(i)
                    .and_then(|m| m.as_str().parse::<u32>().ok())
                    .unwrap_or(default)
            };
            self.old_line = num(1, 0);
            self.old_remaining = num(2, 1);
            self.new_line = num(3, 0);
            self.new_remaining = num(4, 1);
            self.in_hunk = true;
            return HunkLine::Header;
        }

        if !self.in_hunk || line.starts_with('\\') {
            return HunkLine::Skip;
        }

        if let Some(content) = line.strip_prefix('+') {
            let change = LineChange {
                kind: ChangeKind::Addition,
                line_number: self.new_line,
                content: content.to_string(),
            };
            self.new_line = self.new_line.saturating_add(1);
            self.new_remaining = self.new_remaining.saturating_sub(1);
            return HunkLine::Change(change);
        }

        if let Some(content) = line.strip_prefix('-') {
            let change = LineChange {
                kind: ChangeKind::Deletion,
                line_number: self.old_line,
                content: content.to_string(),
            };
            self.old_line = self.old_line.saturating_add(1);
            self.old_remaining = self.old_remaining.saturating_sub(1);
            return HunkLine::Change(change);
        }

        // Some tools strip the leading space from blank context lines.
        let context = match line.strip_prefix(' ') {
            Some(content) => Some(content),
            None if line.is_empty() && !self.exhausted() => Some(""),
            None => None,
        };
        if let Some(content) = context {
            let change = LineChange {
                kind: ChangeKind::Unchanged,
                line_number: self.new_line,
                content: content.to_string(),
            };
            self.old_line = self.old_line.saturating_add(1);
            self.new_line = self.new_line.saturating_add(1);
            self.old_remaining = self.old_remaining.saturating_sub(1);
            self.new_remaining = self.new_remaining.saturating_sub(1);
            return HunkLine::Change(change);
        }

        HunkLine::Skip
    }
}

/// Parse bare hunk text (a GitHub `patch` or GitLab `diff` field).
fn hunk_changes(patch: &str) -> Vec<LineChange> {
    let mut cursor = HunkCursor::default();
    patch
        .lines()
        .filter_map(|line| match cursor.feed(line) {
            HunkLine::Change(c) => Some(c),
            _ => None,
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Unified / git parser
// ---------------------------------------------------------------------------

const UNKNOWN_PATH: &str = "unknown";

#[derive(Default)]
struct UnifiedParser {
    files: Vec<ChangedFile>,
    current: Option<ChangedFile>,
    cursor: HunkCursor,
    /// The current file was opened by `diff --git` and its `---`/`+++`
    /// headers have not been consumed yet.
    awaiting_headers: bool,
}

impl UnifiedParser {
    fn parse(mut self, text: &str) -> Vec<ChangedFile> {
        let lines: Vec<&str> = text.lines().collect();
        for (i, line) in lines.iter().enumerate() {
            let next = lines.get(i + 1).copied().unwrap_or("");
            self.line(line, next);
        }
        self.flush();
        self.files
    }

    fn flush(&mut self) {
        if let Some(file) = self.current.take() {
            self.files.push(file);
        }
        self.cursor.reset();
        self.awaiting_headers = false;
    }

    fn line(&mut self, line: &str, next: &str) {
        if let Some(rest) = line.strip_prefix("diff --git ") {
            self.flush();
            let (old, new) = split_git_paths(rest);
            let mut file = ChangedFile::new(new.clone(), FileStatus::Modified);
            if old != new {
                file.old_path = Some(old);
            }
            self.current = Some(file);
            self.awaiting_headers = true;
            return;
        }

        let header_allowed = !self.cursor.in_hunk || self.cursor.exhausted();

        if header_allowed && !self.cursor.in_hunk {
            if let Some(file) = self.current.as_mut() {
                if line.starts_with("new file mode") {
                    file.status = FileStatus::Added;
                    return;
                }
                if line.starts_with("deleted file mode") {
                    file.status = FileStatus::Deleted;
                    return;
                }
                if let Some(from) = line.strip_prefix("rename from ") {
                    file.status = FileStatus::Renamed;
                    file.old_path = Some(from.trim().to_string());
                    return;
                }
                if let Some(to) = line.strip_prefix("rename to ") {
                    file.path = to.trim().to_string();
                    return;
                }
            }
        }

        if header_allowed {
            if let Some(old) = line.strip_prefix("--- ") {
                if next.starts_with("+++ ") {
                    self.old_header(old);
                    return;
                }
            }

            if let Some(new) = line.strip_prefix("+++ ") {
                if self.current.is_some() && !self.cursor.in_hunk {
                    self.new_header(new);
                    return;
                }
            }
        }

        match self.cursor.feed(line) {
            // Bare hunks with no file header still count as a change.
            HunkLine::Header if self.current.is_none() => {
                self.current = Some(ChangedFile::new(UNKNOWN_PATH, FileStatus::Modified));
            }
            HunkLine::Change(change) => {
                if let Some(file) = self.current.as_mut() {
                    file.changes.push(change);
                }
            }
            _ => {}
        }
    }

    fn old_header(&mut self, raw: &str) {
        let old = header_path(raw);
        if !(self.awaiting_headers && self.current.is_some()) {
            // Plain unified diff: each `---`/`+++` pair opens a file.
            self.flush();
            let mut file = ChangedFile::new(old.clone(), FileStatus::Modified);
            file.old_path = Some(old.clone());
            self.current = Some(file);
        }
        self.awaiting_headers = false;
        self.cursor.reset();
        if let Some(file) = self.current.as_mut() {
            if old == "/dev/null" {
                file.status = FileStatus::Added;
                file.old_path = None;
            }
        }
    }

    fn new_header(&mut self, raw: &str) {
        let new = header_path(raw);
        if let Some(file) = self.current.as_mut() {
            if new == "/dev/null" {
                file.status = FileStatus::Deleted;
                if let Some(old) = file.old_path.take() {
                    file.path = old;
                }
            } else {
                file.path = new;
                if file.old_path.as_deref() == Some(file.path.as_str()) {
                    file.old_path = None;
                }
            }
        }
    }
}

/// `a/src/x.rs b/src/y.rs` → (`src/x.rs`, `src/y.rs`).
fn split_git_paths(rest: &str) -> (String, String) {
    match rest.rfind(" b/") {
        Some(idx) => {
            let old = rest[..idx].trim();
            let new = &rest[idx + 3..];
            (
                old.strip_prefix("a/").unwrap_or(old).to_string(),
                new.trim().to_string(),
            )
        }
        None => {
            let mut parts = rest.split_whitespace();
            let old = parts.next().unwrap_or("");
            let new = parts.next().unwrap_or(old);
            (strip_side(old), strip_side(new))
        }
    }
}

fn strip_side(path: &str) -> String {
    path.strip_prefix("a/")
        .or_else(|| path.strip_prefix("b/"))
        .unwrap_or(path)
        .to_string()
}

/// Path from a `---`/`+++` header, without the `a/`/`b/` prefix or a
/// trailing tab-separated timestamp.
fn header_path(raw: &str) -> String {
    let path = raw.split('\t').next().unwrap_or(raw).trim();
    strip_side(path)
}

// ---------------------------------------------------------------------------
// GitHub / GitLab JSON
// ---------------------------------------------------------------------------

/// Union of the GitHub PR-files and GitLab MR-changes entry shapes.
#[derive(Debug, Deserialize)]
struct JsonFileEntry {
    // GitHub
    filename: Option<String>,
    status: Option<String>,
    patch: Option<String>,
    previous_filename: Option<String>,
    // GitLab
    old_path: Option<String>,
    new_path: Option<String>,
    #[serde(default)]
    new_file: bool,
    #[serde(default)]
    deleted_file: bool,
    #[serde(default)]
    renamed_file: bool,
    diff: Option<String>,
}

impl JsonFileEntry {
    fn into_changed_file(self) -> Option<ChangedFile> {
        let path = self
            .filename
            .or(self.new_path)
            .or_else(|| self.old_path.clone())?;

        let status = if self.new_file {
            FileStatus::Added
        } else if self.deleted_file {
            FileStatus::Deleted
        } else if self.renamed_file {
            FileStatus::Renamed
        } else {
            match self.status.as_deref() {
                Some("added") => FileStatus::Added,
                Some("removed") | Some("deleted") => FileStatus::Deleted,
                Some("renamed") => FileStatus::Renamed,
                _ => FileStatus::Modified,
            }
        };

        let old_path = match status {
            FileStatus::Renamed => self.previous_filename.or(self.old_path),
            _ => None,
        };

        let patch = self.patch.or(self.diff).unwrap_or_default();
        Some(ChangedFile {
            path,
            old_path,
            status,
            changes: hunk_changes(&patch),
        })
    }
}

/// Accepts a JSON array of file entries or an object with a `changes`
/// array. Returns `None` when the payload is not JSON of either shape.
fn parse_json_files(text: &str) -> Option<Vec<ChangedFile>> {
    let value: serde_json::Value = serde_json::from_str(text.trim()).ok()?;
    let entries = match value {
        serde_json::Value::Array(items) => items,
        serde_json::Value::Object(mut obj) => match obj.remove("changes") {
            Some(serde_json::Value::Array(items)) => items,
            _ => return None,
        },
        _ => return None,
    };

    Some(
        entries
            .into_iter()
            .filter_map(|v| serde_json::from_value::<JsonFileEntry>(v).ok())
            .filter_map(JsonFileEntry::into_changed_file)
            .collect(),
    )
}

// ---------------------------------------------------------------------------
// Metadata
// ---------------------------------------------------------------------------

static SHA_RE: OnceLock<Regex> = OnceLock::new();

fn sha_re() -> &'static Regex {
    SHA_RE.get_or_init(|| Regex::new(r"^(?:From|commit) ([0-9a-f]{7,40})\b").unwrap())
}

static PATCH_PREFIX_RE: OnceLock<Regex> = OnceLock::new();

fn patch_prefix_re() -> &'static Regex {
    PATCH_PREFIX_RE.get_or_init(|| Regex::new(r"^\[PATCH[^\]]*\]\s*").unwrap())
}

/// Read commit metadata from `git format-patch` / `git log -p` headers.
///
/// Only the preamble before the first `diff --git` is inspected. JSON formats
/// carry no commit metadata and yield an empty [`DiffSource`].
pub fn extract_metadata(text: &str, format: DiffFormat) -> DiffSource {
    let mut source = DiffSource::default();
    if matches!(format, DiffFormat::Github | DiffFormat::Gitlab) {
        return source;
    }

    let mut after_date = false;
    for line in text.lines() {
        if line.starts_with("diff --git") || line.starts_with("--- ") {
            break;
        }

        if source.commit_hash.is_none() {
            if let Some(caps) = sha_re().captures(line) {
                source.commit_hash = Some(caps[1].to_string());
                continue;
            }
        }

        if let Some(author) = line
            .strip_prefix("Author:")
            .or_else(|| line.strip_prefix("From:"))
        {
            source.author.get_or_insert_with(|| author.trim().to_string());
            continue;
        }

        if let Some(date) = line.strip_prefix("Date:") {
            source.timestamp.get_or_insert_with(|| date.trim().to_string());
            after_date = true;
            continue;
        }

        if let Some(subject) = line.strip_prefix("Subject:") {
            let subject = patch_prefix_re().replace(subject.trim(), "");
            source.message = Some(subject.trim().to_string());
            continue;
        }

        // `git log` indents the commit message under the Date line.
        if after_date && source.message.is_none() && line.starts_with("    ") {
            let msg = line.trim();
            if !msg.is_empty() {
                source.message = Some(msg.to_string());
            }
        }
    }

    source
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const NEW_FILE: &str = "\
diff --git a/src/greet.rs b/src/greet.rs
new file mode 100644
index 0000000..e69de29
--- /dev/null
+++ b/src/greet.rs
@@ -0,0 +1,5 @@
+pub fn greet(name: &str) -> String {
+    let mut s = String::from(\"Hello, \");
+    s.push_str(name);
+    s
+}
";

    const MODIFY: &str = "\
diff --git a/src/lib.rs b/src/lib.rs
index 1111111..2222222 100644
--- a/src/lib.rs
+++ b/src/lib.rs
@@ -10,3 +10,3 @@ fn main() {
 let a = 1;
-let b = old();
+let b = new();
 let c = 3;
";

    #[test]
    fn git_new_file_scenario() {
        let parsed = parse_diff(NEW_FILE, DiffFormat::Git);
        assert_eq!(parsed.stats.total_files, 1);
        assert_eq!(parsed.stats.additions, 5);
        assert_eq!(parsed.stats.deletions, 0);
        assert_eq!(parsed.files[0].status, FileStatus::Added);
        assert_eq!(parsed.files[0].path, "src/greet.rs");
        assert_eq!(parsed.files[0].changes[0].line_number, 1);
        assert_eq!(parsed.files[0].changes[4].line_number, 5);
    }

    #[test]
    fn git_modify_scenario() {
        let parsed = parse_diff(MODIFY, DiffFormat::Git);
        assert_eq!(parsed.stats.additions, 1);
        assert_eq!(parsed.stats.deletions, 1);
        assert_eq!(parsed.stats.total_lines, 2);
        let file = &parsed.files[0];
        assert_eq!(file.status, FileStatus::Modified);
        let del = file
            .changes
            .iter()
            .find(|c| c.kind == ChangeKind::Deletion)
            .unwrap();
        let add = file
            .changes
            .iter()
            .find(|c| c.kind == ChangeKind::Addition)
            .unwrap();
        assert_eq!(del.line_number, 11);
        assert_eq!(del.content, "let b = old();");
        assert_eq!(add.line_number, 11);
        assert_eq!(file.changes.len(), 4);
        assert_eq!(file.changes[3].line_number, 12);
    }

    #[test]
    fn deleted_and_renamed_files() {
        let text = "\
diff --git a/old.txt b/old.txt
deleted file mode 100644
--- a/old.txt
+++ /dev/null
@@ -1,2 +0,0 @@
-one
-two
diff --git a/a.rs b/b.rs
similarity index 100%
rename from a.rs
rename to b.rs
";
        let parsed = parse_diff(text, DiffFormat::Git);
        assert_eq!(parsed.stats.total_files, 2);
        assert_eq!(parsed.files[0].status, FileStatus::Deleted);
        assert_eq!(parsed.files[0].path, "old.txt");
        assert_eq!(parsed.files[0].deletions(), 2);
        assert_eq!(parsed.files[1].status, FileStatus::Renamed);
        assert_eq!(parsed.files[1].path, "b.rs");
        assert_eq!(parsed.files[1].old_path.as_deref(), Some("a.rs"));
        assert_eq!(parsed.stats.deleted, 1);
        assert_eq!(parsed.stats.renamed, 1);
        assert_eq!(FileStatus::Renamed.simplified(), FileStatus::Modified);
    }

    #[test]
    fn no_newline_marker_is_skipped() {
        let text = "\
diff --git a/x b/x
--- a/x
+++ b/x
@@ -1 +1 @@
-a
\\ No newline at end of file
+b
\\ No newline at end of file
";
        let parsed = parse_diff(text, DiffFormat::Git);
        assert_eq!(parsed.files[0].changes.len(), 2);
        assert_eq!(parsed.stats.total_lines, 2);
    }

    #[test]
    fn line_numbers_saturate_at_u32_max() {
        let parsed = parse_diff("@@ -1 +4294967295,2 @@\n+a\n+b\n", DiffFormat::Unified);
        let lines: Vec<_> = parsed.files[0].changes.iter().map(|c| c.line_number).collect();
        assert_eq!(lines, vec![u32::MAX, u32::MAX]);
        assert_eq!(parsed.stats.additions, 2);
    }

    #[test]
    fn plain_unified_multiple_files() {
        let text = "\
--- a/one.txt\t2024-01-01 00:00:00
+++ b/one.txt\t2024-01-02 00:00:00
@@ -1,2 +1,2 @@
 keep
-drop
+take
--- /dev/null
+++ b/two.txt
@@ -0,0 +1 @@
+fresh
";
        let parsed = parse_diff(text, DiffFormat::Unified);
        assert_eq!(parsed.stats.total_files, 2);
        assert_eq!(parsed.files[0].path, "one.txt");
        assert_eq!(parsed.files[0].status, FileStatus::Modified);
        assert_eq!(parsed.files[1].path, "two.txt");
        assert_eq!(parsed.files[1].status, FileStatus::Added);
        assert_eq!(parsed.stats.additions, 2);
        assert_eq!(parsed.stats.deletions, 1);
    }

    #[test]
    fn deletion_of_dashed_line_inside_hunk_is_a_change() {
        let text = "\
diff --git a/notes.md b/notes.md
--- a/notes.md
+++ b/notes.md
@@ -1,3 +1,2 @@
 title
--- separator
+++ not a header
";
        let parsed = parse_diff(text, DiffFormat::Git);
        assert_eq!(parsed.stats.total_files, 1);
        assert_eq!(parsed.stats.deletions, 1);
        assert_eq!(parsed.stats.additions, 1);
        assert_eq!(parsed.files[0].changes[1].content, "-- separator");
    }

    #[test]
    fn github_json() {
        let text = r#"[
            {"filename": "src/a.rs", "status": "added", "patch": "@@ -0,0 +1,2 @@\n+one\n+two"},
            {"filename": "src/b.rs", "status": "removed", "patch": "@@ -1 +0,0 @@\n-gone"},
            {"filename": "src/c.rs", "status": "renamed", "previous_filename": "src/old_c.rs"}
        ]"#;
        assert_eq!(detect_format(text), DiffFormat::Github);
        let parsed = parse_diff(text, DiffFormat::Github);
        assert_eq!(parsed.format, DiffFormat::Github);
        assert_eq!(parsed.stats.total_files, 3);
        assert_eq!(parsed.files[0].status, FileStatus::Added);
        assert_eq!(parsed.files[0].additions(), 2);
        assert_eq!(parsed.files[1].status, FileStatus::Deleted);
        assert_eq!(parsed.files[2].old_path.as_deref(), Some("src/old_c.rs"));
        assert_eq!(parsed.stats.total_lines, 3);
    }

    #[test]
    fn gitlab_json() {
        let text = r#"{"changes": [
            {"old_path": "a.py", "new_path": "a.py", "new_file": false, "deleted_file": false,
             "renamed_file": false, "diff": "@@ -1,2 +1,2 @@\n x = 1\n-y = 2\n+y = 3\n"},
            {"old_path": "n.py", "new_path": "n.py", "new_file": true, "deleted_file": false,
             "renamed_file": false, "diff": "@@ -0,0 +1 @@\n+print('hi')\n"}
        ]}"#;
        assert_eq!(detect_format(text), DiffFormat::Gitlab);
        let parsed = parse_diff(text, DiffFormat::Gitlab);
        assert_eq!(parsed.stats.total_files, 2);
        assert_eq!(parsed.files[0].status, FileStatus::Modified);
        assert_eq!(parsed.files[1].status, FileStatus::Added);
        assert_eq!(parsed.stats.additions, 2);
        assert_eq!(parsed.stats.deletions, 1);
    }

    #[test]
    fn malformed_json_falls_back_to_unified() {
        let text = "@@ -1 +1 @@\n-a\n+b\n";
        let parsed = parse_diff(text, DiffFormat::Github);
        assert_eq!(parsed.format, DiffFormat::Unified);
        assert_eq!(parsed.stats.total_files, 1);
        assert_eq!(parsed.files[0].path, "unknown");
        assert_eq!(parsed.stats.additions, 1);
        assert_eq!(parsed.stats.deletions, 1);
    }

    #[test]
    fn detect_format_heuristics() {
        assert_eq!(detect_format(NEW_FILE), DiffFormat::Git);
        assert_eq!(detect_format("@@ -1 +1 @@\n-a\n+b"), DiffFormat::Unified);
        assert_eq!(detect_format(""), DiffFormat::Unified);
        assert_eq!(detect_format("not a diff at all"), DiffFormat::Unified);
        assert_eq!(detect_format("[1, 2, 3]"), DiffFormat::Unified);
        assert_eq!(detect_format("{\"changes\": 5}"), DiffFormat::Unified);
    }

    #[test]
    fn detect_format_is_idempotent() {
        for text in [NEW_FILE, MODIFY, "", "[{\"filename\": \"x\"}]", "{\"changes\": []}"] {
            let first = detect_format(text);
            assert_eq!(detect_format(text), first);
        }
    }

    #[test]
    fn stats_invariants_hold() {
        for (text, format) in [
            (NEW_FILE, DiffFormat::Git),
            (MODIFY, DiffFormat::Git),
            ("garbage\n+++\n---", DiffFormat::Unified),
            ("", DiffFormat::Gitlab),
        ] {
            let parsed = parse_diff(text, format);
            assert_eq!(
                parsed.stats.total_lines,
                parsed.stats.additions + parsed.stats.deletions
            );
            assert_eq!(parsed.files.len(), parsed.stats.total_files);
        }
    }

    #[test]
    fn metadata_from_format_patch() {
        let text = "\
From 3f2a1b9c8d7e6f5a4b3c2d1e0f9a8b7c6d5e4f3a Mon Sep 17 00:00:00 2001
From: Ada Lovelace <ada@example.com>
Date: Tue, 1 Oct 2024 10:00:00 +0000
Subject: [PATCH 1/2] Add greeting helper

---
diff --git a/src/greet.rs b/src/greet.rs
";
        let meta = extract_metadata(text, DiffFormat::Git);
        assert_eq!(
            meta.commit_hash.as_deref(),
            Some("3f2a1b9c8d7e6f5a4b3c2d1e0f9a8b7c6d5e4f3a")
        );
        assert_eq!(meta.author.as_deref(), Some("Ada Lovelace <ada@example.com>"));
        assert_eq!(meta.message.as_deref(), Some("Add greeting helper"));
        assert!(meta.timestamp.unwrap().contains("2024"));
    }

    #[test]
    fn metadata_from_git_log() {
        let text = "\
commit abc1234def
Author: Grace <grace@example.com>
Date:   Wed Oct 2 12:00:00 2024 +0000

    Fix parser edge case

diff --git a/x b/x
";
        let meta = extract_metadata(text, DiffFormat::Git);
        assert_eq!(meta.commit_hash.as_deref(), Some("abc1234def"));
        assert_eq!(meta.message.as_deref(), Some("Fix parser edge case"));
        assert!(extract_metadata("[]", DiffFormat::Github).commit_hash.is_none());
    }

    #[test]
    fn fill_missing_keeps_explicit_values() {
        let mut explicit = DiffSource {
            branch: Some("feature/x".into()),
            author: Some("me".into()),
            ..Default::default()
        };
        explicit.fill_missing(DiffSource {
            author: Some("someone else".into()),
            commit_hash: Some("abc".into()),
            ..Default::default()
        });
        assert_eq!(explicit.author.as_deref(), Some("me"));
        assert_eq!(explicit.commit_hash.as_deref(), Some("abc"));
        assert_eq!(explicit.branch.as_deref(), Some("feature/x"));
    }
}
