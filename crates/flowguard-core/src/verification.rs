//! Persisted verification records.
//!
//! A [`Verification`] is written once per `verify` run to
//! `.flowguard/verifications/<id>.yaml`. After creation only two actions
//! mutate it: resolving an issue and overriding the approval status.

use crate::diff::{DiffFormat, DiffSource, FileStatus, ParsedDiff};
use crate::error::{FlowguardError, Result};
use crate::paths;
use crate::types::{ApprovalStatus, IssueCategory, IssueResolution, Severity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

// ---------------------------------------------------------------------------
// Issues
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixSuggestion {
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_example: Option<String>,
    #[serde(default)]
    pub automated_fix: bool,
    #[serde(default)]
    pub steps: Vec<String>,
}

impl FixSuggestion {
    /// Used when a fix could not be generated.
    pub fn manual_review() -> Self {
        Self {
            description: "Review the implementation against the specification and adjust it manually."
                .to_string(),
            code_example: None,
            automated_fix: false,
            steps: vec![
                "Re-read the relevant specification section".to_string(),
                "Compare it with the changed code".to_string(),
                "Update the implementation or the specification".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationIssue {
    pub id: String,
    pub severity: Severity,
    pub category: IssueCategory,
    pub file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fix_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fix_suggestion: Option<FixSuggestion>,
    #[serde(default)]
    pub resolution: IssueResolution,
    /// Set for issues raised by a plugin rule rather than the model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<String>,
}

impl VerificationIssue {
    pub fn new(
        severity: Severity,
        category: IssueCategory,
        file: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            severity,
            category,
            file: file.into(),
            line: None,
            message: message.into(),
            suggestion: None,
            fix_code: None,
            fix_suggestion: None,
            resolution: IssueResolution::Open,
            rule_id: None,
        }
    }

    pub fn at_line(mut self, line: u32) -> Self {
        self.line = Some(line);
        self
    }

    pub fn is_open(&self) -> bool {
        self.resolution == IssueResolution::Open
    }
}

// ---------------------------------------------------------------------------
// Summary
// ---------------------------------------------------------------------------

/// Per-severity counts. Every severity is always present, zero or not.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueCounts {
    #[serde(rename = "Critical")]
    pub critical: usize,
    #[serde(rename = "High")]
    pub high: usize,
    #[serde(rename = "Medium")]
    pub medium: usize,
    #[serde(rename = "Low")]
    pub low: usize,
}

impl IssueCounts {
    pub fn tally<'a>(issues: impl IntoIterator<Item = &'a VerificationIssue>) -> Self {
        let mut counts = Self::default();
        for issue in issues {
            match issue.severity {
                Severity::Critical => counts.critical += 1,
                Severity::High => counts.high += 1,
                Severity::Medium => counts.medium += 1,
                Severity::Low => counts.low += 1,
            }
        }
        counts
    }

    pub fn get(&self, severity: Severity) -> usize {
        match severity {
            Severity::Critical => self.critical,
            Severity::High => self.high,
            Severity::Medium => self.medium,
            Severity::Low => self.low,
        }
    }

    pub fn total(&self) -> usize {
        self.critical + self.high + self.medium + self.low
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationSummary {
    pub passed: bool,
    pub total_issues: usize,
    pub issue_counts: IssueCounts,
    pub recommendation: String,
    pub approval_status: ApprovalStatus,
}

// ---------------------------------------------------------------------------
// DiffAnalysis
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyzedFile {
    pub path: String,
    pub status: FileStatus,
    pub additions: usize,
    pub deletions: usize,
}

/// The flattened view of a [`ParsedDiff`] stored on a verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffAnalysis {
    pub format: DiffFormat,
    pub total_files: usize,
    pub total_lines: usize,
    pub additions: usize,
    pub deletions: usize,
    pub files: Vec<AnalyzedFile>,
}

impl From<&ParsedDiff> for DiffAnalysis {
    fn from(diff: &ParsedDiff) -> Self {
        Self {
            format: diff.format,
            total_files: diff.stats.total_files,
            total_lines: diff.stats.total_lines,
            additions: diff.stats.additions,
            deletions: diff.stats.deletions,
            files: diff
                .files
                .iter()
                .map(|f| AnalyzedFile {
                    path: f.path.clone(),
                    status: f.status.simplified(),
                    additions: f.additions(),
                    deletions: f.deletions(),
                })
                .collect(),
        }
    }
}

impl DiffAnalysis {
    pub fn empty(format: DiffFormat) -> Self {
        Self {
            format,
            total_files: 0,
            total_lines: 0,
            additions: 0,
            deletions: 0,
            files: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Verification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verification {
    pub id: String,
    pub epic_id: String,
    #[serde(default)]
    pub spec_ids: Vec<String>,
    #[serde(default)]
    pub source: DiffSource,
    pub analysis: DiffAnalysis,
    #[serde(default)]
    pub issues: Vec<VerificationIssue>,
    pub summary: VerificationSummary,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Verification {
    pub fn new(
        epic_id: impl Into<String>,
        spec_ids: Vec<String>,
        source: DiffSource,
        analysis: DiffAnalysis,
        issues: Vec<VerificationIssue>,
        summary: VerificationSummary,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            epic_id: epic_id.into(),
            spec_ids,
            source,
            analysis,
            issues,
            summary,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn issue(&self, issue_id: &str) -> Option<&VerificationIssue> {
        self.issues.iter().find(|i| i.id == issue_id)
    }

    /// Mark one issue fixed, ignored, or open again. The stored summary is
    /// left as it was at creation.
    pub fn resolve_issue(&mut self, issue_id: &str, resolution: IssueResolution) -> Result<()> {
        let issue = self
            .issues
            .iter_mut()
            .find(|i| i.id == issue_id)
            .ok_or_else(|| FlowguardError::IssueNotFound {
                verification: self.id.clone(),
                issue: issue_id.to_string(),
            })?;
        issue.resolution = resolution;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Override the approval decision, e.g. a reviewer accepting a result
    /// with conditions.
    pub fn set_approval(&mut self, status: ApprovalStatus) {
        self.summary.approval_status = status;
        self.summary.passed = !matches!(status, ApprovalStatus::ChangesRequested);
        self.updated_at = Utc::now();
    }

    /// Summary recomputed over issues that are still open.
    pub fn open_summary(&self) -> VerificationSummary {
        let open: Vec<VerificationIssue> =
            self.issues.iter().filter(|i| i.is_open()).cloned().collect();
        crate::feedback::generate_summary(&open)
    }

    // ---------------------------------------------------------------------------
    // Persistence
    // ---------------------------------------------------------------------------

    pub fn load(root: &Path, id: &str) -> Result<Self> {
        let path = paths::verification_path(root, id);
        if !path.exists() {
            return Err(FlowguardError::VerificationNotFound(id.to_string()));
        }
        crate::io::read_yaml(&path)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        crate::io::write_yaml(&paths::verification_path(root, &self.id), self)
    }

    /// Stored verifications, newest first, optionally for one epic.
    pub fn list(root: &Path, epic_id: Option<&str>) -> Result<Vec<Self>> {
        let dir = paths::verifications_dir(root);
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut records = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("yaml") {
                continue;
            }
            let record: Self = crate::io::read_yaml(&path)?;
            if epic_id.is_none_or(|e| record.epic_id == e) {
                records.push(record);
            }
        }
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
