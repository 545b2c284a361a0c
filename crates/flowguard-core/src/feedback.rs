//! Turn rated deviations into issues and issues into an approval decision.

use crate::diff::{ChangeKind, ChangedFile};
use crate::matcher::{Deviation, SpecMatchResult};
use crate::severity::SeverityRating;
use crate::types::{ApprovalStatus, IssueCategory};
use crate::verification::{FixSuggestion, IssueCounts, VerificationIssue, VerificationSummary};
use flowguard_llm::{generate_structured, ChatMessage, LlmProvider};
use futures::stream::{self, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tracing::warn;

/// A match together with one rating per deviation, index-aligned.
#[derive(Debug, Clone)]
pub struct RatedMatch {
    pub result: SpecMatchResult,
    pub ratings: Vec<SeverityRating>,
}

// ---------------------------------------------------------------------------
// Category classification
// ---------------------------------------------------------------------------

/// First keyword group that any impact area mentions wins.
const CATEGORY_KEYWORDS: &[(&[&str], IssueCategory)] = &[
    (&["security"], IssueCategory::Security),
    (&["performance"], IssueCategory::Performance),
    (&["logic", "functionality"], IssueCategory::Logic),
    (&["style"], IssueCategory::Style),
    (&["documentation", "docs"], IssueCategory::Documentation),
    (&["test"], IssueCategory::Testing),
    (&["architecture", "design"], IssueCategory::Architecture),
];

pub fn classify_category(impact_areas: &[String]) -> IssueCategory {
    let areas: Vec<String> = impact_areas.iter().map(|a| a.to_lowercase()).collect();
    CATEGORY_KEYWORDS
        .iter()
        .find(|(keywords, _)| {
            areas
                .iter()
                .any(|area| keywords.iter().any(|k| area.contains(k)))
        })
        .map(|(_, category)| *category)
        .unwrap_or(IssueCategory::Logic)
}

/// Where a deviation points: its own line if given, else the first change
/// whose content appears in the actual behavior, else the first addition.
fn locate_line(deviation: &Deviation, file: &ChangedFile) -> Option<u32> {
    if deviation.line.is_some() {
        return deviation.line;
    }
    let actual = deviation.actual_behavior.trim();
    if !actual.is_empty() {
        let hit = file.changed_lines().find(|c| {
            let content = c.content.trim();
            !content.is_empty() && (actual.contains(content) || content.contains(actual))
        });
        if let Some(change) = hit {
            return Some(change.line_number);
        }
    }
    file.changes
        .iter()
        .find(|c| c.kind == ChangeKind::Addition)
        .map(|c| c.line_number)
}

fn compose_message(deviation: &Deviation, rating: &SeverityRating) -> String {
    format!(
        "[{}] {}\nExpected: {}\nActual: {}\nSeverity: {} - {}",
        deviation.kind.label(),
        deviation.description,
        deviation.expected_behavior,
        deviation.actual_behavior,
        rating.severity,
        rating.reasoning,
    )
}

// ---------------------------------------------------------------------------
// Fix suggestions
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FixResponse {
    description: String,
    #[serde(default)]
    code_example: Option<String>,
    #[serde(default)]
    automated_fix: bool,
    #[serde(default)]
    steps: Vec<String>,
}

fn fix_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "description": { "type": "string" },
            "codeExample": { "type": "string" },
            "automatedFix": { "type": "boolean" },
            "steps": { "type": "array", "items": { "type": "string" } }
        },
        "required": ["description", "automatedFix", "steps"]
    })
}

fn fix_messages(deviation: &Deviation, file: &ChangedFile) -> Vec<ChatMessage> {
    let system = "You suggest concrete fixes that bring code changes in line with their \
                  specification. Keep steps short and ordered. Include a code example \
                  only when it clarifies the fix.";
    let user = format!(
        "File: {}\nDeviation ({}): {}\nExpected: {}\nActual: {}",
        file.path,
        deviation.kind,
        deviation.description,
        deviation.expected_behavior,
        deviation.actual_behavior,
    );
    vec![ChatMessage::system(system), ChatMessage::user(user)]
}

// ---------------------------------------------------------------------------
// FeedbackGenerator
// ---------------------------------------------------------------------------

pub struct FeedbackGenerator {
    llm: Arc<dyn LlmProvider>,
    include_code_examples: bool,
    concurrency: usize,
}

impl FeedbackGenerator {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self {
            llm,
            include_code_examples: true,
            concurrency: 1,
        }
    }

    pub fn with_code_examples(mut self, include: bool) -> Self {
        self.include_code_examples = include;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// One issue per `(deviation, rating)` pair, in match order. A match
    /// whose rating count disagrees with its deviation count is skipped.
    pub async fn generate_feedback(&self, rated: &[RatedMatch]) -> Vec<VerificationIssue> {
        let mut pairs = Vec::new();
        for m in rated {
            if m.ratings.len() != m.result.deviations.len() {
                warn!(
                    file = %m.result.file.path,
                    deviations = m.result.deviations.len(),
                    ratings = m.ratings.len(),
                    "deviation/rating count mismatch, skipping match"
                );
                continue;
            }
            for (deviation, rating) in m.result.deviations.iter().zip(&m.ratings) {
                pairs.push((deviation, rating, &m.result.file));
            }
        }

        stream::iter(pairs)
            .map(|(deviation, rating, file)| self.build_issue(deviation, rating, file))
            .buffered(self.concurrency)
            .collect()
            .await
    }

    async fn build_issue(
        &self,
        deviation: &Deviation,
        rating: &SeverityRating,
        file: &ChangedFile,
    ) -> VerificationIssue {
        let mut issue = VerificationIssue::new(
            rating.severity,
            classify_category(&rating.impact_areas),
            deviation.file.clone().unwrap_or_else(|| file.path.clone()),
            compose_message(deviation, rating),
        );
        issue.line = locate_line(deviation, file);

        if self.include_code_examples {
            let fix = self.suggest_fix(deviation, file).await;
            issue.suggestion = Some(fix.description.clone());
            issue.fix_code = fix.code_example.clone();
            issue.fix_suggestion = Some(fix);
        }
        issue
    }

    async fn suggest_fix(&self, deviation: &Deviation, file: &ChangedFile) -> FixSuggestion {
        let messages = fix_messages(deviation, file);
        match generate_structured::<FixResponse, _>(self.llm.as_ref(), &messages, &fix_schema()).await
        {
            Ok(r) => FixSuggestion {
                description: r.description,
                code_example: r.code_example.filter(|c| !c.trim().is_empty()),
                automated_fix: r.automated_fix,
                steps: r.steps,
            },
            Err(e) => {
                warn!(file = %file.path, error = %e, "fix suggestion failed");
                FixSuggestion::manual_review()
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Summary
// ---------------------------------------------------------------------------

/// Approval decision over `issues`:
///
/// | present            | status                     | passed |
/// |--------------------|----------------------------|--------|
/// | any Critical/High  | `changes_requested`        | false  |
/// | any Medium/Low     | `approved_with_conditions` | true   |
/// | none               | `approved`                 | true   |
pub fn generate_summary(issues: &[VerificationIssue]) -> VerificationSummary {
    let counts = IssueCounts::tally(issues);

    let (approval_status, recommendation) = if counts.critical > 0 {
        (
            ApprovalStatus::ChangesRequested,
            format!(
                "{} critical issue(s) must be resolved before these changes can be approved.",
                counts.critical
            ),
        )
    } else if counts.high > 0 {
        (
            ApprovalStatus::ChangesRequested,
            format!(
                "{} high severity issue(s) should be addressed before approval.",
                counts.high
            ),
        )
    } else if counts.medium > 0 {
        (
            ApprovalStatus::ApprovedWithConditions,
            format!(
                "Approved with conditions: address {} medium severity issue(s) in a follow-up.",
                counts.medium
            ),
        )
    } else if counts.low > 0 {
        (
            ApprovalStatus::ApprovedWithConditions,
            format!(
                "Approved with conditions: {} minor issue(s) noted.",
                counts.low
            ),
        )
    } else {
        (
            ApprovalStatus::Approved,
            "Changes match the specification.".to_string(),
        )
    };
    let passed = !issues.iter().any(|i| i.severity.is_blocking());

    VerificationSummary {
        passed,
        total_issues: issues.len(),
        issue_counts: counts,
        recommendation,
        approval_status,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
