//! The verification pipeline: parse → match → rate → feedback → rules →
//! filters → summary → persist.
//!
//! [`VerificationEngine::verify_changes`] always returns a [`Verification`].
//! Stage failures degrade inside the stages; anything that still escapes
//! (storage errors, an epic with no specs) becomes a failed record with a
//! single High severity system-error issue.

use crate::config::{Config, VerificationConfig};
use crate::diff::{self, DiffFormat, DiffSource, ParsedDiff};
use crate::error::{FlowguardError, Result};
use crate::feedback::{generate_summary, FeedbackGenerator, RatedMatch};
use crate::matcher::SpecMatcher;
use crate::rules::{RuleRegistry, ValidationContext};
use crate::severity::{RatingContext, SeverityRater};
use crate::store::Storage;
use crate::types::{ApprovalStatus, IssueCategory, Severity};
use crate::verification::{DiffAnalysis, Verification, VerificationIssue};
use flowguard_llm::LlmProvider;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error, info};

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct DiffInput {
    pub text: String,
    /// Detected from `text` when absent.
    pub format: Option<DiffFormat>,
    pub source: DiffSource,
}

impl DiffInput {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VerifyOptions {
    pub skip_low_severity: bool,
    pub max_issues: Option<usize>,
    pub auto_approve: bool,
    pub include_code_examples: bool,
    pub rating_concurrency: usize,
}

impl Default for VerifyOptions {
    fn default() -> Self {
        Self::from(&VerificationConfig::default())
    }
}

impl From<&VerificationConfig> for VerifyOptions {
    fn from(cfg: &VerificationConfig) -> Self {
        Self {
            skip_low_severity: cfg.skip_low_severity,
            max_issues: cfg.max_issues,
            auto_approve: cfg.auto_approve,
            include_code_examples: cfg.include_code_examples,
            rating_concurrency: cfg.rating_concurrency,
        }
    }
}

#[derive(Debug, Clone)]
pub struct VerifyInput {
    pub epic_id: String,
    /// Every spec of the epic when `None` or empty.
    pub spec_ids: Option<Vec<String>>,
    pub diff_input: DiffInput,
    pub options: VerifyOptions,
}

// ---------------------------------------------------------------------------
// VerificationEngine
// ---------------------------------------------------------------------------

pub struct VerificationEngine {
    llm: Arc<dyn LlmProvider>,
    storage: Arc<dyn Storage>,
    matcher: SpecMatcher,
    rater: SeverityRater,
    rules: RuleRegistry,
    rule_flags: BTreeMap<String, bool>,
}

impl VerificationEngine {
    pub fn new(llm: Arc<dyn LlmProvider>, storage: Arc<dyn Storage>, rules: RuleRegistry) -> Self {
        Self {
            matcher: SpecMatcher::new(llm.clone(), storage.clone()),
            rater: SeverityRater::new(llm.clone()),
            llm,
            storage,
            rules,
            rule_flags: BTreeMap::new(),
        }
    }

    /// Engine with the built-in rules gated by `config.rules`.
    pub fn from_config(config: &Config, llm: Arc<dyn LlmProvider>, storage: Arc<dyn Storage>) -> Self {
        Self::new(llm, storage, RuleRegistry::default_rules()).with_rule_flags(config.rules.clone())
    }

    pub fn with_rule_flags(mut self, flags: BTreeMap<String, bool>) -> Self {
        self.rule_flags = flags;
        self
    }

    pub async fn verify_changes(&self, input: VerifyInput) -> Verification {
        let text = &input.diff_input.text;
        let format = input
            .diff_input
            .format
            .unwrap_or_else(|| diff::detect_format(text));
        let parsed = diff::parse_diff(text, format);

        let mut source = input.diff_input.source.clone();
        source.fill_missing(diff::extract_metadata(text, format));

        info!(
            epic = %input.epic_id,
            format = %format,
            files = parsed.stats.total_files,
            lines = parsed.stats.total_lines,
            "verifying changes"
        );

        let verification = match self.run(&input, &parsed).await {
            Ok((spec_ids, issues)) => {
                let issues = apply_filters(issues, &input.options);
                let mut summary = generate_summary(&issues);
                if input.options.auto_approve
                    && summary.approval_status == ApprovalStatus::ApprovedWithConditions
                {
                    summary.approval_status = ApprovalStatus::Approved;
                }
                Verification::new(
                    input.epic_id.clone(),
                    spec_ids,
                    source,
                    DiffAnalysis::from(&parsed),
                    issues,
                    summary,
                )
            }
            Err(e) => {
                error!(epic = %input.epic_id, error = %e, "verification failed");
                failed_verification(&input, source, &parsed, &e)
            }
        };

        if let Err(e) = self.storage.save_verification(&verification) {
            error!(id = %verification.id, error = %e, "failed to persist verification");
        }

        info!(
            id = %verification.id,
            issues = verification.summary.total_issues,
            status = %verification.summary.approval_status,
            "verification complete"
        );
        verification
    }

    async fn run(
        &self,
        input: &VerifyInput,
        parsed: &ParsedDiff,
    ) -> Result<(Vec<String>, Vec<VerificationIssue>)> {
        let spec_ids = self.resolve_spec_ids(input)?;
        let options = &input.options;

        let mut rated = Vec::new();
        for spec_id in &spec_ids {
            let matches = self.matcher.match_changes_to_spec(parsed, spec_id).await;
            let content = self.matcher.spec_content(spec_id).unwrap_or_default();

            for result in matches {
                if result.deviations.is_empty() {
                    continue;
                }
                let ctx = RatingContext {
                    spec_content: &content,
                    file_path: &result.file.path,
                };
                let ratings = self
                    .rater
                    .rate_deviations_batch(&result.deviations, ctx, options.rating_concurrency)
                    .await;
                rated.push(RatedMatch { result, ratings });
            }
            debug!(spec = %spec_id, rated = rated.len(), "spec matched");
        }

        let feedback = FeedbackGenerator::new(self.llm.clone())
            .with_code_examples(options.include_code_examples)
            .with_concurrency(options.rating_concurrency);
        let mut issues = feedback.generate_feedback(&rated).await;

        let ctx = ValidationContext {
            epic_id: &input.epic_id,
            spec_ids: &spec_ids,
            diff: parsed,
        };
        issues.extend(self.rules.run(&self.rule_flags, &ctx).await);

        Ok((spec_ids, issues))
    }

    fn resolve_spec_ids(&self, input: &VerifyInput) -> Result<Vec<String>> {
        let ids = match &input.spec_ids {
            Some(ids) if !ids.is_empty() => ids.clone(),
            _ => self
                .storage
                .list_specs(Some(&input.epic_id))?
                .into_iter()
                .map(|s| s.id)
                .collect(),
        };
        if ids.is_empty() {
            return Err(FlowguardError::NoSpecs(input.epic_id.clone()));
        }
        Ok(ids)
    }
}

/// Drop Low issues if asked, then cap the count. When capping, the most
/// severe issues are kept so a truncated list still gates approval.
fn apply_filters(mut issues: Vec<VerificationIssue>, options: &VerifyOptions) -> Vec<VerificationIssue> {
    if options.skip_low_severity {
        issues.retain(|i| i.severity != Severity::Low);
    }
    if let Some(max) = options.max_issues {
        if issues.len() > max {
            issues.sort_by_key(|i| i.severity);
            issues.truncate(max);
        }
    }
    issues
}

fn failed_verification(
    input: &VerifyInput,
    source: DiffSource,
    parsed: &ParsedDiff,
    err: &FlowguardError,
) -> Verification {
    let issue = VerificationIssue::new(
        Severity::High,
        IssueCategory::Architecture,
        "system",
        format!("Verification system error: {err}"),
    );
    let issues = vec![issue];
    let mut summary = generate_summary(&issues);
    summary.recommendation =
        "Verification could not complete. Fix the reported error and run it again.".to_string();
    Verification::new(
        input.epic_id.clone(),
        input.spec_ids.clone().unwrap_or_default(),
        source,
        DiffAnalysis::from(parsed),
        issues,
        summary,
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
