//! Plugin verification rules.
//!
//! Rules inspect the parsed diff directly, without the model, and contribute
//! issues that are merged with the model-derived ones. Each rule is gated by
//! `rules.<id>` in the project config, falling back to its own default.

use crate::diff::{ChangeKind, ParsedDiff};
use crate::types::{IssueCategory, Severity};
use crate::verification::VerificationIssue;
use async_trait::async_trait;
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// What a rule gets to look at.
#[derive(Debug, Clone, Copy)]
pub struct ValidationContext<'a> {
    pub epic_id: &'a str,
    pub spec_ids: &'a [String],
    pub diff: &'a ParsedDiff,
}

#[async_trait]
pub trait VerificationRule: Send + Sync {
    fn id(&self) -> &str;

    fn description(&self) -> &str;

    fn enabled_by_default(&self) -> bool {
        true
    }

    async fn validate(&self, ctx: &ValidationContext<'_>) -> Vec<VerificationIssue>;
}

// ---------------------------------------------------------------------------
// Pattern rules
// ---------------------------------------------------------------------------

/// Flags every added line matching `pattern`.
pub struct PatternRule {
    pub id: &'static str,
    pub description: &'static str,
    pub enabled_by_default: bool,
    pub severity: Severity,
    pub category: IssueCategory,
    pub pattern: fn() -> &'static Regex,
    pub message: &'static str,
    /// Quote the offending line in the issue message.
    pub quote_line: bool,
}

#[async_trait]
impl VerificationRule for PatternRule {
    fn id(&self) -> &str {
        self.id
    }

    fn description(&self) -> &str {
        self.description
    }

    fn enabled_by_default(&self) -> bool {
        self.enabled_by_default
    }

    async fn validate(&self, ctx: &ValidationContext<'_>) -> Vec<VerificationIssue> {
        let re = (self.pattern)();
        let mut issues = Vec::new();
        for file in &ctx.diff.files {
            for change in &file.changes {
                if change.kind != ChangeKind::Addition || !re.is_match(&change.content) {
                    continue;
                }
                let message = if self.quote_line {
                    let quoted: String = change.content.trim().chars().take(80).collect();
                    format!("{}: `{quoted}`", self.message)
                } else {
                    self.message.to_string()
                };
                let mut issue =
                    VerificationIssue::new(self.severity, self.category, file.path.clone(), message)
                        .at_line(change.line_number);
                issue.rule_id = Some(self.id.to_string());
                issues.push(issue);
            }
        }
        issues
    }
}

static DEBUG_RE: OnceLock<Regex> = OnceLock::new();
static MARKER_RE: OnceLock<Regex> = OnceLock::new();
static SECRET_RE: OnceLock<Regex> = OnceLock::new();

fn debug_re() -> &'static Regex {
    DEBUG_RE.get_or_init(|| {
        Regex::new(
            r#"\bdbg!\(|console\.(?:log|debug)\(|println!\(\s*"DEBUG|\bdebugger;|System\.out\.println\("DEBUG"#,
        )
        .unwrap()
    })
}

fn marker_re() -> &'static Regex {
    MARKER_RE.get_or_init(|| Regex::new(r"\b(?:TODO|FIXME|XXX)\b").unwrap())
}

fn secret_re() -> &'static Regex {
    SECRET_RE.get_or_init(|| {
        Regex::new(concat!(
            r"-----BEGIN (?:RSA |EC |DSA |OPENSSH )?PRIVATE KEY-----",
            r"|\bAKIA[0-9A-Z]{16}\b",
            r#"|(?i:\b(?:password|passwd|secret|api[_-]?key|access[_-]?token)\b)\s*[:=]\s*["'][^"'\s]{4,}["']"#,
        ))
        .unwrap()
    })
}

pub fn no_debug_output() -> PatternRule {
    PatternRule {
        id: "no-debug-output",
        description: "Added lines must not contain leftover debug output",
        enabled_by_default: true,
        severity: Severity::Low,
        category: IssueCategory::Style,
        pattern: debug_re,
        message: "Debug output left in change",
        quote_line: true,
    }
}

pub fn no_unresolved_markers() -> PatternRule {
    PatternRule {
        id: "no-unresolved-markers",
        description: "Added lines must not introduce TODO/FIXME/XXX markers",
        enabled_by_default: false,
        severity: Severity::Low,
        category: IssueCategory::Documentation,
        pattern: marker_re,
        message: "Unresolved marker introduced",
        quote_line: true,
    }
}

pub fn no_hardcoded_secrets() -> PatternRule {
    PatternRule {
        id: "no-hardcoded-secrets",
        description: "Added lines must not embed credentials or private keys",
        enabled_by_default: true,
        severity: Severity::Critical,
        category: IssueCategory::Security,
        pattern: secret_re,
        message: "Possible hardcoded secret",
        quote_line: false,
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct RuleRegistry {
    rules: Vec<Box<dyn VerificationRule>>,
}

impl RuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn default_rules() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(no_debug_output()));
        registry.register(Box::new(no_unresolved_markers()));
        registry.register(Box::new(no_hardcoded_secrets()));
        registry
    }

    pub fn register(&mut self, rule: Box<dyn VerificationRule>) {
        self.rules.push(rule);
    }

    pub fn rules(&self) -> impl Iterator<Item = &dyn VerificationRule> {
        self.rules.iter().map(|r| r.as_ref())
    }

    pub fn get(&self, id: &str) -> Option<&dyn VerificationRule> {
        self.rules().find(|r| r.id() == id)
    }

    pub fn is_enabled(rule: &dyn VerificationRule, flags: &BTreeMap<String, bool>) -> bool {
        flags
            .get(rule.id())
            .copied()
            .unwrap_or_else(|| rule.enabled_by_default())
    }

    pub fn enabled_rules<'a>(
        &'a self,
        flags: &'a BTreeMap<String, bool>,
    ) -> impl Iterator<Item = &'a dyn VerificationRule> + 'a {
        self.rules().filter(move |r| Self::is_enabled(*r, flags))
    }

    /// Issues from every enabled rule, in registration order.
    pub async fn run(
        &self,
        flags: &BTreeMap<String, bool>,
        ctx: &ValidationContext<'_>,
    ) -> Vec<VerificationIssue> {
        let mut issues = Vec::new();
        for rule in self.enabled_rules(flags) {
            let found = rule.validate(ctx).await;
            tracing::debug!(rule = rule.id(), issues = found.len(), "rule evaluated");
            issues.extend(found);
        }
        issues
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
