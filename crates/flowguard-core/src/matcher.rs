//! Match changed files against a specification's requirements.
//!
//! Requirements are pulled out of the spec's Markdown by section heading
//! (best-effort, no grammar), then each changed file is sent to the model
//! with the requirement list and a bounded diff excerpt. A failed analysis
//! never raises: it becomes a single zero-confidence `incorrect` deviation.

use crate::diff::{ChangeKind, ChangedFile, ParsedDiff};
use crate::error::Result;
use crate::store::Storage;
use crate::types::DeviationType;
use flowguard_llm::{generate_structured, ChatMessage, LlmProvider};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};
use tracing::{debug, warn};

const MAX_EXCERPT_CHANGES: usize = 50;
const MAX_CHANGE_CHARS: usize = 100;
const MAX_SPEC_CHARS: usize = 3000;

const REQUIREMENT_SECTIONS: &[&str] = &[
    "Functional Requirements",
    "Non-Functional Requirements",
    "Technical Plan",
];

// ---------------------------------------------------------------------------
// Deviation / SpecMatchResult
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deviation {
    #[serde(rename = "type")]
    pub kind: DeviationType,
    pub description: String,
    pub expected_behavior: String,
    pub actual_behavior: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
}

/// Outcome of matching one changed file against one spec.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecMatchResult {
    pub spec_id: String,
    pub file: ChangedFile,
    pub matched_requirements: Vec<String>,
    pub deviations: Vec<Deviation>,
    pub confidence: f64,
}

impl SpecMatchResult {
    fn failed(spec_id: &str, file: &ChangedFile, reason: &str) -> Self {
        Self {
            spec_id: spec_id.to_string(),
            file: file.clone(),
            matched_requirements: Vec::new(),
            deviations: vec![Deviation {
                kind: DeviationType::Incorrect,
                description: format!("Failed to analyze {} against the specification: {reason}", file.path),
                expected_behavior: "Changes can be verified against the specification".to_string(),
                actual_behavior: "Automated analysis did not complete".to_string(),
                file: Some(file.path.clone()),
                line: None,
            }],
            confidence: 0.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Model response
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MatchResponse {
    #[serde(default)]
    matched_requirements: Vec<String>,
    #[serde(default)]
    deviations: Vec<ResponseDeviation>,
    confidence: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponseDeviation {
    #[serde(rename = "type")]
    kind: DeviationType,
    description: String,
    #[serde(default)]
    expected_behavior: String,
    #[serde(default)]
    actual_behavior: String,
    #[serde(default)]
    line_number: Option<u32>,
}

fn response_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "matchedRequirements": {
                "type": "array",
                "items": { "type": "string" }
            },
            "deviations": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "type": { "type": "string", "enum": ["missing", "extra", "incorrect"] },
                        "description": { "type": "string" },
                        "expectedBehavior": { "type": "string" },
                        "actualBehavior": { "type": "string" },
                        "lineNumber": { "type": "integer" }
                    },
                    "required": ["type", "description", "expectedBehavior", "actualBehavior"]
                }
            },
            "confidence": { "type": "number", "minimum": 0, "maximum": 1 }
        },
        "required": ["matchedRequirements", "deviations", "confidence"]
    })
}

// ---------------------------------------------------------------------------
// Requirement extraction
// ---------------------------------------------------------------------------

static BULLET_RE: OnceLock<Regex> = OnceLock::new();
static TAGGED_RE: OnceLock<Regex> = OnceLock::new();

fn bullet_re() -> &'static Regex {
    BULLET_RE.get_or_init(|| Regex::new(r"^\s*(?:[-*+]|\d+[.)])\s+(.+?)\s*$").unwrap())
}

fn tagged_re() -> &'static Regex {
    TAGGED_RE.get_or_init(|| {
        Regex::new(r"^\s*(?:[-*+]\s+)?\**((?:FR|NFR|REQ)[-_ ]?\d*\**\s*[:.)\-]\s*.+?)\s*$").unwrap()
    })
}

/// Bullet lines under the requirement sections, in document order. Falls
/// back to any line tagged `FR`/`NFR`/`REQ` when no section has bullets.
pub fn extract_requirements(content: &str) -> Vec<String> {
    let mut requirements = Vec::new();
    let mut in_section = false;

    for line in content.lines() {
        if let Some(heading) = line.trim_start().strip_prefix("## ") {
            let heading = heading.trim();
            in_section = REQUIREMENT_SECTIONS
                .iter()
                .any(|s| heading.eq_ignore_ascii_case(s));
            continue;
        }
        if line.starts_with("# ") {
            in_section = false;
            continue;
        }
        if in_section {
            if let Some(caps) = bullet_re().captures(line) {
                requirements.push(caps[1].to_string());
            }
        }
    }

    if requirements.is_empty() {
        requirements = content
            .lines()
            .filter_map(|l| tagged_re().captures(l).map(|c| c[1].to_string()))
            .collect();
    }
    requirements
}

/// First changed lines of `file`, one per line, prefixed `+`/`-`.
fn diff_excerpt(file: &ChangedFile) -> String {
    let changed: Vec<_> = file.changed_lines().collect();
    let mut out = String::new();
    for change in changed.iter().take(MAX_EXCERPT_CHANGES) {
        let sign = if change.kind == ChangeKind::Addition { '+' } else { '-' };
        let content: String = change.content.chars().take(MAX_CHANGE_CHARS).collect();
        out.push_str(&format!("{sign}{:>5}: {content}\n", change.line_number));
    }
    if changed.len() > MAX_EXCERPT_CHANGES {
        out.push_str(&format!(
            "... and {} more changes\n",
            changed.len() - MAX_EXCERPT_CHANGES
        ));
    }
    out
}

pub(crate) fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

// ---------------------------------------------------------------------------
// SpecMatcher
// ---------------------------------------------------------------------------

pub struct SpecMatcher {
    llm: Arc<dyn LlmProvider>,
    storage: Arc<dyn Storage>,
    cache: Mutex<HashMap<String, String>>,
}

impl SpecMatcher {
    pub fn new(llm: Arc<dyn LlmProvider>, storage: Arc<dyn Storage>) -> Self {
        Self {
            llm,
            storage,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Spec body, read through the cache.
    pub fn spec_content(&self, spec_id: &str) -> Result<String> {
        if let Some(content) = self.cache_lock().get(spec_id) {
            return Ok(content.clone());
        }
        let spec = self.storage.load_spec(spec_id)?;
        self.cache_lock()
            .insert(spec_id.to_string(), spec.content.clone());
        Ok(spec.content)
    }

    pub fn clear_cache(&self) {
        self.cache_lock().clear();
    }

    fn cache_lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        // A poisoned cache only ever held complete entries.
        self.cache.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// One result per changed file, in diff order.
    pub async fn match_changes_to_spec(
        &self,
        diff: &ParsedDiff,
        spec_id: &str,
    ) -> Vec<SpecMatchResult> {
        let content = match self.spec_content(spec_id) {
            Ok(c) => c,
            Err(e) => {
                warn!(spec = spec_id, error = %e, "failed to load spec");
                return diff
                    .files
                    .iter()
                    .map(|f| SpecMatchResult::failed(spec_id, f, &e.to_string()))
                    .collect();
            }
        };
        let requirements = extract_requirements(&content);
        debug!(spec = spec_id, requirements = requirements.len(), "extracted requirements");

        let mut results = Vec::with_capacity(diff.files.len());
        for file in &diff.files {
            let result = match self.match_file(spec_id, &content, &requirements, file).await {
                Ok(r) => r,
                Err(e) => {
                    warn!(spec = spec_id, file = %file.path, error = %e, "spec matching failed");
                    SpecMatchResult::failed(spec_id, file, &e.to_string())
                }
            };
            results.push(result);
        }
        results
    }

    async fn match_file(
        &self,
        spec_id: &str,
        content: &str,
        requirements: &[String],
        file: &ChangedFile,
    ) -> Result<SpecMatchResult> {
        let messages = build_messages(content, requirements, file);
        let response: MatchResponse =
            generate_structured(self.llm.as_ref(), &messages, &response_schema()).await?;

        let deviations = response
            .deviations
            .into_iter()
            .map(|d| Deviation {
                kind: d.kind,
                description: d.description,
                expected_behavior: d.expected_behavior,
                actual_behavior: d.actual_behavior,
                file: Some(file.path.clone()),
                line: d.line_number,
            })
            .collect();

        Ok(SpecMatchResult {
            spec_id: spec_id.to_string(),
            file: file.clone(),
            matched_requirements: response.matched_requirements,
            deviations,
            confidence: response.confidence.clamp(0.0, 1.0),
        })
    }
}

fn build_messages(content: &str, requirements: &[String], file: &ChangedFile) -> Vec<ChatMessage> {
    let system = "You are a code reviewer verifying that code changes implement a \
                  specification. Report which requirements the changes satisfy and every \
                  deviation: requirements the change misses (missing), behavior the \
                  specification does not ask for (extra), and behavior that contradicts \
                  it (incorrect). Only report deviations supported by the diff.";

    let requirement_list = if requirements.is_empty() {
        "(no explicit requirements found; use the specification text)".to_string()
    } else {
        requirements
            .iter()
            .map(|r| format!("- {r}"))
            .collect::<Vec<_>>()
            .join("\n")
    };

    let user = format!(
        "## Requirements\n{requirement_list}\n\n\
         ## Specification excerpt\n{}\n\n\
         ## Changes to {} ({})\n{}",
        truncate_chars(content, MAX_SPEC_CHARS),
        file.path,
        file.status,
        diff_excerpt(file),
    );

    vec![ChatMessage::system(system), ChatMessage::user(user)]
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
