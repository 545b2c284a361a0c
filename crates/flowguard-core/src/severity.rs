//! Model-assisted severity rating for deviations.

use crate::matcher::{truncate_chars, Deviation};
use crate::types::Severity;
use flowguard_llm::{generate_structured, ChatMessage, LlmProvider};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

const MAX_SPEC_CHARS: usize = 2000;

const RUBRIC: &str = "Severity rubric:\n\
- Critical: security vulnerabilities, data loss or corruption, breaking API changes, \
  anything that risks production stability.\n\
- High: violations of functional requirements, logic errors, data integrity defects.\n\
- Medium: partial compliance with non-functional requirements, code quality problems, \
  missing error handling.\n\
- Low: style, naming, documentation, cosmetic differences.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeverityRating {
    pub severity: Severity,
    pub reasoning: String,
    pub confidence: f64,
    #[serde(default)]
    pub impact_areas: Vec<String>,
}

impl SeverityRating {
    fn fallback(reason: &str) -> Self {
        Self {
            severity: Severity::Medium,
            reasoning: format!("Severity could not be rated automatically: {reason}"),
            confidence: 0.5,
            impact_areas: vec!["unknown".to_string()],
        }
    }
}

/// What the rater knows about where a deviation came from.
#[derive(Debug, Clone, Copy)]
pub struct RatingContext<'a> {
    pub spec_content: &'a str,
    pub file_path: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RatingResponse {
    severity: Severity,
    reasoning: String,
    confidence: f64,
    #[serde(default)]
    impact_areas: Vec<String>,
}

fn response_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "severity": { "type": "string", "enum": ["Critical", "High", "Medium", "Low"] },
            "reasoning": { "type": "string" },
            "confidence": { "type": "number", "minimum": 0, "maximum": 1 },
            "impactAreas": { "type": "array", "items": { "type": "string" } }
        },
        "required": ["severity", "reasoning", "confidence", "impactAreas"]
    })
}

pub struct SeverityRater {
    llm: Arc<dyn LlmProvider>,
}

impl SeverityRater {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }

    /// Never fails: a rating error yields a Medium, half-confidence default.
    pub async fn rate_deviation(
        &self,
        deviation: &Deviation,
        context: RatingContext<'_>,
    ) -> SeverityRating {
        let messages = build_messages(deviation, context);
        match generate_structured::<RatingResponse, _>(self.llm.as_ref(), &messages, &response_schema())
            .await
        {
            Ok(r) => SeverityRating {
                severity: r.severity,
                reasoning: r.reasoning,
                confidence: r.confidence.clamp(0.0, 1.0),
                impact_areas: r.impact_areas,
            },
            Err(e) => {
                warn!(file = context.file_path, error = %e, "severity rating failed");
                SeverityRating::fallback(&e.to_string())
            }
        }
    }

    /// Rate every deviation, at most `concurrency` at a time. Output order
    /// matches input order.
    pub async fn rate_deviations_batch(
        &self,
        deviations: &[Deviation],
        context: RatingContext<'_>,
        concurrency: usize,
    ) -> Vec<SeverityRating> {
        stream::iter(deviations)
            .map(|d| self.rate_deviation(d, context))
            .buffered(concurrency.max(1))
            .collect()
            .await
    }
}

fn build_messages(deviation: &Deviation, context: RatingContext<'_>) -> Vec<ChatMessage> {
    let system = format!(
        "You rate the severity of deviations between code changes and their \
         specification.\n\n{RUBRIC}\n\nList the impact areas affected, using short \
         tags such as security, performance, functionality, style, documentation, \
         testing or architecture."
    );

    let location = match deviation.line {
        Some(line) => format!("{}:{line}", context.file_path),
        None => context.file_path.to_string(),
    };

    let user = format!(
        "## Deviation ({})\n{}\n\nExpected: {}\nActual: {}\nLocation: {location}\n\n\
         ## Specification excerpt\n{}",
        deviation.kind,
        deviation.description,
        deviation.expected_behavior,
        deviation.actual_behavior,
        truncate_chars(context.spec_content, MAX_SPEC_CHARS),
    );

    vec![ChatMessage::system(system), ChatMessage::user(user)]
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
