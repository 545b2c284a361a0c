use crate::error::FlowguardError;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Severity
// ---------------------------------------------------------------------------

/// Deviation severity. Serialized capitalized (`"Critical"`) since the same
/// spelling is used in model prompts and response schemas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

impl Severity {
    pub fn all() -> &'static [Severity] {
        &[
            Severity::Critical,
            Severity::High,
            Severity::Medium,
            Severity::Low,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Critical => "Critical",
            Severity::High => "High",
            Severity::Medium => "Medium",
            Severity::Low => "Low",
        }
    }

    /// Critical and High block approval.
    pub fn is_blocking(self) -> bool {
        matches!(self, Severity::Critical | Severity::High)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Severity {
    type Err = FlowguardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "critical" => Ok(Severity::Critical),
            "high" => Ok(Severity::High),
            "medium" => Ok(Severity::Medium),
            "low" => Ok(Severity::Low),
            _ => Err(FlowguardError::InvalidValue {
                field: "severity",
                value: s.to_string(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// IssueCategory
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueCategory {
    Security,
    Performance,
    Style,
    Logic,
    Documentation,
    Testing,
    Architecture,
}

impl IssueCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            IssueCategory::Security => "security",
            IssueCategory::Performance => "performance",
            IssueCategory::Style => "style",
            IssueCategory::Logic => "logic",
            IssueCategory::Documentation => "documentation",
            IssueCategory::Testing => "testing",
            IssueCategory::Architecture => "architecture",
        }
    }
}

impl fmt::Display for IssueCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ApprovalStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Approved,
    ApprovedWithConditions,
    ChangesRequested,
    Pending,
}

impl ApprovalStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ApprovalStatus::Approved => "approved",
            ApprovalStatus::ApprovedWithConditions => "approved_with_conditions",
            ApprovalStatus::ChangesRequested => "changes_requested",
            ApprovalStatus::Pending => "pending",
        }
    }
}

impl fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ApprovalStatus {
    type Err = FlowguardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "approved" => Ok(ApprovalStatus::Approved),
            "approved_with_conditions" => Ok(ApprovalStatus::ApprovedWithConditions),
            "changes_requested" => Ok(ApprovalStatus::ChangesRequested),
            "pending" => Ok(ApprovalStatus::Pending),
            _ => Err(FlowguardError::InvalidValue {
                field: "approval status",
                value: s.to_string(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// IssueResolution
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueResolution {
    #[default]
    Open,
    Fixed,
    Ignored,
}

impl IssueResolution {
    pub fn as_str(self) -> &'static str {
        match self {
            IssueResolution::Open => "open",
            IssueResolution::Fixed => "fixed",
            IssueResolution::Ignored => "ignored",
        }
    }
}

impl fmt::Display for IssueResolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for IssueResolution {
    type Err = FlowguardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(IssueResolution::Open),
            "fixed" => Ok(IssueResolution::Fixed),
            "ignored" => Ok(IssueResolution::Ignored),
            _ => Err(FlowguardError::InvalidValue {
                field: "resolution",
                value: s.to_string(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// DeviationType
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviationType {
    Missing,
    Extra,
    Incorrect,
}

impl DeviationType {
    pub fn as_str(self) -> &'static str {
        match self {
            DeviationType::Missing => "missing",
            DeviationType::Extra => "extra",
            DeviationType::Incorrect => "incorrect",
        }
    }

    /// Heading used when composing issue messages.
    pub fn label(self) -> &'static str {
        match self {
            DeviationType::Missing => "Missing Implementation",
            DeviationType::Extra => "Unspecified Change",
            DeviationType::Incorrect => "Incorrect Implementation",
        }
    }
}

impl fmt::Display for DeviationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_serializes_capitalized() {
        let json = serde_json::to_string(&Severity::Critical).unwrap();
        assert_eq!(json, "\"Critical\"");
        let parsed: Severity = serde_json::from_str("\"Low\"").unwrap();
        assert_eq!(parsed, Severity::Low);
    }

    #[test]
    fn severity_from_str_is_case_insensitive() {
        assert_eq!("HIGH".parse::<Severity>().unwrap(), Severity::High);
        assert_eq!("medium".parse::<Severity>().unwrap(), Severity::Medium);
        assert!("urgent".parse::<Severity>().is_err());
    }

    #[test]
    fn blocking_severities() {
        assert!(Severity::Critical.is_blocking());
        assert!(Severity::High.is_blocking());
        assert!(!Severity::Medium.is_blocking());
        assert!(!Severity::Low.is_blocking());
    }

    #[test]
    fn approval_status_roundtrip() {
        for s in [
            ApprovalStatus::Approved,
            ApprovalStatus::ApprovedWithConditions,
            ApprovalStatus::ChangesRequested,
            ApprovalStatus::Pending,
        ] {
            assert_eq!(s.as_str().parse::<ApprovalStatus>().unwrap(), s);
        }
    }

    #[test]
    fn resolution_defaults_to_open() {
        assert_eq!(IssueResolution::default(), IssueResolution::Open);
        assert_eq!("ignored".parse::<IssueResolution>().unwrap(), IssueResolution::Ignored);
    }
}
