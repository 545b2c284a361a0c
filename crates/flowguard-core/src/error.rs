use thiserror::Error;

#[derive(Debug, Error)]
pub enum FlowguardError {
    #[error("not initialized: run 'flowguard init'")]
    NotInitialized,

    #[error("epic not found: {0}")]
    EpicNotFound(String),

    #[error("epic already exists: {0}")]
    EpicExists(String),

    #[error("spec not found: {0}")]
    SpecNotFound(String),

    #[error("spec already exists: {0}")]
    SpecExists(String),

    #[error("verification not found: {0}")]
    VerificationNotFound(String),

    #[error("issue '{issue}' not found in verification '{verification}'")]
    IssueNotFound {
        verification: String,
        issue: String,
    },

    #[error("invalid slug '{0}': must be lowercase alphanumeric with hyphens")]
    InvalidSlug(String),

    #[error("invalid value for {field}: {value}")]
    InvalidValue { field: &'static str, value: String },

    #[error("no specifications to verify against for epic '{0}'")]
    NoSpecs(String),

    #[error(transparent)]
    Llm(#[from] flowguard_llm::LlmError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, FlowguardError>;
