use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {body}")]
    Api { status: u16, body: String },

    #[error("Failed to parse provider output: {source}\n  output: {output}")]
    Parse {
        output: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Response did not match the requested schema: {0}")]
    Schema(String),

    #[error("Process error: {0}")]
    Process(String),

    #[error("API key not set: export {0}")]
    MissingApiKey(String),
}

impl LlmError {
    /// Whether a retry could plausibly succeed.
    ///
    /// Transport failures, rate limiting (429) and server errors (5xx) are
    /// transient; everything else is a bug in the request or the response.
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            LlmError::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}
