use thiserror::Error;

#[derive(Error, Debug)]
pub enum AssistantError {
    /// Candidate SQL refused by the safety gate. Never executed.
    #[error("Statement not permitted: {0}")]
    Rejected(String),

    #[error("Execution error: {0}")]
    Execution(String),

    #[error("{operation} timed out after {seconds}s")]
    Timeout { operation: String, seconds: u64 },

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AssistantError {
    pub fn timeout(operation: impl Into<String>, seconds: u64) -> Self {
        AssistantError::Timeout {
            operation: operation.into(),
            seconds,
        }
    }

    /// Data-shaped failures the generic pipeline answers with free-form text
    /// instead of surfacing to the caller.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AssistantError::Rejected(_) | AssistantError::Execution(_) | AssistantError::Timeout { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, AssistantError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_taxonomy() {
        assert!(AssistantError::Rejected("DROP".into()).is_recoverable());
        assert!(AssistantError::Execution("column does not exist".into()).is_recoverable());
        assert!(AssistantError::timeout("statement", 30).is_recoverable());
        assert!(!AssistantError::Llm("connection refused".into()).is_recoverable());
        assert!(!AssistantError::Config("bad port".into()).is_recoverable());
    }

    #[test]
    fn test_timeout_message() {
        let err = AssistantError::timeout("SQL generation", 30);
        assert_eq!(err.to_string(), "SQL generation timed out after 30s");
    }
}
