use thiserror::Error;

/// Failures raised by the vector index. Dimension mismatches and I/O errors
/// are fatal to the calling operation and must reach the caller.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("embedding dimension mismatch: index expects {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("index I/O failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("persisted index is corrupt: {0}")]
    Corrupt(String),
}

/// Failure kinds of the chat collaborator. The transport layer returns these
/// as values; they become user-facing placeholder text only at the pipeline
/// and agent boundary via [`ChatError::user_message`].
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("LLM API key is not configured")]
    MissingApiKey,

    #[error("LLM request timed out")]
    Timeout,

    #[error("LLM network request failed: {0}")]
    Network(String),

    #[error("LLM API returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("LLM response body was malformed: {0}")]
    MalformedResponse(String),
}

impl ChatError {
    /// Render the descriptive placeholder the caller shows instead of an
    /// answer. The chat collaborator contract is that no failure kind ever
    /// surfaces as a crash or an HTTP 5xx on its own.
    pub fn user_message(&self) -> String {
        match self {
            ChatError::MissingApiKey => {
                "The language model is not configured (missing LLM_API_KEY); \
                 this is a placeholder reply."
                    .to_string()
            }
            ChatError::Timeout => {
                "The language model did not respond in time. Please try again later.".to_string()
            }
            ChatError::Network(detail) => {
                format!("Could not reach the language model service: {detail}")
            }
            ChatError::Status { status, body } => {
                let body: String = body.chars().take(200).collect();
                format!(
                    "The language model service returned status {status}. \
                     Check the API key and model name. Detail: {body}"
                )
            }
            ChatError::MalformedResponse(_) => {
                "The language model returned an unexpected response format.".to_string()
            }
        }
    }
}

/// Calculator tool failures: reported as an error-typed agent reply,
/// never a process-level failure.
#[derive(Debug, Error, PartialEq)]
pub enum CalcError {
    #[error("unexpected character '{0}' in expression")]
    UnexpectedChar(char),

    #[error("unexpected end of expression")]
    UnexpectedEnd,

    #[error("unexpected token at position {0}")]
    UnexpectedToken(usize),

    #[error("unknown function or constant '{0}'")]
    UnknownIdentifier(String),

    #[error("division by zero")]
    DivisionByZero,

    #[error("invalid number literal '{0}'")]
    BadNumber(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimension_mismatch_message_names_both_sizes() {
        let err = IndexError::DimensionMismatch {
            expected: 1536,
            actual: 3,
        };
        let msg = err.to_string();
        assert!(msg.contains("1536"));
        assert!(msg.contains("3"));
    }

    #[test]
    fn test_chat_error_user_messages_are_descriptive() {
        assert!(ChatError::MissingApiKey
            .user_message()
            .contains("LLM_API_KEY"));
        assert!(ChatError::Timeout.user_message().contains("did not respond"));
        let status = ChatError::Status {
            status: 401,
            body: "unauthorized".into(),
        };
        assert!(status.user_message().contains("401"));
    }

    #[test]
    fn test_status_user_message_truncates_long_bodies() {
        let status = ChatError::Status {
            status: 500,
            body: "x".repeat(5000),
        };
        assert!(status.user_message().len() < 600);
    }
}
