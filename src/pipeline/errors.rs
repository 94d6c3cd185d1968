use crate::utils::IsTransient;

// ============================================================================
// Pipeline Errors
// ============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProcessingError {
    #[error("{0}")]
    Transient(String),

    #[error("Invalid order: {0}")]
    Invalid(String),
}

impl IsTransient for ProcessingError {
    fn is_transient(&self) -> bool {
        matches!(self, ProcessingError::Transient(_))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DeadLetterError {
    #[error("Dead letter dispatcher is no longer running")]
    ChannelClosed,

    #[error("Failed to serialize dead letter record: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Failed to publish dead letter record: {0}")]
    Publish(String),
}

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("Failed to serialize order: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Kafka send error: {0}")]
    Kafka(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_transient_errors_are_retryable() {
        assert!(ProcessingError::Transient("flaky downstream".into()).is_transient());
        assert!(!ProcessingError::Invalid("negative price".into()).is_transient());
    }

    #[test]
    fn test_error_messages() {
        let err = ProcessingError::Transient("Temporary processing failure".into());
        assert_eq!(err.to_string(), "Temporary processing failure");

        let err = ProcessingError::Invalid("price must be non-negative".into());
        assert_eq!(err.to_string(), "Invalid order: price must be non-negative");
    }
}
