use thiserror::Error;
use tracing::warn;

use crate::config::ConfigError;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, GraphError>;

/// Errors raised by the mapping layer and the backing stores it drives.
#[derive(Debug, Error)]
pub enum GraphError {
    /// The caller used the mapping in a way it never supports.
    #[error("invalid usage: {0}")]
    Usage(String),
    /// A store mutation was attempted while no transaction was active.
    #[error("not in a transaction: {0}")]
    NotInTransaction(String),
    /// An explicitly requested record or type does not exist.
    #[error("{0} not found")]
    NotFound(&'static str),
    /// The backing store rejected an argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// A converter could not translate a value for a field.
    #[error("conversion failed for field {field}: {message}")]
    Conversion {
        /// Field whose value failed to convert.
        field: String,
        /// Converter-supplied reason.
        message: String,
    },
    /// Configuration or manifest could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl GraphError {
    pub(crate) fn usage(message: impl Into<String>) -> Self {
        GraphError::Usage(message.into())
    }

    pub(crate) fn not_in_transaction(operation: impl Into<String>) -> Self {
        let operation = operation.into();
        warn!(operation = %operation, "store mutation attempted outside a transaction");
        GraphError::NotInTransaction(operation)
    }

    /// Returns true when retrying inside a proper transaction can succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, GraphError::NotInTransaction(_))
    }

    /// Returns true for caller defects.
    pub fn is_usage(&self) -> bool {
        matches!(self, GraphError::Usage(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_resource_state_errors_are_retryable() {
        assert!(GraphError::NotInTransaction("create node".into()).is_retryable());
        assert!(!GraphError::usage("read-only").is_retryable());
        assert!(!GraphError::NotFound("node").is_retryable());
    }

    #[test]
    fn messages_name_the_failure() {
        let err = GraphError::Conversion {
            field: "Person.personality".into(),
            message: "unknown variant".into(),
        };
        assert_eq!(
            err.to_string(),
            "conversion failed for field Person.personality: unknown variant"
        );
        assert_eq!(GraphError::NotFound("node").to_string(), "node not found");
    }
}
