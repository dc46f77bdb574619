//! Domain error types.

use rust_decimal::Decimal;
use thiserror::Error;

/// Top-level domain error type.
#[derive(Debug, Error)]
pub enum DomainError {
    /// An aggregate was not found.
    #[error("aggregate not found: {0}")]
    AggregateNotFound(String),

    /// An aggregate was expected to be new but already has history.
    #[error("aggregate already exists: {0}")]
    AggregateAlreadyExists(String),

    /// Optimistic concurrency conflict.
    #[error(
        "concurrency conflict on aggregate {aggregate_id}: expected version {expected}, found {actual}"
    )]
    ConcurrencyConflict {
        /// The aggregate that had the conflict.
        aggregate_id: String,
        /// The version the caller read before appending.
        expected: i64,
        /// The stored length of the log at append time.
        actual: i64,
    },

    /// A stored event carries a type tag this build cannot replay.
    #[error("unknown event type: {0}")]
    UnknownEventType(String),

    /// A monetary amount that must be positive was zero or negative.
    #[error("invalid amount: {0}")]
    InvalidAmount(Decimal),

    /// A validation error in domain logic.
    #[error("validation error: {0}")]
    Validation(String),

    /// An infrastructure/persistence error.
    #[error("infrastructure error: {0}")]
    Infrastructure(String),
}

impl DomainError {
    /// Returns `true` when re-reading state and retrying the same operation
    /// can succeed. Only concurrency conflicts qualify.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConcurrencyConflict { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_concurrency_conflict_is_retryable() {
        let err = DomainError::ConcurrencyConflict {
            aggregate_id: "acc-1".to_owned(),
            expected: 1,
            actual: 2,
        };

        assert!(err.is_retryable());
    }

    #[test]
    fn test_caller_and_data_errors_are_not_retryable() {
        let errors = [
            DomainError::AggregateNotFound("acc-1".to_owned()),
            DomainError::AggregateAlreadyExists("acc-1".to_owned()),
            DomainError::UnknownEventType("AccountClosed".to_owned()),
            DomainError::InvalidAmount(dec!(0)),
            DomainError::Validation("bad input".to_owned()),
            DomainError::Infrastructure("disk full".to_owned()),
        ];

        for err in errors {
            assert!(!err.is_retryable(), "{err} must not be retryable");
        }
    }

    #[test]
    fn test_concurrency_conflict_message_names_both_versions() {
        let err = DomainError::ConcurrencyConflict {
            aggregate_id: "acc-1".to_owned(),
            expected: 3,
            actual: 5,
        };

        assert_eq!(
            err.to_string(),
            "concurrency conflict on aggregate acc-1: expected version 3, found 5"
        );
    }

    #[test]
    fn test_invalid_amount_message_includes_amount() {
        let err = DomainError::InvalidAmount(dec!(-5));

        assert_eq!(err.to_string(), "invalid amount: -5");
    }
}
