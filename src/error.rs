//! Error types for the replaykit library.
//!
//! ## Key Components
//!
//! - [`TableError`]: Status returned by fallible table, limiter, and builder
//!   operations. The variants mirror the status space of the RPC layer that
//!   fronts a table, so a server can translate them one-to-one.
//!
//! Lookup misses are not errors: `Table::get` returns an `Option` and batch
//! mutations skip missing keys silently. Violated internal invariants (a
//! distribution handing back a key the table does not hold) are programming
//! bugs and panic instead of surfacing here.

use thiserror::Error;

/// Status for table operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TableError {
    /// A configuration or call argument failed validation.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The operation was aborted because the table was closed.
    #[error("table '{0}' is closed")]
    Cancelled(String),

    /// The rate-limiter gate did not open before the caller's deadline.
    #[error("deadline exceeded while waiting on table '{0}'")]
    DeadlineExceeded(String),

    /// The requested range of samples is exhausted.
    ///
    /// Never produced by a table; reserved for client-side samplers that
    /// cap the total number of samples they will emit.
    #[error("sample budget exhausted: {0}")]
    OutOfRange(String),
}

impl TableError {
    /// Builds a [`TableError::InvalidArgument`] from any message.
    #[inline]
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Returns the error description.
    #[inline]
    pub fn message(&self) -> String {
        self.to_string()
    }

    /// Returns `true` for [`TableError::Cancelled`].
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }

    /// Returns `true` for [`TableError::DeadlineExceeded`].
    #[inline]
    pub fn is_deadline_exceeded(&self) -> bool {
        matches!(self, Self::DeadlineExceeded(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_table() {
        let err = TableError::Cancelled("replay".into());
        assert_eq!(err.to_string(), "table 'replay' is closed");
        assert!(err.is_cancelled());
        assert!(!err.is_deadline_exceeded());
    }

    #[test]
    fn invalid_argument_keeps_message() {
        let err = TableError::invalid_argument("max_size must be positive");
        assert!(err.message().contains("max_size"));
    }

    #[test]
    fn deadline_exceeded_predicate() {
        let err = TableError::DeadlineExceeded("replay".into());
        assert!(err.is_deadline_exceeded());
    }

    #[test]
    fn implements_std_error() {
        fn assert_error<T: std::error::Error>() {}
        assert_error::<TableError>();
    }
}
