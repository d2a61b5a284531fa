//! Error types for the store engine.
//!
//! Almost nothing in this crate is fallible: listener panics are isolated
//! and logged rather than surfaced, and transaction-body panics propagate
//! to the caller untouched. The only error a caller can receive is a
//! misuse error at hook-registration time.

use thiserror::Error;

/// Errors surfaced by store operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreError {
    /// A pre-mutation hook was attached to a read-only container.
    ///
    /// Derived containers have no external write path, so a hook that
    /// observes incoming writes can never fire on one. The registration
    /// is rejected synchronously instead of being silently ignored.
    #[error("cannot attach a pre-mutation hook to a read-only container")]
    ReadOnly,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_only_error_message() {
        let err = StoreError::ReadOnly;
        assert_eq!(
            err.to_string(),
            "cannot attach a pre-mutation hook to a read-only container"
        );
    }
}
