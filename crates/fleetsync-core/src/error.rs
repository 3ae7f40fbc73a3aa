// ── Core error types ──
//
// Absence on a plain cache read is a normal `None`, never an error.
// These variants cover the cases where a caller asked for "must exist"
// semantics, handed in a malformed key or value, or read state before
// it was hydrated. Backing-store failures pass through untouched.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Lookup errors ────────────────────────────────────────────────
    #[error("Entity not found: {entity_type} with id {identifier}")]
    NotFound {
        entity_type: String,
        identifier: String,
    },

    // ── Input errors ─────────────────────────────────────────────────
    #[error("Invalid cache key: '{key}'")]
    InvalidKey { key: String },

    #[error("Validation failed for {field}: {reason}")]
    Validation { field: String, reason: String },

    // ── Lifecycle errors ─────────────────────────────────────────────
    #[error("{what} not loaded")]
    NotLoaded { what: String },

    // ── Backing store (passed through unchanged) ─────────────────────
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl CoreError {
    pub(crate) fn not_found(entity_type: &str, identifier: impl ToString) -> Self {
        Self::NotFound {
            entity_type: entity_type.into(),
            identifier: identifier.to_string(),
        }
    }

    pub(crate) fn validation(field: &str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Error surfaced by a backing-store implementation.
///
/// The core never retries or masks these; they reach the caller of the
/// store operation that needed the backing store.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Backing store unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Backing store rejected the write: {message}")]
    Conflict { message: String },

    #[error("Backing store document could not be decoded: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repository_errors_pass_through_transparently() {
        let inner = RepositoryError::Unavailable {
            reason: "connection refused".into(),
        };
        let expected = inner.to_string();
        let err = CoreError::from(inner);
        assert_eq!(err.to_string(), expected);
        assert!(matches!(
            err,
            CoreError::Repository(RepositoryError::Unavailable { .. })
        ));
    }

    #[test]
    fn not_found_names_entity_and_id() {
        let err = CoreError::not_found("floor", "f-1");
        assert_eq!(err.to_string(), "Entity not found: floor with id f-1");
    }
}
