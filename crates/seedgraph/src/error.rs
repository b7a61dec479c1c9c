//! Error types for seedgraph

use thiserror::Error;

/// Result type alias for seedgraph operations
pub type SeedResult<T> = Result<T, SeedError>;

/// Error types for graph-to-statement compilation
#[derive(Debug, Error)]
pub enum SeedError {
    /// Bad or unsupported metadata; raised before any statement is emitted
    #[error("Model error: {0}")]
    Model(String),

    /// A pre-assigned identifier strategy found no key on the record
    #[error("Missing key on {entity} ({ident}): column '{column}' is unset")]
    MissingKey {
        entity: String,
        ident: String,
        column: String,
    },

    /// A non-nullable relation had no target record
    #[error("Required relation '{relation}' on {entity} ({ident}) is missing")]
    RequiredReferenceMissing {
        entity: String,
        relation: String,
        ident: String,
    },

    /// A record value does not fit the declared column type
    #[error("Cannot map value for {entity}.{column} ({ident}): expected {expected}, found {found}")]
    UnmappableValue {
        entity: String,
        column: String,
        ident: String,
        expected: String,
        found: String,
    },

    /// A non-nullable scalar column was left without a value
    #[error("Column {entity}.{column} ({ident}) is not nullable but has no value")]
    NullInRequiredColumn {
        entity: String,
        column: String,
        ident: String,
    },

    /// A cycle runs through a non-nullable relation and nothing can defer it
    #[error("Cycle through required relation '{relation}' on {entity} cannot be deferred")]
    CycleWithoutUpdatableColumn { entity: String, relation: String },

    /// I/O error surfaced from a statement sink
    #[error("Sink error: {0}")]
    Sink(#[from] std::io::Error),
}

impl SeedError {
    /// Create a model error
    pub fn model(message: impl Into<String>) -> Self {
        Self::Model(message.into())
    }

    /// Check if this is a model error
    pub fn is_model(&self) -> bool {
        matches!(self, Self::Model(_))
    }

    /// Check if this is the fatal cycle error
    pub fn is_cycle(&self) -> bool {
        matches!(self, Self::CycleWithoutUpdatableColumn { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_carries_record_context() {
        let err = SeedError::MissingKey {
            entity: "author".into(),
            ident: "author#3".into(),
            column: "id".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("author"));
        assert!(msg.contains("author#3"));
        assert!(msg.contains("'id'"));
    }

    #[test]
    fn cycle_error_is_cycle() {
        let err = SeedError::CycleWithoutUpdatableColumn {
            entity: "employee".into(),
            relation: "manager".into(),
        };
        assert!(err.is_cycle());
        assert!(!err.is_model());
    }
}
