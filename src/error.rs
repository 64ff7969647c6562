//! Error types for relation maintenance
//!
//! Every failure surfaces to the caller of the original mutating operation;
//! nothing is swallowed and no retries happen at this layer.

use serde_json::Value;
use thiserror::Error;

/// Result type alias for relation operations
pub type RelationResult<T> = Result<T, RelationError>;

#[derive(Debug, Error)]
pub enum RelationError {
    /// Underlying query/update/delete failure, propagated verbatim
    #[error("storage error: {0}")]
    Storage(String),

    /// A `restrict`-policy delete would orphan a reference
    #[error(
        "could not delete document from collection `{owner}` because it is embedded \
         in related collection `{related}` in the field `{field}` of document with _id={identifier}"
    )]
    Restricted {
        owner: String,
        related: String,
        field: String,
        identifier: Value,
    },

    /// Cascade fan-out across identifiers partially applied: some updates
    /// committed before another one failed. The related collection may be
    /// left partially updated; no rollback is attempted.
    #[error(
        "cascade partially applied: {applied} of {total} identifier updates \
         succeeded before a failure: {message}"
    )]
    CascadePartial {
        applied: usize,
        total: usize,
        message: String,
    },
}

impl RelationError {
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    /// True when the related collection may have been left in a partially
    /// cascaded state.
    pub fn is_partial(&self) -> bool {
        matches!(self, Self::CascadePartial { .. })
    }
}
