use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// The uploaded file could not be turned into rows.
    #[error("Parse error: {0}")]
    Parse(String),

    /// A required target field has no source column mapped to it.
    #[error("Mapping incomplete: required field '{0}' is not mapped")]
    MappingIncomplete(&'static str),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Internal error: {0}")]
    Internal(String),
}
