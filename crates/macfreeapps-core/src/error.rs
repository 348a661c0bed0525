//! Error types for catalog operations.

use thiserror::Error;

/// Failure of a [`Catalog`](crate::catalog::Catalog) operation.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// One or more required fields are empty after trimming.
    #[error("missing required fields: {}", missing.join(", "))]
    Validation { missing: Vec<&'static str> },

    /// No record with this id exists.
    #[error("app not found: {0}")]
    NotFound(String),

    /// The backing store failed to persist the collection.
    #[error("storage failure: {0}")]
    Storage(#[source] anyhow::Error),
}

impl CatalogError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, CatalogError::NotFound(_))
    }
}

pub type CatalogResult<T> = std::result::Result<T, CatalogError>;
