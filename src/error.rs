//! User-facing input errors.
//!
//! Everything else (storage, I/O) travels as `anyhow::Error`. These variants
//! are kept separate so the HTTP layer can answer them with a 400 instead of
//! a 500.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IngestError {
    /// Single-item payload is not an object, or lacks `title`/`description`.
    #[error("Invalid payload")]
    InvalidPayload,

    /// Bulk payload is not valid JSON or has no `items` array.
    #[error("Invalid JSON structure.")]
    InvalidStructure,
}
