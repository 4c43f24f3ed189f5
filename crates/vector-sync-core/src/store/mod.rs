//! Storage abstraction for Vector Sync.
//!
//! Two traits cover everything the core algorithms need from persistence:
//!
//! - [`TermStore`]: the category-scoped tag and agent vocabularies.
//! - [`ContextRepository`]: context records and their revision history.
//!
//! Components receive these as explicit parameters, so tests can run the
//! full pipeline against [`memory::InMemoryStore`] while the application
//! plugs in its SQLite implementation.
//!
//! Neither trait offers an atomic "create if absent": callers look up first
//! and then write, and two concurrent callers can both miss and both create.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

use crate::models::{ContextRecord, Term, TermCategory, TermId};

/// Result of persisting a [`ContextRecord`].
#[derive(Debug, Clone, Serialize)]
pub struct SavedRecord {
    /// The record as stored, with `created_at`, `changed_at` and
    /// `revision_id` filled in.
    pub record: ContextRecord,
    /// Identifier of the revision this save produced.
    pub revision_id: i64,
}

/// Immutable snapshot written on every save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Revision {
    pub revision_id: i64,
    pub context_id: String,
    pub title: String,
    pub description: String,
    pub fingerprint: String,
    pub created_at: i64,
}

/// Vocabulary storage used by the term resolver.
#[async_trait]
pub trait TermStore: Send + Sync {
    /// All terms in `category` whose stored label equals `label` exactly
    /// (case-sensitive), oldest first.
    async fn find_terms(&self, category: TermCategory, label: &str) -> Result<Vec<Term>>;

    /// Create a new term with a fresh id. Does not check for existing labels.
    async fn create_term(&self, category: TermCategory, label: &str) -> Result<Term>;

    /// Load terms by id, in the order of `ids`. Unknown ids are skipped.
    async fn load_terms(&self, ids: &[TermId]) -> Result<Vec<Term>>;
}

/// Context record storage.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`find_by_fingerprint`](ContextRepository::find_by_fingerprint) | Dedup lookup |
/// | [`save`](ContextRepository::save) | Insert or update, appending a revision |
/// | [`get`](ContextRepository::get) | Fetch by UUID |
/// | [`list_published`](ContextRepository::list_published) | Export candidates |
/// | [`revisions`](ContextRepository::revisions) | Revision history of one record |
#[async_trait]
pub trait ContextRepository: Send + Sync {
    /// Records whose stored fingerprint equals `fingerprint`, oldest first.
    async fn find_by_fingerprint(&self, fingerprint: &str) -> Result<Vec<ContextRecord>>;

    /// Persist `record` (insert when its id is new, otherwise overwrite) and
    /// append a revision snapshot.
    ///
    /// The store stamps `changed_at` with the current time, and `created_at`
    /// too when the record has never been saved.
    async fn save(&self, record: ContextRecord) -> Result<SavedRecord>;

    /// Fetch a record by UUID.
    async fn get(&self, id: &str) -> Result<Option<ContextRecord>>;

    /// Up to `limit` published records, most recently changed first. Ties on
    /// `changed_at` are broken by the newer revision.
    async fn list_published(&self, limit: usize) -> Result<Vec<ContextRecord>>;

    /// Revision history of a record, oldest first.
    async fn revisions(&self, id: &str) -> Result<Vec<Revision>>;
}
