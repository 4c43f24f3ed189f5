//! In-memory [`TermStore`] and [`ContextRepository`] for tests.
//!
//! Uses `Vec`s behind `std::sync::RwLock`. Insertion order is preserved so
//! "oldest first" lookups are deterministic.

use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{ContextRecord, Term, TermCategory, TermId};

use super::{ContextRepository, Revision, SavedRecord, TermStore};

/// In-memory store implementing both storage traits.
pub struct InMemoryStore {
    terms: RwLock<Vec<Term>>,
    records: RwLock<Vec<ContextRecord>>,
    revisions: RwLock<Vec<Revision>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            terms: RwLock::new(Vec::new()),
            records: RwLock::new(Vec::new()),
            revisions: RwLock::new(Vec::new()),
        }
    }

    /// Number of stored context records.
    pub fn record_count(&self) -> usize {
        self.records.read().unwrap().len()
    }

    /// Number of terms stored in `category`.
    pub fn term_count(&self, category: TermCategory) -> usize {
        self.terms
            .read()
            .unwrap()
            .iter()
            .filter(|t| t.category == category)
            .count()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TermStore for InMemoryStore {
    async fn find_terms(&self, category: TermCategory, label: &str) -> Result<Vec<Term>> {
        let terms = self.terms.read().unwrap();
        Ok(terms
            .iter()
            .filter(|t| t.category == category && t.label == label)
            .cloned()
            .collect())
    }

    async fn create_term(&self, category: TermCategory, label: &str) -> Result<Term> {
        let mut terms = self.terms.write().unwrap();
        let term = Term {
            id: TermId(terms.len() as i64 + 1),
            category,
            label: label.to_string(),
        };
        terms.push(term.clone());
        Ok(term)
    }

    async fn load_terms(&self, ids: &[TermId]) -> Result<Vec<Term>> {
        let terms = self.terms.read().unwrap();
        Ok(ids
            .iter()
            .filter_map(|id| terms.iter().find(|t| t.id == *id).cloned())
            .collect())
    }
}

#[async_trait]
impl ContextRepository for InMemoryStore {
    async fn find_by_fingerprint(&self, fingerprint: &str) -> Result<Vec<ContextRecord>> {
        let records = self.records.read().unwrap();
        Ok(records
            .iter()
            .filter(|r| r.fingerprint == fingerprint)
            .cloned()
            .collect())
    }

    async fn save(&self, mut record: ContextRecord) -> Result<SavedRecord> {
        let now = chrono::Utc::now().timestamp();
        let mut revisions = self.revisions.write().unwrap();
        let mut records = self.records.write().unwrap();

        let revision_id = revisions.len() as i64 + 1;
        if record.created_at == 0 {
            record.created_at = now;
        }
        record.changed_at = now;
        record.revision_id = revision_id;

        revisions.push(Revision {
            revision_id,
            context_id: record.id.clone(),
            title: record.title.clone(),
            description: record.description.clone(),
            fingerprint: record.fingerprint.clone(),
            created_at: now,
        });

        match records.iter_mut().find(|r| r.id == record.id) {
            Some(existing) => *existing = record.clone(),
            None => records.push(record.clone()),
        }

        Ok(SavedRecord {
            record,
            revision_id,
        })
    }

    async fn get(&self, id: &str) -> Result<Option<ContextRecord>> {
        let records = self.records.read().unwrap();
        Ok(records.iter().find(|r| r.id == id).cloned())
    }

    async fn list_published(&self, limit: usize) -> Result<Vec<ContextRecord>> {
        let records = self.records.read().unwrap();
        let mut published: Vec<ContextRecord> =
            records.iter().filter(|r| r.published).cloned().collect();
        published.sort_by(|a, b| {
            b.changed_at
                .cmp(&a.changed_at)
                .then(b.revision_id.cmp(&a.revision_id))
        });
        published.truncate(limit);
        Ok(published)
    }

    async fn revisions(&self, id: &str) -> Result<Vec<Revision>> {
        let revisions = self.revisions.read().unwrap();
        Ok(revisions
            .iter()
            .filter(|r| r.context_id == id)
            .cloned()
            .collect())
    }
}
