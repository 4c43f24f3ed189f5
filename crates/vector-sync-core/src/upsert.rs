//! Fingerprint-keyed upsert and the shared ingestion pipeline.
//!
//! # Pipeline
//!
//! ```text
//! ContextInput ──▶ TermResolver ──▶ fingerprint() ──▶ UpsertResolver ──▶ SavedRecord
//!   labels           labels→terms     terms+text→hash   hash→create/update
//! ```
//!
//! Both entry points (single-item upsert and bulk import) go through
//! [`Ingestor::ingest`], so they always agree on what counts as a duplicate.
//!
//! The lookup-then-save sequence is not atomic. Two concurrent ingests of the
//! same content can both miss the lookup and both create a record.

use anyhow::Result;
use serde::Serialize;
use tracing::info;

use crate::fingerprint::fingerprint;
use crate::models::{ContextInput, ContextRecord, TermCategory, TermId};
use crate::store::{ContextRepository, TermStore};
use crate::terms::TermResolver;

/// Outcome of a single upsert.
#[derive(Debug, Clone, Serialize)]
pub struct UpsertOutcome {
    pub record: ContextRecord,
    pub revision_id: i64,
    /// `true` when no record with the fingerprint existed before.
    pub was_created: bool,
}

/// Counts reported by a bulk import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub created: usize,
    pub updated: usize,
}

/// Create-or-update keyed by fingerprint rather than by id.
pub struct UpsertResolver<'a, R: ContextRepository + ?Sized> {
    repo: &'a R,
}

impl<'a, R: ContextRepository + ?Sized> UpsertResolver<'a, R> {
    pub fn new(repo: &'a R) -> Self {
        Self { repo }
    }

    /// Store the given content under `fingerprint`.
    ///
    /// If any record already carries the fingerprint, the first one found is
    /// overwritten in place and saved as a new revision. Otherwise a new
    /// published record is created.
    pub async fn upsert(
        &self,
        fingerprint: &str,
        title: &str,
        description: &str,
        agent_ids: Vec<TermId>,
        tag_ids: Vec<TermId>,
    ) -> Result<UpsertOutcome> {
        let existing = self.repo.find_by_fingerprint(fingerprint).await?;

        let (record, was_created) = match existing.into_iter().next() {
            Some(mut record) => {
                record.title = title.to_string();
                record.description = description.to_string();
                record.agent_ids = agent_ids;
                record.tag_ids = tag_ids;
                record.fingerprint = fingerprint.to_string();
                (record, false)
            }
            None => (
                ContextRecord::new(title, description, agent_ids, tag_ids, fingerprint),
                true,
            ),
        };

        let saved = self.repo.save(record).await?;

        info!(
            id = %saved.record.id,
            fingerprint = %fingerprint,
            revision = saved.revision_id,
            created = was_created,
            "upserted context"
        );

        Ok(UpsertOutcome {
            record: saved.record,
            revision_id: saved.revision_id,
            was_created,
        })
    }
}

/// Runs the full resolve → fingerprint → upsert pipeline for raw items.
pub struct Ingestor<'a, T: TermStore + ?Sized, R: ContextRepository + ?Sized> {
    terms: TermResolver<'a, T>,
    upsert: UpsertResolver<'a, R>,
}

impl<'a, T: TermStore + ?Sized, R: ContextRepository + ?Sized> Ingestor<'a, T, R> {
    pub fn new(terms: &'a T, repo: &'a R) -> Self {
        Self {
            terms: TermResolver::new(terms),
            upsert: UpsertResolver::new(repo),
        }
    }

    /// Ingest a single item.
    ///
    /// Tags are resolved before agents, matching the order in which terms
    /// are first created.
    pub async fn ingest(&self, input: &ContextInput) -> Result<UpsertOutcome> {
        let tags = self.terms.resolve_terms(&input.tags, TermCategory::Tag).await?;
        let agents = self
            .terms
            .resolve_terms(&input.agents, TermCategory::Agent)
            .await?;

        let hash = fingerprint(&agents, &tags, &input.title, &input.description);

        self.upsert
            .upsert(
                &hash,
                &input.title,
                &input.description,
                agents.into_iter().map(|t| t.id).collect(),
                tags.into_iter().map(|t| t.id).collect(),
            )
            .await
    }

    /// Ingest items in order, counting creations and updates.
    ///
    /// Stops at the first storage error; items before it stay persisted.
    pub async fn ingest_all(&self, items: &[ContextInput]) -> Result<ImportSummary> {
        let mut summary = ImportSummary::default();
        for item in items {
            if self.ingest(item).await?.was_created {
                summary.created += 1;
            } else {
                summary.updated += 1;
            }
        }
        info!(
            created = summary.created,
            updated = summary.updated,
            "import complete"
        );
        Ok(summary)
    }
}
