//! Batch export of published context records to the vector-indexing service.
//!
//! [`BatchExporter::export_batch`] selects the most recently changed
//! published records, projects them into [`ExportItem`]s, wraps them in an
//! [`ExportEnvelope`] and hands the envelope to a [`Transport`]. Delivery
//! errors are reported as [`ExportOutcome::Failed`]; they are never retried.
//!
//! # Wire format
//!
//! ```json
//! {
//!   "assistant_id": "vector_writer",
//!   "input": { "items": [ { "uuid": "...", "title": "...", "text": "...",
//!                           "tags": ["..."], "agents": ["..."], "changed": 1700000000 } ] },
//!   "metadata": { "source": "drupal", "content_type": "context",
//!                 "batch_id": "sync-2024-01-31-235959" },
//!   "on_completion": "delete"
//! }
//! ```

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::models::ContextRecord;
use crate::store::{ContextRepository, TermStore};

/// Assistant that consumes the exported batch on the remote side.
pub const ASSISTANT_ID: &str = "vector_writer";
/// Value of `metadata.source`.
pub const SOURCE: &str = "drupal";
/// Value of `metadata.content_type`.
pub const CONTENT_TYPE: &str = "context";
/// Value of `on_completion`.
pub const ON_COMPLETION: &str = "delete";

/// One exported record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportItem {
    pub uuid: String,
    pub title: String,
    pub text: String,
    pub tags: Vec<String>,
    pub agents: Vec<String>,
    /// Unix seconds of the record's latest change.
    pub changed: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportInput {
    pub items: Vec<ExportItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportMetadata {
    pub source: String,
    pub content_type: String,
    pub batch_id: String,
}

/// Request body delivered to the remote run endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportEnvelope {
    pub assistant_id: String,
    pub input: ExportInput,
    pub metadata: ExportMetadata,
    pub on_completion: String,
}

impl ExportEnvelope {
    /// Wrap `items` in an envelope stamped with a batch id for `now`.
    pub fn new(items: Vec<ExportItem>, now: DateTime<Utc>) -> Self {
        Self {
            assistant_id: ASSISTANT_ID.to_string(),
            input: ExportInput { items },
            metadata: ExportMetadata {
                source: SOURCE.to_string(),
                content_type: CONTENT_TYPE.to_string(),
                batch_id: batch_id(now),
            },
            on_completion: ON_COMPLETION.to_string(),
        }
    }
}

/// Format a batch id as `sync-YYYY-MM-DD-HHMMSS`.
///
/// `now` is taken in UTC, not the host's local time.
pub fn batch_id(now: DateTime<Utc>) -> String {
    format!("sync-{}", now.format("%Y-%m-%d-%H%M%S"))
}

/// Outbound delivery of an export envelope.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Deliver the envelope. Any error is treated as a failed delivery.
    async fn send(&self, envelope: &ExportEnvelope) -> Result<()>;
}

/// Result of one export run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExportOutcome {
    /// No published records were eligible; nothing was sent.
    Empty,
    /// The transport accepted the batch.
    Sent { count: usize, batch_id: String },
    /// The transport failed; `message` carries the underlying error.
    Failed { message: String },
}

/// Project a stored record into its wire shape, resolving term labels.
///
/// Labels follow the stored reference order. References to terms that no
/// longer exist are skipped.
pub async fn project_record<T: TermStore + ?Sized>(
    terms: &T,
    record: &ContextRecord,
) -> Result<ExportItem> {
    let tags = terms.load_terms(&record.tag_ids).await?;
    let agents = terms.load_terms(&record.agent_ids).await?;

    Ok(ExportItem {
        uuid: record.id.clone(),
        title: record.title.clone(),
        text: record.description.clone(),
        tags: tags.into_iter().map(|t| t.label).collect(),
        agents: agents.into_iter().map(|t| t.label).collect(),
        changed: record.changed_at,
    })
}

/// Selects, projects and delivers one batch of records.
pub struct BatchExporter<'a, T, R, X>
where
    T: TermStore + ?Sized,
    R: ContextRepository + ?Sized,
    X: Transport + ?Sized,
{
    terms: &'a T,
    repo: &'a R,
    transport: &'a X,
}

impl<'a, T, R, X> BatchExporter<'a, T, R, X>
where
    T: TermStore + ?Sized,
    R: ContextRepository + ?Sized,
    X: Transport + ?Sized,
{
    pub fn new(terms: &'a T, repo: &'a R, transport: &'a X) -> Self {
        Self {
            terms,
            repo,
            transport,
        }
    }

    /// Build the envelope for up to `limit` records, or `None` when no
    /// published record is eligible.
    pub async fn prepare(&self, limit: usize, now: DateTime<Utc>) -> Result<Option<ExportEnvelope>> {
        if limit == 0 {
            return Ok(None);
        }
        let records = self.repo.list_published(limit).await?;
        if records.is_empty() {
            return Ok(None);
        }

        let mut items = Vec::with_capacity(records.len());
        for record in &records {
            items.push(project_record(self.terms, record).await?);
        }
        Ok(Some(ExportEnvelope::new(items, now)))
    }

    /// Export one batch of at most `limit` records.
    ///
    /// Storage errors propagate; transport errors become
    /// [`ExportOutcome::Failed`].
    pub async fn export_batch(&self, limit: usize) -> Result<ExportOutcome> {
        let envelope = match self.prepare(limit, Utc::now()).await? {
            Some(envelope) => envelope,
            None => {
                info!(limit, "no published context records to export");
                return Ok(ExportOutcome::Empty);
            }
        };

        let count = envelope.input.items.len();
        let batch_id = envelope.metadata.batch_id.clone();

        match self.transport.send(&envelope).await {
            Ok(()) => {
                info!(count, batch_id = %batch_id, "export sent");
                Ok(ExportOutcome::Sent { count, batch_id })
            }
            Err(e) => {
                let message = format!("{:#}", e);
                warn!(batch_id = %batch_id, error = %message, "export failed");
                Ok(ExportOutcome::Failed { message })
            }
        }
    }
}
