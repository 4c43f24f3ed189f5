//! Core data models shared by the ingestion and export pipelines.
//!
//! These types represent the vocabulary terms, context records, and raw
//! inbound items that flow through term resolution, fingerprinting, and
//! upsert.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier of a vocabulary [`Term`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TermId(pub i64);

impl fmt::Display for TermId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The vocabulary a term belongs to.
///
/// Labels are only compared within a single category, so a tag and an agent
/// may share the same label without colliding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TermCategory {
    Tag,
    Agent,
}

impl TermCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            TermCategory::Tag => "tag",
            TermCategory::Agent => "agent",
        }
    }
}

impl fmt::Display for TermCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TermCategory {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tag" => Ok(TermCategory::Tag),
            "agent" => Ok(TermCategory::Agent),
            other => anyhow::bail!("unknown term category: '{}'", other),
        }
    }
}

/// A category-scoped vocabulary entry.
///
/// The label is stored exactly as first seen. Terms are append-only: nothing
/// in this crate deletes or renames them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Term {
    pub id: TermId,
    pub category: TermCategory,
    pub label: String,
}

/// A stored context item.
///
/// `id` is the public UUID. Deduplication never looks at it: two records are
/// "the same content" when their `fingerprint` matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContextRecord {
    pub id: String,
    pub title: String,
    pub description: String,
    pub tag_ids: Vec<TermId>,
    pub agent_ids: Vec<TermId>,
    pub fingerprint: String,
    pub published: bool,
    /// Unix seconds of the first save.
    pub created_at: i64,
    /// Unix seconds of the latest save.
    pub changed_at: i64,
    /// Revision produced by the latest save; `0` until first persisted.
    pub revision_id: i64,
}

impl ContextRecord {
    /// Build an unsaved, published record with a fresh UUID.
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        agent_ids: Vec<TermId>,
        tag_ids: Vec<TermId>,
        fingerprint: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title: title.into(),
            description: description.into(),
            tag_ids,
            agent_ids,
            fingerprint: fingerprint.into(),
            published: true,
            created_at: 0,
            changed_at: 0,
            revision_id: 0,
        }
    }
}

/// One inbound item before term resolution.
///
/// Both entry points (single upsert and bulk import) reduce their payloads to
/// this shape; bulk items name the description `text`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextInput {
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub agents: Vec<String>,
}
