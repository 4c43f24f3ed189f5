//! Context record retrieval and publication toggling.
//!
//! Used by `vsync get`, `vsync publish`/`unpublish`, and the
//! `GET /api/context/{id}` route.

use anyhow::{bail, Result};
use serde::Serialize;

use vector_sync_core::store::{ContextRepository, TermStore};

use crate::config::Config;
use crate::db;
use crate::sqlite_store::SqliteStore;

/// A record with its term labels resolved.
#[derive(Debug, Clone, Serialize)]
pub struct ContextResponse {
    pub id: String,
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub agents: Vec<String>,
    pub fingerprint: String,
    pub published: bool,
    pub created_at: String, // ISO8601
    pub changed_at: String, // ISO8601
    pub revision_id: i64,
    pub revisions: usize,
}

/// Fetch a record by UUID, or `None` if it does not exist.
pub async fn get_context(store: &SqliteStore, id: &str) -> Result<Option<ContextResponse>> {
    let record = match store.get(id).await? {
        Some(r) => r,
        None => return Ok(None),
    };

    let tags = store.load_terms(&record.tag_ids).await?;
    let agents = store.load_terms(&record.agent_ids).await?;
    let revisions = store.revisions(id).await?.len();

    Ok(Some(ContextResponse {
        id: record.id,
        title: record.title,
        description: record.description,
        tags: tags.into_iter().map(|t| t.label).collect(),
        agents: agents.into_iter().map(|t| t.label).collect(),
        fingerprint: record.fingerprint,
        published: record.published,
        created_at: format_ts_iso(record.created_at),
        changed_at: format_ts_iso(record.changed_at),
        revision_id: record.revision_id,
        revisions,
    }))
}

/// Set the published flag of a record, saving it as a new revision.
///
/// Only published records are eligible for export.
pub async fn set_published(store: &SqliteStore, id: &str, published: bool) -> Result<()> {
    let mut record = match store.get(id).await? {
        Some(r) => r,
        None => bail!("context not found: {}", id),
    };
    record.published = published;
    store.save(record).await?;
    Ok(())
}

/// CLI entry point for `vsync get <id>`.
pub async fn run_get(config: &Config, id: &str) -> Result<()> {
    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool.clone());
    let ctx = get_context(&store, id).await;
    pool.close().await;

    let ctx = match ctx? {
        Some(c) => c,
        None => bail!("context not found: {}", id),
    };

    println!("--- Context ---");
    println!("id:          {}", ctx.id);
    println!("title:       {}", ctx.title);
    println!("tags:        {}", ctx.tags.join(", "));
    println!("agents:      {}", ctx.agents.join(", "));
    println!("fingerprint: {}", ctx.fingerprint);
    println!("published:   {}", ctx.published);
    println!("created_at:  {}", ctx.created_at);
    println!("changed_at:  {}", ctx.changed_at);
    println!("revisions:   {}", ctx.revisions);
    println!();
    println!("--- Description ---");
    println!("{}", ctx.description);

    Ok(())
}

/// CLI entry point for `vsync publish` / `vsync unpublish`.
pub async fn run_set_published(config: &Config, id: &str, published: bool) -> Result<()> {
    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool.clone());
    let result = set_published(&store, id, published).await;
    pool.close().await;
    result?;

    println!(
        "{} {}",
        if published { "published" } else { "unpublished" },
        id
    );
    Ok(())
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
        .unwrap_or_else(|| ts.to_string())
}
