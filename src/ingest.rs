//! JSON ingestion entry points.
//!
//! Two payload shapes feed the same [`Ingestor`] pipeline:
//!
//! | Entry point | Payload | Validation |
//! |-------------|---------|------------|
//! | single upsert | `{ title, description, tags, agents }` | `title` and `description` must be present and not blank (`""`, `"0"`, `0`, `false`) |
//! | bulk import | `{ items: [{ title, text, tags, agents }] }` | only `items` must be an array; missing item fields become `""` / `[]` |
//!
//! Used by `vsync upsert`, `vsync import`, and the
//! `POST /api/context/{upsert,import}` routes.

use anyhow::{Context, Result};
use serde_json::Value;
use std::io::Read;
use std::path::Path;
use tracing::debug;

use vector_sync_core::models::ContextInput;
use vector_sync_core::upsert::{ImportSummary, Ingestor, UpsertOutcome};

use crate::config::Config;
use crate::db;
use crate::error::IngestError;
use crate::sqlite_store::SqliteStore;

/// Validate a single-item upsert payload.
///
/// `title` and `description` are rejected when missing or blank in the
/// loose sense: `""`, `"0"`, `0`, `false` and `null` all count as blank.
/// Non-blank numbers and booleans are taken as their text form (`5` becomes
/// `"5"`). `tags` and `agents` are optional; when present they must be
/// arrays of scalars.
pub fn parse_upsert_payload(value: &Value) -> Result<ContextInput, IngestError> {
    let obj = value.as_object().ok_or(IngestError::InvalidPayload)?;

    let title = required_text(obj.get("title"))?;
    let description = required_text(obj.get("description"))?;
    let tags = optional_labels(obj.get("tags"))?;
    let agents = optional_labels(obj.get("agents"))?;

    Ok(ContextInput {
        title,
        description,
        tags,
        agents,
    })
}

/// Text form of a JSON scalar; `None` for null, arrays and objects.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(match (n.as_i64(), n.as_u64(), n.as_f64()) {
            (Some(i), _, _) => i.to_string(),
            (_, Some(u), _) => u.to_string(),
            (_, _, Some(f)) => f.to_string(),
            _ => n.to_string(),
        }),
        Value::Bool(true) => Some("1".to_string()),
        Value::Bool(false) => Some(String::new()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty() || s == "0",
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}

fn required_text(value: Option<&Value>) -> Result<String, IngestError> {
    match value {
        Some(v) if !is_blank(v) => scalar_text(v).ok_or(IngestError::InvalidPayload),
        _ => Err(IngestError::InvalidPayload),
    }
}

fn optional_labels(value: Option<&Value>) -> Result<Vec<String>, IngestError> {
    match value {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| scalar_text(v).ok_or(IngestError::InvalidPayload))
            .collect(),
        Some(_) => Err(IngestError::InvalidPayload),
    }
}

/// Extract the items of a bulk import payload.
///
/// Only the top-level `items` array is validated. Within an item, scalar
/// `title`/`text` values and labels are taken as their text form; anything
/// else becomes an empty string (fields) or is dropped (labels), so
/// malformed items are imported rather than rejected.
pub fn parse_import_payload(value: &Value) -> Result<Vec<ContextInput>, IngestError> {
    let items = value
        .get("items")
        .and_then(Value::as_array)
        .ok_or(IngestError::InvalidStructure)?;

    Ok(items.iter().map(lenient_item).collect())
}

fn lenient_item(item: &Value) -> ContextInput {
    let text = |key: &str| item.get(key).and_then(scalar_text).unwrap_or_default();
    let labels = |key: &str| -> Vec<String> {
        item.get(key)
            .and_then(Value::as_array)
            .map(|arr| arr.iter().filter_map(scalar_text).collect())
            .unwrap_or_default()
    };

    ContextInput {
        title: text("title"),
        description: text("text"),
        tags: labels("tags"),
        agents: labels("agents"),
    }
}

/// Parse and ingest a single-item payload.
pub async fn upsert_payload(store: &SqliteStore, raw: &str) -> Result<UpsertOutcome> {
    let value: Value = serde_json::from_str(raw).map_err(|e| {
        debug!(error = %e, "upsert payload is not valid JSON");
        IngestError::InvalidPayload
    })?;
    let input = parse_upsert_payload(&value)?;
    Ingestor::new(store, store).ingest(&input).await
}

/// Parse and ingest a bulk payload.
pub async fn import_payload(store: &SqliteStore, raw: &str) -> Result<ImportSummary> {
    let value: Value = serde_json::from_str(raw).map_err(|e| {
        debug!(error = %e, "import payload is not valid JSON");
        IngestError::InvalidStructure
    })?;
    let items = parse_import_payload(&value)?;
    Ingestor::new(store, store).ingest_all(&items).await
}

/// Read a payload from a file, or from stdin when `path` is `-`.
fn read_payload(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read payload from stdin")?;
        Ok(buf)
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read payload file: {}", path.display()))
    }
}

/// CLI entry point for `vsync upsert <file>`.
pub async fn run_upsert(config: &Config, path: &Path) -> Result<()> {
    let raw = read_payload(path)?;
    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool.clone());

    let outcome = upsert_payload(&store, &raw).await;
    pool.close().await;
    let outcome = outcome?;

    println!("upsert");
    println!("  uuid: {}", outcome.record.id);
    println!(
        "  result: {}",
        if outcome.was_created { "created" } else { "updated" }
    );
    println!("  revision: {}", outcome.revision_id);
    println!("ok");
    Ok(())
}

/// CLI entry point for `vsync import <file>`.
pub async fn run_import(config: &Config, path: &Path) -> Result<()> {
    let raw = read_payload(path)?;
    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool.clone());

    let summary = import_payload(&store, &raw).await;
    pool.close().await;
    let summary = summary?;

    println!("import");
    println!("  created: {}", summary.created);
    println!("  updated: {}", summary.updated);
    println!("ok");
    Ok(())
}
