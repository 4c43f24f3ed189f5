//! Export delivery to the remote vector-indexing service.
//!
//! [`HttpTransport`] posts an [`ExportEnvelope`] to
//! `{sync.endpoint_url}/runs/wait` with the configured `X-Api-Key`. Any
//! network error or non-2xx response counts as a failed delivery, and the
//! batch is not retried.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::time::Duration;

use vector_sync_core::export::{BatchExporter, ExportEnvelope, ExportOutcome, Transport};

use crate::config::{Config, SyncConfig};
use crate::db;
use crate::sqlite_store::SqliteStore;

/// [`Transport`] over HTTP using `reqwest`.
pub struct HttpTransport {
    client: reqwest::Client,
    url: String,
    api_key: String,
}

impl HttpTransport {
    pub fn new(config: &SyncConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            url: config.runs_url(),
            api_key: config.api_key.clone(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, envelope: &ExportEnvelope) -> Result<()> {
        let response = self
            .client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .header("X-Api-Key", &self.api_key)
            .json(envelope)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("{} returned {}: {}", self.url, status, body);
        }
        Ok(())
    }
}

/// Export one batch from `store` through `transport`.
///
/// `limit` defaults to `sync.batch_size`.
pub async fn export_batch(
    config: &Config,
    store: &SqliteStore,
    transport: &dyn Transport,
    limit: Option<usize>,
) -> Result<ExportOutcome> {
    let limit = limit.unwrap_or(config.sync.batch_size);
    BatchExporter::new(store, store, transport)
        .export_batch(limit)
        .await
}

/// CLI entry point for `vsync export`.
pub async fn run_export(config: &Config, limit: Option<usize>) -> Result<()> {
    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool.clone());
    let transport = HttpTransport::new(&config.sync)?;

    let outcome = export_batch(config, &store, &transport, limit).await;
    pool.close().await;

    match outcome? {
        ExportOutcome::Empty => {
            println!("No published context records found.");
        }
        ExportOutcome::Sent { count, batch_id } => {
            println!("export {}", batch_id);
            println!("  sent: {} context records", count);
            println!("ok");
        }
        ExportOutcome::Failed { message } => {
            eprintln!("Send failed: {}", message);
        }
    }
    Ok(())
}
