//! # Vector Sync
//!
//! Keeps "context" items (title, description, tags, agent labels) in a local
//! SQLite store and pushes them in batches to an external vector-indexing
//! service.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────────────────────┐   ┌──────────┐
//! │ upsert/import│──▶│ terms → fingerprint → upsert │──▶│  SQLite  │
//! │  CLI + HTTP  │   │      (vector-sync-core)      │   │          │
//! └──────────────┘   └──────────────────────────────┘   └────┬─────┘
//!                                                            │
//!                              ┌─────────────────────────────┘
//!                              ▼
//!                     ┌────────────────┐   POST {endpoint}/runs/wait
//!                     │ batch exporter │──────────────────────────────▶
//!                     └────────────────┘
//! ```
//!
//! ## Data Flow
//!
//! 1. A payload arrives through `vsync upsert`/`vsync import` or the HTTP
//!    routes and is parsed by [`ingest`].
//! 2. Tag and agent labels are resolved to vocabulary terms, created on
//!    first sight.
//! 3. The content fingerprint (SHA-256 of a canonical form) is computed.
//! 4. A record with the same fingerprint is updated in place as a new
//!    revision; otherwise a new record is created.
//! 5. [`export`] later sends the most recently changed published records to
//!    the configured endpoint.
//!
//! ## Quick Start
//!
//! ```bash
//! vsync init                    # create database
//! vsync import items.json       # bulk import
//! vsync export --limit 50       # push a batch
//! vsync serve                   # start HTTP server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`db`] | SQLite connection pool with WAL mode |
//! | [`migrate`] | Database schema migrations (idempotent) |
//! | [`sqlite_store`] | SQLite implementation of the core storage traits |
//! | [`ingest`] | Upsert and bulk import payload handling |
//! | [`export`] | HTTP transport and export command |
//! | [`get`] | Record retrieval and publication toggling |
//! | [`server`] | HTTP API (Axum) with CORS |
//! | [`error`] | User-facing input errors |

pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod get;
pub mod ingest;
pub mod migrate;
pub mod server;
pub mod sqlite_store;

pub use vector_sync_core::{fingerprint, models, store, terms, upsert};
