//! # Vector Sync Core
//!
//! Storage-agnostic logic for Vector Sync: data models, content
//! fingerprinting, term resolution, fingerprint-keyed upsert, and batch
//! export projection.
//!
//! This crate contains no tokio, sqlx, HTTP, or filesystem dependencies.
//! Persistence and delivery are reached only through the [`store`] traits
//! and [`export::Transport`].

pub mod export;
pub mod fingerprint;
pub mod models;
pub mod store;
pub mod terms;
pub mod upsert;
