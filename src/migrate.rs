//! Database schema migrations.
//!
//! All statements use `IF NOT EXISTS`, so `vsync init` can run repeatedly.
//! Neither `terms(category, label)` nor `contexts(fingerprint)` carries a
//! UNIQUE constraint: uniqueness comes from lookup-before-create only.

use anyhow::Result;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS terms (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            category TEXT NOT NULL,
            label TEXT NOT NULL
        )
        "#,
    )
    .execute(&pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS contexts (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            description TEXT NOT NULL,
            fingerprint TEXT NOT NULL,
            published INTEGER NOT NULL DEFAULT 1,
            created_at INTEGER NOT NULL,
            changed_at INTEGER NOT NULL,
            revision_id INTEGER NOT NULL
        )
        "#,
    )
    .execute(&pool)
    .await?;

    // Ordered term references; position keeps the import order of labels.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS context_terms (
            context_id TEXT NOT NULL,
            category TEXT NOT NULL,
            position INTEGER NOT NULL,
            term_id INTEGER NOT NULL,
            PRIMARY KEY (context_id, category, position),
            FOREIGN KEY (context_id) REFERENCES contexts(id),
            FOREIGN KEY (term_id) REFERENCES terms(id)
        )
        "#,
    )
    .execute(&pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS context_revisions (
            revision_id INTEGER PRIMARY KEY AUTOINCREMENT,
            context_id TEXT NOT NULL,
            title TEXT NOT NULL,
            description TEXT NOT NULL,
            fingerprint TEXT NOT NULL,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(&pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_terms_category_label ON terms(category, label)")
        .execute(&pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_contexts_fingerprint ON contexts(fingerprint)")
        .execute(&pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_contexts_published_changed ON contexts(published, changed_at DESC)",
    )
    .execute(&pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_context_revisions_context ON context_revisions(context_id)",
    )
    .execute(&pool)
    .await?;

    pool.close().await;
    Ok(())
}
