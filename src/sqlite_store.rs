//! SQLite-backed [`TermStore`] and [`ContextRepository`].
//!
//! Maps each storage operation onto the schema created by
//! [`crate::migrate`] (terms, contexts, context_terms, context_revisions).

use anyhow::Result;
use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use vector_sync_core::models::{ContextRecord, Term, TermCategory, TermId};
use vector_sync_core::store::{ContextRepository, Revision, SavedRecord, TermStore};

const CONTEXT_COLUMNS: &str =
    "id, title, description, fingerprint, published, created_at, changed_at, revision_id";

/// SQLite implementation of the storage traits.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Load a record's ordered term references as `(agent_ids, tag_ids)`.
    async fn load_refs(&self, context_id: &str) -> Result<(Vec<TermId>, Vec<TermId>)> {
        let rows = sqlx::query(
            "SELECT category, term_id FROM context_terms WHERE context_id = ? ORDER BY category, position",
        )
        .bind(context_id)
        .fetch_all(&self.pool)
        .await?;

        let mut agents = Vec::new();
        let mut tags = Vec::new();
        for row in &rows {
            let category: String = row.get("category");
            let id = TermId(row.get("term_id"));
            match category.parse::<TermCategory>()? {
                TermCategory::Agent => agents.push(id),
                TermCategory::Tag => tags.push(id),
            }
        }
        Ok((agents, tags))
    }

    async fn hydrate(&self, rows: Vec<SqliteRow>) -> Result<Vec<ContextRecord>> {
        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            let id: String = row.get("id");
            let (agent_ids, tag_ids) = self.load_refs(&id).await?;
            let published: i64 = row.get("published");
            records.push(ContextRecord {
                id,
                title: row.get("title"),
                description: row.get("description"),
                tag_ids,
                agent_ids,
                fingerprint: row.get("fingerprint"),
                published: published != 0,
                created_at: row.get("created_at"),
                changed_at: row.get("changed_at"),
                revision_id: row.get("revision_id"),
            });
        }
        Ok(records)
    }
}

fn row_to_term(row: &SqliteRow) -> Result<Term> {
    let category: String = row.get("category");
    Ok(Term {
        id: TermId(row.get("id")),
        category: category.parse()?,
        label: row.get("label"),
    })
}

#[async_trait]
impl TermStore for SqliteStore {
    async fn find_terms(&self, category: TermCategory, label: &str) -> Result<Vec<Term>> {
        // `=` uses SQLite's BINARY collation, so matching is case-sensitive.
        let rows = sqlx::query(
            "SELECT id, category, label FROM terms WHERE category = ? AND label = ? ORDER BY id",
        )
        .bind(category.as_str())
        .bind(label)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_term).collect()
    }

    async fn create_term(&self, category: TermCategory, label: &str) -> Result<Term> {
        let result = sqlx::query("INSERT INTO terms (category, label) VALUES (?, ?)")
            .bind(category.as_str())
            .bind(label)
            .execute(&self.pool)
            .await?;

        Ok(Term {
            id: TermId(result.last_insert_rowid()),
            category,
            label: label.to_string(),
        })
    }

    async fn load_terms(&self, ids: &[TermId]) -> Result<Vec<Term>> {
        let mut terms = Vec::with_capacity(ids.len());
        for id in ids {
            let row = sqlx::query("SELECT id, category, label FROM terms WHERE id = ?")
                .bind(id.0)
                .fetch_optional(&self.pool)
                .await?;
            if let Some(row) = row {
                terms.push(row_to_term(&row)?);
            }
        }
        Ok(terms)
    }
}

#[async_trait]
impl ContextRepository for SqliteStore {
    async fn find_by_fingerprint(&self, fingerprint: &str) -> Result<Vec<ContextRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM contexts WHERE fingerprint = ? ORDER BY created_at ASC, rowid ASC",
            CONTEXT_COLUMNS
        ))
        .bind(fingerprint)
        .fetch_all(&self.pool)
        .await?;

        self.hydrate(rows).await
    }

    async fn save(&self, mut record: ContextRecord) -> Result<SavedRecord> {
        let now = chrono::Utc::now().timestamp();
        if record.created_at == 0 {
            record.created_at = now;
        }
        record.changed_at = now;

        let mut tx = self.pool.begin().await?;

        let revision_id = sqlx::query(
            r#"
            INSERT INTO context_revisions (context_id, title, description, fingerprint, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.id)
        .bind(&record.title)
        .bind(&record.description)
        .bind(&record.fingerprint)
        .bind(now)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();
        record.revision_id = revision_id;

        sqlx::query(
            r#"
            INSERT INTO contexts (id, title, description, fingerprint, published,
                                  created_at, changed_at, revision_id)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                description = excluded.description,
                fingerprint = excluded.fingerprint,
                published = excluded.published,
                changed_at = excluded.changed_at,
                revision_id = excluded.revision_id
            "#,
        )
        .bind(&record.id)
        .bind(&record.title)
        .bind(&record.description)
        .bind(&record.fingerprint)
        .bind(record.published as i64)
        .bind(record.created_at)
        .bind(record.changed_at)
        .bind(record.revision_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM context_terms WHERE context_id = ?")
            .bind(&record.id)
            .execute(&mut *tx)
            .await?;

        let refs = record
            .agent_ids
            .iter()
            .enumerate()
            .map(|(i, id)| (TermCategory::Agent, i, id))
            .chain(
                record
                    .tag_ids
                    .iter()
                    .enumerate()
                    .map(|(i, id)| (TermCategory::Tag, i, id)),
            );
        for (category, position, term_id) in refs {
            sqlx::query(
                "INSERT INTO context_terms (context_id, category, position, term_id) VALUES (?, ?, ?, ?)",
            )
            .bind(&record.id)
            .bind(category.as_str())
            .bind(position as i64)
            .bind(term_id.0)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(SavedRecord {
            record,
            revision_id,
        })
    }

    async fn get(&self, id: &str) -> Result<Option<ContextRecord>> {
        let row = sqlx::query(&format!("SELECT {} FROM contexts WHERE id = ?", CONTEXT_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(self.hydrate(vec![row]).await?.into_iter().next()),
            None => Ok(None),
        }
    }

    async fn list_published(&self, limit: usize) -> Result<Vec<ContextRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM contexts WHERE published = 1 \
             ORDER BY changed_at DESC, revision_id DESC LIMIT ?",
            CONTEXT_COLUMNS
        ))
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        self.hydrate(rows).await
    }

    async fn revisions(&self, id: &str) -> Result<Vec<Revision>> {
        let rows = sqlx::query(
            r#"
            SELECT revision_id, context_id, title, description, fingerprint, created_at
            FROM context_revisions
            WHERE context_id = ?
            ORDER BY revision_id ASC
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| Revision {
                revision_id: row.get("revision_id"),
                context_id: row.get("context_id"),
                title: row.get("title"),
                description: row.get("description"),
                fingerprint: row.get("fingerprint"),
                created_at: row.get("created_at"),
            })
            .collect())
    }
}
