//! PostgreSQL access for the event feed.
//!
//! The database is optional: when no URL is configured the server never
//! constructs a [`Database`] and the feed runs off flat files. Queries use
//! keyset pagination on (timestamp, id) tuples so deep pages stay cheap.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::FromRow;
use tracing::info;

use crate::config::DatabaseConfig;
use crate::error::Result;
use crate::events::{CommentRecord, RatingRecord};

/// Lower bound used when no cursor position is given. The Unix epoch
/// predates every record and stays inside the Postgres timestamp range.
fn epoch() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH
}

#[derive(Debug, FromRow)]
struct CommentRow {
    id: String,
    artifact_id: String,
    parent_id: Option<String>,
    author: String,
    body: String,
    created_at: DateTime<Utc>,
}

impl From<CommentRow> for CommentRecord {
    fn from(row: CommentRow) -> Self {
        Self {
            id: row.id,
            artifact_id: row.artifact_id,
            parent_id: row.parent_id,
            author: row.author,
            body: row.body,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct RatingRow {
    id: String,
    artifact_id: String,
    author: String,
    score: i32,
    review: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<RatingRow> for RatingRecord {
    fn from(row: RatingRow) -> Self {
        Self {
            id: row.id,
            artifact_id: row.artifact_id,
            author: row.author,
            score: row.score,
            review: row.review,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct AuthorRow {
    id: String,
    author: String,
}

/// Connection pool wrapper with the feed's query surface.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Connect and build the pool from configuration.
    pub async fn connect(config: &DatabaseConfig, url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect(url)
            .await?;

        info!(
            max_connections = config.max_connections,
            "Connected to PostgreSQL"
        );

        Ok(Self { pool })
    }

    /// Wrap an existing pool (tests).
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Cheap liveness probe.
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Comments strictly after `after` in (created_at, id) order, oldest
    /// first, optionally restricted to one artifact.
    pub async fn list_comments_after(
        &self,
        after: Option<(DateTime<Utc>, String)>,
        limit: u32,
        artifact_id: Option<&str>,
    ) -> Result<Vec<CommentRecord>> {
        let (after_ts, after_id) = after.unwrap_or_else(|| (epoch(), String::new()));

        let rows = sqlx::query_as::<_, CommentRow>(
            r#"
            SELECT id, artifact_id, parent_id, author, body, created_at
            FROM comments
            WHERE (created_at, id) > ($1, $2)
              AND ($3::text IS NULL OR artifact_id = $3)
            ORDER BY created_at ASC, id ASC
            LIMIT $4
            "#,
        )
        .bind(after_ts)
        .bind(after_id)
        .bind(artifact_id)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(CommentRecord::from).collect())
    }

    /// Ratings strictly after `after` in (updated_at, id) order, oldest
    /// first. Edited ratings sort by their edit time.
    pub async fn list_ratings_after(
        &self,
        after: Option<(DateTime<Utc>, String)>,
        limit: u32,
        artifact_id: Option<&str>,
    ) -> Result<Vec<RatingRecord>> {
        let (after_ts, after_id) = after.unwrap_or_else(|| (epoch(), String::new()));

        let rows = sqlx::query_as::<_, RatingRow>(
            r#"
            SELECT id, artifact_id, author, score, review, created_at, updated_at
            FROM ratings
            WHERE (updated_at, id) > ($1, $2)
              AND ($3::text IS NULL OR artifact_id = $3)
            ORDER BY updated_at ASC, id ASC
            LIMIT $4
            "#,
        )
        .bind(after_ts)
        .bind(after_id)
        .bind(artifact_id)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(RatingRecord::from).collect())
    }

    /// Authors of the given artifacts, keyed by artifact id. Unknown ids
    /// are simply absent from the map.
    pub async fn artifact_authors(&self, ids: &[String]) -> Result<HashMap<String, String>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = sqlx::query_as::<_, AuthorRow>(
            "SELECT id, author FROM artifacts WHERE id = ANY($1)",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| (r.id, r.author)).collect())
    }

    /// Authors of the given comments, keyed by comment id.
    pub async fn comment_authors(&self, ids: &[String]) -> Result<HashMap<String, String>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = sqlx::query_as::<_, AuthorRow>(
            "SELECT id, author FROM comments WHERE id = ANY($1)",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| (r.id, r.author)).collect())
    }
}
