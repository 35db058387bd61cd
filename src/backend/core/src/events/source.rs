//! Backends the event feed can read from.
//!
//! [`PgEventSource`] pushes ordering, cursor position, and limits down into
//! SQL. [`FileEventSource`] reads flat JSON files and applies the same
//! contract in memory, so the aggregator cannot tell the two apart.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::config::StorageConfig;
use crate::db::Database;
use crate::error::Result;

use super::{ArtifactRecord, CommentRecord, RatingRecord};

/// Position within a sub-source stream: the (ordering timestamp, record id)
/// of the last record already consumed.
pub type StreamPosition = (DateTime<Utc>, String);

/// Read access to the comment, rating, and artifact data behind the feed.
///
/// Both listing methods return records strictly after `after`, oldest
/// first, at most `limit` of them.
#[async_trait]
pub trait EventSource: Send + Sync {
    async fn list_comments(
        &self,
        after: Option<StreamPosition>,
        limit: u32,
        artifact_id: Option<&str>,
    ) -> Result<Vec<CommentRecord>>;

    async fn list_ratings(
        &self,
        after: Option<StreamPosition>,
        limit: u32,
        artifact_id: Option<&str>,
    ) -> Result<Vec<RatingRecord>>;

    /// Artifact author by artifact id; unknown ids are absent.
    async fn artifact_authors(&self, ids: &[String]) -> Result<HashMap<String, String>>;

    /// Comment author by comment id; unknown ids are absent.
    async fn comment_authors(&self, ids: &[String]) -> Result<HashMap<String, String>>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// PostgreSQL backend
// ═══════════════════════════════════════════════════════════════════════════════

/// Event source backed by the PostgreSQL pool.
#[derive(Clone)]
pub struct PgEventSource {
    db: Database,
}

impl PgEventSource {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl EventSource for PgEventSource {
    async fn list_comments(
        &self,
        after: Option<StreamPosition>,
        limit: u32,
        artifact_id: Option<&str>,
    ) -> Result<Vec<CommentRecord>> {
        self.db.list_comments_after(after, limit, artifact_id).await
    }

    async fn list_ratings(
        &self,
        after: Option<StreamPosition>,
        limit: u32,
        artifact_id: Option<&str>,
    ) -> Result<Vec<RatingRecord>> {
        self.db.list_ratings_after(after, limit, artifact_id).await
    }

    async fn artifact_authors(&self, ids: &[String]) -> Result<HashMap<String, String>> {
        self.db.artifact_authors(ids).await
    }

    async fn comment_authors(&self, ids: &[String]) -> Result<HashMap<String, String>> {
        self.db.comment_authors(ids).await
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Flat-file backend
// ═══════════════════════════════════════════════════════════════════════════════

/// Event source backed by flat JSON files (comments.json, ratings.json,
/// artifacts.json). Files are re-read per call; a missing or unreadable
/// file is an empty collection, never an error.
#[derive(Clone)]
pub struct FileEventSource {
    comments_path: PathBuf,
    ratings_path: PathBuf,
    artifacts_path: PathBuf,
}

impl FileEventSource {
    pub fn new(storage: &StorageConfig) -> Self {
        Self {
            comments_path: storage.comments_path(),
            ratings_path: storage.ratings_path(),
            artifacts_path: storage.artifacts_path(),
        }
    }

    async fn load<T: DeserializeOwned>(&self, path: &PathBuf) -> Vec<T> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(_) => return Vec::new(),
        };

        let values: Vec<serde_json::Value> = match serde_json::from_slice(&bytes) {
            Ok(values) => values,
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "Event file is not a JSON array, treating as empty"
                );
                return Vec::new();
            }
        };

        // Malformed entries are skipped, not fatal.
        values
            .into_iter()
            .filter_map(|v| serde_json::from_value(v).ok())
            .collect()
    }
}

/// Keyset filter and sort shared by both file listings.
fn page_after<T, K>(mut records: Vec<T>, after: Option<StreamPosition>, limit: u32, key: K) -> Vec<T>
where
    K: Fn(&T) -> StreamPosition,
{
    records.sort_by(|a, b| key(a).cmp(&key(b)));
    records
        .into_iter()
        .filter(|r| match &after {
            Some(pos) => key(r) > *pos,
            None => true,
        })
        .take(limit as usize)
        .collect()
}

#[async_trait]
impl EventSource for FileEventSource {
    async fn list_comments(
        &self,
        after: Option<StreamPosition>,
        limit: u32,
        artifact_id: Option<&str>,
    ) -> Result<Vec<CommentRecord>> {
        let mut comments: Vec<CommentRecord> = self.load(&self.comments_path).await;
        if let Some(artifact) = artifact_id {
            comments.retain(|c| c.artifact_id == artifact);
        }
        Ok(page_after(comments, after, limit, |c| {
            (c.created_at, c.id.clone())
        }))
    }

    async fn list_ratings(
        &self,
        after: Option<StreamPosition>,
        limit: u32,
        artifact_id: Option<&str>,
    ) -> Result<Vec<RatingRecord>> {
        let mut ratings: Vec<RatingRecord> = self.load(&self.ratings_path).await;
        if let Some(artifact) = artifact_id {
            ratings.retain(|r| r.artifact_id == artifact);
        }
        Ok(page_after(ratings, after, limit, |r| {
            (r.updated_at, r.id.clone())
        }))
    }

    async fn artifact_authors(&self, ids: &[String]) -> Result<HashMap<String, String>> {
        let artifacts: Vec<ArtifactRecord> = self.load(&self.artifacts_path).await;
        Ok(artifacts
            .into_iter()
            .filter(|a| ids.contains(&a.id))
            .map(|a| (a.id, a.author))
            .collect())
    }

    async fn comment_authors(&self, ids: &[String]) -> Result<HashMap<String, String>> {
        let comments: Vec<CommentRecord> = self.load(&self.comments_path).await;
        Ok(comments
            .into_iter()
            .filter(|c| ids.contains(&c.id))
            .map(|c| (c.id, c.author))
            .collect())
    }
}
