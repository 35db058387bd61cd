//! The paginated agent event feed.
//!
//! Merges the comment and rating streams into one chronological feed for a
//! single recipient. Both streams are consumed in keyset windows; the merge
//! only emits events below the fetch frontier of every still-active stream,
//! so a page can never skip an event that a slower stream had not produced
//! yet.
//!
//! The primary (PostgreSQL) backend degrades per table: a missing comments
//! table sends only the comment stream to the flat files, ratings keep
//! coming from the database.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::EventFeedConfig;
use crate::error::{ErrorCode, Result};
use crate::pagination::{EventCursor, MIN_PAGE_SIZE};

use super::source::{EventSource, FileEventSource, StreamPosition};
use super::{handles_match, AgentEvent, CommentRecord, RatingRecord};

/// How many records each stream fetches per window, as a multiple of the
/// requested page size. Oversized because most records are addressed to
/// someone else and get filtered out.
const WINDOW_FACTOR: u32 = 3;

/// Query parameters for one feed page.
#[derive(Debug, Clone, Deserialize)]
pub struct EventFeedParams {
    pub agent_handle: String,
    #[serde(default)]
    pub cursor: Option<String>,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub artifact_id: Option<String>,
}

/// One page of an agent's feed.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedPage {
    pub items: Vec<AgentEvent>,
    /// Opaque token for the next page; absent on the last page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
    /// When this page was assembled.
    pub updated_at: DateTime<Utc>,
}

/// Progress through one sub-source stream.
struct StreamState {
    after: Option<StreamPosition>,
    exhausted: bool,
    /// Set once the primary backend reported a missing table.
    degraded: bool,
}

impl StreamState {
    fn starting_at(cursor: Option<&EventCursor>) -> Self {
        // (ts, "") re-admits every record sharing the cursor timestamp;
        // the event-level cursor check drops the already-seen ones.
        Self {
            after: cursor.map(|c| (c.created_at, String::new())),
            exhausted: false,
            degraded: false,
        }
    }

    fn advance<T>(&mut self, batch: &[T], window: u32, position: impl Fn(&T) -> StreamPosition) {
        if let Some(last) = batch.last() {
            self.after = Some(position(last));
        }
        if (batch.len() as u32) < window {
            self.exhausted = true;
        }
    }

    /// Ordering timestamp below which this stream is fully known.
    fn frontier(&self) -> Option<DateTime<Utc>> {
        if self.exhausted {
            None
        } else {
            Some(self.after.as_ref().map(|(ts, _)| *ts).unwrap_or(DateTime::<Utc>::MIN_UTC))
        }
    }
}

/// Aggregates comments and ratings into per-agent event pages.
pub struct EventFeed {
    primary: Option<Arc<dyn EventSource>>,
    fallback: Arc<FileEventSource>,
    config: EventFeedConfig,
}

impl EventFeed {
    pub fn new(
        primary: Option<Arc<dyn EventSource>>,
        fallback: FileEventSource,
        config: EventFeedConfig,
    ) -> Self {
        Self {
            primary,
            fallback: Arc::new(fallback),
            config,
        }
    }

    fn clamp_limit(&self, requested: Option<u32>) -> u32 {
        requested
            .unwrap_or(self.config.default_page_size)
            .clamp(MIN_PAGE_SIZE, self.config.max_page_size)
    }

    /// Assemble one page of the feed for `params.agent_handle`.
    ///
    /// A malformed or unknown-version cursor is treated as no cursor. Only
    /// backend failures surface as errors; an empty feed is a normal page.
    pub async fn list_agent_events(&self, params: EventFeedParams) -> Result<FeedPage> {
        crate::telemetry::metrics::record_feed_request(if self.primary.is_some() {
            "postgres"
        } else {
            "files"
        });

        let limit = self.clamp_limit(params.limit);
        let window = limit * WINDOW_FACTOR;
        let artifact = params.artifact_id.as_deref();

        let cursor = params.cursor.as_deref().and_then(|token| {
            let decoded = EventCursor::decode(token);
            if decoded.is_err() {
                debug!("Discarding malformed feed cursor");
            }
            decoded.ok()
        });

        let mut comments = StreamState::starting_at(cursor.as_ref());
        let mut ratings = StreamState::starting_at(cursor.as_ref());
        let mut candidates: Vec<AgentEvent> = Vec::new();

        loop {
            if !comments.exhausted {
                let batch = self
                    .fetch_comments(&mut comments, window, artifact)
                    .await?;
                comments.advance(&batch, window, |c| (c.created_at, c.id.clone()));
                let events = self.resolve_comment_events(batch).await?;
                candidates.extend(events);
            }

            if !ratings.exhausted {
                let batch = self.fetch_ratings(&mut ratings, window, artifact).await?;
                ratings.advance(&batch, window, |r| (r.updated_at, r.id.clone()));
                let events = self.resolve_rating_events(batch).await?;
                candidates.extend(events);
            }

            // Only events both streams have moved past are safe to emit.
            let frontier = [comments.frontier(), ratings.frontier()]
                .into_iter()
                .flatten()
                .min();

            let emittable = candidates
                .iter()
                .filter(|e| qualifies(e, &params.agent_handle, cursor.as_ref(), frontier))
                .count();

            if emittable > limit as usize || (comments.exhausted && ratings.exhausted) {
                break;
            }
        }

        let frontier = [comments.frontier(), ratings.frontier()]
            .into_iter()
            .flatten()
            .min();

        let mut emittable: Vec<AgentEvent> = candidates
            .into_iter()
            .filter(|e| qualifies(e, &params.agent_handle, cursor.as_ref(), frontier))
            .collect();
        emittable.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));

        let has_more = emittable.len() > limit as usize;
        emittable.truncate(limit as usize);

        let next_cursor = if has_more {
            emittable
                .last()
                .map(|last| EventCursor::after(last.created_at, last.id.clone()).encode())
                .transpose()?
        } else {
            None
        };

        Ok(FeedPage {
            items: emittable,
            next_cursor,
            updated_at: Utc::now(),
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Sub-source fetches with per-table degradation
    // ─────────────────────────────────────────────────────────────────────────

    async fn fetch_comments(
        &self,
        state: &mut StreamState,
        window: u32,
        artifact: Option<&str>,
    ) -> Result<Vec<CommentRecord>> {
        if !state.degraded {
            if let Some(primary) = &self.primary {
                match primary.list_comments(state.after.clone(), window, artifact).await {
                    Ok(batch) => return Ok(batch),
                    Err(e) if e.code() == ErrorCode::TableMissing => {
                        warn!("Comments table missing, degrading comment stream to flat files");
                        state.degraded = true;
                    }
                    Err(e) => return Err(e),
                }
            } else {
                state.degraded = true;
            }
        }
        self.fallback
            .list_comments(state.after.clone(), window, artifact)
            .await
    }

    async fn fetch_ratings(
        &self,
        state: &mut StreamState,
        window: u32,
        artifact: Option<&str>,
    ) -> Result<Vec<RatingRecord>> {
        if !state.degraded {
            if let Some(primary) = &self.primary {
                match primary.list_ratings(state.after.clone(), window, artifact).await {
                    Ok(batch) => return Ok(batch),
                    Err(e) if e.code() == ErrorCode::TableMissing => {
                        warn!("Ratings table missing, degrading rating stream to flat files");
                        state.degraded = true;
                    }
                    Err(e) => return Err(e),
                }
            } else {
                state.degraded = true;
            }
        }
        self.fallback
            .list_ratings(state.after.clone(), window, artifact)
            .await
    }

    async fn artifact_authors(
        &self,
        ids: &[String],
    ) -> Result<std::collections::HashMap<String, String>> {
        if let Some(primary) = &self.primary {
            match primary.artifact_authors(ids).await {
                Ok(map) => return Ok(map),
                Err(e) if e.code() == ErrorCode::TableMissing => {
                    warn!("Artifacts table missing, resolving authors from flat files");
                }
                Err(e) => return Err(e),
            }
        }
        self.fallback.artifact_authors(ids).await
    }

    async fn comment_authors(
        &self,
        ids: &[String],
    ) -> Result<std::collections::HashMap<String, String>> {
        if let Some(primary) = &self.primary {
            match primary.comment_authors(ids).await {
                Ok(map) => return Ok(map),
                Err(e) if e.code() == ErrorCode::TableMissing => {
                    warn!("Comments table missing, resolving authors from flat files");
                }
                Err(e) => return Err(e),
            }
        }
        self.fallback.comment_authors(ids).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Recipient resolution
    // ─────────────────────────────────────────────────────────────────────────

    /// Turn a comment batch into events. Top-level comments go to the
    /// artifact author, replies to the parent comment's author. Records
    /// whose recipient cannot be resolved are dropped.
    async fn resolve_comment_events(
        &self,
        batch: Vec<CommentRecord>,
    ) -> Result<Vec<AgentEvent>> {
        let artifact_ids: Vec<String> = batch
            .iter()
            .filter(|c| c.parent_id.is_none())
            .map(|c| c.artifact_id.clone())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let parent_ids: Vec<String> = batch
            .iter()
            .filter_map(|c| c.parent_id.clone())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();

        let artifact_authors = self.artifact_authors(&artifact_ids).await?;
        let comment_authors = self.comment_authors(&parent_ids).await?;

        Ok(batch
            .into_iter()
            .filter_map(|comment| {
                let recipient = match &comment.parent_id {
                    None => artifact_authors.get(&comment.artifact_id),
                    Some(parent) => comment_authors.get(parent),
                }?;
                Some(AgentEvent::from_comment(comment.clone(), recipient.clone()))
            })
            .collect())
    }

    /// Turn a rating batch into events addressed to the artifact author.
    async fn resolve_rating_events(&self, batch: Vec<RatingRecord>) -> Result<Vec<AgentEvent>> {
        let artifact_ids: Vec<String> = batch
            .iter()
            .map(|r| r.artifact_id.clone())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let artifact_authors = self.artifact_authors(&artifact_ids).await?;

        Ok(batch
            .into_iter()
            .filter_map(|rating| {
                let recipient = artifact_authors.get(&rating.artifact_id)?;
                Some(AgentEvent::from_rating(rating.clone(), recipient.clone()))
            })
            .collect())
    }
}

/// Whether an event belongs on the page being assembled.
fn qualifies(
    event: &AgentEvent,
    agent_handle: &str,
    cursor: Option<&EventCursor>,
    frontier: Option<DateTime<Utc>>,
) -> bool {
    if !handles_match(&event.recipient_handle, agent_handle) {
        return false;
    }
    if let Some(cursor) = cursor {
        if !cursor.precedes(event.created_at, &event.id) {
            return false;
        }
    }
    match frontier {
        Some(frontier) => event.created_at < frontier,
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageConfig;
    use crate::error::BoardError;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::collections::HashMap;
    use tempfile::tempdir;

    use crate::events::{ArtifactRecord, EventType};

    fn ts(secs: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 0, secs / 60, secs % 60).unwrap()
    }

    fn comment(id: &str, artifact: &str, parent: Option<&str>, author: &str, secs: u32) -> CommentRecord {
        CommentRecord {
            id: id.to_string(),
            artifact_id: artifact.to_string(),
            parent_id: parent.map(|p| p.to_string()),
            author: author.to_string(),
            body: format!("comment {}", id),
            created_at: ts(secs),
        }
    }

    fn rating(id: &str, artifact: &str, author: &str, created: u32, updated: u32) -> RatingRecord {
        RatingRecord {
            id: id.to_string(),
            artifact_id: artifact.to_string(),
            author: author.to_string(),
            score: 4,
            review: Some("solid".to_string()),
            created_at: ts(created),
            updated_at: ts(updated),
        }
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        feed: EventFeed,
    }

    async fn fixture(
        artifacts: &[ArtifactRecord],
        comments: &[CommentRecord],
        ratings: &[RatingRecord],
    ) -> Fixture {
        let dir = tempdir().unwrap();
        let storage = StorageConfig {
            data_dir: dir.path().to_path_buf(),
        };
        tokio::fs::write(
            storage.artifacts_path(),
            serde_json::to_vec(artifacts).unwrap(),
        )
        .await
        .unwrap();
        tokio::fs::write(
            storage.comments_path(),
            serde_json::to_vec(comments).unwrap(),
        )
        .await
        .unwrap();
        tokio::fs::write(storage.ratings_path(), serde_json::to_vec(ratings).unwrap())
            .await
            .unwrap();

        let feed = EventFeed::new(
            None,
            FileEventSource::new(&storage),
            EventFeedConfig::default(),
        );
        Fixture { _dir: dir, feed }
    }

    fn artifact(id: &str, author: &str) -> ArtifactRecord {
        ArtifactRecord {
            id: id.to_string(),
            author: author.to_string(),
        }
    }

    fn params(handle: &str) -> EventFeedParams {
        EventFeedParams {
            agent_handle: handle.to_string(),
            cursor: None,
            limit: None,
            artifact_id: None,
        }
    }

    #[tokio::test]
    async fn test_merged_feed_in_chronological_order() {
        let fx = fixture(
            &[artifact("a1", "@alice")],
            &[
                comment("c1", "a1", None, "@bob", 10),
                comment("c2", "a1", Some("c1"), "@alice", 20),
            ],
            &[rating("r1", "a1", "@carol", 5, 15)],
        )
        .await;

        let page = fx.feed.list_agent_events(params("@alice")).await.unwrap();
        // The reply goes to @bob (author of c1), not @alice
        assert_eq!(
            page.items.iter().map(|e| e.id.as_str()).collect::<Vec<_>>(),
            vec!["comment:c1", "rating:r1"]
        );
        assert_eq!(page.items[0].event_type, EventType::CommentCreated);
        assert_eq!(page.items[1].event_type, EventType::RatingCreatedOrUpdated);
        assert!(page.next_cursor.is_none());

        let bob_page = fx.feed.list_agent_events(params("@bob")).await.unwrap();
        assert_eq!(bob_page.items.len(), 1);
        assert_eq!(bob_page.items[0].id, "comment:c2");
        assert_eq!(bob_page.items[0].event_type, EventType::CommentReplied);
    }

    #[tokio::test]
    async fn test_recipient_matching_ignores_at_and_case() {
        let fx = fixture(
            &[artifact("a1", "Alice")],
            &[comment("c1", "a1", None, "@bob", 10)],
            &[],
        )
        .await;

        let page = fx.feed.list_agent_events(params("@ALICE")).await.unwrap();
        assert_eq!(page.items.len(), 1);
        // Emitted verbatim as stored
        assert_eq!(page.items[0].recipient_handle, "Alice");
    }

    #[tokio::test]
    async fn test_unresolvable_recipients_are_dropped() {
        let fx = fixture(
            &[artifact("a1", "@alice")],
            &[
                comment("c1", "ghost-artifact", None, "@bob", 10),
                comment("c2", "a1", Some("ghost-comment"), "@bob", 20),
                comment("c3", "a1", None, "@bob", 30),
            ],
            &[],
        )
        .await;

        let page = fx.feed.list_agent_events(params("@alice")).await.unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].id, "comment:c3");
    }

    #[tokio::test]
    async fn test_pagination_chains_without_gaps_or_duplicates() {
        let comments: Vec<CommentRecord> = (0..120)
            .map(|i| comment(&format!("c{:03}", i), "a1", None, "@bob", i))
            .collect();
        let fx = fixture(&[artifact("a1", "@alice")], &comments, &[]).await;

        let mut seen = Vec::new();
        let mut cursor = None;
        let mut pages = 0;
        loop {
            let page = fx
                .feed
                .list_agent_events(EventFeedParams {
                    cursor: cursor.clone(),
                    ..params("@alice")
                })
                .await
                .unwrap();
            pages += 1;
            seen.extend(page.items.iter().map(|e| e.id.clone()));
            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        assert_eq!(pages, 3);
        assert_eq!(seen.len(), 120);
        let unique: HashSet<_> = seen.iter().collect();
        assert_eq!(unique.len(), 120);
        // Chronological across page boundaries
        let mut sorted = seen.clone();
        sorted.sort();
        assert_eq!(seen, sorted);
    }

    #[tokio::test]
    async fn test_limit_is_clamped() {
        let comments: Vec<CommentRecord> = (0..10)
            .map(|i| comment(&format!("c{}", i), "a1", None, "@bob", i))
            .collect();
        let fx = fixture(&[artifact("a1", "@alice")], &comments, &[]).await;

        let page = fx
            .feed
            .list_agent_events(EventFeedParams {
                limit: Some(0),
                ..params("@alice")
            })
            .await
            .unwrap();
        assert_eq!(page.items.len(), 1);

        let page = fx
            .feed
            .list_agent_events(EventFeedParams {
                limit: Some(100_000),
                ..params("@alice")
            })
            .await
            .unwrap();
        assert_eq!(page.items.len(), 10);
    }

    #[tokio::test]
    async fn test_malformed_cursor_starts_from_beginning() {
        let fx = fixture(
            &[artifact("a1", "@alice")],
            &[comment("c1", "a1", None, "@bob", 10)],
            &[],
        )
        .await;

        let page = fx
            .feed
            .list_agent_events(EventFeedParams {
                cursor: Some("!!! not a cursor !!!".to_string()),
                ..params("@alice")
            })
            .await
            .unwrap();
        assert_eq!(page.items.len(), 1);
    }

    #[tokio::test]
    async fn test_artifact_filter_scopes_the_feed() {
        let fx = fixture(
            &[artifact("a1", "@alice"), artifact("a2", "@alice")],
            &[
                comment("c1", "a1", None, "@bob", 10),
                comment("c2", "a2", None, "@bob", 20),
            ],
            &[],
        )
        .await;

        let page = fx
            .feed
            .list_agent_events(EventFeedParams {
                artifact_id: Some("a2".to_string()),
                ..params("@alice")
            })
            .await
            .unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].id, "comment:c2");
    }

    #[tokio::test]
    async fn test_edited_rating_resurfaces_at_update_time() {
        let fx = fixture(
            &[artifact("a1", "@alice")],
            &[comment("c1", "a1", None, "@bob", 50)],
            &[rating("r1", "a1", "@carol", 10, 90)],
        )
        .await;

        let page = fx.feed.list_agent_events(params("@alice")).await.unwrap();
        assert_eq!(
            page.items.iter().map(|e| e.id.as_str()).collect::<Vec<_>>(),
            vec!["comment:c1", "rating:r1"]
        );
        assert_eq!(page.items[1].created_at, ts(90));
    }

    #[tokio::test]
    async fn test_empty_feed_is_a_normal_page() {
        let fx = fixture(&[], &[], &[]).await;
        let page = fx.feed.list_agent_events(params("@nobody")).await.unwrap();
        assert!(page.items.is_empty());
        assert!(page.next_cursor.is_none());
    }

    // A primary source whose tables are all missing, as after a fresh
    // deployment without migrations.
    struct MissingTables;

    #[async_trait]
    impl EventSource for MissingTables {
        async fn list_comments(
            &self,
            _after: Option<StreamPosition>,
            _limit: u32,
            _artifact_id: Option<&str>,
        ) -> Result<Vec<CommentRecord>> {
            Err(BoardError::new(ErrorCode::TableMissing, "relation does not exist"))
        }

        async fn list_ratings(
            &self,
            _after: Option<StreamPosition>,
            _limit: u32,
            _artifact_id: Option<&str>,
        ) -> Result<Vec<RatingRecord>> {
            Err(BoardError::new(ErrorCode::TableMissing, "relation does not exist"))
        }

        async fn artifact_authors(&self, _ids: &[String]) -> Result<HashMap<String, String>> {
            Err(BoardError::new(ErrorCode::TableMissing, "relation does not exist"))
        }

        async fn comment_authors(&self, _ids: &[String]) -> Result<HashMap<String, String>> {
            Err(BoardError::new(ErrorCode::TableMissing, "relation does not exist"))
        }
    }

    #[tokio::test]
    async fn test_missing_tables_degrade_to_flat_files() {
        let dir = tempdir().unwrap();
        let storage = StorageConfig {
            data_dir: dir.path().to_path_buf(),
        };
        tokio::fs::write(
            storage.artifacts_path(),
            serde_json::to_vec(&[artifact("a1", "@alice")]).unwrap(),
        )
        .await
        .unwrap();
        tokio::fs::write(
            storage.comments_path(),
            serde_json::to_vec(&[comment("c1", "a1", None, "@bob", 10)]).unwrap(),
        )
        .await
        .unwrap();

        let feed = EventFeed::new(
            Some(Arc::new(MissingTables)),
            FileEventSource::new(&storage),
            EventFeedConfig::default(),
        );

        let page = feed.list_agent_events(params("@alice")).await.unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].id, "comment:c1");
    }
}
