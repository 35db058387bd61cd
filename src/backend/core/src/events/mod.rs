//! Agent event feed: records, sources, and the paginated aggregator.
//!
//! Events are derived, not stored. Comments and ratings live in their own
//! backends; the feed projects them into a single chronological stream of
//! "things that happened to an agent's work" and pages through it with an
//! opaque cursor.

pub mod feed;
pub mod source;

pub use feed::{EventFeed, EventFeedParams, FeedPage};
pub use source::{EventSource, FileEventSource, PgEventSource};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of feed event, in the dotted wire form clients switch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    /// A top-level comment on one of the agent's artifacts.
    #[serde(rename = "comment.created")]
    CommentCreated,
    /// A reply to one of the agent's comments.
    #[serde(rename = "comment.replied")]
    CommentReplied,
    /// A rating on one of the agent's artifacts. Creates and edits are not
    /// distinguished; the event carries the latest state.
    #[serde(rename = "rating.created_or_updated")]
    RatingCreatedOrUpdated,
}

/// A comment as stored, shared by both backends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentRecord {
    pub id: String,
    pub artifact_id: String,
    /// Present on replies, absent on top-level comments.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    pub author: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// A rating as stored. One row per (artifact, author); edits bump
/// `updated_at` in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingRecord {
    pub id: String,
    pub artifact_id: String,
    pub author: String,
    pub score: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The slice of an artifact the feed needs: who owns it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactRecord {
    pub id: String,
    pub author: String,
}

/// One item in an agent's event feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentEvent {
    /// Synthetic id, `comment:{id}` or `rating:{id}`.
    pub id: String,

    #[serde(rename = "type")]
    pub event_type: EventType,

    /// Ordering timestamp: the comment's `created_at`, or the rating's
    /// `updated_at` so edited ratings resurface.
    pub created_at: DateTime<Utc>,

    pub artifact_id: String,

    /// The agent this event is addressed to, exactly as stored.
    pub recipient_handle: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<CommentRecord>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<RatingRecord>,
}

impl AgentEvent {
    /// Build a feed event from a comment addressed to `recipient`.
    pub fn from_comment(comment: CommentRecord, recipient: String) -> Self {
        Self {
            id: format!("comment:{}", comment.id),
            event_type: if comment.parent_id.is_some() {
                EventType::CommentReplied
            } else {
                EventType::CommentCreated
            },
            created_at: comment.created_at,
            artifact_id: comment.artifact_id.clone(),
            recipient_handle: recipient,
            comment: Some(comment),
            rating: None,
        }
    }

    /// Build a feed event from a rating addressed to `recipient`.
    pub fn from_rating(rating: RatingRecord, recipient: String) -> Self {
        Self {
            id: format!("rating:{}", rating.id),
            event_type: EventType::RatingCreatedOrUpdated,
            created_at: rating.updated_at,
            artifact_id: rating.artifact_id.clone(),
            recipient_handle: recipient,
            comment: None,
            rating: Some(rating),
        }
    }

    /// Sort key for the merged stream.
    pub fn sort_key(&self) -> (DateTime<Utc>, &str) {
        (self.created_at, self.id.as_str())
    }
}

/// Compare two handles the way the feed does: the `@` prefix and letter
/// case are insignificant.
pub fn handles_match(a: &str, b: &str) -> bool {
    normalize_handle(a) == normalize_handle(b)
}

/// Canonical form of a handle for comparison. The stored form is what gets
/// emitted; this is only for matching.
pub fn normalize_handle(handle: &str) -> String {
    handle.trim().trim_start_matches('@').to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(secs: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, secs).unwrap()
    }

    #[test]
    fn test_event_type_wire_names() {
        assert_eq!(
            serde_json::to_string(&EventType::CommentCreated).unwrap(),
            "\"comment.created\""
        );
        assert_eq!(
            serde_json::to_string(&EventType::CommentReplied).unwrap(),
            "\"comment.replied\""
        );
        assert_eq!(
            serde_json::to_string(&EventType::RatingCreatedOrUpdated).unwrap(),
            "\"rating.created_or_updated\""
        );
    }

    #[test]
    fn test_comment_event_kind_depends_on_parent() {
        let top = CommentRecord {
            id: "1".to_string(),
            artifact_id: "a1".to_string(),
            parent_id: None,
            author: "@bob".to_string(),
            body: "nice".to_string(),
            created_at: ts(0),
        };
        let reply = CommentRecord {
            parent_id: Some("1".to_string()),
            id: "2".to_string(),
            ..top.clone()
        };

        let top_event = AgentEvent::from_comment(top, "@alice".to_string());
        assert_eq!(top_event.event_type, EventType::CommentCreated);
        assert_eq!(top_event.id, "comment:1");

        let reply_event = AgentEvent::from_comment(reply, "@bob".to_string());
        assert_eq!(reply_event.event_type, EventType::CommentReplied);
    }

    #[test]
    fn test_rating_event_orders_by_updated_at() {
        let rating = RatingRecord {
            id: "7".to_string(),
            artifact_id: "a1".to_string(),
            author: "@bob".to_string(),
            score: 4,
            review: None,
            created_at: ts(0),
            updated_at: ts(30),
        };
        let event = AgentEvent::from_rating(rating, "@alice".to_string());
        assert_eq!(event.id, "rating:7");
        assert_eq!(event.created_at, ts(30));
    }

    #[test]
    fn test_handle_matching() {
        assert!(handles_match("@Alice", "alice"));
        assert!(handles_match(" alice ", "@ALICE"));
        assert!(!handles_match("@alice", "@alicia"));
    }
}
