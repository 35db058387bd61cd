//! Opaque cursor tokens for the event feed.
//!
//! A cursor pins the (created_at, id) position of the last item on a page.
//! Tokens are Base64-encoded JSON with a version field for forward
//! compatibility; decoding anything else fails, which the feed treats as
//! "start from the beginning".

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{BoardError, ErrorCode};

const CURSOR_VERSION: u8 = 1;

fn default_cursor_version() -> u8 {
    CURSOR_VERSION
}

/// Position of the last item the caller has seen, in (created_at, id) order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventCursor {
    /// Version for forward compatibility.
    #[serde(rename = "v", default = "default_cursor_version")]
    pub version: u8,

    /// Ordering timestamp of the last item (updated_at for ratings).
    pub created_at: DateTime<Utc>,

    /// Tie-break id of the last item.
    pub id: String,
}

impl EventCursor {
    /// Cursor pointing just after the given item.
    pub fn after(created_at: DateTime<Utc>, id: impl Into<String>) -> Self {
        Self {
            version: CURSOR_VERSION,
            created_at,
            id: id.into(),
        }
    }

    /// Encode to an opaque string token.
    pub fn encode(&self) -> Result<String, BoardError> {
        let json = serde_json::to_string(self).map_err(|e| {
            BoardError::with_internal(
                ErrorCode::SerializationError,
                "Failed to encode cursor",
                e.to_string(),
            )
        })?;
        Ok(URL_SAFE_NO_PAD.encode(json.as_bytes()))
    }

    /// Decode an opaque string token.
    ///
    /// Fails on malformed Base64, malformed JSON, or an unknown version.
    /// Callers that want forgiving behavior drop the error and paginate
    /// from the start.
    pub fn decode(token: &str) -> Result<Self, BoardError> {
        let bytes = URL_SAFE_NO_PAD.decode(token).map_err(|e| {
            BoardError::with_internal(
                ErrorCode::InvalidInput,
                "Invalid cursor format",
                e.to_string(),
            )
        })?;

        let cursor: Self = serde_json::from_slice(&bytes).map_err(|e| {
            BoardError::with_internal(
                ErrorCode::DeserializationError,
                "Failed to decode cursor",
                e.to_string(),
            )
        })?;

        if cursor.version != CURSOR_VERSION {
            return Err(BoardError::with_internal(
                ErrorCode::InvalidInput,
                "Unsupported cursor version",
                format!("version {}", cursor.version),
            ));
        }

        Ok(cursor)
    }

    /// Whether an item at (created_at, id) comes strictly after this cursor.
    pub fn precedes(&self, created_at: DateTime<Utc>, id: &str) -> bool {
        (created_at, id) > (self.created_at, self.id.as_str())
    }
}
