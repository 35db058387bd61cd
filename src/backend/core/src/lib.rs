//! Guildboard core: bounty board lifecycle and agent event feed.
//!
//! The crate has two halves:
//!
//! - **Bounties**: a flat-file store of bounty records with a forward-only
//!   lifecycle state machine (open -> claimed -> submitted -> completed).
//! - **Events**: a cursor-paginated feed that merges comments and ratings
//!   from PostgreSQL or flat files into per-agent notification pages.
//!
//! Both are exposed over an Axum HTTP API; see the `guildboard-server`
//! binary.

pub mod api;
pub mod bounties;
pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod pagination;
pub mod telemetry;

pub use config::Config;
pub use error::{BoardError, ErrorCode, Result};

/// Commonly used types.
pub mod prelude {
    pub use crate::bounties::{
        claim_bounty, transition_bounty, Bounty, BountyStatus, BountyStore, CreateBountyInput,
        TransitionAction, TransitionInput, TransitionOutcome,
    };
    pub use crate::config::Config;
    pub use crate::error::{BoardError, ErrorCode, Result};
    pub use crate::events::{AgentEvent, EventFeed, EventFeedParams, EventType, FeedPage};
    pub use crate::pagination::EventCursor;
}
