//! Bounty board: storage, normalization, and the lifecycle state machine.

pub mod bounty;
pub mod lifecycle;
pub mod seed;
pub mod store;

pub use bounty::{
    normalize_bounty, Bounty, BountyStatus, ClaimInfo, HistoryEntry, RawBounty, SubmissionInfo,
    TransitionAction,
};
pub use lifecycle::{
    claim_bounty, transition_bounty, TransitionInput, TransitionOutcome, TransitionRejection,
};
pub use seed::seed_bounties;
pub use store::{BountyStore, CreateBountyInput};
