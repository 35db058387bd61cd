//! Bounty lifecycle state machine.
//!
//! Transitions move forward only: open -> claimed -> submitted -> completed.
//! Anything else is a rejection, reported as a value rather than an error so
//! callers can distinguish "the rules said no" from "the store broke".
//!
//! The whole load-check-apply-persist sequence runs under the store's write
//! lock, so two concurrent claims on the same bounty cannot both win.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::Result;

use super::bounty::{
    Bounty, BountyStatus, ClaimInfo, HistoryEntry, SubmissionInfo, TransitionAction,
};
use super::store::BountyStore;

/// A requested lifecycle transition.
#[derive(Debug, Clone, Deserialize)]
pub struct TransitionInput {
    pub bounty_id: String,
    pub action: TransitionAction,
    pub agent_handle: String,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Why a transition was refused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransitionRejection {
    /// HTTP-shaped status: 404 for a missing bounty, 409 for a rule violation.
    pub status: u16,
    pub error: String,
}

/// Result of attempting a transition. Rejections are part of the domain,
/// not failures; only storage problems surface as `Err`.
#[derive(Debug, Clone, PartialEq)]
pub enum TransitionOutcome {
    Applied(Bounty),
    Rejected(TransitionRejection),
}

/// The forward-only transition table. `None` means the action is not legal
/// from the given status.
fn next_status(current: BountyStatus, action: TransitionAction) -> Option<BountyStatus> {
    match (current, action) {
        (BountyStatus::Open, TransitionAction::Claim) => Some(BountyStatus::Claimed),
        (BountyStatus::Claimed, TransitionAction::Submit) => Some(BountyStatus::Submitted),
        (BountyStatus::Submitted, TransitionAction::Complete) => Some(BountyStatus::Completed),
        _ => None,
    }
}

/// Attempt a lifecycle transition and persist the result.
///
/// Holds the store write lock across the full read-modify-write so the
/// current status check and the persisted update are one atomic step.
pub async fn transition_bounty(
    store: &BountyStore,
    input: TransitionInput,
) -> Result<TransitionOutcome> {
    let _guard = store.begin_write().await;

    let mut bounties = store.read_bounties_file().await;
    let Some(idx) = bounties.iter().position(|b| b.id == input.bounty_id) else {
        return Ok(TransitionOutcome::Rejected(TransitionRejection {
            status: 404,
            error: format!("Bounty not found: {}", input.bounty_id),
        }));
    };

    let current = bounties[idx].status;
    let Some(next) = next_status(current, input.action) else {
        return Ok(TransitionOutcome::Rejected(TransitionRejection {
            status: 409,
            error: format!(
                "Invalid transition: cannot {} when bounty is {}",
                input.action, current
            ),
        }));
    };

    let now = Utc::now();
    let bounty = &mut bounties[idx];
    bounty.status = next;

    match input.action {
        TransitionAction::Claim => {
            bounty.claim = Some(ClaimInfo {
                claimant: input.agent_handle.clone(),
                message: input
                    .notes
                    .clone()
                    .filter(|n| !n.trim().is_empty())
                    .unwrap_or_else(|| "Claimed".to_string()),
                claimed_at: now,
            });
        }
        TransitionAction::Submit => {
            bounty.submissions = bounty.submissions.saturating_add(1);
            bounty.latest_submission = Some(SubmissionInfo {
                agent_handle: input.agent_handle.clone(),
                notes: input
                    .notes
                    .clone()
                    .filter(|n| !n.trim().is_empty())
                    .unwrap_or_else(|| "Submission provided".to_string()),
                submitted_at: now,
            });
        }
        TransitionAction::Complete => {
            bounty.completed_at = Some(now);
            bounty.completed_by = Some(input.agent_handle.clone());
        }
    }

    bounty.history.push(HistoryEntry {
        action: input.action,
        agent_handle: input.agent_handle.clone(),
        at: now,
        notes: input.notes.clone(),
    });

    let updated = bounty.clone();
    store.write_bounties_file(&bounties).await?;

    info!(
        bounty_id = %updated.id,
        action = %input.action,
        from = %current,
        to = %updated.status,
        agent = %input.agent_handle,
        "Bounty transition applied"
    );

    Ok(TransitionOutcome::Applied(updated))
}

/// Claim a bounty for an agent. Convenience wrapper over
/// [`transition_bounty`]: `Some` is the updated bounty, `None` is any
/// rejection (missing bounty or already claimed look the same here).
pub async fn claim_bounty(
    store: &BountyStore,
    bounty_id: &str,
    claimant: &str,
    message: Option<String>,
) -> Result<Option<Bounty>> {
    let outcome = transition_bounty(
        store,
        TransitionInput {
            bounty_id: bounty_id.to_string(),
            action: TransitionAction::Claim,
            agent_handle: claimant.to_string(),
            notes: message,
        },
    )
    .await?;

    Ok(match outcome {
        TransitionOutcome::Applied(bounty) => Some(bounty),
        TransitionOutcome::Rejected(_) => None,
    })
}
