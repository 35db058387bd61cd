//! Bounty definitions and normalization.
//!
//! Persisted bounty records are untrusted: the flat file may have been edited
//! by hand, written by an older version, or truncated. [`RawBounty`] is the
//! loose on-disk shape; [`Bounty`] is the strict internal shape. The only way
//! from one to the other is [`normalize_bounty`], so every component past the
//! storage boundary may assume a well-formed record.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Status of a bounty in its lifecycle. Forward-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BountyStatus {
    /// Posted and unclaimed
    Open,
    /// An agent has claimed the work
    Claimed,
    /// Work has been submitted for review
    Submitted,
    /// The requester accepted a submission
    Completed,
}

impl BountyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Claimed => "claimed",
            Self::Submitted => "submitted",
            Self::Completed => "completed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

impl std::fmt::Display for BountyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An action that moves a bounty through its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransitionAction {
    Claim,
    Submit,
    Complete,
}

impl TransitionAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Claim => "claim",
            Self::Submit => "submit",
            Self::Complete => "complete",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "claim" => Some(Self::Claim),
            "submit" => Some(Self::Submit),
            "complete" => Some(Self::Complete),
            _ => None,
        }
    }
}

impl std::fmt::Display for TransitionAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry in a bounty's append-only transition log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub action: TransitionAction,
    pub agent_handle: String,
    pub at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Snapshot of the claim that moved a bounty to `claimed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimInfo {
    pub claimant: String,
    pub message: String,
    pub claimed_at: DateTime<Utc>,
}

/// Snapshot of the most recent submission. Overwritten on every submit;
/// the full record remains in `history`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionInfo {
    pub agent_handle: String,
    pub notes: String,
    pub submitted_at: DateTime<Utc>,
}

/// A bounty on the board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bounty {
    /// Stable identifier, generated once at creation
    pub id: String,

    pub title: String,
    pub description: String,

    /// Deduplicated, display order preserved
    pub tags: Vec<String>,

    /// Ordered conditions the work product must satisfy
    pub acceptance_criteria: Vec<String>,

    /// Non-negative
    pub budget: f64,

    /// ISO-like currency code, defaults to USD
    pub currency: String,

    pub status: BountyStatus,

    /// Incremented only by successful submit transitions
    pub submissions: u32,

    pub requester: String,

    pub created_at: DateTime<Utc>,

    /// ISO date (YYYY-MM-DD)
    pub deadline: String,

    /// Present only after a claim
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claim: Option<ClaimInfo>,

    /// Present only after at least one submission
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_submission: Option<SubmissionInfo>,

    /// Present only once completed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_by: Option<String>,

    /// Append-only transition log. Sufficient to replay `status`, `claim`,
    /// `latest_submission` and `completed_at`/`completed_by`.
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
}

/// The untrusted on-disk shape of a bounty. Every field is a loose JSON
/// value; missing fields default to null. Only [`normalize_bounty`] turns
/// this into a [`Bounty`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawBounty {
    pub id: Value,
    pub title: Value,
    pub description: Value,
    pub tags: Value,
    pub acceptance_criteria: Value,
    pub budget: Value,
    pub currency: Value,
    pub status: Value,
    pub submissions: Value,
    pub requester: Value,
    pub created_at: Value,
    pub deadline: Value,
    pub claim: Value,
    pub latest_submission: Value,
    pub completed_at: Value,
    pub completed_by: Value,
    pub history: Value,
}

// ═══════════════════════════════════════════════════════════════════════════════
// Normalization
// ═══════════════════════════════════════════════════════════════════════════════

/// Coerce an untrusted persisted record into the strict `Bounty` shape.
///
/// Strings are trimmed, numbers parsed or defaulted to 0, unknown statuses
/// collapse to `open`, list fields are filtered to non-empty strings, and
/// timestamps are coerced to valid ISO or "now". Idempotent:
/// `normalize(normalize(x)) == normalize(x)`.
pub fn normalize_bounty(raw: &RawBounty) -> Bounty {
    let now = Utc::now();

    Bounty {
        id: coerce_string(&raw.id),
        title: coerce_string(&raw.title),
        description: coerce_string(&raw.description),
        tags: dedup_first_occurrence(coerce_string_list(&raw.tags)),
        acceptance_criteria: coerce_string_list(&raw.acceptance_criteria),
        budget: coerce_budget(&raw.budget),
        currency: coerce_string_or(&raw.currency, "USD"),
        status: coerce_status(&raw.status),
        submissions: coerce_count(&raw.submissions),
        requester: coerce_string(&raw.requester),
        created_at: coerce_datetime(&raw.created_at, now),
        deadline: coerce_date(&raw.deadline, now),
        claim: coerce_claim(&raw.claim, now),
        latest_submission: coerce_submission(&raw.latest_submission, now),
        completed_at: opt_datetime(&raw.completed_at),
        completed_by: opt_string(&raw.completed_by),
        history: coerce_history(&raw.history, now),
    }
}

fn coerce_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    }
}

fn coerce_string_or(v: &Value, fallback: &str) -> String {
    let s = coerce_string(v);
    if s.is_empty() {
        fallback.to_string()
    } else {
        s
    }
}

fn opt_string(v: &Value) -> Option<String> {
    let s = coerce_string(v);
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

fn coerce_budget(v: &Value) -> f64 {
    let n = match v {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    };
    if n.is_finite() && n > 0.0 {
        n
    } else {
        0.0
    }
}

fn coerce_count(v: &Value) -> u32 {
    match v {
        Value::Number(n) => n.as_u64().unwrap_or(0).min(u32::MAX as u64) as u32,
        Value::String(s) => s.trim().parse::<u32>().unwrap_or(0),
        _ => 0,
    }
}

fn coerce_status(v: &Value) -> BountyStatus {
    match v.as_str().map(|s| s.trim().to_lowercase()).as_deref() {
        Some("claimed") => BountyStatus::Claimed,
        Some("submitted") => BountyStatus::Submitted,
        Some("completed") => BountyStatus::Completed,
        _ => BountyStatus::Open,
    }
}

fn coerce_string_list(v: &Value) -> Vec<String> {
    match v {
        Value::Array(items) => items
            .iter()
            .filter_map(|item| opt_string(item))
            .collect(),
        _ => Vec::new(),
    }
}

/// Drop repeated entries, keeping each string's first occurrence. Tags are a
/// set; their display order is whatever the author wrote first.
pub(super) fn dedup_first_occurrence(items: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    items.into_iter().filter(|s| seen.insert(s.clone())).collect()
}

fn coerce_datetime(v: &Value, fallback: DateTime<Utc>) -> DateTime<Utc> {
    opt_datetime(v).unwrap_or(fallback)
}

fn opt_datetime(v: &Value) -> Option<DateTime<Utc>> {
    let s = v.as_str()?.trim();
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn coerce_date(v: &Value, fallback: DateTime<Utc>) -> String {
    if let Some(s) = v.as_str() {
        let s = s.trim();
        if NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok() {
            return s.to_string();
        }
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return dt.date_naive().format("%Y-%m-%d").to_string();
        }
    }
    fallback.date_naive().format("%Y-%m-%d").to_string()
}

fn coerce_claim(v: &Value, now: DateTime<Utc>) -> Option<ClaimInfo> {
    let obj = v.as_object()?;
    let claimant = opt_string(obj.get("claimant").unwrap_or(&Value::Null))?;
    Some(ClaimInfo {
        claimant,
        message: coerce_string_or(obj.get("message").unwrap_or(&Value::Null), "Claimed"),
        claimed_at: coerce_datetime(obj.get("claimedAt").unwrap_or(&Value::Null), now),
    })
}

fn coerce_submission(v: &Value, now: DateTime<Utc>) -> Option<SubmissionInfo> {
    let obj = v.as_object()?;
    let agent_handle = opt_string(obj.get("agentHandle").unwrap_or(&Value::Null))?;
    Some(SubmissionInfo {
        agent_handle,
        notes: coerce_string_or(
            obj.get("notes").unwrap_or(&Value::Null),
            "Submission provided",
        ),
        submitted_at: coerce_datetime(obj.get("submittedAt").unwrap_or(&Value::Null), now),
    })
}

fn coerce_history(v: &Value, now: DateTime<Utc>) -> Vec<HistoryEntry> {
    let Value::Array(items) = v else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| {
            let obj = item.as_object()?;
            let action = TransitionAction::parse(obj.get("action")?.as_str()?)?;
            let agent_handle = opt_string(obj.get("agentHandle").unwrap_or(&Value::Null))?;
            Some(HistoryEntry {
                action,
                agent_handle,
                at: coerce_datetime(obj.get("at").unwrap_or(&Value::Null), now),
                notes: obj.get("notes").and_then(opt_string_ref),
            })
        })
        .collect()
}

fn opt_string_ref(v: &Value) -> Option<String> {
    opt_string(v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw_from(value: serde_json::Value) -> RawBounty {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_normalize_full_record() {
        let raw = raw_from(json!({
            "id": "  bounty-1 ",
            "title": " Build a scraper ",
            "description": "Scrape the docs",
            "tags": ["rust", "", "  web  "],
            "acceptanceCriteria": ["compiles", "has tests"],
            "budget": "250.5",
            "currency": "",
            "status": "CLAIMED",
            "submissions": 2,
            "requester": "@mallory",
            "createdAt": "2024-06-01T12:00:00Z",
            "deadline": "2024-07-01",
            "history": [
                {"action": "claim", "agentHandle": "@alice", "at": "2024-06-02T00:00:00Z"},
                {"action": "teleport", "agentHandle": "@alice", "at": "2024-06-02T00:00:00Z"}
            ]
        }));

        let bounty = normalize_bounty(&raw);
        assert_eq!(bounty.id, "bounty-1");
        assert_eq!(bounty.title, "Build a scraper");
        assert_eq!(bounty.tags, vec!["rust", "web"]);
        assert_eq!(bounty.budget, 250.5);
        assert_eq!(bounty.currency, "USD");
        assert_eq!(bounty.status, BountyStatus::Claimed);
        assert_eq!(bounty.submissions, 2);
        assert_eq!(bounty.deadline, "2024-07-01");
        // The unknown "teleport" action is dropped
        assert_eq!(bounty.history.len(), 1);
        assert_eq!(bounty.history[0].action, TransitionAction::Claim);
    }

    #[test]
    fn test_normalize_empty_record() {
        let bounty = normalize_bounty(&RawBounty::default());
        assert_eq!(bounty.status, BountyStatus::Open);
        assert_eq!(bounty.budget, 0.0);
        assert_eq!(bounty.currency, "USD");
        assert_eq!(bounty.submissions, 0);
        assert!(bounty.claim.is_none());
        assert!(bounty.latest_submission.is_none());
        assert!(bounty.history.is_empty());
        // Dates default to "now" rather than surfacing missing values
        assert!(!bounty.deadline.is_empty());
    }

    #[test]
    fn test_normalize_deduplicates_tags() {
        let raw = raw_from(json!({"tags": ["rust", "web", "rust", "Rust"]}));
        // Exact-match dedup on first occurrence; "Rust" is a distinct tag
        assert_eq!(normalize_bounty(&raw).tags, vec!["rust", "web", "Rust"]);
    }

    #[test]
    fn test_normalize_rejects_negative_budget() {
        let raw = raw_from(json!({"budget": -42.0}));
        assert_eq!(normalize_bounty(&raw).budget, 0.0);
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let raw = raw_from(json!({
            "id": " b1 ",
            "title": "x",
            "budget": "10",
            "status": "weird",
            "tags": ["a", ""],
            "deadline": "2024-01-02T10:00:00Z",
            "claim": {"claimant": "@a", "claimedAt": "2024-01-01T00:00:00Z"}
        }));

        let once = normalize_bounty(&raw);
        let round_tripped: RawBounty =
            serde_json::from_value(serde_json::to_value(&once).unwrap()).unwrap();
        let twice = normalize_bounty(&round_tripped);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_claim_without_claimant_is_dropped() {
        let raw = raw_from(json!({"claim": {"message": "hi"}}));
        assert!(normalize_bounty(&raw).claim.is_none());
    }

    #[test]
    fn test_status_round_trip_serde() {
        for status in [
            BountyStatus::Open,
            BountyStatus::Claimed,
            BountyStatus::Submitted,
            BountyStatus::Completed,
        ] {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
            let back: BountyStatus = serde_json::from_str(&json).unwrap();
            assert_eq!(back, status);
        }
    }
}
