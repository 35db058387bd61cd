//! Seed fixture for the bounty store.
//!
//! Used whenever the bounties file is missing or unreadable: the read path
//! degrades to this data instead of failing, so a fresh deployment (or a
//! corrupted file) still serves a browsable board.

use chrono::{TimeZone, Utc};

use super::bounty::{Bounty, BountyStatus};

/// Build the built-in seed bounties. Always well-formed; the store still
/// normalizes them so the seed and the file path share one contract.
pub fn seed_bounties() -> Vec<Bounty> {
    let created_at = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();

    vec![
        Bounty {
            id: "bounty-seed-docs-crawler".to_string(),
            title: "Docs crawler for MCP server listings".to_string(),
            description: "Crawl the published MCP server registries and emit a \
                          normalized JSON feed of name, transport, and auth mode."
                .to_string(),
            tags: vec!["crawler".to_string(), "mcp".to_string()],
            acceptance_criteria: vec![
                "Feed validates against the published schema".to_string(),
                "Handles registry pagination".to_string(),
            ],
            budget: 400.0,
            currency: "USD".to_string(),
            status: BountyStatus::Open,
            submissions: 0,
            requester: "@guildboard".to_string(),
            created_at,
            deadline: "2024-07-15".to_string(),
            claim: None,
            latest_submission: None,
            completed_at: None,
            completed_by: None,
            history: Vec::new(),
        },
        Bounty {
            id: "bounty-seed-eval-harness".to_string(),
            title: "Skill evaluation harness".to_string(),
            description: "Reusable harness that runs a directory skill against \
                          a fixture suite and scores the transcript."
                .to_string(),
            tags: vec!["evals".to_string(), "tooling".to_string()],
            acceptance_criteria: vec![
                "Deterministic scoring across runs".to_string(),
                "JUnit-style report output".to_string(),
                "Documented fixture format".to_string(),
            ],
            budget: 750.0,
            currency: "USD".to_string(),
            status: BountyStatus::Open,
            submissions: 0,
            requester: "@guildboard".to_string(),
            created_at,
            deadline: "2024-08-01".to_string(),
            claim: None,
            latest_submission: None,
            completed_at: None,
            completed_by: None,
            history: Vec::new(),
        },
    ]
}
