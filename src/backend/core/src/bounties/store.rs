//! Flat-file bounty store.
//!
//! The whole collection lives as one JSON array at a well-known path. Reads
//! load and normalize the full array, degrading to the seed fixture on any
//! failure; writes replace the file atomically (temp file + rename) so a
//! crash mid-write can never leave a half-written store visible to readers.
//!
//! All read-modify-write sequences (create, transition) are serialized behind
//! an async mutex. Plain reads take no lock: they see the last atomically
//! published snapshot.

use std::path::{Path, PathBuf};

use chrono::{Duration, Utc};
use serde::Deserialize;
use tokio::sync::{Mutex, MutexGuard};
use tracing::warn;
use uuid::Uuid;

use crate::error::Result;

use super::bounty::{dedup_first_occurrence, normalize_bounty, Bounty, BountyStatus, RawBounty};
use super::seed::seed_bounties;

/// Default deadline horizon for new bounties.
const DEFAULT_DEADLINE_DAYS: i64 = 30;

/// Input for creating a bounty.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateBountyInput {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub budget: f64,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Maps to `acceptance_criteria` on the stored record.
    #[serde(default)]
    pub requirements: Vec<String>,
    #[serde(default)]
    pub requester: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
}

/// Durable representation of the bounty collection.
pub struct BountyStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl BountyStore {
    /// Create a store over the given bounties file path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Serialize read-modify-write sequences. Held across the whole
    /// load-validate-persist span of a mutation.
    pub(crate) async fn begin_write(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock().await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Read path
    // ─────────────────────────────────────────────────────────────────────────

    /// Read and normalize the full bounty collection.
    ///
    /// Never fails: a missing file, unreadable bytes, or non-array JSON all
    /// degrade to the normalized seed fixture.
    pub async fn read_bounties_file(&self) -> Vec<Bounty> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Bounties file unreadable, serving seed data"
                );
                return normalized_seed();
            }
        };

        let values: Vec<serde_json::Value> = match serde_json::from_slice(&bytes) {
            Ok(values) => values,
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Bounties file is not a JSON array, serving seed data"
                );
                return normalized_seed();
            }
        };

        values
            .into_iter()
            .map(|value| {
                let raw: RawBounty = serde_json::from_value(value).unwrap_or_default();
                normalize_bounty(&raw)
            })
            .collect()
    }

    /// All bounties.
    pub async fn get_bounties(&self) -> Vec<Bounty> {
        self.read_bounties_file().await
    }

    /// A single bounty by id.
    pub async fn get_bounty_by_id(&self, id: &str) -> Option<Bounty> {
        self.read_bounties_file()
            .await
            .into_iter()
            .find(|b| b.id == id)
    }

    /// Bounties carrying the given tag (case-insensitive exact match).
    pub async fn get_bounties_by_tag(&self, tag: &str) -> Vec<Bounty> {
        let needle = tag.trim().to_lowercase();
        self.read_bounties_file()
            .await
            .into_iter()
            .filter(|b| b.tags.iter().any(|t| t.to_lowercase() == needle))
            .collect()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Write path
    // ─────────────────────────────────────────────────────────────────────────

    /// Durably persist the full collection.
    ///
    /// Atomic: the array is serialized to a temp file in the same directory,
    /// then renamed into place. Errors propagate; the caller must not assume
    /// the mutation took effect.
    pub async fn write_bounties_file(&self, bounties: &[Bounty]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp_path = self.path.with_extension(format!(
            "json.tmp-{}",
            Uuid::new_v4().simple()
        ));

        let bytes = serde_json::to_vec_pretty(bounties)?;
        tokio::fs::write(&tmp_path, &bytes).await?;
        tokio::fs::rename(&tmp_path, &self.path).await?;

        Ok(())
    }

    /// Create a new bounty: fresh id, `open` status, empty history, 30-day
    /// default deadline. Appends to the collection and persists it; returns
    /// the created record.
    pub async fn create_bounty(&self, input: CreateBountyInput) -> Result<Bounty> {
        let _guard = self.begin_write().await;

        let now = Utc::now();
        let bounty = Bounty {
            id: generate_bounty_id(),
            title: input.title.trim().to_string(),
            description: input.description.trim().to_string(),
            tags: dedup_first_occurrence(non_empty(input.tags)),
            acceptance_criteria: non_empty(input.requirements),
            budget: if input.budget.is_finite() && input.budget > 0.0 {
                input.budget
            } else {
                0.0
            },
            currency: input
                .currency
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty())
                .unwrap_or_else(|| "USD".to_string()),
            status: BountyStatus::Open,
            submissions: 0,
            requester: input
                .requester
                .map(|r| r.trim().to_string())
                .unwrap_or_default(),
            created_at: now,
            deadline: (now + Duration::days(DEFAULT_DEADLINE_DAYS))
                .date_naive()
                .format("%Y-%m-%d")
                .to_string(),
            claim: None,
            latest_submission: None,
            completed_at: None,
            completed_by: None,
            history: Vec::new(),
        };

        let mut bounties = self.read_bounties_file().await;
        bounties.push(bounty.clone());
        self.write_bounties_file(&bounties).await?;

        Ok(bounty)
    }
}

/// Timestamp plus random suffix, so near-simultaneous creates cannot collide.
fn generate_bounty_id() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("bounty-{}-{}", Utc::now().timestamp_millis(), &suffix[..8])
}

fn non_empty(items: Vec<String>) -> Vec<String> {
    items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Seed data run through the same normalization as file data, so both paths
/// share one contract.
fn normalized_seed() -> Vec<Bounty> {
    seed_bounties()
        .into_iter()
        .map(|bounty| {
            let value = serde_json::to_value(&bounty).unwrap_or_default();
            let raw: RawBounty = serde_json::from_value(value).unwrap_or_default();
            normalize_bounty(&raw)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn store_in(dir: &tempfile::TempDir) -> BountyStore {
        BountyStore::new(dir.path().join("bounties.json"))
    }

    #[tokio::test]
    async fn test_missing_file_serves_seed() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);

        let bounties = store.read_bounties_file().await;
        assert!(!bounties.is_empty());
        assert!(bounties.iter().all(|b| b.status == BountyStatus::Open));
    }

    #[tokio::test]
    async fn test_corrupt_file_serves_seed() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);
        tokio::fs::write(store.path(), b"{not json").await.unwrap();

        let bounties = store.read_bounties_file().await;
        assert_eq!(bounties.len(), seed_bounties().len());
    }

    #[tokio::test]
    async fn test_non_array_json_serves_seed() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);
        tokio::fs::write(store.path(), b"{\"bounties\": []}")
            .await
            .unwrap();

        let bounties = store.read_bounties_file().await;
        assert_eq!(bounties.len(), seed_bounties().len());
    }

    #[tokio::test]
    async fn test_write_read_round_trip() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);

        let written = seed_bounties();
        store.write_bounties_file(&written).await.unwrap();

        let read_back = store.read_bounties_file().await;
        assert_eq!(read_back, written);
    }

    #[tokio::test]
    async fn test_write_leaves_no_temp_files() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);
        store.write_bounties_file(&seed_bounties()).await.unwrap();

        let mut entries = tokio::fs::read_dir(dir.path()).await.unwrap();
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            names.push(entry.file_name().to_string_lossy().to_string());
        }
        assert_eq!(names, vec!["bounties.json"]);
    }

    #[tokio::test]
    async fn test_create_bounty_persists_and_defaults() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);
        store.write_bounties_file(&[]).await.unwrap();

        let created = store
            .create_bounty(CreateBountyInput {
                title: "  Write a parser  ".to_string(),
                description: "Parse the thing".to_string(),
                budget: 100.0,
                tags: vec!["parsing".to_string(), "".to_string()],
                requirements: vec!["handles unicode".to_string()],
                requester: Some("@bob".to_string()),
                currency: None,
            })
            .await
            .unwrap();

        assert!(created.id.starts_with("bounty-"));
        assert_eq!(created.title, "Write a parser");
        assert_eq!(created.status, BountyStatus::Open);
        assert_eq!(created.currency, "USD");
        assert_eq!(created.tags, vec!["parsing"]);
        assert!(created.history.is_empty());

        let stored = store.get_bounty_by_id(&created.id).await.unwrap();
        assert_eq!(stored, created);
    }

    #[tokio::test]
    async fn test_create_deduplicates_tags() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);
        store.write_bounties_file(&[]).await.unwrap();

        let created = store
            .create_bounty(CreateBountyInput {
                title: "t".to_string(),
                description: "d".to_string(),
                budget: 0.0,
                tags: vec![
                    "rust".to_string(),
                    "web".to_string(),
                    "rust".to_string(),
                    "Rust".to_string(),
                ],
                requirements: vec![],
                requester: None,
                currency: None,
            })
            .await
            .unwrap();

        assert_eq!(created.tags, vec!["rust", "web", "Rust"]);
    }

    #[tokio::test]
    async fn test_create_ids_are_unique() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);
        store.write_bounties_file(&[]).await.unwrap();

        let input = CreateBountyInput {
            title: "t".to_string(),
            description: "d".to_string(),
            budget: 0.0,
            tags: vec![],
            requirements: vec![],
            requester: None,
            currency: None,
        };
        let a = store.create_bounty(input.clone()).await.unwrap();
        let b = store.create_bounty(input).await.unwrap();
        assert_ne!(a.id, b.id);
    }

    #[tokio::test]
    async fn test_tag_lookup_is_case_insensitive() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);

        let mut bounties = seed_bounties();
        bounties[0].tags = vec!["Rust".to_string()];
        store.write_bounties_file(&bounties).await.unwrap();

        let hits = store.get_bounties_by_tag("rUsT").await;
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, bounties[0].id);

        assert!(store.get_bounties_by_tag("python").await.is_empty());
    }
}
