//! Event feed integration tests over the flat-file backend.

use chrono::{DateTime, TimeZone, Utc};
use guildboard_core::config::{EventFeedConfig, StorageConfig};
use guildboard_core::events::{
    ArtifactRecord, CommentRecord, EventFeed, EventFeedParams, EventType, FileEventSource,
    RatingRecord,
};
use tempfile::tempdir;

fn ts(minutes: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, minutes, 0).unwrap()
}

async fn write_fixture(
    storage: &StorageConfig,
    artifacts: &[ArtifactRecord],
    comments: &[CommentRecord],
    ratings: &[RatingRecord],
) {
    tokio::fs::write(
        storage.artifacts_path(),
        serde_json::to_vec_pretty(artifacts).unwrap(),
    )
    .await
    .unwrap();
    tokio::fs::write(
        storage.comments_path(),
        serde_json::to_vec_pretty(comments).unwrap(),
    )
    .await
    .unwrap();
    tokio::fs::write(
        storage.ratings_path(),
        serde_json::to_vec_pretty(ratings).unwrap(),
    )
    .await
    .unwrap();
}

fn artifact(id: &str, author: &str) -> ArtifactRecord {
    ArtifactRecord {
        id: id.to_string(),
        author: author.to_string(),
    }
}

fn comment(id: &str, artifact: &str, parent: Option<&str>, author: &str, minute: u32) -> CommentRecord {
    CommentRecord {
        id: id.to_string(),
        artifact_id: artifact.to_string(),
        parent_id: parent.map(String::from),
        author: author.to_string(),
        body: "body".to_string(),
        created_at: ts(minute),
    }
}

fn rating(id: &str, artifact: &str, author: &str, minute: u32) -> RatingRecord {
    RatingRecord {
        id: id.to_string(),
        artifact_id: artifact.to_string(),
        author: author.to_string(),
        score: 5,
        review: None,
        created_at: ts(minute),
        updated_at: ts(minute),
    }
}

#[tokio::test]
async fn feed_pages_through_mixed_events_with_a_small_limit() {
    let dir = tempdir().unwrap();
    let storage = StorageConfig {
        data_dir: dir.path().to_path_buf(),
    };
    write_fixture(
        &storage,
        &[artifact("a1", "@maker")],
        &[
            comment("c1", "a1", None, "@fan1", 1),
            comment("c2", "a1", None, "@fan2", 3),
            comment("c3", "a1", None, "@fan3", 5),
        ],
        &[rating("r1", "a1", "@fan1", 2), rating("r2", "a1", "@fan2", 4)],
    )
    .await;

    let feed = EventFeed::new(
        None,
        FileEventSource::new(&storage),
        EventFeedConfig::default(),
    );

    let mut cursor = None;
    let mut collected = Vec::new();
    loop {
        let page = feed
            .list_agent_events(EventFeedParams {
                agent_handle: "@maker".to_string(),
                cursor: cursor.clone(),
                limit: Some(2),
                artifact_id: None,
            })
            .await
            .unwrap();
        assert!(page.items.len() <= 2);
        collected.extend(page.items);
        match page.next_cursor {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }

    // All five events, comments and ratings interleaved chronologically
    assert_eq!(
        collected.iter().map(|e| e.id.as_str()).collect::<Vec<_>>(),
        vec!["comment:c1", "rating:r1", "comment:c2", "rating:r2", "comment:c3"]
    );
    assert!(collected
        .windows(2)
        .all(|w| w[0].created_at <= w[1].created_at));
}

#[tokio::test]
async fn replies_notify_the_comment_author_not_the_artifact_owner() {
    let dir = tempdir().unwrap();
    let storage = StorageConfig {
        data_dir: dir.path().to_path_buf(),
    };
    write_fixture(
        &storage,
        &[artifact("a1", "@maker")],
        &[
            comment("c1", "a1", None, "@critic", 1),
            comment("c2", "a1", Some("c1"), "@maker", 2),
        ],
        &[],
    )
    .await;

    let feed = EventFeed::new(
        None,
        FileEventSource::new(&storage),
        EventFeedConfig::default(),
    );

    let maker_page = feed
        .list_agent_events(EventFeedParams {
            agent_handle: "@maker".to_string(),
            cursor: None,
            limit: None,
            artifact_id: None,
        })
        .await
        .unwrap();
    assert_eq!(maker_page.items.len(), 1);
    assert_eq!(maker_page.items[0].event_type, EventType::CommentCreated);

    let critic_page = feed
        .list_agent_events(EventFeedParams {
            agent_handle: "critic".to_string(),
            cursor: None,
            limit: None,
            artifact_id: None,
        })
        .await
        .unwrap();
    assert_eq!(critic_page.items.len(), 1);
    assert_eq!(critic_page.items[0].event_type, EventType::CommentReplied);
    assert_eq!(critic_page.items[0].recipient_handle, "@critic");
}

#[tokio::test]
async fn wire_format_uses_camel_case_and_dotted_types() {
    let dir = tempdir().unwrap();
    let storage = StorageConfig {
        data_dir: dir.path().to_path_buf(),
    };
    write_fixture(
        &storage,
        &[artifact("a1", "@maker")],
        &[comment("c1", "a1", None, "@fan", 1)],
        &[],
    )
    .await;

    let feed = EventFeed::new(
        None,
        FileEventSource::new(&storage),
        EventFeedConfig::default(),
    );
    let page = feed
        .list_agent_events(EventFeedParams {
            agent_handle: "@maker".to_string(),
            cursor: None,
            limit: None,
            artifact_id: None,
        })
        .await
        .unwrap();

    let json = serde_json::to_value(&page).unwrap();
    let item = &json["items"][0];
    assert_eq!(item["type"], "comment.created");
    assert_eq!(item["recipientHandle"], "@maker");
    assert_eq!(item["artifactId"], "a1");
    assert!(item["comment"]["createdAt"].is_string());
    assert!(json["updatedAt"].is_string());
}
