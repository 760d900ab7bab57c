//! Integration tests for the RocksDB-backed store
//!
//! These tests run the engine over `ForumStorage` in a temporary directory
//! and check that state survives a reopen.

use forumkit::cli::{args::Command, execute};
use forumkit::forum::{
    ContentStore, ForumEngine, ForumStorage, NewForum, NewReply, NewTopic, NodeId, NodeKind,
    OpContext, PostStatus, SplitOptions, StatusFilter, StickyScope, StoreExt, UserId,
};
use std::sync::Arc;
use tempfile::TempDir;

fn ctx(now: u64) -> OpContext {
    OpContext::at(UserId(1), now)
}

fn open(dir: &TempDir) -> ForumEngine<ForumStorage> {
    let storage = ForumStorage::new(dir.path()).expect("Failed to open storage");
    ForumEngine::new(Arc::new(storage)).expect("Failed to build engine")
}

/// Aggregates and statuses persist across a reopen
#[test]
fn test_state_survives_reopen() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let (forum, topic, trashed) = {
        let engine = open(&dir);
        let forum = engine.new_forum(ctx(1), NewForum::new("General")).unwrap();
        let topic = engine
            .new_topic(ctx(2), NewTopic::new(forum, "Hello", "body").with_tags(["Rust"]))
            .unwrap();
        engine.new_reply(ctx(3), NewReply::new(topic, "one")).unwrap();
        let trashed = engine.new_reply(ctx(4), NewReply::new(topic, "two")).unwrap();
        engine.trash(ctx(5), trashed).unwrap();
        engine.stick_topic(ctx(6), topic, StickyScope::Global).unwrap();
        (forum, topic, trashed)
    };

    let engine = open(&dir);
    let f = engine.forum(forum).unwrap();
    assert_eq!(f.counts.topic_count, 1);
    assert_eq!(f.counts.reply_count, 1);
    assert_eq!(f.counts.total_reply_count, 2);
    assert_eq!(engine.reply(trashed).unwrap().post_status, PostStatus::Trash);
    assert_eq!(engine.store().load_global_stickies().unwrap(), vec![topic]);

    let tagged = engine.store().query_by_tag("rust").unwrap();
    assert_eq!(tagged.len(), 1);
    assert_eq!(tagged[0].id(), topic);

    // Ids are never reused after a reopen.
    let fresh = engine.new_reply(ctx(7), NewReply::new(topic, "three")).unwrap();
    assert!(fresh.0 > trashed.0);
}

/// Index entries follow nodes through moves and deletes
#[test]
fn test_indexes_track_structural_changes() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let engine = open(&dir);
    let a = engine.new_forum(ctx(1), NewForum::new("A")).unwrap();
    let b = engine.new_forum(ctx(2), NewForum::new("B")).unwrap();
    let topic = engine.new_topic(ctx(3), NewTopic::new(a, "T", "")).unwrap();
    for i in 0..4 {
        engine.new_reply(ctx(10 + i), NewReply::new(topic, "r")).unwrap();
    }

    engine.move_topic(ctx(20), topic, b).unwrap();
    let store = engine.store();
    assert!(store.forum_topics(a, StatusFilter::All).unwrap().is_empty());
    assert_eq!(store.forum_topics(b, StatusFilter::All).unwrap().len(), 1);

    let replies = store.topic_replies(topic, StatusFilter::All).unwrap();
    let dest = engine
        .split_topic(ctx(21), topic, replies[2].id, SplitOptions::default())
        .unwrap();
    assert_eq!(store.topic_replies(dest, StatusFilter::All).unwrap().len(), 2);
    assert_eq!(engine.forum(b).unwrap().counts.topic_count, 2);

    assert_eq!(engine.delete(ctx(22), b).unwrap(), 7);
    assert!(store.list_ids(NodeKind::Reply).unwrap().is_empty());
    assert_eq!(store.list_ids(NodeKind::Forum).unwrap(), vec![a]);
    assert!(store.query_by_author(UserId(1)).unwrap().iter().all(|n| n.id() == a));
}

/// The CLI command layer runs against the persistent store
#[test]
fn test_cli_commands_over_rocksdb() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let engine = open(&dir);

    let created = execute(
        &engine,
        ctx(1),
        Command::NewForum {
            title: "Announcements".into(),
            parent: None,
            category: false,
        },
    )
    .unwrap();
    let forum = NodeId(created["id"].as_u64().unwrap());

    for i in 0..3 {
        execute(
            &engine,
            ctx(2 + i),
            Command::NewTopic {
                forum,
                title: format!("Topic {}", i),
                content: String::new(),
                tags: Vec::new(),
            },
        )
        .unwrap();
    }

    let page = execute(
        &engine,
        ctx(10),
        Command::Topics {
            forum,
            cursor: None,
            limit: 2,
        },
    )
    .unwrap();
    assert_eq!(page["items"].as_array().unwrap().len(), 2);
    let cursor = page["next_cursor"].as_str().unwrap().to_string();

    let rest = execute(
        &engine,
        ctx(11),
        Command::Topics {
            forum,
            cursor: Some(cursor),
            limit: 2,
        },
    )
    .unwrap();
    assert_eq!(rest["items"].as_array().unwrap().len(), 1);
    assert!(rest["next_cursor"].is_null());

    let report = execute(&engine, ctx(12), Command::Recount).unwrap();
    assert_eq!(report["topics"], serde_json::json!(3));
    assert_eq!(report["forums"], serde_json::json!(1));
}
