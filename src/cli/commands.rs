//! Command implementations for the forumkit CLI.
//!
//! Each command runs against a [`ForumEngine`] and returns a JSON value for
//! the caller to print.

use crate::cli::args::Command;
use crate::cli::utils::to_json;
use crate::forum::{
    ContentStore, ForumEngine, MergeOptions, NewForum, NewReply, NewTopic, OpContext,
    SplitOptions, SplitPolicy,
};
use crate::Result;
use serde_json::{json, Value};
use tracing::info;

/// Execute a parsed command
pub fn execute<S: ContentStore>(
    engine: &ForumEngine<S>,
    ctx: OpContext,
    command: Command,
) -> Result<Value> {
    match command {
        Command::NewForum {
            title,
            parent,
            category,
        } => {
            let mut req = NewForum::new(title);
            if let Some(parent) = parent {
                req = req.under(parent);
            }
            if category {
                req = req.category();
            }
            let id = engine.new_forum(ctx, req)?;
            info!(forum = %id, "Created forum");
            Ok(json!({ "id": id }))
        }
        Command::NewTopic {
            forum,
            title,
            content,
            tags,
        } => {
            let id = engine.new_topic(ctx, NewTopic::new(forum, title, content).with_tags(tags))?;
            info!(topic = %id, forum = %forum, "Created topic");
            Ok(json!({ "id": id }))
        }
        Command::NewReply {
            topic,
            content,
            reply_to,
        } => {
            let mut req = NewReply::new(topic, content);
            if let Some(parent) = reply_to {
                req = req.reply_to(parent);
            }
            let id = engine.new_reply(ctx, req)?;
            info!(reply = %id, topic = %topic, "Created reply");
            Ok(json!({ "id": id }))
        }
        Command::Trash { id } => {
            engine.trash(ctx, id)?;
            show(engine, id)
        }
        Command::Untrash { id } => {
            engine.untrash(ctx, id)?;
            show(engine, id)
        }
        Command::Spam { id } => {
            engine.spam(ctx, id)?;
            show(engine, id)
        }
        Command::Unspam { id } => {
            engine.unspam(ctx, id)?;
            show(engine, id)
        }
        Command::Delete { id } => {
            let removed = engine.delete(ctx, id)?;
            info!(node = %id, removed, "Deleted subtree");
            Ok(json!({ "deleted": id, "removed": removed }))
        }
        Command::Close { id } => {
            engine.close_topic(ctx, id)?;
            show(engine, id)
        }
        Command::Open { id } => {
            engine.open_topic(ctx, id)?;
            show(engine, id)
        }
        Command::Stick { id, scope } => {
            engine.stick_topic(ctx, id, scope)?;
            show(engine, id)
        }
        Command::Unstick { id } => {
            engine.unstick_topic(ctx, id)?;
            show(engine, id)
        }
        Command::Move { topic, forum } => {
            engine.move_topic(ctx, topic, forum)?;
            show(engine, topic)
        }
        Command::MoveForum { forum, parent } => {
            engine.move_forum(ctx, forum, parent)?;
            show(engine, forum)
        }
        Command::Merge {
            source,
            dest,
            convert_original_post,
            merge_tags,
        } => {
            let options = MergeOptions {
                convert_original_post,
                merge_tags,
            };
            let moved = engine.merge_topics(ctx, source, dest, options)?;
            info!(source = %source, destination = %dest, moved, "Merged topics");
            Ok(json!({ "destination": dest, "moved": moved }))
        }
        Command::Split {
            topic,
            pivot,
            title,
            into,
        } => {
            let options = SplitOptions {
                policy: into.map_or(SplitPolicy::Reply, SplitPolicy::Existing),
                title,
                ..SplitOptions::default()
            };
            let dest = engine.split_topic(ctx, topic, pivot, options)?;
            info!(source = %topic, destination = %dest, "Split topic");
            show(engine, dest)
        }
        Command::Show { id } => show(engine, id),
        Command::Topics {
            forum,
            cursor,
            limit,
        } => to_json(&engine.list_topics(forum, cursor.as_deref(), limit)?),
        Command::Recount => {
            let report = engine.recount_all()?;
            to_json(&report)
        }
        Command::Help => Ok(Value::Null),
    }
}

fn show<S: ContentStore>(engine: &ForumEngine<S>, id: crate::forum::NodeId) -> Result<Value> {
    to_json(&engine.node(id)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forum::{MemoryStore, NodeId, UserId};
    use std::sync::Arc;

    fn engine() -> ForumEngine<MemoryStore> {
        ForumEngine::new(Arc::new(MemoryStore::new())).unwrap()
    }

    fn id_of(value: &Value) -> NodeId {
        NodeId(value["id"].as_u64().unwrap())
    }

    #[test]
    fn test_create_and_show() {
        let engine = engine();
        let ctx = OpContext::at(UserId(1), 100);
        let forum = id_of(
            &execute(
                &engine,
                ctx,
                Command::NewForum {
                    title: "General".into(),
                    parent: None,
                    category: false,
                },
            )
            .unwrap(),
        );
        let topic = id_of(
            &execute(
                &engine,
                ctx,
                Command::NewTopic {
                    forum,
                    title: "Hello".into(),
                    content: "Body".into(),
                    tags: vec!["Intro".into()],
                },
            )
            .unwrap(),
        );
        execute(
            &engine,
            ctx,
            Command::NewReply {
                topic,
                content: "hi".into(),
                reply_to: None,
            },
        )
        .unwrap();

        let shown = execute(&engine, ctx, Command::Show { id: forum }).unwrap();
        assert_eq!(shown["Forum"]["counts"]["reply_count"], json!(1));

        let closed = execute(&engine, ctx, Command::Close { id: topic }).unwrap();
        assert!(closed.to_string().contains("Closed"));
    }

    #[test]
    fn test_delete_reports_removed() {
        let engine = engine();
        let ctx = OpContext::at(UserId(1), 100);
        let forum = engine.new_forum(ctx, NewForum::new("F")).unwrap();
        let topic = engine.new_topic(ctx, NewTopic::new(forum, "T", "")).unwrap();
        engine.new_reply(ctx, NewReply::new(topic, "r")).unwrap();

        let out = execute(&engine, ctx, Command::Delete { id: topic }).unwrap();
        assert_eq!(out["removed"], json!(2));
        assert!(execute(&engine, ctx, Command::Show { id: topic }).is_err());
    }
}
