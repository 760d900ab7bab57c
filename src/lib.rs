//! # forumkit - Forum lifecycle management
//!
//! A lifecycle engine for forum/topic/reply content trees. It keeps the
//! denormalized state of a forum consistent while content is created,
//! moderated, moved, merged, split and deleted.
//!
//! ## Features
//!
//! - **Status transitions**: trash, spam, close, stick, with cascades that
//!   restore only what they themselves hid
//! - **Hierarchy operations**: move topics and forums, merge and split topics
//! - **Derived aggregates**: counts and last-activity pointers recomputed from
//!   source data, never drifted by increments
//! - **Pluggable storage**: an in-memory store and a RocksDB store behind one
//!   trait
//!
//! ## Examples
//!
//! ```rust
//! use forumkit::forum::{ForumEngine, MemoryStore, NewForum, NewReply, NewTopic, OpContext, UserId};
//! use std::sync::Arc;
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = ForumEngine::new(Arc::new(MemoryStore::new()))?;
//! let ctx = OpContext::new(UserId(1));
//!
//! let forum = engine.new_forum(ctx, NewForum::new("General"))?;
//! let topic = engine.new_topic(ctx, NewTopic::new(forum, "Hello", "First post"))?;
//! engine.new_reply(ctx, NewReply::new(topic, "Welcome!"))?;
//!
//! assert_eq!(engine.forum(forum)?.counts.reply_count, 1);
//! engine.trash(ctx, topic)?;
//! assert_eq!(engine.forum(forum)?.counts.topic_count, 0);
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod error;
pub mod forum;
pub mod storage;

pub use error::{ForumError, Result};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
