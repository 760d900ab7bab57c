//! Forum lifecycle management.
//!
//! Content forms a three-level tree: forums (which nest), topics owned by a
//! forum, and replies owned by a topic. Every node carries a publication
//! status, and every forum and topic carries denormalized aggregates: live
//! and hidden-inclusive counts plus a last-activity pointer.
//!
//! ## Hierarchy
//!
//! ```text
//! Forum (root)
//!     ├── Forum (child)
//!     │       └── Topic
//!     │               └── Reply
//!     │                       └── Reply (threaded, same topic)
//!     └── Topic
//! ```
//!
//! ## Consistency
//!
//! Aggregates are never incremented in place. Each mutation records the
//! topics and forums it disturbed in a [`RecountPlan`] and the plan recomputes
//! them from source data, topics first and then forums deepest-first up to the
//! root. Running the same plan twice leaves the store unchanged.
//!
//! Callers interact with [`ForumEngine`]; the remaining modules are building
//! blocks it composes.

pub mod activity;
pub mod cascade;
pub mod config;
pub mod constants;
pub mod counters;
mod engine;
pub mod events;
mod hierarchy;
pub mod listing;
mod lock;
pub mod node;
pub mod registry;
pub mod repair;
mod state;
pub mod storage;
mod transitions;
pub mod types;
pub mod validation;

pub use cascade::{RecountOutcome, RecountPlan};
pub use config::EngineConfig;
pub use engine::{
    ForumEngine, ForumEngineBuilder, NewForum, NewReply, NewTopic, ReplyEdit, TopicEdit,
};
pub use events::{EventBus, EventEnvelope, EventRecorder, LifecycleEvent, LifecycleListener};
pub use hierarchy::{resolve_topic, MergeOptions, SplitOptions, SplitPolicy, TopicLookup};
pub use listing::{Cursor, Page};
pub use lock::{SubtreeGuard, SubtreeLocks, GLOBAL_STICKY_KEY};
pub use node::{ContentNode, Extensions, Forum, ForumCounts, Reply, Topic};
pub use registry::{
    EngagementRegistry, MemoryRegistry, NoopNotifier, NoopRegistry, Notifier, RecordingNotifier,
};
pub use repair::RepairReport;
pub use state::MemoryStore;
pub use storage::{check_storable, ContentStore, ForumStorage, StatusFilter, StoreExt};
pub use types::{
    ForumStatus, ForumType, LastActive, NodeId, NodeKind, OpContext, PostStatus, StatusMark,
    StickyScope, UserId,
};
