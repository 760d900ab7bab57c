//! Utility functions for CLI operations.

use crate::error::ForumError;
use crate::forum::storage::DEFAULT_DATA_DIR;
use crate::forum::{EngineConfig, ForumEngine, ForumStorage, UserId};
use crate::Result;
use serde::Serialize;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Environment variable naming the data directory.
pub const ENV_DATA_DIR: &str = "FORUMKIT_DATA";

/// Environment variable naming the acting user when `--as` is absent.
pub const ENV_ACTOR: &str = "FORUMKIT_ACTOR";

/// Get the data directory
pub fn get_data_dir() -> PathBuf {
    env::var(ENV_DATA_DIR)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_DATA_DIR))
}

/// Open an engine over the RocksDB store in `data_dir`, configured from the environment
pub fn open_engine(data_dir: &Path) -> Result<ForumEngine<ForumStorage>> {
    let storage = ForumStorage::new(data_dir)?;
    ForumEngine::builder(Arc::new(storage))
        .config(EngineConfig::from_env()?)
        .build()
}

/// Resolve the acting user: `--as` first, then `FORUMKIT_ACTOR`, else user 0
pub fn resolve_actor(explicit: Option<UserId>) -> Result<UserId> {
    if let Some(actor) = explicit {
        return Ok(actor);
    }
    match env::var(ENV_ACTOR) {
        Ok(raw) => raw.trim().parse().map(UserId).map_err(|_| {
            ForumError::config(format!("{} must be a numeric user id, got '{}'", ENV_ACTOR, raw))
        }),
        Err(_) => Ok(UserId(0)),
    }
}

/// Convert any serializable value to JSON
pub fn to_json<T: Serialize>(value: &T) -> Result<serde_json::Value> {
    serde_json::to_value(value)
        .map_err(|e| ForumError::serialization(format!("Failed to encode JSON: {}", e)))
}

/// Print a JSON value to stdout
pub fn print_json(value: &serde_json::Value) -> Result<()> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| ForumError::serialization(format!("Failed to encode JSON: {}", e)))?;
    println!("{}", text);
    Ok(())
}
