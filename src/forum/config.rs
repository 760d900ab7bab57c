//! Engine configuration.
//!
//! Mirrors the `RocksDbConfig` presets: a `Default` suitable for tests and
//! small installs, a `for_server()` preset, and `from_env()` for overriding
//! individual settings from the process environment.

use crate::error::{ForumError, Result};
use crate::forum::constants::{
    DEFAULT_LOCK_TIMEOUT_MS, DEFAULT_MAX_FORUM_DEPTH, DEFAULT_PAGE_SIZE, DEFAULT_TITLE_EXCERPT_LEN,
    MAX_PAGE_SIZE,
};
use std::time::Duration;

/// Environment variable overriding `lock_timeout` (milliseconds).
pub const ENV_LOCK_TIMEOUT_MS: &str = "FORUMKIT_LOCK_TIMEOUT_MS";

/// Environment variable overriding `max_forum_depth`.
pub const ENV_MAX_FORUM_DEPTH: &str = "FORUMKIT_MAX_FORUM_DEPTH";

/// Tunables for [`ForumEngine`](crate::forum::ForumEngine).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// How long a top-level operation waits for its subtree locks.
    pub lock_timeout: Duration,
    /// Maximum forum nesting depth (a root forum has depth 1).
    pub max_forum_depth: usize,
    /// Character cap for titles derived from reply content on split.
    pub title_excerpt_len: usize,
    /// Page size used when a listing is requested with limit 0.
    pub default_page_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_millis(DEFAULT_LOCK_TIMEOUT_MS),
            max_forum_depth: DEFAULT_MAX_FORUM_DEPTH,
            title_excerpt_len: DEFAULT_TITLE_EXCERPT_LEN,
            default_page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl EngineConfig {
    /// Preset for a shared server: longer lock waits and larger pages.
    pub fn for_server() -> Self {
        Self {
            lock_timeout: Duration::from_secs(15),
            default_page_size: 50,
            ..Self::default()
        }
    }

    /// Default configuration with environment overrides applied.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Applies overrides from `lookup` (an environment accessor).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_LOCK_TIMEOUT_MS) {
            let ms: u64 = raw.trim().parse().map_err(|_| {
                ForumError::config(format!("{} must be an integer, got '{}'", ENV_LOCK_TIMEOUT_MS, raw))
            })?;
            self.lock_timeout = Duration::from_millis(ms);
        }
        if let Some(raw) = lookup(ENV_MAX_FORUM_DEPTH) {
            self.max_forum_depth = raw.trim().parse().map_err(|_| {
                ForumError::config(format!("{} must be an integer, got '{}'", ENV_MAX_FORUM_DEPTH, raw))
            })?;
        }
        self.validate()
    }

    /// Rejects settings the engine cannot operate with.
    pub fn validate(&self) -> Result<()> {
        if self.max_forum_depth == 0 {
            return Err(ForumError::config("max_forum_depth must be at least 1"));
        }
        if self.default_page_size == 0 || self.default_page_size > MAX_PAGE_SIZE {
            return Err(ForumError::config(format!(
                "default_page_size must be between 1 and {}",
                MAX_PAGE_SIZE
            )));
        }
        if self.title_excerpt_len == 0 {
            return Err(ForumError::config("title_excerpt_len must be at least 1"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ForumError;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_are_valid() {
        assert!(EngineConfig::default().validate().is_ok());
        assert!(EngineConfig::for_server().validate().is_ok());
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> =
            [(ENV_LOCK_TIMEOUT_MS, "250"), (ENV_MAX_FORUM_DEPTH, "4")].into();
        let mut config = EngineConfig::default();
        config
            .apply_overrides(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.lock_timeout, Duration::from_millis(250));
        assert_eq!(config.max_forum_depth, 4);
    }

    #[test]
    fn test_invalid_override_is_config_error() {
        let mut config = EngineConfig::default();
        let err = config
            .apply_overrides(|k| (k == ENV_MAX_FORUM_DEPTH).then(|| "deep".to_string()))
            .unwrap_err();
        assert!(matches!(err, ForumError::Config(_)));

        let err = config
            .apply_overrides(|k| (k == ENV_MAX_FORUM_DEPTH).then(|| "0".to_string()))
            .unwrap_err();
        assert!(matches!(err, ForumError::Config(_)));
    }
}
