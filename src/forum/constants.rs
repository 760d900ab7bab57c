//! Shared constants for forum validation and limits.

use base64::engine::general_purpose::{GeneralPurpose, URL_SAFE_NO_PAD};

// =============================================================================
// Content Size Limits
// =============================================================================

/// Maximum forum/topic title size (512 bytes).
pub const MAX_TITLE_SIZE: usize = 512;

/// Maximum forum description, topic or reply body size (100KB).
pub const MAX_CONTENT_SIZE: usize = 100 * 1024;

/// Maximum number of tags per topic.
pub const MAX_TAGS_COUNT: usize = 20;

/// Maximum length of a single normalized tag (64 bytes).
pub const MAX_TAG_SIZE: usize = 64;

// =============================================================================
// Extension Map Limits
// =============================================================================

/// Maximum number of extension entries on a node.
pub const MAX_EXTRA_ENTRIES: usize = 32;

/// Maximum extension key length (64 bytes).
pub const MAX_EXTRA_KEY_SIZE: usize = 64;

/// Maximum extension value length (4KB).
pub const MAX_EXTRA_VALUE_SIZE: usize = 4 * 1024;

// =============================================================================
// Hierarchy Limits
// =============================================================================

/// Default cap on forum nesting depth (a root forum has depth 1).
pub const DEFAULT_MAX_FORUM_DEPTH: usize = 16;

/// Maximum number of merge redirects followed when resolving a topic.
pub const MAX_REDIRECT_HOPS: usize = 8;

// =============================================================================
// Engine Defaults
// =============================================================================

/// Default advisory lock timeout (5 seconds in milliseconds).
pub const DEFAULT_LOCK_TIMEOUT_MS: u64 = 5_000;

/// Default number of characters of pivot content used as a split title.
pub const DEFAULT_TITLE_EXCERPT_LEN: usize = 80;

/// Default page size for topic and reply listings.
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// Maximum page size for topic and reply listings.
pub const MAX_PAGE_SIZE: usize = 200;

// =============================================================================
// Listing Cursors
// =============================================================================

/// Encoding for opaque pagination cursors (URL-safe, unpadded).
pub const CURSOR_ENGINE: GeneralPurpose = URL_SAFE_NO_PAD;
