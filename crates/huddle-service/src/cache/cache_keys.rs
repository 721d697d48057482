//! Cache key generators for consistent key naming.

use huddle_core::UserId;

/// Prefix used when none is configured.
pub const DEFAULT_PREFIX: &str = "huddle";

/// Builds namespaced cache keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKeys {
    prefix: String,
}

impl CacheKeys {
    /// Creates a key builder with the given namespace prefix.
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Key holding the group snapshot of a user.
    #[must_use]
    pub fn group_by_user(&self, user_id: UserId) -> String {
        format!("{}:group-by-user:{}", self.prefix, user_id)
    }

    /// Key holding the group summary for an invite token.
    #[must_use]
    pub fn group_by_token(&self, token: &str) -> String {
        format!("{}:group-by-token:{}", self.prefix, token)
    }
}

impl Default for CacheKeys {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIX)
    }
}
