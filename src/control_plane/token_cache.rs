//! Process-wide cache of control-plane session tokens

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

/// Session JWTs usually live 24h; refresh an hour early
pub const SESSION_TTL: Duration = Duration::from_secs(23 * 60 * 60);

#[derive(Clone)]
struct CachedToken {
    token: String,
    expires_at: Instant,
}

/// Tokens keyed by `{base_url}:{username}`. Shared through an `Arc` by every
/// client talking to the same servers.
#[derive(Default)]
pub struct TokenCache {
    entries: Mutex<HashMap<String, CachedToken>>,
}

impl TokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn key(base_url: &str, username: &str) -> String {
        format!("{base_url}:{username}")
    }

    /// Returns the cached token if it has not expired
    pub fn get(&self, key: &str) -> Option<String> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries
            .get(key)
            .filter(|cached| Instant::now() < cached.expires_at)
            .map(|cached| cached.token.clone())
    }

    pub fn insert(&self, key: String, token: String, ttl: Duration) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(
            key,
            CachedToken {
                token,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    pub fn invalidate(&self, key: &str) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.remove(key);
    }
}
