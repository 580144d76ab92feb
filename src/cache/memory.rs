//! In-process cache backend
//!
//! Bounded LRU map used when no Redis endpoint is configured, and by tests.

use super::{CacheBackend, CacheResult};
use async_trait::async_trait;
use lru::LruCache;
use std::num::NonZeroUsize;
use tokio::sync::Mutex;

pub struct MemoryBackend {
    entries: Mutex<LruCache<String, Vec<u8>>>,
}

impl MemoryBackend {
    /// Backend holding at most `capacity` entries (at least one)
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

#[async_trait]
impl CacheBackend for MemoryBackend {
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &[u8]) -> CacheResult<()> {
        self.entries
            .lock()
            .await
            .put(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<u64> {
        Ok(self.entries.lock().await.pop(key).map_or(0, |_| 1))
    }

    async fn keys(&self, pattern: &str) -> CacheResult<Vec<String>> {
        let pattern: Vec<char> = pattern.chars().collect();
        let entries = self.entries.lock().await;
        let mut keys: Vec<String> = entries
            .iter()
            .map(|(k, _)| k)
            .filter(|k| glob_match(&pattern, &k.chars().collect::<Vec<_>>()))
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn ping(&self) -> CacheResult<bool> {
        Ok(true)
    }

    async fn reconnect(&self) -> CacheResult<()> {
        Ok(())
    }

    fn endpoint(&self) -> String {
        "memory".to_string()
    }
}

/// Redis-style glob: `*`, `?` and backslash escapes. Brackets are literal.
fn glob_match(pattern: &[char], text: &[char]) -> bool {
    match pattern.split_first() {
        None => text.is_empty(),
        Some(('*', rest)) => (0..=text.len()).any(|skip| glob_match(rest, &text[skip..])),
        Some(('?', rest)) => !text.is_empty() && glob_match(rest, &text[1..]),
        Some(('\\', rest)) if !rest.is_empty() => {
            text.first() == Some(&rest[0]) && glob_match(&rest[1..], &text[1..])
        }
        Some((c, rest)) => text.first() == Some(c) && glob_match(rest, &text[1..]),
    }
}
