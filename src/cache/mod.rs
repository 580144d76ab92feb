//! Read-through response cache
//!
//! [`Cache::memoize`] wraps an expensive computation keyed by request
//! identity. Every call to the key-value backend goes through a
//! [`RetryPolicy`]: a failed call reconnects and is retried, and when the
//! retry fails too the call degrades to a neutral value (miss, no-op, zero).
//! Backend trouble is logged and never reaches the caller; errors raised by
//! the computation itself are returned untouched.

pub mod memory;
pub mod redis;
pub mod resp;

pub use memory::MemoryBackend;
pub use redis::RedisBackend;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Cache backend errors
#[derive(Error, Debug)]
pub enum CacheError {
    /// Connection could not be established or was lost
    #[error("Connection error: {0}")]
    Connection(String),

    /// I/O error on an open connection
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed reply
    #[error("Protocol error: {0}")]
    Protocol(#[from] resp::RespError),

    /// Error reply sent by the server
    #[error("Server error: {0}")]
    Server(String),

    /// Stored value could not be decoded
    #[error("Serialization error: {0}")]
    Serialization(String),
}

pub type CacheResult<T> = Result<T, CacheError>;

/// Key-value store holding serialized cache entries
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>>;

    async fn set(&self, key: &str, value: &[u8]) -> CacheResult<()>;

    /// Number of keys removed
    async fn delete(&self, key: &str) -> CacheResult<u64>;

    /// Keys matching a glob pattern (`*`, `?`, `\` escapes)
    async fn keys(&self, pattern: &str) -> CacheResult<Vec<String>>;

    async fn ping(&self) -> CacheResult<bool>;

    /// Drop the current connection and open a new one
    async fn reconnect(&self) -> CacheResult<()>;

    /// `host:port` style label used in status lines
    fn endpoint(&self) -> String;
}

/// Whether an entry was served from the store or freshly computed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CacheStatus {
    Hit,
    Miss,
}

impl CacheStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheStatus::Hit => "HIT",
            CacheStatus::Miss => "MISS",
        }
    }
}

/// Bookkeeping stored next to a cached body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheMeta {
    /// RFC 1123 timestamp of the computation
    pub last_modified: String,
    pub cache: CacheStatus,
}

/// What the cache stores and what [`Cache::memoize`] returns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub body: Value,
    pub meta: CacheMeta,
}

impl CacheEntry {
    /// Wrap a freshly computed body
    pub fn fresh(body: Value) -> Self {
        Self {
            body,
            meta: CacheMeta {
                last_modified: http_date(),
                cache: CacheStatus::Miss,
            },
        }
    }
}

/// Current time as an HTTP date (RFC 1123)
pub fn http_date() -> String {
    chrono::Utc::now()
        .format("%a, %d %b %Y %H:%M:%S GMT")
        .to_string()
}

/// Cache key of a request: path plus the raw query string.
///
/// The query string is used verbatim, so `?a=1&b=2` and `?b=2&a=1` are
/// stored as two different entries.
pub fn cache_key(path: &str, query: Option<&str>) -> String {
    match query {
        Some(q) if !q.is_empty() => format!("{}?{}", path, q),
        _ => path.to_string(),
    }
}

/// Escape glob metacharacters so a literal prefix can be used in `KEYS`
pub fn escape_glob(literal: &str) -> String {
    let mut escaped = String::with_capacity(literal.len());
    for c in literal.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Reconnect-and-retry wrapper applied to every backend call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 2 }
    }
}

impl RetryPolicy {
    /// Run `op` until it succeeds or the attempts are used up.
    ///
    /// Returns `None` once every attempt failed; each failure is logged and
    /// followed by a reconnect when another attempt remains.
    pub async fn run<T, F, Fut>(&self, backend: &dyn CacheBackend, name: &str, op: F) -> Option<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = CacheResult<T>>,
    {
        let attempts = self.max_attempts.max(1);
        for attempt in 1..=attempts {
            match op().await {
                Ok(value) => return Some(value),
                Err(e) => {
                    error!("CacheError: {} try of {} returned {}", ordinal(attempt), name, e);
                    if attempt < attempts {
                        if let Err(e) = backend.reconnect().await {
                            warn!("Cache: reconnect to {} failed: {}", backend.endpoint(), e);
                        }
                    }
                }
            }
        }
        None
    }
}

fn ordinal(attempt: u32) -> &'static str {
    match attempt {
        1 => "First",
        2 => "Second",
        _ => "Another",
    }
}

/// Cache facade used by the HTTP layer
#[derive(Clone)]
pub struct Cache {
    backend: Arc<dyn CacheBackend>,
    enabled: bool,
    policy: RetryPolicy,
    password: Option<String>,
}

impl Cache {
    pub fn new(backend: Arc<dyn CacheBackend>, enabled: bool) -> Self {
        Self {
            backend,
            enabled,
            policy: RetryPolicy::default(),
            password: None,
        }
    }

    /// Cache that always computes
    pub fn disabled() -> Self {
        Self::new(Arc::new(MemoryBackend::new(1)), false)
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Password shown (digested) in the status line
    pub fn with_password(mut self, password: Option<String>) -> Self {
        self.password = password;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Serve `key` from the store, or compute and store it.
    ///
    /// With `purge` set the stored entry is ignored and overwritten.
    pub async fn memoize<F, Fut, E>(&self, key: &str, purge: bool, compute: F) -> Result<CacheEntry, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value, E>>,
    {
        if !self.enabled {
            return Ok(CacheEntry::fresh(compute().await?));
        }

        if !purge {
            if let Some(mut entry) = self.retrieve(key).await {
                debug!("Cache: HIT {}", key);
                entry.meta.cache = CacheStatus::Hit;
                return Ok(entry);
            }
        }

        debug!("Cache: MISS {}", key);
        let entry = CacheEntry::fresh(compute().await?);
        self.create(key, &entry).await;
        Ok(entry)
    }

    async fn retrieve(&self, key: &str) -> Option<CacheEntry> {
        let raw = self
            .policy
            .run(self.backend.as_ref(), "get", || self.backend.get(key))
            .await??;
        match serde_json::from_slice(&raw) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Cache: discarding undecodable entry {}: {}", key, e);
                None
            }
        }
    }

    async fn create(&self, key: &str, entry: &CacheEntry) {
        let raw = match serde_json::to_vec(entry) {
            Ok(raw) => raw,
            Err(e) => {
                error!("Cache: could not serialize entry {}: {}", key, e);
                return;
            }
        };
        self.policy
            .run(self.backend.as_ref(), "set", || self.backend.set(key, &raw))
            .await;
    }

    /// Remove one key; returns how many keys were removed
    pub async fn delete(&self, key: &str) -> u64 {
        self.policy
            .run(self.backend.as_ref(), "delete", || self.backend.delete(key))
            .await
            .unwrap_or(0)
    }

    /// Remove every key starting with `prefix`; returns how many were removed
    pub async fn purge(&self, prefix: &str) -> usize {
        let pattern = format!("{}*", escape_glob(prefix));
        let keys = self
            .policy
            .run(self.backend.as_ref(), "keys", || self.backend.keys(&pattern))
            .await
            .unwrap_or_default();
        debug!("Cache: key(s) to be deleted: {:?}", keys);

        let mut removed = 0;
        for key in &keys {
            if self.delete(key).await > 0 {
                removed += 1;
            }
        }

        let details = format!("{} key(s), matching the pattern: {}", keys.len(), prefix);
        if keys.is_empty() {
            info!("Cache: {}", details);
        } else if removed == keys.len() {
            info!("Cache: purged with success {}", details);
        } else {
            info!("Cache: failed purging {} ({} removed)", details, removed);
        }
        removed
    }

    /// One-line health report for `/_status/cache`
    pub async fn status(&self) -> String {
        let digest = password_digest(self.password.as_deref().unwrap_or(""));
        let endpoint = self.backend.endpoint();
        let failure = |error: String| {
            format!(
                "Redis connection authenticated [:{}] | FAILED | {} | {}",
                digest, endpoint, error
            )
        };
        match self.backend.ping().await {
            Ok(true) => format!(
                "Redis connection authenticated [:{}] | SUCCEED | {}",
                digest, endpoint
            ),
            Ok(false) => failure("Ping failed".to_string()),
            Err(e) => failure(e.to_string()),
        }
    }
}

pub(crate) fn password_digest(password: &str) -> String {
    Sha256::digest(password.as_bytes())
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}
