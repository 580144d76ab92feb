//! Redis cache backend
//!
//! Speaks RESP over a single TCP connection. The connection sits behind a
//! mutex so one request/response exchange completes before the next one is
//! written. It is opened lazily and dropped on any I/O or protocol failure.

use super::resp::RespValue;
use super::{CacheBackend, CacheError, CacheResult};
use crate::config::CacheConfig;
use async_trait::async_trait;
use bytes::BytesMut;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::{debug, info};

struct Connection {
    stream: TcpStream,
    buffer: BytesMut,
}

impl Connection {
    async fn open(config: &CacheConfig) -> CacheResult<Self> {
        let endpoint = config.endpoint();
        let stream = tokio::time::timeout(config.timeout(), TcpStream::connect(&endpoint))
            .await
            .map_err(|_| CacheError::Connection(format!("timed out connecting to {}", endpoint)))?
            .map_err(|e| CacheError::Connection(format!("{}: {}", endpoint, e)))?;
        stream.set_nodelay(true)?;

        let mut conn = Self {
            stream,
            buffer: BytesMut::with_capacity(4096),
        };

        if let Some(password) = &config.password {
            conn.request(&[b"AUTH", password.as_bytes()], config.timeout())
                .await?;
        }
        if config.db != 0 {
            let db = config.db.to_string();
            conn.request(&[b"SELECT", db.as_bytes()], config.timeout())
                .await?;
        }
        info!("Cache: connected to {}", endpoint);
        Ok(conn)
    }

    async fn request(&mut self, parts: &[&[u8]], timeout: Duration) -> CacheResult<RespValue> {
        let mut out = Vec::new();
        RespValue::command(parts).encode(&mut out)?;

        tokio::time::timeout(timeout, self.exchange(&out))
            .await
            .map_err(|_| CacheError::Connection("timed out waiting for reply".to_string()))?
    }

    async fn exchange(&mut self, out: &[u8]) -> CacheResult<RespValue> {
        self.stream.write_all(out).await?;

        loop {
            if let Some(reply) = RespValue::decode(&mut self.buffer)? {
                return match reply {
                    RespValue::Error(message) => Err(CacheError::Server(message)),
                    reply => Ok(reply),
                };
            }
            if self.stream.read_buf(&mut self.buffer).await? == 0 {
                return Err(CacheError::Connection(
                    "connection closed by server".to_string(),
                ));
            }
        }
    }
}

/// Redis-protocol cache backend
pub struct RedisBackend {
    config: CacheConfig,
    conn: Mutex<Option<Connection>>,
}

impl RedisBackend {
    /// Backend for the configured endpoint; nothing is opened until first use
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            conn: Mutex::new(None),
        }
    }

    async fn call(&self, parts: &[&[u8]]) -> CacheResult<RespValue> {
        let mut guard = self.conn.lock().await;
        if guard.is_none() {
            *guard = Some(Connection::open(&self.config).await?);
        }
        let conn = guard
            .as_mut()
            .ok_or_else(|| CacheError::Connection("not connected".to_string()))?;

        let result = conn.request(parts, self.config.timeout()).await;
        // Error replies leave the stream in sync; anything else does not.
        if matches!(result, Err(ref e) if !matches!(e, CacheError::Server(_))) {
            *guard = None;
        }
        result
    }
}

#[async_trait]
impl CacheBackend for RedisBackend {
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        let reply = self.call(&[b"GET", key.as_bytes()]).await?;
        Ok(reply.as_bulk_string()?.map(|b| b.to_vec()))
    }

    async fn set(&self, key: &str, value: &[u8]) -> CacheResult<()> {
        self.call(&[b"SET", key.as_bytes(), value]).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<u64> {
        let reply = self.call(&[b"DEL", key.as_bytes()]).await?;
        Ok(reply.as_integer()?.max(0) as u64)
    }

    async fn keys(&self, pattern: &str) -> CacheResult<Vec<String>> {
        let reply = self.call(&[b"KEYS", pattern.as_bytes()]).await?;
        let mut keys = Vec::new();
        for item in reply.as_array()? {
            if let Some(key) = item.as_string()? {
                keys.push(key);
            }
        }
        Ok(keys)
    }

    async fn ping(&self) -> CacheResult<bool> {
        let reply = self.call(&[b"PING"]).await?;
        Ok(matches!(reply, RespValue::SimpleString(ref s) if s == "PONG"))
    }

    async fn reconnect(&self) -> CacheResult<()> {
        let mut guard = self.conn.lock().await;
        *guard = None;
        debug!("Cache: reconnecting to {}", self.config.endpoint());
        *guard = Some(Connection::open(&self.config).await?);
        Ok(())
    }

    fn endpoint(&self) -> String {
        self.config.endpoint()
    }
}
