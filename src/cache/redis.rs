//! Redis backend
//!
//! Issues one Redis command per primitive over a multiplexed connection.
//! The connection is opened by `connect()`, or lazily by the first operation
//! while the backend is still disconnected.

use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use redis::aio::MultiplexedConnection;
use redis::{Client, RedisError, RedisResult};
use tracing::{debug, info, warn};

use crate::cache::glob::escape_redis_glob;
use crate::cache::ConnectionState;
use crate::error::{CacheError, Result};

/// Keys requested per `SCAN` round trip.
const SCAN_COUNT: usize = 200;

enum Link {
    Disconnected,
    Connecting,
    Ready(MultiplexedConnection),
    Failed(String),
}

struct RedisInner {
    client: Client,
    connect_timeout: Duration,
    link: Mutex<Link>,
    /// Serializes connection attempts
    connect_lock: tokio::sync::Mutex<()>,
}

// == Redis Backend ==
/// Remote backend. Cloning shares the connection.
#[derive(Clone)]
pub struct RedisBackend {
    inner: Arc<RedisInner>,
}

impl RedisBackend {
    /// Validates `url` without connecting.
    pub fn new(url: &str, connect_timeout: Duration) -> Result<Self> {
        let client = Client::open(url)
            .map_err(|e| CacheError::Config(format!("invalid redis url: {}", e)))?;

        Ok(Self {
            inner: Arc::new(RedisInner {
                client,
                connect_timeout,
                link: Mutex::new(Link::Disconnected),
                connect_lock: tokio::sync::Mutex::new(()),
            }),
        })
    }

    fn link(&self) -> MutexGuard<'_, Link> {
        self.inner
            .link
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn set_link(&self, link: Link) {
        *self.link() = link;
    }

    pub fn state(&self) -> ConnectionState {
        match &*self.link() {
            Link::Disconnected => ConnectionState::Disconnected,
            Link::Connecting => ConnectionState::Connecting,
            Link::Ready(_) => ConnectionState::Ready,
            Link::Failed(reason) => ConnectionState::Failed(reason.clone()),
        }
    }

    /// Opens the connection. Idempotent once ready; retries from `Failed`.
    pub async fn connect(&self) -> Result<()> {
        self.establish(true).await
    }

    async fn establish(&self, explicit: bool) -> Result<()> {
        let _attempt = self.inner.connect_lock.lock().await;

        match &*self.link() {
            Link::Ready(_) => return Ok(()),
            Link::Failed(reason) if !explicit => {
                return Err(CacheError::Connection(format!(
                    "redis connection failed: {}",
                    reason
                )))
            }
            _ => {}
        }
        self.set_link(Link::Connecting);
        debug!(timeout_ms = self.inner.connect_timeout.as_millis() as u64, "connecting to redis");

        let attempt = tokio::time::timeout(
            self.inner.connect_timeout,
            self.inner.client.get_multiplexed_async_connection(),
        )
        .await;

        match attempt {
            Ok(Ok(conn)) => {
                self.set_link(Link::Ready(conn));
                info!("Redis connection ready");
                Ok(())
            }
            Ok(Err(e)) => {
                let reason = e.to_string();
                warn!(error = %reason, "Redis connection failed");
                self.set_link(Link::Failed(reason.clone()));
                Err(CacheError::Connection(reason))
            }
            Err(_) => {
                let reason = format!(
                    "timed out after {}ms",
                    self.inner.connect_timeout.as_millis()
                );
                warn!(error = %reason, "Redis connection failed");
                self.set_link(Link::Failed(reason.clone()));
                Err(CacheError::Connection(reason))
            }
        }
    }

    async fn connection(&self) -> Result<MultiplexedConnection> {
        if let Link::Ready(conn) = &*self.link() {
            return Ok(conn.clone());
        }

        self.establish(false).await?;

        match &*self.link() {
            Link::Ready(conn) => Ok(conn.clone()),
            _ => Err(CacheError::Connection("redis connection not ready".to_string())),
        }
    }

    /// Runs one command, marking the link failed if the connection dropped.
    async fn run<T, F, Fut>(&self, key: &str, op: F) -> Result<T>
    where
        F: FnOnce(MultiplexedConnection) -> Fut,
        Fut: Future<Output = RedisResult<T>>,
    {
        let conn = self.connection().await?;
        op(conn).await.map_err(|err| self.on_error(key, err))
    }

    fn on_error(&self, key: &str, err: RedisError) -> CacheError {
        if err.is_connection_dropped() || err.is_io_error() {
            warn!(key = %key, error = %err, "Redis connection lost");
            self.set_link(Link::Failed(err.to_string()));
        }
        CacheError::from_redis(key, err)
    }

    pub async fn set(&self, key: &str, value: String, ttl: Option<u64>) -> Result<()> {
        self.run(key, |mut conn: MultiplexedConnection| async move {
            let mut cmd = redis::cmd("SET");
            cmd.arg(key).arg(value);
            if let Some(seconds) = ttl {
                cmd.arg("EX").arg(seconds);
            }
            cmd.query_async(&mut conn).await
        })
        .await
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        self.run(key, |mut conn: MultiplexedConnection| async move {
            redis::cmd("GET").arg(key).query_async(&mut conn).await
        })
        .await
    }

    pub async fn del(&self, key: &str) -> Result<u64> {
        self.run(key, |mut conn: MultiplexedConnection| async move {
            redis::cmd("DEL").arg(key).query_async(&mut conn).await
        })
        .await
    }

    pub async fn exists(&self, key: &str) -> Result<bool> {
        self.run(key, |mut conn: MultiplexedConnection| async move {
            redis::cmd("EXISTS").arg(key).query_async(&mut conn).await
        })
        .await
    }

    pub async fn expire(&self, key: &str, seconds: i64) -> Result<bool> {
        self.run(key, |mut conn: MultiplexedConnection| async move {
            redis::cmd("EXPIRE")
                .arg(key)
                .arg(seconds)
                .query_async(&mut conn)
                .await
        })
        .await
    }

    pub async fn ttl(&self, key: &str) -> Result<i64> {
        self.run(key, |mut conn: MultiplexedConnection| async move {
            redis::cmd("TTL").arg(key).query_async(&mut conn).await
        })
        .await
    }

    pub async fn incr_by(&self, key: &str, delta: i64) -> Result<i64> {
        self.run(key, |mut conn: MultiplexedConnection| async move {
            redis::cmd("INCRBY")
                .arg(key)
                .arg(delta)
                .query_async(&mut conn)
                .await
        })
        .await
    }

    pub async fn mset(&self, pairs: Vec<(String, String)>) -> Result<()> {
        let Some((first, _)) = pairs.first() else {
            return Ok(());
        };
        let first = first.clone();

        let mut cmd = redis::cmd("MSET");
        for (key, value) in &pairs {
            cmd.arg(key).arg(value);
        }
        self.run(&first, |mut conn: MultiplexedConnection| async move {
            cmd.query_async(&mut conn).await
        })
        .await
    }

    pub async fn mget(&self, keys: &[String]) -> Result<Vec<Option<String>>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        self.run(&keys[0], |mut conn: MultiplexedConnection| async move {
            redis::cmd("MGET").arg(keys).query_async(&mut conn).await
        })
        .await
    }

    pub async fn hset(&self, key: &str, field: &str, value: String) -> Result<u64> {
        self.run(key, |mut conn: MultiplexedConnection| async move {
            redis::cmd("HSET")
                .arg(key)
                .arg(field)
                .arg(value)
                .query_async(&mut conn)
                .await
        })
        .await
    }

    pub async fn hget(&self, key: &str, field: &str) -> Result<Option<String>> {
        self.run(key, |mut conn: MultiplexedConnection| async move {
            redis::cmd("HGET")
                .arg(key)
                .arg(field)
                .query_async(&mut conn)
                .await
        })
        .await
    }

    pub async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>> {
        self.run(key, |mut conn: MultiplexedConnection| async move {
            redis::cmd("HGETALL").arg(key).query_async(&mut conn).await
        })
        .await
    }

    pub async fn hdel(&self, key: &str, field: &str) -> Result<u64> {
        self.run(key, |mut conn: MultiplexedConnection| async move {
            redis::cmd("HDEL")
                .arg(key)
                .arg(field)
                .query_async(&mut conn)
                .await
        })
        .await
    }

    /// Iterates with `SCAN … MATCH` rather than `KEYS`. Sorted and deduplicated.
    pub async fn keys(&self, pattern: &str) -> Result<Vec<String>> {
        let escaped = escape_redis_glob(pattern);
        self.run(pattern, |mut conn: MultiplexedConnection| async move {
            let mut cursor: u64 = 0;
            let mut found = BTreeSet::new();
            loop {
                let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                    .arg(cursor)
                    .arg("MATCH")
                    .arg(&escaped)
                    .arg("COUNT")
                    .arg(SCAN_COUNT)
                    .query_async(&mut conn)
                    .await?;
                found.extend(batch);
                if next == 0 {
                    break;
                }
                cursor = next;
            }
            Ok::<_, RedisError>(found.into_iter().collect())
        })
        .await
    }
}
