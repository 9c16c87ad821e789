//! Redis cache backend implementation.

use super::{CacheBackend, KeyTtl, MAX_TTL};
use crate::error::{Error, Result};
use deadpool_redis::redis::{cmd, AsyncCommands, RedisError};
use deadpool_redis::{Config as PoolConfig, Connection, Pool, Runtime};
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

/// Pool statistics information.
#[derive(Debug, Clone)]
pub struct PoolStats {
    pub connections: u32,
    pub idle_connections: u32,
}

/// Default Redis connection pool size.
/// Formula: (CPU cores × 2) + 1
/// For 8-core systems: 16 connections is optimal
/// Override with REDIS_POOL_SIZE environment variable
const DEFAULT_POOL_SIZE: u32 = 16;

/// Keys fetched per SCAN round-trip.
const SCAN_BATCH: u32 = 100;

/// Configuration for Redis backend.
#[derive(Clone, Debug)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub database: u32,
    pub pool_size: u32,
    pub connection_timeout: Duration,
}

impl Default for RedisConfig {
    fn default() -> Self {
        RedisConfig {
            host: "localhost".to_string(),
            port: 6379,
            username: None,
            password: None,
            database: 0,
            pool_size: DEFAULT_POOL_SIZE,
            connection_timeout: Duration::from_secs(5),
        }
    }
}

impl RedisConfig {
    /// Build Redis connection string.
    pub fn connection_string(&self) -> String {
        if let Some(password) = &self.password {
            if let Some(username) = &self.username {
                format!(
                    "redis://{}:{}@{}:{}/{}",
                    username, password, self.host, self.port, self.database
                )
            } else {
                format!(
                    "redis://default:{}@{}:{}/{}",
                    password, self.host, self.port, self.database
                )
            }
        } else {
            format!("redis://{}:{}/{}", self.host, self.port, self.database)
        }
    }

    /// Read configuration from the process environment.
    ///
    /// | Variable          | Default     |
    /// |-------------------|-------------|
    /// | `REDIS_HOST`      | `localhost` |
    /// | `REDIS_PORT`      | `6379`      |
    /// | `REDIS_USERNAME`  | unset       |
    /// | `REDIS_PASSWORD`  | unset       |
    /// | `REDIS_DB`        | `0`         |
    /// | `REDIS_POOL_SIZE` | `16`        |
    ///
    /// # Errors
    /// Returns `Error::ConfigError` when a numeric variable does not parse.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = RedisConfig::default();
        let config = RedisConfig {
            host: lookup("REDIS_HOST").unwrap_or(defaults.host),
            port: parse_var(&lookup, "REDIS_PORT", defaults.port)?,
            username: lookup("REDIS_USERNAME").filter(|s| !s.is_empty()),
            password: lookup("REDIS_PASSWORD").filter(|s| !s.is_empty()),
            database: parse_var(&lookup, "REDIS_DB", defaults.database)?,
            pool_size: parse_var(&lookup, "REDIS_POOL_SIZE", defaults.pool_size)?,
            connection_timeout: defaults.connection_timeout,
        };

        debug!(
            "✓ Redis config from environment: {}:{} db {} (pool size: {})",
            config.host, config.port, config.database, config.pool_size
        );
        Ok(config)
    }
}

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: T,
) -> Result<T> {
    match lookup(name) {
        Some(raw) => raw.trim().parse::<T>().map_err(|_| {
            Error::ConfigError(format!("{} must be a non-negative number, got {:?}", name, raw))
        }),
        None => Ok(default),
    }
}

/// Map a failed command, keeping the `WRONGTYPE` marker at the front.
fn command_error(op: &str, key: &str, e: RedisError) -> Error {
    let detail = e.to_string();
    if detail.contains("WRONGTYPE") {
        Error::BackendError(format!("WRONGTYPE Redis {} failed for key {}: {}", op, key, detail))
    } else {
        Error::BackendError(format!("Redis {} failed for key {}: {}", op, key, detail))
    }
}

/// Millisecond count for PX/PEXPIRE, within `1..=MAX_TTL` (Redis rejects 0 and
/// deadlines past its clock range).
fn millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.min(MAX_TTL).as_millis())
        .unwrap_or(u64::MAX)
        .max(1)
}

/// Redis backend with connection pooling and async operations.
///
/// Uses deadpool for efficient async resource management and pooling.
///
/// # Example
///
/// ```no_run
/// # use shelf_cache::backend::{RedisBackend, RedisConfig, CacheBackend};
/// # use shelf_cache::error::Result;
/// # async fn example() -> Result<()> {
/// let config = RedisConfig::from_env()?;
/// let backend = RedisBackend::new(config).await?;
///
/// backend.set("book::7", b"snapshot".to_vec(), None).await?;
/// let value = backend.get("book::7").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct RedisBackend {
    pool: Pool,
}

impl RedisBackend {
    /// Create new Redis backend from configuration.
    ///
    /// # Errors
    /// Returns `Err` if pool creation fails.
    pub async fn new(config: RedisConfig) -> Result<Self> {
        let pool = Self::build_pool(
            &config.connection_string(),
            config.pool_size,
            Some(config.connection_timeout),
        )?;

        info!(
            "✓ Redis backend initialized: {}:{} (db {}, pool size: {})",
            config.host, config.port, config.database, config.pool_size
        );

        Ok(RedisBackend { pool })
    }

    /// Create from connection string directly.
    ///
    /// Pool size is determined by:
    /// 1. `REDIS_POOL_SIZE` environment variable (if set)
    /// 2. `DEFAULT_POOL_SIZE` constant (16)
    ///
    /// # Errors
    /// Returns `Err` if pool creation fails or `REDIS_POOL_SIZE` is not a number.
    pub async fn from_connection_string(conn_str: &str) -> Result<Self> {
        let pool_size = parse_var(
            &|name: &str| std::env::var(name).ok(),
            "REDIS_POOL_SIZE",
            DEFAULT_POOL_SIZE,
        )?;
        let pool = Self::build_pool(conn_str, pool_size, None)?;

        info!(
            "✓ Redis backend initialized from connection string (pool size: {})",
            pool_size
        );

        Ok(RedisBackend { pool })
    }

    fn build_pool(conn_str: &str, pool_size: u32, timeout: Option<Duration>) -> Result<Pool> {
        let mut cfg = PoolConfig::from_url(conn_str);
        let mut pool_cfg = deadpool_redis::PoolConfig::new(pool_size as usize);
        if timeout.is_some() {
            pool_cfg.timeouts.wait = timeout;
            pool_cfg.timeouts.create = timeout;
        }
        cfg.pool = Some(pool_cfg);

        cfg.create_pool(Some(Runtime::Tokio1))
            .map_err(|e| Error::BackendError(format!("Failed to create Redis pool: {}", e)))
    }

    /// Get current pool statistics.
    pub fn pool_stats(&self) -> PoolStats {
        let status = self.pool.status();
        PoolStats {
            connections: status.size as u32,
            idle_connections: status.available as u32,
        }
    }

    async fn conn(&self) -> Result<Connection> {
        self.pool
            .get()
            .await
            .map_err(|e| Error::BackendError(format!("Failed to get Redis connection: {}", e)))
    }
}

impl CacheBackend for RedisBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.conn().await?;

        let value: Option<Vec<u8>> = conn
            .get(key)
            .await
            .map_err(|e| command_error("GET", key, e))?;

        if value.is_some() {
            debug!("✓ Redis GET {} -> HIT", key);
        } else {
            debug!("✓ Redis GET {} -> MISS", key);
        }

        Ok(value)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()> {
        let mut conn = self.conn().await?;

        match ttl {
            Some(duration) => {
                cmd("SET")
                    .arg(key)
                    .arg(value)
                    .arg("PX")
                    .arg(millis(duration))
                    .query_async::<()>(&mut *conn)
                    .await
                    .map_err(|e| command_error("SET PX", key, e))?;
                debug!("✓ Redis SET {} (TTL: {:?})", key, duration);
            }
            None => {
                conn.set::<_, _, ()>(key, value)
                    .await
                    .map_err(|e| command_error("SET", key, e))?;
                debug!("✓ Redis SET {}", key);
            }
        }

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn().await?;

        let removed: u64 = conn
            .del(key)
            .await
            .map_err(|e| command_error("DEL", key, e))?;

        debug!("✓ Redis DELETE {} (existed: {})", key, removed > 0);
        Ok(removed > 0)
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn().await?;

        let exists: bool = conn
            .exists(key)
            .await
            .map_err(|e| command_error("EXISTS", key, e))?;

        Ok(exists)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        let mut conn = self.conn().await?;

        let applied: i64 = cmd("PEXPIRE")
            .arg(key)
            .arg(millis(ttl))
            .query_async(&mut *conn)
            .await
            .map_err(|e| command_error("PEXPIRE", key, e))?;

        debug!("✓ Redis EXPIRE {} (TTL: {:?}, applied: {})", key, ttl, applied == 1);
        Ok(applied == 1)
    }

    async fn ttl(&self, key: &str) -> Result<KeyTtl> {
        let mut conn = self.conn().await?;

        let reply: i64 = cmd("PTTL")
            .arg(key)
            .query_async(&mut *conn)
            .await
            .map_err(|e| command_error("PTTL", key, e))?;

        Ok(KeyTtl::from_reply(reply, Duration::from_millis(1)))
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>> {
        let mut conn = self.conn().await?;
        let mut cursor: u64 = 0;
        let mut keys = Vec::new();

        // SCAN instead of KEYS so large keyspaces do not block the server.
        loop {
            let (next, batch): (u64, Vec<String>) = cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut *conn)
                .await
                .map_err(|e| command_error("SCAN", pattern, e))?;

            keys.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }

        // SCAN may report a key more than once.
        keys.sort();
        keys.dedup();

        debug!("✓ Redis SCAN {} -> {} keys", pattern, keys.len());
        Ok(keys)
    }

    async fn mdelete(&self, keys: &[&str]) -> Result<u64> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn().await?;

        let removed: u64 = conn
            .del(keys)
            .await
            .map_err(|e| Error::BackendError(format!("Redis DEL (bulk) failed: {}", e)))?;

        debug!("✓ Redis MDELETE {} keys ({} existed)", keys.len(), removed);
        Ok(removed)
    }

    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64> {
        let mut conn = self.conn().await?;

        let next: i64 = cmd("INCRBY")
            .arg(key)
            .arg(delta)
            .query_async(&mut *conn)
            .await
            .map_err(|e| command_error("INCRBY", key, e))?;

        debug!("✓ Redis INCRBY {} {} -> {}", key, delta, next);
        Ok(next)
    }

    async fn hset(&self, key: &str, field: &str, value: Vec<u8>) -> Result<()> {
        let mut conn = self.conn().await?;

        cmd("HSET")
            .arg(key)
            .arg(field)
            .arg(value)
            .query_async::<()>(&mut *conn)
            .await
            .map_err(|e| command_error("HSET", key, e))?;

        debug!("✓ Redis HSET {} {}", key, field);
        Ok(())
    }

    async fn hset_all(&self, key: &str, fields: Vec<(String, Vec<u8>)>) -> Result<()> {
        if fields.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn().await?;
        let count = fields.len();

        let mut command = cmd("HSET");
        command.arg(key);
        for (field, value) in fields {
            command.arg(field).arg(value);
        }
        command
            .query_async::<()>(&mut *conn)
            .await
            .map_err(|e| command_error("HSET", key, e))?;

        debug!("✓ Redis HSET {} ({} fields)", key, count);
        Ok(())
    }

    async fn hget(&self, key: &str, field: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.conn().await?;

        cmd("HGET")
            .arg(key)
            .arg(field)
            .query_async(&mut *conn)
            .await
            .map_err(|e| command_error("HGET", key, e))
    }

    async fn hget_all(&self, key: &str) -> Result<HashMap<String, Vec<u8>>> {
        let mut conn = self.conn().await?;

        cmd("HGETALL")
            .arg(key)
            .query_async(&mut *conn)
            .await
            .map_err(|e| command_error("HGETALL", key, e))
    }

    async fn hdel(&self, key: &str, fields: &[&str]) -> Result<u64> {
        if fields.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn().await?;

        cmd("HDEL")
            .arg(key)
            .arg(fields)
            .query_async(&mut *conn)
            .await
            .map_err(|e| command_error("HDEL", key, e))
    }

    async fn hexists(&self, key: &str, field: &str) -> Result<bool> {
        let mut conn = self.conn().await?;

        cmd("HEXISTS")
            .arg(key)
            .arg(field)
            .query_async(&mut *conn)
            .await
            .map_err(|e| command_error("HEXISTS", key, e))
    }

    async fn rpush(&self, key: &str, values: Vec<Vec<u8>>) -> Result<u64> {
        if values.is_empty() {
            return self.llen(key).await;
        }
        let mut conn = self.conn().await?;

        let len: u64 = cmd("RPUSH")
            .arg(key)
            .arg(values)
            .query_async(&mut *conn)
            .await
            .map_err(|e| command_error("RPUSH", key, e))?;

        debug!("✓ Redis RPUSH {} -> len {}", key, len);
        Ok(len)
    }

    async fn lindex(&self, key: &str, index: i64) -> Result<Option<Vec<u8>>> {
        let mut conn = self.conn().await?;

        cmd("LINDEX")
            .arg(key)
            .arg(index)
            .query_async(&mut *conn)
            .await
            .map_err(|e| command_error("LINDEX", key, e))
    }

    async fn lrange(&self, key: &str, start: i64, stop: i64) -> Result<Vec<Vec<u8>>> {
        let mut conn = self.conn().await?;

        cmd("LRANGE")
            .arg(key)
            .arg(start)
            .arg(stop)
            .query_async(&mut *conn)
            .await
            .map_err(|e| command_error("LRANGE", key, e))
    }

    async fn lrem(&self, key: &str, value: Vec<u8>) -> Result<u64> {
        let mut conn = self.conn().await?;

        // Count 0 removes every occurrence.
        cmd("LREM")
            .arg(key)
            .arg(0)
            .arg(value)
            .query_async(&mut *conn)
            .await
            .map_err(|e| command_error("LREM", key, e))
    }

    async fn llen(&self, key: &str) -> Result<u64> {
        let mut conn = self.conn().await?;

        cmd("LLEN")
            .arg(key)
            .query_async(&mut *conn)
            .await
            .map_err(|e| command_error("LLEN", key, e))
    }

    async fn sadd(&self, key: &str, members: Vec<Vec<u8>>) -> Result<u64> {
        if members.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn().await?;

        cmd("SADD")
            .arg(key)
            .arg(members)
            .query_async(&mut *conn)
            .await
            .map_err(|e| command_error("SADD", key, e))
    }

    async fn smembers(&self, key: &str) -> Result<Vec<Vec<u8>>> {
        let mut conn = self.conn().await?;

        cmd("SMEMBERS")
            .arg(key)
            .query_async(&mut *conn)
            .await
            .map_err(|e| command_error("SMEMBERS", key, e))
    }

    async fn srem(&self, key: &str, members: Vec<Vec<u8>>) -> Result<u64> {
        if members.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn().await?;

        cmd("SREM")
            .arg(key)
            .arg(members)
            .query_async(&mut *conn)
            .await
            .map_err(|e| command_error("SREM", key, e))
    }

    async fn sismember(&self, key: &str, member: Vec<u8>) -> Result<bool> {
        let mut conn = self.conn().await?;

        cmd("SISMEMBER")
            .arg(key)
            .arg(member)
            .query_async(&mut *conn)
            .await
            .map_err(|e| command_error("SISMEMBER", key, e))
    }

    async fn scard(&self, key: &str) -> Result<u64> {
        let mut conn = self.conn().await?;

        cmd("SCARD")
            .arg(key)
            .query_async(&mut *conn)
            .await
            .map_err(|e| command_error("SCARD", key, e))
    }

    async fn zadd(&self, key: &str, member: Vec<u8>, score: f64) -> Result<bool> {
        let mut conn = self.conn().await?;

        let added: u64 = cmd("ZADD")
            .arg(key)
            .arg(score)
            .arg(member)
            .query_async(&mut *conn)
            .await
            .map_err(|e| command_error("ZADD", key, e))?;

        debug!("✓ Redis ZADD {} (score {}, new: {})", key, score, added == 1);
        Ok(added == 1)
    }

    async fn zrange_by_score(&self, key: &str, min: f64, max: f64) -> Result<Vec<Vec<u8>>> {
        let mut conn = self.conn().await?;

        cmd("ZRANGEBYSCORE")
            .arg(key)
            .arg(min)
            .arg(max)
            .query_async(&mut *conn)
            .await
            .map_err(|e| command_error("ZRANGEBYSCORE", key, e))
    }

    async fn zrem(&self, key: &str, members: Vec<Vec<u8>>) -> Result<u64> {
        if members.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn().await?;

        cmd("ZREM")
            .arg(key)
            .arg(members)
            .query_async(&mut *conn)
            .await
            .map_err(|e| command_error("ZREM", key, e))
    }

    async fn zcard(&self, key: &str) -> Result<u64> {
        let mut conn = self.conn().await?;

        cmd("ZCARD")
            .arg(key)
            .query_async(&mut *conn)
            .await
            .map_err(|e| command_error("ZCARD", key, e))
    }

    async fn health_check(&self) -> Result<bool> {
        let mut conn = self.conn().await?;

        let pong: String = cmd("PING")
            .query_async(&mut *conn)
            .await
            .map_err(|e| Error::BackendError(format!("Redis PING failed: {}", e)))?;

        Ok(pong == "PONG" || pong.contains("PONG"))
    }

    async fn clear_all(&self) -> Result<()> {
        let mut conn = self.conn().await?;

        cmd("FLUSHDB")
            .query_async::<()>(&mut *conn)
            .await
            .map_err(|e| Error::BackendError(format!("Redis FLUSHDB failed: {}", e)))?;

        warn!("⚠ Redis FLUSHDB executed - all cache cleared!");
        Ok(())
    }
}
