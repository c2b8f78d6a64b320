//! # Cache Client
//!
//! Typed operation surface over the pooled store connection.
//!
//! Every operation checks out exactly one connection, issues one command,
//! routes any raw error through the classifier, and releases the connection
//! on every exit path. Point lookups report an absent key as `Ok(None)`;
//! the queue-draining operations (`lpop`, `lpop_string`, `llen`, `keys`)
//! absorb the miss into a zero value because "nothing there yet" is their
//! expected steady state.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use redis::{
    Client, Cmd, ConnectionAddr, ConnectionInfo, FromRedisValue, ProtocolVersion,
    RedisConnectionInfo, ToRedisArgs,
};

use crate::classify::{self, Outcome};
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};
use crate::pool::{ConnectionPool, PoolConfig};

/// Pooled client for one logical store target.
///
/// The pool is constructed lazily on first use and shared by all operations
/// on this client; configuration is immutable after construction.
pub struct CacheClient {
    client: Client,
    cfg: CacheConfig,
    pool: OnceLock<Arc<ConnectionPool>>,
}

impl CacheClient {
    /// Create a client for the configured store target.
    ///
    /// Validates the address eagerly; no connection is dialed here.
    pub fn new(cfg: CacheConfig) -> Result<Self> {
        let info = connection_info(&cfg)?;
        let client = Client::open(info).map_err(|e| CacheError::Config {
            addr: cfg.addr.clone(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            client,
            cfg,
            pool: OnceLock::new(),
        })
    }

    /// The active configuration.
    pub fn config(&self) -> &CacheConfig {
        &self.cfg
    }

    fn pool(&self) -> &Arc<ConnectionPool> {
        self.pool.get_or_init(|| {
            ConnectionPool::new(
                self.client.clone(),
                PoolConfig {
                    max_idle: self.cfg.max_idle,
                    max_active: self.cfg.max_active,
                    idle_timeout: self.cfg.idle_timeout,
                    connect_timeout: self.cfg.connect_timeout,
                    response_timeout: self.cfg.read_timeout.max(self.cfg.write_timeout),
                },
            )
        })
    }

    // =========================================================================
    // COMMAND EXECUTOR
    // =========================================================================

    /// Issue one command on a freshly acquired connection and decode the
    /// reply, with a nil reply surfacing as `None`.
    ///
    /// The raw-error path feeds the classifier before any application error
    /// is constructed; errors that invalidate the session mark the connection
    /// broken so the pool closes it instead of reusing it.
    async fn run_opt<T: FromRedisValue>(&self, cmd: Cmd) -> Result<Option<T>> {
        let mut conn = self.pool().acquire().await?;
        let res: redis::RedisResult<Option<T>> = cmd.query_async(conn.as_mut()).await;

        match res {
            Ok(v) => Ok(v),
            Err(e) => {
                if classify::invalidates_connection(&e) {
                    conn.mark_broken();
                }
                match classify::classify(Some(&e)) {
                    Outcome::KeyNotFound => Ok(None),
                    _ => {
                        tracing::warn!(error = %e, "cache command failed");
                        Err(CacheError::internal(e))
                    }
                }
            }
        }
    }

    /// Like [`Self::run_opt`] but folds an absent reply into the zero value.
    async fn run<T: FromRedisValue + Default>(&self, cmd: Cmd) -> Result<T> {
        Ok(self.run_opt(cmd).await?.unwrap_or_default())
    }

    // =========================================================================
    // STRING OPERATIONS
    // =========================================================================

    /// Get the raw bytes at `key`; `Ok(None)` when the key is absent.
    pub async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut cmd = redis::cmd("GET");
        cmd.arg(key);
        self.run_opt(cmd).await
    }

    /// Get the value at `key` decoded as UTF-8 text.
    pub async fn get_string(&self, key: &str) -> Result<Option<String>> {
        let mut cmd = redis::cmd("GET");
        cmd.arg(key);
        self.run_opt(cmd).await
    }

    /// Get the value at `key` decoded as a 64-bit integer.
    pub async fn get_i64(&self, key: &str) -> Result<Option<i64>> {
        let mut cmd = redis::cmd("GET");
        cmd.arg(key);
        self.run_opt(cmd).await
    }

    /// Get the value at `key` decoded as an integer sequence.
    pub async fn get_ints(&self, key: &str) -> Result<Option<Vec<i64>>> {
        let mut cmd = redis::cmd("GET");
        cmd.arg(key);
        self.run_opt(cmd).await
    }

    /// Fetch several keys at once; absent keys come back as `None` in place.
    pub async fn mget(&self, keys: &[&str]) -> Result<Vec<Option<Vec<u8>>>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let mut cmd = redis::cmd("MGET");
        cmd.arg(keys);
        self.run(cmd).await
    }

    /// Set `key` to `value`, expiring after `ttl_secs`; -1 means no expiry.
    pub async fn set(&self, key: &str, value: impl ToRedisArgs, ttl_secs: i64) -> Result<()> {
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value);
        if ttl_secs >= 0 {
            cmd.arg("EX").arg(ttl_secs);
        }
        self.run(cmd).await
    }

    /// Increment the counter at `key`, returning the new value (1 on a
    /// fresh key).
    pub async fn incr(&self, key: &str) -> Result<i64> {
        let mut cmd = redis::cmd("INCR");
        cmd.arg(key);
        self.run(cmd).await
    }

    /// Delete `key`. Deleting an absent key is not an error.
    pub async fn delete(&self, key: &str) -> Result<()> {
        let mut cmd = redis::cmd("DEL");
        cmd.arg(key);
        self.run(cmd).await
    }

    /// Whether `key` exists.
    pub async fn exists(&self, key: &str) -> Result<bool> {
        let mut cmd = redis::cmd("EXISTS");
        cmd.arg(key);
        self.run(cmd).await
    }

    /// Set the time-to-live of `key` in seconds.
    pub async fn expire(&self, key: &str, ttl_secs: i64) -> Result<()> {
        let mut cmd = redis::cmd("EXPIRE");
        cmd.arg(key).arg(ttl_secs);
        self.run(cmd).await
    }

    /// Remaining time-to-live of `key` in seconds; -1 without expiry, -2
    /// when the key is absent.
    pub async fn ttl(&self, key: &str) -> Result<i64> {
        let mut cmd = redis::cmd("TTL");
        cmd.arg(key);
        self.run(cmd).await
    }

    // =========================================================================
    // HASH OPERATIONS
    // =========================================================================

    /// Set one hash field, returning 1 when the field is new.
    pub async fn hset(&self, key: &str, field: &str, value: impl ToRedisArgs) -> Result<i64> {
        let mut cmd = redis::cmd("HSET");
        cmd.arg(key).arg(field).arg(value);
        self.run(cmd).await
    }

    /// Set several hash fields in one command.
    pub async fn hmset<F, V>(&self, key: &str, pairs: &[(F, V)]) -> Result<()>
    where
        F: ToRedisArgs,
        V: ToRedisArgs,
    {
        if pairs.is_empty() {
            return Ok(());
        }
        let mut cmd = redis::cmd("HMSET");
        cmd.arg(key).arg(pairs);
        self.run(cmd).await
    }

    /// Get one hash field; `Ok(None)` when the hash or field is absent.
    pub async fn hget(&self, key: &str, field: &str) -> Result<Option<Vec<u8>>> {
        let mut cmd = redis::cmd("HGET");
        cmd.arg(key).arg(field);
        self.run_opt(cmd).await
    }

    /// Get one hash field decoded as UTF-8 text.
    pub async fn hget_string(&self, key: &str, field: &str) -> Result<Option<String>> {
        let mut cmd = redis::cmd("HGET");
        cmd.arg(key).arg(field);
        self.run_opt(cmd).await
    }

    /// Increment a hash field, returning the new value.
    pub async fn hincrby(&self, key: &str, field: &str, delta: i64) -> Result<i64> {
        let mut cmd = redis::cmd("HINCRBY");
        cmd.arg(key).arg(field).arg(delta);
        self.run(cmd).await
    }

    /// Fetch several hash fields; absent fields come back as `None` in place.
    pub async fn hmget(&self, key: &str, fields: &[&str]) -> Result<Vec<Option<Vec<u8>>>> {
        if fields.is_empty() {
            return Ok(Vec::new());
        }
        let mut cmd = redis::cmd("HMGET");
        cmd.arg(key).arg(fields);
        self.run(cmd).await
    }

    /// All fields and values of the hash as a flat field/value alternation;
    /// empty when the hash is absent.
    pub async fn hgetall(&self, key: &str) -> Result<Vec<Vec<u8>>> {
        let mut cmd = redis::cmd("HGETALL");
        cmd.arg(key);
        self.run(cmd).await
    }

    /// All fields and values of the hash as a string map; empty when the
    /// hash is absent.
    pub async fn hgetall_map(&self, key: &str) -> Result<HashMap<String, String>> {
        let mut cmd = redis::cmd("HGETALL");
        cmd.arg(key);
        self.run(cmd).await
    }

    // =========================================================================
    // SORTED SET OPERATIONS
    // =========================================================================

    /// Add a member with the given score, returning the number of members
    /// newly added (0 on a score update).
    pub async fn zadd(&self, key: &str, score: f64, member: impl ToRedisArgs) -> Result<i64> {
        let mut cmd = redis::cmd("ZADD");
        cmd.arg(key).arg(score).arg(member);
        self.run(cmd).await
    }

    /// Increment a member's score by an integer delta, returning the new
    /// score.
    pub async fn zincrby(&self, key: &str, delta: i64, member: impl ToRedisArgs) -> Result<f64> {
        let mut cmd = redis::cmd("ZINCRBY");
        cmd.arg(key).arg(delta).arg(member);
        self.run(cmd).await
    }

    /// Increment a member's score by a float delta, returning the new score
    /// at IEEE double precision.
    pub async fn zincrby_float(
        &self,
        key: &str,
        delta: f64,
        member: impl ToRedisArgs,
    ) -> Result<f64> {
        let mut cmd = redis::cmd("ZINCRBY");
        cmd.arg(key).arg(delta).arg(member);
        self.run(cmd).await
    }

    /// Members between the given ranks in ascending score order, optionally
    /// interleaved with their scores.
    pub async fn zrange(
        &self,
        key: &str,
        start: i64,
        stop: i64,
        withscores: bool,
    ) -> Result<Vec<String>> {
        self.run(zrange_cmd("ZRANGE", key, start, stop, withscores))
            .await
    }

    /// [`Self::zrange`] with members decoded as integers.
    pub async fn zrange_ints(
        &self,
        key: &str,
        start: i64,
        stop: i64,
        withscores: bool,
    ) -> Result<Vec<i64>> {
        self.run(zrange_cmd("ZRANGE", key, start, stop, withscores))
            .await
    }

    /// Members between the given ranks in descending score order.
    pub async fn zrevrange(
        &self,
        key: &str,
        start: i64,
        stop: i64,
        withscores: bool,
    ) -> Result<Vec<String>> {
        self.run(zrange_cmd("ZREVRANGE", key, start, stop, withscores))
            .await
    }

    /// [`Self::zrevrange`] with members decoded as integers.
    pub async fn zrevrange_ints(
        &self,
        key: &str,
        start: i64,
        stop: i64,
        withscores: bool,
    ) -> Result<Vec<i64>> {
        self.run(zrange_cmd("ZREVRANGE", key, start, stop, withscores))
            .await
    }

    /// Members with scores in `[min, max]`, ascending, paged by
    /// offset + count after score filtering.
    pub async fn zrangebyscore(
        &self,
        key: &str,
        min: f64,
        max: f64,
        withscores: bool,
        offset: i64,
        count: i64,
    ) -> Result<Vec<String>> {
        self.run(zrange_by_score_cmd(
            "ZRANGEBYSCORE",
            key,
            min,
            max,
            withscores,
            offset,
            count,
        ))
        .await
    }

    /// [`Self::zrangebyscore`] with members decoded as integers.
    pub async fn zrangebyscore_ints(
        &self,
        key: &str,
        min: f64,
        max: f64,
        withscores: bool,
        offset: i64,
        count: i64,
    ) -> Result<Vec<i64>> {
        self.run(zrange_by_score_cmd(
            "ZRANGEBYSCORE",
            key,
            min,
            max,
            withscores,
            offset,
            count,
        ))
        .await
    }

    /// Members with scores in `[min, max]`, descending, paged by
    /// offset + count after score filtering.
    pub async fn zrevrangebyscore(
        &self,
        key: &str,
        max: f64,
        min: f64,
        withscores: bool,
        offset: i64,
        count: i64,
    ) -> Result<Vec<String>> {
        self.run(zrange_by_score_cmd(
            "ZREVRANGEBYSCORE",
            key,
            max,
            min,
            withscores,
            offset,
            count,
        ))
        .await
    }

    /// [`Self::zrevrangebyscore`] with members decoded as integers.
    pub async fn zrevrangebyscore_ints(
        &self,
        key: &str,
        max: f64,
        min: f64,
        withscores: bool,
        offset: i64,
        count: i64,
    ) -> Result<Vec<i64>> {
        self.run(zrange_by_score_cmd(
            "ZREVRANGEBYSCORE",
            key,
            max,
            min,
            withscores,
            offset,
            count,
        ))
        .await
    }

    /// Score of `member`; `Ok(None)` when the key or member is absent.
    pub async fn zscore(&self, key: &str, member: impl ToRedisArgs) -> Result<Option<f64>> {
        let mut cmd = redis::cmd("ZSCORE");
        cmd.arg(key).arg(member);
        self.run_opt(cmd).await
    }

    /// Ascending rank of `member` (0-based); `Ok(None)` when absent.
    pub async fn zrank(&self, key: &str, member: impl ToRedisArgs) -> Result<Option<i64>> {
        let mut cmd = redis::cmd("ZRANK");
        cmd.arg(key).arg(member);
        self.run_opt(cmd).await
    }

    /// Descending rank of `member` (0-based); `Ok(None)` when absent.
    pub async fn zrevrank(&self, key: &str, member: impl ToRedisArgs) -> Result<Option<i64>> {
        let mut cmd = redis::cmd("ZREVRANK");
        cmd.arg(key).arg(member);
        self.run_opt(cmd).await
    }

    /// Cardinality of the sorted set; 0 when absent.
    pub async fn zcard(&self, key: &str) -> Result<i64> {
        let mut cmd = redis::cmd("ZCARD");
        cmd.arg(key);
        self.run(cmd).await
    }

    // =========================================================================
    // SET OPERATIONS
    // =========================================================================

    /// Add a member to the set, returning the number newly added.
    pub async fn sadd(&self, key: &str, member: impl ToRedisArgs) -> Result<i64> {
        let mut cmd = redis::cmd("SADD");
        cmd.arg(key).arg(member);
        self.run(cmd).await
    }

    // =========================================================================
    // LIST OPERATIONS
    // =========================================================================

    /// Append one value to the list at `key`.
    pub async fn rpush(&self, key: &str, value: impl ToRedisArgs) -> Result<()> {
        let mut cmd = redis::cmd("RPUSH");
        cmd.arg(key).arg(value);
        self.run(cmd).await
    }

    /// Append several values to the list at `key` in one command.
    pub async fn rpush_many<V: ToRedisArgs>(&self, key: &str, values: &[V]) -> Result<()> {
        if values.is_empty() {
            return Ok(());
        }
        let mut cmd = redis::cmd("RPUSH");
        cmd.arg(key).arg(values);
        self.run(cmd).await
    }

    /// Elements between the given indices in list order; empty when the
    /// list is absent.
    pub async fn lrange(&self, key: &str, start: i64, stop: i64) -> Result<Vec<Vec<u8>>> {
        let mut cmd = redis::cmd("LRANGE");
        cmd.arg(key).arg(start).arg(stop);
        self.run(cmd).await
    }

    /// Remove all occurrences of `value` from the list.
    pub async fn lrem(&self, key: &str, value: impl ToRedisArgs) -> Result<()> {
        let mut cmd = redis::cmd("LREM");
        cmd.arg(key).arg(0).arg(value);
        self.run(cmd).await
    }

    /// Pop the head of the list as an integer.
    ///
    /// Draining an empty or absent list is the expected steady state here,
    /// so the miss is absorbed: the result is 0 with no error.
    pub async fn lpop(&self, key: &str) -> Result<i64> {
        let mut cmd = redis::cmd("LPOP");
        cmd.arg(key);
        self.run(cmd).await
    }

    /// Pop the head of the list as text; empty string on an empty or
    /// absent list, with no error.
    pub async fn lpop_string(&self, key: &str) -> Result<String> {
        let mut cmd = redis::cmd("LPOP");
        cmd.arg(key);
        self.run(cmd).await
    }

    /// Length of the list; 0 on an absent list, with no error.
    pub async fn llen(&self, key: &str) -> Result<i64> {
        let mut cmd = redis::cmd("LLEN");
        cmd.arg(key);
        self.run(cmd).await
    }

    // =========================================================================
    // KEY-SPACE OPERATIONS
    // =========================================================================

    /// Keys matching the glob `pattern`; empty when nothing matches, with
    /// no error.
    pub async fn keys(&self, pattern: &str) -> Result<Vec<String>> {
        let mut cmd = redis::cmd("KEYS");
        cmd.arg(pattern);
        self.run(cmd).await
    }
}

fn zrange_cmd(verb: &str, key: &str, start: i64, stop: i64, withscores: bool) -> Cmd {
    let mut cmd = redis::cmd(verb);
    cmd.arg(key).arg(start).arg(stop);
    if withscores {
        cmd.arg("WITHSCORES");
    }
    cmd
}

fn zrange_by_score_cmd(
    verb: &str,
    key: &str,
    first: f64,
    second: f64,
    withscores: bool,
    offset: i64,
    count: i64,
) -> Cmd {
    let mut cmd = redis::cmd(verb);
    cmd.arg(key).arg(first).arg(second);
    if withscores {
        cmd.arg("WITHSCORES");
    }
    cmd.arg("LIMIT").arg(offset).arg(count);
    cmd
}

fn connection_info(cfg: &CacheConfig) -> Result<ConnectionInfo> {
    let (host, port) = cfg
        .addr
        .rsplit_once(':')
        .ok_or_else(|| CacheError::Config {
            addr: cfg.addr.clone(),
            reason: "expected host:port".to_string(),
        })?;
    let port: u16 = port.parse().map_err(|_| CacheError::Config {
        addr: cfg.addr.clone(),
        reason: "invalid port".to_string(),
    })?;

    Ok(ConnectionInfo {
        addr: ConnectionAddr::Tcp(host.to_string(), port),
        redis: RedisConnectionInfo {
            db: cfg.db.unwrap_or(0),
            username: None,
            password: cfg.password.clone(),
            protocol: ProtocolVersion::RESP2,
            ..RedisConnectionInfo::default()
        },
    })
}

/// Shared cache client wrapper.
pub type SharedCacheClient = Arc<CacheClient>;

/// Create a shared cache client.
pub fn shared_cache(client: CacheClient) -> SharedCacheClient {
    Arc::new(client)
}
