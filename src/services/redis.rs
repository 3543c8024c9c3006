//! Redis-backed visit store

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use redis::{aio::MultiplexedConnection, AsyncCommands, Client, RedisError, RedisResult};
use tokio::sync::RwLock;

use crate::{
    config::RedisConfig,
    error::{AppError, AppResult},
};

use super::store::VisitStore;

/// Capped linear reconnect delay: `min(attempt * step, cap)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    step: Duration,
    cap: Duration,
}

impl Backoff {
    pub fn new(step_ms: u64, cap_ms: u64) -> Self {
        Self {
            step: Duration::from_millis(step_ms),
            cap: Duration::from_millis(cap_ms),
        }
    }

    /// Delay before retry number `attempt` (1-based)
    pub fn delay(&self, attempt: u32) -> Duration {
        self.step.saturating_mul(attempt).min(self.cap)
    }
}

#[derive(Clone)]
pub struct RedisService {
    client: Client,
    conn: Arc<RwLock<MultiplexedConnection>>,
    reconnecting: Arc<AtomicBool>,
    backoff: Backoff,
}

impl RedisService {
    /// Connect to Redis, retrying with backoff up to `connect_attempts` times
    pub async fn new(config: &RedisConfig) -> AppResult<Self> {
        let client = Client::open(config.connection_url())
            .map_err(|e| AppError::Internal(format!("Failed to create Redis client: {}", e)))?;
        let backoff = Backoff::new(config.retry_step_ms, config.retry_cap_ms);

        let mut conn =
            connect_with_backoff(&client, backoff, Some(config.connect_attempts.max(1))).await?;

        // Test connection
        redis::cmd("PING")
            .query_async::<_, String>(&mut conn)
            .await
            .map_err(|e| AppError::Unavailable(format!("Redis connection test failed: {}", e)))?;

        tracing::info!("[Redis] Connected successfully");

        Ok(Self {
            client,
            conn: Arc::new(RwLock::new(conn)),
            reconnecting: Arc::new(AtomicBool::new(false)),
            backoff,
        })
    }

    async fn connection(&self) -> MultiplexedConnection {
        self.conn.read().await.clone()
    }

    /// Map a command result, starting a reconnect when the connection itself failed.
    /// The failed command is not retried.
    fn check<T>(&self, result: RedisResult<T>) -> AppResult<T> {
        result.map_err(|e| {
            if is_connection_error(&e) {
                self.reconnect_in_background(&e);
            }
            AppError::Cache(e)
        })
    }

    fn reconnect_in_background(&self, cause: &RedisError) {
        if self.reconnecting.swap(true, Ordering::AcqRel) {
            return;
        }
        tracing::error!(error = %cause, "[Redis] Connection error");

        let this = self.clone();
        tokio::spawn(async move {
            match connect_with_backoff(&this.client, this.backoff, None).await {
                Ok(conn) => {
                    *this.conn.write().await = conn;
                    tracing::info!("[Redis] Reconnected");
                }
                Err(e) => tracing::error!(error = %e, "[Redis] Reconnect abandoned"),
            }
            this.reconnecting.store(false, Ordering::Release);
        });
    }
}

fn is_connection_error(err: &RedisError) -> bool {
    err.is_io_error() || err.is_connection_dropped() || err.is_connection_refusal() || err.is_timeout()
}

/// Open a multiplexed connection, sleeping `backoff.delay(n)` after the n-th failure.
/// `max_attempts = None` retries forever.
async fn connect_with_backoff(
    client: &Client,
    backoff: Backoff,
    max_attempts: Option<u32>,
) -> AppResult<MultiplexedConnection> {
    let mut attempt = 0u32;
    loop {
        attempt = attempt.saturating_add(1);
        match client.get_multiplexed_async_connection().await {
            Ok(conn) => return Ok(conn),
            Err(e) => {
                if max_attempts.is_some_and(|max| attempt >= max) {
                    return Err(AppError::Unavailable(format!(
                        "Failed to connect to Redis after {} attempts: {}",
                        attempt, e
                    )));
                }
                let delay = backoff.delay(attempt);
                tracing::warn!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "[Redis] Connection error, retrying"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[async_trait]
impl VisitStore for RedisService {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        let mut conn = self.connection().await;
        self.check(conn.get::<_, Option<String>>(key).await)
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> AppResult<()> {
        let mut conn = self.connection().await;
        self.check(conn.set_ex::<_, _, ()>(key, value, ttl_secs).await)
    }

    async fn set_nx_ex(&self, key: &str, value: &str, ttl_secs: u64) -> AppResult<bool> {
        let mut conn = self.connection().await;
        // Nil reply when the key already exists
        let reply = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("EX")
            .arg(ttl_secs)
            .query_async::<_, Option<String>>(&mut conn)
            .await;
        self.check(reply).map(|ok| ok.is_some())
    }

    async fn incr(&self, key: &str) -> AppResult<i64> {
        let mut conn = self.connection().await;
        self.check(conn.incr::<_, _, i64>(key, 1).await)
    }

    async fn ping(&self) -> AppResult<()> {
        let mut conn = self.connection().await;
        self.check(redis::cmd("PING").query_async::<_, String>(&mut conn).await)
            .map(|_| ())
    }
}
