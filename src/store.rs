// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Conditional-write key-value stores backing the slot limiter.
//!
//! A store only has to offer one primitive: create a key if it is absent,
//! with an absolute expiry. Concurrent creators of the same key must see
//! exactly one `Created`. Expired keys are reclaimed by the store itself.
//!
//! Two backends are provided:
//! - [`MemorySlotStore`]: single-process store, swept periodically
//! - [`RedisSlotStore`]: shared store using `SET NX EXAT`

use crate::clock::Clock;
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::Client;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Outcome of a create-if-absent write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    /// The key did not exist and now does
    Created,
    /// Another writer holds the key
    AlreadyExists,
}

/// Store failures other than the condition check.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("slot store unavailable: {0}")]
    Unavailable(String),

    #[error("slot store backend error: {0}")]
    Backend(String),
}

/// A key-value store with atomic create-if-absent and per-key expiry.
#[async_trait]
pub trait SlotStore: Send + Sync {
    /// Create `key` unless it already exists, expiring at `expires_at`
    /// (Unix seconds).
    async fn create_if_absent(&self, key: &str, expires_at: u64)
        -> Result<CreateOutcome, StoreError>;
}

/// In-process store. Linearizable within one process only.
pub struct MemorySlotStore {
    clock: Arc<dyn Clock>,
    /// Key -> expiry (Unix seconds)
    entries: RwLock<HashMap<String, u64>>,
}

impl MemorySlotStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Whether `key` is present and not yet expired.
    pub async fn contains(&self, key: &str) -> bool {
        let now = self.clock.now_secs();
        self.entries
            .read()
            .await
            .get(key)
            .is_some_and(|expires_at| *expires_at > now)
    }

    /// Number of live (unexpired) keys.
    pub async fn live_keys(&self) -> usize {
        let now = self.clock.now_secs();
        self.entries
            .read()
            .await
            .values()
            .filter(|expires_at| **expires_at > now)
            .count()
    }

    /// Drop expired keys. Returns how many were removed.
    pub async fn sweep(&self) -> usize {
        let now = self.clock.now_secs();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, expires_at| *expires_at > now);
        let removed = before - entries.len();
        if removed > 0 {
            debug!(removed, remaining = entries.len(), "Swept expired slot keys");
        }
        removed
    }
}

#[async_trait]
impl SlotStore for MemorySlotStore {
    async fn create_if_absent(
        &self,
        key: &str,
        expires_at: u64,
    ) -> Result<CreateOutcome, StoreError> {
        let now = self.clock.now_secs();
        let mut entries = self.entries.write().await;

        // An expired key counts as absent even before the sweep reaches it.
        match entries.get(key) {
            Some(existing) if *existing > now => Ok(CreateOutcome::AlreadyExists),
            _ => {
                entries.insert(key.to_string(), expires_at);
                Ok(CreateOutcome::Created)
            }
        }
    }
}

/// Redis-backed store shared by every relay instance.
pub struct RedisSlotStore {
    conn: MultiplexedConnection,
    op_timeout: Duration,
}

impl RedisSlotStore {
    /// Connect to Redis and verify the connection with `PING`.
    pub async fn connect(url: &str, op_timeout: Duration) -> Result<Self, StoreError> {
        info!("Connecting slot store to Redis");

        let client = Client::open(url)
            .map_err(|e| StoreError::Backend(format!("invalid redis url: {e}")))?;

        let mut conn = timeout(op_timeout, client.get_multiplexed_async_connection())
            .await
            .map_err(|_| StoreError::Unavailable("timed out connecting to redis".to_string()))?
            .map_err(|e| StoreError::Unavailable(format!("failed to connect to redis: {e}")))?;

        let pong: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| StoreError::Unavailable(format!("redis ping failed: {e}")))?;
        if pong != "PONG" {
            return Err(StoreError::Backend("redis ping did not return PONG".to_string()));
        }

        info!("Redis slot store ready");
        Ok(Self { conn, op_timeout })
    }
}

#[async_trait]
impl SlotStore for RedisSlotStore {
    async fn create_if_absent(
        &self,
        key: &str,
        expires_at: u64,
    ) -> Result<CreateOutcome, StoreError> {
        let mut conn = self.conn.clone();

        // SET replies OK when written and nil when NX refused the write.
        let reply: Option<String> = timeout(
            self.op_timeout,
            redis::cmd("SET")
                .arg(key)
                .arg(1)
                .arg("NX")
                .arg("EXAT")
                .arg(expires_at)
                .query_async(&mut conn),
        )
        .await
        .map_err(|_| StoreError::Unavailable(format!("redis SET timed out for {key}")))?
        .map_err(|e| {
            warn!(key, error = %e, "Redis SET NX failed");
            StoreError::Backend(format!("redis SET failed: {e}"))
        })?;

        Ok(match reply {
            Some(_) => CreateOutcome::Created,
            None => CreateOutcome::AlreadyExists,
        })
    }
}
