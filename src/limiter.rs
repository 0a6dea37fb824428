// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Fixed-window slot limiter over a conditional-write store.
//!
//! Each identity owns `limit` slots per window. A request is allowed when it
//! manages to create one of the slot keys `(identity, window, slot)` with a
//! create-if-absent write. There is no counter to read or increment: the
//! store arbitrates every race on a single key, so at most `limit` creates
//! can succeed per window no matter how many processes share the store.
//!
//! Slot keys expire `window + slack` seconds after creation and are never
//! deleted here. Windows are fixed, so a burst across a boundary can see up
//! to `2 * limit` successes.

use crate::clock::Clock;
use crate::config::RateLimitConfig;
use crate::store::{CreateOutcome, SlotStore, StoreError};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// Result of a rate limit check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitResult {
    /// A slot was reserved for this request
    Allowed {
        /// Slot number claimed (1-based)
        slot: u32,
        /// Window index the slot belongs to
        window: u64,
        /// Slots above the claimed one (upper bound on what is left)
        remaining: u32,
        /// Time until the window rolls over
        reset_in: Duration,
    },
    /// Every slot of the current window is taken
    Limited {
        /// Time until the window rolls over
        retry_after: Duration,
    },
}

impl RateLimitResult {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateLimitResult::Allowed { .. })
    }
}

#[derive(Debug, Error)]
pub enum LimiterError {
    #[error("identity must not be empty")]
    EmptyIdentity,

    #[error("window length must be at least one second")]
    ZeroWindow,

    #[error("slot expiry overflows: now {now} + window {window_secs} + slack {slack_secs}")]
    ExpiryOverflow {
        now: u64,
        window_secs: u64,
        slack_secs: u64,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Window index containing `now`.
pub fn window_index(now_secs: u64, window_secs: u64) -> u64 {
    now_secs / window_secs
}

/// Seconds from `now` until the window containing it closes.
pub fn secs_until_rollover(now_secs: u64, window_secs: u64) -> u64 {
    window_secs - (now_secs % window_secs)
}

/// Distributed per-identity limiter.
pub struct RateLimiter {
    config: RateLimitConfig,
    store: Arc<dyn SlotStore>,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig, store: Arc<dyn SlotStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            store,
            clock,
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Store key for one slot.
    ///
    /// The window and slot are always the last two `:` separated fields, so
    /// an identity containing `:` cannot collide with another identity.
    pub fn slot_key(&self, identity: &str, window: u64, slot: u32) -> String {
        format!("{}:{}:{}:{}", self.config.key_prefix, identity, window, slot)
    }

    /// Try to reserve a slot for `identity` using the configured quota.
    pub async fn try_acquire(&self, identity: &str) -> Result<RateLimitResult, LimiterError> {
        self.try_acquire_with(identity, self.config.max_per_window, self.config.window_secs)
            .await
    }

    /// Try to reserve one of `limit` slots for `identity` in the current
    /// window of `window_secs` seconds.
    ///
    /// Slots are tried in ascending order and the first successful create
    /// wins. Any store error other than an existing key aborts the scan and
    /// is returned; a partially scanned window never reports a decision.
    pub async fn try_acquire_with(
        &self,
        identity: &str,
        limit: u32,
        window_secs: u64,
    ) -> Result<RateLimitResult, LimiterError> {
        if identity.is_empty() {
            return Err(LimiterError::EmptyIdentity);
        }
        if window_secs == 0 {
            return Err(LimiterError::ZeroWindow);
        }

        // Read once; the window is never cached between calls.
        let now = self.clock.now_secs();
        let window = window_index(now, window_secs);
        let reset_in = Duration::from_secs(secs_until_rollover(now, window_secs));
        let slack_secs = self.config.expiry_slack_secs;
        let expires_at = now
            .checked_add(window_secs)
            .and_then(|t| t.checked_add(slack_secs))
            .ok_or(LimiterError::ExpiryOverflow {
                now,
                window_secs,
                slack_secs,
            })?;

        for slot in 1..=limit {
            let key = self.slot_key(identity, window, slot);
            match self.store.create_if_absent(&key, expires_at).await? {
                CreateOutcome::Created => {
                    debug!(identity, window, slot, "Slot claimed");
                    return Ok(RateLimitResult::Allowed {
                        slot,
                        window,
                        remaining: limit - slot,
                        reset_in,
                    });
                }
                CreateOutcome::AlreadyExists => continue,
            }
        }

        info!(
            identity,
            window,
            limit,
            retry_after_secs = reset_in.as_secs(),
            "Rate limit exhausted for window"
        );
        Ok(RateLimitResult::Limited {
            retry_after: reset_in,
        })
    }
}
