// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: Apache-2.0

//! Concurrency and window properties of the slot limiter.
//!
//! Several `RateLimiter` instances sharing one store stand in for relay
//! processes on different hosts sharing one Redis.

mod harness;

use contact_relay::{
    clock::ManualClock,
    config::RateLimitConfig,
    limiter::{RateLimitResult, RateLimiter},
    store::{MemorySlotStore, SlotStore},
};
use harness::fakes::YieldingStore;
use harness::START;
use std::collections::HashSet;
use std::sync::Arc;

const HOUR: u64 = 3600;

fn shared_store(clock: &Arc<ManualClock>) -> (Arc<MemorySlotStore>, Arc<dyn SlotStore>) {
    let memory = Arc::new(MemorySlotStore::new(clock.clone()));
    let shared: Arc<dyn SlotStore> = Arc::new(YieldingStore::new(memory.clone()));
    (memory, shared)
}

fn instance(limit: u32, store: Arc<dyn SlotStore>, clock: Arc<ManualClock>) -> Arc<RateLimiter> {
    Arc::new(RateLimiter::new(
        RateLimitConfig {
            max_per_window: limit,
            window_secs: HOUR,
            ..Default::default()
        },
        store,
        clock,
    ))
}

async fn race(limiters: &[Arc<RateLimiter>], callers: usize, identity: &str) -> Vec<RateLimitResult> {
    let mut handles = Vec::with_capacity(callers);
    for i in 0..callers {
        let limiter = limiters[i % limiters.len()].clone();
        let identity = identity.to_string();
        handles.push(tokio::spawn(async move {
            limiter.try_acquire(&identity).await.expect("store never fails here")
        }));
    }

    let mut results = Vec::with_capacity(callers);
    for handle in handles {
        results.push(handle.await.expect("task panicked"));
    }
    results
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_callers_up_to_limit_all_succeed() {
    let clock = Arc::new(ManualClock::new(START));
    let (_, store) = shared_store(&clock);
    let limiters: Vec<_> = (0..3).map(|_| instance(5, store.clone(), clock.clone())).collect();

    let results = race(&limiters, 5, "203.0.113.10").await;
    assert!(results.iter().all(RateLimitResult::is_allowed));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_callers_never_exceed_limit() {
    for limit in [1u32, 3, 5] {
        let clock = Arc::new(ManualClock::new(START));
        let (memory, store) = shared_store(&clock);
        let limiters: Vec<_> = (0..4).map(|_| instance(limit, store.clone(), clock.clone())).collect();

        let results = race(&limiters, 40, "203.0.113.10").await;

        let claimed: Vec<u32> = results
            .iter()
            .filter_map(|r| match r {
                RateLimitResult::Allowed { slot, .. } => Some(*slot),
                RateLimitResult::Limited { .. } => None,
            })
            .collect();
        assert_eq!(claimed.len(), limit as usize, "limit {limit}");

        // Every slot claimed exactly once.
        let distinct: HashSet<u32> = claimed.iter().copied().collect();
        assert_eq!(distinct, (1..=limit).collect::<HashSet<_>>());
        assert_eq!(memory.live_keys().await, limit as usize);
    }
}

#[tokio::test]
async fn test_denial_is_idempotent_within_window() {
    let clock = Arc::new(ManualClock::new(START));
    let (_, store) = shared_store(&clock);
    let limiter = instance(2, store, clock.clone());

    limiter.try_acquire("a").await.unwrap();
    limiter.try_acquire("a").await.unwrap();

    for step in 0..10 {
        clock.set(START + step * 359);
        assert!(
            !limiter.try_acquire("a").await.unwrap().is_allowed(),
            "denied at +{}s",
            step * 359
        );
    }
}

#[tokio::test]
async fn test_windows_are_independent() {
    let clock = Arc::new(ManualClock::new(START + HOUR - 1));
    let (_, store) = shared_store(&clock);
    let limiter = instance(3, store, clock.clone());

    for _ in 0..3 {
        assert!(limiter.try_acquire("a").await.unwrap().is_allowed());
    }
    assert!(!limiter.try_acquire("a").await.unwrap().is_allowed());

    // One second later is a new window; the boundary burst gets 2x limit.
    clock.advance(1);
    for _ in 0..3 {
        assert!(limiter.try_acquire("a").await.unwrap().is_allowed());
    }
    assert!(!limiter.try_acquire("a").await.unwrap().is_allowed());
}

#[tokio::test]
async fn test_clock_stepping_back_uses_its_own_window() {
    let clock = Arc::new(ManualClock::new(START + HOUR));
    let (_, store) = shared_store(&clock);
    let limiter = instance(1, store, clock.clone());

    assert!(limiter.try_acquire("a").await.unwrap().is_allowed());

    // A skewed host still in the previous window claims from that window.
    clock.set(START + HOUR - 5);
    assert!(limiter.try_acquire("a").await.unwrap().is_allowed());
    assert!(!limiter.try_acquire("a").await.unwrap().is_allowed());
}

#[tokio::test]
async fn test_slot_keys_vanish_after_ttl() {
    let clock = Arc::new(ManualClock::new(START));
    let (memory, store) = shared_store(&clock);
    let limiter = instance(2, store, clock.clone());

    limiter.try_acquire("a").await.unwrap();
    limiter.try_acquire("a").await.unwrap();
    let keys = [limiter.slot_key("a", START / HOUR, 1), limiter.slot_key("a", START / HOUR, 2)];
    for key in &keys {
        assert!(memory.contains(key).await);
    }

    // Window length plus the default 100s slack.
    clock.advance(HOUR + 100);
    for key in &keys {
        assert!(!memory.contains(key).await);
    }
    assert_eq!(memory.sweep().await, 2);
    assert_eq!(memory.live_keys().await, 0);
}
