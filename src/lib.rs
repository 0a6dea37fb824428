// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Contact Relay
//!
//! This crate accepts contact form submissions and relays them by email,
//! with abuse mitigation in front of the mail channel:
//!
//! - Honeypot filtering (silently accepted, never delivered)
//! - Required field and length validation
//! - Per-identity fixed-window rate limiting (5 per hour default) built on
//!   create-if-absent writes to a shared expiring key-value store

pub mod clock;
pub mod config;
pub mod error;
pub mod handlers;
pub mod limiter;
pub mod mailer;
pub mod metrics;
pub mod store;
pub mod validator;

pub use config::Config;
pub use limiter::{RateLimitResult, RateLimiter};
pub use store::{CreateOutcome, MemorySlotStore, RedisSlotStore, SlotStore, StoreError};
pub use validator::{ContactSubmission, ContactValidator, ValidationError};
