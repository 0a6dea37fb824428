// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: Apache-2.0

//! Fake collaborators.

use async_trait::async_trait;
use contact_relay::{
    mailer::{EmailMessage, MailError, Mailer},
    store::{CreateOutcome, SlotStore, StoreError},
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Mailer that remembers every message it was asked to send.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<EmailMessage>>,
}

impl RecordingMailer {
    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), MailError> {
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}

/// Mailer whose provider is down.
pub struct FailingMailer;

#[async_trait]
impl Mailer for FailingMailer {
    async fn send(&self, _message: &EmailMessage) -> Result<(), MailError> {
        Err(MailError::Rejected { status: 503 })
    }
}

/// Counts writes before delegating to an inner store.
pub struct CountingStore {
    inner: Arc<dyn SlotStore>,
    writes: AtomicUsize,
}

impl CountingStore {
    pub fn new(inner: Arc<dyn SlotStore>) -> Self {
        Self {
            inner,
            writes: AtomicUsize::new(0),
        }
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SlotStore for CountingStore {
    async fn create_if_absent(
        &self,
        key: &str,
        expires_at: u64,
    ) -> Result<CreateOutcome, StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.create_if_absent(key, expires_at).await
    }
}

/// Store whose every write fails with a non-contention error.
#[derive(Default)]
pub struct FailingStore {
    writes: AtomicUsize,
}

impl FailingStore {
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SlotStore for FailingStore {
    async fn create_if_absent(
        &self,
        _key: &str,
        _expires_at: u64,
    ) -> Result<CreateOutcome, StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        Err(StoreError::Unavailable("connection refused".to_string()))
    }
}

/// Yields to the scheduler before each write so concurrent callers interleave.
pub struct YieldingStore {
    inner: Arc<dyn SlotStore>,
}

impl YieldingStore {
    pub fn new(inner: Arc<dyn SlotStore>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl SlotStore for YieldingStore {
    async fn create_if_absent(
        &self,
        key: &str,
        expires_at: u64,
    ) -> Result<CreateOutcome, StoreError> {
        tokio::task::yield_now().await;
        self.inner.create_if_absent(key, expires_at).await
    }
}
