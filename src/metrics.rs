// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Prometheus metrics for the relay.

use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

/// Submission outcomes, used as the `outcome` label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Sent,
    Honeypot,
    Invalid,
    RateLimited,
    Failed,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Sent => "sent",
            Outcome::Honeypot => "honeypot",
            Outcome::Invalid => "invalid",
            Outcome::RateLimited => "rate_limited",
            Outcome::Failed => "failed",
        }
    }
}

pub struct Metrics {
    registry: Registry,
    submissions: IntCounterVec,
    store_failures: IntCounter,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let submissions = IntCounterVec::new(
            Opts::new("contact_submissions_total", "Contact submissions by outcome"),
            &["outcome"],
        )?;
        let store_failures = IntCounter::new(
            "contact_rate_limit_store_failures_total",
            "Slot store errors surfaced to callers",
        )?;

        registry.register(Box::new(submissions.clone()))?;
        registry.register(Box::new(store_failures.clone()))?;

        Ok(Self {
            registry,
            submissions,
            store_failures,
        })
    }

    pub fn record(&self, outcome: Outcome) {
        self.submissions.with_label_values(&[outcome.as_str()]).inc();
    }

    pub fn record_store_failure(&self) {
        self.store_failures.inc();
    }

    #[cfg(test)]
    fn count(&self, outcome: Outcome) -> u64 {
        self.submissions.with_label_values(&[outcome.as_str()]).get()
    }

    /// Render in the Prometheus text exposition format.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_contains_recorded_outcomes() {
        let metrics = Metrics::new().unwrap();
        metrics.record(Outcome::Sent);
        metrics.record(Outcome::Sent);
        metrics.record(Outcome::Honeypot);

        assert_eq!(metrics.count(Outcome::Sent), 2);
        let text = metrics.render().unwrap();
        assert!(text.contains("contact_submissions_total{outcome=\"sent\"} 2"));
        assert!(text.contains("contact_submissions_total{outcome=\"honeypot\"} 1"));
    }
}
