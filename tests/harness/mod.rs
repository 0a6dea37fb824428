// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: Apache-2.0

//! Test harness for the contact relay.
//!
//! Provides in-memory fakes for the slot store and mail channel, plus a
//! router builder wired the same way `main` wires the real service.

#![allow(dead_code)]

pub mod fakes;

use axum::{
    body::{to_bytes, Body},
    extract::connect_info::MockConnectInfo,
    http::{Request, StatusCode},
    Router,
};
use contact_relay::{
    clock::ManualClock,
    config::{Config, RateLimitConfig},
    handlers::{router, AppState},
    limiter::RateLimiter,
    mailer::Mailer,
    metrics::Metrics,
    store::SlotStore,
    validator::ContactValidator,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceExt;

/// 2024-01-01T00:00:00Z, an exact hour boundary.
pub const START: u64 = 1_704_067_200;

pub fn config_with_limit(limit: u32) -> Config {
    let mut config = Config {
        rate_limit: RateLimitConfig {
            max_per_window: limit,
            window_secs: 3600,
            ..Default::default()
        },
        ..Default::default()
    };
    config.mail.from_address = Some("relay@example.net".to_string());
    config.mail.to_address = Some("owner@example.net".to_string());
    config
}

pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
}

pub fn build_app(
    config: Config,
    store: Arc<dyn SlotStore>,
    mailer: Arc<dyn Mailer>,
    clock: Arc<ManualClock>,
    peer: SocketAddr,
) -> TestApp {
    let state = Arc::new(AppState {
        limiter: RateLimiter::new(config.rate_limit.clone(), store, clock),
        validator: ContactValidator::new(config.validation.clone()),
        mailer,
        metrics: Metrics::new().expect("metrics registry"),
        config,
    });
    let router = router(state.clone())
        .expect("router")
        .layer(MockConnectInfo(peer));
    TestApp { router, state }
}

impl TestApp {
    /// POST a raw JSON body to the contact route.
    pub async fn post_json(&self, body: &str) -> (StatusCode, serde_json::Value) {
        let request = Request::builder()
            .method("POST")
            .uri("/contact")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("request");
        self.send(request).await
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = self.router.clone().oneshot(request).await.expect("response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, json)
    }
}

pub fn contact_body(name: &str, email: &str, message: &str, company: &str) -> String {
    serde_json::json!({
        "name": name,
        "email": email,
        "message": message,
        "company": company,
    })
    .to_string()
}
