// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! HTTP handlers for the contact relay.
//!
//! A submission goes through, in order: body parsing, the honeypot check,
//! field validation, mail configuration, identity extraction, the slot
//! limiter and finally mail dispatch. The honeypot runs before the limiter
//! so bots neither learn they were filtered nor burn the quota of the
//! address they share with real visitors.

use crate::config::{Config, ConfigError, HttpConfig};
use crate::error::AppError;
use crate::limiter::{RateLimitResult, RateLimiter};
use crate::mailer::{compose_contact_email, Mailer};
use crate::metrics::{Metrics, Outcome};
use crate::validator::{ContactSubmission, ContactValidator};
use axum::{
    extract::{rejection::JsonRejection, ConnectInfo, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{set_header::SetResponseHeaderLayer, trace::TraceLayer};
use tracing::{debug, info};

/// Shared application state.
pub struct AppState {
    pub limiter: RateLimiter,
    pub validator: ContactValidator,
    pub mailer: Arc<dyn Mailer>,
    pub metrics: Metrics,
    pub config: Config,
}

/// Body of a successful (or silently discarded) submission.
#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub ok: bool,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

/// Build the service router.
pub fn router(state: Arc<AppState>) -> Result<Router, ConfigError> {
    let origin = HeaderValue::from_str(&state.config.http.allowed_origin).map_err(|_| {
        ConfigError::InvalidValue {
            var: "ALLOWED_ORIGIN",
            value: state.config.http.allowed_origin.clone(),
        }
    })?;

    let mut app = Router::new()
        .route("/health", get(health))
        .route("/healthz", get(health))
        .route(
            &state.config.http.contact_path,
            post(submit).options(preflight),
        );

    if state.config.metrics.enabled {
        app = app.route(&state.config.metrics.path, get(metrics));
    }

    Ok(app
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            origin,
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static("POST, OPTIONS"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static("Content-Type"),
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "contact-relay",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// CORS preflight. The headers themselves come from the router layers.
pub async fn preflight() -> StatusCode {
    StatusCode::NO_CONTENT
}

/// Prometheus scrape endpoint.
pub async fn metrics(State(state): State<Arc<AppState>>) -> Response {
    match state.metrics.render() {
        Ok(text) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to render metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Accept a contact form submission.
pub async fn submit(
    State(state): State<Arc<AppState>>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    body: Result<Json<ContactSubmission>, JsonRejection>,
) -> Response {
    let peer = connect_info.map(|ConnectInfo(addr)| addr);
    let result = process_submission(&state, peer, &headers, body).await;

    match result {
        Ok(outcome) => {
            state.metrics.record(outcome);
            (StatusCode::OK, Json(SubmitResponse { ok: true })).into_response()
        }
        Err(err) => {
            if matches!(err, AppError::Limiter(_)) {
                state.metrics.record_store_failure();
            }
            state.metrics.record(err.outcome());
            err.into_response()
        }
    }
}

async fn process_submission(
    state: &AppState,
    peer: Option<SocketAddr>,
    headers: &HeaderMap,
    body: Result<Json<ContactSubmission>, JsonRejection>,
) -> Result<Outcome, AppError> {
    let Json(submission) = body.map_err(|rejection| AppError::InvalidBody(rejection.body_text()))?;

    if submission.is_honeypot_hit() {
        info!("Honeypot field filled, discarding submission");
        return Ok(Outcome::Honeypot);
    }

    let contact = state.validator.validate(&submission)?;

    // Checked before the limiter so a misconfigured relay burns no quota.
    let message = compose_contact_email(&state.config.mail, &contact)
        .ok_or(AppError::Configuration("mail sender address is not set"))?;

    let identity = client_identity(&state.config.http, headers, peer)
        .ok_or(AppError::MissingIdentity)?;

    match state.limiter.try_acquire(&identity).await? {
        RateLimitResult::Allowed { slot, remaining, .. } => {
            debug!(%identity, slot, remaining, "Submission within quota");
        }
        RateLimitResult::Limited { retry_after } => {
            return Err(AppError::RateLimited { retry_after });
        }
    }

    state.mailer.send(&message).await?;
    info!(%identity, "Contact message dispatched");
    Ok(Outcome::Sent)
}

/// Caller identity for quota purposes.
///
/// With `trust_forwarded_for`, each of the `trusted_proxy_hops` proxies in front of
/// the relay appends the address it saw to `X-Forwarded-For`. Everything to
/// the left of those entries is client supplied, so the identity is the entry
/// `trusted_proxy_hops` from the right. A header too short to contain it
/// falls back to the peer address.
pub fn client_identity(
    http: &HttpConfig,
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
) -> Option<String> {
    if http.trust_forwarded_for {
        let hops: Vec<&str> = headers
            .get_all("x-forwarded-for")
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(','))
            .map(str::trim)
            .collect();
        let forwarded = hops
            .len()
            .checked_sub(http.trusted_proxy_hops)
            .and_then(|idx| hops.get(idx))
            .filter(|v| !v.is_empty());
        if let Some(ip) = forwarded {
            return Some(ip.to_string());
        }
    }
    peer.map(|addr| addr.ip().to_string())
}
