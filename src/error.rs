// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Request-level errors and their HTTP mapping.
//!
//! Client faults carry their message to the caller. Server faults are
//! logged with full detail and answered with a generic body.

use crate::limiter::LimiterError;
use crate::mailer::MailError;
use crate::metrics::Outcome;
use crate::validator::ValidationError;
use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Invalid request body: {0}")]
    InvalidBody(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Too many messages, try again later")]
    RateLimited { retry_after: Duration },

    #[error("Configuration error: {0}")]
    Configuration(&'static str),

    #[error("Could not determine client identity")]
    MissingIdentity,

    #[error("Rate limiter failed: {0}")]
    Limiter(#[from] LimiterError),

    #[error("Mail dispatch failed: {0}")]
    Mail(#[from] MailError),
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidBody(_) | AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::Configuration(_)
            | AppError::MissingIdentity
            | AppError::Limiter(_)
            | AppError::Mail(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::InvalidBody(_) => "INVALID_BODY",
            AppError::Validation(_) => "VALIDATION_FAILED",
            AppError::RateLimited { .. } => "RATE_LIMITED",
            _ => "INTERNAL_ERROR",
        }
    }

    pub fn outcome(&self) -> Outcome {
        match self {
            AppError::InvalidBody(_) | AppError::Validation(_) => Outcome::Invalid,
            AppError::RateLimited { .. } => Outcome::RateLimited,
            _ => Outcome::Failed,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            error!(error = %self, "Request failed");
            let body = ErrorResponse {
                error: "Internal server error".to_string(),
                code: self.code(),
                retry_after_secs: None,
            };
            return (status, Json(body)).into_response();
        }

        match &self {
            AppError::RateLimited { retry_after } => {
                let secs = retry_after.as_secs();
                (
                    status,
                    [(header::RETRY_AFTER, secs.to_string())],
                    Json(ErrorResponse {
                        error: self.to_string(),
                        code: self.code(),
                        retry_after_secs: Some(secs),
                    }),
                )
                    .into_response()
            }
            _ => (
                status,
                Json(ErrorResponse {
                    error: self.to_string(),
                    code: self.code(),
                    retry_after_secs: None,
                }),
            )
                .into_response(),
        }
    }
}
