// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: Apache-2.0

//! Contact submission validator.
//!
//! Implements the checks applied before a submission may consume quota:
//! - Honeypot detection (`company` must stay empty)
//! - Required field presence
//! - Field length limits
//! - Reply-To safe email addresses

use crate::config::ValidationConfig;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

/// Raw submission body. Absent fields deserialize as empty strings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContactSubmission {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub message: String,
    /// Honeypot field, hidden from humans. Any JSON type is accepted so a
    /// bot posting a number or object still gets the silent success.
    #[serde(default)]
    pub company: Option<Value>,
}

impl ContactSubmission {
    /// Bots fill every input they find, including the hidden one.
    pub fn is_honeypot_hit(&self) -> bool {
        match &self.company {
            None | Some(Value::Null) => false,
            Some(Value::Bool(filled)) => *filled,
            Some(Value::Number(_)) => true,
            Some(Value::String(s)) => !s.is_empty(),
            Some(Value::Array(items)) => !items.is_empty(),
            Some(Value::Object(fields)) => !fields.is_empty(),
        }
    }
}

/// Validation error types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Field {field} exceeds {max} characters")]
    FieldTooLong { field: &'static str, max: usize },

    #[error("Invalid email address")]
    InvalidEmail,
}

/// A submission that passed validation, with fields trimmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidContact {
    pub name: String,
    pub email: String,
    pub message: String,
}

/// Contact submission validator.
pub struct ContactValidator {
    config: ValidationConfig,
}

impl ContactValidator {
    pub fn new(config: ValidationConfig) -> Self {
        Self { config }
    }

    /// Validate a submission. The honeypot is not checked here.
    pub fn validate(&self, submission: &ContactSubmission) -> Result<ValidContact, ValidationError> {
        let name = required("name", &submission.name)?;
        let email = required("email", &submission.email)?;
        let message = required("message", &submission.message)?;

        within("name", name, self.config.max_name_chars)?;
        within("email", email, self.config.max_email_chars)?;
        within("message", message, self.config.max_message_chars)?;

        // The address ends up in a Reply-To header.
        if !is_plausible_email(email) {
            debug!("Rejected malformed email address");
            return Err(ValidationError::InvalidEmail);
        }

        Ok(ValidContact {
            name: name.to_string(),
            email: email.to_string(),
            message: message.to_string(),
        })
    }
}

fn required<'a>(field: &'static str, value: &'a str) -> Result<&'a str, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        debug!(field, "Missing required field");
        return Err(ValidationError::MissingField(field));
    }
    Ok(trimmed)
}

fn within(field: &'static str, value: &str, max: usize) -> Result<(), ValidationError> {
    if value.chars().count() > max {
        debug!(field, max, "Field too long");
        return Err(ValidationError::FieldTooLong { field, max });
    }
    Ok(())
}

fn is_plausible_email(email: &str) -> bool {
    if email.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return false;
    }
    match email.rsplit_once('@') {
        Some((local, domain)) => !local.is_empty() && !domain.is_empty(),
        None => false,
    }
}
