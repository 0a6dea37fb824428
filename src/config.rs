// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Configuration for the contact relay.
//!
//! Every field has a default; `Config::from_env` overlays environment
//! variables on top of those defaults.

/// Longest accepted window (31 days).
pub const MAX_WINDOW_SECS: u64 = 31 * 24 * 3600;

/// Longest accepted expiry slack (1 day).
pub const MAX_EXPIRY_SLACK_SECS: u64 = 24 * 3600;

use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {value:?}")]
    InvalidValue { var: &'static str, value: String },

    #[error("{0} must be set when {1}")]
    Missing(&'static str, &'static str),
}

/// Configuration for the contact relay service.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address (default: 0.0.0.0:8080)
    pub bind_addr: String,
    pub rate_limit: RateLimitConfig,
    pub store: StoreConfig,
    pub mail: MailConfig,
    pub http: HttpConfig,
    pub validation: ValidationConfig,
    pub metrics: MetricsConfig,
}

/// Fixed-window slot limiter settings.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Slots per identity per window (default: 5)
    pub max_per_window: u32,

    /// Window length in seconds (default: 3600)
    pub window_secs: u64,

    /// Extra lifetime of a slot key past the window length (default: 100)
    pub expiry_slack_secs: u64,

    /// Namespace prepended to every slot key
    pub key_prefix: String,
}

/// Which slot store backs the limiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Redis,
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub backend: StoreBackend,

    /// Redis connection URL, required for the redis backend
    pub redis_url: Option<String>,

    /// Timeout for a single store operation in milliseconds (default: 2000)
    pub timeout_ms: u64,

    /// How often the memory backend drops expired keys (default: 60)
    pub sweep_interval_secs: u64,
}

/// How outgoing mail leaves the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailTransport {
    /// Write the message to the log only
    Log,
    /// POST the message to an HTTP mail API
    Http,
}

#[derive(Debug, Clone)]
pub struct MailConfig {
    /// Sender address. Unset means every submission fails with 500.
    pub from_address: Option<String>,

    /// Recipient address (falls back to the sender address)
    pub to_address: Option<String>,

    pub subject_prefix: String,

    pub transport: MailTransport,

    pub http_endpoint: Option<String>,

    pub api_token: Option<String>,

    /// Mail API request timeout in milliseconds (default: 10000)
    pub timeout_ms: u64,
}

#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Value of Access-Control-Allow-Origin (default: *)
    pub allowed_origin: String,

    /// Route accepting submissions (default: /contact)
    pub contact_path: String,

    /// Take the identity from X-Forwarded-For instead of the peer address
    pub trust_forwarded_for: bool,

    /// Proxies in front of the relay that append to X-Forwarded-For
    /// (default: 1). The identity is the entry this many hops from the right.
    pub trusted_proxy_hops: usize,
}

/// Per-field limits for submissions.
#[derive(Debug, Clone)]
pub struct ValidationConfig {
    pub max_name_chars: usize,

    pub max_email_chars: usize,

    pub max_message_chars: usize,
}

/// Metrics configuration.
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    /// Enable Prometheus metrics endpoint (default: true)
    pub enabled: bool,

    /// Metrics endpoint path (default: /metrics)
    pub path: String,
}

// Default value functions
fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_max_per_window() -> u32 {
    5
}

fn default_window_secs() -> u64 {
    3600
}

fn default_expiry_slack_secs() -> u64 {
    100
}

fn default_key_prefix() -> String {
    "contact-rl".to_string()
}

fn default_store_backend() -> StoreBackend {
    StoreBackend::Memory
}

fn default_store_timeout_ms() -> u64 {
    2000
}

fn default_sweep_interval_secs() -> u64 {
    60
}

fn default_subject_prefix() -> String {
    "[contact]".to_string()
}

fn default_mail_transport() -> MailTransport {
    MailTransport::Log
}

fn default_mail_timeout_ms() -> u64 {
    10_000
}

fn default_allowed_origin() -> String {
    "*".to_string()
}

fn default_contact_path() -> String {
    "/contact".to_string()
}

fn default_max_name_chars() -> usize {
    200
}

fn default_max_email_chars() -> usize {
    320
}

fn default_max_message_chars() -> usize {
    5000
}

fn default_true() -> bool {
    true
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            rate_limit: RateLimitConfig::default(),
            store: StoreConfig::default(),
            mail: MailConfig::default(),
            http: HttpConfig::default(),
            validation: ValidationConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_per_window: default_max_per_window(),
            window_secs: default_window_secs(),
            expiry_slack_secs: default_expiry_slack_secs(),
            key_prefix: default_key_prefix(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
            redis_url: None,
            timeout_ms: default_store_timeout_ms(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            from_address: None,
            to_address: None,
            subject_prefix: default_subject_prefix(),
            transport: default_mail_transport(),
            http_endpoint: None,
            api_token: None,
            timeout_ms: default_mail_timeout_ms(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            allowed_origin: default_allowed_origin(),
            contact_path: default_contact_path(),
            trust_forwarded_for: false,
            trusted_proxy_hops: 1,
        }
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            max_name_chars: default_max_name_chars(),
            max_email_chars: default_max_email_chars(),
            max_message_chars: default_max_message_chars(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            path: default_metrics_path(),
        }
    }
}

impl StoreConfig {
    pub fn op_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

impl MailConfig {
    /// Recipient, falling back to the sender.
    pub fn recipient(&self) -> Option<&str> {
        self.to_address
            .as_deref()
            .or(self.from_address.as_deref())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Config {
    /// Build configuration from environment variables over the defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("BIND_ADDR") {
            config.bind_addr = v;
        }

        let rl = &mut config.rate_limit;
        parse_into(&get, "RATE_LIMIT_PER_WINDOW", &mut rl.max_per_window)?;
        parse_into(&get, "RATE_LIMIT_WINDOW_SECS", &mut rl.window_secs)?;
        parse_into(&get, "RATE_LIMIT_EXPIRY_SLACK_SECS", &mut rl.expiry_slack_secs)?;
        if let Some(v) = get("RATE_LIMIT_KEY_PREFIX") {
            rl.key_prefix = v;
        }
        if rl.window_secs == 0 || rl.window_secs > MAX_WINDOW_SECS {
            return Err(ConfigError::InvalidValue {
                var: "RATE_LIMIT_WINDOW_SECS",
                value: rl.window_secs.to_string(),
            });
        }
        if rl.expiry_slack_secs > MAX_EXPIRY_SLACK_SECS {
            return Err(ConfigError::InvalidValue {
                var: "RATE_LIMIT_EXPIRY_SLACK_SECS",
                value: rl.expiry_slack_secs.to_string(),
            });
        }

        let store = &mut config.store;
        if let Some(v) = get("STORE_BACKEND") {
            store.backend = match v.to_ascii_lowercase().as_str() {
                "memory" => StoreBackend::Memory,
                "redis" => StoreBackend::Redis,
                _ => return Err(ConfigError::InvalidValue { var: "STORE_BACKEND", value: v }),
            };
        }
        store.redis_url = get("REDIS_URL");
        parse_into(&get, "STORE_TIMEOUT_MS", &mut store.timeout_ms)?;
        parse_into(&get, "STORE_SWEEP_SECS", &mut store.sweep_interval_secs)?;
        if store.backend == StoreBackend::Redis && store.redis_url.is_none() {
            return Err(ConfigError::Missing("REDIS_URL", "STORE_BACKEND=redis"));
        }

        let mail = &mut config.mail;
        mail.from_address = get("MAIL_FROM");
        mail.to_address = get("MAIL_TO");
        if let Some(v) = get("MAIL_SUBJECT_PREFIX") {
            mail.subject_prefix = v;
        }
        if let Some(v) = get("MAIL_TRANSPORT") {
            mail.transport = match v.to_ascii_lowercase().as_str() {
                "log" => MailTransport::Log,
                "http" => MailTransport::Http,
                _ => return Err(ConfigError::InvalidValue { var: "MAIL_TRANSPORT", value: v }),
            };
        }
        mail.http_endpoint = get("MAIL_HTTP_ENDPOINT");
        mail.api_token = get("MAIL_API_TOKEN");
        parse_into(&get, "MAIL_TIMEOUT_MS", &mut mail.timeout_ms)?;
        if mail.transport == MailTransport::Http {
            let endpoint = mail
                .http_endpoint
                .as_deref()
                .ok_or(ConfigError::Missing("MAIL_HTTP_ENDPOINT", "MAIL_TRANSPORT=http"))?;
            if url::Url::parse(endpoint).is_err() {
                return Err(ConfigError::InvalidValue {
                    var: "MAIL_HTTP_ENDPOINT",
                    value: endpoint.to_string(),
                });
            }
        }

        if let Some(v) = get("ALLOWED_ORIGIN") {
            config.http.allowed_origin = v;
        }
        if let Some(v) = get("CONTACT_PATH") {
            config.http.contact_path = v;
        }
        if !config.http.contact_path.starts_with('/') {
            return Err(ConfigError::InvalidValue {
                var: "CONTACT_PATH",
                value: config.http.contact_path,
            });
        }
        parse_into(&get, "TRUST_FORWARDED_FOR", &mut config.http.trust_forwarded_for)?;
        parse_into(&get, "TRUSTED_PROXY_HOPS", &mut config.http.trusted_proxy_hops)?;
        if config.http.trusted_proxy_hops == 0 {
            return Err(ConfigError::InvalidValue {
                var: "TRUSTED_PROXY_HOPS",
                value: "0".to_string(),
            });
        }
        parse_into(&get, "METRICS_ENABLED", &mut config.metrics.enabled)?;

        Ok(config)
    }
}

fn parse_into<T, G>(get: &G, var: &'static str, slot: &mut T) -> Result<(), ConfigError>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    if let Some(value) = get(var) {
        *slot = value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { var, value })?;
    }
    Ok(())
}
