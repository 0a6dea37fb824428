// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Contact Relay Service
//!
//! Accepts `POST /contact` with a JSON body `{name, email, message, company}`
//! and forwards valid submissions by email.
//!
//! ## Responses
//!
//! - 200: sent, or silently discarded by the honeypot
//! - 400: missing or malformed fields
//! - 429: per-identity quota exhausted for the current window
//! - 500: configuration or infrastructure fault
//! - 204: `OPTIONS` preflight
//!
//! ## Configuration
//!
//! Configuration is loaded from environment variables (a `.env` file is
//! honoured):
//!
//! - `BIND_ADDR`: Server bind address (default: 0.0.0.0:8080)
//! - `RATE_LIMIT_PER_WINDOW`: Submissions per identity per window (default: 5)
//! - `RATE_LIMIT_WINDOW_SECS`: Window length (default: 3600)
//! - `STORE_BACKEND`: `memory` or `redis` (default: memory)
//! - `REDIS_URL`: Redis URL for the redis backend
//! - `MAIL_FROM` / `MAIL_TO`: Sender and recipient addresses
//! - `MAIL_TRANSPORT`: `log` or `http` (default: log)
//! - `ALLOWED_ORIGIN`: CORS origin (default: *)

use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use contact_relay::{
    clock::{Clock, SystemClock},
    config::{Config, MailTransport, StoreBackend},
    handlers::{router, AppState},
    limiter::RateLimiter,
    mailer::{HttpMailer, LogMailer, Mailer},
    metrics::Metrics,
    store::{MemorySlotStore, RedisSlotStore, SlotStore},
    validator::ContactValidator,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Missing .env is fine
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer().json())
        .with(
            EnvFilter::builder()
                .with_default_directive(Level::INFO.into())
                .from_env_lossy(),
        )
        .init();

    let config = Config::from_env().context("invalid configuration")?;
    info!(
        bind_addr = %config.bind_addr,
        max_per_window = config.rate_limit.max_per_window,
        window_secs = config.rate_limit.window_secs,
        store = ?config.store.backend,
        mail_transport = ?config.mail.transport,
        "Starting contact relay"
    );
    if config.mail.from_address.is_none() {
        warn!("MAIL_FROM is not set; submissions will fail until it is configured");
    }

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let store: Arc<dyn SlotStore> = match config.store.backend {
        StoreBackend::Memory => {
            let memory = Arc::new(MemorySlotStore::new(clock.clone()));

            // Redis expires keys itself; the memory store needs a sweeper.
            let sweeper = memory.clone();
            let period = config.store.sweep_interval();
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(period);
                loop {
                    interval.tick().await;
                    sweeper.sweep().await;
                }
            });
            memory as Arc<dyn SlotStore>
        }
        StoreBackend::Redis => {
            let url = config
                .store
                .redis_url
                .as_deref()
                .context("REDIS_URL is required for the redis backend")?;
            Arc::new(RedisSlotStore::connect(url, config.store.op_timeout()).await?)
        }
    };

    let mailer: Arc<dyn Mailer> = match config.mail.transport {
        MailTransport::Log => Arc::new(LogMailer),
        MailTransport::Http => Arc::new(HttpMailer::new(&config.mail)?),
    };

    let state = Arc::new(AppState {
        limiter: RateLimiter::new(config.rate_limit.clone(), store, clock),
        validator: ContactValidator::new(config.validation.clone()),
        mailer,
        metrics: Metrics::new()?,
        config: config.clone(),
    });

    let app = router(state)?;

    let addr: SocketAddr = config.bind_addr.parse()?;
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %addr, path = %config.http.contact_path, "Server listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}
