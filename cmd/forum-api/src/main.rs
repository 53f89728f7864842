//! # forum-api
//!
//! Assembles the server: configuration, logging, the Postgres pool, the
//! services and the HTTP router, then serves until SIGINT or SIGTERM.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use api_adapters::{build_router, metrics::Metrics, AppState, LogMailer, RouterOptions};
use auth_adapters::{Argon2PasswordHasher, OpaqueTokenCodec};
use configs::{LogFormat, Settings};
use secrecy::ExposeSecret;
use services::{AuthService, ForumService, RateLimiter, RateLimiterConfig, UserService};
use storage_adapters::postgres::{self, PgStore, PoolSettings};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

/// How long in-flight welcome mails get after the listener stops.
const MAIL_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Configuration
    let settings = Settings::load().context("loading configuration")?;

    // 2. Logging
    init_tracing(settings.log_format());

    // 3. Database
    let url = settings
        .database
        .url
        .as_ref()
        .map(|url| url.expose_secret().to_string())
        .unwrap_or_default();
    let pool = postgres::connect(&PoolSettings {
        url,
        max_open_conns: settings.database.max_open_conns,
        max_idle_conns: settings.database.max_idle_conns,
        max_idle_time: settings.database.max_idle_time,
    })
    .await
    .context("connecting to postgres")?;
    postgres::migrate(&pool).await.context("running migrations")?;

    let store = Arc::new(PgStore::new(pool.clone(), settings.database.query_timeout()));

    // 4. Rate limiter
    let limiter = Arc::new(RateLimiter::new(RateLimiterConfig {
        rps: settings.limiter.rps,
        burst: settings.limiter.burst,
        enabled: settings.limiter.enabled,
        idle_eviction: Duration::from_secs(settings.limiter.idle_eviction_secs),
    }));
    let sweeper =
        limiter.spawn_sweeper(Duration::from_secs(settings.limiter.sweep_interval_secs));

    // 5. Services
    let hasher = Arc::new(Argon2PasswordHasher::new());
    let codec = Arc::new(OpaqueTokenCodec::new());
    let mailer = Arc::new(LogMailer::new(settings.smtp.sender.clone()));

    let auth = AuthService::new(
        store.clone(),
        store.clone(),
        store.clone(),
        hasher.clone(),
        codec.clone(),
    );
    let users = UserService::new(
        store.clone(),
        store.clone(),
        hasher,
        codec,
        mailer,
        settings.auth.default_permissions.clone(),
    );
    let mail_tasks = users.background_tasks();

    let state = AppState {
        forums: ForumService::new(store),
        users,
        auth,
        metrics: Metrics::new(),
        environment: settings.server.env.clone(),
        version: env!("CARGO_PKG_VERSION"),
    };

    // 6. Router
    let app = build_router(
        state,
        RouterOptions {
            limiter,
            trust_proxy_headers: settings.server.trust_proxy_headers,
        },
    );

    // 7. Serve
    let addr = SocketAddr::from(([0, 0, 0, 0], settings.server.port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(addr = %addr, env = %settings.server.env, "starting server");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("serving http")?;

    // 8. Drain
    tracing::info!("completing background tasks");
    mail_tasks.close();
    if tokio::time::timeout(MAIL_DRAIN_TIMEOUT, mail_tasks.wait())
        .await
        .is_err()
    {
        tracing::warn!(pending = mail_tasks.len(), "gave up waiting for mail deliveries");
    }
    sweeper.abort();
    pool.close().await;

    tracing::info!(addr = %addr, "stopped server");
    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| "info,tower_http=info".into());
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!(signal = "SIGINT", "shutting down server"),
        _ = terminate => tracing::info!(signal = "SIGTERM", "shutting down server"),
    }
}
