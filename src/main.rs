//! Bear Sighting Service: binary entrypoint.
//! Loads config, wires the application context, starts the daily ingest
//! scheduler and serves the read API until Ctrl-C / SIGTERM.

use std::sync::Arc;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use bear_sighting_api::api::{self, AppState};
use bear_sighting_api::config::AppConfig;
use bear_sighting_api::context::AppContext;
use bear_sighting_api::ingest::scheduler::{spawn_scheduler, IngestSchedulerCfg};
use bear_sighting_api::metrics::Metrics;

/// `RUST_LOG` filter (default `info`); `LOG_FORMAT=json` switches to JSON lines.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = AppConfig::from_env().context("invalid configuration")?;
    cfg.log_summary();

    let metrics = Metrics::init()?;
    let ctx = Arc::new(AppContext::from_config(&cfg).await?);

    let scheduler = spawn_scheduler(
        ctx.clone(),
        IngestSchedulerCfg {
            interval: cfg.ingest_interval,
            run_on_startup: cfg.run_on_startup,
        },
    );

    let app = api::router(AppState::new(ctx.store.clone())).merge(metrics.router());
    let listener = tokio::net::TcpListener::bind(cfg.bind_addr)
        .await
        .with_context(|| format!("binding {}", cfg.bind_addr))?;
    info!(addr = %cfg.bind_addr, "serving");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("http server")?;

    info!("shutting down");
    scheduler.shutdown();
    ctx.close().await;
    Ok(())
}
