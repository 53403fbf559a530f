use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use parish_throttle::config::{Args, LogFormat};
use parish_throttle::handlers::router;
use parish_throttle::state::AppState;
use parish_throttle::sweeper::run_sweeper;

fn init_logging(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("parish_throttle=info"));

    match format {
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.log_format);

    // bad presets stop us here, before any traffic is served
    let settings = args.into_settings().context("invalid configuration")?;
    let state = Arc::new(AppState::from_settings(&settings));

    if let Some(every) = settings.sweep_interval {
        tokio::spawn(run_sweeper(state.limiter.clone(), every));
    }

    for view in settings.presets.views() {
        info!(
            preset = view.name,
            max_requests = view.max_requests,
            window_ms = view.window_ms,
            "rate limit preset"
        );
    }

    let app = router(state);

    let addr = format!("0.0.0.0:{}", settings.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    info!(%addr, cleanup = ?settings.cleanup, "parish-throttle listening");
    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
