use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use talktime_metering::{create_router, AppState, Config, NatsQuotaGateway, QuotaGateway};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "talktime-metering", version, about = "Usage metering and session lifecycle service")]
struct Args {
    /// Config file path, without extension
    #[arg(long, default_value = "config/talktime")]
    config: String,

    /// Listen address override, e.g. 0.0.0.0:9000
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let cfg = Config::load(&args.config)?;

    info!("Talktime metering v0.1.0");
    info!("Loaded config: {}", cfg.service.name);
    info!("Quota authority at {}", cfg.quota.nats_url);

    let gateway: Arc<dyn QuotaGateway> = Arc::new(
        NatsQuotaGateway::connect(
            &cfg.quota.nats_url,
            cfg.quota.subject_prefix.clone(),
            cfg.quota.call_timeout(),
        )
        .await?,
    );

    let state = AppState::new(gateway);
    let app = create_router(state);

    let addr = args
        .bind
        .unwrap_or_else(|| format!("{}:{}", cfg.service.http.bind, cfg.service.http.port));
    info!("HTTP control surface listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind HTTP listener")?;
    axum::serve(listener, app)
        .await
        .context("HTTP server error")?;

    Ok(())
}
