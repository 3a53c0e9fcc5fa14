use server::build_router;
use server::clients::pgn_source::PgnSource;
use server::config;

use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = config::Config::from_env();
    tracing::info!(
        stockfish_path = %config.stockfish_path,
        analysis_time_ms = config.analysis_time.as_millis() as u64,
        "Config loaded"
    );

    let source = PgnSource::new(config.fetch_timeout)?;

    let addr = format!("{}:{}", config.host, config.port);
    let app = build_router(config, source);

    tracing::info!("Starting server on {addr}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
