use stock_api::{app_router, build_state, config::Config};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    let json = std::env::var("LOG_FORMAT")
        .map(|f| f.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().with_target(true)).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    init_tracing();

    let state = build_state(&config).await?;
    let app = app_router(state, config.request_timeout);

    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!("Server listening on http://{}", config.listen_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
