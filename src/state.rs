use std::sync::Arc;

use tracing::{info, warn};

use crate::{
    config::Config,
    db,
    provider::{AlphaVantageProvider, MarketDataProvider, PlaceholderProvider},
    repository::StockRepository,
    services::StockService,
};

#[derive(Clone)]
pub struct AppState {
    pub stock_service: Arc<StockService>,
}

impl AppState {
    pub fn new(stock_service: StockService) -> Self {
        Self {
            stock_service: Arc::new(stock_service),
        }
    }
}

/// Opens the database, applies migrations and wires the service graph.
pub async fn build_state(config: &Config) -> anyhow::Result<AppState> {
    let pool = db::create_pool(&config.database_url, config.database_max_connections).await?;
    db::run_migrations(&pool).await?;
    info!(database_url = %config.database_url, "database ready");

    let provider = market_data_provider(config)?;
    info!(provider = provider.id(), "market data provider selected");

    let service = StockService::new(
        StockRepository::new(pool),
        provider,
        config.quote_cache_ttl,
    )
    .with_provider_deadline(config.provider_deadline)
    .with_indicator_cache_ttl(config.indicator_cache_ttl);
    Ok(AppState::new(service))
}

fn market_data_provider(config: &Config) -> anyhow::Result<Arc<dyn MarketDataProvider>> {
    match &config.alpha_vantage_api_key {
        Some(api_key) => {
            let provider = AlphaVantageProvider::new(
                api_key.clone(),
                config.alpha_vantage_base_url.as_str(),
                config.provider_timeout,
            )?
            .with_rate_limit(config.alpha_vantage_requests_per_minute);
            Ok(Arc::new(provider))
        }
        None => {
            warn!("ALPHA_VANTAGE_API_KEY not set, serving placeholder market data");
            Ok(Arc::new(PlaceholderProvider))
        }
    }
}
