// Process entry point: loads configuration, initializes observability,
// wires the provider registry, and serves the HTTP surface. Concrete
// provider registration is left to the deployment (none are bundled here);
// this binary boots with zero providers connected, which is a legal,
// empty-result-returning state, not an error.

use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use search_gateway::config::{self, CliArgs};
use search_gateway::{
    cache::ValueCache, facets::FacetEngine, federator::Federator, http_server,
    observability, provider_manager::ProviderManager, ranker::InMemoryRanker, registry::TypeRegistry,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliArgs::parse();
    let config = config::load(&cli)?;
    observability::init_logging_with_level(config.log_verbose, config.log_quiet)?;

    let registry = Arc::new(TypeRegistry::new());
    let manager = Arc::new(ProviderManager::new());
    let cache = Arc::new(ValueCache::new());
    let ranker = Arc::new(InMemoryRanker::new(config.ranker.to_ranker_config()));
    let federator = Arc::new(Federator::new(
        Arc::clone(&manager),
        ranker,
        config.federator_timeout(),
    ));
    let facets = Arc::new(FacetEngine::new(Arc::clone(&manager), Arc::clone(&registry), Arc::clone(&cache)));

    let state = Arc::new(http_server::AppState {
        manager,
        registry,
        cache,
        federator,
        facets,
        max_page_size: config.query.max_page_size,
    });

    let app = http_server::router(state);
    let addr: SocketAddr = format!("0.0.0.0:{}", std::env::var("PORT").unwrap_or_else(|_| "8080".to_string()))
        .parse()?;

    tracing::info!(%addr, "search gateway listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;

    let shutdown = async {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("shutdown signal received");
    };

    // Give in-flight requests a moment to complete; provider shutdown is
    // best-effort and should not block the process exit indefinitely.
    axum::serve(listener, app).with_graceful_shutdown(shutdown).await?;

    tokio::time::timeout(Duration::from_secs(5), async {}).await.ok();
    Ok(())
}
