use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use voucher_api::auth::TokenService;
use voucher_api::cache::{CacheAside, CacheStore, NoopCache, RedisCache};
use voucher_api::campaigns::{CampaignDirectory, CampaignService, PgCampaignStore};
use voucher_api::config::AppConfig;
use voucher_api::vouchers::{PgVoucherLedger, PurchasePricing, RandomCodeGenerator, VoucherService};
use voucher_api::{create_router, db, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    // Initialize tracing subscriber for logging, RUST_LOG overrides the default level
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_level(true)
        .init();

    tracing::info!("Voucher API - Starting...");

    let config = AppConfig::from_env()?;

    // Create database connection pool and apply migrations
    tracing::info!("Connecting to database...");
    let db_pool = db::create_pool(&config).await?;
    db::run_migrations(&db_pool).await?;

    // The cache is optional; without it every lookup falls through to the database
    let cache_store: Arc<dyn CacheStore> = match &config.redis_url {
        Some(url) => match RedisCache::connect(url).await {
            Ok(redis) => Arc::new(redis),
            Err(e) => {
                tracing::warn!("Redis unavailable ({}), running with the cache disabled", e);
                Arc::new(NoopCache)
            }
        },
        None => {
            tracing::info!("REDIS_URL not set, running with the cache disabled");
            Arc::new(NoopCache)
        }
    };
    let cache = CacheAside::new(cache_store, config.cache_op_timeout);

    let campaign_store = Arc::new(PgCampaignStore::new(db_pool.clone()));
    let directory = CampaignDirectory::new(campaign_store.clone(), cache.clone(), config.campaign_cache_ttl);

    let state = AppState {
        campaign_service: CampaignService::new(campaign_store, directory.clone()),
        voucher_service: VoucherService::new(
            directory,
            Arc::new(PgVoucherLedger::new(db_pool.clone())),
            cache,
            Arc::new(RandomCodeGenerator),
            PurchasePricing::new(config.purchase_base_price),
            config.voucher_cache_ttl,
        ),
        tokens: Arc::new(TokenService::new(config.jwt_secret.clone())),
    };

    let app = create_router(state);

    // Start the Axum server
    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Voucher API is running on http://{}", addr);
    tracing::info!("Swagger UI available at http://{}/swagger-ui", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    db_pool.close().await;
    tracing::info!("Server stopped");
    Ok(())
}

/// Resolves on Ctrl-C or, on Unix, SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
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

    tracing::info!("Shutdown signal received, draining connections");
}
