use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use playlist_recommender::{
    api::{create_router, AppState},
    config::Config,
    db::{create_pool, create_redis_client, Cache, PgFeatureStore},
    services::SpotifyConnector,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    let group = config.feature_store.feature_group();

    let pool = create_pool(&config.feature_store.url, &config.feature_store.api_key).await?;
    tracing::info!(feature_group = %group, "Connected to feature store");

    let (cache, cache_writer) = match &config.server.redis_url {
        Some(url) => {
            let (cache, writer) = Cache::new(create_redis_client(url)?);
            tracing::info!("Track search cache enabled");
            (Some(cache), Some(writer))
        }
        None => (None, None),
    };

    let connector = SpotifyConnector::new(&config.spotify, cache);
    let state = AppState::new(Arc::new(PgFeatureStore::new(pool)), group, Arc::new(connector));
    let app = create_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server running on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(writer) = cache_writer {
        writer.shutdown().await;
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutting down");
}
