use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use playlist_recommender::{
    config::{FeatureStoreConfig, TrainingConfig},
    db::{create_pool, PgFeatureStore},
    services::training::{self, Registration},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let feature_store = FeatureStoreConfig::from_env()?;
    let training_config = TrainingConfig::from_env()?;
    let group = feature_store.feature_group();

    let pool = create_pool(&feature_store.url, &feature_store.api_key).await?;
    let store = PgFeatureStore::new(pool);

    let report = training::train(&store, &group, &training_config).await?;

    match report.registration {
        Registration::Registered => tracing::info!(
            model = %training_config.name,
            rows = report.rows,
            path = %report.model_path.display(),
            "Model trained and registered"
        ),
        Registration::AlreadyRegistered => tracing::info!(
            model = %training_config.name,
            rows = report.rows,
            "Model trained; registry entry already existed"
        ),
    }

    Ok(())
}
