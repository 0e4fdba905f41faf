use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::{Path, PathBuf};

use crate::{
    config::TrainingConfig,
    db::FeatureStore,
    error::{AppError, AppResult},
    models::FeatureGroup,
    services::recommender::{FeatureVector, KnnModel, NEIGHBORHOOD_SIZE},
};

pub const MODEL_FILE: &str = "knn_model.json";
pub const METADATA_FILE: &str = "metadata.json";

const MODEL_DESCRIPTION: &str =
    "Content-based recommendation model using KNN. This model uses cosine distance with 10 neighbors.";

/// Registry entry describing a trained model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub name: String,
    pub description: String,
    pub feature_group: FeatureGroup,
    pub metrics: serde_json::Value,
    /// Encoded vector of the first corpus row
    pub input_example: Option<FeatureVector>,
    pub rows: usize,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    Registered,
    AlreadyRegistered,
}

#[derive(Debug, Clone)]
pub struct TrainingReport {
    pub model_path: PathBuf,
    pub rows: usize,
    pub registration: Registration,
}

fn io_error(path: &Path, e: std::io::Error) -> AppError {
    AppError::Internal(format!("Failed to write {}: {}", path.display(), e))
}

/// Fits the same model the live path builds and persists it with a registry entry
///
/// The artifact is informational; request handling always refits from the store.
pub async fn train(
    store: &dyn FeatureStore,
    group: &FeatureGroup,
    config: &TrainingConfig,
) -> AppResult<TrainingReport> {
    let corpus = store.read_all(group).await?;
    tracing::info!(rows = corpus.len(), feature_group = %group, "Fitting model");

    let model = KnnModel::fit(&corpus)?;
    let model_path = save_model(&model, Path::new(&config.dir)).await?;

    let metadata = ModelMetadata {
        name: config.name.clone(),
        description: MODEL_DESCRIPTION.to_string(),
        feature_group: group.clone(),
        metrics: json!({ "Number of neighbors": NEIGHBORHOOD_SIZE }),
        input_example: model.vector(0).copied(),
        rows: corpus.len(),
        created_at: Utc::now(),
    };
    let registration = register(Path::new(&config.registry_dir), &metadata, &model_path).await?;

    Ok(TrainingReport {
        model_path,
        rows: corpus.len(),
        registration,
    })
}

pub async fn save_model(model: &KnnModel, dir: &Path) -> AppResult<PathBuf> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| io_error(dir, e))?;

    let path = dir.join(MODEL_FILE);
    let bytes = serde_json::to_vec_pretty(model)
        .map_err(|e| AppError::Internal(format!("Failed to serialize model: {}", e)))?;
    tokio::fs::write(&path, bytes)
        .await
        .map_err(|e| io_error(&path, e))?;

    tracing::info!(path = %path.display(), "Model saved");
    Ok(path)
}

/// Registers the model under `{registry}/{name}/`; an existing entry is left untouched
pub async fn register(
    registry: &Path,
    metadata: &ModelMetadata,
    model_path: &Path,
) -> AppResult<Registration> {
    let entry = registry.join(&metadata.name);
    let metadata_path = entry.join(METADATA_FILE);

    if tokio::fs::try_exists(&metadata_path)
        .await
        .map_err(|e| io_error(&metadata_path, e))?
    {
        tracing::info!(model = %metadata.name, "Model already registered, skipping");
        return Ok(Registration::AlreadyRegistered);
    }

    tokio::fs::create_dir_all(&entry)
        .await
        .map_err(|e| io_error(&entry, e))?;

    let model_copy = entry.join(MODEL_FILE);
    tokio::fs::copy(model_path, &model_copy)
        .await
        .map_err(|e| io_error(&model_copy, e))?;

    let bytes = serde_json::to_vec_pretty(metadata)
        .map_err(|e| AppError::Internal(format!("Failed to serialize metadata: {}", e)))?;
    tokio::fs::write(&metadata_path, bytes)
        .await
        .map_err(|e| io_error(&metadata_path, e))?;

    tracing::info!(model = %metadata.name, path = %entry.display(), "Model registered");
    Ok(Registration::Registered)
}
