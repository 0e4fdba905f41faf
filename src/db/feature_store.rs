/// Feature store abstraction
///
/// The recommender only ever needs two operations from the store: read a whole
/// feature group and append rows to it. Uniqueness and versioning semantics belong
/// to the backend.
use crate::{
    error::AppResult,
    models::{FeatureGroup, TrackFeatureRow},
};

#[async_trait::async_trait]
pub trait FeatureStore: Send + Sync {
    /// Returns every row of the feature group in insertion order
    async fn read_all(&self, group: &FeatureGroup) -> AppResult<Vec<TrackFeatureRow>>;

    /// Appends rows and returns once the write is durable
    async fn append(&self, group: &FeatureGroup, rows: &[TrackFeatureRow]) -> AppResult<()>;

    /// Backend name for logging
    fn name(&self) -> &'static str;
}
