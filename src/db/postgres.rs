use sqlx::{
    postgres::{PgConnectOptions, PgPoolOptions},
    types::Json,
    PgPool,
};

use crate::{
    db::FeatureStore,
    error::{AppError, AppResult},
    models::{AcousticPlaceholders, FeatureGroup, TrackFeatureRow},
};

/// Creates a PostgreSQL connection pool for the feature store
///
/// The feature store API key is the connection credential, so it is applied as the
/// password on top of whatever the URL carries. Pending migrations run before the
/// pool is handed out.
pub async fn create_pool(database_url: &str, api_key: &str) -> anyhow::Result<PgPool> {
    let options = database_url
        .parse::<PgConnectOptions>()?
        .password(api_key);

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(pool)
}

#[derive(sqlx::FromRow)]
struct FeatureRowRecord {
    track_id: String,
    track_name: String,
    artist_name: String,
    popularity: f64,
    placeholders: Json<AcousticPlaceholders>,
}

impl From<FeatureRowRecord> for TrackFeatureRow {
    fn from(record: FeatureRowRecord) -> Self {
        Self {
            track_id: record.track_id,
            track_name: record.track_name,
            artist_name: record.artist_name,
            popularity: record.popularity,
            placeholders: record.placeholders.0,
        }
    }
}

/// Feature store backed by a single Postgres table keyed by
/// `(feature_group, version, track_id)`
#[derive(Clone)]
pub struct PgFeatureStore {
    pool: PgPool,
}

impl PgFeatureStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Versions are stored as INTEGER; anything above `i32::MAX` is rejected
fn version_column(group: &FeatureGroup) -> AppResult<i32> {
    i32::try_from(group.version).map_err(|_| {
        AppError::FeatureStore(format!(
            "Feature group version {} does not fit the version column",
            group.version
        ))
    })
}

#[async_trait::async_trait]
impl FeatureStore for PgFeatureStore {
    async fn read_all(&self, group: &FeatureGroup) -> AppResult<Vec<TrackFeatureRow>> {
        let version = version_column(group)?;
        let records = sqlx::query_as::<_, FeatureRowRecord>(
            r#"
            SELECT track_id, track_name, artist_name, popularity, placeholders
            FROM feature_rows
            WHERE feature_group = $1 AND version = $2
            ORDER BY seq
            "#,
        )
        .bind(&group.name)
        .bind(version)
        .fetch_all(&self.pool)
        .await?;

        tracing::debug!(group = %group, rows = records.len(), "Read feature group");

        Ok(records.into_iter().map(TrackFeatureRow::from).collect())
    }

    async fn append(&self, group: &FeatureGroup, rows: &[TrackFeatureRow]) -> AppResult<()> {
        let version = version_column(group)?;
        let mut tx = self.pool.begin().await?;

        // A racing writer for the same id wins by writing last
        for row in rows {
            sqlx::query(
                r#"
                INSERT INTO feature_rows
                    (feature_group, version, track_id, track_name, artist_name, popularity, placeholders)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                ON CONFLICT (feature_group, version, track_id) DO UPDATE SET
                    track_name = EXCLUDED.track_name,
                    artist_name = EXCLUDED.artist_name,
                    popularity = EXCLUDED.popularity,
                    placeholders = EXCLUDED.placeholders
                "#,
            )
            .bind(&group.name)
            .bind(version)
            .bind(&row.track_id)
            .bind(&row.track_name)
            .bind(&row.artist_name)
            .bind(row.popularity)
            .bind(Json(&row.placeholders))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        tracing::info!(group = %group, rows = rows.len(), "Appended rows to feature group");

        Ok(())
    }

    fn name(&self) -> &'static str {
        "postgres"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_column_accepts_integer_range() {
        assert_eq!(
            version_column(&FeatureGroup::new("recommender_spotify", 2)).unwrap(),
            2
        );
        assert_eq!(
            version_column(&FeatureGroup::new("recommender_spotify", i32::MAX as u32)).unwrap(),
            i32::MAX
        );
    }

    #[tokio::test]
    async fn test_oversized_version_is_rejected_before_querying() {
        // Lazy pool: nothing is dialled unless a query actually runs
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://recommender@localhost:5432/feature_store")
            .unwrap();
        let store = PgFeatureStore::new(pool);
        let group = FeatureGroup::new("recommender_spotify", u32::MAX);

        let err = store.read_all(&group).await.unwrap_err();
        assert!(matches!(err, AppError::FeatureStore(_)));

        let err = store
            .append(&group, &[TrackFeatureRow::new("1", "Song A", "X", 0.5)])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::FeatureStore(_)));
    }
}
