use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::RwLock;

use crate::{
    db::FeatureStore,
    error::AppResult,
    models::{FeatureGroup, TrackFeatureRow},
};

/// In-process feature store used for local runs and tests
///
/// Mirrors the Postgres backend: rows keep insertion order and a write for an
/// existing track id replaces the stored row in place.
#[derive(Default)]
pub struct MemoryFeatureStore {
    groups: RwLock<HashMap<FeatureGroup, Vec<TrackFeatureRow>>>,
    writes: AtomicUsize,
}

impl MemoryFeatureStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store already holding `rows` for `group`
    pub fn with_rows(group: &FeatureGroup, rows: Vec<TrackFeatureRow>) -> Self {
        let mut groups = HashMap::new();
        groups.insert(group.clone(), rows);
        Self {
            groups: RwLock::new(groups),
            writes: AtomicUsize::new(0),
        }
    }

    /// Number of append calls that reached the store
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl FeatureStore for MemoryFeatureStore {
    async fn read_all(&self, group: &FeatureGroup) -> AppResult<Vec<TrackFeatureRow>> {
        let groups = self.groups.read().await;
        Ok(groups.get(group).cloned().unwrap_or_default())
    }

    async fn append(&self, group: &FeatureGroup, rows: &[TrackFeatureRow]) -> AppResult<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);

        let mut groups = self.groups.write().await;
        let stored = groups.entry(group.clone()).or_default();
        for row in rows {
            match stored.iter_mut().find(|r| r.track_id == row.track_id) {
                Some(existing) => *existing = row.clone(),
                None => stored.push(row.clone()),
            }
        }

        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_unknown_group_is_empty() {
        let store = MemoryFeatureStore::new();
        let rows = store
            .read_all(&FeatureGroup::new("missing", 1))
            .await
            .unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn test_append_keeps_order_and_replaces_same_id() {
        let group = FeatureGroup::new("recommender_spotify", 2);
        let store = MemoryFeatureStore::new();

        store
            .append(
                &group,
                &[
                    TrackFeatureRow::new("1", "Song A", "X", 0.5),
                    TrackFeatureRow::new("2", "Song B", "Y", 0.1),
                ],
            )
            .await
            .unwrap();
        store
            .append(&group, &[TrackFeatureRow::new("1", "Song A", "X", 0.7)])
            .await
            .unwrap();

        let rows = store.read_all(&group).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].track_id, "1");
        assert_eq!(rows[0].popularity, 0.7);
        assert_eq!(rows[1].track_id, "2");
        assert_eq!(store.write_count(), 2);
    }

    #[test]
    fn test_groups_are_isolated_by_version() {
        let v1 = FeatureGroup::new("recommender_spotify", 1);
        let v2 = FeatureGroup::new("recommender_spotify", 2);
        let store = MemoryFeatureStore::with_rows(&v1, vec![TrackFeatureRow::new("1", "A", "X", 0.1)]);

        let rows = tokio_test::assert_ok!(tokio_test::block_on(store.read_all(&v1)));
        assert_eq!(rows.len(), 1);
        assert!(tokio_test::block_on(store.read_all(&v2)).unwrap().is_empty());
    }
}
