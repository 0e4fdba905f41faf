use std::collections::HashSet;

use crate::{
    db::FeatureStore,
    error::AppResult,
    models::{FeatureGroup, TrackFeatureRow, UploadStatus},
};

/// Uploads feature rows, skipping track ids the group already holds
///
/// Duplicate suppression is read-then-filter: two concurrent uploaders can both see
/// an id as missing. Within one batch the first occurrence of an id wins.
pub async fn upload(
    store: &dyn FeatureStore,
    group: &FeatureGroup,
    rows: Vec<TrackFeatureRow>,
) -> AppResult<UploadStatus> {
    let existing = store.read_all(group).await?;
    let mut seen: HashSet<String> = existing.into_iter().map(|row| row.track_id).collect();

    let new_rows: Vec<TrackFeatureRow> = rows
        .into_iter()
        .filter(|row| seen.insert(row.track_id.clone()))
        .collect();

    if new_rows.is_empty() {
        tracing::info!(group = %group, store = store.name(), "No new tracks to upload");
        return Ok(UploadStatus::NothingNew);
    }

    store.append(group, &new_rows).await?;

    tracing::info!(
        group = %group,
        store = store.name(),
        uploaded = new_rows.len(),
        "Uploaded new tracks"
    );

    Ok(UploadStatus::Uploaded {
        count: new_rows.len(),
    })
}
