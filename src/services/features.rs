use crate::models::{AcousticPlaceholders, RawTrack, TrackFeatureRow};

/// Normalizes raw track records into feature rows
///
/// One row per input track, in input order. Popularity is mapped from the platform's
/// 0..=100 scale to [0, 1] and all credited artists are kept as one joined string.
pub fn extract_features(tracks: &[RawTrack]) -> Vec<TrackFeatureRow> {
    tracks
        .iter()
        .map(|track| TrackFeatureRow {
            track_id: track.id.clone(),
            track_name: track.name.clone(),
            artist_name: track.joined_artists(),
            popularity: f64::from(track.popularity) / 100.0,
            placeholders: AcousticPlaceholders::default(),
        })
        .collect()
}
