use serde::{Deserialize, Serialize};

/// Artist credit as returned by the streaming API
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArtistRef {
    pub name: String,
}

/// Raw track record as returned by the streaming API (top tracks, search)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawTrack {
    pub id: String,
    pub name: String,
    pub artists: Vec<ArtistRef>,
    /// 0..=100 as reported by the platform
    pub popularity: u32,
    #[serde(default)]
    pub uri: Option<String>,
}

impl RawTrack {
    /// All credited artists joined into a single display string
    pub fn joined_artists(&self) -> String {
        self.artists
            .iter()
            .map(|artist| artist.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Acoustic and aggregate attributes carried by every feature row.
///
/// These are extension points: the extractor always fills them with the defaults
/// below and the recommender does not read them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AcousticPlaceholders {
    pub album_name: String,
    pub duration_ms: i64,
    pub acousticness: f64,
    pub danceability: f64,
    pub energy: f64,
    pub key: i64,
    pub loudness: f64,
    pub mode: i64,
    pub speechiness: f64,
    pub instrumentalness: f64,
    pub liveness: f64,
    pub tempo: f64,
    pub time_signature: i64,
    pub artist_avg_popularity: f64,
    pub artist_popularity_std: f64,
    pub artist_track_count: f64,
    pub artist_avg_acousticness: f64,
    pub artist_avg_danceability: f64,
    pub artist_avg_energy: f64,
    pub duration_minutes: f64,
    pub track_genre: String,
}

impl Default for AcousticPlaceholders {
    fn default() -> Self {
        Self {
            album_name: "unknown_album".to_string(),
            duration_ms: 0,
            acousticness: 0.0,
            danceability: 0.0,
            energy: 0.0,
            key: 0,
            loudness: 0.0,
            mode: 0,
            speechiness: 0.0,
            instrumentalness: 0.0,
            liveness: 0.0,
            tempo: 0.0,
            time_signature: 0,
            artist_avg_popularity: 0.0,
            artist_popularity_std: 0.0,
            artist_track_count: 0.0,
            artist_avg_acousticness: 0.0,
            artist_avg_danceability: 0.0,
            artist_avg_energy: 0.0,
            duration_minutes: 0.0,
            track_genre: "unknown".to_string(),
        }
    }
}

/// One track's extracted attributes, as stored in the feature store
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrackFeatureRow {
    /// Unique within a feature group
    pub track_id: String,
    pub track_name: String,
    /// Multiple artists are joined with ", "
    pub artist_name: String,
    /// Normalized to [0, 1]
    pub popularity: f64,
    #[serde(flatten)]
    pub placeholders: AcousticPlaceholders,
}

impl TrackFeatureRow {
    pub fn new(
        track_id: impl Into<String>,
        track_name: impl Into<String>,
        artist_name: impl Into<String>,
        popularity: f64,
    ) -> Self {
        Self {
            track_id: track_id.into(),
            track_name: track_name.into(),
            artist_name: artist_name.into(),
            popularity,
            placeholders: AcousticPlaceholders::default(),
        }
    }
}
