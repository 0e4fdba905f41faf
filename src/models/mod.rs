use serde::{Deserialize, Serialize};
use std::fmt::Display;

pub mod playlist;
pub mod track;

pub use playlist::{NewPlaylist, Playlist, PlaylistOutcome, PlaylistStatus, UserProfile};
pub use track::{AcousticPlaceholders, ArtistRef, RawTrack, TrackFeatureRow};

/// A named, versioned collection in the feature store
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FeatureGroup {
    pub name: String,
    pub version: u32,
}

impl FeatureGroup {
    pub fn new(name: impl Into<String>, version: u32) -> Self {
        Self {
            name: name.into(),
            version,
        }
    }
}

impl Display for FeatureGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}_v{}", self.name, self.version)
    }
}

/// A single recommended track, as shown to the user
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Recommendation {
    pub track_name: String,
    pub artist_name: String,
}

impl Recommendation {
    pub fn new(track_name: impl Into<String>, artist_name: impl Into<String>) -> Self {
        Self {
            track_name: track_name.into(),
            artist_name: artist_name.into(),
        }
    }

    /// Exact-match search query understood by the streaming API
    pub fn search_query(&self) -> String {
        format!("track:{} artist:{}", self.track_name, self.artist_name)
    }
}

/// Time window for the user's top tracks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TimeRange {
    /// Roughly the last four weeks
    #[default]
    ShortTerm,
    MediumTerm,
    LongTerm,
}

impl TimeRange {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeRange::ShortTerm => "short_term",
            TimeRange::MediumTerm => "medium_term",
            TimeRange::LongTerm => "long_term",
        }
    }
}

/// Outcome of a feature store upload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UploadStatus {
    /// Every identifier was already present, nothing was written
    NothingNew,
    Uploaded { count: usize },
}

impl Display for UploadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UploadStatus::NothingNew => {
                write!(f, "No new tracks to upload. Using existing data.")
            }
            UploadStatus::Uploaded { count } => {
                write!(f, "Uploaded {} new tracks to the feature store", count)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_group_display() {
        let group = FeatureGroup::new("recommender_spotify", 2);
        assert_eq!(format!("{}", group), "recommender_spotify_v2");
    }

    #[test]
    fn test_search_query_format() {
        let rec = Recommendation::new("Song A", "X, Y");
        assert_eq!(rec.search_query(), "track:Song A artist:X, Y");
    }

    #[test]
    fn test_time_range_serialization() {
        assert_eq!(TimeRange::default().as_str(), "short_term");
        let json = serde_json::to_string(&TimeRange::LongTerm).unwrap();
        assert_eq!(json, "\"long_term\"");
    }

    #[test]
    fn test_upload_status_messages() {
        assert_eq!(
            UploadStatus::NothingNew.to_string(),
            "No new tracks to upload. Using existing data."
        );
        assert_eq!(
            UploadStatus::Uploaded { count: 3 }.to_string(),
            "Uploaded 3 new tracks to the feature store"
        );
    }
}
