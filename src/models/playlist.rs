use serde::{Deserialize, Serialize};

/// The authenticated streaming-platform user
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserProfile {
    pub id: String,
    pub display_name: Option<String>,
    pub followers: u64,
    pub image_url: Option<String>,
}

/// Parameters for a playlist to be created
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct NewPlaylist {
    pub name: String,
    pub description: String,
    pub public: bool,
}

/// A playlist that exists on the platform
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Playlist {
    pub id: String,
    pub name: String,
    /// Link to open the playlist in the platform's own UI
    pub url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaylistStatus {
    /// At least one recommendation was resolved and added
    Complete,
    /// Playlist was created but no recommendation could be resolved
    Empty,
}

/// Result of materializing recommendations as a playlist
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlaylistOutcome {
    pub playlist: Playlist,
    pub tracks_added: usize,
    pub status: PlaylistStatus,
}

impl PlaylistOutcome {
    pub fn message(&self) -> String {
        match self.status {
            PlaylistStatus::Complete => format!(
                "Created playlist '{}' with {} tracks!",
                self.playlist.name, self.tracks_added
            ),
            PlaylistStatus::Empty => {
                "Created playlist but couldn't find any tracks to add.".to_string()
            }
        }
    }
}
