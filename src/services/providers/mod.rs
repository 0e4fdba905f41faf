/// Streaming-platform provider abstraction
///
/// The core never runs the OAuth flow. It receives a ready, authenticated provider
/// and uses it for exactly these operations: read the user's profile and top tracks,
/// resolve a track by search, create a playlist and add items to it.
use crate::{
    error::AppResult,
    models::{NewPlaylist, Playlist, RawTrack, TimeRange, UserProfile},
};

pub mod spotify;

pub use spotify::SpotifyProvider;

#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait MusicProvider: Send + Sync {
    /// Profile of the authenticated user
    async fn current_user(&self) -> AppResult<UserProfile>;

    /// The user's most played tracks over `time_range`
    async fn top_tracks(&self, limit: u32, time_range: TimeRange) -> AppResult<Vec<RawTrack>>;

    /// URI of the first track hit for `query`, `None` when nothing matches
    async fn search_track_uri(&self, query: &str) -> AppResult<Option<String>>;

    async fn create_playlist(&self, user_id: &str, playlist: &NewPlaylist) -> AppResult<Playlist>;

    /// Attaches `uris` to the playlist in one batch
    async fn add_items(&self, playlist_id: &str, uris: &[String]) -> AppResult<()>;

    /// Provider name for logging
    fn name(&self) -> &'static str;
}
