/// Spotify Web API provider
///
/// API Flow:
/// 1. Profile: GET /me
/// 2. Recent listening: GET /me/top/tracks?time_range=short_term
/// 3. Resolve a recommendation: GET /search?type=track&limit=1
/// 4. Materialize: POST /users/{id}/playlists, then POST /playlists/{id}/tracks
use crate::{
    cached,
    db::{Cache, CacheKey},
    error::{AppError, AppResult},
    models::{NewPlaylist, Playlist, RawTrack, TimeRange, UserProfile},
    services::{
        auth::{SpotifyAuth, SpotifyToken},
        providers::MusicProvider,
    },
};
use chrono::Utc;
use reqwest::{Client as HttpClient, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

const SEARCH_CACHE_TTL: u64 = 86400; // 1 day

/// Spotify accepts at most this many URIs per add-items call
const ADD_ITEMS_BATCH: usize = 100;

#[derive(Debug, Deserialize)]
struct TopTracksResponse {
    items: Vec<RawTrack>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    tracks: SearchTracks,
}

#[derive(Debug, Deserialize)]
struct SearchTracks {
    items: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    uri: String,
}

#[derive(Debug, Deserialize)]
struct SpotifyUser {
    id: String,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    followers: Option<SpotifyFollowers>,
    #[serde(default)]
    images: Option<Vec<SpotifyImage>>,
}

#[derive(Debug, Deserialize)]
struct SpotifyFollowers {
    total: u64,
}

#[derive(Debug, Deserialize)]
struct SpotifyImage {
    url: String,
}

impl From<SpotifyUser> for UserProfile {
    fn from(user: SpotifyUser) -> Self {
        Self {
            id: user.id,
            display_name: user.display_name,
            followers: user.followers.map(|f| f.total).unwrap_or(0),
            image_url: user
                .images
                .and_then(|images| images.into_iter().next())
                .map(|image| image.url),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SpotifyPlaylist {
    id: String,
    name: String,
    #[serde(default)]
    external_urls: HashMap<String, String>,
}

impl From<SpotifyPlaylist> for Playlist {
    fn from(mut playlist: SpotifyPlaylist) -> Self {
        Self {
            url: playlist.external_urls.remove("spotify"),
            id: playlist.id,
            name: playlist.name,
        }
    }
}

#[derive(Debug, Serialize)]
struct AddItemsRequest<'a> {
    uris: &'a [String],
}

/// Maps a non-success response onto the error taxonomy
async fn check_status(response: Response) -> AppResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(AppError::Auth(format!(
            "Spotify API returned status {}: {}",
            status, body
        ))),
        _ => Err(AppError::StreamingApi(format!(
            "Spotify API returned status {}: {}",
            status, body
        ))),
    }
}

/// One authenticated user's handle on the Spotify Web API
pub struct SpotifyProvider {
    http_client: HttpClient,
    api_url: String,
    token: RwLock<SpotifyToken>,
    /// Used to refresh an expired token; without it expiry is an auth error
    auth: Option<Arc<SpotifyAuth>>,
    cache: Option<Cache>,
}

impl SpotifyProvider {
    pub fn new(
        api_url: String,
        token: SpotifyToken,
        auth: Option<Arc<SpotifyAuth>>,
        cache: Option<Cache>,
    ) -> Self {
        Self {
            http_client: HttpClient::new(),
            api_url: api_url.trim_end_matches('/').to_string(),
            token: RwLock::new(token),
            auth,
            cache,
        }
    }

    /// Current access token, refreshed first when it is about to expire
    async fn bearer(&self) -> AppResult<String> {
        {
            let token = self.token.read().await;
            if !token.is_expired(Utc::now()) {
                return Ok(token.access_token.clone());
            }
        }

        let mut token = self.token.write().await;
        if token.is_expired(Utc::now()) {
            let auth = self.auth.as_ref().ok_or_else(|| {
                AppError::Auth("Spotify access token expired".to_string())
            })?;
            let refreshed = auth.refresh(&token).await?;
            *token = refreshed;
            tracing::info!(expires_at = %token.expires_at, "Spotify access token refreshed");
        }

        Ok(token.access_token.clone())
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> AppResult<T> {
        let token = self.bearer().await?;
        let response = self
            .http_client
            .get(format!("{}{}", self.api_url, path))
            .bearer_auth(token)
            .query(query)
            .send()
            .await?;

        Ok(check_status(response).await?.json().await?)
    }

    async fn post_json<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> AppResult<Response> {
        let token = self.bearer().await?;
        let response = self
            .http_client
            .post(format!("{}{}", self.api_url, path))
            .bearer_auth(token)
            .json(body)
            .send()
            .await?;

        check_status(response).await
    }
}

#[async_trait::async_trait]
impl MusicProvider for SpotifyProvider {
    async fn current_user(&self) -> AppResult<UserProfile> {
        let user: SpotifyUser = self.get_json("/me", &[]).await?;
        Ok(user.into())
    }

    async fn top_tracks(&self, limit: u32, time_range: TimeRange) -> AppResult<Vec<RawTrack>> {
        let limit = limit.to_string();
        let response: TopTracksResponse = self
            .get_json(
                "/me/top/tracks",
                &[("limit", limit.as_str()), ("time_range", time_range.as_str())],
            )
            .await?;

        tracing::info!(
            tracks = response.items.len(),
            time_range = time_range.as_str(),
            provider = "spotify",
            "Top tracks fetched"
        );

        Ok(response.items)
    }

    async fn search_track_uri(&self, query: &str) -> AppResult<Option<String>> {
        cached!(
            self.cache.as_ref(),
            CacheKey::TrackSearch(query.to_string()),
            SEARCH_CACHE_TTL,
            async move {
                let response: SearchResponse = self
                    .get_json(
                        "/search",
                        &[("q", query), ("type", "track"), ("limit", "1")],
                    )
                    .await?;

                let uri = response.tracks.items.into_iter().next().map(|hit| hit.uri);
                tracing::debug!(query = %query, found = uri.is_some(), "Track search completed");

                Ok::<_, AppError>(uri)
            }
        )
    }

    async fn create_playlist(&self, user_id: &str, playlist: &NewPlaylist) -> AppResult<Playlist> {
        let response = self
            .post_json(&format!("/users/{}/playlists", user_id), playlist)
            .await?;
        let created: SpotifyPlaylist = response.json().await?;

        tracing::info!(
            playlist_id = %created.id,
            name = %created.name,
            public = playlist.public,
            "Playlist created"
        );

        Ok(created.into())
    }

    async fn add_items(&self, playlist_id: &str, uris: &[String]) -> AppResult<()> {
        for batch in uris.chunks(ADD_ITEMS_BATCH) {
            self.post_json(
                &format!("/playlists/{}/tracks", playlist_id),
                &AddItemsRequest { uris: batch },
            )
            .await?;
        }

        tracing::info!(playlist_id = %playlist_id, items = uris.len(), "Items added to playlist");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "spotify"
    }
}
