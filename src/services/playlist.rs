use chrono::NaiveDate;

use crate::{
    error::AppResult,
    models::{NewPlaylist, PlaylistOutcome, PlaylistStatus, Recommendation},
    services::providers::MusicProvider,
};

const PLAYLIST_DESCRIPTION: &str = "Personalized recommendations based on your listening history";

pub fn playlist_name(today: NaiveDate) -> String {
    format!("Recommended Tracks {}", today.format("%Y-%m-%d"))
}

/// Materializes recommendations as a new private playlist
///
/// Each (track, artist) pair is resolved with an exact-match search; pairs without a
/// hit are skipped. All resolved URIs are attached in one batch. The playlist is
/// created even when nothing resolves, which is reported as [`PlaylistStatus::Empty`].
pub async fn create_playlist(
    provider: &dyn MusicProvider,
    recommendations: &[Recommendation],
    today: NaiveDate,
) -> AppResult<PlaylistOutcome> {
    let user = provider.current_user().await?;

    let request = NewPlaylist {
        name: playlist_name(today),
        description: PLAYLIST_DESCRIPTION.to_string(),
        public: false,
    };
    let playlist = provider.create_playlist(&user.id, &request).await?;

    let mut uris = Vec::with_capacity(recommendations.len());
    for rec in recommendations {
        match provider.search_track_uri(&rec.search_query()).await? {
            Some(uri) => uris.push(uri),
            None => tracing::debug!(
                track = %rec.track_name,
                artist = %rec.artist_name,
                "No search hit, skipping"
            ),
        }
    }

    let status = if uris.is_empty() {
        PlaylistStatus::Empty
    } else {
        provider.add_items(&playlist.id, &uris).await?;
        PlaylistStatus::Complete
    };

    tracing::info!(
        playlist_id = %playlist.id,
        requested = recommendations.len(),
        added = uris.len(),
        provider = provider.name(),
        "Playlist materialized"
    );

    Ok(PlaylistOutcome {
        playlist,
        tracks_added: uris.len(),
        status,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::models::{Playlist, UserProfile};
    use crate::services::providers::MockMusicProvider;
    use mockall::predicate::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 14).unwrap()
    }

    fn provider_with_playlist() -> MockMusicProvider {
        let mut provider = MockMusicProvider::new();
        provider.expect_current_user().times(1).returning(|| {
            Ok(UserProfile {
                id: "user-1".to_string(),
                display_name: Some("Listener".to_string()),
                followers: 0,
                image_url: None,
            })
        });
        provider
            .expect_create_playlist()
            .withf(|user_id, playlist| {
                user_id == "user-1"
                    && playlist.name == "Recommended Tracks 2025-03-14"
                    && !playlist.public
            })
            .times(1)
            .returning(|_, playlist| {
                Ok(Playlist {
                    id: "pl-1".to_string(),
                    name: playlist.name.clone(),
                    url: Some("https://open.spotify.com/playlist/pl-1".to_string()),
                })
            });
        provider.expect_name().return_const("mock");
        provider
    }

    #[test]
    fn test_playlist_name_includes_date() {
        assert_eq!(playlist_name(today()), "Recommended Tracks 2025-03-14");
    }

    #[tokio::test]
    async fn test_resolved_tracks_are_added_in_one_batch() {
        let mut provider = provider_with_playlist();
        provider
            .expect_search_track_uri()
            .with(eq("track:Song A artist:X"))
            .returning(|_| Ok(Some("spotify:track:a".to_string())));
        provider
            .expect_search_track_uri()
            .with(eq("track:Song B artist:Y"))
            .returning(|_| Ok(None));
        provider
            .expect_search_track_uri()
            .with(eq("track:Song C artist:Z"))
            .returning(|_| Ok(Some("spotify:track:c".to_string())));
        provider
            .expect_add_items()
            .withf(|playlist_id, uris| {
                playlist_id == "pl-1"
                    && uris == ["spotify:track:a".to_string(), "spotify:track:c".to_string()]
            })
            .times(1)
            .returning(|_, _| Ok(()));

        let recs = vec![
            Recommendation::new("Song A", "X"),
            Recommendation::new("Song B", "Y"),
            Recommendation::new("Song C", "Z"),
        ];
        let outcome = create_playlist(&provider, &recs, today()).await.unwrap();

        assert_eq!(outcome.tracks_added, 2);
        assert_eq!(outcome.status, PlaylistStatus::Complete);
        assert_eq!(outcome.playlist.id, "pl-1");
        assert_eq!(
            outcome.message(),
            "Created playlist 'Recommended Tracks 2025-03-14' with 2 tracks!"
        );
    }

    #[tokio::test]
    async fn test_no_resolved_tracks_still_creates_playlist() {
        let mut provider = provider_with_playlist();
        provider
            .expect_search_track_uri()
            .returning(|_| Ok(None));
        provider.expect_add_items().times(0);

        let recs = vec![Recommendation::new("Unknown", "Nobody")];
        let outcome = create_playlist(&provider, &recs, today()).await.unwrap();

        assert_eq!(outcome.tracks_added, 0);
        assert_eq!(outcome.status, PlaylistStatus::Empty);
        assert_eq!(
            outcome.playlist.url.as_deref(),
            Some("https://open.spotify.com/playlist/pl-1")
        );
    }

    #[tokio::test]
    async fn test_search_failure_aborts() {
        let mut provider = provider_with_playlist();
        provider
            .expect_search_track_uri()
            .returning(|_| Err(AppError::Auth("token revoked".to_string())));
        provider.expect_add_items().times(0);

        let recs = vec![Recommendation::new("Song A", "X")];
        let err = create_playlist(&provider, &recs, today()).await.unwrap_err();

        assert!(matches!(err, AppError::Auth(_)));
    }
}
