use std::sync::{Arc, Mutex};

use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum_test::TestServer;

use playlist_recommender::{
    api::{create_router, state::MAX_PENDING_LOGINS, AppState},
    db::{FeatureStore, MemoryFeatureStore},
    error::{AppError, AppResult},
    models::{
        ArtistRef, FeatureGroup, NewPlaylist, Playlist, RawTrack, TimeRange, TrackFeatureRow,
        UserProfile,
    },
    services::{providers::MusicProvider, SessionConnector, SessionContext},
};

/// Provider that serves one top track and resolves searches for it only
#[derive(Default)]
struct FakeProvider {
    added: Mutex<Vec<String>>,
}

#[async_trait::async_trait]
impl MusicProvider for FakeProvider {
    async fn current_user(&self) -> AppResult<UserProfile> {
        Ok(UserProfile {
            id: "listener".to_string(),
            display_name: Some("Test Listener".to_string()),
            followers: 3,
            image_url: None,
        })
    }

    async fn top_tracks(&self, limit: u32, _time_range: TimeRange) -> AppResult<Vec<RawTrack>> {
        assert_eq!(limit, 10);
        Ok(vec![RawTrack {
            id: "1".to_string(),
            name: "Song A".to_string(),
            artists: vec![ArtistRef {
                name: "X".to_string(),
            }],
            popularity: 90,
            uri: Some("spotify:track:1".to_string()),
        }])
    }

    async fn search_track_uri(&self, query: &str) -> AppResult<Option<String>> {
        Ok((query == "track:Song A artist:X").then(|| "spotify:track:1".to_string()))
    }

    async fn create_playlist(&self, _user_id: &str, playlist: &NewPlaylist) -> AppResult<Playlist> {
        Ok(Playlist {
            id: "pl-1".to_string(),
            name: playlist.name.clone(),
            url: Some("https://open.spotify.com/playlist/pl-1".to_string()),
        })
    }

    async fn add_items(&self, _playlist_id: &str, uris: &[String]) -> AppResult<()> {
        self.added.lock().unwrap().extend_from_slice(uris);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

struct FakeConnector;

#[async_trait::async_trait]
impl SessionConnector for FakeConnector {
    fn authorize_url(&self, state: &str) -> AppResult<String> {
        Ok(format!(
            "https://accounts.example.com/authorize?client_id=test&state={}",
            state
        ))
    }

    async fn connect(&self, code: &str) -> AppResult<Arc<dyn MusicProvider>> {
        if code == "good" {
            Ok(Arc::new(FakeProvider::default()))
        } else {
            Err(AppError::Auth("invalid_grant".to_string()))
        }
    }
}

fn group() -> FeatureGroup {
    FeatureGroup::new("recommender_spotify", 2)
}

fn create_test_state() -> (AppState, Arc<MemoryFeatureStore>) {
    let store = Arc::new(MemoryFeatureStore::with_rows(
        &group(),
        vec![TrackFeatureRow::new("2", "Song B", "Y", 0.1)],
    ));
    let state = AppState::new(store.clone(), group(), Arc::new(FakeConnector));
    (state, store)
}

fn create_test_server() -> (TestServer, Arc<MemoryFeatureStore>) {
    let (state, store) = create_test_state();
    let app = create_router(state);
    (TestServer::new(app).unwrap(), store)
}

fn location(response: &axum_test::TestResponse) -> String {
    response
        .header("location")
        .to_str()
        .unwrap()
        .to_string()
}

/// Runs login + callback and returns the new session's id
async fn connect(server: &TestServer) -> String {
    let response = server.get("/auth/login").await;
    response.assert_status(StatusCode::SEE_OTHER);
    let authorize = location(&response);
    let (_, state) = authorize.rsplit_once("state=").unwrap();

    let response = server
        .get(&format!("/auth/callback?code=good&state={}", state))
        .await;
    response.assert_status(StatusCode::SEE_OTHER);

    location(&response)
        .strip_prefix("/sessions/")
        .unwrap()
        .to_string()
}

#[tokio::test]
async fn test_health_check() {
    let (server, _) = create_test_server();
    let response = server.get("/health").await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let (server, _) = create_test_server();
    let response = server
        .get("/health")
        .add_header(
            HeaderName::from_static("x-request-id"),
            HeaderValue::from_static("req-42"),
        )
        .await;

    assert_eq!(response.header("x-request-id"), "req-42");
}

#[tokio::test]
async fn test_landing_page_links_to_login() {
    let (server, _) = create_test_server();
    let response = server.get("/").await;
    response.assert_status_ok();
    assert!(response.text().contains("Connect Spotify"));
}

#[tokio::test]
async fn test_login_redirects_to_authorize_url() {
    let (server, _) = create_test_server();
    let response = server.get("/auth/login").await;

    response.assert_status(StatusCode::SEE_OTHER);
    assert!(location(&response).starts_with("https://accounts.example.com/authorize"));
}

#[tokio::test]
async fn test_callback_rejects_unknown_state() {
    let (server, _) = create_test_server();
    let response = server
        .get("/auth/callback?code=good&state=6f1c1f9e-3b0a-4b8e-9a57-1f2a3b4c5d6e")
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_callback_with_denied_access() {
    let (server, _) = create_test_server();
    let response = server.get("/auth/callback?error=access_denied").await;

    response.assert_status(StatusCode::UNAUTHORIZED);
    let body: serde_json::Value = response.json();
    assert!(body["error"].as_str().unwrap().contains("access_denied"));
}

#[tokio::test]
async fn test_callback_with_rejected_code() {
    let (server, _) = create_test_server();
    let authorize = location(&server.get("/auth/login").await);
    let (_, state) = authorize.rsplit_once("state=").unwrap();

    let response = server
        .get(&format!("/auth/callback?code=bad&state={}", state))
        .await;

    response.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_login_state_is_single_use() {
    let (server, _) = create_test_server();
    let authorize = location(&server.get("/auth/login").await);
    let (_, state) = authorize.rsplit_once("state=").unwrap();

    let callback = format!("/auth/callback?code=good&state={}", state);
    server.get(&callback).await.assert_status(StatusCode::SEE_OTHER);
    server.get(&callback).await.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_connected_session_exposes_profile() {
    let (server, _) = create_test_server();
    let id = connect(&server).await;

    let response = server.get(&format!("/api/sessions/{}", id)).await;
    response.assert_status_ok();
    let session: serde_json::Value = response.json();
    assert_eq!(session["connected"], true);
    assert_eq!(session["busy"], false);
    assert_eq!(session["profile"]["display_name"], "Test Listener");
    assert!(session["recommendations"].is_null());
}

#[tokio::test]
async fn test_recommendation_and_playlist_flow() {
    let (server, store) = create_test_server();
    let id = connect(&server).await;

    let response = server
        .post(&format!("/api/sessions/{}/recommendations", id))
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    let recommendations = body["recommendations"].as_array().unwrap();
    assert_eq!(recommendations.len(), 2);
    assert_eq!(recommendations[0]["track_name"], "Song A");
    assert_eq!(recommendations[1]["track_name"], "Song B");
    assert!(body["transcript"]
        .as_array()
        .unwrap()
        .iter()
        .any(|line| line == "Uploaded 1 new tracks to the feature store"));
    assert_eq!(store.read_all(&group()).await.unwrap().len(), 2);

    let response = server.post(&format!("/api/sessions/{}/playlist", id)).await;
    response.assert_status(StatusCode::CREATED);
    let body: serde_json::Value = response.json();
    assert_eq!(body["tracks_added"], 1);
    assert_eq!(body["status"], "complete");
    assert!(body["playlist"]["name"]
        .as_str()
        .unwrap()
        .starts_with("Recommended Tracks "));
}

#[tokio::test]
async fn test_second_run_uploads_nothing_new() {
    let (server, store) = create_test_server();
    let id = connect(&server).await;
    let path = format!("/api/sessions/{}/recommendations", id);

    server.post(&path).await.assert_status_ok();
    let writes = store.write_count();

    let response = server.post(&path).await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert!(body["transcript"]
        .as_array()
        .unwrap()
        .iter()
        .any(|line| line == "No new tracks to upload. Using existing data."));
    assert_eq!(store.write_count(), writes);
}

#[tokio::test]
async fn test_html_flow_renders_results() {
    let (server, _) = create_test_server();
    let id = connect(&server).await;

    let response = server.post(&format!("/sessions/{}/recommend", id)).await;
    response.assert_status(StatusCode::SEE_OTHER);
    assert_eq!(location(&response), format!("/sessions/{}", id));

    let response = server.get(&format!("/sessions/{}", id)).await;
    response.assert_status_ok();
    let html = response.text();
    assert!(html.contains("Welcome, Test Listener!"));
    assert!(html.contains("<td>Song B</td>"));
    assert!(html.contains("Create Playlist"));

    let response = server.post(&format!("/sessions/{}/playlist", id)).await;
    response.assert_status(StatusCode::SEE_OTHER);
    let html = server.get(&format!("/sessions/{}", id)).await.text();
    assert!(html.contains("Open playlist in Spotify"));
}

#[tokio::test]
async fn test_playlist_before_recommendations_is_rejected() {
    let (server, _) = create_test_server();
    let id = connect(&server).await;

    let response = server.post(&format!("/api/sessions/{}/playlist", id)).await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"], "Please fetch recommendations first!");
}

#[tokio::test]
async fn test_unknown_session_is_not_found() {
    let (server, _) = create_test_server();
    let id = "6f1c1f9e-3b0a-4b8e-9a57-1f2a3b4c5d6e";

    server
        .get(&format!("/api/sessions/{}", id))
        .await
        .assert_status(StatusCode::NOT_FOUND);
    server
        .post(&format!("/api/sessions/{}/recommendations", id))
        .await
        .assert_status(StatusCode::NOT_FOUND);
    server
        .get(&format!("/sessions/{}", id))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_login_burst_keeps_pending_logins_bounded() {
    let (state, _) = create_test_state();
    let server = TestServer::new(create_router(state.clone())).unwrap();

    for _ in 0..MAX_PENDING_LOGINS + 100 {
        server
            .get("/auth/login")
            .await
            .assert_status(StatusCode::SEE_OTHER);
    }

    let pending = state.inner.read().await.pending_logins.len();
    assert_eq!(pending, MAX_PENDING_LOGINS);

    // The newest login still completes
    let authorize = location(&server.get("/auth/login").await);
    let (_, login) = authorize.rsplit_once("state=").unwrap();
    server
        .get(&format!("/auth/callback?code=good&state={}", login))
        .await
        .assert_status(StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn test_session_reads_do_not_wait_for_running_action() {
    let (state, _) = create_test_state();
    let server = TestServer::new(create_router(state.clone())).unwrap();
    let id = state
        .insert_session(SessionContext::with_client(
            uuid::Uuid::new_v4(),
            Arc::new(FakeProvider::default()),
        ))
        .await;

    let _running = state.lock_session(id).await.unwrap();

    let response = server.get(&format!("/api/sessions/{}", id)).await;
    response.assert_status_ok();
    let session: serde_json::Value = response.json();
    assert_eq!(session["busy"], true);

    let response = server.get(&format!("/sessions/{}", id)).await;
    response.assert_status_ok();
    assert!(response.text().contains("id=\"busy\""));

    server
        .post(&format!("/api/sessions/{}/recommendations", id))
        .await
        .assert_status(StatusCode::CONFLICT);
}
