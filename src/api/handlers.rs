use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, Redirect},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    middleware::RequestId,
    models::{PlaylistOutcome, Recommendation, UserProfile},
    services::{session, Pipeline, SessionContext},
};

use super::{page, AppState};

// Request/Response types

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub id: Uuid,
    pub connected: bool,
    pub busy: bool,
    pub profile: Option<UserProfile>,
    pub recommendations: Option<Vec<Recommendation>>,
    pub transcript: Vec<String>,
    pub last_playlist: Option<PlaylistOutcome>,
}

impl From<&SessionContext> for SessionResponse {
    fn from(ctx: &SessionContext) -> Self {
        Self {
            id: ctx.id,
            connected: ctx.is_connected(),
            busy: ctx.busy,
            profile: ctx.profile.clone(),
            recommendations: ctx.recommendations.clone(),
            transcript: ctx.transcript.lines().to_vec(),
            last_playlist: ctx.last_playlist.clone(),
        }
    }
}

impl SessionResponse {
    /// Placeholder for a session whose action is still running; only sessions that
    /// completed the OAuth callback are stored, so it is connected
    fn busy(id: Uuid) -> Self {
        Self {
            id,
            connected: true,
            busy: true,
            profile: None,
            recommendations: None,
            transcript: Vec::new(),
            last_playlist: None,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RecommendationsResponse {
    pub recommendations: Vec<Recommendation>,
    pub transcript: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct PlaylistResponse {
    #[serde(flatten)]
    pub outcome: PlaylistOutcome,
    pub message: String,
}

fn session_path(id: Uuid) -> String {
    format!("/sessions/{}", id)
}

// Handlers

/// Health check endpoint
pub async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}

pub async fn landing() -> Html<String> {
    Html(page::landing())
}

/// Starts the OAuth dance; the pending login id travels as `state`
pub async fn login(State(state): State<AppState>) -> AppResult<Redirect> {
    let login_id = state.begin_login().await;
    let url = state.connector.authorize_url(&login_id.to_string())?;

    tracing::info!(login_id = %login_id, "Redirecting to Spotify authorization");
    Ok(Redirect::to(&url))
}

pub async fn callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> AppResult<Redirect> {
    if let Some(error) = params.error {
        return Err(AppError::Auth(format!(
            "Spotify authorization was denied: {}",
            error
        )));
    }

    let login_id = params
        .state
        .as_deref()
        .and_then(|s| Uuid::parse_str(s).ok())
        .ok_or_else(|| AppError::InvalidInput("Missing or malformed state".to_string()))?;
    if !state.finish_login(login_id).await {
        return Err(AppError::InvalidInput(
            "Unknown or expired login attempt".to_string(),
        ));
    }

    let code = params
        .code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| AppError::InvalidInput("Missing authorization code".to_string()))?;

    let provider = state.connector.connect(&code).await?;

    let mut ctx = SessionContext::with_client(login_id, provider.clone());
    match provider.current_user().await {
        Ok(profile) => ctx.profile = Some(profile),
        // The profile is cosmetic; the session works without it
        Err(e) => tracing::warn!(session = %login_id, error = %e, "Could not fetch user profile"),
    }

    let id = state.insert_session(ctx).await;
    tracing::info!(session = %id, provider = provider.name(), "Session connected");

    Ok(Redirect::to(&session_path(id)))
}

pub async fn session_page(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Html<String>> {
    let session = state.session(id).await?;
    let html = match session.try_lock() {
        Ok(ctx) => page::session(&ctx),
        Err(_) => page::busy(id),
    };
    Ok(Html(html))
}

/// Form action; failures are shown in the transcript, so the browser always goes back
pub async fn recommend_form(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Redirect> {
    let mut ctx = state.lock_session(id).await?;
    let pipeline = Pipeline::new(state.store.as_ref(), &state.group);

    if let Err(e) = session::run_recommendations(&mut ctx, &pipeline).await {
        tracing::debug!(session = %id, error = %e, "Recommendation form action failed");
    }

    Ok(Redirect::to(&session_path(id)))
}

pub async fn playlist_form(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Redirect> {
    let mut ctx = state.lock_session(id).await?;
    let today = chrono::Local::now().date_naive();

    if let Err(e) = session::run_playlist(&mut ctx, today).await {
        tracing::debug!(session = %id, error = %e, "Playlist form action failed");
    }

    Ok(Redirect::to(&session_path(id)))
}

pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<SessionResponse>> {
    let session = state.session(id).await?;
    let response = match session.try_lock() {
        Ok(ctx) => SessionResponse::from(&*ctx),
        Err(_) => SessionResponse::busy(id),
    };
    Ok(Json(response))
}

pub async fn create_recommendations(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<RecommendationsResponse>> {
    tracing::info!(request_id = %request_id, session = %id, "Processing recommendation request");

    let mut ctx = state.lock_session(id).await?;
    let pipeline = Pipeline::new(state.store.as_ref(), &state.group);
    let recommendations = session::run_recommendations(&mut ctx, &pipeline).await?;

    tracing::info!(
        request_id = %request_id,
        session = %id,
        count = recommendations.len(),
        "Recommendations generated"
    );

    Ok(Json(RecommendationsResponse {
        recommendations,
        transcript: ctx.transcript.lines().to_vec(),
    }))
}

pub async fn create_playlist(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path(id): Path<Uuid>,
) -> AppResult<(StatusCode, Json<PlaylistResponse>)> {
    tracing::info!(request_id = %request_id, session = %id, "Processing playlist request");

    let mut ctx = state.lock_session(id).await?;
    let today = chrono::Local::now().date_naive();
    let outcome = session::run_playlist(&mut ctx, today).await?;

    let message = outcome.message();
    Ok((
        StatusCode::CREATED,
        Json(PlaylistResponse { outcome, message }),
    ))
}
