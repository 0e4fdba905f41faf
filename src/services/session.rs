use chrono::NaiveDate;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    db::FeatureStore,
    error::{AppError, AppResult},
    models::{FeatureGroup, PlaylistOutcome, Recommendation, TimeRange, UserProfile},
    services::{feature_store, features, playlist, providers::MusicProvider, recommender},
};

/// How many of the user's top tracks seed a recommendation run
pub const TOP_TRACKS_LIMIT: u32 = 10;

/// Human-readable progress log shown next to the results
#[derive(Debug, Clone, Default, Serialize)]
pub struct Transcript {
    lines: Vec<String>,
}

impl Transcript {
    pub fn push(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn text(&self) -> String {
        self.lines.join("\n")
    }
}

/// Per-user state threaded through every orchestrated action
///
/// Owned by the hosting layer; nothing here outlives the process.
pub struct SessionContext {
    pub id: Uuid,
    client: Option<Arc<dyn MusicProvider>>,
    pub profile: Option<UserProfile>,
    pub recommendations: Option<Vec<Recommendation>>,
    pub transcript: Transcript,
    pub busy: bool,
    pub last_playlist: Option<PlaylistOutcome>,
}

impl SessionContext {
    pub fn new(id: Uuid) -> Self {
        Self {
            id,
            client: None,
            profile: None,
            recommendations: None,
            transcript: Transcript::default(),
            busy: false,
            last_playlist: None,
        }
    }

    pub fn with_client(id: Uuid, client: Arc<dyn MusicProvider>) -> Self {
        Self {
            client: Some(client),
            ..Self::new(id)
        }
    }

    pub fn is_connected(&self) -> bool {
        self.client.is_some()
    }

    pub fn client(&self) -> AppResult<Arc<dyn MusicProvider>> {
        self.client
            .clone()
            .ok_or_else(|| AppError::Auth("Not connected to Spotify".to_string()))
    }

    fn begin(&mut self) -> AppResult<()> {
        if self.busy {
            return Err(AppError::Busy(
                "An action is already running for this session".to_string(),
            ));
        }
        self.busy = true;
        Ok(())
    }
}

/// Everything a recommendation run needs besides the session itself
pub struct Pipeline<'a> {
    pub store: &'a dyn FeatureStore,
    pub group: &'a FeatureGroup,
    pub top_tracks_limit: u32,
    pub time_range: TimeRange,
}

impl<'a> Pipeline<'a> {
    pub fn new(store: &'a dyn FeatureStore, group: &'a FeatureGroup) -> Self {
        Self {
            store,
            group,
            top_tracks_limit: TOP_TRACKS_LIMIT,
            time_range: TimeRange::ShortTerm,
        }
    }
}

fn push_listing<'a>(
    transcript: &mut Transcript,
    entries: impl IntoIterator<Item = (&'a str, String)>,
) {
    for (i, (track, artists)) in entries.into_iter().enumerate() {
        transcript.push(format!("{}. {}", i + 1, track));
        transcript.push(format!("   {}", artists));
    }
}

/// Fetch → extract → upload → recommend, recording progress in the transcript.
///
/// The first failing step aborts the run; its error is appended to the transcript
/// and returned. Previous recommendations are kept on failure.
pub async fn run_recommendations(
    ctx: &mut SessionContext,
    pipeline: &Pipeline<'_>,
) -> AppResult<Vec<Recommendation>> {
    ctx.begin()?;
    ctx.transcript.clear();

    let result = recommendation_steps(ctx, pipeline).await;
    ctx.busy = false;

    match result {
        Ok(recommendations) => {
            ctx.recommendations = Some(recommendations.clone());
            Ok(recommendations)
        }
        Err(e) => {
            tracing::warn!(session = %ctx.id, error = %e, "Recommendation run failed");
            ctx.transcript.push(format!("Error: {}", e));
            Err(e)
        }
    }
}

async fn recommendation_steps(
    ctx: &mut SessionContext,
    pipeline: &Pipeline<'_>,
) -> AppResult<Vec<Recommendation>> {
    ctx.transcript.push("Step 1: Initializing Spotify client...");
    let client = ctx.client()?;

    ctx.transcript
        .push("Step 2: Fetching your top tracks from Spotify...");
    let top_tracks = client
        .top_tracks(pipeline.top_tracks_limit, pipeline.time_range)
        .await?;

    ctx.transcript
        .push(format!("Your Top {} Recent Tracks:", top_tracks.len()));
    push_listing(
        &mut ctx.transcript,
        top_tracks
            .iter()
            .map(|t| (t.name.as_str(), t.joined_artists())),
    );

    ctx.transcript.push("Step 3: Processing data...");
    let rows = features::extract_features(&top_tracks);

    ctx.transcript
        .push("Step 4: Uploading data to the feature store...");
    let status = feature_store::upload(pipeline.store, pipeline.group, rows).await?;
    ctx.transcript.push(status.to_string());

    ctx.transcript
        .push("Step 5: Getting personalized recommendations...");
    let recommendations =
        recommender::get_recommendations(pipeline.store, pipeline.group, &top_tracks).await?;

    ctx.transcript.push("Recommended Songs:");
    push_listing(
        &mut ctx.transcript,
        recommendations
            .iter()
            .map(|r| (r.track_name.as_str(), r.artist_name.clone())),
    );
    ctx.transcript.push(
        "Click 'Create Playlist' to save these recommendations to your Spotify account!",
    );

    tracing::info!(
        session = %ctx.id,
        top_tracks = top_tracks.len(),
        recommended = recommendations.len(),
        "Recommendation run completed"
    );

    Ok(recommendations)
}

/// Saves the session's last recommendations as a playlist dated `today`
pub async fn run_playlist(ctx: &mut SessionContext, today: NaiveDate) -> AppResult<PlaylistOutcome> {
    ctx.begin()?;

    let result = playlist_steps(ctx, today).await;
    ctx.busy = false;

    match result {
        Ok(outcome) => {
            ctx.transcript.push(format!("Success! {}", outcome.message()));
            if let Some(url) = &outcome.playlist.url {
                ctx.transcript.push(format!("Open in Spotify: {}", url));
            }
            ctx.last_playlist = Some(outcome.clone());
            Ok(outcome)
        }
        Err(e) => {
            tracing::warn!(session = %ctx.id, error = %e, "Playlist creation failed");
            ctx.transcript.push(format!("Error creating playlist: {}", e));
            Err(e)
        }
    }
}

async fn playlist_steps(ctx: &SessionContext, today: NaiveDate) -> AppResult<PlaylistOutcome> {
    let (client, recommendations) = match (&ctx.client, &ctx.recommendations) {
        (Some(client), Some(recommendations)) => (client.clone(), recommendations),
        _ => {
            return Err(AppError::InvalidInput(
                "Please fetch recommendations first!".to_string(),
            ))
        }
    };

    playlist::create_playlist(client.as_ref(), recommendations, today).await
}
