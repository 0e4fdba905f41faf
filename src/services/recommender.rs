use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

use crate::{
    db::FeatureStore,
    error::{AppError, AppResult},
    models::{FeatureGroup, RawTrack, Recommendation, TrackFeatureRow},
};

/// Neighbors retrieved per query track
pub const NEIGHBORHOOD_SIZE: usize = 10;

/// Upper bound on the length of a recommendation list
pub const MAX_RECOMMENDATIONS: usize = 10;

/// `[popularity, artist_code, track_code]`
pub type FeatureVector = [f64; 3];

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RecommendError {
    #[error("popularity of track {track_id} is not a finite number")]
    NonFinitePopularity { track_id: String },

    #[error("cannot fit a nearest-neighbor index on an empty corpus")]
    EmptyCorpus,

    #[error("label '{0}' was not seen while fitting the encoder")]
    UnknownLabel(String),
}

impl From<RecommendError> for AppError {
    fn from(err: RecommendError) -> Self {
        AppError::Recommendation(err.to_string())
    }
}

/// Maps each distinct string to its rank among the sorted distinct values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelEncoder {
    classes: Vec<String>,
}

impl LabelEncoder {
    pub fn fit<'a>(values: impl IntoIterator<Item = &'a str>) -> Self {
        let classes: BTreeSet<&str> = values.into_iter().collect();
        Self {
            classes: classes.into_iter().map(str::to_string).collect(),
        }
    }

    pub fn transform(&self, value: &str) -> Result<usize, RecommendError> {
        self.classes
            .binary_search_by(|class| class.as_str().cmp(value))
            .map_err(|_| RecommendError::UnknownLabel(value.to_string()))
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub index: usize,
    pub distance: f64,
}

/// `1 - cos(a, b)`; a zero vector is at distance 1 from everything
pub fn cosine_distance(a: &FeatureVector, b: &FeatureVector) -> f64 {
    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f64>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }

    (1.0 - dot / (norm_a * norm_b)).clamp(0.0, 2.0)
}

/// Brute-force cosine nearest-neighbor index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearestNeighbors {
    n_neighbors: usize,
    metric: String,
    points: Vec<FeatureVector>,
}

impl NearestNeighbors {
    pub fn fit(points: Vec<FeatureVector>, n_neighbors: usize) -> Result<Self, RecommendError> {
        if points.is_empty() {
            return Err(RecommendError::EmptyCorpus);
        }

        Ok(Self {
            n_neighbors,
            metric: "cosine".to_string(),
            points,
        })
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn n_neighbors(&self) -> usize {
        self.n_neighbors
    }

    /// Up to `n_neighbors` closest points, nearest first.
    ///
    /// Fewer are returned when the index holds fewer points. Equal distances are
    /// ordered by index.
    pub fn kneighbors(&self, query: &FeatureVector) -> Vec<Neighbor> {
        let mut neighbors: Vec<Neighbor> = self
            .points
            .iter()
            .enumerate()
            .map(|(index, point)| Neighbor {
                index,
                distance: cosine_distance(query, point),
            })
            .collect();

        neighbors.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then_with(|| a.index.cmp(&b.index))
        });
        neighbors.truncate(self.n_neighbors.min(self.points.len()));
        neighbors
    }
}

/// Label encoders plus the similarity index, fit over one corpus snapshot.
///
/// Codes are relative to the snapshot: the same artist can get a different code
/// once more rows exist, so a model must never outlive the corpus it was fit on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnnModel {
    artist_encoder: LabelEncoder,
    track_encoder: LabelEncoder,
    index: NearestNeighbors,
}

impl KnnModel {
    pub fn fit(corpus: &[TrackFeatureRow]) -> Result<Self, RecommendError> {
        if let Some(row) = corpus.iter().find(|row| !row.popularity.is_finite()) {
            return Err(RecommendError::NonFinitePopularity {
                track_id: row.track_id.clone(),
            });
        }

        let artist_encoder = LabelEncoder::fit(corpus.iter().map(|r| r.artist_name.as_str()));
        let track_encoder = LabelEncoder::fit(corpus.iter().map(|r| r.track_name.as_str()));

        let points = corpus
            .iter()
            .map(|row| encode(&artist_encoder, &track_encoder, row))
            .collect::<Result<Vec<_>, _>>()?;

        let index = NearestNeighbors::fit(points, NEIGHBORHOOD_SIZE)?;

        Ok(Self {
            artist_encoder,
            track_encoder,
            index,
        })
    }

    pub fn encode(&self, row: &TrackFeatureRow) -> Result<FeatureVector, RecommendError> {
        encode(&self.artist_encoder, &self.track_encoder, row)
    }

    pub fn index(&self) -> &NearestNeighbors {
        &self.index
    }

    /// Encoded vector of the corpus row at `index`
    pub fn vector(&self, index: usize) -> Option<&FeatureVector> {
        self.index.points.get(index)
    }
}

fn encode(
    artists: &LabelEncoder,
    tracks: &LabelEncoder,
    row: &TrackFeatureRow,
) -> Result<FeatureVector, RecommendError> {
    Ok([
        row.popularity,
        artists.transform(&row.artist_name)? as f64,
        tracks.transform(&row.track_name)? as f64,
    ])
}

/// Trim + lowercase, the only normalization applied when matching track names
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

fn to_recommendation(row: &TrackFeatureRow) -> Recommendation {
    Recommendation::new(row.track_name.clone(), row.artist_name.clone())
}

/// The most popular rows of the corpus, descending, original order kept on ties
pub fn popularity_fallback(corpus: &[TrackFeatureRow]) -> Vec<Recommendation> {
    let mut order: Vec<usize> = (0..corpus.len()).collect();
    order.sort_by(|&a, &b| corpus[b].popularity.total_cmp(&corpus[a].popularity));

    order
        .into_iter()
        .take(MAX_RECOMMENDATIONS)
        .map(|i| to_recommendation(&corpus[i]))
        .collect()
}

/// Ranks corpus tracks against the user's recent tracks.
///
/// The model is fit on `corpus` on every call. Recent names are matched against the
/// corpus after trimming and lowercasing; when nothing matches the most popular rows
/// are returned instead. Neighbors of every matched row are visited in corpus order
/// and kept on first occurrence until [`MAX_RECOMMENDATIONS`] are collected.
pub fn recommend<'a>(
    corpus: &[TrackFeatureRow],
    recent_names: impl IntoIterator<Item = &'a str>,
) -> Result<Vec<Recommendation>, RecommendError> {
    if corpus.is_empty() {
        tracing::info!("Feature corpus is empty, nothing to recommend");
        return Ok(Vec::new());
    }

    let model = KnnModel::fit(corpus)?;

    let wanted: HashSet<String> = recent_names.into_iter().map(normalize_name).collect();
    let matched: Vec<usize> = corpus
        .iter()
        .enumerate()
        .filter(|(_, row)| wanted.contains(&normalize_name(&row.track_name)))
        .map(|(i, _)| i)
        .collect();

    if matched.is_empty() {
        tracing::info!(
            corpus = corpus.len(),
            "No matching tracks found, using popularity-based recommendations"
        );
        return Ok(popularity_fallback(corpus));
    }

    let mut seen_rows = HashSet::new();
    let mut seen_pairs = HashSet::new();
    let mut recommendations = Vec::with_capacity(MAX_RECOMMENDATIONS);

    'queries: for &row in &matched {
        let Some(query) = model.vector(row) else {
            continue;
        };

        for neighbor in model.index().kneighbors(query) {
            if recommendations.len() >= MAX_RECOMMENDATIONS {
                break 'queries;
            }
            if !seen_rows.insert(neighbor.index) {
                continue;
            }

            let rec = to_recommendation(&corpus[neighbor.index]);
            if seen_pairs.insert(rec.clone()) {
                recommendations.push(rec);
            }
        }
    }

    tracing::debug!(
        corpus = corpus.len(),
        matched = matched.len(),
        recommended = recommendations.len(),
        "Nearest-neighbor recommendations computed"
    );

    Ok(recommendations)
}

/// Reads the current corpus and recommends against the user's recent tracks
pub async fn get_recommendations(
    store: &dyn FeatureStore,
    group: &FeatureGroup,
    recent_tracks: &[RawTrack],
) -> AppResult<Vec<Recommendation>> {
    let corpus = store.read_all(group).await?;

    let recommendations =
        recommend(&corpus, recent_tracks.iter().map(|t| t.name.as_str())).map_err(|e| {
            tracing::error!(error = %e, group = %group, "Recommendation failed");
            AppError::from(e)
        })?;

    tracing::info!(
        group = %group,
        corpus = corpus.len(),
        recommended = recommendations.len(),
        "Recommendations ready"
    );

    Ok(recommendations)
}
