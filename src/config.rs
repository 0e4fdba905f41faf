use serde::Deserialize;

use crate::models::FeatureGroup;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub spotify: SpotifyConfig,
    pub feature_store: FeatureStoreConfig,
}

/// HTTP server settings (unprefixed variables)
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Optional Redis URL for caching track search lookups
    #[serde(default)]
    pub redis_url: Option<String>,
}

/// Spotify application credentials (`SPOTIFY_*`)
#[derive(Debug, Deserialize, Clone)]
pub struct SpotifyConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,

    /// Web API base URL
    #[serde(default = "default_spotify_api_url")]
    pub api_url: String,

    /// Accounts service base URL (authorize + token endpoints)
    #[serde(default = "default_spotify_accounts_url")]
    pub accounts_url: String,
}

/// Feature store connection (`FEATURE_STORE_*`)
#[derive(Debug, Deserialize, Clone)]
pub struct FeatureStoreConfig {
    /// Credential for the feature store. Required.
    pub api_key: String,

    /// Postgres connection URL of the feature store (without password)
    #[serde(default = "default_feature_store_url")]
    pub url: String,

    #[serde(default = "default_feature_group")]
    pub group: String,

    #[serde(default = "default_feature_group_version")]
    pub version: u32,
}

/// Batch training pipeline settings (`MODEL_*`)
#[derive(Debug, Deserialize, Clone)]
pub struct TrainingConfig {
    #[serde(default = "default_model_dir")]
    pub dir: String,

    #[serde(default = "default_model_registry_dir")]
    pub registry_dir: String,

    #[serde(default = "default_model_name")]
    pub name: String,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_spotify_api_url() -> String {
    "https://api.spotify.com/v1".to_string()
}

fn default_spotify_accounts_url() -> String {
    "https://accounts.spotify.com".to_string()
}

fn default_feature_store_url() -> String {
    "postgres://recommender@localhost:5432/feature_store".to_string()
}

fn default_feature_group() -> String {
    "recommender_spotify".to_string()
}

fn default_feature_group_version() -> u32 {
    2
}

fn default_model_dir() -> String {
    "./knn_model".to_string()
}

fn default_model_registry_dir() -> String {
    "./model_registry".to_string()
}

fn default_model_name() -> String {
    "knn_recommendation_model_2".to_string()
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let server = envy::from_env::<ServerConfig>()
            .map_err(|e| anyhow::anyhow!("Failed to load server config: {}", e))?;
        let spotify = envy::prefixed("SPOTIFY_")
            .from_env::<SpotifyConfig>()
            .map_err(|e| anyhow::anyhow!("Failed to load Spotify config: {}", e))?;
        let feature_store = FeatureStoreConfig::from_env()?;

        Ok(Self {
            server,
            spotify,
            feature_store,
        })
    }
}

impl FeatureStoreConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let config = envy::prefixed("FEATURE_STORE_")
            .from_env::<FeatureStoreConfig>()
            .map_err(|e| anyhow::anyhow!("Failed to load feature store config: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    /// An empty API key is treated the same as a missing one
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_key.trim().is_empty() {
            anyhow::bail!("FEATURE_STORE_API_KEY not found. Please check your configuration.");
        }
        Ok(())
    }

    pub fn feature_group(&self) -> FeatureGroup {
        FeatureGroup::new(self.group.clone(), self.version)
    }
}

impl TrainingConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        envy::prefixed("MODEL_")
            .from_env::<TrainingConfig>()
            .map_err(|e| anyhow::anyhow!("Failed to load training config: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_feature_store_defaults() {
        let config: FeatureStoreConfig =
            envy::from_iter(vars(&[("API_KEY", "secret")])).unwrap();
        assert_eq!(config.group, "recommender_spotify");
        assert_eq!(config.version, 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_feature_store_key_fails() {
        let result = envy::from_iter::<_, FeatureStoreConfig>(vars(&[("GROUP", "other")]));
        assert!(result.is_err());
    }

    #[test]
    fn test_blank_feature_store_key_fails_validation() {
        let config: FeatureStoreConfig = envy::from_iter(vars(&[("API_KEY", "  ")])).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_spotify_config_requires_credentials() {
        let partial = envy::from_iter::<_, SpotifyConfig>(vars(&[("CLIENT_ID", "abc")]));
        assert!(partial.is_err());

        let full: SpotifyConfig = envy::from_iter(vars(&[
            ("CLIENT_ID", "abc"),
            ("CLIENT_SECRET", "def"),
            ("REDIRECT_URI", "http://127.0.0.1:3000/auth/callback"),
        ]))
        .unwrap();
        assert_eq!(full.api_url, "https://api.spotify.com/v1");
        assert_eq!(full.accounts_url, "https://accounts.spotify.com");
    }

    #[test]
    fn test_server_defaults() {
        let config: ServerConfig = envy::from_iter(Vec::<(String, String)>::new()).unwrap();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 3000);
        assert!(config.redis_url.is_none());
    }
}
