pub mod auth;
pub mod feature_store;
pub mod features;
pub mod playlist;
pub mod providers;
pub mod recommender;
pub mod session;
pub mod training;

pub use auth::{SessionConnector, SpotifyConnector};
pub use session::{Pipeline, SessionContext};
