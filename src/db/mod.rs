pub mod cache;
pub mod feature_store;
pub mod memory;
pub mod postgres;

pub use cache::{create_redis_client, Cache, CacheKey, CacheWriterHandle};
pub use feature_store::FeatureStore;
pub use memory::MemoryFeatureStore;
pub use postgres::{create_pool, PgFeatureStore};
