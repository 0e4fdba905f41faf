/// Read-through caching over an optional [`Cache`](crate::db::Cache).
///
/// With no cache configured the block simply runs. A cache read failure is logged
/// and treated as a miss; the user's action never fails because of Redis.
///
/// # Arguments
/// * `$cache`: `Option<&Cache>`
/// * `$key`: the `CacheKey` to read and write
/// * `$ttl`: time-to-live in seconds for a freshly computed value
/// * `$block`: future producing `AppResult<T>` on a miss
#[macro_export]
macro_rules! cached {
    ($cache:expr, $key:expr, $ttl:expr, $block:expr) => {{
        let key = $key;
        match $cache {
            Some(cache) => {
                let hit = match cache.get_from_cache(&key).await {
                    Ok(hit) => hit,
                    Err(e) => {
                        tracing::warn!(error = %e, key = %key, "Cache read failed, treating as miss");
                        None
                    }
                };
                match hit {
                    Some(value) => Ok(value),
                    None => {
                        let value = $block.await?;
                        cache.set_in_background(&key, &value, $ttl);
                        Ok(value)
                    }
                }
            }
            None => $block.await,
        }
    }};
}
