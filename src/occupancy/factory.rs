//! Occupancy cache factory

use std::sync::Arc;

use crate::config::OccupancyConfig;

use super::memory_backend::MemoryOccupancyCache;
use super::redis_backend::RedisOccupancyCache;
use super::OccupancyCache;

/// Create an occupancy cache based on configuration.
///
/// - `"redis"`: a `RedisOccupancyCache` connected to `redis_url`, falling back
///   to memory if the connection cannot be established
/// - `"memory"` (default): a `MemoryOccupancyCache`
pub async fn create_occupancy_cache(settings: &OccupancyConfig) -> Arc<dyn OccupancyCache> {
    match settings.backend.as_str() {
        "redis" => {
            match RedisOccupancyCache::connect(&settings.redis_url, settings.redis_prefix.clone())
                .await
            {
                Ok(cache) => {
                    tracing::info!(
                        backend = "redis",
                        prefix = %settings.redis_prefix,
                        "Creating Redis occupancy cache"
                    );
                    Arc::new(cache)
                }
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        "Redis occupancy cache unavailable, falling back to memory"
                    );
                    Arc::new(MemoryOccupancyCache::new())
                }
            }
        }
        _ => {
            tracing::info!(backend = "memory", "Creating memory occupancy cache");
            Arc::new(MemoryOccupancyCache::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_default_is_memory() {
        let cache = create_occupancy_cache(&OccupancyConfig::default()).await;
        assert_eq!(cache.backend_name(), "memory");
    }
}
