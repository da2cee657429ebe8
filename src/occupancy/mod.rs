//! Channel occupancy cache.
//!
//! Maps a channel name to whether at least one subscriber is connected.
//! Entries are advisory: they are written by the synchronous refresh in the
//! delivery provider and by the webhook reconciler, last write wins, and
//! nothing expires.

mod factory;
mod memory_backend;
mod redis_backend;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

pub use factory::create_occupancy_cache;
pub use memory_backend::MemoryOccupancyCache;
pub use redis_backend::RedisOccupancyCache;

/// Tri-state occupancy of one channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Occupancy {
    /// Cache miss
    Unknown,
    Occupied,
    Vacant,
}

impl Occupancy {
    pub fn from_flag(occupied: bool) -> Self {
        if occupied {
            Occupancy::Occupied
        } else {
            Occupancy::Vacant
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Occupancy::Unknown => "unknown",
            Occupancy::Occupied => "occupied",
            Occupancy::Vacant => "vacant",
        }
    }

    pub fn is_occupied(&self) -> bool {
        matches!(self, Occupancy::Occupied)
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Occupancy::Unknown)
    }
}

#[derive(Error, Debug)]
pub enum OccupancyError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

/// Shared occupancy store.
///
/// Per-key writes are atomic; a read followed by a write is not.
#[async_trait]
pub trait OccupancyCache: Send + Sync {
    /// Backend name for health reporting
    fn backend_name(&self) -> &'static str;

    async fn get(&self, channel: &str) -> Result<Occupancy, OccupancyError>;

    async fn set_occupied(&self, channel: &str) -> Result<(), OccupancyError>;

    /// Record that a channel lost its last subscriber. The entry is kept as
    /// vacant rather than removed.
    async fn set_vacated(&self, channel: &str) -> Result<(), OccupancyError>;

    async fn bulk_set_occupied(&self, channels: &[String]) -> Result<(), OccupancyError>;
}
