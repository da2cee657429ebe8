//! In-process occupancy cache using DashMap.
//!
//! State is lost on restart and is not shared between replicas; the first
//! delivery to each channel after a restart refreshes from the transport.

use async_trait::async_trait;
use dashmap::DashMap;

use super::{Occupancy, OccupancyCache, OccupancyError};

#[derive(Debug, Default)]
pub struct MemoryOccupancyCache {
    /// channel -> occupied
    entries: DashMap<String, bool>,
}

impl MemoryOccupancyCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Forget every entry. Test teardown only.
    pub fn clear(&self) {
        self.entries.clear();
    }
}

#[async_trait]
impl OccupancyCache for MemoryOccupancyCache {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, channel: &str) -> Result<Occupancy, OccupancyError> {
        Ok(self
            .entries
            .get(channel)
            .map(|entry| Occupancy::from_flag(*entry))
            .unwrap_or(Occupancy::Unknown))
    }

    async fn set_occupied(&self, channel: &str) -> Result<(), OccupancyError> {
        self.entries.insert(channel.to_string(), true);
        Ok(())
    }

    async fn set_vacated(&self, channel: &str) -> Result<(), OccupancyError> {
        self.entries.insert(channel.to_string(), false);
        Ok(())
    }

    async fn bulk_set_occupied(&self, channels: &[String]) -> Result<(), OccupancyError> {
        for channel in channels {
            self.entries.insert(channel.clone(), true);
        }
        Ok(())
    }
}
