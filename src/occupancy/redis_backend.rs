//! Redis-backed occupancy cache.
//!
//! Each channel is stored under `{prefix}:{channel}` as `1` (occupied) or
//! `0` (vacant), so every replica of the service sees the same state.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use super::{Occupancy, OccupancyCache, OccupancyError};

const OCCUPIED: &str = "1";
const VACANT: &str = "0";

pub struct RedisOccupancyCache {
    /// Multiplexed connection, cloned per call
    conn: ConnectionManager,
    prefix: String,
}

impl RedisOccupancyCache {
    pub fn new(conn: ConnectionManager, prefix: impl Into<String>) -> Self {
        Self {
            conn,
            prefix: prefix.into(),
        }
    }

    /// Open a connection manager for `url`.
    pub async fn connect(url: &str, prefix: impl Into<String>) -> Result<Self, OccupancyError> {
        let client = redis::Client::open(url)?;
        let conn = client.get_connection_manager().await?;
        Ok(Self::new(conn, prefix))
    }

    fn key(&self, channel: &str) -> String {
        channel_key(&self.prefix, channel)
    }

    async fn write(&self, channel: &str, value: &str) -> Result<(), OccupancyError> {
        let mut conn = self.conn.clone();
        let _: () = conn.set(self.key(channel), value).await?;
        Ok(())
    }
}

fn channel_key(prefix: &str, channel: &str) -> String {
    format!("{}:{}", prefix, channel)
}

fn parse_value(value: Option<String>) -> Occupancy {
    match value.as_deref() {
        Some(OCCUPIED) => Occupancy::Occupied,
        Some(VACANT) => Occupancy::Vacant,
        _ => Occupancy::Unknown,
    }
}

#[async_trait]
impl OccupancyCache for RedisOccupancyCache {
    fn backend_name(&self) -> &'static str {
        "redis"
    }

    async fn get(&self, channel: &str) -> Result<Occupancy, OccupancyError> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(self.key(channel)).await?;
        Ok(parse_value(value))
    }

    async fn set_occupied(&self, channel: &str) -> Result<(), OccupancyError> {
        self.write(channel, OCCUPIED).await
    }

    async fn set_vacated(&self, channel: &str) -> Result<(), OccupancyError> {
        self.write(channel, VACANT).await
    }

    async fn bulk_set_occupied(&self, channels: &[String]) -> Result<(), OccupancyError> {
        if channels.is_empty() {
            return Ok(());
        }

        let mut pipe = redis::pipe();
        for channel in channels {
            pipe.set(self.key(channel), OCCUPIED).ignore();
        }

        let mut conn = self.conn.clone();
        let _: () = pipe.query_async(&mut conn).await?;

        tracing::debug!(count = channels.len(), "Occupied channels written to Redis");
        Ok(())
    }
}
