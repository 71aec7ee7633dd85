use crate::events::Event;
use chrono::Utc;
use redis::{AsyncCommands, Client};
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, instrument};

const NOTIFICATION_CHANNEL: &str = "quickmeds:events";
const NOTIFICATION_LOG_KEY: &str = "quickmeds:events:log";
const NOTIFICATION_LOG_MAX: isize = 1000;

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Publishes committed commerce events to Redis for downstream consumers
/// (SMS/email workers, the admin dashboard live feed). Delivery is
/// best-effort; the order workflow never depends on it.
#[derive(Clone)]
pub struct NotificationService {
    redis: Arc<Client>,
}

impl NotificationService {
    pub fn new(redis_url: &str) -> Result<Self, NotificationError> {
        let redis = Client::open(redis_url)?;
        Ok(Self {
            redis: Arc::new(redis),
        })
    }

    /// Publishes the event on the pub/sub channel and appends it to a capped
    /// log list for consumers that poll.
    #[instrument(skip(self))]
    pub async fn publish(&self, event: &Event) -> Result<(), NotificationError> {
        let payload = serde_json::to_string(&json!({
            "event": event,
            "timestamp": Utc::now().to_rfc3339(),
        }))?;

        let mut conn = self.redis.get_multiplexed_async_connection().await?;
        conn.publish::<_, _, ()>(NOTIFICATION_CHANNEL, &payload)
            .await?;
        conn.lpush::<_, _, ()>(NOTIFICATION_LOG_KEY, &payload).await?;
        conn.ltrim::<_, ()>(NOTIFICATION_LOG_KEY, 0, NOTIFICATION_LOG_MAX - 1)
            .await?;

        debug!("Published event to {}", NOTIFICATION_CHANNEL);
        Ok(())
    }

    /// Most recent events from the capped log, newest first.
    pub async fn recent(&self, limit: isize) -> Result<Vec<String>, NotificationError> {
        let mut conn = self.redis.get_multiplexed_async_connection().await?;
        let entries: Vec<String> = conn
            .lrange(NOTIFICATION_LOG_KEY, 0, limit.max(1) - 1)
            .await?;
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    // Needs a live Redis; run with `cargo test -- --ignored` against one.
    #[tokio::test]
    #[ignore = "requires a running Redis instance"]
    async fn publish_and_read_back() {
        let service = NotificationService::new("redis://localhost:6379").unwrap();
        let event = Event::OrderCreated(Uuid::new_v4());

        service.publish(&event).await.unwrap();
        let recent = service.recent(10).await.unwrap();
        assert!(!recent.is_empty());
    }
}
