// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Redis implementation of the broadcast store.
//!
//! Commands run through a [`ConnectionManager`] (auto-reconnecting, cheap to
//! clone). Each pattern subscription owns a dedicated pub/sub connection and
//! a forwarding task, so messages on one pattern preserve arrival order.
//!
//! Expiry notifications require `notify-keyspace-events` to include `Ex`;
//! [`RedisStore::connect`] attempts to set this and logs a warning when the
//! server forbids CONFIG (managed Redis offerings often do).

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use courier_core::error::CourierError;
use courier_core::traits::store::BroadcastStore;
use courier_core::types::StoreMessage;

/// Redis-backed [`BroadcastStore`].
#[derive(Debug)]
pub struct RedisStore {
    client: redis::Client,
    manager: ConnectionManager,
}

impl RedisStore {
    /// Connect to the Redis server at `url` (e.g. `redis://127.0.0.1/`).
    pub async fn connect(url: &str) -> Result<Self, CourierError> {
        let client = redis::Client::open(url)
            .map_err(|e| CourierError::store("invalid store URL", e))?;
        let manager = client
            .get_connection_manager()
            .await
            .map_err(|e| CourierError::store("store connection failed", e))?;

        let store = Self { client, manager };
        store.enable_expiry_events().await;
        Ok(store)
    }

    async fn enable_expiry_events(&self) {
        let mut conn = self.manager.clone();
        let result: redis::RedisResult<()> = redis::cmd("CONFIG")
            .arg("SET")
            .arg("notify-keyspace-events")
            .arg("Ex")
            .query_async(&mut conn)
            .await;
        if let Err(e) = result {
            warn!(
                error = %e,
                "could not enable keyspace expiry notifications; \
                 lock-release events require notify-keyspace-events=Ex on the server"
            );
        }
    }
}

#[async_trait]
impl BroadcastStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CourierError> {
        let mut conn = self.manager.clone();
        let value: Option<String> = conn
            .get(key)
            .await
            .map_err(|e| CourierError::store("GET failed", e))?;
        Ok(value)
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CourierError> {
        let mut conn = self.manager.clone();
        let _: () = conn
            .set_ex(key, value, ttl.as_secs())
            .await
            .map_err(|e| CourierError::store("SETEX failed", e))?;
        Ok(())
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, CourierError> {
        let mut conn = self.manager.clone();
        let set: bool = conn
            .expire(key, ttl.as_secs() as i64)
            .await
            .map_err(|e| CourierError::store("EXPIRE failed", e))?;
        Ok(set)
    }

    async fn del(&self, key: &str) -> Result<bool, CourierError> {
        let mut conn = self.manager.clone();
        let removed: i64 = conn
            .del(key)
            .await
            .map_err(|e| CourierError::store("DEL failed", e))?;
        Ok(removed > 0)
    }

    async fn sadd(&self, key: &str, member: &str) -> Result<(), CourierError> {
        let mut conn = self.manager.clone();
        let _: i64 = conn
            .sadd(key, member)
            .await
            .map_err(|e| CourierError::store("SADD failed", e))?;
        Ok(())
    }

    async fn srem(&self, key: &str, members: &[String]) -> Result<(), CourierError> {
        if members.is_empty() {
            return Ok(());
        }
        let mut conn = self.manager.clone();
        let _: i64 = conn
            .srem(key, members.to_vec())
            .await
            .map_err(|e| CourierError::store("SREM failed", e))?;
        Ok(())
    }

    async fn smembers(&self, key: &str) -> Result<Vec<String>, CourierError> {
        let mut conn = self.manager.clone();
        let members: Vec<String> = conn
            .smembers(key)
            .await
            .map_err(|e| CourierError::store("SMEMBERS failed", e))?;
        Ok(members)
    }

    async fn sismember(&self, key: &str, member: &str) -> Result<bool, CourierError> {
        let mut conn = self.manager.clone();
        let found: bool = conn
            .sismember(key, member)
            .await
            .map_err(|e| CourierError::store("SISMEMBER failed", e))?;
        Ok(found)
    }

    async fn scan_keys(&self, pattern: &str) -> Result<Vec<String>, CourierError> {
        // One-time index rebuilds only, so a blocking KEYS is acceptable.
        let mut conn = self.manager.clone();
        let keys: Vec<String> = conn
            .keys(pattern)
            .await
            .map_err(|e| CourierError::store("KEYS failed", e))?;
        Ok(keys)
    }

    async fn publish(&self, channel: &str, payload: &str) -> Result<(), CourierError> {
        let mut conn = self.manager.clone();
        let _: i64 = conn
            .publish(channel, payload)
            .await
            .map_err(|e| CourierError::store("PUBLISH failed", e))?;
        Ok(())
    }

    async fn subscribe_pattern(
        &self,
        pattern: &str,
    ) -> Result<mpsc::Receiver<StoreMessage>, CourierError> {
        let mut pubsub = self
            .client
            .get_async_pubsub()
            .await
            .map_err(|e| CourierError::store("pub/sub connection failed", e))?;
        pubsub
            .psubscribe(pattern)
            .await
            .map_err(|e| CourierError::store("PSUBSCRIBE failed", e))?;

        let (tx, rx) = mpsc::channel(256);
        let pattern = pattern.to_string();
        tokio::spawn(async move {
            let mut stream = pubsub.on_message();
            while let Some(msg) = stream.next().await {
                let channel = msg.get_channel_name().to_string();
                let payload: String = match msg.get_payload() {
                    Ok(p) => p,
                    Err(e) => {
                        warn!(error = %e, channel = %channel, "non-string store message dropped");
                        continue;
                    }
                };
                if tx.send(StoreMessage { channel, payload }).await.is_err() {
                    // Receiver dropped: subscription is over.
                    break;
                }
            }
            debug!(pattern = %pattern, "store pattern subscription ended");
        });

        Ok(rx)
    }
}
