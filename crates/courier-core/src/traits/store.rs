// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Broadcast store trait: the external TTL-keyed store with pub/sub.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::CourierError;
use crate::types::StoreMessage;

/// The shared external store backing locks and channel broadcasts.
///
/// Implementations must provide per-key TTLs, set membership, and
/// publish/subscribe by glob pattern. Expired keys surface as messages on the
/// `__keyevent@*__:expired` pattern, with the expired key name as payload.
///
/// Commands operate on single keys and are individually atomic; callers that
/// need read-modify-write sequences (the lock manager) tolerate lost races by
/// re-reading rather than relying on store-side transactions.
#[async_trait]
pub trait BroadcastStore: Send + Sync {
    /// Read a string value. `None` when the key is absent or expired.
    async fn get(&self, key: &str) -> Result<Option<String>, CourierError>;

    /// Write a string value with a TTL, replacing any existing value.
    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CourierError>;

    /// Reset the TTL of an existing key. Returns false when the key is absent.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, CourierError>;

    /// Delete a key. Returns false when the key was absent.
    async fn del(&self, key: &str) -> Result<bool, CourierError>;

    /// Add a member to a set (created on first add; sets do not expire).
    async fn sadd(&self, key: &str, member: &str) -> Result<(), CourierError>;

    /// Remove members from a set.
    async fn srem(&self, key: &str, members: &[String]) -> Result<(), CourierError>;

    /// All members of a set; empty when the set is absent.
    async fn smembers(&self, key: &str) -> Result<Vec<String>, CourierError>;

    /// Set membership test.
    async fn sismember(&self, key: &str, member: &str) -> Result<bool, CourierError>;

    /// All live keys matching a glob pattern. Intended for one-time index
    /// rebuilds, not hot paths.
    async fn scan_keys(&self, pattern: &str) -> Result<Vec<String>, CourierError>;

    /// Publish a payload on a channel, delivering to all pattern subscribers
    /// whose pattern matches the channel name.
    async fn publish(&self, channel: &str, payload: &str) -> Result<(), CourierError>;

    /// Subscribe to every channel matching a glob pattern.
    ///
    /// Messages on one channel arrive in publish order; no ordering holds
    /// across distinct channels. Dropping the receiver ends the subscription.
    async fn subscribe_pattern(
        &self,
        pattern: &str,
    ) -> Result<mpsc::Receiver<StoreMessage>, CourierError>;
}
