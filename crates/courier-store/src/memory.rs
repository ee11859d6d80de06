// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory broadcast store for tests and single-node deployments.
//!
//! Mirrors the Redis adapter's observable semantics: TTL-keyed strings,
//! non-expiring sets, glob-pattern subscriptions, and expiry notifications on
//! `__keyevent@0__:expired`. A background sweeper detects expirations so
//! subscribers see expiry events without any other store traffic.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};

use courier_core::error::CourierError;
use courier_core::traits::store::BroadcastStore;
use courier_core::types::StoreMessage;

/// Channel on which expired key names are reported.
const EXPIRED_CHANNEL: &str = "__keyevent@0__:expired";

/// How often the sweeper looks for expired keys.
const SWEEP_INTERVAL: Duration = Duration::from_millis(25);

struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

struct Subscriber {
    pattern: String,
    tx: mpsc::Sender<StoreMessage>,
}

#[derive(Default)]
struct Inner {
    entries: HashMap<String, Entry>,
    sets: HashMap<String, BTreeSet<String>>,
    subscribers: Vec<Subscriber>,
}

impl Inner {
    /// Senders whose pattern matches `channel`, pruning closed subscriptions.
    fn matching_senders(&mut self, channel: &str) -> Vec<mpsc::Sender<StoreMessage>> {
        self.subscribers.retain(|s| !s.tx.is_closed());
        self.subscribers
            .iter()
            .filter(|s| glob_match(&s.pattern, channel))
            .map(|s| s.tx.clone())
            .collect()
    }
}

/// In-memory [`BroadcastStore`] implementation.
///
/// Must be constructed inside a tokio runtime (the expiry sweeper is spawned
/// on creation; it stops when the store is dropped).
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        let inner = Arc::new(Mutex::new(Inner::default()));
        let weak = Arc::downgrade(&inner);

        tokio::spawn(async move {
            let mut tick = tokio::time::interval(SWEEP_INTERVAL);
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tick.tick().await;
                let Some(inner) = weak.upgrade() else { break };

                let (expired, senders) = {
                    let mut guard = inner.lock().await;
                    let now = Instant::now();
                    let expired: Vec<String> = guard
                        .entries
                        .iter()
                        .filter(|(_, e)| e.is_expired(now))
                        .map(|(k, _)| k.clone())
                        .collect();
                    for key in &expired {
                        guard.entries.remove(key);
                    }
                    let senders = if expired.is_empty() {
                        Vec::new()
                    } else {
                        guard.matching_senders(EXPIRED_CHANNEL)
                    };
                    (expired, senders)
                };

                for key in expired {
                    for tx in &senders {
                        let _ = tx
                            .send(StoreMessage {
                                channel: EXPIRED_CHANNEL.to_string(),
                                payload: key.clone(),
                            })
                            .await;
                    }
                }
            }
        });

        Self { inner }
    }

    async fn deliver(&self, senders: Vec<mpsc::Sender<StoreMessage>>, message: StoreMessage) {
        for tx in senders {
            let _ = tx.send(message.clone()).await;
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BroadcastStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CourierError> {
        let senders;
        {
            let mut guard = self.inner.lock().await;
            let now = Instant::now();
            let expired = match guard.entries.get(key) {
                Some(e) if !e.is_expired(now) => return Ok(Some(e.value.clone())),
                Some(_) => true,
                None => false,
            };
            if !expired {
                return Ok(None);
            }
            // Expired but not yet swept: drop it and report the expiry.
            guard.entries.remove(key);
            senders = guard.matching_senders(EXPIRED_CHANNEL);
        }
        self.deliver(
            senders,
            StoreMessage {
                channel: EXPIRED_CHANNEL.to_string(),
                payload: key.to_string(),
            },
        )
        .await;
        Ok(None)
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CourierError> {
        let mut guard = self.inner.lock().await;
        guard.entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Some(Instant::now() + ttl),
            },
        );
        Ok(())
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, CourierError> {
        let mut guard = self.inner.lock().await;
        let now = Instant::now();
        match guard.entries.get_mut(key) {
            Some(e) if !e.is_expired(now) => {
                e.expires_at = Some(now + ttl);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn del(&self, key: &str) -> Result<bool, CourierError> {
        let mut guard = self.inner.lock().await;
        Ok(guard.entries.remove(key).is_some())
    }

    async fn sadd(&self, key: &str, member: &str) -> Result<(), CourierError> {
        let mut guard = self.inner.lock().await;
        guard
            .sets
            .entry(key.to_string())
            .or_default()
            .insert(member.to_string());
        Ok(())
    }

    async fn srem(&self, key: &str, members: &[String]) -> Result<(), CourierError> {
        let mut guard = self.inner.lock().await;
        if let Some(set) = guard.sets.get_mut(key) {
            for member in members {
                set.remove(member);
            }
        }
        Ok(())
    }

    async fn smembers(&self, key: &str) -> Result<Vec<String>, CourierError> {
        let guard = self.inner.lock().await;
        Ok(guard
            .sets
            .get(key)
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn sismember(&self, key: &str, member: &str) -> Result<bool, CourierError> {
        let guard = self.inner.lock().await;
        Ok(guard.sets.get(key).is_some_and(|s| s.contains(member)))
    }

    async fn scan_keys(&self, pattern: &str) -> Result<Vec<String>, CourierError> {
        let guard = self.inner.lock().await;
        let now = Instant::now();
        Ok(guard
            .entries
            .iter()
            .filter(|(k, e)| !e.is_expired(now) && glob_match(pattern, k))
            .map(|(k, _)| k.clone())
            .collect())
    }

    async fn publish(&self, channel: &str, payload: &str) -> Result<(), CourierError> {
        let senders = {
            let mut guard = self.inner.lock().await;
            guard.matching_senders(channel)
        };
        self.deliver(
            senders,
            StoreMessage {
                channel: channel.to_string(),
                payload: payload.to_string(),
            },
        )
        .await;
        Ok(())
    }

    async fn subscribe_pattern(
        &self,
        pattern: &str,
    ) -> Result<mpsc::Receiver<StoreMessage>, CourierError> {
        let (tx, rx) = mpsc::channel(256);
        let mut guard = self.inner.lock().await;
        guard.subscribers.push(Subscriber {
            pattern: pattern.to_string(),
            tx,
        });
        Ok(rx)
    }
}

/// Glob match supporting `*` (any run of characters) and `?` (one character).
fn glob_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    let (mut pi, mut ti) = (0usize, 0usize);
    let mut star: Option<usize> = None;
    let mut mark = 0usize;

    while ti < t.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == t[ti]) {
            pi += 1;
            ti += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some(pi);
            mark = ti;
            pi += 1;
        } else if let Some(s) = star {
            pi = s + 1;
            mark += 1;
            ti = mark;
        } else {
            return false;
        }
    }
    while pi < p.len() && p[pi] == '*' {
        pi += 1;
    }
    pi == p.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{sleep, timeout};

    #[test]
    fn glob_match_star_and_question() {
        assert!(glob_match("courier:channel:*", "courier:channel:all"));
        assert!(glob_match("courier:channel:*", "courier:channel:account:a1"));
        assert!(!glob_match("courier:channel:*", "courier:lock:a:i:d"));
        assert!(glob_match("__keyevent@*__:expired", "__keyevent@0__:expired"));
        assert!(glob_match("a?c", "abc"));
        assert!(!glob_match("a?c", "ac"));
        assert!(glob_match("*", "anything"));
        assert!(glob_match("exact", "exact"));
        assert!(!glob_match("exact", "exactly"));
    }

    #[tokio::test]
    async fn set_get_roundtrip() {
        let store = MemoryStore::new();
        store
            .set_ex("k", "v", Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some("v".to_string()));
        assert_eq!(store.get("absent").await.unwrap(), None);
    }

    #[tokio::test]
    async fn expired_key_reads_as_absent() {
        let store = MemoryStore::new();
        store
            .set_ex("k", "v", Duration::from_millis(30))
            .await
            .unwrap();
        sleep(Duration::from_millis(80)).await;
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn expire_extends_a_live_key() {
        let store = MemoryStore::new();
        store
            .set_ex("k", "v", Duration::from_millis(60))
            .await
            .unwrap();
        assert!(store.expire("k", Duration::from_secs(60)).await.unwrap());
        sleep(Duration::from_millis(100)).await;
        assert_eq!(store.get("k").await.unwrap(), Some("v".to_string()));
        assert!(!store.expire("absent", Duration::from_secs(1)).await.unwrap());
    }

    #[tokio::test]
    async fn expiry_event_reaches_pattern_subscriber() {
        let store = MemoryStore::new();
        let mut rx = store
            .subscribe_pattern(crate::keys::EXPIRY_PATTERN)
            .await
            .unwrap();
        store
            .set_ex("courier:lock:a:i:d", "{}", Duration::from_millis(30))
            .await
            .unwrap();

        let msg = timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("expiry event not delivered")
            .unwrap();
        assert_eq!(msg.channel, EXPIRED_CHANNEL);
        assert_eq!(msg.payload, "courier:lock:a:i:d");
    }

    #[tokio::test]
    async fn explicit_delete_fires_no_expiry_event() {
        let store = MemoryStore::new();
        let mut rx = store
            .subscribe_pattern(crate::keys::EXPIRY_PATTERN)
            .await
            .unwrap();
        store
            .set_ex("k", "v", Duration::from_secs(60))
            .await
            .unwrap();
        assert!(store.del("k").await.unwrap());

        let got = timeout(Duration::from_millis(150), rx.recv()).await;
        assert!(got.is_err(), "DEL must not synthesize an expiry event");
    }

    #[tokio::test]
    async fn publish_reaches_matching_subscribers_in_order() {
        let store = MemoryStore::new();
        let mut on_channels = store.subscribe_pattern("courier:channel:*").await.unwrap();
        let mut on_other = store.subscribe_pattern("other:*").await.unwrap();

        store
            .publish("courier:channel:account:a", "first")
            .await
            .unwrap();
        store
            .publish("courier:channel:account:a", "second")
            .await
            .unwrap();

        let m1 = on_channels.recv().await.unwrap();
        let m2 = on_channels.recv().await.unwrap();
        assert_eq!(m1.payload, "first");
        assert_eq!(m2.payload, "second");

        let got = timeout(Duration::from_millis(100), on_other.recv()).await;
        assert!(got.is_err(), "non-matching pattern must not receive");
    }

    #[tokio::test]
    async fn set_operations() {
        let store = MemoryStore::new();
        store.sadd("s", "a").await.unwrap();
        store.sadd("s", "b").await.unwrap();
        store.sadd("s", "a").await.unwrap();

        assert!(store.sismember("s", "a").await.unwrap());
        assert!(!store.sismember("s", "z").await.unwrap());
        assert_eq!(store.smembers("s").await.unwrap().len(), 2);

        store.srem("s", &["a".to_string()]).await.unwrap();
        assert_eq!(store.smembers("s").await.unwrap(), vec!["b".to_string()]);
        assert_eq!(store.smembers("absent").await.unwrap(), Vec::<String>::new());
    }

    #[tokio::test]
    async fn scan_keys_filters_by_pattern() {
        let store = MemoryStore::new();
        store
            .set_ex("courier:lock:a:i1:d", "{}", Duration::from_secs(60))
            .await
            .unwrap();
        store
            .set_ex("courier:lock:b:i2:d", "{}", Duration::from_secs(60))
            .await
            .unwrap();

        let keys = store.scan_keys("courier:lock:a:*").await.unwrap();
        assert_eq!(keys, vec!["courier:lock:a:i1:d".to_string()]);
    }
}
