// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Distributed item locks backed by the broadcast store.
//!
//! A lock is one TTL-keyed store entry per `(account, item, options digest)`.
//! Lock existence is authoritative in the store; a per-account set indexes the
//! keys so all locks of an account can be enumerated without a key scan. The
//! index may lag behind TTL expirations and is reconciled lazily on read.
//!
//! Store failures never propagate out of the public operations: the live
//! update path degrades to "interrupt dispatch" so a flaky store cannot crash
//! the bridge.

use std::sync::Arc;
use std::time::Duration;

use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use courier_core::error::CourierError;
use courier_core::notification::{HeldLock, LockHolder, LockOptions};
use courier_core::traits::store::BroadcastStore;
use courier_core::types::{AccountId, ConnectionId, ItemId, UserId};
use courier_store::keys;

/// TTL applied to every lock write and refresh.
pub const DEFAULT_LOCK_TTL: Duration = Duration::from_secs(600);

/// Result of a lock attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockOutcome {
    /// The caller now holds the lock.
    Acquired,
    /// Someone already holds the lock; the TTL was refreshed and the existing
    /// holder identity is returned for the substituted broadcast.
    AlreadyHeld { holder: LockHolder },
    /// Store failure: suppress the broadcast, keep the connection alive.
    Interrupt,
}

/// Result of an unlock attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnlockOutcome {
    /// The lock was released by its holder.
    Released,
    /// No lock, a different holder, or a store failure: suppress the
    /// broadcast so a stale release cannot evict a newer lock.
    Interrupt,
}

/// Distributed mutual exclusion over editable items, scoped by account.
pub struct ItemLockManager {
    store: Arc<dyn BroadcastStore>,
    ttl: Duration,
}

impl ItemLockManager {
    pub fn new(store: Arc<dyn BroadcastStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// Stable digest of a lock-options map.
    ///
    /// `serde_json::Map` keeps keys sorted, so equal maps serialize equally
    /// regardless of insertion order.
    pub fn options_digest(options: &LockOptions) -> String {
        let canonical = serde_json::to_string(&options.0).unwrap_or_default();
        let digest = Sha256::digest(canonical.as_bytes());
        hex::encode(&digest[..8])
    }

    /// Attempt to take the lock on `(account, item, options)`.
    ///
    /// If a lock already exists and `override_lock` is false, its TTL is
    /// refreshed and the existing holder is reported (extend-on-touch). With
    /// `override_lock`, the holder is overwritten unconditionally.
    pub async fn lock(
        &self,
        account: &AccountId,
        item: &ItemId,
        holder: LockHolder,
        options: &LockOptions,
        override_lock: bool,
    ) -> LockOutcome {
        match self
            .try_lock(account, item, holder, options, override_lock)
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(error = %e, account = %account, item = %item, "lock failed, interrupting dispatch");
                LockOutcome::Interrupt
            }
        }
    }

    async fn try_lock(
        &self,
        account: &AccountId,
        item: &ItemId,
        holder: LockHolder,
        options: &LockOptions,
        override_lock: bool,
    ) -> Result<LockOutcome, CourierError> {
        self.ensure_account_lock_set(account).await?;
        let key = keys::lock_key(account, item, &Self::options_digest(options));

        if !override_lock && let Some(raw) = self.store.get(&key).await? {
            match serde_json::from_str::<LockHolder>(&raw) {
                Ok(existing) => {
                    // Extend-on-touch: every attempt refreshes the TTL.
                    self.store.expire(&key, self.ttl).await?;
                    return Ok(LockOutcome::AlreadyHeld { holder: existing });
                }
                Err(e) => {
                    warn!(error = %e, key = %key, "unreadable lock record, overwriting");
                }
            }
        }

        let raw = serde_json::to_string(&holder)
            .map_err(|e| CourierError::Internal(format!("serialize lock holder: {e}")))?;
        self.store.set_ex(&key, &raw, self.ttl).await?;
        self.store
            .sadd(&keys::account_lock_set(account), &key)
            .await?;
        Ok(LockOutcome::Acquired)
    }

    /// Release a lock, but only when the stored holder matches the caller on
    /// both user and connection.
    pub async fn unlock(
        &self,
        account: &AccountId,
        item: &ItemId,
        user: &UserId,
        connection: &ConnectionId,
        options: &LockOptions,
    ) -> UnlockOutcome {
        match self.try_unlock(account, item, user, connection, options).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(error = %e, account = %account, item = %item, "unlock failed, interrupting dispatch");
                UnlockOutcome::Interrupt
            }
        }
    }

    async fn try_unlock(
        &self,
        account: &AccountId,
        item: &ItemId,
        user: &UserId,
        connection: &ConnectionId,
        options: &LockOptions,
    ) -> Result<UnlockOutcome, CourierError> {
        let key = keys::lock_key(account, item, &Self::options_digest(options));
        let Some(raw) = self.store.get(&key).await? else {
            return Ok(UnlockOutcome::Interrupt);
        };
        let Ok(holder) = serde_json::from_str::<LockHolder>(&raw) else {
            return Ok(UnlockOutcome::Interrupt);
        };
        if holder.user_id != *user || holder.connection_id != *connection {
            return Ok(UnlockOutcome::Interrupt);
        }

        self.store.del(&key).await?;
        self.store
            .srem(&keys::account_lock_set(account), &[key])
            .await?;
        Ok(UnlockOutcome::Released)
    }

    /// All currently-held locks of an account, or `None` when there are none
    /// (so the bridge can skip an empty push).
    ///
    /// Reading reconciles the index: entries whose backing key has expired are
    /// purged from the set in one batched removal.
    pub async fn locks_for_account(&self, account: &AccountId) -> Option<Vec<HeldLock>> {
        let (valid, stale) = match self.read_locks(account).await {
            Ok(result) => result,
            Err(e) => {
                warn!(error = %e, account = %account, "lock enumeration failed");
                return None;
            }
        };

        if !stale.is_empty() {
            debug!(account = %account, purged = stale.len(), "purging stale lock index entries");
            if let Err(e) = self
                .store
                .srem(&keys::account_lock_set(account), &stale)
                .await
            {
                warn!(error = %e, account = %account, "stale lock index purge failed");
            }
        }

        if valid.is_empty() { None } else { Some(valid) }
    }

    /// Two-value read of the lock index: currently-valid locks plus index
    /// entries with no backing key, for the caller to purge as one batch.
    async fn read_locks(
        &self,
        account: &AccountId,
    ) -> Result<(Vec<HeldLock>, Vec<String>), CourierError> {
        self.ensure_account_lock_set(account).await?;

        let indexed = self
            .store
            .smembers(&keys::account_lock_set(account))
            .await?;
        let mut valid = Vec::new();
        let mut stale = Vec::new();

        for key in indexed {
            let Some((_, item_id, _)) = keys::parse_lock_key(&key) else {
                stale.push(key);
                continue;
            };
            match self.store.get(&key).await? {
                Some(raw) => match serde_json::from_str::<LockHolder>(&raw) {
                    Ok(holder) => valid.push(HeldLock { item_id, holder }),
                    Err(_) => stale.push(key),
                },
                None => stale.push(key),
            }
        }

        Ok((valid, stale))
    }

    /// Drop one expired lock's index entry. Used by the expiry re-dispatch
    /// path; the backing key is already gone.
    pub async fn purge_expired(&self, account: &AccountId, item: &ItemId, options_digest: &str) {
        let key = keys::lock_key(account, item, options_digest);
        if let Err(e) = self
            .store
            .srem(&keys::account_lock_set(account), &[key])
            .await
        {
            warn!(error = %e, account = %account, "expired lock index purge failed");
        }
    }

    /// Idempotent, once-per-account index migration.
    ///
    /// Before the per-account sets existed, locks were only discoverable by
    /// key scan. The first lock operation touching an account rebuilds its
    /// set from a scan, then records the account in a marker set so the scan
    /// never runs again.
    async fn ensure_account_lock_set(&self, account: &AccountId) -> Result<(), CourierError> {
        if self
            .store
            .sismember(keys::LOCK_INDEX_MIGRATED, &account.0)
            .await?
        {
            return Ok(());
        }

        let found = self
            .store
            .scan_keys(&keys::account_lock_pattern(account))
            .await?;
        let set = keys::account_lock_set(account);
        for key in &found {
            self.store.sadd(&set, key).await?;
        }
        self.store
            .sadd(keys::LOCK_INDEX_MIGRATED, &account.0)
            .await?;
        debug!(account = %account, indexed = found.len(), "lock index migrated");
        Ok(())
    }
}
