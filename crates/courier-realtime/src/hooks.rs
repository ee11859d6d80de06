// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Dispatch hooks and initial-state providers.
//!
//! A dispatch hook intercepts one notification kind before it is published:
//! it may let the payload through, suppress it, or substitute a different
//! payload. The registry is a struct with one slot per [`NotificationKind`]
//! behind an exhaustive match, so adding a kind forces a decision about its
//! hook.
//!
//! An initial-state provider supplies a newly-subscribing connection with the
//! current snapshot of some shared state; providers register per routing-key
//! kind.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use courier_core::notification::{NotificationKind, ServiceNotification};
use courier_core::types::{RoutingKey, RoutingKeyKind};

use crate::locks::{ItemLockManager, LockOutcome, UnlockOutcome};

/// What a dispatch hook decided about a payload.
#[derive(Debug, Clone, PartialEq)]
pub enum HookOutcome {
    /// Publish the payload as-is.
    Proceed,
    /// Publish nothing.
    Interrupt,
    /// Publish this payload instead.
    Substitute(ServiceNotification),
}

/// Interceptor for one notification kind.
#[async_trait]
pub trait DispatchHook: Send + Sync {
    async fn before_publish(
        &self,
        routing_key: &RoutingKey,
        body: &ServiceNotification,
    ) -> HookOutcome;
}

/// One hook slot per notification kind.
#[derive(Default)]
pub struct HookRegistry {
    item_lock: Option<Arc<dyn DispatchHook>>,
    item_unlock: Option<Arc<dyn DispatchHook>>,
    item_released: Option<Arc<dyn DispatchHook>>,
    current_locks: Option<Arc<dyn DispatchHook>>,
    broadcast: Option<Arc<dyn DispatchHook>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the hook for one kind, replacing any previous one.
    pub fn register(&mut self, kind: NotificationKind, hook: Arc<dyn DispatchHook>) {
        *self.slot_mut(kind) = Some(hook);
    }

    /// The hook registered for one kind, if any.
    pub fn hook_for(&self, kind: NotificationKind) -> Option<&Arc<dyn DispatchHook>> {
        match kind {
            NotificationKind::ItemLock => self.item_lock.as_ref(),
            NotificationKind::ItemUnlock => self.item_unlock.as_ref(),
            NotificationKind::ItemReleased => self.item_released.as_ref(),
            NotificationKind::CurrentLocks => self.current_locks.as_ref(),
            NotificationKind::Broadcast => self.broadcast.as_ref(),
        }
    }

    fn slot_mut(&mut self, kind: NotificationKind) -> &mut Option<Arc<dyn DispatchHook>> {
        match kind {
            NotificationKind::ItemLock => &mut self.item_lock,
            NotificationKind::ItemUnlock => &mut self.item_unlock,
            NotificationKind::ItemReleased => &mut self.item_released,
            NotificationKind::CurrentLocks => &mut self.current_locks,
            NotificationKind::Broadcast => &mut self.broadcast,
        }
    }
}

/// Supplier of a state snapshot for newly-subscribing connections.
#[async_trait]
pub trait InitialStateProvider: Send + Sync {
    /// `None` means nothing to push for this routing key.
    async fn initial_state(&self, routing_key: &RoutingKey) -> Option<ServiceNotification>;
}

/// Initial-state providers, registered per routing-key kind.
#[derive(Default)]
pub struct ProviderRegistry {
    account: Vec<Arc<dyn InitialStateProvider>>,
    all: Vec<Arc<dyn InitialStateProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, kind: RoutingKeyKind, provider: Arc<dyn InitialStateProvider>) {
        match kind {
            RoutingKeyKind::Account => self.account.push(provider),
            RoutingKeyKind::All => self.all.push(provider),
        }
    }

    pub fn providers_for(&self, kind: RoutingKeyKind) -> &[Arc<dyn InitialStateProvider>] {
        match kind {
            RoutingKeyKind::Account => &self.account,
            RoutingKeyKind::All => &self.all,
        }
    }
}

/// Hook for `ITEM_LOCK`: acquires (or touches) the lock, and answers a
/// redundant request with the real current holder instead of broadcasting a
/// duplicate grant.
pub struct LockRequestHook {
    locks: Arc<ItemLockManager>,
}

#[async_trait]
impl DispatchHook for LockRequestHook {
    async fn before_publish(
        &self,
        routing_key: &RoutingKey,
        body: &ServiceNotification,
    ) -> HookOutcome {
        let Some(account) = routing_key.account_id() else {
            debug!("lock request outside an account scope suppressed");
            return HookOutcome::Interrupt;
        };
        let ServiceNotification::ItemLock {
            item_id,
            holder,
            options,
            override_lock,
        } = body
        else {
            return HookOutcome::Proceed;
        };

        match self
            .locks
            .lock(account, item_id, holder.clone(), options, *override_lock)
            .await
        {
            LockOutcome::Acquired => HookOutcome::Proceed,
            LockOutcome::AlreadyHeld { holder: existing } => {
                HookOutcome::Substitute(ServiceNotification::ItemLock {
                    item_id: item_id.clone(),
                    holder: existing,
                    options: options.clone(),
                    override_lock: false,
                })
            }
            LockOutcome::Interrupt => HookOutcome::Interrupt,
        }
    }
}

/// Hook for `ITEM_UNLOCK`: releases the lock when the caller is its holder
/// and broadcasts the release; anything else is silently suppressed.
pub struct UnlockRequestHook {
    locks: Arc<ItemLockManager>,
}

#[async_trait]
impl DispatchHook for UnlockRequestHook {
    async fn before_publish(
        &self,
        routing_key: &RoutingKey,
        body: &ServiceNotification,
    ) -> HookOutcome {
        let Some(account) = routing_key.account_id() else {
            return HookOutcome::Interrupt;
        };
        let ServiceNotification::ItemUnlock {
            item_id,
            user_id,
            connection_id,
            options,
        } = body
        else {
            return HookOutcome::Proceed;
        };

        match self
            .locks
            .unlock(account, item_id, user_id, connection_id, options)
            .await
        {
            UnlockOutcome::Released => {
                HookOutcome::Substitute(ServiceNotification::ItemReleased {
                    item_id: item_id.clone(),
                    options_digest: ItemLockManager::options_digest(options),
                })
            }
            UnlockOutcome::Interrupt => HookOutcome::Interrupt,
        }
    }
}

/// Hook for `ITEM_RELEASED`: drops the expired key from the account's lock
/// index before the release is broadcast. The payload passes through.
pub struct ReleasedIndexHook {
    locks: Arc<ItemLockManager>,
}

#[async_trait]
impl DispatchHook for ReleasedIndexHook {
    async fn before_publish(
        &self,
        routing_key: &RoutingKey,
        body: &ServiceNotification,
    ) -> HookOutcome {
        if let (
            Some(account),
            ServiceNotification::ItemReleased {
                item_id,
                options_digest,
            },
        ) = (routing_key.account_id(), body)
        {
            self.locks
                .purge_expired(account, item_id, options_digest)
                .await;
        }
        HookOutcome::Proceed
    }
}

/// Pushes the account's currently-held locks to a newly-subscribing
/// connection. Empty lock sets push nothing.
pub struct CurrentLocksProvider {
    locks: Arc<ItemLockManager>,
}

#[async_trait]
impl InitialStateProvider for CurrentLocksProvider {
    async fn initial_state(&self, routing_key: &RoutingKey) -> Option<ServiceNotification> {
        let account = routing_key.account_id()?;
        let locks = self.locks.locks_for_account(account).await?;
        Some(ServiceNotification::CurrentLocks { locks })
    }
}

/// Wire the lock/unlock/expiry hooks and the current-locks provider.
pub fn register_lock_hooks(
    hooks: &mut HookRegistry,
    providers: &mut ProviderRegistry,
    locks: Arc<ItemLockManager>,
) {
    hooks.register(
        NotificationKind::ItemLock,
        Arc::new(LockRequestHook {
            locks: locks.clone(),
        }),
    );
    hooks.register(
        NotificationKind::ItemUnlock,
        Arc::new(UnlockRequestHook {
            locks: locks.clone(),
        }),
    );
    hooks.register(
        NotificationKind::ItemReleased,
        Arc::new(ReleasedIndexHook {
            locks: locks.clone(),
        }),
    );
    providers.register(
        RoutingKeyKind::Account,
        Arc::new(CurrentLocksProvider { locks }),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use courier_core::notification::{LockHolder, LockOptions};
    use courier_core::types::{AccountId, ConnectionId, ItemId, UserId};
    use courier_store::MemoryStore;

    fn wired() -> (HookRegistry, ProviderRegistry, Arc<ItemLockManager>) {
        let locks = Arc::new(ItemLockManager::new(
            Arc::new(MemoryStore::new()),
            Duration::from_secs(600),
        ));
        let mut hooks = HookRegistry::new();
        let mut providers = ProviderRegistry::new();
        register_lock_hooks(&mut hooks, &mut providers, locks.clone());
        (hooks, providers, locks)
    }

    fn holder(user: &str, conn: &str) -> LockHolder {
        LockHolder {
            user_id: UserId(user.into()),
            login: format!("{user}@example.org"),
            display_name: user.to_uppercase(),
            connection_id: ConnectionId(conn.into()),
        }
    }

    fn lock_payload(user: &str, conn: &str, override_lock: bool) -> ServiceNotification {
        ServiceNotification::ItemLock {
            item_id: ItemId("item-1".into()),
            holder: holder(user, conn),
            options: LockOptions::default(),
            override_lock,
        }
    }

    fn account_key() -> RoutingKey {
        RoutingKey::Account(AccountId("acct-1".into()))
    }

    #[tokio::test]
    async fn redundant_lock_request_is_answered_with_current_holder() {
        let (hooks, _, _) = wired();
        let hook = hooks.hook_for(NotificationKind::ItemLock).unwrap();

        let first = hook
            .before_publish(&account_key(), &lock_payload("h1", "c1", false))
            .await;
        assert_eq!(first, HookOutcome::Proceed);

        let second = hook
            .before_publish(&account_key(), &lock_payload("h2", "c2", false))
            .await;
        match second {
            HookOutcome::Substitute(ServiceNotification::ItemLock { holder, .. }) => {
                assert_eq!(holder.user_id, UserId("h1".into()));
            }
            other => panic!("expected substituted grant, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn lock_request_on_all_scope_is_suppressed() {
        let (hooks, _, _) = wired();
        let hook = hooks.hook_for(NotificationKind::ItemLock).unwrap();
        let outcome = hook
            .before_publish(&RoutingKey::All, &lock_payload("h1", "c1", false))
            .await;
        assert_eq!(outcome, HookOutcome::Interrupt);
    }

    #[tokio::test]
    async fn matching_unlock_substitutes_release() {
        let (hooks, _, _) = wired();
        hooks
            .hook_for(NotificationKind::ItemLock)
            .unwrap()
            .before_publish(&account_key(), &lock_payload("h1", "c1", false))
            .await;

        let unlock = ServiceNotification::ItemUnlock {
            item_id: ItemId("item-1".into()),
            user_id: UserId("h1".into()),
            connection_id: ConnectionId("c1".into()),
            options: LockOptions::default(),
        };
        let outcome = hooks
            .hook_for(NotificationKind::ItemUnlock)
            .unwrap()
            .before_publish(&account_key(), &unlock)
            .await;
        assert!(matches!(
            outcome,
            HookOutcome::Substitute(ServiceNotification::ItemReleased { .. })
        ));
    }

    #[tokio::test]
    async fn stale_unlock_is_suppressed() {
        let (hooks, _, _) = wired();
        hooks
            .hook_for(NotificationKind::ItemLock)
            .unwrap()
            .before_publish(&account_key(), &lock_payload("h1", "c1", false))
            .await;

        let stale = ServiceNotification::ItemUnlock {
            item_id: ItemId("item-1".into()),
            user_id: UserId("h1".into()),
            connection_id: ConnectionId("c-stale".into()),
            options: LockOptions::default(),
        };
        let outcome = hooks
            .hook_for(NotificationKind::ItemUnlock)
            .unwrap()
            .before_publish(&account_key(), &stale)
            .await;
        assert_eq!(outcome, HookOutcome::Interrupt);
    }

    #[tokio::test]
    async fn current_locks_provider_skips_empty_accounts() {
        let (_, providers, locks) = wired();
        let provider = &providers.providers_for(RoutingKeyKind::Account)[0];

        assert!(provider.initial_state(&account_key()).await.is_none());
        assert!(provider.initial_state(&RoutingKey::All).await.is_none());

        locks
            .lock(
                &AccountId("acct-1".into()),
                &ItemId("item-1".into()),
                holder("h1", "c1"),
                &LockOptions::default(),
                false,
            )
            .await;
        let state = provider.initial_state(&account_key()).await.unwrap();
        assert!(matches!(
            state,
            ServiceNotification::CurrentLocks { ref locks } if locks.len() == 1
        ));
    }

    #[tokio::test]
    async fn unhooked_kinds_resolve_to_none() {
        let (hooks, _, _) = wired();
        assert!(hooks.hook_for(NotificationKind::Broadcast).is_none());
        assert!(hooks.hook_for(NotificationKind::CurrentLocks).is_none());
    }
}
