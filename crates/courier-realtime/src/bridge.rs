// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The pub/sub bridge: owns all live connections and moves messages between
//! them and the broadcast store.
//!
//! Inbound connection frames become store publishes (subject to dispatch
//! hooks); store messages fan out to the connections registered on the exact
//! channel. A second store subscription turns key expirations into
//! `ITEM_RELEASED` events re-dispatched through the normal publish path, so
//! every delivery rule (including admin filtering) applies uniformly.
//!
//! Connections are held in process-scoped maps owned by this struct; nothing
//! survives a restart. Reconnecting clients re-subscribe.

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use courier_core::error::CourierError;
use courier_core::notification::ServiceNotification;
use courier_core::protocol::{ClientFrame, ControlFrame, DispatchEvent};
use courier_core::traits::directory::AccountDirectory;
use courier_core::traits::store::BroadcastStore;
use courier_core::types::{AccountId, ConnectionId, PermissionSnapshot, RoutingKey, UserId};
use courier_store::keys;

use crate::hooks::{HookOutcome, HookRegistry, InitialStateProvider, ProviderRegistry};
use crate::locks::ItemLockManager;
use crate::registry::SubscriptionRegistry;

struct ConnectionState {
    sender: mpsc::Sender<String>,
    user_id: Option<UserId>,
    /// The routing keys this connection explicitly subscribed to. The
    /// implicit ALL membership is tracked only in the registry.
    routing_keys: HashSet<RoutingKey>,
    permissions: Option<PermissionSnapshot>,
}

/// Bridge between live connections and the broadcast store.
pub struct PubSubBridge {
    store: Arc<dyn BroadcastStore>,
    accounts: Arc<dyn AccountDirectory>,
    registry: SubscriptionRegistry,
    connections: DashMap<ConnectionId, ConnectionState>,
    hooks: HookRegistry,
    providers: ProviderRegistry,
}

impl PubSubBridge {
    /// A bridge with no hooks or providers registered.
    pub fn new(store: Arc<dyn BroadcastStore>, accounts: Arc<dyn AccountDirectory>) -> Self {
        Self {
            store,
            accounts,
            registry: SubscriptionRegistry::new(),
            connections: DashMap::new(),
            hooks: HookRegistry::new(),
            providers: ProviderRegistry::new(),
        }
    }

    /// Install the item-lock hooks and the current-locks provider.
    pub fn register_lock_hooks(&mut self, locks: Arc<ItemLockManager>) {
        crate::hooks::register_lock_hooks(&mut self.hooks, &mut self.providers, locks);
    }

    /// Install an additional dispatch hook.
    pub fn register_hook(
        &mut self,
        kind: courier_core::notification::NotificationKind,
        hook: Arc<dyn crate::hooks::DispatchHook>,
    ) {
        self.hooks.register(kind, hook);
    }

    /// Install an additional initial-state provider.
    pub fn register_provider(
        &mut self,
        kind: courier_core::types::RoutingKeyKind,
        provider: Arc<dyn InitialStateProvider>,
    ) {
        self.providers.register(kind, provider);
    }

    /// Subscribe to the store and spawn the fan-out and expiry loops.
    ///
    /// Both subscriptions are established before this returns, so publishes
    /// issued afterwards are never missed.
    pub async fn start(self: Arc<Self>) -> Result<Vec<JoinHandle<()>>, CourierError> {
        let fanout_rx = self.store.subscribe_pattern(keys::CHANNEL_PATTERN).await?;
        let expiry_rx = self.store.subscribe_pattern(keys::EXPIRY_PATTERN).await?;
        info!("pub/sub bridge started");
        Ok(vec![
            tokio::spawn(self.clone().fanout_loop(fanout_rx)),
            tokio::spawn(self.clone().expiry_loop(expiry_rx)),
        ])
    }

    /// Register a new connection and acknowledge it.
    pub async fn connect(
        &self,
        id: ConnectionId,
        user_id: Option<UserId>,
        sender: mpsc::Sender<String>,
    ) {
        self.connections.insert(
            id.clone(),
            ConnectionState {
                sender,
                user_id,
                routing_keys: HashSet::new(),
                permissions: None,
            },
        );
        self.push_to(&id, &ControlFrame::ConnectionSuccess).await;
        debug!(connection = %id, "connection established");
    }

    /// Remove a connection and all its subscriptions. No other side effects;
    /// held locks are left to their TTL.
    pub fn disconnect(&self, id: &ConnectionId) {
        self.connections.remove(id);
        let channels = self.registry.remove_connection(id);
        debug!(connection = %id, channels = channels.len(), "connection removed");
    }

    /// Handle one decoded inbound frame.
    pub async fn handle_frame(&self, id: &ConnectionId, frame: ClientFrame) {
        match frame {
            ClientFrame::Subscribe { body } => self.subscribe(id, body).await,
            ClientFrame::Unsubscribe { body } => self.unsubscribe(id, body).await,
            ClientFrame::Dispatch { body } => self.dispatch(body).await,
        }
    }

    /// Number of live connections. Mostly for health reporting.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    async fn subscribe(&self, id: &ConnectionId, routing_keys: Vec<RoutingKey>) {
        // One admin lookup per subscribe call, for the first account-scoped
        // key, before any map entry is held across an await.
        let user_id = self
            .connections
            .get(id)
            .and_then(|state| state.user_id.clone());
        let first_account = routing_keys.iter().find_map(|k| k.account_id()).cloned();
        let snapshot = match first_account {
            Some(account_id) => {
                let is_admin = match &user_id {
                    Some(user) => self
                        .accounts
                        .is_admin(&account_id, user)
                        .await
                        .unwrap_or_else(|e| {
                            warn!(error = %e, account = %account_id, "admin lookup failed, treating as non-admin");
                            false
                        }),
                    None => false,
                };
                Some(PermissionSnapshot {
                    account_id,
                    is_admin,
                })
            }
            None => None,
        };

        let ack;
        {
            let Some(mut state) = self.connections.get_mut(id) else {
                return;
            };
            for key in &routing_keys {
                self.registry.subscribe(&key.channel_name(), id);
                state.routing_keys.insert(key.clone());
            }
            if !routing_keys.is_empty() {
                // Every subscription implies the ALL scope.
                self.registry.subscribe(&RoutingKey::All.channel_name(), id);
            }
            if snapshot.is_some() {
                state.permissions = snapshot;
            }
            ack = Self::ack_frame(&state.routing_keys);
        }
        self.push_to(id, &ack).await;

        // Initial state, pushed only to the subscribing connection.
        for key in &routing_keys {
            for provider in self.providers.providers_for(key.kind()) {
                if let Some(state) = provider.initial_state(key).await {
                    self.push_to(id, &state).await;
                }
            }
        }
    }

    async fn unsubscribe(&self, id: &ConnectionId, routing_keys: Vec<RoutingKey>) {
        let ack;
        {
            let Some(mut state) = self.connections.get_mut(id) else {
                return;
            };
            for key in &routing_keys {
                self.registry.unsubscribe(&key.channel_name(), id);
                state.routing_keys.remove(key);
            }
            if state.routing_keys.is_empty() {
                self.registry
                    .unsubscribe(&RoutingKey::All.channel_name(), id);
            }
            state.permissions = None;
            ack = Self::ack_frame(&state.routing_keys);
        }
        self.push_to(id, &ack).await;
    }

    /// Publish an event, giving the kind's dispatch hook the chance to
    /// suppress or substitute it first.
    pub async fn dispatch(&self, event: DispatchEvent) {
        let DispatchEvent { routing_key, body } = event;
        let outcome = match self.hooks.hook_for(body.kind()) {
            Some(hook) => hook.before_publish(&routing_key, &body).await,
            None => HookOutcome::Proceed,
        };
        match outcome {
            HookOutcome::Proceed => self.publish(&routing_key, &body).await,
            HookOutcome::Substitute(payload) => self.publish(&routing_key, &payload).await,
            HookOutcome::Interrupt => {
                debug!(kind = ?body.kind(), "dispatch interrupted by hook");
            }
        }
    }

    async fn publish(&self, routing_key: &RoutingKey, body: &ServiceNotification) {
        let payload = match serde_json::to_string(body) {
            Ok(p) => p,
            Err(e) => {
                error!(error = %e, "notification payload not serializable");
                return;
            }
        };
        if let Err(e) = self
            .store
            .publish(&routing_key.channel_name(), &payload)
            .await
        {
            error!(error = %e, channel = %routing_key.channel_name(), "store publish failed");
        }
    }

    async fn fanout_loop(self: Arc<Self>, mut rx: mpsc::Receiver<courier_core::types::StoreMessage>) {
        while let Some(msg) = rx.recv().await {
            self.fan_out(&msg.channel, &msg.payload).await;
        }
        warn!("fan-out subscription closed");
    }

    async fn expiry_loop(self: Arc<Self>, mut rx: mpsc::Receiver<courier_core::types::StoreMessage>) {
        while let Some(msg) = rx.recv().await {
            // The payload of an expiry event is the expired key. Only lock
            // keys are re-dispatched; everything else expires silently.
            let Some((account, item_id, options_digest)) = keys::parse_lock_key(&msg.payload)
            else {
                continue;
            };
            debug!(account = %account, item = %item_id, "lock expired, dispatching release");
            self.dispatch(DispatchEvent {
                routing_key: RoutingKey::Account(account),
                body: ServiceNotification::ItemReleased {
                    item_id,
                    options_digest,
                },
            })
            .await;
        }
        warn!("expiry subscription closed");
    }

    /// Deliver one store message to every connection registered on its exact
    /// channel, honoring the admins-only flag.
    async fn fan_out(&self, channel: &str, payload: &str) {
        let notification: ServiceNotification = match serde_json::from_str(payload) {
            Ok(n) => n,
            Err(e) => {
                warn!(error = %e, channel = %channel, "undecodable store payload dropped");
                return;
            }
        };
        let admins_only = notification.admins_only();
        let scope_account = RoutingKey::from_channel_name(channel).and_then(|k| k.account_id().cloned());

        for id in self.registry.connections_for(channel) {
            let sender = {
                let Some(state) = self.connections.get(&id) else {
                    continue;
                };
                if admins_only && !Self::snapshot_allows(&state.permissions, scope_account.as_ref())
                {
                    continue;
                }
                state.sender.clone()
            };
            if sender.send(payload.to_string()).await.is_err() {
                debug!(connection = %id, "push to closed connection dropped");
            }
        }
    }

    fn snapshot_allows(
        snapshot: &Option<PermissionSnapshot>,
        scope_account: Option<&AccountId>,
    ) -> bool {
        match (snapshot, scope_account) {
            (Some(snapshot), Some(account)) => {
                snapshot.is_admin && snapshot.account_id == *account
            }
            // ALL-scoped admin payloads reach any connection with an admin
            // snapshot.
            (Some(snapshot), None) => snapshot.is_admin,
            (None, _) => false,
        }
    }

    fn ack_frame(routing_keys: &HashSet<RoutingKey>) -> ControlFrame {
        let mut body: Vec<RoutingKey> = routing_keys.iter().cloned().collect();
        body.sort_by_key(|k| k.channel_name());
        ControlFrame::RoutingKeysUpdated { body }
    }

    async fn push_to<T: Serialize>(&self, id: &ConnectionId, frame: &T) {
        let payload = match serde_json::to_string(frame) {
            Ok(p) => p,
            Err(e) => {
                error!(error = %e, "outbound frame not serializable");
                return;
            }
        };
        let Some(sender) = self.connections.get(id).map(|state| state.sender.clone()) else {
            return;
        };
        if sender.send(payload).await.is_err() {
            debug!(connection = %id, "push to closed connection dropped");
        }
    }
}
