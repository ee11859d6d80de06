// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-process registry mapping store channels to subscribed connections.
//!
//! Many-to-many: one connection subscribes to several channels, one channel
//! has several connections. Mutated only on subscribe/unsubscribe/disconnect;
//! read on every fan-out. Constructed per bridge instance so tests get a
//! fresh registry per case.

use std::collections::HashSet;

use dashmap::DashMap;

use courier_core::types::ConnectionId;

/// Channel-name -> connection-id subscription index.
#[derive(Default)]
pub struct SubscriptionRegistry {
    channels: DashMap<String, HashSet<ConnectionId>>,
    by_connection: DashMap<ConnectionId, HashSet<String>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection on a channel. Idempotent.
    pub fn subscribe(&self, channel: &str, connection: &ConnectionId) {
        self.channels
            .entry(channel.to_string())
            .or_default()
            .insert(connection.clone());
        self.by_connection
            .entry(connection.clone())
            .or_default()
            .insert(channel.to_string());
    }

    /// Remove a connection from a channel. Empty channel entries are dropped.
    pub fn unsubscribe(&self, channel: &str, connection: &ConnectionId) {
        if let Some(mut members) = self.channels.get_mut(channel) {
            members.remove(connection);
            if members.is_empty() {
                drop(members);
                self.channels.remove_if(channel, |_, m| m.is_empty());
            }
        }
        if let Some(mut channels) = self.by_connection.get_mut(connection) {
            channels.remove(channel);
        }
    }

    /// Drop every subscription of a connection, returning the channels it was
    /// registered on.
    pub fn remove_connection(&self, connection: &ConnectionId) -> Vec<String> {
        let channels: Vec<String> = self
            .by_connection
            .remove(connection)
            .map(|(_, set)| set.into_iter().collect())
            .unwrap_or_default();
        for channel in &channels {
            if let Some(mut members) = self.channels.get_mut(channel) {
                members.remove(connection);
                if members.is_empty() {
                    drop(members);
                    self.channels.remove_if(channel, |_, m| m.is_empty());
                }
            }
        }
        channels
    }

    /// Connections currently registered on a channel.
    pub fn connections_for(&self, channel: &str) -> Vec<ConnectionId> {
        self.channels
            .get(channel)
            .map(|members| members.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Channels a connection is currently registered on.
    pub fn channels_for(&self, connection: &ConnectionId) -> Vec<String> {
        self.by_connection
            .get(connection)
            .map(|channels| channels.iter().cloned().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conn(id: &str) -> ConnectionId {
        ConnectionId(id.to_string())
    }

    #[test]
    fn subscribe_is_many_to_many() {
        let registry = SubscriptionRegistry::new();
        registry.subscribe("ch-a", &conn("1"));
        registry.subscribe("ch-a", &conn("2"));
        registry.subscribe("ch-b", &conn("1"));

        let mut on_a = registry.connections_for("ch-a");
        on_a.sort_by(|a, b| a.0.cmp(&b.0));
        assert_eq!(on_a, vec![conn("1"), conn("2")]);

        let mut of_1 = registry.channels_for(&conn("1"));
        of_1.sort();
        assert_eq!(of_1, vec!["ch-a".to_string(), "ch-b".to_string()]);
    }

    #[test]
    fn subscribe_twice_registers_once() {
        let registry = SubscriptionRegistry::new();
        registry.subscribe("ch", &conn("1"));
        registry.subscribe("ch", &conn("1"));
        assert_eq!(registry.connections_for("ch").len(), 1);
    }

    #[test]
    fn unsubscribe_removes_single_membership() {
        let registry = SubscriptionRegistry::new();
        registry.subscribe("ch-a", &conn("1"));
        registry.subscribe("ch-b", &conn("1"));
        registry.unsubscribe("ch-a", &conn("1"));

        assert!(registry.connections_for("ch-a").is_empty());
        assert_eq!(registry.connections_for("ch-b"), vec![conn("1")]);
    }

    #[test]
    fn remove_connection_clears_all_memberships() {
        let registry = SubscriptionRegistry::new();
        registry.subscribe("ch-a", &conn("1"));
        registry.subscribe("ch-b", &conn("1"));
        registry.subscribe("ch-a", &conn("2"));

        let mut removed = registry.remove_connection(&conn("1"));
        removed.sort();
        assert_eq!(removed, vec!["ch-a".to_string(), "ch-b".to_string()]);

        assert_eq!(registry.connections_for("ch-a"), vec![conn("2")]);
        assert!(registry.channels_for(&conn("1")).is_empty());
    }

    #[test]
    fn unknown_lookups_return_empty() {
        let registry = SubscriptionRegistry::new();
        assert!(registry.connections_for("nope").is_empty());
        assert!(registry.channels_for(&conn("nope")).is_empty());
        assert!(registry.remove_connection(&conn("nope")).is_empty());
    }
}
