// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Real-time coordination for the Courier notification service.
//!
//! Hosts the pub/sub bridge between live client connections and the broadcast
//! store, the process-local subscription registry, the distributed item lock
//! manager, and the hook/provider extension points the bridge consults.

pub mod bridge;
pub mod hooks;
pub mod locks;
pub mod registry;

pub use bridge::PubSubBridge;
pub use hooks::{
    DispatchHook, HookOutcome, HookRegistry, InitialStateProvider, ProviderRegistry,
    register_lock_hooks,
};
pub use locks::{DEFAULT_LOCK_TTL, ItemLockManager, LockOutcome, UnlockOutcome};
pub use registry::SubscriptionRegistry;
