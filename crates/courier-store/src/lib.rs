// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Broadcast store adapters for the Courier notification service.
//!
//! Two implementations of `courier_core::BroadcastStore` live here: the Redis
//! adapter used in production and an in-memory adapter with identical
//! observable semantics for tests and single-node deployments. The `keys`
//! module owns the key/pattern schema shared by both.

pub mod keys;
pub mod memory;
pub mod redis;

pub use memory::MemoryStore;
pub use self::redis::RedisStore;
