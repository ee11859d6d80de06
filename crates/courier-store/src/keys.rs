// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Store key and pattern schema.
//!
//! Every key Courier writes lives under the `courier:` prefix. Lock keys are
//! colon-separated, which requires account and item ids to be colon-free (they
//! are opaque platform ids, never user input).

use courier_core::types::{AccountId, ItemId};

/// Prefix of every item-lock key.
pub const LOCK_KEY_PREFIX: &str = "courier:lock:";

/// Set of account ids whose lock-set index has been rebuilt.
pub const LOCK_INDEX_MIGRATED: &str = "courier:meta:lockset-migrated";

/// Pattern covering every channel name derived from a routing key.
pub const CHANNEL_PATTERN: &str = "courier:channel:*";

/// Pattern on which the store reports expired keys (the payload is the key).
pub const EXPIRY_PATTERN: &str = "__keyevent@*__:expired";

/// The key holding one item lock.
pub fn lock_key(account: &AccountId, item: &ItemId, options_digest: &str) -> String {
    format!("{LOCK_KEY_PREFIX}{account}:{item}:{options_digest}")
}

/// The per-account set indexing that account's lock keys.
pub fn account_lock_set(account: &AccountId) -> String {
    format!("courier:lockset:{account}")
}

/// Pattern matching every lock key of one account.
pub fn account_lock_pattern(account: &AccountId) -> String {
    format!("{LOCK_KEY_PREFIX}{account}:*")
}

/// Split a lock key into `(account, item, options_digest)`.
///
/// Returns `None` for keys outside the lock namespace, which the expiry loop
/// uses to skip unrelated expirations.
pub fn parse_lock_key(key: &str) -> Option<(AccountId, ItemId, String)> {
    let rest = key.strip_prefix(LOCK_KEY_PREFIX)?;
    let mut parts = rest.splitn(3, ':');
    let account = parts.next().filter(|s| !s.is_empty())?;
    let item = parts.next().filter(|s| !s.is_empty())?;
    let digest = parts.next()?;
    Some((
        AccountId(account.to_string()),
        ItemId(item.to_string()),
        digest.to_string(),
    ))
}
