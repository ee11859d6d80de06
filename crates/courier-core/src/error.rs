// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types shared across the Courier workspace.

use thiserror::Error;

/// The primary error type used across all Courier crates and trait boundaries.
#[derive(Debug, Error)]
pub enum CourierError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Broadcast store errors (connection loss, command failure, bad payload).
    #[error("broadcast store error: {message}")]
    Store {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// SQLite persistence errors (connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Connection channel errors (bind failure, closed socket, bad frame).
    #[error("channel error: {message}")]
    Channel {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Mail transport errors (SMTP connection, rejected message).
    #[error("mail transport error: {message}")]
    Mail {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A requested record does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The item a notification refers to no longer exists.
    ///
    /// Distinguished from generic failures so scheduled dispatch can discard
    /// the record instead of retrying a send that can never succeed.
    #[error("target item missing: {item_id}")]
    TargetItemMissing { item_id: String },

    /// A message template referenced a tag outside the supported set.
    #[error("unsupported template tag: {tag}")]
    UnsupportedTag { tag: String },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl CourierError {
    /// Build a [`CourierError::Store`] from a message and an underlying error.
    pub fn store(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Store {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Build a [`CourierError::Channel`] from a message and an underlying error.
    pub fn channel(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Channel {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// True when retrying the failed operation cannot succeed.
    pub fn is_unrecoverable(&self) -> bool {
        matches!(self, Self::TargetItemMissing { .. })
    }
}
