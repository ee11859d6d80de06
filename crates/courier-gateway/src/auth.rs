// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Handshake auth for the WebSocket endpoint.
//!
//! Authorization proper happens upstream; this is only a shared-secret check
//! for deployments where the gateway is reachable without that middleware.

/// Bearer token configuration. `None` disables the check.
#[derive(Debug, Clone, Default)]
pub struct AuthConfig {
    pub bearer_token: Option<String>,
}

impl AuthConfig {
    /// Whether a handshake presenting `token` may proceed.
    pub fn allows(&self, token: Option<&str>) -> bool {
        match &self.bearer_token {
            None => true,
            Some(expected) => token == Some(expected.as_str()),
        }
    }
}
