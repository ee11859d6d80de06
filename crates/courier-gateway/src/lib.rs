// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WebSocket gateway for the Courier notification service.
//!
//! The gateway is deliberately thin: it upgrades connections, decodes client
//! frames, and hands everything to the pub/sub bridge, which owns all
//! connection and subscription state.

pub mod auth;
pub mod server;
pub mod ws;

pub use auth::AuthConfig;
pub use server::{GatewayState, ServerConfig, start_server};
