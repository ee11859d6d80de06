// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wire frames exchanged with clients over the persistent connection.
//!
//! Client -> Server (JSON):
//! ```json
//! {"type": "SUBSCRIBE", "body": [{"type": "ACCOUNT", "value": "acct-1"}]}
//! {"type": "UNSUBSCRIBE", "body": [{"type": "ACCOUNT", "value": "acct-1"}]}
//! {"type": "DISPATCH", "body": {"routingKey": {...}, "body": {...}}}
//! ```
//!
//! Server -> Client (JSON):
//! ```json
//! {"type": "CONNECTION_SUCCESS"}
//! {"type": "ROUTING_KEYS_UPDATED", "body": [...]}
//! ```
//! plus any [`ServiceNotification`] payload, tagged by its own `type` field.

use serde::{Deserialize, Serialize};

use crate::notification::ServiceNotification;
use crate::types::RoutingKey;

/// An event a client asks the bridge to publish.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchEvent {
    pub routing_key: RoutingKey,
    pub body: ServiceNotification,
}

/// A frame received from a client connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientFrame {
    Subscribe { body: Vec<RoutingKey> },
    Unsubscribe { body: Vec<RoutingKey> },
    Dispatch { body: DispatchEvent },
}

/// A bridge-originated control frame pushed to a client connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlFrame {
    ConnectionSuccess,
    RoutingKeysUpdated { body: Vec<RoutingKey> },
}

/// Any frame pushed to a client: a control frame or a notification payload.
///
/// Untagged because both arms carry their own `type` field; used by tests and
/// clients to decode the outbound stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ServerFrame {
    Control(ControlFrame),
    Notification(ServiceNotification),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AccountId;

    #[test]
    fn subscribe_frame_decodes() {
        let json = r#"{"type": "SUBSCRIBE", "body": [{"type": "ACCOUNT", "value": "a1"}]}"#;
        let frame: ClientFrame = serde_json::from_str(json).unwrap();
        assert_eq!(
            frame,
            ClientFrame::Subscribe {
                body: vec![RoutingKey::Account(AccountId("a1".into()))]
            }
        );
    }

    #[test]
    fn dispatch_frame_decodes_nested_event() {
        let json = r#"{
            "type": "DISPATCH",
            "body": {
                "routingKey": {"type": "ALL"},
                "body": {"type": "BROADCAST", "payload": {"n": 1}, "adminsOnly": true}
            }
        }"#;
        let frame: ClientFrame = serde_json::from_str(json).unwrap();
        match frame {
            ClientFrame::Dispatch { body } => {
                assert_eq!(body.routing_key, RoutingKey::All);
                assert!(body.body.admins_only());
            }
            _ => panic!("expected DISPATCH"),
        }
    }

    #[test]
    fn connection_success_encodes_bare_type() {
        let json = serde_json::to_string(&ControlFrame::ConnectionSuccess).unwrap();
        assert_eq!(json, r#"{"type":"CONNECTION_SUCCESS"}"#);
    }

    #[test]
    fn server_frame_distinguishes_control_from_notification() {
        let control: ServerFrame =
            serde_json::from_str(r#"{"type":"CONNECTION_SUCCESS"}"#).unwrap();
        assert!(matches!(control, ServerFrame::Control(_)));

        let notification: ServerFrame = serde_json::from_str(
            r#"{"type":"ITEM_RELEASED","itemId":"i1","optionsDigest":"d"}"#,
        )
        .unwrap();
        assert!(matches!(notification, ServerFrame::Notification(_)));
    }
}
