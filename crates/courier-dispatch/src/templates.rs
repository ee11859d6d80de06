// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message templates and `[[tag]]` rendering.
//!
//! Accounts can override the template per notification kind (persisted in
//! storage); these are the compiled-in defaults. Custom notifications carry
//! their own subject and body and never use a stored template.

use std::collections::BTreeMap;

use courier_core::notification::Notification;

/// One renderable message template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageTemplate {
    pub subject: String,
    pub text: String,
    pub html: Option<String>,
}

/// The compiled-in template for a notification.
pub fn default_template(notification: &Notification) -> MessageTemplate {
    match notification {
        Notification::Publish { .. } => MessageTemplate {
            subject: "\"[[title]]\" was published".into(),
            text: "Hi [[name]],\n\n[[actor]] published \"[[title]]\".\n\nRead it here: [[reader_link]]\n".into(),
            html: None,
        },
        Notification::PublishRequest { .. } => MessageTemplate {
            subject: "[[actor]] wants to publish \"[[title]]\"".into(),
            text: "Hi [[name]],\n\n[[actor]] requested to publish \"[[title]]\".\n\nReview the draft: [[editor_link]]\n".into(),
            html: None,
        },
        Notification::ReviewRequest { .. } => MessageTemplate {
            subject: "Review requested for \"[[title]]\"".into(),
            text: "Hi [[name]],\n\n[[actor]] asked you to review \"[[title]]\".\n\nOpen it here: [[editor_link]]\n".into(),
            html: None,
        },
        Notification::Custom {
            subject,
            text,
            html,
            ..
        } => MessageTemplate {
            subject: subject.clone(),
            text: text.clone(),
            html: html.clone(),
        },
    }
}

/// Substitute every `[[tag]]` occurrence with its resolved value.
///
/// Tags without a value are left verbatim; the tag set is computed from the
/// template beforehand, so that only happens for text the resolver rejected.
pub fn render(template: &str, variables: &BTreeMap<String, String>) -> String {
    let mut out = template.to_string();
    for (tag, value) in variables {
        out = out.replace(&format!("[[{tag}]]"), value);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_core::types::{ItemId, UserId};

    #[test]
    fn render_substitutes_all_occurrences() {
        let mut vars = BTreeMap::new();
        vars.insert("name".to_string(), "Ada".to_string());
        vars.insert("title".to_string(), "Launch".to_string());

        let out = render("Hi [[name]], [[title]] / [[title]]", &vars);
        assert_eq!(out, "Hi Ada, Launch / Launch");
    }

    #[test]
    fn render_leaves_unknown_tags_alone() {
        let vars = BTreeMap::new();
        assert_eq!(render("keep [[this]]", &vars), "keep [[this]]");
    }

    #[test]
    fn custom_notifications_use_their_own_content() {
        let n = Notification::Custom {
            subject: "Subject [[name]]".into(),
            text: "Body".into(),
            html: Some("<p>Body</p>".into()),
            actor_id: UserId("u".into()),
            targets: vec![],
        };
        let template = default_template(&n);
        assert_eq!(template.subject, "Subject [[name]]");
        assert_eq!(template.html.as_deref(), Some("<p>Body</p>"));
    }

    #[test]
    fn item_kinds_have_distinct_defaults() {
        let publish = default_template(&Notification::Publish {
            item_id: ItemId("i".into()),
            actor_id: UserId("u".into()),
        });
        let review = default_template(&Notification::ReviewRequest {
            item_id: ItemId("i".into()),
            actor_id: UserId("u".into()),
        });
        assert_ne!(publish.subject, review.subject);
        assert!(publish.text.contains("[[reader_link]]"));
        assert!(review.text.contains("[[editor_link]]"));
    }
}
