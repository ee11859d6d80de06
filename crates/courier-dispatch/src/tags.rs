// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Template tag resolution with per-dispatch memoization.
//!
//! The tag set is closed: `actor`, `editor_link`, `reader_link`, `title`,
//! `name`. Everything but `name` is dispatch-scoped and resolved at most once
//! per [`TagResolver`] instance. `name` is recipient-scoped and recomputed
//! for every recipient; caching it would leak one recipient's name into
//! another's message in a batch send.

use std::collections::BTreeSet;
use std::sync::Arc;

use tokio::sync::OnceCell;

use courier_core::error::CourierError;
use courier_core::notification::Notification;
use courier_core::traits::directory::{DomainLookup, ItemDirectory, UserDirectory};
use courier_core::types::{AccountId, ItemId, Recipient};

/// The supported template tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateTag {
    Actor,
    EditorLink,
    ReaderLink,
    Title,
    Name,
}

impl TemplateTag {
    /// Parse a tag name as it appears between `[[` and `]]`.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "actor" => Some(Self::Actor),
            "editor_link" => Some(Self::EditorLink),
            "reader_link" => Some(Self::ReaderLink),
            "title" => Some(Self::Title),
            "name" => Some(Self::Name),
            _ => None,
        }
    }
}

/// Collect `[[tag]]` names across template parts (subject, text, html),
/// unioned. Unknown names are collected too; they fail at resolution with a
/// typed error rather than silently disappearing.
pub fn find_tags(parts: &[&str]) -> BTreeSet<String> {
    let mut tags = BTreeSet::new();
    for part in parts {
        let mut rest = *part;
        while let Some(start) = rest.find("[[") {
            let after = &rest[start + 2..];
            let Some(end) = after.find("]]") else { break };
            let name = &after[..end];
            if !name.is_empty()
                && name
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c == '_')
            {
                tags.insert(name.to_string());
            }
            rest = &after[end + 2..];
        }
    }
    tags
}

/// Lazily computes and memoizes template variables for one dispatch.
pub struct TagResolver {
    account_id: AccountId,
    notification: Notification,
    users: Arc<dyn UserDirectory>,
    items: Arc<dyn ItemDirectory>,
    domains: Arc<dyn DomainLookup>,
    actor: OnceCell<String>,
    title: OnceCell<String>,
    editor_link: OnceCell<String>,
    reader_link: OnceCell<String>,
    domain: OnceCell<String>,
}

impl TagResolver {
    pub fn new(
        account_id: AccountId,
        notification: Notification,
        users: Arc<dyn UserDirectory>,
        items: Arc<dyn ItemDirectory>,
        domains: Arc<dyn DomainLookup>,
    ) -> Self {
        Self {
            account_id,
            notification,
            users,
            items,
            domains,
            actor: OnceCell::new(),
            title: OnceCell::new(),
            editor_link: OnceCell::new(),
            reader_link: OnceCell::new(),
            domain: OnceCell::new(),
        }
    }

    /// Resolve the requested tags for one recipient.
    ///
    /// Fails with [`CourierError::UnsupportedTag`] on any name outside the
    /// supported set.
    pub async fn variables_for(
        &self,
        tags: &BTreeSet<String>,
        recipient: &Recipient,
    ) -> Result<std::collections::BTreeMap<String, String>, CourierError> {
        let mut variables = std::collections::BTreeMap::new();
        for name in tags {
            let Some(tag) = TemplateTag::parse(name) else {
                return Err(CourierError::UnsupportedTag { tag: name.clone() });
            };
            let value = match tag {
                TemplateTag::Name => recipient.display_name.clone(),
                shared => self.shared_value(shared).await?,
            };
            variables.insert(name.clone(), value);
        }
        Ok(variables)
    }

    async fn shared_value(&self, tag: TemplateTag) -> Result<String, CourierError> {
        match tag {
            TemplateTag::Actor => self
                .actor
                .get_or_try_init(|| async {
                    self.users.display_name(self.notification.actor_id()).await
                })
                .await
                .cloned(),
            TemplateTag::Title => self
                .title
                .get_or_try_init(|| async {
                    let item = self.item()?;
                    self.items.title(&self.account_id, item).await
                })
                .await
                .cloned(),
            TemplateTag::EditorLink => self
                .editor_link
                .get_or_try_init(|| async {
                    let item = self.item()?.clone();
                    let domain = self.domain().await?;
                    Ok(format!("https://{domain}/editor/{item}"))
                })
                .await
                .cloned(),
            TemplateTag::ReaderLink => self
                .reader_link
                .get_or_try_init(|| async {
                    let item = self.item()?.clone();
                    let domain = self.domain().await?;
                    Ok(format!("https://{domain}/items/{item}"))
                })
                .await
                .cloned(),
            TemplateTag::Name => Err(CourierError::Internal(
                "name is recipient-scoped and never shared".into(),
            )),
        }
    }

    fn item(&self) -> Result<&ItemId, CourierError> {
        self.notification.item_id().ok_or_else(|| {
            CourierError::Internal("notification carries no item for link/title tags".into())
        })
    }

    /// The account's public domain, fetched once and reused by both links.
    async fn domain(&self) -> Result<&str, CourierError> {
        self.domain
            .get_or_try_init(|| async { self.domains.public_domain(&self.account_id).await })
            .await
            .map(|s| s.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_core::types::UserId;
    use courier_test_utils::{MockDomainLookup, MockItemDirectory, MockUserDirectory};

    #[test]
    fn find_tags_unions_parts_and_skips_malformed() {
        let tags = find_tags(&[
            "Subject [[title]]",
            "Hi [[name]], [[actor]] edited [[title]]. See [[reader_link]]",
            "broken [[ not-a-tag ]] and [[unclosed",
        ]);
        let names: Vec<&str> = tags.iter().map(|s| s.as_str()).collect();
        assert_eq!(names, vec!["actor", "name", "reader_link", "title"]);
    }

    #[test]
    fn tag_parse_covers_closed_set_only() {
        assert_eq!(TemplateTag::parse("actor"), Some(TemplateTag::Actor));
        assert_eq!(TemplateTag::parse("name"), Some(TemplateTag::Name));
        assert_eq!(TemplateTag::parse("banner"), None);
    }

    fn fixtures() -> (
        Arc<MockUserDirectory>,
        Arc<MockItemDirectory>,
        Arc<MockDomainLookup>,
    ) {
        let users = Arc::new(
            MockUserDirectory::new()
                .with_user("actor-1", "actor@example.org", "The Actor")
                .with_user("u1", "u1@example.org", "User One")
                .with_user("u2", "u2@example.org", "User Two")
                .with_user("u3", "u3@example.org", "User Three"),
        );
        let items = Arc::new(MockItemDirectory::new().with_item("a", "item-1", "Launch Post"));
        let domains = Arc::new(MockDomainLookup::new("example.org"));
        (users, items, domains)
    }

    fn recipient(id: &str, name: &str) -> Recipient {
        Recipient {
            user_id: UserId(id.into()),
            email: format!("{id}@example.org"),
            display_name: name.into(),
        }
    }

    #[tokio::test]
    async fn shared_tags_resolve_once_while_name_varies_per_recipient() {
        let (users, items, domains) = fixtures();
        let resolver = TagResolver::new(
            AccountId("a".into()),
            Notification::Publish {
                item_id: ItemId("item-1".into()),
                actor_id: UserId("actor-1".into()),
            },
            users.clone(),
            items.clone(),
            domains.clone(),
        );

        let tags = find_tags(&[
            "Hi [[name]], [[actor]] published [[title]]: [[reader_link]] ([[editor_link]])",
        ]);

        let recipients = [
            recipient("u1", "User One"),
            recipient("u2", "User Two"),
            recipient("u3", "User Three"),
        ];
        let mut names = Vec::new();
        let mut shared = Vec::new();
        for r in &recipients {
            let vars = resolver.variables_for(&tags, r).await.unwrap();
            names.push(vars["name"].clone());
            shared.push((
                vars["actor"].clone(),
                vars["title"].clone(),
                vars["reader_link"].clone(),
                vars["editor_link"].clone(),
            ));
        }

        assert_eq!(names, vec!["User One", "User Two", "User Three"]);
        assert!(shared.iter().all(|s| *s == shared[0]));
        assert_eq!(shared[0].2, "https://example.org/items/item-1");
        assert_eq!(shared[0].3, "https://example.org/editor/item-1");

        // Each dispatch-scoped resolver ran at most once across the batch.
        assert_eq!(users.display_name_calls(), 1);
        assert_eq!(items.title_calls(), 1);
        assert_eq!(domains.lookups(), 1);
    }

    #[tokio::test]
    async fn unknown_tag_fails_typed() {
        let (users, items, domains) = fixtures();
        let resolver = TagResolver::new(
            AccountId("a".into()),
            Notification::Publish {
                item_id: ItemId("item-1".into()),
                actor_id: UserId("actor-1".into()),
            },
            users,
            items,
            domains,
        );

        let mut tags = BTreeSet::new();
        tags.insert("banner".to_string());
        let err = resolver
            .variables_for(&tags, &recipient("u1", "User One"))
            .await
            .unwrap_err();
        assert!(matches!(err, CourierError::UnsupportedTag { tag } if tag == "banner"));
    }

    #[tokio::test]
    async fn missing_item_surfaces_through_title_tag() {
        let (users, items, domains) = fixtures();
        let resolver = TagResolver::new(
            AccountId("a".into()),
            Notification::Publish {
                item_id: ItemId("vanished".into()),
                actor_id: UserId("actor-1".into()),
            },
            users,
            items,
            domains,
        );

        let mut tags = BTreeSet::new();
        tags.insert("title".to_string());
        let err = resolver
            .variables_for(&tags, &recipient("u1", "User One"))
            .await
            .unwrap_err();
        assert!(matches!(err, CourierError::TargetItemMissing { .. }));
    }
}
