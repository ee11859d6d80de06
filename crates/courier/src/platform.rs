// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP clients for the platform collaborator services.
//!
//! One client implements all four directory traits against the platform's
//! REST API. A missing item surfaces as the typed target-item-missing error
//! so the scheduled sweep can discard instead of retry.

use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use courier_core::error::CourierError;
use courier_core::traits::directory::{
    AccountDirectory, DomainLookup, ItemDirectory, UserDirectory,
};
use courier_core::types::{AccountId, ItemId, Recipient, UserId};

/// REST client for the platform account/user/item/domain services.
pub struct PlatformClient {
    http: reqwest::Client,
    base_url: String,
    api_token: Option<String>,
}

impl PlatformClient {
    pub fn new(base_url: &str, api_token: Option<String>) -> Result<Self, CourierError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| CourierError::channel("platform client setup failed", e))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_token,
        })
    }

    async fn fetch(&self, path: &str) -> Result<reqwest::Response, CourierError> {
        let mut request = self.http.get(format!("{}{path}", self.base_url));
        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token);
        }
        request
            .send()
            .await
            .map_err(|e| CourierError::channel(format!("platform request {path} failed"), e))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, CourierError> {
        let response = self
            .fetch(path)
            .await?
            .error_for_status()
            .map_err(|e| CourierError::channel(format!("platform request {path} rejected"), e))?;
        response
            .json::<T>()
            .await
            .map_err(|e| CourierError::channel(format!("platform response {path} undecodable"), e))
    }

    /// Like [`get_json`], but a 404 maps to `Ok(None)`.
    async fn get_json_opt<T: DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<Option<T>, CourierError> {
        let response = self.fetch(path).await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = response
            .error_for_status()
            .map_err(|e| CourierError::channel(format!("platform request {path} rejected"), e))?;
        response
            .json::<T>()
            .await
            .map(Some)
            .map_err(|e| CourierError::channel(format!("platform response {path} undecodable"), e))
    }
}

#[derive(Debug, Deserialize)]
struct ItemInfo {
    title: String,
    #[serde(default)]
    ancestors: Vec<ItemId>,
}

#[derive(Debug, Deserialize)]
struct DomainInfo {
    domain: String,
}

#[async_trait]
impl AccountDirectory for PlatformClient {
    async fn member_ids(&self, account: &AccountId) -> Result<Vec<UserId>, CourierError> {
        self.get_json(&format!("/accounts/{account}/members")).await
    }

    async fn group_ids(&self, account: &AccountId) -> Result<Vec<String>, CourierError> {
        self.get_json(&format!("/accounts/{account}/groups")).await
    }

    async fn group_member_ids(
        &self,
        account: &AccountId,
        group_id: &str,
    ) -> Result<Vec<UserId>, CourierError> {
        self.get_json(&format!("/accounts/{account}/groups/{group_id}/members"))
            .await
    }

    async fn is_admin(&self, account: &AccountId, user: &UserId) -> Result<bool, CourierError> {
        self.get_json(&format!("/accounts/{account}/members/{user}/admin"))
            .await
    }
}

#[async_trait]
impl UserDirectory for PlatformClient {
    async fn get_by_ids(&self, ids: &[UserId]) -> Result<Vec<Recipient>, CourierError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut request = self
            .http
            .post(format!("{}/users/lookup", self.base_url))
            .json(&ids);
        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token);
        }
        let response = request
            .send()
            .await
            .map_err(|e| CourierError::channel("platform user lookup failed", e))?
            .error_for_status()
            .map_err(|e| CourierError::channel("platform user lookup rejected", e))?;
        response
            .json()
            .await
            .map_err(|e| CourierError::channel("platform user lookup undecodable", e))
    }

    async fn display_name(&self, id: &UserId) -> Result<String, CourierError> {
        let recipient: Recipient = self.get_json(&format!("/users/{id}")).await?;
        Ok(recipient.display_name)
    }
}

#[async_trait]
impl ItemDirectory for PlatformClient {
    async fn exists(&self, account: &AccountId, item: &ItemId) -> Result<bool, CourierError> {
        let info: Option<ItemInfo> = self
            .get_json_opt(&format!("/accounts/{account}/items/{item}"))
            .await?;
        Ok(info.is_some())
    }

    async fn ancestor_chain(
        &self,
        account: &AccountId,
        item: &ItemId,
    ) -> Result<Vec<ItemId>, CourierError> {
        let info: ItemInfo = self
            .get_json_opt(&format!("/accounts/{account}/items/{item}"))
            .await?
            .ok_or_else(|| CourierError::TargetItemMissing {
                item_id: item.0.clone(),
            })?;
        let mut chain = vec![item.clone()];
        chain.extend(info.ancestors);
        Ok(chain)
    }

    async fn title(&self, account: &AccountId, item: &ItemId) -> Result<String, CourierError> {
        let info: ItemInfo = self
            .get_json_opt(&format!("/accounts/{account}/items/{item}"))
            .await?
            .ok_or_else(|| CourierError::TargetItemMissing {
                item_id: item.0.clone(),
            })?;
        Ok(info.title)
    }
}

#[async_trait]
impl DomainLookup for PlatformClient {
    async fn public_domain(&self, account: &AccountId) -> Result<String, CourierError> {
        let info: DomainInfo = self.get_json(&format!("/accounts/{account}/domain")).await?;
        Ok(info.domain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_is_normalized() {
        let client = PlatformClient::new("https://platform.internal/", None).unwrap();
        assert_eq!(client.base_url, "https://platform.internal");
    }

    #[test]
    fn item_info_tolerates_missing_ancestors() {
        let info: ItemInfo = serde_json::from_str(r#"{"title": "Post"}"#).unwrap();
        assert_eq!(info.title, "Post");
        assert!(info.ancestors.is_empty());
    }
}
