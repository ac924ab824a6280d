//! Remote boundary of the feed store.

use std::future::Future;

use reqwest::Response;
use serde::de::DeserializeOwned;
use serde_json::json;
use uuid::Uuid;

use notifeed_common::types::{ButtonType, FeedQuery, Message, MessageActionStatus, MessageFeedPage};

use crate::error::FeedError;

/// Request/response operations the feed store needs from the server.
pub trait NotificationsApi: Send + Sync + 'static {
    /// One page of the subscriber's messages matching `query`.
    fn get_notifications_list(
        &self,
        page: u32,
        query: &FeedQuery,
    ) -> impl Future<Output = Result<Vec<Message>, FeedError>> + Send;

    fn mark_message_as_read(
        &self,
        message_id: Uuid,
    ) -> impl Future<Output = Result<Message, FeedError>> + Send;

    fn update_action(
        &self,
        message_id: Uuid,
        button_type: ButtonType,
        status: MessageActionStatus,
        payload: serde_json::Value,
    ) -> impl Future<Output = Result<Message, FeedError>> + Send;

    fn mark_message_as_seen(
        &self,
        message_ids: &[Uuid],
    ) -> impl Future<Output = Result<Vec<Message>, FeedError>> + Send;
}

/// `NotificationsApi` over the Notifeed widget HTTP routes.
#[derive(Debug, Clone)]
pub struct HttpNotificationsApi {
    client: reqwest::Client,
    base_url: String,
}

impl HttpNotificationsApi {
    /// `base_url` is the server root, e.g. `http://localhost:3000`.
    pub fn new(base_url: &str, environment_id: Uuid, subscriber_id: Uuid) -> Self {
        Self::with_client(reqwest::Client::new(), base_url, environment_id, subscriber_id)
    }

    pub fn with_client(
        client: reqwest::Client,
        base_url: &str,
        environment_id: Uuid,
        subscriber_id: Uuid,
    ) -> Self {
        Self {
            client,
            base_url: format!(
                "{}/api/v1/widgets/{}/subscribers/{}",
                base_url.trim_end_matches('/'),
                environment_id,
                subscriber_id
            ),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Decode a success body, or turn an error status into `FeedError::Status`.
    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, FeedError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json::<T>().await?);
        }

        let message = response
            .json::<serde_json::Value>()
            .await
            .ok()
            .and_then(|body| body.get("error").and_then(|e| e.as_str()).map(String::from))
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown error").to_string());

        Err(FeedError::Status {
            status: status.as_u16(),
            message,
        })
    }
}

impl NotificationsApi for HttpNotificationsApi {
    async fn get_notifications_list(
        &self,
        page: u32,
        query: &FeedQuery,
    ) -> Result<Vec<Message>, FeedError> {
        let response = self
            .client
            .get(self.url("/notifications/feed"))
            .query(&[("page", page)])
            .query(query)
            .send()
            .await?;

        let page: MessageFeedPage = Self::decode(response).await?;
        Ok(page.data)
    }

    async fn mark_message_as_read(&self, message_id: Uuid) -> Result<Message, FeedError> {
        let response = self
            .client
            .post(self.url(&format!("/messages/{}/read", message_id)))
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn update_action(
        &self,
        message_id: Uuid,
        button_type: ButtonType,
        status: MessageActionStatus,
        payload: serde_json::Value,
    ) -> Result<Message, FeedError> {
        let response = self
            .client
            .post(self.url(&format!("/messages/{}/actions/{}", message_id, button_type)))
            .json(&json!({ "status": status, "payload": payload }))
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn mark_message_as_seen(&self, message_ids: &[Uuid]) -> Result<Vec<Message>, FeedError> {
        let response = self
            .client
            .post(self.url("/messages/seen"))
            .json(&json!({ "message_ids": message_ids }))
            .send()
            .await?;
        Self::decode(response).await
    }
}
