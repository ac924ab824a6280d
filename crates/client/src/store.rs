//! Feed store: paginated, cached message lists for a UI.
//!
//! Each store id is an independent view over the subscriber's messages with
//! its own query, page cursor and has-more flag. Remote calls are awaited
//! without holding the state lock, and local state is only changed once the
//! remote side has answered successfully.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use uuid::Uuid;

use notifeed_common::types::{ButtonType, FeedQuery, Message, MessageActionStatus};

use crate::api::NotificationsApi;
use crate::debounce::Debouncer;
use crate::error::FeedError;
use crate::state::{FeedState, StoreStatus};

/// Store id used when the caller registers none.
pub const DEFAULT_STORE_ID: &str = "default_store";

/// Tuning for a [`FeedStore`].
#[derive(Debug, Clone)]
pub struct FeedStoreConfig {
    /// Page size the server uses. A shorter page ends the feed.
    pub page_size: usize,
    /// Quiet period before a refetch runs.
    pub refetch_debounce: Duration,
}

impl Default for FeedStoreConfig {
    fn default() -> Self {
        Self {
            page_size: 10,
            refetch_debounce: Duration::from_millis(250),
        }
    }
}

/// A named feed view and the query it fetches with.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub id: String,
    pub query: FeedQuery,
}

impl StoreConfig {
    pub fn new(id: impl Into<String>, query: FeedQuery) -> Self {
        Self {
            id: id.into(),
            query,
        }
    }
}

struct Inner<A> {
    api: A,
    config: FeedStoreConfig,
    state: Mutex<FeedState>,
    refetches: Debouncer,
}

/// Client-side notification feed. Clones share the same state.
pub struct FeedStore<A> {
    inner: Arc<Inner<A>>,
}

impl<A> Clone for FeedStore<A> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<A: NotificationsApi> FeedStore<A> {
    /// A feed with the single store [`DEFAULT_STORE_ID`] and no query.
    pub fn new(api: A) -> Self {
        Self::with_stores(
            api,
            FeedStoreConfig::default(),
            vec![StoreConfig::new(DEFAULT_STORE_ID, FeedQuery::default())],
        )
    }

    pub fn with_stores(api: A, config: FeedStoreConfig, stores: Vec<StoreConfig>) -> Self {
        let mut state = FeedState::default();
        for store in stores {
            state.register(&store.id, store.query);
        }

        Self {
            inner: Arc::new(Inner {
                api,
                config,
                state: Mutex::new(state),
                refetches: Debouncer::new(),
            }),
        }
    }

    /// Fetch page `page` for `store_id`. Appends to the store's messages, or
    /// replaces them when `is_refetch` is set. A page that lands after a later
    /// refetch has started is discarded.
    pub async fn fetch_page(
        &self,
        page: u32,
        is_refetch: bool,
        store_id: &str,
    ) -> Result<(), FeedError> {
        let (ticket, query) = {
            let mut state = self.inner.state.lock().await;
            let store = state.entry(store_id);
            (store.begin_fetch(is_refetch), store.query.clone())
        };

        let result = self.inner.api.get_notifications_list(page, &query).await;

        let mut state = self.inner.state.lock().await;
        let store = state.entry(store_id);
        match result {
            Ok(messages) => {
                let received = messages.len();
                if store.apply_page(ticket, page, messages, is_refetch, self.inner.config.page_size) {
                    tracing::debug!(store_id, page, is_refetch, received, "Feed page fetched");
                } else {
                    tracing::debug!(store_id, page, received, "Dropped page superseded by a refetch");
                }
                Ok(())
            }
            Err(e) => {
                store.fail_fetch();
                Err(e)
            }
        }
    }

    /// Fetch the page after the current one. Returns `false` without a
    /// remote call when the store has no more pages.
    pub async fn fetch_next_page(&self, store_id: &str) -> Result<bool, FeedError> {
        let next = {
            let mut state = self.inner.state.lock().await;
            let store = state.entry(store_id);
            if !store.has_more {
                return Ok(false);
            }
            store.page + 1
        };

        self.fetch_page(next, false, store_id).await?;
        Ok(true)
    }

    /// Replace the store's messages with a fresh first page after the
    /// debounce period. Calling again before it fires restarts the wait.
    ///
    /// Must be called from within a tokio runtime.
    pub fn refetch(&self, store_id: &str) {
        let store = self.clone();
        let id = store_id.to_string();
        self.inner
            .refetches
            .schedule(store_id, self.inner.config.refetch_debounce, async move {
                if let Err(e) = store.fetch_page(0, true, &id).await {
                    tracing::warn!(store_id = %id, error = %e, "Feed refetch failed");
                }
            });
    }

    /// Whether a refetch for `store_id` is waiting out its debounce period.
    pub fn refetch_pending(&self, store_id: &str) -> bool {
        self.inner.refetches.is_pending(store_id)
    }

    /// Mark a message as read, then flag it read and seen in every store.
    pub async fn mark_as_read(&self, message_id: Uuid) -> Result<Message, FeedError> {
        let message = self.inner.api.mark_message_as_read(message_id).await?;

        let mut state = self.inner.state.lock().await;
        state.patch_message(message_id, |m| {
            m.read = Some(true);
            m.seen = true;
        });

        Ok(message)
    }

    /// Record a call-to-action press, then mark the action done in every store.
    pub async fn update_action(
        &self,
        message_id: Uuid,
        button_type: ButtonType,
        status: MessageActionStatus,
        payload: serde_json::Value,
    ) -> Result<Message, FeedError> {
        let message = self
            .inner
            .api
            .update_action(message_id, button_type, status, payload)
            .await?;

        let mut state = self.inner.state.lock().await;
        let patched = state.patch_message(message_id, |m| {
            if let Some(cta) = m.cta.as_mut() {
                cta.action.status = MessageActionStatus::Done;
            }
        });
        tracing::debug!(message_id = %message_id, patched, "Message action marked done");

        Ok(message)
    }

    /// Mark messages as seen and return the ids sent to the server.
    ///
    /// With `messages_to_mark` only those ids are marked. Without, every unseen
    /// message in `store_id` is marked; `read_exist` further limits that to
    /// messages carrying a read flag. Nothing to mark means no remote call.
    pub async fn mark_notifications_as_seen(
        &self,
        read_exist: bool,
        messages_to_mark: Option<&[Uuid]>,
        store_id: &str,
    ) -> Result<Vec<Uuid>, FeedError> {
        let ids = match messages_to_mark {
            Some(ids) => ids.to_vec(),
            None => {
                let state = self.inner.state.lock().await;
                state
                    .get(store_id)
                    .ok_or_else(|| FeedError::UnknownStore(store_id.to_string()))?
                    .unseen_ids(read_exist)
            }
        };

        if ids.is_empty() {
            return Ok(ids);
        }

        self.inner.api.mark_message_as_seen(&ids).await?;

        let mut state = self.inner.state.lock().await;
        for id in &ids {
            state.patch_message(*id, |m| m.seen = true);
        }
        tracing::debug!(store_id, marked = ids.len(), "Messages marked as seen");

        Ok(ids)
    }

    /// Snapshot of the store's messages, empty for an unknown store.
    pub async fn messages(&self, store_id: &str) -> Vec<Message> {
        let state = self.inner.state.lock().await;
        state
            .get(store_id)
            .map(|s| s.messages.clone())
            .unwrap_or_default()
    }

    /// Has-more flag; an unknown store reports `true`.
    pub async fn has_more(&self, store_id: &str) -> bool {
        let state = self.inner.state.lock().await;
        state.get(store_id).is_none_or(|s| s.has_more)
    }

    /// Current page cursor; an unknown store reports `0`.
    pub async fn page(&self, store_id: &str) -> u32 {
        let state = self.inner.state.lock().await;
        state.get(store_id).map_or(0, |s| s.page)
    }

    pub async fn status(&self, store_id: &str) -> StoreStatus {
        let state = self.inner.state.lock().await;
        state
            .get(store_id)
            .map_or(StoreStatus::Empty, |s| s.status())
    }
}
