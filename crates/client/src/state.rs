//! Per-store feed state and its transitions.
//!
//! Page cursor and has-more only move in [`StoreState::apply_page`], which the
//! store calls after a fetch succeeded. Every fetch is bracketed by
//! [`StoreState::begin_fetch`] and either `apply_page` or `fail_fetch`.

use std::collections::HashMap;

use uuid::Uuid;

use notifeed_common::types::{FeedQuery, Message};

/// Where a store is in its fetch lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreStatus {
    /// No page has been fetched yet.
    Empty,
    /// At least one fetch is in flight.
    Loading,
    /// At least one page fetched and more may follow.
    Loaded,
    /// The last fetch returned a short page.
    Exhausted,
}

/// Feed state of one store id.
#[derive(Debug, Clone)]
pub struct StoreState {
    pub query: FeedQuery,
    pub messages: Vec<Message>,
    pub page: u32,
    pub has_more: bool,
    in_flight: u32,
    /// Bumped by every refetch; pages requested under an older value are stale.
    generation: u64,
    fetched: bool,
}

impl StoreState {
    pub fn new(query: FeedQuery) -> Self {
        Self {
            query,
            messages: Vec::new(),
            page: 0,
            has_more: true,
            in_flight: 0,
            generation: 0,
            fetched: false,
        }
    }

    pub fn status(&self) -> StoreStatus {
        if self.in_flight > 0 {
            StoreStatus::Loading
        } else if !self.fetched {
            StoreStatus::Empty
        } else if self.has_more {
            StoreStatus::Loaded
        } else {
            StoreStatus::Exhausted
        }
    }

    /// Start a fetch and return the ticket to hand back to [`Self::apply_page`].
    /// A refetch invalidates every fetch started before it.
    pub fn begin_fetch(&mut self, is_refetch: bool) -> u64 {
        if is_refetch {
            self.generation += 1;
        }
        self.in_flight += 1;
        self.generation
    }

    pub fn fail_fetch(&mut self) {
        self.in_flight = self.in_flight.saturating_sub(1);
    }

    /// Record a fetched page: append it, or replace everything on a refetch.
    ///
    /// Returns `false` and leaves the list untouched when a refetch began
    /// after `ticket` was issued.
    pub fn apply_page(
        &mut self,
        ticket: u64,
        page: u32,
        messages: Vec<Message>,
        is_refetch: bool,
        page_size: usize,
    ) -> bool {
        self.in_flight = self.in_flight.saturating_sub(1);
        if ticket != self.generation {
            return false;
        }

        self.has_more = messages.len() >= page_size;
        self.page = page;
        if is_refetch {
            self.messages = messages;
        } else {
            self.messages.extend(messages);
        }
        self.fetched = true;
        true
    }

    /// Ids of unseen messages. With `read_exist`, only those carrying a read flag.
    pub fn unseen_ids(&self, read_exist: bool) -> Vec<Uuid> {
        self.messages
            .iter()
            .filter(|m| !m.seen && (!read_exist || m.read.is_some()))
            .map(|m| m.id)
            .collect()
    }
}

/// All stores of one feed, keyed by store id.
#[derive(Debug, Default)]
pub struct FeedState {
    stores: HashMap<String, StoreState>,
}

impl FeedState {
    pub fn register(&mut self, store_id: &str, query: FeedQuery) {
        self.stores
            .insert(store_id.to_string(), StoreState::new(query));
    }

    pub fn get(&self, store_id: &str) -> Option<&StoreState> {
        self.stores.get(store_id)
    }

    /// The store for `store_id`, created with an empty query on first use.
    pub fn entry(&mut self, store_id: &str) -> &mut StoreState {
        self.stores
            .entry(store_id.to_string())
            .or_insert_with(|| StoreState::new(FeedQuery::default()))
    }

    /// Apply `patch` to message `id` in every store holding it. Returns how many copies changed.
    pub fn patch_message(&mut self, id: Uuid, mut patch: impl FnMut(&mut Message)) -> usize {
        let mut patched = 0;
        for store in self.stores.values_mut() {
            for message in store.messages.iter_mut().filter(|m| m.id == id) {
                patch(message);
                patched += 1;
            }
        }
        patched
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use notifeed_common::types::ChannelType;

    fn message(seen: bool, read: Option<bool>) -> Message {
        Message {
            id: Uuid::new_v4(),
            seen,
            read,
            content: String::new(),
            channel: ChannelType::InApp,
            feed_identifier: None,
            payload: serde_json::Value::Null,
            cta: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_new_store_defaults() {
        let store = StoreState::new(FeedQuery::default());
        assert_eq!(store.page, 0);
        assert!(store.has_more);
        assert_eq!(store.status(), StoreStatus::Empty);
    }

    #[test]
    fn test_status_transitions() {
        let mut store = StoreState::new(FeedQuery::default());
        let ticket = store.begin_fetch(false);
        assert_eq!(store.status(), StoreStatus::Loading);

        store.apply_page(ticket, 0, (0..10).map(|_| message(false, None)).collect(), false, 10);
        assert_eq!(store.status(), StoreStatus::Loaded);

        store.begin_fetch(false);
        store.fail_fetch();
        assert_eq!(store.status(), StoreStatus::Loaded);
        assert_eq!(store.page, 0);

        let ticket = store.begin_fetch(false);
        store.apply_page(ticket, 1, vec![message(false, None)], false, 10);
        assert_eq!(store.status(), StoreStatus::Exhausted);
        assert_eq!(store.page, 1);
        assert_eq!(store.messages.len(), 11);
    }

    #[test]
    fn test_refetch_replaces_messages() {
        let mut store = StoreState::new(FeedQuery::default());
        store.apply_page(0, 0, vec![message(false, None), message(true, None)], false, 10);
        let fresh = message(false, None);
        let ticket = store.begin_fetch(true);
        assert!(store.apply_page(ticket, 0, vec![fresh.clone()], true, 10));
        assert_eq!(store.messages, vec![fresh]);
    }

    #[test]
    fn test_overlapping_fetches() {
        let mut store = StoreState::new(FeedQuery::default());
        let first = store.begin_fetch(false);
        store.apply_page(first, 0, (0..10).map(|_| message(false, None)).collect(), false, 10);

        // Next page requested, then a refetch starts before it lands
        let next = store.begin_fetch(false);
        let refetch = store.begin_fetch(true);

        let fresh: Vec<Message> = (0..10).map(|_| message(false, None)).collect();
        assert!(store.apply_page(refetch, 0, fresh.clone(), true, 10));
        assert_eq!(store.status(), StoreStatus::Loading);

        assert!(!store.apply_page(next, 1, vec![message(false, None)], false, 10));
        assert_eq!(store.status(), StoreStatus::Loaded);
        assert_eq!(store.messages, fresh);
        assert_eq!(store.page, 0);
        assert!(store.has_more);
    }

    #[test]
    fn test_unseen_ids_respects_read_exist() {
        let mut store = StoreState::new(FeedQuery::default());
        let unseen_no_read = message(false, None);
        let unseen_with_read = message(false, Some(false));
        let seen = message(true, Some(true));
        store.apply_page(
            0,
            0,
            vec![unseen_no_read.clone(), unseen_with_read.clone(), seen],
            false,
            10,
        );

        assert_eq!(
            store.unseen_ids(false),
            vec![unseen_no_read.id, unseen_with_read.id]
        );
        assert_eq!(store.unseen_ids(true), vec![unseen_with_read.id]);
    }

    #[test]
    fn test_patch_message_hits_every_store() {
        let shared = message(false, None);
        let other = message(false, None);

        let mut state = FeedState::default();
        state
            .entry("a")
            .apply_page(0, 0, vec![shared.clone(), other.clone()], false, 10);
        state.entry("b").apply_page(0, 0, vec![shared.clone()], false, 10);

        let patched = state.patch_message(shared.id, |m| m.seen = true);
        assert_eq!(patched, 2);
        assert!(state.get("a").unwrap().messages[0].seen);
        assert!(!state.get("a").unwrap().messages[1].seen);
        assert!(state.get("b").unwrap().messages[0].seen);
    }
}
