//! Client-side notification feed.
//!
//! [`store::FeedStore`] keeps independently paginated message lists keyed by
//! store id, and patches them after the remote side acknowledges a read, seen
//! or action change. The remote side is any [`api::NotificationsApi`];
//! [`api::HttpNotificationsApi`] talks to the Notifeed widget routes.

pub mod api;
pub mod debounce;
pub mod error;
pub mod state;
pub mod store;
