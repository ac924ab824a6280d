//! Notifeed HTTP API.
//!
//! Endpoints:
//! - GET  /health
//! - GET  /api/v1/environments/{env}/notifications: filtered activity feed
//! - GET  /api/v1/organizations/{org}/environments/{env}/notifications/{id}: one feed item
//! - GET  /api/v1/environments/{env}/notifications/graph/stats: daily activity
//! - GET  /api/v1/environments/{env}/notifications/stats: weekly/monthly/yearly counts
//! - GET  /api/v1/environments/{env}/subscribers/{subscriber_id}/notifications
//! - /api/v1/widgets/{env}/subscribers/{sub}/...: subscriber message feed and acknowledgements

pub mod routes;
pub mod state;
