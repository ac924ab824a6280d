use thiserror::Error;

/// Errors surfaced by the feed client.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Unknown store: {0}")]
    UnknownStore(String),
}
