//! Error taxonomy shared by the list state machine and the image cache.
//!
//! Errors are [`Clone`] because a single in-flight image fetch fans its
//! outcome out to every caller attached to it.

use thiserror::Error;

/// Every failure the library can surface.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeedError {
    /// The network or byte source failed.
    #[error("transport error: {0}")]
    Transport(String),

    /// A wire payload (JSON page or image bytes) could not be interpreted.
    #[error("decode error: {0}")]
    Decode(String),

    /// A raw record is missing a required field.
    ///
    /// Never surfaced to observers: the record is dropped and the page
    /// carries on with the remaining records.
    #[error("record {id}: missing or malformed `{field}`")]
    Validation { id: i64, field: &'static str },

    /// A snapshot would have contained the same item id twice.
    #[error("duplicate item id {0} in snapshot")]
    DuplicateId(i64),

    /// The caller gave up on the request before it completed.
    #[error("request cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, FeedError>;

impl From<reqwest::Error> for FeedError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            FeedError::Decode(err.to_string())
        } else {
            FeedError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for FeedError {
    fn from(err: serde_json::Error) -> Self {
        FeedError::Decode(err.to_string())
    }
}

impl From<image::ImageError> for FeedError {
    fn from(err: image::ImageError) -> Self {
        FeedError::Decode(err.to_string())
    }
}
