//! Remote data source abstractions.
//!
//! This module defines the two collaborator traits the core depends on:
//!
//! * [`PageFetcher`]: returns one page of [`RawRecord`]s for the list state
//!   machine.
//! * [`ByteSource`]: returns the raw bytes behind an image locator for the
//!   image cache.
//!
//! Concrete HTTP implementations live in [`http`].  Tests supply their own
//! in-memory implementations.
//!
//! ## For contributors: adding a new source
//!
//! 1. Create a new file in this directory (e.g. `fixture.rs`).
//! 2. Implement [`PageFetcher`] (and/or [`ByteSource`]) for your struct.
//! 3. Add `mod fixture;` below and re-export your struct.
//! 4. Construct it in `main.rs` in place of [`HttpNewsSource`].
//!
//! The state machine, image cache, and UI never look past these traits.

mod http;
mod news_item;

pub use http::{decode_page, HttpByteSource, HttpNewsSource};
pub use news_item::{parse_published, validate_page, NewsItem, RawRecord};

#[cfg(test)]
pub(crate) use news_item::tests::make_raw;

use async_trait::async_trait;

use crate::error::Result;

/// A paginated remote list.
///
/// Called from async tasks that may hop between runtime threads, so
/// implementations must be [`Send`] + [`Sync`].
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Human-readable label used in log lines.
    fn name(&self) -> &str;

    /// Fetch page `page` (1-based) holding up to `page_size` records.
    ///
    /// An empty page means the end of the data.  Errors are
    /// [`FeedError::Transport`](crate::FeedError::Transport) or
    /// [`FeedError::Decode`](crate::FeedError::Decode).
    async fn fetch_page(&self, page: u32, page_size: u32) -> Result<Vec<RawRecord>>;
}

/// Raw bytes behind an opaque resource locator.
#[async_trait]
pub trait ByteSource: Send + Sync {
    /// Fetch the bytes for `locator`.  Fails with
    /// [`FeedError::Transport`](crate::FeedError::Transport).
    async fn fetch_bytes(&self, locator: &str) -> Result<Vec<u8>>;
}
