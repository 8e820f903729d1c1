//! livescroll-news: paging, searching and thumbnail loading for a remote
//! news feed.
//!
//! ## Architecture overview
//!
//! ```text
//!                 fetch_next / search / reload
//!  consumer ───────────────────────────────────► ListStateMachine ──► PageFetcher
//!     ▲                                                │
//!     │           watch::Receiver<ListState>           │
//!     └────────────────────────────────────────────────┘
//!     │
//!     │  load(url, token) / cancel(url, token)
//!     └──────────────────────────────────────► ImageCache ──► ByteSource
//! ```
//!
//! * **`source`**: the [`PageFetcher`] and [`ByteSource`] traits, the wire
//!   record, item validation, and HTTP implementations.
//! * **`list`**: [`ListStateMachine`]: accumulated items, page cursor,
//!   filter, and the published [`ListState`].
//! * **`images`**: [`ImageCache`]: single-flight LRU thumbnail cache with
//!   per-caller cancellation.
//! * **`router`**: hand-off of a selected item to a detail viewer.
//! * **`config`**: TOML configuration with CLI overrides.
//! * **`error`**: the [`FeedError`] taxonomy.

pub mod config;
pub mod error;
pub mod images;
pub mod list;
pub mod router;
pub mod source;

pub use error::{FeedError, Result};
pub use images::{CancelToken, ImageCache, Thumbnail};
pub use list::{ListOptions, ListState, ListStateMachine, Snapshot, SnapshotEntry};
pub use router::{BrowserRouter, DetailRouter};
pub use source::{ByteSource, NewsItem, PageFetcher, RawRecord};
