//! Paginated, searchable list state.
//!
//! [`ListStateMachine`] owns everything fetched so far and publishes a single
//! stream of immutable [`ListState`] values:
//!
//! ```text
//!  Idle ──fetch_next──► InitialLoading ──ok──► Loaded ──fetch_next──► LoadingMore
//!                            │                   ▲  ▲                     │
//!                            └──err──► Error ────┘  └─────────ok──────────┘
//!                                        (reload / search / fetch_next)
//! ```
//!
//! ## Concurrency
//!
//! All bookkeeping sits behind one [`std::sync::Mutex`] that is never held
//! across the page fetch.  States are published while the lock is held, so
//! every subscriber sees them in the same order they were produced.  At most
//! one page request is outstanding per machine; overlapping calls return
//! without doing anything.

mod snapshot;

pub use snapshot::{ListState, Snapshot, SnapshotEntry};

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{debug, info, warn};
use tokio::sync::watch;

use crate::error::FeedError;
use crate::source::{validate_page, NewsItem, PageFetcher};

/// Page numbering used by the upstream API.
pub const FIRST_PAGE: u32 = 1;

/// Tunables for a [`ListStateMachine`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListOptions {
    pub page_size: u32,
    /// Whether `reload()` also drops the active search filter.
    pub clear_filter_on_reload: bool,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            page_size: 15,
            clear_filter_on_reload: false,
        }
    }
}

#[derive(Debug)]
struct Inner {
    items: Vec<NewsItem>,
    next_page: u32,
    has_more: bool,
    in_flight: bool,
    filter: String,
}

impl Inner {
    fn new() -> Self {
        Self {
            items: Vec::new(),
            next_page: FIRST_PAGE,
            has_more: true,
            in_flight: false,
            filter: String::new(),
        }
    }
}

/// Owns the accumulated items and page cursor of one remote list.
pub struct ListStateMachine {
    fetcher: Arc<dyn PageFetcher>,
    options: ListOptions,
    inner: Mutex<Inner>,
    state_tx: watch::Sender<ListState>,
}

impl std::fmt::Debug for ListStateMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListStateMachine")
            .field("fetcher", &self.fetcher.name())
            .field("options", &self.options)
            .field("state", &*self.state_tx.borrow())
            .finish_non_exhaustive()
    }
}

impl ListStateMachine {
    pub fn new(fetcher: Arc<dyn PageFetcher>, options: ListOptions) -> Self {
        let (state_tx, _) = watch::channel(ListState::Idle);
        Self {
            fetcher,
            options,
            inner: Mutex::new(Inner::new()),
            state_tx,
        }
    }

    /// Subscribe to state changes.  The receiver starts at the current state.
    pub fn subscribe(&self) -> watch::Receiver<ListState> {
        self.state_tx.subscribe()
    }

    /// The most recently published state.
    pub fn state(&self) -> ListState {
        self.state_tx.borrow().clone()
    }

    pub fn has_more(&self) -> bool {
        self.lock().has_more
    }

    pub fn is_fetching(&self) -> bool {
        self.lock().in_flight
    }

    pub fn item_count(&self) -> usize {
        self.lock().items.len()
    }

    pub fn filter(&self) -> String {
        self.lock().filter.clone()
    }

    /// Look up an accumulated item, e.g. to hand it to a
    /// [`DetailRouter`](crate::router::DetailRouter).
    pub fn item(&self, id: i64) -> Option<NewsItem> {
        self.lock().items.iter().find(|item| item.id == id).cloned()
    }

    /// Fetch the next page if one may exist.
    ///
    /// Returns without doing anything while a fetch is outstanding, after an
    /// empty page has been seen, or while a search filter is active.
    pub async fn fetch_next(&self) {
        let page = {
            let mut inner = self.lock();
            if inner.in_flight {
                debug!("fetch_next: request already in flight");
                return;
            }
            if !inner.has_more {
                debug!("fetch_next: no more pages");
                return;
            }
            if !inner.filter.is_empty() {
                debug!("fetch_next: suppressed while filtering");
                return;
            }
            self.begin_fetch(&mut inner)
        };
        self.run_fetch(page).await;
    }

    /// Update the title filter and republish synchronously.
    ///
    /// An empty query clears the filter.  Never touches the network.
    pub fn search(&self, query: &str) {
        let mut inner = self.lock();
        inner.filter = query.to_string();
        let state = match Snapshot::filtered(&inner.items, &inner.filter) {
            Ok(snapshot) => ListState::Loaded(snapshot),
            Err(e) => {
                warn!("search {query:?}: {e}");
                ListState::Error(e.to_string())
            }
        };
        self.state_tx.send_replace(state);
    }

    /// Drop everything and fetch the first page again.
    ///
    /// Ignored while a fetch is outstanding.
    pub async fn reload(&self) {
        let page = {
            let mut inner = self.lock();
            if inner.in_flight {
                debug!("reload: request already in flight");
                return;
            }
            info!("reloading {}", self.fetcher.name());
            inner.items.clear();
            inner.next_page = FIRST_PAGE;
            inner.has_more = true;
            if self.options.clear_filter_on_reload {
                inner.filter.clear();
            }
            self.begin_fetch(&mut inner)
        };
        self.run_fetch(page).await;
    }

    /// Mark a fetch as outstanding and publish the matching loading state.
    fn begin_fetch(&self, inner: &mut Inner) -> u32 {
        inner.in_flight = true;
        let state = if inner.items.is_empty() {
            ListState::InitialLoading
        } else {
            ListState::LoadingMore
        };
        self.state_tx.send_replace(state);
        inner.next_page
    }

    async fn run_fetch(&self, page: u32) {
        let mut pending = PendingFetch {
            machine: self,
            page,
            armed: true,
        };
        let result = self.fetcher.fetch_page(page, self.options.page_size).await;
        pending.armed = false;

        let mut inner = self.lock();
        inner.in_flight = false;

        let records = match result {
            Ok(records) => records,
            Err(e) => {
                warn!("{}: page {page} failed: {e}", self.fetcher.name());
                self.state_tx.send_replace(ListState::Error(e.to_string()));
                return;
            }
        };

        let fetched = records.len();
        let page_items = validate_page(records);
        debug!(
            "page {page}: {fetched} records, {} valid",
            page_items.len()
        );

        // Build against the candidate set first so a duplicate id leaves the
        // accumulated items and cursor untouched.
        let mut candidate = inner.items.clone();
        candidate.extend(page_items);
        match Snapshot::filtered(&candidate, &inner.filter) {
            Ok(snapshot) => {
                inner.items = candidate;
                inner.next_page = page + 1;
                inner.has_more = fetched > 0;
                if !inner.has_more {
                    info!("{}: end of feed at page {page}", self.fetcher.name());
                }
                self.state_tx.send_replace(ListState::Loaded(snapshot));
            }
            Err(e) => {
                warn!("{}: page {page} rejected: {e}", self.fetcher.name());
                self.state_tx.send_replace(ListState::Error(e.to_string()));
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Clears the in-flight flag if a `fetch_next`/`reload` future is dropped
/// before its page arrives.  Items and cursor are left as they were.
struct PendingFetch<'a> {
    machine: &'a ListStateMachine,
    page: u32,
    armed: bool,
}

impl Drop for PendingFetch<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut inner = self.machine.lock();
        inner.in_flight = false;
        debug!("page {} abandoned before it arrived", self.page);
        self.machine
            .state_tx
            .send_replace(ListState::Error(FeedError::Cancelled.to_string()));
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
