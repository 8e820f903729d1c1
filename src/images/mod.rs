//! Single-flight, size-bounded thumbnail cache.
//!
//! [`ImageCache`] maps an image locator to a decoded [`Thumbnail`].  Concurrent
//! requests for the same locator share one download; the decoded store keeps
//! at most `capacity` thumbnails and evicts the least recently used one.
//!
//! ## Locking
//!
//! The decoded store and the in-flight ledger live behind a single
//! [`std::sync::Mutex`].  The lock is taken only for bookkeeping and is never
//! held across the download, so different locators download in parallel.
//!
//! ## Cancellation
//!
//! Every request carries a caller-owned [`CancelToken`].  Cancelling it (or
//! dropping the pending `load` future) detaches that caller from the shared
//! download.  The download itself is aborted only when no callers remain.

mod thumbnail;
mod token;

pub use thumbnail::{Thumbnail, DEFAULT_MAX_PIXEL_SIZE};
pub use token::CancelToken;

#[cfg(test)]
pub(crate) use thumbnail::tests::png_bytes;

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{debug, warn};
use lru::LruCache;
use tokio::sync::watch;
use tokio::task::AbortHandle;

use crate::error::{FeedError, Result};
use crate::source::ByteSource;

/// Default number of thumbnails kept in memory.
pub const DEFAULT_CAPACITY: usize = 200;

/// Outcome slot of a download; `None` until it finishes.
type SharedResult = Option<Result<Arc<Thumbnail>>>;

/// One pending download and the callers waiting on it.
struct Flight {
    id: u64,
    /// Attached `load` calls per token id.  One token may back several.
    waiters: HashMap<u64, usize>,
    result: watch::Receiver<SharedResult>,
    task: AbortHandle,
}

struct CacheState {
    decoded: LruCache<String, Arc<Thumbnail>>,
    in_flight: HashMap<String, Flight>,
    next_flight: u64,
}

struct Shared {
    source: Arc<dyn ByteSource>,
    max_pixel_size: u32,
    state: Mutex<CacheState>,
}

/// Cheap to clone; clones share the same store and ledger.
#[derive(Clone)]
pub struct ImageCache {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for ImageCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.lock();
        f.debug_struct("ImageCache")
            .field("cached", &state.decoded.len())
            .field("capacity", &state.decoded.cap())
            .field("in_flight", &state.in_flight.len())
            .finish()
    }
}

impl ImageCache {
    /// Create a cache holding at most `capacity` thumbnails (at least one),
    /// each bounded to `max_pixel_size` on its longest side.
    pub fn new(source: Arc<dyn ByteSource>, capacity: usize, max_pixel_size: u32) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            shared: Arc::new(Shared {
                source,
                max_pixel_size,
                state: Mutex::new(CacheState {
                    decoded: LruCache::new(capacity),
                    in_flight: HashMap::new(),
                    next_flight: 0,
                }),
            }),
        }
    }

    /// Return the thumbnail for `key`, downloading it if necessary.
    ///
    /// A cached thumbnail is returned without suspending.  Otherwise the
    /// caller joins the download already running for `key`, or starts one.
    /// All callers of one download receive the same outcome.
    ///
    /// # Errors
    ///
    /// [`FeedError::Transport`] or [`FeedError::Decode`] from the download,
    /// or [`FeedError::Cancelled`] once `token` is cancelled.
    pub async fn load(&self, key: &str, token: &CancelToken) -> Result<Arc<Thumbnail>> {
        if token.is_cancelled() {
            return Err(FeedError::Cancelled);
        }

        let (flight_id, rx) = {
            let mut state = self.shared.lock();
            if let Some(hit) = state.decoded.get(key) {
                return Ok(Arc::clone(hit));
            }
            match state.in_flight.get_mut(key) {
                Some(flight) => {
                    debug!("joining download of {key}");
                    *flight.waiters.entry(token.id()).or_default() += 1;
                    (flight.id, flight.result.clone())
                }
                None => self.start_flight(&mut state, key, token.id()),
            }
        };

        let _attached = Attachment {
            shared: &self.shared,
            key,
            flight_id,
            token_id: token.id(),
        };

        tokio::select! {
            biased;
            () = token.cancelled() => Err(FeedError::Cancelled),
            result = wait_for_result(rx) => result,
        }
    }

    /// Withdraw `token`'s interest in `key`.
    ///
    /// The pending `load` for `token` resolves to [`FeedError::Cancelled`].
    /// The shared download keeps running while other callers are attached.
    /// Thumbnails already in the store are left alone.
    pub fn cancel(&self, key: &str, token: &CancelToken) {
        token.cancel();
        self.shared.detach(key, None, token.id(), Detach::Token);
    }

    /// Whether `key` is in the store.  Does not affect recency.
    pub fn contains(&self, key: &str) -> bool {
        self.shared.lock().decoded.contains(key)
    }

    pub fn is_in_flight(&self, key: &str) -> bool {
        self.shared.lock().in_flight.contains_key(key)
    }

    /// Number of callers attached to the download of `key`.
    pub fn waiter_count(&self, key: &str) -> usize {
        self.shared
            .lock()
            .in_flight
            .get(key)
            .map_or(0, |flight| flight.waiters.values().sum())
    }

    pub fn len(&self) -> usize {
        self.shared.lock().decoded.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Register a new download for `key` and spawn it.
    fn start_flight(
        &self,
        state: &mut CacheState,
        key: &str,
        token_id: u64,
    ) -> (u64, watch::Receiver<SharedResult>) {
        state.next_flight += 1;
        let flight_id = state.next_flight;
        let (tx, rx) = watch::channel(None);

        debug!("downloading {key}");
        let shared = Arc::clone(&self.shared);
        let owned_key = key.to_string();
        let handle = tokio::spawn(async move {
            let result = shared.fetch_and_decode(&owned_key).await;
            shared.finish(&owned_key, flight_id, &tx, result);
        });

        state.in_flight.insert(
            key.to_string(),
            Flight {
                id: flight_id,
                waiters: HashMap::from([(token_id, 1)]),
                result: rx.clone(),
                task: handle.abort_handle(),
            },
        );
        (flight_id, rx)
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn fetch_and_decode(&self, key: &str) -> Result<Arc<Thumbnail>> {
        let bytes = self.source.fetch_bytes(key).await?;
        let max_pixel_size = self.max_pixel_size;
        let thumbnail = tokio::task::spawn_blocking(move || Thumbnail::decode(&bytes, max_pixel_size))
            .await
            .map_err(|e| FeedError::Decode(format!("decoder task failed: {e}")))??;
        Ok(Arc::new(thumbnail))
    }

    /// Store a successful result, retire the ledger entry and wake waiters.
    fn finish(
        &self,
        key: &str,
        flight_id: u64,
        tx: &watch::Sender<SharedResult>,
        result: Result<Arc<Thumbnail>>,
    ) {
        let mut state = self.lock();
        match &result {
            Ok(thumbnail) => {
                if let Some((evicted, _)) = state.decoded.push(key.to_string(), Arc::clone(thumbnail)) {
                    if evicted != key {
                        debug!("evicted {evicted}");
                    }
                }
            }
            Err(e) => warn!("image {key}: {e}"),
        }
        if state.in_flight.get(key).is_some_and(|f| f.id == flight_id) {
            state.in_flight.remove(key);
        }
        tx.send_replace(Some(result));
    }

    /// Remove `token_id` from the download of `key`, aborting the download
    /// when it was the last caller.  `flight_id` pins a specific download.
    fn detach(&self, key: &str, flight_id: Option<u64>, token_id: u64, scope: Detach) {
        let mut state = self.lock();
        let Some(flight) = state.in_flight.get_mut(key) else {
            return;
        };
        if flight_id.is_some_and(|id| id != flight.id) {
            return;
        }
        let Some(count) = flight.waiters.get_mut(&token_id) else {
            return;
        };
        match scope {
            Detach::One if *count > 1 => {
                *count -= 1;
                return;
            }
            _ => {
                flight.waiters.remove(&token_id);
            }
        }
        if !flight.waiters.is_empty() {
            return;
        }
        if let Some(flight) = state.in_flight.remove(key) {
            debug!("abandoning download of {key}");
            flight.task.abort();
        }
    }
}

/// How much of a token's interest [`Shared::detach`] withdraws.
#[derive(Clone, Copy)]
enum Detach {
    /// A single `load` call.
    One,
    /// Every `load` call made with the token.
    Token,
}

/// Detaches a caller when its `load` future finishes or is dropped.
struct Attachment<'a> {
    shared: &'a Shared,
    key: &'a str,
    flight_id: u64,
    token_id: u64,
}

impl Drop for Attachment<'_> {
    fn drop(&mut self) {
        self.shared
            .detach(self.key, Some(self.flight_id), self.token_id, Detach::One);
    }
}

async fn wait_for_result(mut rx: watch::Receiver<SharedResult>) -> Result<Arc<Thumbnail>> {
    match rx.wait_for(Option::is_some).await {
        Ok(done) => (*done).clone().unwrap_or(Err(FeedError::Cancelled)),
        // Sender dropped without a result: the download was aborted.
        Err(_) => Err(FeedError::Cancelled),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use tokio::sync::Semaphore;

    /// Serves PNGs; keys starting with `broken` fail in transport, keys
    /// starting with `garbage` return undecodable bytes.
    struct MockBytes {
        calls: Mutex<HashMap<String, usize>>,
        gate: Option<Semaphore>,
    }

    impl MockBytes {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(HashMap::new()),
                gate: None,
            })
        }

        fn gated() -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(HashMap::new()),
                gate: Some(Semaphore::new(0)),
            })
        }

        fn release(&self, n: usize) {
            if let Some(gate) = &self.gate {
                gate.add_permits(n);
            }
        }

        fn calls(&self, key: &str) -> usize {
            self.calls.lock().unwrap().get(key).copied().unwrap_or(0)
        }
    }

    #[async_trait]
    impl ByteSource for MockBytes {
        async fn fetch_bytes(&self, locator: &str) -> Result<Vec<u8>> {
            *self.calls.lock().unwrap().entry(locator.to_string()).or_default() += 1;
            if let Some(gate) = &self.gate {
                gate.acquire().await.unwrap().forget();
            }
            if locator.starts_with("broken") {
                Err(FeedError::Transport(format!("404 for {locator}")))
            } else if locator.starts_with("garbage") {
                Ok(b"<html>nope</html>".to_vec())
            } else {
                Ok(png_bytes(40, 20))
            }
        }
    }

    fn spawn_load(
        cache: &ImageCache,
        key: &'static str,
        token: &CancelToken,
    ) -> tokio::task::JoinHandle<Result<Arc<Thumbnail>>> {
        let cache = cache.clone();
        let token = token.clone();
        tokio::spawn(async move { cache.load(key, &token).await })
    }

    async fn wait_for_waiters(cache: &ImageCache, key: &str, n: usize) {
        while cache.waiter_count(key) < n {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn cold_load_fetches_and_caches() {
        let source = MockBytes::new();
        let cache = ImageCache::new(source.clone(), 4, 350);

        let thumb = cache.load("a.png", &CancelToken::new()).await.unwrap();
        assert_eq!((thumb.width(), thumb.height()), (40, 20));
        assert!(cache.contains("a.png"));
        assert!(!cache.is_in_flight("a.png"));

        let again = cache.load("a.png", &CancelToken::new()).await.unwrap();
        assert!(Arc::ptr_eq(&thumb, &again));
        assert_eq!(source.calls("a.png"), 1);
    }

    #[tokio::test]
    async fn concurrent_loads_share_one_fetch() {
        let source = MockBytes::gated();
        let cache = ImageCache::new(source.clone(), 4, 350);

        let first = spawn_load(&cache, "a.png", &CancelToken::new());
        let second = spawn_load(&cache, "a.png", &CancelToken::new());
        wait_for_waiters(&cache, "a.png", 2).await;
        assert!(cache.is_in_flight("a.png"));

        source.release(1);
        let first = first.await.unwrap().unwrap();
        let second = second.await.unwrap().unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(source.calls("a.png"), 1);
        assert!(!cache.is_in_flight("a.png"));
    }

    #[tokio::test]
    async fn concurrent_loads_share_one_failure_and_allow_retry() {
        let source = MockBytes::gated();
        let cache = ImageCache::new(source.clone(), 4, 350);

        let first = spawn_load(&cache, "broken.png", &CancelToken::new());
        let second = spawn_load(&cache, "broken.png", &CancelToken::new());
        wait_for_waiters(&cache, "broken.png", 2).await;

        source.release(1);
        let first = first.await.unwrap();
        let second = second.await.unwrap();

        let expected = Err(FeedError::Transport("404 for broken.png".into()));
        assert_eq!(first, expected);
        assert_eq!(second, expected);
        assert_eq!(source.calls("broken.png"), 1);
        assert!(!cache.contains("broken.png"));
        assert!(!cache.is_in_flight("broken.png"));

        source.release(1);
        let retry = cache.load("broken.png", &CancelToken::new()).await;
        assert!(retry.is_err());
        assert_eq!(source.calls("broken.png"), 2, "failure is not cached");
    }

    #[tokio::test]
    async fn undecodable_bytes_are_a_decode_error() {
        let source = MockBytes::new();
        let cache = ImageCache::new(source, 4, 350);

        let result = cache.load("garbage.png", &CancelToken::new()).await;
        assert!(matches!(result, Err(FeedError::Decode(_))));
        assert!(cache.is_empty());
        assert!(!cache.is_in_flight("garbage.png"));
    }

    #[tokio::test]
    async fn cancelling_one_caller_leaves_the_other_served() {
        let source = MockBytes::gated();
        let cache = ImageCache::new(source.clone(), 4, 350);
        let quitter = CancelToken::new();

        let cancelled = spawn_load(&cache, "a.png", &quitter);
        let kept = spawn_load(&cache, "a.png", &CancelToken::new());
        wait_for_waiters(&cache, "a.png", 2).await;

        cache.cancel("a.png", &quitter);
        assert_eq!(cancelled.await.unwrap(), Err(FeedError::Cancelled));
        assert_eq!(cache.waiter_count("a.png"), 1);
        assert!(cache.is_in_flight("a.png"));

        source.release(1);
        assert!(kept.await.unwrap().is_ok());
        assert!(cache.contains("a.png"));
        assert_eq!(source.calls("a.png"), 1);
    }

    #[tokio::test]
    async fn cancelling_last_caller_abandons_fetch() {
        let source = MockBytes::gated();
        let cache = ImageCache::new(source.clone(), 4, 350);
        let token = CancelToken::new();

        let pending = spawn_load(&cache, "a.png", &token);
        wait_for_waiters(&cache, "a.png", 1).await;

        cache.cancel("a.png", &token);
        assert_eq!(pending.await.unwrap(), Err(FeedError::Cancelled));
        assert!(!cache.is_in_flight("a.png"));
        assert!(!cache.contains("a.png"));

        // A later request starts a fresh download.
        source.release(1);
        assert!(cache.load("a.png", &CancelToken::new()).await.is_ok());
        assert_eq!(source.calls("a.png"), 2);
    }

    #[tokio::test]
    async fn dropping_a_pending_load_detaches_it() {
        let source = MockBytes::gated();
        let cache = ImageCache::new(source.clone(), 4, 350);

        let pending = spawn_load(&cache, "a.png", &CancelToken::new());
        wait_for_waiters(&cache, "a.png", 1).await;

        pending.abort();
        let _ = pending.await;
        assert!(!cache.is_in_flight("a.png"));
    }

    #[tokio::test]
    async fn dropping_one_of_two_loads_sharing_a_token_keeps_the_other() {
        let source = MockBytes::gated();
        let cache = ImageCache::new(source.clone(), 4, 350);
        let token = CancelToken::new();

        let dropped = spawn_load(&cache, "a.png", &token);
        let kept = spawn_load(&cache, "a.png", &token);
        wait_for_waiters(&cache, "a.png", 2).await;

        dropped.abort();
        let _ = dropped.await;
        assert_eq!(cache.waiter_count("a.png"), 1);
        assert!(cache.is_in_flight("a.png"));

        source.release(1);
        assert!(kept.await.unwrap().is_ok());
        assert_eq!(source.calls("a.png"), 1);
    }

    #[tokio::test]
    async fn cancelling_a_shared_token_detaches_all_its_loads() {
        let source = MockBytes::gated();
        let cache = ImageCache::new(source.clone(), 4, 350);
        let token = CancelToken::new();

        let first = spawn_load(&cache, "a.png", &token);
        let second = spawn_load(&cache, "a.png", &token);
        wait_for_waiters(&cache, "a.png", 2).await;

        cache.cancel("a.png", &token);
        assert_eq!(first.await.unwrap(), Err(FeedError::Cancelled));
        assert_eq!(second.await.unwrap(), Err(FeedError::Cancelled));
        assert!(!cache.is_in_flight("a.png"));
    }

    #[tokio::test]
    async fn cancelled_token_never_fetches() {
        let source = MockBytes::new();
        let cache = ImageCache::new(source.clone(), 4, 350);
        let token = CancelToken::new();
        cache.cancel("a.png", &token);

        assert_eq!(cache.load("a.png", &token).await, Err(FeedError::Cancelled));
        assert_eq!(source.calls("a.png"), 0);
    }

    #[tokio::test]
    async fn cancel_does_not_touch_cached_entries() {
        let source = MockBytes::new();
        let cache = ImageCache::new(source, 4, 350);
        let token = CancelToken::new();

        cache.load("a.png", &token).await.unwrap();
        cache.cancel("a.png", &token);
        assert!(cache.contains("a.png"));
    }

    #[tokio::test]
    async fn least_recently_used_entry_is_evicted() {
        let source = MockBytes::new();
        let cache = ImageCache::new(source.clone(), 2, 350);

        cache.load("a.png", &CancelToken::new()).await.unwrap();
        cache.load("b.png", &CancelToken::new()).await.unwrap();
        // Touch `a` so `b` becomes the eviction candidate.
        cache.load("a.png", &CancelToken::new()).await.unwrap();
        cache.load("c.png", &CancelToken::new()).await.unwrap();

        assert_eq!(cache.len(), 2);
        assert!(cache.contains("a.png"));
        assert!(!cache.contains("b.png"));
        assert!(cache.contains("c.png"));

        cache.load("b.png", &CancelToken::new()).await.unwrap();
        assert_eq!(source.calls("b.png"), 2, "evicted key is a cold miss");
        assert_eq!(source.calls("a.png"), 1);
    }

    #[tokio::test]
    async fn distinct_keys_download_concurrently() {
        let source = MockBytes::gated();
        let cache = ImageCache::new(source.clone(), 4, 350);

        let a = spawn_load(&cache, "a.png", &CancelToken::new());
        let b = spawn_load(&cache, "b.png", &CancelToken::new());
        wait_for_waiters(&cache, "a.png", 1).await;
        wait_for_waiters(&cache, "b.png", 1).await;
        while source.calls("a.png") + source.calls("b.png") < 2 {
            tokio::task::yield_now().await;
        }

        source.release(2);
        assert!(a.await.unwrap().is_ok());
        assert!(b.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn zero_capacity_still_holds_one_entry() {
        let cache = ImageCache::new(MockBytes::new(), 0, 350);
        cache.load("a.png", &CancelToken::new()).await.unwrap();
        assert_eq!(cache.len(), 1);
    }
}
