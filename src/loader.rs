//! Background thumbnail loading.
//!
//! Each request runs as its own tokio task and reports back to the UI loop
//! over an [`mpsc`] channel, so a slow download never stalls rendering.
//!
//! ## For contributors
//!
//! Cancelled requests report nothing: once the UI withdraws interest in a
//! row it must not receive that row's image afterwards.

use tokio::sync::mpsc;

use livescroll_news::{CancelToken, FeedError, ImageCache};

/// Messages sent from loader tasks to the UI loop.
#[derive(Debug)]
pub struct ThumbMsg {
    pub key: String,
    /// Thumbnail dimensions on success.
    pub result: Result<(u32, u32), FeedError>,
}

/// Spawn a task that loads `key` through `cache` and reports on `tx`.
pub fn spawn(cache: &ImageCache, key: String, token: CancelToken, tx: mpsc::UnboundedSender<ThumbMsg>) {
    let cache = cache.clone();
    tokio::spawn(async move {
        let result = cache.load(&key, &token).await;
        if matches!(result, Err(FeedError::Cancelled)) || token.is_cancelled() {
            return;
        }
        let msg = ThumbMsg {
            key,
            result: result.map(|thumb| (thumb.width(), thumb.height())),
        };
        // If the receiver is gone the UI loop has exited; nothing to do.
        let _ = tx.send(msg);
    });
}
