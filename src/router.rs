//! Hand-off of a selected item to whatever shows its details.

use anyhow::{Context, Result};
use log::info;

use crate::source::NewsItem;

/// Receives the item the user picked.  The core keeps no further
/// responsibility once [`open_details`](DetailRouter::open_details) returns.
pub trait DetailRouter {
    fn open_details(&self, item: &NewsItem) -> Result<()>;
}

/// Opens the article in the system's default browser.
#[derive(Debug, Default)]
pub struct BrowserRouter;

impl DetailRouter for BrowserRouter {
    fn open_details(&self, item: &NewsItem) -> Result<()> {
        info!("opening item {} at {}", item.id, item.detail_url);
        open::that_detached(&item.detail_url)
            .with_context(|| format!("failed to open {}", item.detail_url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::make_raw;
    use std::cell::RefCell;

    #[derive(Default)]
    struct RecordingRouter {
        opened: RefCell<Vec<String>>,
    }

    impl DetailRouter for RecordingRouter {
        fn open_details(&self, item: &NewsItem) -> Result<()> {
            self.opened.borrow_mut().push(item.detail_url.clone());
            Ok(())
        }
    }

    #[test]
    fn router_receives_the_detail_url() {
        let router = RecordingRouter::default();
        let item = NewsItem::try_from(make_raw(4, "Four")).unwrap();

        router.open_details(&item).unwrap();

        assert_eq!(*router.opened.borrow(), vec!["https://example.com/news/4"]);
    }
}
