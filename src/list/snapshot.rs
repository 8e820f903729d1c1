//! Immutable, view-ready projections of the accumulated item set.

use std::collections::HashSet;

use crate::error::{FeedError, Result};
use crate::source::NewsItem;

/// One row of a [`Snapshot`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotEntry {
    pub id: i64,
    pub title: String,
    pub image_url: String,
}

impl From<&NewsItem> for SnapshotEntry {
    fn from(item: &NewsItem) -> Self {
        Self {
            id: item.id,
            title: item.title.clone(),
            image_url: item.image_url.clone(),
        }
    }
}

/// Ordered rows with unique ids.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    entries: Vec<SnapshotEntry>,
}

impl Snapshot {
    /// Build a snapshot from `items`, keeping their order.
    ///
    /// Fails with [`FeedError::DuplicateId`] on the first repeated id instead
    /// of silently dropping it.
    pub fn build<'a>(items: impl IntoIterator<Item = &'a NewsItem>) -> Result<Self> {
        let mut seen = HashSet::new();
        let mut entries = Vec::new();
        for item in items {
            if !seen.insert(item.id) {
                return Err(FeedError::DuplicateId(item.id));
            }
            entries.push(SnapshotEntry::from(item));
        }
        Ok(Self { entries })
    }

    /// Build a snapshot of the items whose title matches `filter`.
    pub fn filtered(items: &[NewsItem], filter: &str) -> Result<Self> {
        if filter.is_empty() {
            return Self::build(items);
        }
        let needle = filter.to_lowercase();
        Self::build(
            items
                .iter()
                .filter(|item| item.title.to_lowercase().contains(&needle)),
        )
    }

    pub fn entries(&self) -> &[SnapshotEntry] {
        &self.entries
    }

    pub fn ids(&self) -> Vec<i64> {
        self.entries.iter().map(|e| e.id).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The single observable state of a [`ListStateMachine`](super::ListStateMachine).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ListState {
    /// Nothing requested yet.
    #[default]
    Idle,
    /// First page in flight; no items accumulated.
    InitialLoading,
    /// A further page in flight.
    LoadingMore,
    Loaded(Snapshot),
    /// Shown to the user verbatim.
    Error(String),
}

impl ListState {
    pub fn is_loading(&self) -> bool {
        matches!(self, ListState::InitialLoading | ListState::LoadingMore)
    }

    pub fn snapshot(&self) -> Option<&Snapshot> {
        match self {
            ListState::Loaded(snapshot) => Some(snapshot),
            _ => None,
        }
    }
}
