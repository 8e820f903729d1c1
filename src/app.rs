use std::collections::{HashMap, HashSet};

use livescroll_news::{CancelToken, FeedError, ListState, Snapshot, SnapshotEntry};
use ratatui::widgets::ListState as Selection;

/// Start paging when the selection gets this close to the last row.
const PREFETCH_ROWS: usize = 3;

/// Whether the user is browsing or typing a search query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Browse,
    Search,
}

/// Thumbnail status of one image locator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Thumb {
    Loading,
    Ready { width: u32, height: u32 },
    Failed,
}

/// Thumbnail requests to issue and withdraw after a frame.
#[derive(Debug, Default)]
pub struct ThumbPlan {
    pub start: Vec<(String, CancelToken)>,
    pub cancel: Vec<(String, CancelToken)>,
}

pub struct App {
    /// Latest state published by the list state machine.
    pub state: ListState,
    /// Last loaded snapshot; kept on screen while the next page loads.
    pub snapshot: Snapshot,
    /// List selection state for scrolling.
    pub selection: Selection,
    pub mode: Mode,
    /// Search text as typed.
    pub query: String,
    /// Whether the user has requested to quit.
    pub quit: bool,
    /// Status line text.
    pub status: String,
    /// Rows the list viewport showed on the last frame.
    pub viewport_rows: usize,
    thumbs: HashMap<String, Thumb>,
    requests: HashMap<String, CancelToken>,
}

impl App {
    pub fn new() -> Self {
        Self {
            state: ListState::Idle,
            snapshot: Snapshot::default(),
            selection: Selection::default(),
            mode: Mode::Browse,
            query: String::new(),
            quit: false,
            status: "Starting…".into(),
            viewport_rows: 0,
            thumbs: HashMap::new(),
            requests: HashMap::new(),
        }
    }

    pub fn entries(&self) -> &[SnapshotEntry] {
        self.snapshot.entries()
    }

    pub fn selected_entry(&self) -> Option<&SnapshotEntry> {
        self.selection.selected().and_then(|i| self.entries().get(i))
    }

    pub fn thumb(&self, key: &str) -> Option<Thumb> {
        self.thumbs.get(key).copied()
    }

    /// Take a newly published list state.
    pub fn apply_state(&mut self, state: ListState) {
        self.status = match &state {
            ListState::Idle => "Idle".into(),
            ListState::InitialLoading => "Loading…".into(),
            ListState::LoadingMore => "Loading more…".into(),
            ListState::Loaded(_) if self.query.is_empty() => "Up to date".into(),
            ListState::Loaded(_) => format!("Filter: {}", self.query),
            ListState::Error(message) => format!("Error: {message}  (r: retry)"),
        };
        match &state {
            ListState::Loaded(snapshot) => self.snapshot = snapshot.clone(),
            ListState::InitialLoading => self.snapshot = Snapshot::default(),
            _ => {}
        }
        self.clamp_selection();
        self.prune_thumbs();
        self.state = state;
    }

    /// Forget finished thumbnails of rows no longer in the snapshot.
    /// Pending requests stay until `sync_thumbnails` withdraws them.
    fn prune_thumbs(&mut self) {
        let keys: HashSet<&str> = self
            .snapshot
            .entries()
            .iter()
            .map(|e| e.image_url.as_str())
            .collect();
        let requests = &self.requests;
        self.thumbs
            .retain(|key, _| keys.contains(key.as_str()) || requests.contains_key(key));
    }

    /// Whether the selection is close enough to the end to load the next page.
    pub fn near_end(&self) -> bool {
        match self.selection.selected() {
            Some(i) => i + PREFETCH_ROWS >= self.snapshot.len(),
            None => self.snapshot.is_empty(),
        }
    }

    fn clamp_selection(&mut self) {
        let len = self.snapshot.len();
        match self.selection.selected() {
            _ if len == 0 => self.selection.select(None),
            Some(i) if i >= len => self.selection.select(Some(len - 1)),
            None => self.selection.select(Some(0)),
            Some(_) => {}
        }
    }

    // -- thumbnails ----------------------------------------------------------

    /// Image locators of the rows currently on screen, without repeats.
    pub fn visible_keys(&self) -> Vec<String> {
        let start = self.selection.offset().min(self.entries().len());
        let end = (start + self.viewport_rows).min(self.entries().len());
        let mut keys: Vec<String> = Vec::new();
        for entry in &self.entries()[start..end] {
            if !keys.contains(&entry.image_url) {
                keys.push(entry.image_url.clone());
            }
        }
        keys
    }

    /// Request thumbnails for newly visible rows and withdraw requests for
    /// rows that scrolled away before their image arrived.
    pub fn sync_thumbnails(&mut self) -> ThumbPlan {
        let visible = self.visible_keys();
        let mut plan = ThumbPlan::default();

        let stale: Vec<String> = self
            .requests
            .keys()
            .filter(|key| !visible.contains(*key))
            .cloned()
            .collect();
        for key in stale {
            if let Some(token) = self.requests.remove(&key) {
                self.thumbs.remove(&key);
                plan.cancel.push((key, token));
            }
        }

        for key in visible {
            if self.thumbs.contains_key(&key) {
                continue;
            }
            let token = CancelToken::new();
            self.thumbs.insert(key.clone(), Thumb::Loading);
            self.requests.insert(key.clone(), token.clone());
            plan.start.push((key, token));
        }
        plan
    }

    /// Record the outcome of a thumbnail request.
    pub fn thumb_loaded(&mut self, key: String, result: Result<(u32, u32), FeedError>) {
        if self.requests.remove(&key).is_none() {
            // Withdrawn while the result was in the channel.
            return;
        }
        let thumb = match result {
            Ok((width, height)) => Thumb::Ready { width, height },
            Err(_) => Thumb::Failed,
        };
        self.thumbs.insert(key, thumb);
    }

    // -- navigation ----------------------------------------------------------

    pub fn select_next(&mut self) {
        if self.entries().is_empty() {
            return;
        }
        let i = match self.selection.selected() {
            Some(i) => (i + 1).min(self.entries().len() - 1),
            None => 0,
        };
        self.selection.select(Some(i));
    }

    pub fn select_previous(&mut self) {
        if self.entries().is_empty() {
            return;
        }
        let i = match self.selection.selected() {
            Some(i) => i.saturating_sub(1),
            None => 0,
        };
        self.selection.select(Some(i));
    }

    pub fn select_first(&mut self) {
        if !self.entries().is_empty() {
            self.selection.select(Some(0));
        }
    }

    pub fn select_last(&mut self) {
        if !self.entries().is_empty() {
            self.selection.select(Some(self.entries().len() - 1));
        }
    }
}
