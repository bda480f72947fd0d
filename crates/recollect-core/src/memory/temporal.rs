//! Temporal queries over `last_accessed`
//!
//! Three query shapes, all read-only:
//! - rolling window `[now - W, now]`, most recent first
//! - neighbourhood of a reference node within `W`, most recent first
//! - explicit `[start, end]` range, oldest first

use chrono::{DateTime, Duration, Utc};
use std::str::FromStr;

use super::graph::MemoryStore;
use super::node::MemoryNode;

/// Temporal query error
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemporalError {
    #[error("Unknown time window: {0} (expected recent, day, week, month or <n>h)")]
    UnknownWindow(String),
}

/// A named time window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeWindow {
    /// Last 24 hours
    Recent,
    Day,
    Week,
    /// 30 days
    Month,
    Hours(u32),
}

impl TimeWindow {
    pub fn duration(&self) -> Duration {
        match self {
            TimeWindow::Recent | TimeWindow::Day => Duration::hours(24),
            TimeWindow::Week => Duration::days(7),
            TimeWindow::Month => Duration::days(30),
            TimeWindow::Hours(h) => Duration::hours(i64::from(*h)),
        }
    }

    /// Start of the window ending at `now`
    pub fn since(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        earlier(now, self.duration())
    }
}

impl FromStr for TimeWindow {
    type Err = TemporalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        match lower.as_str() {
            "recent" => Ok(TimeWindow::Recent),
            "day" => Ok(TimeWindow::Day),
            "week" => Ok(TimeWindow::Week),
            "month" => Ok(TimeWindow::Month),
            other => other
                .strip_suffix('h')
                .and_then(|n| n.parse::<u32>().ok())
                .map(TimeWindow::Hours)
                .ok_or_else(|| TemporalError::UnknownWindow(s.to_string())),
        }
    }
}

impl std::fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimeWindow::Recent => write!(f, "recent"),
            TimeWindow::Day => write!(f, "day"),
            TimeWindow::Week => write!(f, "week"),
            TimeWindow::Month => write!(f, "month"),
            TimeWindow::Hours(h) => write!(f, "{h}h"),
        }
    }
}

/// Read-only view answering time-window queries against a [`MemoryStore`]
pub struct TemporalIndex<'a> {
    store: &'a MemoryStore,
}

impl<'a> TemporalIndex<'a> {
    pub fn new(store: &'a MemoryStore) -> Self {
        Self { store }
    }

    /// Nodes accessed within `window` of now
    pub fn window(&self, window: TimeWindow) -> Vec<MemoryNode> {
        self.window_at(window, Utc::now())
    }

    /// Nodes accessed in `[now - window, now]`, most recent first
    pub fn window_at(&self, window: TimeWindow, now: DateTime<Utc>) -> Vec<MemoryNode> {
        let mut nodes = self.collect(window.since(now), now, None);
        sort_desc(&mut nodes);
        nodes
    }

    /// Nodes accessed within `window` either side of node `id`'s last access.
    /// The reference node itself is excluded; an unknown id yields nothing.
    pub fn around(&self, id: &str, window: TimeWindow) -> Vec<MemoryNode> {
        let Some(reference) = self.store.peek(id) else {
            return vec![];
        };
        let centre = reference.last_accessed;
        let span = window.duration();

        let mut nodes = self.collect(earlier(centre, span), later(centre, span), Some(id));
        sort_desc(&mut nodes);
        nodes
    }

    /// Nodes accessed in `[start, end]`, oldest first
    pub fn between(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<MemoryNode> {
        let mut nodes = self.collect(start, end, None);
        nodes.sort_by(|a, b| a.last_accessed.cmp(&b.last_accessed));
        nodes
    }

    fn collect(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude: Option<&str>,
    ) -> Vec<MemoryNode> {
        self.store
            .nodes()
            .filter(|n| n.last_accessed >= start && n.last_accessed <= end)
            .filter(|n| exclude != Some(n.id.as_str()))
            .cloned()
            .collect()
    }
}

/// `at - span`, saturating at the earliest representable instant
fn earlier(at: DateTime<Utc>, span: Duration) -> DateTime<Utc> {
    at.checked_sub_signed(span).unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// `at + span`, saturating at the latest representable instant
fn later(at: DateTime<Utc>, span: Duration) -> DateTime<Utc> {
    at.checked_add_signed(span).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

fn sort_desc(nodes: &mut [MemoryNode]) {
    nodes.sort_by(|a, b| b.last_accessed.cmp(&a.last_accessed));
}
