//! Observable state exposed to the view layer.

pub use crate::feed::PagingState;

/// Lifecycle of the visible feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedStatus {
    /// A reset load (initial or after invalidation) is outstanding.
    Loading,
    /// The feed has items.
    Ready,
    /// The last load succeeded but nothing matches the filters.
    Empty,
    /// The reset load failed; cleared by an explicit refresh.
    Error,
}

/// Health of the background poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiveStatus {
    Live,
    /// Poll retries exhausted; only a manual refresh resumes polling.
    ConnectionLost,
}

/// Settings save indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveStatus {
    Idle,
    Saving,
    /// Transient; reverts to `Idle` on its own.
    Success,
    /// Retries exhausted; the view offers a retry action.
    Error,
}

/// A state transition the observer is told about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewChange {
    /// The whole feed was replaced (reset started or completed).
    FeedReplaced,
    /// Items were added at the bottom by scrolling.
    Appended(usize),
    /// Items were added at the top by a background poll.
    Prepended(usize),
    /// A background poll discovered this many unseen items.
    NewItems(usize),
    /// A scroll-triggered page fetch started or finished.
    LoadingMore(bool),
    FeedStatus(FeedStatus),
    Paging(PagingState),
    Live(LiveStatus),
    SaveStatus(SaveStatus),
}
