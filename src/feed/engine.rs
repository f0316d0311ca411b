//! Feed lifecycle: reset loads, infinite-scroll appends and the background
//! poll that prepends newly published items.

use super::cursor::{PaginationCursor, PagingState};
use super::identity::IdentitySet;
use super::item::{Item, ItemPage};
use crate::remote::{RemoteError, SharedRemote};
use crate::settings::FeedInvalidator;
use crate::task::{spawn_request, EventSender, SyncEvent, TimerId, TimerSlot};
use crate::view::{FeedStatus, LiveStatus, ViewChange};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Paging limits and timings of the feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedPolicy {
    pub per_page: u32,
    /// Hard cap on how deep scrolling may page.
    pub max_pages: u32,
    /// Minimum spacing between two scroll-triggered fetches.
    pub scroll_min_interval: Duration,
    /// Distance from the content bottom that counts as "near the end".
    pub scroll_threshold_px: u32,
    pub poll_interval: Duration,
    /// Delays before poll retry 1, 2, ...; exhausting them loses the connection.
    pub poll_retry_delays: Vec<Duration>,
}

impl Default for FeedPolicy {
    fn default() -> Self {
        Self {
            per_page: 10,
            max_pages: 5,
            scroll_min_interval: Duration::from_secs(1),
            scroll_threshold_px: 300,
            poll_interval: Duration::from_secs(60),
            poll_retry_delays: vec![Duration::from_secs(5), Duration::from_secs(30)],
        }
    }
}

/// Scroll position reported by the view, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    /// Offset of the viewport's bottom edge from the top of the content.
    pub scroll_bottom: u32,
    pub content_height: u32,
}

impl Viewport {
    pub fn new(scroll_bottom: u32, content_height: u32) -> Self {
        Self {
            scroll_bottom,
            content_height,
        }
    }

    /// A viewport scrolled all the way down.
    pub fn at_bottom(content_height: u32) -> Self {
        Self::new(content_height, content_height)
    }

    pub fn distance_to_bottom(&self) -> u32 {
        self.content_height.saturating_sub(self.scroll_bottom)
    }
}

/// Background poll lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Idle,
    Scheduled,
    /// `retry` counts the retries already spent in this failure streak.
    InFlight { retry: usize },
    RetryScheduled { retry: usize },
    /// Retries exhausted; left only through a reset.
    Dead,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PageRequest {
    page: u32,
    is_reset: bool,
}

/// Owns the visible feed, its identity set and pagination cursor.
pub struct SyncEngine {
    remote: SharedRemote,
    events: EventSender,
    policy: FeedPolicy,

    items: VecDeque<Item>,
    identity: IdentitySet,
    cursor: PaginationCursor,
    status: FeedStatus,
    paging: PagingState,
    live: LiveStatus,

    page_in_flight: Option<PageRequest>,
    queued: Option<PageRequest>,
    page_generation: u64,
    last_scroll_fetch: Option<Instant>,

    poll: PollState,
    poll_timer: TimerSlot,
    poll_cancel: Option<CancellationToken>,
    poll_generation: u64,

    changes: Vec<ViewChange>,
}

impl SyncEngine {
    pub fn new(remote: SharedRemote, events: EventSender, policy: FeedPolicy) -> Self {
        let cursor = PaginationCursor::new(policy.max_pages);
        let paging = cursor.paging_state();
        Self {
            remote,
            events,
            policy,
            items: VecDeque::new(),
            identity: IdentitySet::new(),
            cursor,
            status: FeedStatus::Loading,
            paging,
            live: LiveStatus::Live,
            page_in_flight: None,
            queued: None,
            page_generation: 0,
            last_scroll_fetch: None,
            poll: PollState::Idle,
            poll_timer: TimerSlot::default(),
            poll_cancel: None,
            poll_generation: 0,
            changes: Vec::new(),
        }
    }

    /// Initial load of page 1 and start of the background poll.
    pub fn start(&mut self) {
        self.reset("initial load");
    }

    pub fn items(&self) -> &VecDeque<Item> {
        &self.items
    }

    pub fn identity(&self) -> &IdentitySet {
        &self.identity
    }

    pub fn cursor(&self) -> &PaginationCursor {
        &self.cursor
    }

    pub fn status(&self) -> FeedStatus {
        self.status
    }

    pub fn paging(&self) -> PagingState {
        self.paging
    }

    pub fn live(&self) -> LiveStatus {
        self.live
    }

    pub fn poll_state(&self) -> PollState {
        self.poll
    }

    /// Whether a page fetch (reset or scroll) is outstanding.
    pub fn is_loading_page(&self) -> bool {
        self.page_in_flight.is_some()
    }

    // ========================================================================
    // Page loading
    // ========================================================================

    /// Fetch `page`, either replacing the feed (`is_reset`) or appending to it.
    ///
    /// Only one page fetch runs at a time; a request made while one is
    /// outstanding replaces any earlier queued request and runs afterwards.
    pub fn load_page(&mut self, page: u32, is_reset: bool) {
        if !self.cursor.allows(page) {
            tracing::debug!(
                page,
                max = self.cursor.max_allowed_page(),
                "Page beyond paging limit refused"
            );
            return;
        }

        let request = PageRequest { page, is_reset };
        if self.page_in_flight.is_some() {
            tracing::debug!(page, is_reset, "Page fetch outstanding, request queued");
            self.queued = Some(request);
            return;
        }

        if !is_reset {
            let now = Instant::now();
            if let Some(last) = self.last_scroll_fetch {
                if now.duration_since(last) < self.policy.scroll_min_interval {
                    tracing::debug!(page, "Scroll fetch rate limited");
                    return;
                }
            }
            self.last_scroll_fetch = Some(now);
            self.changes.push(ViewChange::LoadingMore(true));
        }

        self.page_in_flight = Some(request);
        let generation = self.page_generation;
        let per_page = self.policy.per_page;
        let remote = Arc::clone(&self.remote);

        tracing::debug!(page, is_reset, generation, "Fetching page");
        spawn_request(
            "list_items",
            &self.events,
            async move { remote.list_items(page, per_page).await },
            move |result| SyncEvent::PageFinished {
                generation,
                page,
                is_reset,
                result,
            },
        );
    }

    /// React to the view's scroll position.
    pub fn scroll_tick(&mut self, viewport: Viewport) {
        if self.status != FeedStatus::Ready
            || self.page_in_flight.is_some()
            || self.cursor.paging_state() != PagingState::More
            || viewport.distance_to_bottom() > self.policy.scroll_threshold_px
        {
            return;
        }
        self.load_page(self.cursor.next_page(), false);
    }

    pub fn on_page_finished(
        &mut self,
        generation: u64,
        page: u32,
        is_reset: bool,
        result: Result<ItemPage, RemoteError>,
    ) {
        let Some(request) = self.page_in_flight.take() else {
            tracing::debug!(page, "Ignoring page completion with no fetch outstanding");
            return;
        };
        if !request.is_reset {
            self.changes.push(ViewChange::LoadingMore(false));
        }

        if generation != self.page_generation {
            tracing::debug!(
                page,
                generation,
                current = self.page_generation,
                "Discarding page issued before the latest reset"
            );
        } else {
            match result {
                Ok(response) => self.apply_page(page, is_reset, response),
                Err(e) if is_reset => {
                    tracing::error!(page, error = %e, "Feed load failed");
                    self.set_status(FeedStatus::Error);
                }
                Err(e) => {
                    tracing::warn!(page, error = %e, "Scroll fetch failed");
                }
            }
        }

        if let Some(next) = self.queued.take() {
            self.load_page(next.page, next.is_reset);
        }
    }

    fn apply_page(&mut self, requested: u32, is_reset: bool, response: ItemPage) {
        let total_pages = response.total_pages();
        let page = if response.page == 0 {
            requested
        } else {
            response.page
        };
        self.cursor.record_page(page, total_pages);

        if is_reset {
            self.identity.clear();
            self.items = self.identity.retain_unseen(response.items).into();
            tracing::info!(page, items = self.items.len(), total_pages, "Feed loaded");
            self.changes.push(ViewChange::FeedReplaced);
            self.set_status(if self.items.is_empty() {
                FeedStatus::Empty
            } else {
                FeedStatus::Ready
            });
        } else {
            let fresh = self.identity.retain_unseen(response.items);
            let count = fresh.len();
            self.items.extend(fresh);
            tracing::debug!(page, appended = count, "Scroll page applied");
            if count > 0 {
                self.changes.push(ViewChange::Appended(count));
            }
        }

        self.update_paging();
    }

    // ========================================================================
    // Background poll
    // ========================================================================

    /// Schedule the next regular poll.
    pub fn start_background_poll(&mut self) {
        self.poll = PollState::Scheduled;
        self.poll_timer
            .arm(TimerId::Poll, self.policy.poll_interval, &self.events);
    }

    pub fn on_poll_timer(&mut self, generation: u64) {
        if !self.poll_timer.fire(generation) {
            return;
        }
        let retry = match self.poll {
            PollState::Scheduled => 0,
            PollState::RetryScheduled { retry } => retry,
            state => {
                tracing::debug!(?state, "Poll timer fired outside a scheduled state");
                return;
            }
        };

        let token = CancellationToken::new();
        self.poll_cancel = Some(token.clone());
        self.poll_generation = self.poll_generation.wrapping_add(1);
        self.poll = PollState::InFlight { retry };

        let generation = self.poll_generation;
        let per_page = self.policy.per_page;
        let remote = Arc::clone(&self.remote);

        tracing::debug!(retry, generation, "Polling for new items");
        spawn_request(
            "background_poll",
            &self.events,
            async move {
                tokio::select! {
                    _ = token.cancelled() => Err(RemoteError::Cancelled),
                    result = remote.list_items(1, per_page) => result,
                }
            },
            move |result| SyncEvent::PollFinished { generation, result },
        );
    }

    pub fn on_poll_finished(&mut self, generation: u64, result: Result<ItemPage, RemoteError>) {
        let PollState::InFlight { retry } = self.poll else {
            tracing::debug!(generation, "Ignoring poll completion with no poll in flight");
            return;
        };
        if generation != self.poll_generation {
            tracing::debug!(generation, current = self.poll_generation, "Ignoring stale poll");
            return;
        }
        self.poll_cancel = None;

        match result {
            Ok(response) => {
                self.merge_poll(response);
                self.set_live(LiveStatus::Live);
                self.start_background_poll();
            }
            Err(e) => match self.policy.poll_retry_delays.get(retry) {
                Some(&delay) => {
                    tracing::warn!(
                        retry = retry + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Background poll failed, retrying"
                    );
                    self.poll = PollState::RetryScheduled { retry: retry + 1 };
                    self.poll_timer.arm(TimerId::Poll, delay, &self.events);
                }
                None => {
                    tracing::error!(
                        retries = retry,
                        error = %e,
                        "Background poll failed, connection lost"
                    );
                    self.poll = PollState::Dead;
                    self.set_live(LiveStatus::ConnectionLost);
                }
            },
        }
    }

    /// Prepend unseen items from a page-1 poll, keeping newest first.
    fn merge_poll(&mut self, response: ItemPage) {
        // Reset in progress or failed: the next reset load supersedes this page.
        if matches!(self.status, FeedStatus::Loading | FeedStatus::Error) {
            tracing::debug!(status = ?self.status, "Poll result not merged");
            return;
        }

        self.cursor.update_total(response.total_pages());
        let fresh = self.identity.retain_unseen(response.items);
        let count = fresh.len();
        for item in fresh.into_iter().rev() {
            self.items.push_front(item);
        }

        if count > 0 {
            tracing::info!(count, "New items found");
            self.changes.push(ViewChange::Prepended(count));
            self.changes.push(ViewChange::NewItems(count));
            if self.status == FeedStatus::Empty {
                self.set_status(FeedStatus::Ready);
            }
        }
        self.update_paging();
    }

    fn cancel_poll(&mut self) {
        if let Some(token) = self.poll_cancel.take() {
            tracing::debug!("Cancelling in-flight poll");
            token.cancel();
        }
        self.poll_generation = self.poll_generation.wrapping_add(1);
        self.poll_timer.cancel();
        self.poll = PollState::Idle;
    }

    // ========================================================================
    // Reset
    // ========================================================================

    /// Manual refresh; also the way out of a failed load or a lost connection.
    pub fn refresh(&mut self) {
        self.reset("manual refresh");
    }

    fn reset(&mut self, reason: &'static str) {
        tracing::info!(reason, "Resetting feed");
        self.cancel_poll();

        self.page_generation = self.page_generation.wrapping_add(1);
        self.queued = None;
        self.identity.clear();
        self.items.clear();
        self.cursor.reset();
        self.changes.push(ViewChange::FeedReplaced);
        self.set_status(FeedStatus::Loading);
        self.update_paging();

        self.set_live(LiveStatus::Live);
        self.start_background_poll();
        self.load_page(1, true);
    }

    /// Abort the poll and its timer; outstanding page fetches finish unobserved.
    pub fn shutdown(&mut self) {
        self.cancel_poll();
        self.queued = None;
    }

    // ========================================================================
    // Observable state
    // ========================================================================

    fn set_status(&mut self, status: FeedStatus) {
        if self.status != status {
            self.status = status;
            self.changes.push(ViewChange::FeedStatus(status));
        }
    }

    fn set_live(&mut self, live: LiveStatus) {
        if self.live != live {
            self.live = live;
            self.changes.push(ViewChange::Live(live));
        }
    }

    fn update_paging(&mut self) {
        let paging = self.cursor.paging_state();
        if self.paging != paging {
            self.paging = paging;
            self.changes.push(ViewChange::Paging(paging));
        }
    }

    pub(crate) fn take_changes(&mut self) -> Vec<ViewChange> {
        std::mem::take(&mut self.changes)
    }
}

impl FeedInvalidator for SyncEngine {
    fn invalidate_and_reload(&mut self) {
        self.reset("settings changed");
    }
}
