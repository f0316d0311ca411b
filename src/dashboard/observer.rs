use crate::feed::{Item, PaginationCursor, PagingState, PollState, SyncEngine};
use crate::settings::{PersistenceController, SaveState, SettingsForm};
use crate::view::{FeedStatus, LiveStatus, SaveStatus, ViewChange};
use std::collections::VecDeque;

/// Read-only view of the dashboard handed to observers.
#[derive(Clone, Copy)]
pub struct DashboardView<'a> {
    pub(super) engine: &'a SyncEngine,
    pub(super) persistence: &'a PersistenceController,
}

impl<'a> DashboardView<'a> {
    /// The feed, newest first.
    pub fn items(&self) -> &'a VecDeque<Item> {
        self.engine.items()
    }

    pub fn feed_status(&self) -> FeedStatus {
        self.engine.status()
    }

    pub fn paging(&self) -> PagingState {
        self.engine.paging()
    }

    pub fn live(&self) -> LiveStatus {
        self.engine.live()
    }

    pub fn poll_state(&self) -> PollState {
        self.engine.poll_state()
    }

    pub fn cursor(&self) -> &'a PaginationCursor {
        self.engine.cursor()
    }

    pub fn save_status(&self) -> SaveStatus {
        self.persistence.status()
    }

    pub fn save_state(&self) -> SaveState {
        self.persistence.state()
    }

    pub fn form(&self) -> &'a SettingsForm {
        self.persistence.form()
    }
}

/// Receives every state transition, in the order it happened.
///
/// Called on the dashboard's loop after each command or event, never
/// concurrently with engine logic.
pub trait DashboardObserver: Send {
    fn notify(&mut self, change: &ViewChange, view: &DashboardView<'_>);
}
