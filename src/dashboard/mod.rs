//! The dashboard: single owner of the settings and feed controllers.
//!
//! All controller logic runs on one cooperative loop. User input arrives as
//! [`Command`]s, request and timer completions as [`SyncEvent`]s, and after
//! each one the resulting [`ViewChange`]s are forwarded to the observer.

mod observer;

pub use observer::{DashboardObserver, DashboardView};

use crate::feed::{FeedPolicy, SyncEngine, Viewport};
use crate::remote::SharedRemote;
use crate::settings::{PersistenceController, SavePolicy, SettingsForm};
use crate::task::{SyncEvent, EVENT_CHANNEL_CAPACITY};
use crate::view::ViewChange;
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// Timing and paging configuration of both controllers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Policies {
    pub save: SavePolicy,
    pub feed: FeedPolicy,
}

/// User-facing entry points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// The settings form was edited; carries the whole form.
    EditSettings(SettingsForm),
    /// Explicit submit, skipping the debounce.
    SubmitSettings,
    /// Retry action on the save error indicator.
    RetrySave,
    /// The view scrolled.
    Scroll(Viewport),
    /// Manual refresh of the feed.
    Refresh,
    Quit,
}

pub struct Dashboard {
    persistence: PersistenceController,
    engine: SyncEngine,
    observer: Box<dyn DashboardObserver>,
    events: mpsc::Receiver<SyncEvent>,
    started: bool,
}

impl Dashboard {
    /// `initial_form` is the settings form as last stored by the backend.
    pub fn new(
        remote: SharedRemote,
        policies: Policies,
        initial_form: SettingsForm,
        observer: Box<dyn DashboardObserver>,
    ) -> Self {
        let (tx, events) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let persistence = PersistenceController::new(
            Arc::clone(&remote),
            tx.clone(),
            policies.save,
            initial_form,
        );
        let engine = SyncEngine::new(remote, tx, policies.feed);

        Self {
            persistence,
            engine,
            observer,
            events,
            started: false,
        }
    }

    /// Load the first page and start the background poll. Idempotent.
    pub fn start(&mut self) {
        if self.started {
            return;
        }
        self.started = true;
        tracing::info!("Starting dashboard sync");
        self.engine.start();
        self.flush();
    }

    pub fn view(&self) -> DashboardView<'_> {
        DashboardView {
            engine: &self.engine,
            persistence: &self.persistence,
        }
    }

    /// Apply one user command. Returns `false` once the dashboard should stop.
    pub fn handle_command(&mut self, command: Command) -> bool {
        tracing::debug!(?command, "Handling command");
        match command {
            Command::EditSettings(form) => self.persistence.edit(form),
            Command::SubmitSettings => self.persistence.submit(),
            Command::RetrySave => self.persistence.retry(),
            Command::Scroll(viewport) => self.engine.scroll_tick(viewport),
            Command::Refresh => self.engine.refresh(),
            Command::Quit => {
                self.flush();
                return false;
            }
        }
        self.flush();
        true
    }

    /// Route one completion to the controller that issued it.
    pub fn handle_event(&mut self, event: SyncEvent) {
        match event {
            SyncEvent::Timer { timer, generation } if timer.is_settings_timer() => {
                self.persistence.on_timer(timer, generation)
            }
            SyncEvent::Timer { generation, .. } => self.engine.on_poll_timer(generation),
            SyncEvent::SaveFinished { generation, result } => {
                self.persistence
                    .on_save_finished(generation, result, &mut self.engine)
            }
            SyncEvent::PageFinished {
                generation,
                page,
                is_reset,
                result,
            } => self
                .engine
                .on_page_finished(generation, page, is_reset, result),
            SyncEvent::PollFinished { generation, result } => {
                self.engine.on_poll_finished(generation, result)
            }
        }
        self.flush();
    }

    /// Process completions until `deadline`.
    pub async fn run_until(&mut self, deadline: Instant) {
        while let Ok(Some(event)) = tokio::time::timeout_at(deadline, self.events.recv()).await {
            self.handle_event(event);
        }
    }

    /// Process completions for `duration`.
    pub async fn run_for(&mut self, duration: Duration) {
        self.run_until(Instant::now() + duration).await;
    }

    /// Run until `Quit` or until the command channel closes.
    pub async fn run(&mut self, mut commands: mpsc::Receiver<Command>) -> Result<()> {
        self.start();

        loop {
            tokio::select! {
                command = commands.recv() => {
                    match command {
                        Some(command) => {
                            if !self.handle_command(command) {
                                break;
                            }
                        }
                        None => {
                            tracing::debug!("Command channel closed");
                            break;
                        }
                    }
                }
                Some(event) = self.events.recv() => {
                    self.handle_event(event);
                }
            }
        }

        self.shutdown();
        Ok(())
    }

    /// Stop every timer and the background poll.
    pub fn shutdown(&mut self) {
        tracing::info!("Stopping dashboard sync");
        self.persistence.shutdown();
        self.engine.shutdown();
        self.flush();
    }

    fn flush(&mut self) {
        let mut changes: Vec<ViewChange> = self.persistence.take_changes();
        changes.extend(self.engine.take_changes());
        if changes.is_empty() {
            return;
        }

        let view = DashboardView {
            engine: &self.engine,
            persistence: &self.persistence,
        };
        for change in &changes {
            self.observer.notify(change, &view);
        }
    }
}
