//! Settings save lifecycle: debounce, single-flight, queued re-save and
//! retry with a fixed backoff schedule.

use super::snapshot::{SettingsForm, SettingsSnapshot, Signature};
use crate::remote::{RemoteError, SharedRemote};
use crate::task::{spawn_request, EventSender, SyncEvent, TimerId, TimerSlot};
use crate::view::{SaveStatus, ViewChange};
use std::sync::Arc;
use std::time::Duration;

/// Timing of the save lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavePolicy {
    /// Quiet period after the last edit before saving.
    pub debounce: Duration,
    /// How long an attempt may be outstanding before "saving" is shown.
    pub saving_indicator_delay: Duration,
    /// How long the success indicator stays up.
    pub success_display: Duration,
    /// Delay before attempt `n + 1` after attempt `n` fails.
    pub retry_delays: Vec<Duration>,
}

impl Default for SavePolicy {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(300),
            saving_indicator_delay: Duration::from_secs(1),
            success_display: Duration::from_millis(1500),
            retry_delays: vec![Duration::from_secs(1), Duration::from_secs(5)],
        }
    }
}

/// Where the save lifecycle stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveState {
    Idle,
    /// Debounce timer running.
    Pending,
    /// Attempt `attempt` (1-based) is outstanding.
    InFlight { attempt: u32 },
    /// Attempt `attempt` is scheduled on the retry timer.
    Retrying { attempt: u32 },
}

/// The Sync Engine's side of the invalidation seam.
pub trait FeedInvalidator {
    /// Settings affecting feed membership changed: discard and reload the feed.
    fn invalidate_and_reload(&mut self);
}

/// Owns the save state and the last signature the backend accepted.
pub struct PersistenceController {
    remote: SharedRemote,
    events: EventSender,
    policy: SavePolicy,
    form: SettingsForm,
    state: SaveState,
    resave_needed: bool,
    last_accepted: Option<Signature>,
    in_flight: Option<Signature>,
    generation: u64,
    status: SaveStatus,
    debounce: TimerSlot,
    retry: TimerSlot,
    saving_indicator: TimerSlot,
    success_clear: TimerSlot,
    changes: Vec<ViewChange>,
}

impl PersistenceController {
    /// `initial` is the form as the backend last stored it; its signature
    /// becomes the baseline so an unchanged first save does not reset the feed.
    pub fn new(
        remote: SharedRemote,
        events: EventSender,
        policy: SavePolicy,
        initial: SettingsForm,
    ) -> Self {
        let last_accepted = initial.snapshot().ok().map(|s| s.signature());
        Self {
            remote,
            events,
            policy,
            form: initial,
            state: SaveState::Idle,
            resave_needed: false,
            last_accepted,
            in_flight: None,
            generation: 0,
            status: SaveStatus::Idle,
            debounce: TimerSlot::default(),
            retry: TimerSlot::default(),
            saving_indicator: TimerSlot::default(),
            success_clear: TimerSlot::default(),
            changes: Vec::new(),
        }
    }

    pub fn form(&self) -> &SettingsForm {
        &self.form
    }

    pub fn state(&self) -> SaveState {
        self.state
    }

    pub fn status(&self) -> SaveStatus {
        self.status
    }

    pub fn last_accepted(&self) -> Option<&Signature> {
        self.last_accepted.as_ref()
    }

    /// Replace the form with the user's latest edit and schedule a save.
    pub fn edit(&mut self, form: SettingsForm) {
        self.form = form;
        self.notify_changed();
    }

    /// Called on every user edit.
    ///
    /// While a save is in flight the edit is remembered and saved right after
    /// it. While a retry is scheduled the retry carries the edit. Otherwise the
    /// debounce timer is (re)started.
    pub fn notify_changed(&mut self) {
        if self.defer_to_cycle() {
            self.debounce.cancel();
            return;
        }

        self.debounce
            .arm(TimerId::Debounce, self.policy.debounce, &self.events);
        if self.state == SaveState::Idle {
            self.state = SaveState::Pending;
        }
    }

    /// Explicit form submission: save now, skipping the debounce.
    pub fn submit(&mut self) {
        self.save();
    }

    /// The retry action offered with the error indicator.
    pub fn retry(&mut self) {
        tracing::info!("Manual settings save retry");
        self.save();
    }

    /// Start a save cycle unless one is already running.
    pub fn save(&mut self) {
        if self.defer_to_cycle() {
            return;
        }

        self.debounce.cancel();
        if self.state == SaveState::Pending {
            self.state = SaveState::Idle;
        }

        let snapshot = match self.form.snapshot() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::debug!(error = %e, "Save blocked by local validation");
                return;
            }
        };

        self.retry.cancel();
        if self.status == SaveStatus::Error {
            self.set_status(SaveStatus::Idle);
        }
        self.start_attempt(1, snapshot);
    }

    /// A cycle runs from the first attempt until success or the last retry
    /// fails. Returns `true` when one is running and takes over the request.
    fn defer_to_cycle(&mut self) -> bool {
        match self.state {
            SaveState::InFlight { attempt } => {
                tracing::debug!(attempt, "Save in flight, re-save queued");
                self.resave_needed = true;
                true
            }
            SaveState::Retrying { attempt } => {
                // The scheduled attempt snapshots the form when it fires.
                tracing::debug!(attempt, "Retry scheduled, it will send the latest form");
                true
            }
            SaveState::Idle | SaveState::Pending => false,
        }
    }

    fn start_attempt(&mut self, attempt: u32, snapshot: SettingsSnapshot) {
        self.generation = self.generation.wrapping_add(1);
        let generation = self.generation;

        self.state = SaveState::InFlight { attempt };
        self.in_flight = Some(snapshot.signature());
        self.saving_indicator.arm(
            TimerId::SavingIndicator,
            self.policy.saving_indicator_delay,
            &self.events,
        );

        tracing::debug!(attempt, generation, "Saving settings");
        let remote = Arc::clone(&self.remote);
        spawn_request(
            "save_settings",
            &self.events,
            async move { remote.save_settings(&snapshot).await },
            move |result| SyncEvent::SaveFinished { generation, result },
        );
    }

    /// Handle one of this controller's timers firing.
    pub fn on_timer(&mut self, timer: TimerId, generation: u64) {
        match timer {
            TimerId::Debounce => {
                if self.debounce.fire(generation) {
                    self.save();
                }
            }
            TimerId::SaveRetry => {
                if self.retry.fire(generation) {
                    self.run_retry();
                }
            }
            TimerId::SavingIndicator => {
                if self.saving_indicator.fire(generation)
                    && matches!(self.state, SaveState::InFlight { .. })
                {
                    self.set_status(SaveStatus::Saving);
                }
            }
            TimerId::SuccessClear => {
                if self.success_clear.fire(generation) && self.status == SaveStatus::Success {
                    self.set_status(SaveStatus::Idle);
                }
            }
            TimerId::Poll => {}
        }
    }

    fn run_retry(&mut self) {
        let SaveState::Retrying { attempt } = self.state else {
            return;
        };
        match self.form.snapshot() {
            Ok(snapshot) => self.start_attempt(attempt, snapshot),
            Err(e) => {
                // The form became invalid while waiting; the next valid edit saves.
                tracing::debug!(attempt, error = %e, "Retry blocked by local validation");
                self.state = SaveState::Idle;
                self.resave_needed = false;
                self.set_status(SaveStatus::Idle);
            }
        }
    }

    /// Handle the completion of a save attempt.
    pub fn on_save_finished(
        &mut self,
        generation: u64,
        result: Result<(), RemoteError>,
        feed: &mut dyn FeedInvalidator,
    ) {
        let SaveState::InFlight { attempt } = self.state else {
            tracing::debug!(generation, "Ignoring save completion with no save in flight");
            return;
        };
        if generation != self.generation {
            tracing::debug!(
                generation,
                current = self.generation,
                "Ignoring stale save completion"
            );
            return;
        }

        self.saving_indicator.cancel();
        let signature = self.in_flight.take();

        match result {
            Ok(()) => {
                let changed = signature.is_some() && self.last_accepted != signature;
                self.last_accepted = signature;
                self.state = SaveState::Idle;
                tracing::info!(attempt, feed_changed = changed, "Settings saved");

                if changed {
                    feed.invalidate_and_reload();
                }
                self.set_status(SaveStatus::Success);
                self.success_clear.arm(
                    TimerId::SuccessClear,
                    self.policy.success_display,
                    &self.events,
                );
            }
            Err(e) => {
                if let Some(&delay) = self.policy.retry_delays.get(attempt as usize - 1) {
                    tracing::warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Settings save failed, retrying"
                    );
                    self.state = SaveState::Retrying {
                        attempt: attempt + 1,
                    };
                    self.retry.arm(TimerId::SaveRetry, delay, &self.events);
                    self.set_status(SaveStatus::Saving);
                    return;
                }

                tracing::error!(attempts = attempt, error = %e, "Settings save failed, giving up");
                self.state = SaveState::Idle;
                self.set_status(SaveStatus::Error);
            }
        }

        if self.resave_needed {
            self.resave_needed = false;
            self.save();
        }
    }

    fn set_status(&mut self, status: SaveStatus) {
        if self.status == status {
            return;
        }
        if self.status == SaveStatus::Success {
            self.success_clear.cancel();
        }
        self.status = status;
        self.changes.push(ViewChange::SaveStatus(status));
    }

    pub(crate) fn take_changes(&mut self) -> Vec<ViewChange> {
        std::mem::take(&mut self.changes)
    }

    /// Abort every timer; in-flight saves finish unobserved.
    pub fn shutdown(&mut self) {
        self.debounce.cancel();
        self.retry.cancel();
        self.saving_indicator.cancel();
        self.success_clear.cancel();
    }
}
