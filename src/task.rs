//! Background task plumbing for the sync loop.
//!
//! Engine logic never runs concurrently with itself. The only work done off
//! the event loop is a single request or a single timer sleep per spawned
//! task, which reports back as a [`SyncEvent`]. Each event carries the
//! generation it was issued under, so events from superseded timers or
//! cancelled requests can be recognised and ignored.

use crate::feed::ItemPage;
use crate::remote::RemoteError;
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Capacity of the loop's event channel.
pub(crate) const EVENT_CHANNEL_CAPACITY: usize = 64;

pub(crate) type EventSender = mpsc::Sender<SyncEvent>;

/// Timers owned by the controllers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerId {
    /// Quiet period after the last settings edit.
    Debounce,
    /// Delay before the next save attempt.
    SaveRetry,
    /// Delay before an outstanding save shows the saving indicator.
    SavingIndicator,
    /// Lifetime of the success indicator.
    SuccessClear,
    /// Next background poll (regular or retry).
    Poll,
}

impl TimerId {
    pub(crate) fn is_settings_timer(self) -> bool {
        !matches!(self, TimerId::Poll)
    }
}

/// Completion events delivered to the dashboard loop.
#[derive(Debug)]
pub enum SyncEvent {
    Timer {
        timer: TimerId,
        generation: u64,
    },
    SaveFinished {
        generation: u64,
        result: Result<(), RemoteError>,
    },
    PageFinished {
        generation: u64,
        page: u32,
        is_reset: bool,
        result: Result<ItemPage, RemoteError>,
    },
    PollFinished {
        generation: u64,
        result: Result<ItemPage, RemoteError>,
    },
}

/// A restartable one-shot timer.
///
/// Arming always aborts the previous sleep first, and [`TimerSlot::fire`]
/// rejects firings from earlier armings that were already queued.
#[derive(Debug, Default)]
pub(crate) struct TimerSlot {
    handle: Option<JoinHandle<()>>,
    generation: u64,
}

impl TimerSlot {
    pub(crate) fn arm(&mut self, timer: TimerId, delay: Duration, tx: &EventSender) {
        self.cancel();
        self.generation = self.generation.wrapping_add(1);
        let generation = self.generation;
        let tx = tx.clone();
        self.handle = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(e) = tx.send(SyncEvent::Timer { timer, generation }).await {
                tracing::warn!(error = %e, ?timer, "Timer event dropped (loop stopped)");
            }
        }));
    }

    pub(crate) fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    pub(crate) fn is_armed(&self) -> bool {
        self.handle.is_some()
    }

    /// Accept a firing if it belongs to the current arming, disarming the slot.
    pub(crate) fn fire(&mut self, generation: u64) -> bool {
        if self.handle.is_some() && generation == self.generation {
            self.handle = None;
            true
        } else {
            false
        }
    }
}

impl Drop for TimerSlot {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Wraps a future to catch panics and convert them to errors.
pub(crate) async fn catch_task_panic<F, T>(future: F) -> Result<T, String>
where
    F: Future<Output = T>,
{
    AssertUnwindSafe(future)
        .catch_unwind()
        .await
        .map_err(|panic| {
            if let Some(s) = panic.downcast_ref::<&'static str>() {
                s.to_string()
            } else if let Some(s) = panic.downcast_ref::<String>() {
                s.clone()
            } else {
                format!("Unknown panic: {:?}", (*panic).type_id())
            }
        })
}

/// Run one remote request in the background and deliver its outcome.
///
/// A panicking request is reported as [`RemoteError::TaskPanicked`] through
/// the same completion event, so the issuing lifecycle always releases its
/// single-flight slot.
pub(crate) fn spawn_request<T, Fut, F>(
    task: &'static str,
    tx: &EventSender,
    request: Fut,
    finish: F,
) -> JoinHandle<()>
where
    T: Send + 'static,
    Fut: Future<Output = Result<T, RemoteError>> + Send + 'static,
    F: FnOnce(Result<T, RemoteError>) -> SyncEvent + Send + 'static,
{
    let tx = tx.clone();
    tokio::spawn(async move {
        let result = match catch_task_panic(request).await {
            Ok(result) => result,
            Err(panic_msg) => {
                tracing::error!(task, error = %panic_msg, "Background task panicked");
                Err(RemoteError::TaskPanicked(panic_msg))
            }
        };
        if let Err(e) = tx.send(finish(result)).await {
            tracing::warn!(task, error = %e, "Channel send failed (receiver dropped)");
        }
    })
}
