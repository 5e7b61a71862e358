//! Schedulers that run work on the UI thread.
//!
//! A [`Scheduler`] submits standalone tasks; a [`Worker`] submits tasks that
//! are cancelled as a group when the worker is disposed. Both hand back a
//! [`TaskHandle`] per task.
//!
//! The only implementation is [`UiScheduler`], which maps tasks onto a
//! [`UiHost`](crate::host::UiHost): immediate tasks go to the host queue,
//! delayed and periodic tasks to host timers.
//!
//! # Example
//!
//! ```rust
//! use std::{
//!   sync::{
//!     atomic::{AtomicUsize, Ordering},
//!     Arc,
//!   },
//!   time::Duration,
//! };
//! use rxui::prelude::*;
//!
//! let host = VirtualLoop::new();
//! let scheduler = UiScheduler::new(host.clone());
//! let count = Arc::new(AtomicUsize::new(0));
//!
//! let c_count = count.clone();
//! let task = scheduler.schedule_periodically_direct(
//!   move || {
//!     c_count.fetch_add(1, Ordering::SeqCst);
//!   },
//!   Duration::from_millis(100),
//!   Duration::from_millis(100),
//! );
//!
//! host.advance_by(Duration::from_millis(300));
//! assert_eq!(count.load(Ordering::SeqCst), 3);
//!
//! task.dispose();
//! host.advance_by(Duration::from_millis(500));
//! assert_eq!(count.load(Ordering::SeqCst), 3);
//! ```

use std::time::Duration;

use crate::disposable::{Disposable, DisposableHandle};

mod task;
mod timing;
mod ui_scheduler;
mod worker;

pub use timing::to_timer_millis;
pub use ui_scheduler::{RunOnUi, UiScheduler};
pub use worker::UiWorker;

/// Cancels one scheduled task.
///
/// Disposing before the task started prevents it from running; disposing a
/// periodic task stops further runs. Disposing while the body is running does
/// not interrupt it.
pub type TaskHandle = DisposableHandle;

/// Submits standalone tasks to a thread.
pub trait Scheduler {
  type Worker: Worker;

  /// Runs `task` once, as soon as possible or after `delay`.
  fn schedule_direct<F>(&self, task: F, delay: Option<Duration>) -> TaskHandle
  where
    F: FnOnce() + Send + 'static;

  /// Runs `task` after `initial`, then every `period` until the returned
  /// handle is disposed or the task panics.
  fn schedule_periodically_direct<F>(&self, task: F, initial: Duration, period: Duration)
    -> TaskHandle
  where
    F: FnMut() + Send + 'static;

  /// Creates a worker whose tasks can be cancelled together.
  fn create_worker(&self) -> Self::Worker;
}

/// Submits tasks that belong to a group.
///
/// Disposing the worker cancels every outstanding task and turns later
/// submissions into no-ops that return an already disposed handle.
pub trait Worker: Disposable {
  fn schedule<F>(&self, task: F, delay: Option<Duration>) -> TaskHandle
  where
    F: FnOnce() + Send + 'static;

  fn schedule_periodically<F>(&self, task: F, initial: Duration, period: Duration) -> TaskHandle
  where
    F: FnMut() + Send + 'static;
}
