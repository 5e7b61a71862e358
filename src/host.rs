//! The contract of the UI runtime that owns the UI thread.
//!
//! A UI toolkit exposes two primitives to code running on other threads: a
//! FIFO queue of jobs that its single UI thread drains, and timers that fire on
//! that same thread. [`UiHost`] is that pair. Everything else in the crate
//! (schedulers, workers, the dispatcher) is written against it.
//!
//! Two hosts ship with the crate:
//!
//! - [`VirtualLoop`]: a deterministic host driven by the test, with virtual
//!   time.
//! - [`EventLoop`] (feature `event-loop`): a dedicated thread running a real
//!   job queue and timer wheel.

use std::{sync::Arc, time::Duration};

#[cfg(feature = "event-loop")]
mod event_loop;
mod virtual_loop;

#[cfg(feature = "event-loop")]
pub use event_loop::{EventLoop, EventLoopBuilder, LoopHandle};
pub use virtual_loop::VirtualLoop;

/// A job for the UI thread's queue.
pub type Job = Box<dyn FnOnce() + Send>;

/// The callback a host timer invokes on every firing.
pub type TimerTick = Arc<dyn Fn() + Send + Sync>;

/// Identifies a timer started through [`UiHost::start_timer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

impl TimerId {
  /// Wraps a host-specific timer number.
  #[inline]
  pub const fn new(raw: u64) -> Self { Self(raw) }

  #[inline]
  pub const fn raw(self) -> u64 { self.0 }
}

/// The queue and timers of a single-threaded UI runtime.
///
/// Every job and every timer tick must run on the same thread, in the order
/// the host dequeues them. Jobs submitted from one thread run in submission
/// order.
pub trait UiHost: Send + Sync + 'static {
  /// Appends `job` to the UI thread's queue. Callable from any thread.
  fn invoke_later(&self, job: Job);

  /// Starts a timer that first fires after `initial_ms`, then every
  /// `period_ms` if one is given.
  fn start_timer(&self, initial_ms: u32, period_ms: Option<u32>, tick: TimerTick) -> TimerId;

  /// Stops a timer. Stopping an unknown or already stopped timer is a no-op.
  fn stop_timer(&self, id: TimerId);

  /// Whether the calling thread is the UI thread.
  fn is_ui_thread(&self) -> bool;

  /// The smallest delay the host's timers honour.
  fn timer_resolution(&self) -> Duration { Duration::from_millis(1) }
}

impl<H: UiHost + ?Sized> UiHost for Arc<H> {
  #[inline]
  fn invoke_later(&self, job: Job) { (**self).invoke_later(job) }

  #[inline]
  fn start_timer(&self, initial_ms: u32, period_ms: Option<u32>, tick: TimerTick) -> TimerId {
    (**self).start_timer(initial_ms, period_ms, tick)
  }

  #[inline]
  fn stop_timer(&self, id: TimerId) { (**self).stop_timer(id) }

  #[inline]
  fn is_ui_thread(&self) -> bool { (**self).is_ui_thread() }

  #[inline]
  fn timer_resolution(&self) -> Duration { (**self).timer_resolution() }
}
