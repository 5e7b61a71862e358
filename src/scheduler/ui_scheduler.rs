use std::{
  fmt::{Debug, Formatter},
  future::Future,
  pin::Pin,
  sync::Arc,
  task::{Context, Poll},
  time::Duration,
};

use futures::channel::oneshot::{self, Canceled};
use pin_project_lite::pin_project;

use super::{
  task::{ImmediateTask, OwnerLink, TimedTask, UiTask},
  timing::to_timer_millis,
  Scheduler, TaskHandle, UiWorker,
};
use crate::{
  config::{Runnable, SchedulerConfig},
  disposable::{Disposable, DisposableHandle},
  host::UiHost,
};

/// State shared by a scheduler, its clones and its workers.
pub(crate) struct SchedulerCore {
  pub(crate) host: Arc<dyn UiHost>,
  pub(crate) config: SchedulerConfig,
}

impl SchedulerCore {
  pub(crate) fn immediate(
    self: &Arc<Self>, run: Runnable, owner: Option<OwnerLink>,
  ) -> Arc<ImmediateTask> {
    tracing::trace!(scheduler = self.config.name(), "schedule immediate task");
    ImmediateTask::new(self.clone(), self.config.decorate(run), owner)
  }

  pub(crate) fn timed(
    self: &Arc<Self>, run: Runnable, initial: Duration, period: Option<Duration>,
    owner: Option<OwnerLink>,
  ) -> Arc<TimedTask> {
    let resolution = self.host.timer_resolution();
    let initial_ms = to_timer_millis(initial, resolution);
    let period_ms = period.map(|p| to_timer_millis(p, resolution));
    tracing::trace!(scheduler = self.config.name(), initial_ms, ?period_ms, "schedule timed task");
    TimedTask::new(self.clone(), self.config.decorate(run), initial_ms, period_ms, owner)
  }
}

/// Adapts a one-shot body to the `FnMut` shape every task body shares.
pub(crate) fn once(task: impl FnOnce() + Send + 'static) -> Runnable {
  let mut task = Some(task);
  Box::new(move || {
    if let Some(task) = task.take() {
      task();
    }
  })
}

fn start<T: UiTask>(task: Arc<T>) -> TaskHandle {
  task.clone().start();
  TaskHandle::from_arc(task)
}

// ==================== UiScheduler ====================

/// Runs tasks on the UI thread of a [`UiHost`].
///
/// Cloning is cheap; clones share the host and the configuration.
///
/// ```rust
/// use std::sync::mpsc;
/// use rxui::prelude::*;
///
/// let host = VirtualLoop::new();
/// let config = SchedulerConfig::new().with_name("main");
/// let scheduler = UiScheduler::with_config(host.clone(), config);
/// assert_eq!(scheduler.name(), "main");
///
/// let (tx, rx) = mpsc::channel();
/// let c_scheduler = scheduler.clone();
/// scheduler.schedule_direct(move || tx.send(c_scheduler.is_ui_thread()).unwrap(), None);
/// host.run_pending();
/// assert_eq!(rx.recv().unwrap(), true);
/// ```
#[derive(Clone)]
pub struct UiScheduler {
  core: Arc<SchedulerCore>,
}

impl UiScheduler {
  /// A scheduler with the default configuration.
  pub fn new(host: impl UiHost) -> Self { Self::with_config(host, SchedulerConfig::default()) }

  pub fn with_config(host: impl UiHost, config: SchedulerConfig) -> Self {
    Self::from_arc(Arc::new(host), config)
  }

  /// Builds a scheduler over an already shared host.
  pub fn from_arc(host: Arc<dyn UiHost>, config: SchedulerConfig) -> Self {
    Self { core: Arc::new(SchedulerCore { host, config }) }
  }

  #[inline]
  pub fn name(&self) -> &str { self.core.config.name() }

  #[inline]
  pub fn config(&self) -> &SchedulerConfig { &self.core.config }

  /// Whether the calling thread is this scheduler's UI thread.
  #[inline]
  pub fn is_ui_thread(&self) -> bool { self.core.host.is_ui_thread() }

  /// Runs `f` on the UI thread and resolves with its result.
  ///
  /// Resolves to `Err(Canceled)` if the task was cancelled through
  /// [`RunOnUi::cancel`] before it ran, or if `f` panicked.
  ///
  /// ```rust
  /// use futures::executor::block_on;
  /// use rxui::prelude::*;
  ///
  /// let host = VirtualLoop::new();
  /// let scheduler = UiScheduler::new(host.clone());
  /// let answer = scheduler.run_on_ui(|| 6 * 7);
  /// host.run_pending();
  /// assert_eq!(block_on(answer), Ok(42));
  /// ```
  pub fn run_on_ui<F, R>(&self, f: F) -> RunOnUi<R>
  where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
  {
    let (sender, receiver) = oneshot::channel();
    let handle = self.schedule_direct(
      move || {
        let _ = sender.send(f());
      },
      None,
    );
    RunOnUi { receiver, handle }
  }
}

impl Scheduler for UiScheduler {
  type Worker = UiWorker;

  fn schedule_direct<F>(&self, task: F, delay: Option<Duration>) -> TaskHandle
  where
    F: FnOnce() + Send + 'static,
  {
    match delay {
      None => start(self.core.immediate(once(task), None)),
      Some(delay) => start(self.core.timed(once(task), delay, None, None)),
    }
  }

  fn schedule_periodically_direct<F>(&self, task: F, initial: Duration, period: Duration)
    -> TaskHandle
  where
    F: FnMut() + Send + 'static,
  {
    start(self.core.timed(Box::new(task), initial, Some(period), None))
  }

  fn create_worker(&self) -> UiWorker { UiWorker::new(self.core.clone()) }
}

impl Debug for UiScheduler {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("UiScheduler")
      .field("name", &self.core.config.name())
      .finish()
  }
}

// ==================== RunOnUi ====================

pin_project! {
  /// The future returned by [`UiScheduler::run_on_ui`].
  #[must_use = "futures do nothing unless polled"]
  pub struct RunOnUi<R> {
    #[pin]
    receiver: oneshot::Receiver<R>,
    handle: TaskHandle,
  }
}

impl<R> RunOnUi<R> {
  /// Cancels the task if it has not started yet.
  pub fn cancel(&self) { self.handle.dispose(); }

  /// The handle of the underlying task.
  pub fn handle(&self) -> &DisposableHandle { &self.handle }
}

impl<R> Future for RunOnUi<R> {
  type Output = Result<R, Canceled>;

  fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
    self.project().receiver.poll(cx)
  }
}

#[cfg(test)]
mod tests {
  use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Mutex,
  };

  use futures::executor::block_on;

  use super::*;
  use crate::{error::UiError, host::VirtualLoop};

  fn counter() -> (Arc<AtomicUsize>, impl FnMut() + Send + Clone + 'static) {
    let count = Arc::new(AtomicUsize::new(0));
    let c_count = count.clone();
    (count, move || {
      c_count.fetch_add(1, Ordering::SeqCst);
    })
  }

  fn collecting_scheduler(host: &VirtualLoop) -> (UiScheduler, Arc<Mutex<Vec<UiError>>>) {
    let errors = Arc::new(Mutex::new(Vec::new()));
    let c_errors = errors.clone();
    let config = SchedulerConfig::new()
      .with_name("test-ui")
      .with_error_handler(move |err| c_errors.lock().unwrap().push(err.clone()));
    (UiScheduler::with_config(host.clone(), config), errors)
  }

  #[test]
  fn direct_task_runs_once_on_ui_thread() {
    let host = VirtualLoop::new();
    let scheduler = UiScheduler::new(host.clone());
    let (count, mut inc) = counter();
    let handle = scheduler.schedule_direct(move || inc(), None);
    assert_eq!(count.load(Ordering::SeqCst), 0);
    assert!(!handle.is_disposed());

    host.run_pending();
    assert_eq!(count.load(Ordering::SeqCst), 1);
    assert!(handle.is_disposed());
  }

  #[test]
  fn disposed_before_start_never_runs() {
    let host = VirtualLoop::new();
    let scheduler = UiScheduler::new(host.clone());
    let (count, mut inc) = counter();
    let handle = scheduler.schedule_direct(move || inc(), None);
    handle.dispose();
    handle.dispose();
    host.run_pending();
    assert_eq!(count.load(Ordering::SeqCst), 0);
  }

  #[test]
  fn delayed_task_waits_for_its_timer() {
    let host = VirtualLoop::new();
    let scheduler = UiScheduler::new(host.clone());
    let (count, mut inc) = counter();
    scheduler.schedule_direct(move || inc(), Some(Duration::from_millis(100)));

    host.advance_by(Duration::from_millis(99));
    assert_eq!(count.load(Ordering::SeqCst), 0);
    host.advance_by(Duration::from_millis(1));
    assert_eq!(count.load(Ordering::SeqCst), 1);
    host.advance_by(Duration::from_millis(500));
    assert_eq!(count.load(Ordering::SeqCst), 1);
    assert_eq!(host.active_timers(), 0);
  }

  #[test]
  fn disposing_delayed_task_stops_timer() {
    let host = VirtualLoop::new();
    let scheduler = UiScheduler::new(host.clone());
    let (count, mut inc) = counter();
    let handle = scheduler.schedule_direct(move || inc(), Some(Duration::from_millis(50)));
    assert_eq!(host.active_timers(), 1);
    handle.dispose();
    assert_eq!(host.active_timers(), 0);
    host.advance_by(Duration::from_millis(100));
    assert_eq!(count.load(Ordering::SeqCst), 0);
  }

  #[test]
  fn periodic_runs_until_disposed() {
    let host = VirtualLoop::new();
    let scheduler = UiScheduler::new(host.clone());
    let (count, inc) = counter();
    let handle = scheduler.schedule_periodically_direct(
      inc,
      Duration::from_millis(100),
      Duration::from_millis(100),
    );
    host.advance_by(Duration::from_millis(300));
    assert_eq!(count.load(Ordering::SeqCst), 3);

    handle.dispose();
    host.advance_by(Duration::from_millis(500));
    assert_eq!(count.load(Ordering::SeqCst), 3);
    assert_eq!(host.active_timers(), 0);
  }

  #[test]
  fn periodic_may_dispose_itself() {
    let host = VirtualLoop::new();
    let scheduler = UiScheduler::new(host.clone());
    let count = Arc::new(AtomicUsize::new(0));
    let own: Arc<Mutex<Option<TaskHandle>>> = Arc::default();
    let (c_count, c_own) = (count.clone(), own.clone());
    let handle = scheduler.schedule_periodically_direct(
      move || {
        if c_count.fetch_add(1, Ordering::SeqCst) == 1 {
          if let Some(own) = c_own.lock().unwrap().as_ref() {
            own.dispose();
          }
        }
      },
      Duration::from_millis(10),
      Duration::from_millis(10),
    );
    *own.lock().unwrap() = Some(handle.clone());

    host.advance_by(Duration::from_millis(100));
    assert_eq!(count.load(Ordering::SeqCst), 2);
    assert!(handle.is_disposed());
  }

  #[test]
  fn periodic_panic_stops_and_reports() {
    let host = VirtualLoop::new();
    let (scheduler, errors) = collecting_scheduler(&host);
    let count = Arc::new(AtomicUsize::new(0));
    let c_count = count.clone();
    let handle = scheduler.schedule_periodically_direct(
      move || {
        if c_count.fetch_add(1, Ordering::SeqCst) == 1 {
          panic!("second run fails");
        }
      },
      Duration::from_millis(10),
      Duration::from_millis(10),
    );

    host.advance_by(Duration::from_millis(100));
    assert_eq!(count.load(Ordering::SeqCst), 2);
    assert!(handle.is_disposed());
    assert_eq!(host.active_timers(), 0);
    assert_eq!(
      *errors.lock().unwrap(),
      vec![UiError::TaskPanicked {
        scheduler: "test-ui".into(),
        message: "second run fails".into(),
        periodic: true,
      }]
    );
  }

  #[test]
  fn one_shot_panic_is_reported() {
    let host = VirtualLoop::new();
    let (scheduler, errors) = collecting_scheduler(&host);
    scheduler.schedule_direct(|| panic!("boom"), None);
    let (count, mut inc) = counter();
    scheduler.schedule_direct(move || inc(), None);
    host.run_pending();
    assert_eq!(count.load(Ordering::SeqCst), 1);
    assert_eq!(errors.lock().unwrap()[0].as_label(), "task_panicked");
  }

  #[test]
  fn delays_are_clamped_to_resolution() {
    let host = VirtualLoop::new();
    let scheduler = UiScheduler::new(host.clone());
    let (count, mut inc) = counter();
    scheduler.schedule_direct(move || inc(), Some(Duration::ZERO));
    host.run_pending();
    assert_eq!(count.load(Ordering::SeqCst), 0);
    host.advance_by(Duration::from_millis(1));
    assert_eq!(count.load(Ordering::SeqCst), 1);
  }

  #[test]
  fn on_schedule_decorates_every_task() {
    let host = VirtualLoop::new();
    let decorated = Arc::new(AtomicUsize::new(0));
    let c_decorated = decorated.clone();
    let config = SchedulerConfig::new().with_on_schedule(move |mut task| {
      let decorated = c_decorated.clone();
      Box::new(move || {
        decorated.fetch_add(1, Ordering::SeqCst);
        task();
      })
    });
    let scheduler = UiScheduler::with_config(host.clone(), config);
    let (count, inc) = counter();
    let mut c_inc = inc.clone();
    scheduler.schedule_direct(move || c_inc(), None);
    let periodic = scheduler.schedule_periodically_direct(
      inc,
      Duration::from_millis(10),
      Duration::from_millis(10),
    );
    host.advance_by(Duration::from_millis(20));
    periodic.dispose();
    assert_eq!(count.load(Ordering::SeqCst), 3);
    assert_eq!(decorated.load(Ordering::SeqCst), 3);
  }

  #[test]
  fn run_on_ui_resolves() {
    let host = VirtualLoop::new();
    let scheduler = UiScheduler::new(host.clone());
    let c_scheduler = scheduler.clone();
    let fut = scheduler.run_on_ui(move || c_scheduler.is_ui_thread());
    host.run_pending();
    assert_eq!(block_on(fut), Ok(true));
  }

  #[test]
  fn run_on_ui_cancelled() {
    let host = VirtualLoop::new();
    let scheduler = UiScheduler::new(host.clone());
    let fut = scheduler.run_on_ui(|| 1);
    fut.cancel();
    assert!(fut.handle().is_disposed());
    host.run_pending();
    assert_eq!(block_on(fut), Err(Canceled));
  }

  #[test]
  fn run_on_ui_panic_cancels() {
    let host = VirtualLoop::new();
    let (scheduler, errors) = collecting_scheduler(&host);
    let fut = scheduler.run_on_ui(|| -> i32 { panic!("no answer") });
    host.run_pending();
    assert_eq!(block_on(fut), Err(Canceled));
    assert_eq!(errors.lock().unwrap().len(), 1);
  }
}
