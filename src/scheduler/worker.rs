use std::{
  fmt::{Debug, Formatter},
  sync::Arc,
  time::Duration,
};

use super::{
  task::{OwnerLink, UiTask},
  ui_scheduler::{once, SchedulerCore},
  TaskHandle, Worker,
};
use crate::{
  config::Runnable,
  disposable::{CompositeDisposable, Disposable, SharedDisposable},
};

/// A group of UI-thread tasks that can be cancelled together.
///
/// Every outstanding task is tracked in a [`CompositeDisposable`]; a task
/// removes itself when it completes, is disposed or fails. Disposing the
/// worker cancels what is left and refuses later submissions.
///
/// Dropping a worker does not dispose it.
///
/// ```rust
/// use std::time::Duration;
/// use rxui::prelude::*;
///
/// let host = VirtualLoop::new();
/// let worker = UiScheduler::new(host.clone()).create_worker();
/// let pending = worker.schedule(|| unreachable!(), Some(Duration::from_millis(10)));
///
/// worker.dispose();
/// assert!(pending.is_disposed());
/// assert!(worker.schedule(|| unreachable!(), None).is_disposed());
/// host.advance_by(Duration::from_millis(50));
/// ```
pub struct UiWorker {
  core: Arc<SchedulerCore>,
  tasks: Arc<CompositeDisposable>,
}

impl UiWorker {
  pub(crate) fn new(core: Arc<SchedulerCore>) -> Self {
    Self { core, tasks: Arc::new(CompositeDisposable::new()) }
  }

  /// Number of tasks that have been submitted and have not finished yet.
  pub fn pending(&self) -> usize { self.tasks.len() }

  fn submit<T>(&self, build: impl FnOnce(OwnerLink) -> Arc<T>) -> TaskHandle
  where
    T: UiTask,
  {
    let Some(id) = self.tasks.reserve_id() else {
      return TaskHandle::disposed();
    };
    let task = build(OwnerLink::new(&self.tasks, id));
    let shared: SharedDisposable = task.clone();
    if self.tasks.insert(id, shared).is_err() {
      // Disposed between reserving the id and storing the task.
      task.dispose();
      return TaskHandle::disposed();
    }
    task.clone().start();
    TaskHandle::from_arc(task)
  }

  fn submit_timed(&self, run: Runnable, initial: Duration, period: Option<Duration>) -> TaskHandle {
    self.submit(|owner| self.core.timed(run, initial, period, Some(owner)))
  }
}

impl Worker for UiWorker {
  fn schedule<F>(&self, task: F, delay: Option<Duration>) -> TaskHandle
  where
    F: FnOnce() + Send + 'static,
  {
    if self.tasks.is_disposed() {
      return TaskHandle::disposed();
    }
    match delay {
      None => self.submit(|owner| self.core.immediate(once(task), Some(owner))),
      Some(delay) => self.submit_timed(once(task), delay, None),
    }
  }

  fn schedule_periodically<F>(&self, task: F, initial: Duration, period: Duration) -> TaskHandle
  where
    F: FnMut() + Send + 'static,
  {
    if self.tasks.is_disposed() {
      return TaskHandle::disposed();
    }
    self.submit_timed(Box::new(task), initial, Some(period))
  }
}

impl Disposable for UiWorker {
  fn dispose(&self) {
    if !self.tasks.is_disposed() {
      tracing::debug!(
        scheduler = self.core.config.name(),
        pending = self.tasks.len(),
        "dispose worker"
      );
    }
    self.tasks.dispose();
  }

  #[inline]
  fn is_disposed(&self) -> bool { self.tasks.is_disposed() }
}

impl Debug for UiWorker {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("UiWorker")
      .field("scheduler", &self.core.config.name())
      .field("tasks", &self.tasks)
      .finish()
  }
}
