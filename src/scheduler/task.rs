//! Task objects behind every [`TaskHandle`](super::TaskHandle).
//!
//! Both task kinds keep their cancellation state in a
//! [`DisposableToken`]: whoever retires the token first decides the outcome.
//! For an immediate task that is either the queued job (which then runs the
//! body) or a dispose call (which drops it). A timed task additionally owns a
//! host timer that has to be stopped on every exit path.

use std::{
  panic::{catch_unwind, AssertUnwindSafe},
  sync::{Arc, Mutex, Weak},
};

use once_cell::sync::OnceCell;

use super::ui_scheduler::SchedulerCore;
use crate::{
  config::Runnable,
  disposable::{CompositeDisposable, Disposable, DisposableToken},
  error::{panic_message, UiError},
  host::{TimerId, TimerTick},
  util::lock,
};

/// Implemented by both task kinds so that a worker can treat them alike.
pub(crate) trait UiTask: Disposable + Send + Sync + 'static {
  /// Hands the task to the host. Called once, after the task was registered
  /// with its owner.
  fn start(self: Arc<Self>);
}

// ==================== Owner link ====================

/// Lets a worker task remove itself from the worker's task set.
pub(crate) struct OwnerLink {
  tasks: Weak<CompositeDisposable>,
  id: usize,
}

impl OwnerLink {
  pub(crate) fn new(tasks: &Arc<CompositeDisposable>, id: usize) -> Self {
    Self { tasks: Arc::downgrade(tasks), id }
  }

  fn unlink(self) {
    if let Some(tasks) = self.tasks.upgrade() {
      drop(tasks.remove(self.id));
    }
  }
}

fn unlink(owner: Option<OwnerLink>) {
  if let Some(owner) = owner {
    owner.unlink();
  }
}

/// Runs a task body, reporting a panic instead of unwinding into the host.
/// Returns `false` if the body panicked.
fn run_guarded(core: &SchedulerCore, periodic: bool, body: impl FnOnce()) -> bool {
  match catch_unwind(AssertUnwindSafe(body)) {
    Ok(()) => true,
    Err(payload) => {
      core.config.report(UiError::TaskPanicked {
        scheduler: core.config.name().to_string(),
        message: panic_message(payload.as_ref()),
        periodic,
      });
      false
    }
  }
}

// ==================== ImmediateTask ====================

struct Pending {
  run: Runnable,
  owner: Option<OwnerLink>,
}

/// A task queued on the host's job queue.
pub(crate) struct ImmediateTask {
  core: Arc<SchedulerCore>,
  token: DisposableToken<Pending>,
}

impl ImmediateTask {
  pub(crate) fn new(
    core: Arc<SchedulerCore>, run: Runnable, owner: Option<OwnerLink>,
  ) -> Arc<Self> {
    Arc::new(Self { core, token: DisposableToken::new(Pending { run, owner }) })
  }

  fn run(&self) {
    let Some(Pending { mut run, owner }) = self.token.retire() else {
      return;
    };
    run_guarded(&self.core, false, || run());
    unlink(owner);
  }
}

impl UiTask for ImmediateTask {
  fn start(self: Arc<Self>) {
    let host = self.core.host.clone();
    host.invoke_later(Box::new(move || self.run()));
  }
}

impl Disposable for ImmediateTask {
  fn dispose(&self) {
    if let Some(Pending { run, owner }) = self.token.retire() {
      drop(run);
      unlink(owner);
    }
  }

  #[inline]
  fn is_disposed(&self) -> bool { self.token.is_retired() }
}

// ==================== TimedTask ====================

/// A task driven by a host timer, one-shot or periodic.
pub(crate) struct TimedTask {
  core: Arc<SchedulerCore>,
  token: DisposableToken<Option<OwnerLink>>,
  // Taken out while the body runs so that no lock is held across user code.
  run: Mutex<Option<Runnable>>,
  timer: OnceCell<TimerId>,
  initial_ms: u32,
  period_ms: Option<u32>,
}

impl TimedTask {
  pub(crate) fn new(
    core: Arc<SchedulerCore>, run: Runnable, initial_ms: u32, period_ms: Option<u32>,
    owner: Option<OwnerLink>,
  ) -> Arc<Self> {
    Arc::new(Self {
      core,
      token: DisposableToken::new(owner),
      run: Mutex::new(Some(run)),
      timer: OnceCell::new(),
      initial_ms,
      period_ms,
    })
  }

  fn tick(&self) {
    if self.period_ms.is_some() {
      self.tick_periodic();
    } else {
      self.tick_once();
    }
  }

  fn tick_once(&self) {
    let Some(owner) = self.token.retire() else {
      return;
    };
    self.stop_timer();
    let run = lock(&self.run).take();
    if let Some(mut run) = run {
      run_guarded(&self.core, false, || run());
    }
    unlink(owner);
  }

  fn tick_periodic(&self) {
    if self.token.is_retired() {
      return;
    }
    let run = lock(&self.run).take();
    let Some(mut run) = run else {
      return;
    };
    if !run_guarded(&self.core, true, || run()) {
      drop(run);
      self.finish();
      return;
    }
    *lock(&self.run) = Some(run);
    // Disposed while the body was running.
    if self.token.is_retired() {
      let stale = lock(&self.run).take();
      drop(stale);
    }
  }

  fn stop_timer(&self) {
    if let Some(id) = self.timer.get() {
      self.core.host.stop_timer(*id);
    }
  }

  fn finish(&self) {
    let Some(owner) = self.token.retire() else {
      return;
    };
    self.stop_timer();
    let run = lock(&self.run).take();
    drop(run);
    unlink(owner);
  }
}

impl UiTask for TimedTask {
  fn start(self: Arc<Self>) {
    let host = self.core.host.clone();
    let (initial_ms, period_ms) = (self.initial_ms, self.period_ms);
    let task = self.clone();
    let tick: TimerTick = Arc::new(move || task.tick());
    let id = host.start_timer(initial_ms, period_ms, tick);
    let _ = self.timer.set(id);
    // Disposed before the timer id was recorded.
    if self.token.is_retired() {
      host.stop_timer(id);
    }
  }
}

impl Disposable for TimedTask {
  #[inline]
  fn dispose(&self) { self.finish(); }

  #[inline]
  fn is_disposed(&self) -> bool { self.token.is_retired() }
}
