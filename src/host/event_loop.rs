//! A UI host backed by a dedicated thread.
//!
//! [`EventLoop`] owns one thread that drains a command channel and a timer
//! queue, the way a toolkit's event dispatch thread does. It is the reference
//! host for applications that have no toolkit of their own and for tests
//! that need real time.
//!
//! ```rust
//! use rxui::host::{EventLoop, UiHost};
//!
//! let event_loop = EventLoop::builder().name("app-ui").spawn().unwrap();
//! let handle = event_loop.handle();
//! let (tx, rx) = crossbeam_channel::bounded(1);
//! let c_handle = handle.clone();
//! handle.invoke_later(Box::new(move || tx.send(c_handle.is_ui_thread()).unwrap()));
//! assert!(rx.recv().unwrap());
//! event_loop.shutdown();
//! ```

use std::{
  cmp::Reverse,
  collections::{BinaryHeap, HashMap},
  fmt::{Debug, Formatter},
  panic::{catch_unwind, AssertUnwindSafe},
  sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
  },
  thread::{self, JoinHandle, ThreadId},
  time::{Duration, Instant},
};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use once_cell::sync::OnceCell;

use super::{Job, TimerId, TimerTick, UiHost};
use crate::error::{self, panic_message, LoopError, UiError};

enum Command {
  Invoke(Job),
  StartTimer {
    id: TimerId,
    at: Instant,
    period: Option<Duration>,
    tick: TimerTick,
  },
  StopTimer(TimerId),
  Shutdown,
}

// ==================== Builder ====================

/// Configures and spawns an [`EventLoop`].
#[derive(Debug, Clone)]
pub struct EventLoopBuilder {
  name: String,
}

impl Default for EventLoopBuilder {
  fn default() -> Self { Self { name: String::from("rxui-event-loop") } }
}

impl EventLoopBuilder {
  /// Names the loop thread.
  pub fn name(mut self, name: impl Into<String>) -> Self {
    self.name = name.into();
    self
  }

  /// Spawns the loop thread.
  pub fn spawn(self) -> Result<EventLoop, LoopError> {
    let (sender, receiver) = crossbeam_channel::unbounded();
    let ui_thread = Arc::new(OnceCell::new());
    let c_ui_thread = ui_thread.clone();
    let loop_name = self.name.clone();
    let thread = thread::Builder::new()
      .name(self.name.clone())
      .spawn(move || {
        let _ = c_ui_thread.set(thread::current().id());
        tracing::debug!(name = %loop_name, "event loop started");
        run(&loop_name, receiver);
        tracing::debug!(name = %loop_name, "event loop stopped");
      })
      .map_err(|source| LoopError::Spawn { name: self.name.clone(), source })?;

    Ok(EventLoop {
      handle: LoopHandle {
        shared: Arc::new(Shared {
          name: self.name,
          sender,
          ui_thread,
          next_timer: AtomicU64::new(0),
        }),
      },
      thread: Some(thread),
    })
  }
}

// ==================== EventLoop ====================

/// Owns the loop thread. Dropping it shuts the loop down.
pub struct EventLoop {
  handle: LoopHandle,
  thread: Option<JoinHandle<()>>,
}

impl EventLoop {
  pub fn builder() -> EventLoopBuilder { EventLoopBuilder::default() }

  /// A cloneable handle implementing [`UiHost`] for this loop.
  pub fn handle(&self) -> LoopHandle { self.handle.clone() }

  /// Stops the loop after the commands already queued and waits for the
  /// thread to exit. Jobs submitted afterwards are dropped.
  pub fn shutdown(mut self) { self.stop(); }

  fn stop(&mut self) {
    let _ = self.handle.shared.sender.send(Command::Shutdown);
    if let Some(thread) = self.thread.take() {
      // A job may own the loop; it cannot wait for itself.
      if thread.thread().id() != thread::current().id() {
        let _ = thread.join();
      }
    }
  }
}

impl Drop for EventLoop {
  fn drop(&mut self) { self.stop(); }
}

impl Debug for EventLoop {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("EventLoop")
      .field("name", &self.handle.shared.name)
      .field("running", &self.thread.is_some())
      .finish()
  }
}

// ==================== LoopHandle ====================

struct Shared {
  name: String,
  sender: Sender<Command>,
  ui_thread: Arc<OnceCell<ThreadId>>,
  next_timer: AtomicU64,
}

/// Submits work to an [`EventLoop`] from any thread.
#[derive(Clone)]
pub struct LoopHandle {
  shared: Arc<Shared>,
}

impl LoopHandle {
  /// The loop thread's name.
  pub fn name(&self) -> &str { &self.shared.name }

  fn send(&self, command: Command) {
    if self.shared.sender.send(command).is_err() {
      tracing::warn!(name = %self.shared.name, "event loop has shut down, dropping command");
    }
  }
}

impl UiHost for LoopHandle {
  fn invoke_later(&self, job: Job) { self.send(Command::Invoke(job)); }

  fn start_timer(&self, initial_ms: u32, period_ms: Option<u32>, tick: TimerTick) -> TimerId {
    let id = TimerId::new(self.shared.next_timer.fetch_add(1, Ordering::Relaxed));
    let at = Instant::now() + Duration::from_millis(u64::from(initial_ms));
    let period = period_ms.map(|ms| Duration::from_millis(u64::from(ms.max(1))));
    self.send(Command::StartTimer { id, at, period, tick });
    id
  }

  fn stop_timer(&self, id: TimerId) { self.send(Command::StopTimer(id)); }

  fn is_ui_thread(&self) -> bool { self.shared.ui_thread.get() == Some(&thread::current().id()) }
}

impl Debug for LoopHandle {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("LoopHandle")
      .field("name", &self.shared.name)
      .finish()
  }
}

// ==================== Loop ====================

#[derive(Default)]
struct TimerQueue {
  heap: BinaryHeap<Reverse<(Instant, u64, TimerId)>>,
  entries: HashMap<TimerId, (Option<Duration>, TimerTick)>,
  seq: u64,
}

impl TimerQueue {
  fn push(&mut self, at: Instant, id: TimerId) {
    self.seq += 1;
    self.heap.push(Reverse((at, self.seq, id)));
  }

  fn start(&mut self, id: TimerId, at: Instant, period: Option<Duration>, tick: TimerTick) {
    self.entries.insert(id, (period, tick));
    self.push(at, id);
  }

  fn stop(&mut self, id: TimerId) { self.entries.remove(&id); }

  fn next_deadline(&self) -> Option<Instant> { self.heap.peek().map(|Reverse((at, ..))| *at) }

  /// Pops the next live timer due at `now`. A periodic timer is re-armed at
  /// its next slot, or one period from `now` if it fell behind.
  fn pop_due(&mut self, now: Instant) -> Option<TimerTick> {
    while let Some(Reverse((at, _, id))) = self.heap.peek().copied() {
      if at > now {
        return None;
      }
      self.heap.pop();
      let (period, tick) = match self.entries.get(&id) {
        Some((period, tick)) => (*period, tick.clone()),
        None => continue,
      };
      match period {
        Some(period) => {
          let next = at + period;
          self.push(if next > now { next } else { now + period }, id);
        }
        None => {
          self.entries.remove(&id);
        }
      }
      return Some(tick);
    }
    None
  }
}

fn run(name: &str, receiver: Receiver<Command>) {
  let mut timers = TimerQueue::default();
  loop {
    let command = match timers.next_deadline() {
      Some(deadline) => match receiver.recv_deadline(deadline) {
        Ok(command) => Some(command),
        Err(RecvTimeoutError::Timeout) => None,
        Err(RecvTimeoutError::Disconnected) => return,
      },
      None => match receiver.recv() {
        Ok(command) => Some(command),
        Err(_) => return,
      },
    };
    match command {
      Some(Command::Invoke(job)) => guarded(name, job),
      Some(Command::StartTimer { id, at, period, tick }) => timers.start(id, at, period, tick),
      Some(Command::StopTimer(id)) => timers.stop(id),
      Some(Command::Shutdown) => return,
      None => {}
    }
    let now = Instant::now();
    while let Some(tick) = timers.pop_due(now) {
      guarded(name, move || tick());
    }
  }
}

// Keeps the loop alive when a raw job panics.
fn guarded(name: &str, job: impl FnOnce()) {
  if let Err(payload) = catch_unwind(AssertUnwindSafe(job)) {
    error::on_error(UiError::TaskPanicked {
      scheduler: name.to_string(),
      message: panic_message(payload.as_ref()),
      periodic: false,
    });
  }
}
