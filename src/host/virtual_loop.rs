//! A deterministic host with virtual time.
//!
//! Nothing runs until the test drives the loop: [`VirtualLoop::run_pending`]
//! drains the job queue, [`VirtualLoop::advance_by`] moves virtual time
//! forward and fires every timer that falls due on the way, in deadline
//! order. The thread that drives the loop is its UI thread.
//!
//! ```rust
//! use std::{
//!   sync::{
//!     atomic::{AtomicUsize, Ordering},
//!     Arc,
//!   },
//!   time::Duration,
//! };
//! use rxui::host::{UiHost, VirtualLoop};
//!
//! let host = VirtualLoop::new();
//! let fired = Arc::new(AtomicUsize::new(0));
//! let c_fired = fired.clone();
//! host.start_timer(100, Some(100), Arc::new(move || {
//!   c_fired.fetch_add(1, Ordering::SeqCst);
//! }));
//!
//! host.advance_by(Duration::from_millis(350));
//! assert_eq!(fired.load(Ordering::SeqCst), 3);
//! assert_eq!(host.now(), Duration::from_millis(350));
//! ```

use std::{
  cmp::Reverse,
  collections::{BinaryHeap, HashMap, VecDeque},
  fmt::{Debug, Formatter},
  sync::{Arc, Mutex},
  thread::{self, ThreadId},
  time::Duration,
};

use super::{Job, TimerId, TimerTick, UiHost};
use crate::util::lock;

// ==================== Internal State ====================

struct State {
  now: Duration,
  jobs: VecDeque<Job>,
  // Min-heap on (deadline, seq): earlier first, then FIFO.
  timers: BinaryHeap<Reverse<(Duration, u64, TimerId)>>,
  entries: HashMap<TimerId, TimerEntry>,
  next_id: u64,
  next_seq: u64,
  ui_thread: ThreadId,
}

struct TimerEntry {
  period: Option<Duration>,
  tick: TimerTick,
}

enum Step {
  Job(Job),
  Tick(TimerTick),
}

impl State {
  fn push_timer(&mut self, deadline: Duration, id: TimerId) {
    let seq = self.next_seq;
    self.next_seq += 1;
    self.timers.push(Reverse((deadline, seq, id)));
  }

  /// Pops the earliest live timer due at or before `limit` and advances the
  /// clock to its deadline. Periodic timers are re-armed before they fire.
  fn pop_due(&mut self, limit: Duration) -> Option<TimerTick> {
    while let Some(Reverse((deadline, _, id))) = self.timers.peek().copied() {
      if deadline > limit {
        return None;
      }
      self.timers.pop();
      // Stopped timers leave their heap entry behind.
      let (tick, period) = match self.entries.get(&id) {
        Some(entry) => (entry.tick.clone(), entry.period),
        None => continue,
      };
      self.now = self.now.max(deadline);
      match period {
        Some(period) => self.push_timer(deadline + period, id),
        None => {
          self.entries.remove(&id);
        }
      }
      return Some(tick);
    }
    None
  }
}

// ==================== VirtualLoop ====================

/// A UI host whose thread is the test thread and whose clock is virtual.
///
/// Clones share the same queue and clock.
#[derive(Clone)]
pub struct VirtualLoop {
  state: Arc<Mutex<State>>,
}

impl Default for VirtualLoop {
  fn default() -> Self { Self::new() }
}

impl VirtualLoop {
  /// Creates an idle loop at virtual time zero. The calling thread is its UI
  /// thread until another thread drives it.
  pub fn new() -> Self {
    Self {
      state: Arc::new(Mutex::new(State {
        now: Duration::ZERO,
        jobs: VecDeque::new(),
        timers: BinaryHeap::new(),
        entries: HashMap::new(),
        next_id: 0,
        next_seq: 0,
        ui_thread: thread::current().id(),
      })),
    }
  }

  /// The current virtual time.
  pub fn now(&self) -> Duration { lock(&self.state).now }

  /// Number of queued jobs that have not run yet.
  pub fn pending_jobs(&self) -> usize { lock(&self.state).jobs.len() }

  /// Number of timers that have been started and not stopped or expired.
  pub fn active_timers(&self) -> usize { lock(&self.state).entries.len() }

  /// Runs queued jobs, including jobs they enqueue, and timers due at the
  /// current time. Returns how many callbacks ran.
  pub fn run_pending(&self) -> usize {
    let now = self.claim_thread();
    self.drain_until(now)
  }

  /// Advances virtual time by `duration`, running queued jobs and firing
  /// every timer that falls due, in deadline order. Returns how many
  /// callbacks ran.
  pub fn advance_by(&self, duration: Duration) -> usize {
    let target = self.claim_thread() + duration;
    let ran = self.drain_until(target);
    let mut state = lock(&self.state);
    state.now = state.now.max(target);
    ran
  }

  fn claim_thread(&self) -> Duration {
    let mut state = lock(&self.state);
    state.ui_thread = thread::current().id();
    state.now
  }

  fn drain_until(&self, limit: Duration) -> usize {
    let mut ran = 0;
    loop {
      let step = {
        let mut state = lock(&self.state);
        if let Some(job) = state.jobs.pop_front() {
          Step::Job(job)
        } else if let Some(tick) = state.pop_due(limit) {
          Step::Tick(tick)
        } else {
          break;
        }
      };
      match step {
        Step::Job(job) => job(),
        Step::Tick(tick) => tick(),
      }
      ran += 1;
    }
    ran
  }
}

impl UiHost for VirtualLoop {
  fn invoke_later(&self, job: Job) { lock(&self.state).jobs.push_back(job); }

  fn start_timer(&self, initial_ms: u32, period_ms: Option<u32>, tick: TimerTick) -> TimerId {
    let mut state = lock(&self.state);
    let id = TimerId::new(state.next_id);
    state.next_id += 1;
    let period = period_ms.map(|ms| Duration::from_millis(u64::from(ms.max(1))));
    state.entries.insert(id, TimerEntry { period, tick });
    let deadline = state.now + Duration::from_millis(u64::from(initial_ms));
    state.push_timer(deadline, id);
    id
  }

  fn stop_timer(&self, id: TimerId) { lock(&self.state).entries.remove(&id); }

  fn is_ui_thread(&self) -> bool { lock(&self.state).ui_thread == thread::current().id() }
}

impl Debug for VirtualLoop {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    let state = lock(&self.state);
    f.debug_struct("VirtualLoop")
      .field("now", &state.now)
      .field("pending_jobs", &state.jobs.len())
      .field("active_timers", &state.entries.len())
      .finish()
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Mutex;

  use super::*;

  fn recorder() -> (Arc<Mutex<Vec<&'static str>>>, impl Fn(&'static str) -> Job) {
    let log = Arc::new(Mutex::new(Vec::new()));
    let c_log = log.clone();
    let job = move |label: &'static str| -> Job {
      let log = c_log.clone();
      Box::new(move || log.lock().unwrap().push(label))
    };
    (log, job)
  }

  #[test]
  fn jobs_run_fifo_and_only_when_driven() {
    let host = VirtualLoop::new();
    let (log, job) = recorder();
    host.invoke_later(job("a"));
    host.invoke_later(job("b"));
    assert_eq!(host.pending_jobs(), 2);
    assert!(log.lock().unwrap().is_empty());

    assert_eq!(host.run_pending(), 2);
    assert_eq!(*log.lock().unwrap(), vec!["a", "b"]);
  }

  #[test]
  fn jobs_enqueued_by_jobs_run_in_same_drain() {
    let host = VirtualLoop::new();
    let (log, job) = recorder();
    let c_host = host.clone();
    let inner = job("inner");
    let outer = job("outer");
    host.invoke_later(Box::new(move || {
      outer();
      c_host.invoke_later(inner);
    }));
    assert_eq!(host.run_pending(), 2);
    assert_eq!(*log.lock().unwrap(), vec!["outer", "inner"]);
  }

  #[test]
  fn timers_fire_in_deadline_order() {
    let host = VirtualLoop::new();
    let log = Arc::new(Mutex::new(Vec::new()));
    for (label, ms) in [("late", 30), ("early", 10), ("mid", 20)] {
      let log = log.clone();
      host.start_timer(ms, None, Arc::new(move || log.lock().unwrap().push(label)));
    }
    assert_eq!(host.active_timers(), 3);

    host.advance_by(Duration::from_millis(15));
    assert_eq!(*log.lock().unwrap(), vec!["early"]);
    host.advance_by(Duration::from_millis(15));
    assert_eq!(*log.lock().unwrap(), vec!["early", "mid", "late"]);
    assert_eq!(host.active_timers(), 0);
  }

  #[test]
  fn stopped_timer_never_fires() {
    let host = VirtualLoop::new();
    let fired = Arc::new(Mutex::new(0));
    let c_fired = fired.clone();
    let id = host.start_timer(10, Some(10), Arc::new(move || *c_fired.lock().unwrap() += 1));

    host.advance_by(Duration::from_millis(25));
    assert_eq!(*fired.lock().unwrap(), 2);

    host.stop_timer(id);
    host.stop_timer(id);
    host.advance_by(Duration::from_millis(100));
    assert_eq!(*fired.lock().unwrap(), 2);
    assert_eq!(host.active_timers(), 0);
  }

  #[test]
  fn clock_moves_to_each_deadline() {
    let host = VirtualLoop::new();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let c_seen = seen.clone();
    let c_host = host.clone();
    host.start_timer(40, None, Arc::new(move || c_seen.lock().unwrap().push(c_host.now())));

    host.advance_by(Duration::from_millis(100));
    assert_eq!(*seen.lock().unwrap(), vec![Duration::from_millis(40)]);
    assert_eq!(host.now(), Duration::from_millis(100));
  }

  #[test]
  fn driving_thread_is_ui_thread() {
    let host = VirtualLoop::new();
    assert!(host.is_ui_thread());

    let c_host = host.clone();
    let off_thread = thread::spawn(move || c_host.is_ui_thread()).join().unwrap();
    assert!(!off_thread);

    let c_host = host.clone();
    let seen = Arc::new(Mutex::new(None));
    let c_seen = seen.clone();
    host.invoke_later(Box::new(move || *c_seen.lock().unwrap() = Some(c_host.is_ui_thread())));
    host.run_pending();
    assert_eq!(*seen.lock().unwrap(), Some(true));
  }
}
