//! Re-dispatches a stream onto the UI thread.
//!
//! Every notification the upstream emits, on whatever thread, becomes its own
//! immediate task on the [`UiScheduler`]. The host queue is FIFO, so the
//! downstream observer sees notifications in upstream order, one at a time,
//! on the UI thread.
//!
//! A downstream callback may pump the UI loop itself (a modal dialog does).
//! Hops that run inside such a nested pump are queued and delivered, in
//! order, once the running callback returns.

use std::sync::{
  atomic::{AtomicBool, Ordering},
  Arc,
};

use crate::{
  disposable::{Disposable, DisposableHandle, DisposableToken},
  error::UiError,
  observable::Observable,
  observer::{Notification, Observer, SerializedObserver},
  scheduler::{Scheduler, UiScheduler},
};

/// Adds [`observe_on_ui`](ObserveOnUiExt::observe_on_ui) to every value.
///
/// It lives apart from [`ObservableExt`](crate::observable::ObservableExt) so
/// that sources generic over their error type need no annotation.
pub trait ObserveOnUiExt: Sized {
  /// Re-dispatches every notification of this stream onto the UI thread,
  /// one scheduled task per notification.
  fn observe_on_ui(self, scheduler: &UiScheduler) -> ObserveOnUi<Self> {
    ObserveOnUi::new(self, scheduler.clone())
  }
}

impl<T> ObserveOnUiExt for T {}

/// The observable returned by [`ObserveOnUiExt::observe_on_ui`].
#[derive(Clone)]
pub struct ObserveOnUi<S> {
  source: S,
  scheduler: UiScheduler,
}

impl<S> ObserveOnUi<S> {
  pub(crate) fn new(source: S, scheduler: UiScheduler) -> Self { Self { source, scheduler } }
}

impl<S, Item, Err> Observable<Item, Err> for ObserveOnUi<S>
where
  S: Observable<Item, Err>,
  Item: Send + 'static,
  Err: Send + 'static,
{
  fn actual_subscribe<O>(self, mut observer: O) -> DisposableHandle
  where
    O: Observer<Item, Err> + Send + 'static,
  {
    let state = Arc::new(DispatchState {
      disposed: AtomicBool::new(false),
      upstream: DisposableToken::empty(),
    });
    let handle = DisposableHandle::from_arc(state.clone());
    observer.on_subscribe(handle.clone());
    if state.is_disposed() {
      return handle;
    }
    self.source.actual_subscribe(DispatchObserver {
      state,
      downstream: SerializedObserver::new(observer),
      scheduler: self.scheduler,
    });
    handle
  }
}

struct DispatchState {
  disposed: AtomicBool,
  upstream: DisposableToken<DisposableHandle>,
}

impl Disposable for DispatchState {
  fn dispose(&self) {
    self.disposed.store(true, Ordering::Release);
    if let Some(upstream) = self.upstream.retire() {
      upstream.dispose();
    }
  }

  #[inline]
  fn is_disposed(&self) -> bool { self.disposed.load(Ordering::Acquire) }
}

struct DispatchObserver<O, Item, Err> {
  state: Arc<DispatchState>,
  downstream: SerializedObserver<O, Item, Err>,
  scheduler: UiScheduler,
}

impl<O, Item, Err> DispatchObserver<O, Item, Err>
where
  O: Observer<Item, Err> + Send + 'static,
  Item: Send + 'static,
  Err: Send + 'static,
{
  fn dispatch(&self, notification: Notification<Item, Err>) {
    if self.state.is_disposed() {
      return;
    }
    let state = self.state.clone();
    let downstream = self.downstream.clone();
    let scheduler = self.scheduler.clone();
    self.scheduler.schedule_direct(
      move || {
        downstream.deliver(notification, &*state, |message| {
          scheduler.config().report(UiError::TaskPanicked {
            scheduler: scheduler.name().to_string(),
            message,
            periodic: false,
          })
        })
      },
      None,
    );
  }
}

impl<Item, Err, O> Observer<Item, Err> for DispatchObserver<O, Item, Err>
where
  Item: Send + 'static,
  Err: Send + 'static,
  O: Observer<Item, Err> + Send + 'static,
{
  fn on_subscribe(&mut self, handle: DisposableHandle) {
    // Already disposed downstream: cancel the upstream right away.
    if let Err(handle) = self.state.upstream.attach(handle) {
      handle.dispose();
    }
  }

  fn next(&mut self, value: Item) { self.dispatch(Notification::Next(value)); }

  fn error(self, err: Err) { self.dispatch(Notification::Error(err)); }

  fn complete(self) { self.dispatch(Notification::Complete); }

  #[inline]
  fn is_closed(&self) -> bool { self.state.is_disposed() }
}

#[cfg(test)]
mod tests {
  use std::{
    sync::{Barrier, Mutex},
    thread,
  };

  use super::*;
  use crate::{
    config::SchedulerConfig,
    error::UiError,
    host::VirtualLoop,
    observable::{self, ObservableExt},
    observer::BoxedEmitter,
  };

  type Log = Arc<Mutex<Vec<String>>>;

  fn logging_subscribe<S>(source: S, scheduler: &UiScheduler) -> (DisposableHandle, Log)
  where
    S: Observable<i32, String>,
  {
    let log: Log = Arc::default();
    let (n, e, c) = (log.clone(), log.clone(), log.clone());
    let handle = source.observe_on_ui(scheduler).subscribe_all(
      move |v: i32| n.lock().unwrap().push(format!("next {v}")),
      move |err: String| e.lock().unwrap().push(format!("error {err}")),
      move || c.lock().unwrap().push("complete".to_string()),
    );
    (handle, log)
  }

  #[test]
  fn preserves_order_and_hops_to_ui_thread() {
    let host = VirtualLoop::new();
    let scheduler = UiScheduler::new(host.clone());
    let seen = Arc::new(Mutex::new(Vec::new()));
    let c_seen = seen.clone();
    let c_scheduler = scheduler.clone();
    observable::from_iter(1..=5)
      .observe_on_ui(&scheduler)
      .subscribe(move |v: i32| c_seen.lock().unwrap().push((v, c_scheduler.is_ui_thread())));

    assert!(seen.lock().unwrap().is_empty());
    assert_eq!(host.pending_jobs(), 6);
    host.run_pending();
    assert_eq!(
      *seen.lock().unwrap(),
      (1..=5).map(|v| (v, true)).collect::<Vec<_>>()
    );
  }

  #[test]
  fn downstream_may_pump_the_ui_loop() {
    let host = VirtualLoop::new();
    let scheduler = UiScheduler::new(host.clone());
    let log: Log = Arc::default();
    let (n, c) = (log.clone(), log.clone());
    let c_host = host.clone();
    observable::from_iter(1..=3)
      .observe_on_ui(&scheduler)
      .subscribe_all(
        move |v: i32| {
          n.lock().unwrap().push(format!("next {v}"));
          if v == 1 {
            // A modal dialog running its own event loop.
            c_host.run_pending();
            n.lock().unwrap().push("pumped".to_string());
          }
        },
        |_: ()| {},
        move || c.lock().unwrap().push("complete".to_string()),
      );

    let (tx, rx) = std::sync::mpsc::channel();
    let c_host = host.clone();
    thread::spawn(move || {
      c_host.run_pending();
      let _ = tx.send(());
    });
    assert!(rx.recv_timeout(std::time::Duration::from_secs(2)).is_ok());
    assert_eq!(
      *log.lock().unwrap(),
      vec!["next 1", "pumped", "next 2", "next 3", "complete"]
    );
  }

  #[test]
  fn emissions_from_another_thread() {
    let host = VirtualLoop::new();
    let scheduler = UiScheduler::new(host.clone());
    let source = observable::create(|mut emitter: BoxedEmitter<i32, String>| {
      thread::spawn(move || {
        for v in 1..=5 {
          emitter.next(v);
        }
        emitter.complete();
      })
      .join()
      .unwrap();
    });
    let (_handle, log) = logging_subscribe(source, &scheduler);
    host.run_pending();
    assert_eq!(
      *log.lock().unwrap(),
      vec!["next 1", "next 2", "next 3", "next 4", "next 5", "complete"]
    );
  }

  #[test]
  fn error_reaches_downstream_once() {
    let host = VirtualLoop::new();
    let scheduler = UiScheduler::new(host.clone());
    let source = observable::create(|mut emitter: BoxedEmitter<i32, String>| {
      emitter.next(1);
      emitter.error("broken".to_string());
      emitter.error("again".to_string());
      emitter.next(2);
    });
    let (_handle, log) = logging_subscribe(source, &scheduler);
    host.run_pending();
    assert_eq!(*log.lock().unwrap(), vec!["next 1", "error broken"]);
  }

  #[test]
  fn dispose_drops_queued_notifications() {
    let host = VirtualLoop::new();
    let scheduler = UiScheduler::new(host.clone());
    let (handle, log) = logging_subscribe(observable::from_iter(1..=3), &scheduler);
    handle.dispose();
    host.run_pending();
    assert!(log.lock().unwrap().is_empty());
  }

  #[test]
  fn dispose_cancels_upstream_and_closes_emitter() {
    let host = VirtualLoop::new();
    let scheduler = UiScheduler::new(host.clone());
    let slot: Arc<Mutex<Option<BoxedEmitter<i32, String>>>> = Arc::default();
    let c_slot = slot.clone();
    let source = observable::create(move |emitter: BoxedEmitter<i32, String>| {
      *c_slot.lock().unwrap() = Some(emitter);
    });
    let (handle, log) = logging_subscribe(source, &scheduler);

    let mut emitter = slot.lock().unwrap().take().unwrap();
    emitter.next(1);
    assert!(!emitter.is_disposed());

    let barrier = Barrier::new(2);
    thread::scope(|s| {
      for _ in 0..2 {
        s.spawn(|| {
          barrier.wait();
          handle.dispose();
        });
      }
    });
    assert!(emitter.is_disposed());
    emitter.next(2);
    assert_eq!(host.pending_jobs(), 1);
    host.run_pending();
    assert!(log.lock().unwrap().is_empty());
  }

  struct CancelOnSubscribe;

  impl Observer<i32, String> for CancelOnSubscribe {
    fn on_subscribe(&mut self, handle: DisposableHandle) { handle.dispose(); }

    fn next(&mut self, _: i32) { unreachable!() }

    fn error(self, _: String) { unreachable!() }

    fn complete(self) { unreachable!() }
  }

  #[test]
  fn cancel_during_on_subscribe_skips_upstream() {
    let host = VirtualLoop::new();
    let scheduler = UiScheduler::new(host.clone());
    let subscribed = Arc::new(Mutex::new(false));
    let c_subscribed = subscribed.clone();
    let handle = observable::create(move |_: BoxedEmitter<i32, String>| {
      *c_subscribed.lock().unwrap() = true;
    })
    .observe_on_ui(&scheduler)
    .actual_subscribe(CancelOnSubscribe);
    assert!(handle.is_disposed());
    assert!(!*subscribed.lock().unwrap());
    assert_eq!(host.pending_jobs(), 0);
  }

  #[test]
  fn downstream_panic_goes_to_scheduler_handler() {
    let host = VirtualLoop::new();
    let errors = Arc::new(Mutex::new(Vec::new()));
    let c_errors = errors.clone();
    let config = SchedulerConfig::new()
      .with_error_handler(move |err: &UiError| c_errors.lock().unwrap().push(err.clone()));
    let scheduler = UiScheduler::with_config(host.clone(), config);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let c_seen = seen.clone();
    observable::from_iter(1..=3)
      .observe_on_ui(&scheduler)
      .subscribe(move |v: i32| {
        if v == 2 {
          panic!("cannot render 2");
        }
        c_seen.lock().unwrap().push(v);
      });
    host.run_pending();
    assert_eq!(*seen.lock().unwrap(), vec![1, 3]);
    assert_eq!(errors.lock().unwrap().len(), 1);
    assert_eq!(errors.lock().unwrap()[0].as_label(), "task_panicked");
  }
}
