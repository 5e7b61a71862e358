//! Observer trait and implementations
//!
//! The Observer is the sink side of a stream. It receives a cancellation
//! handle first, then any number of values, then at most one terminal
//! notification (error or completion).

use std::{
  collections::VecDeque,
  convert::Infallible,
  panic::{catch_unwind, AssertUnwindSafe},
  sync::{Arc, Mutex},
};

use crate::{
  disposable::{Disposable, DisposableHandle},
  error::panic_message,
  util::lock,
};

// ============================================================================
// Observer Trait
// ============================================================================

/// Observer trait: The consumer of data in reactive programming
pub trait Observer<Item, Err> {
  /// Receives the handle that cancels the subscription feeding this observer.
  ///
  /// Sources call this before delivering anything, so an observer may cancel
  /// synchronously from inside this method.
  fn on_subscribe(&mut self, _handle: DisposableHandle) {}

  /// Receive the next value from the observable
  fn next(&mut self, value: Item);

  /// Handle an error from the observable
  ///
  /// This consumes the observer, as no more values can be emitted after an
  /// error
  fn error(self, err: Err);

  /// Handle completion of the observable
  ///
  /// This consumes the observer, as no more values can be emitted after
  /// completion
  fn complete(self);

  /// Returns `true` if the observer will not accept more values.
  ///
  /// Synchronous sources use this to stop emitting early.
  fn is_closed(&self) -> bool { false }
}

// ============================================================================
// Emitter Trait
// ============================================================================

/// Emits into an observer through `&mut self` for every notification.
///
/// This is what the closure passed to
/// [`create`](crate::observable::create) receives. It hides the concrete
/// observer type behind a trait object, and it turns terminal notifications
/// into no-ops once one has been delivered.
pub trait Emitter<Item, Err> {
  fn next(&mut self, value: Item);
  fn error(&mut self, err: Err);
  fn complete(&mut self);
  /// Whether the downstream has been disposed or terminated.
  fn is_disposed(&self) -> bool;
}

/// An owned, sendable emitter.
pub type BoxedEmitter<Item, Err> = Box<dyn Emitter<Item, Err> + Send>;

// ============================================================================
// FnMutObserver - Closure adapter
// ============================================================================

/// Adapts a closure into an observer of an infallible stream.
///
/// Completion is ignored.
#[derive(Clone)]
pub struct FnMutObserver<F>(pub F);

impl<F, Item> Observer<Item, Infallible> for FnMutObserver<F>
where
  F: FnMut(Item),
{
  #[inline]
  fn next(&mut self, v: Item) { (self.0)(v); }

  #[inline]
  fn error(self, err: Infallible) { match err {} }

  #[inline]
  fn complete(self) {}
}

/// Adapts three closures into an observer.
pub struct ObserverAll<N, E, C> {
  next: N,
  error: E,
  complete: C,
}

impl<N, E, C> ObserverAll<N, E, C> {
  pub fn new(next: N, error: E, complete: C) -> Self { Self { next, error, complete } }
}

impl<Item, Err, N, E, C> Observer<Item, Err> for ObserverAll<N, E, C>
where
  N: FnMut(Item),
  E: FnOnce(Err),
  C: FnOnce(),
{
  #[inline]
  fn next(&mut self, value: Item) { (self.next)(value); }

  #[inline]
  fn error(self, err: Err) { (self.error)(err); }

  #[inline]
  fn complete(self) { (self.complete)(); }
}

// ============================================================================
// SerializedObserver - one delivery at a time, no lock across user code
// ============================================================================

/// A notification waiting for its turn.
pub(crate) enum Notification<Item, Err> {
  Next(Item),
  Error(Err),
  Complete,
}

/// Shared ownership of an observer that serializes deliveries into it.
///
/// The observer is taken out of its slot while it runs, so no lock is held
/// across user code. Notifications that arrive meanwhile, from a nested
/// dispatch or another thread, are queued and delivered by the running call
/// in arrival order. Once `cancel` reports disposed, queued notifications are
/// dropped. A terminal notification consumes the observer; everything after
/// it is dropped.
pub(crate) struct SerializedObserver<O, Item, Err>(Arc<Mutex<Slot<O, Item, Err>>>);

struct Slot<O, Item, Err> {
  observer: Option<O>,
  busy: bool,
  backlog: VecDeque<Notification<Item, Err>>,
}

impl<O, Item, Err> SerializedObserver<O, Item, Err> {
  pub(crate) fn new(observer: O) -> Self {
    let slot = Slot { observer: Some(observer), busy: false, backlog: VecDeque::new() };
    Self(Arc::new(Mutex::new(slot)))
  }

  pub(crate) fn on_subscribe(&self, handle: DisposableHandle)
  where
    O: Observer<Item, Err>,
  {
    let observer = lock(&self.0).observer.take();
    if let Some(mut observer) = observer {
      observer.on_subscribe(handle);
      lock(&self.0).observer = Some(observer);
    }
  }

  /// Delivers `notification` unless `cancel` is disposed. A panic in the
  /// observer is caught and its message handed to `on_panic`.
  pub(crate) fn deliver<D>(
    &self, notification: Notification<Item, Err>, cancel: &D, on_panic: impl Fn(String),
  ) where
    O: Observer<Item, Err>,
    D: Disposable + ?Sized,
  {
    let mut observer = {
      let mut slot = lock(&self.0);
      if slot.busy {
        slot.backlog.push_back(notification);
        return;
      }
      let Some(observer) = slot.observer.take() else {
        return;
      };
      slot.busy = true;
      observer
    };
    let mut next = Some(notification);
    while let Some(notification) = next.take() {
      if cancel.is_disposed() {
        self.release(Some(observer));
        return;
      }
      let result = match notification {
        Notification::Next(value) => catch_unwind(AssertUnwindSafe(|| observer.next(value))),
        Notification::Error(err) => {
          let result = catch_unwind(AssertUnwindSafe(move || observer.error(err)));
          if let Err(payload) = result {
            on_panic(panic_message(payload.as_ref()));
          }
          self.release(None);
          return;
        }
        Notification::Complete => {
          let result = catch_unwind(AssertUnwindSafe(move || observer.complete()));
          if let Err(payload) = result {
            on_panic(panic_message(payload.as_ref()));
          }
          self.release(None);
          return;
        }
      };
      if let Err(payload) = result {
        on_panic(panic_message(payload.as_ref()));
      }
      let mut slot = lock(&self.0);
      next = slot.backlog.pop_front();
      if next.is_none() {
        slot.busy = false;
        slot.observer = Some(observer);
        return;
      }
    }
  }

  // Ends the running delivery and drops whatever queued up behind it.
  fn release(&self, observer: Option<O>) {
    let backlog = {
      let mut slot = lock(&self.0);
      slot.busy = false;
      slot.observer = observer;
      std::mem::take(&mut slot.backlog)
    };
    drop(backlog);
  }
}

impl<O, Item, Err> Clone for SerializedObserver<O, Item, Err> {
  #[inline]
  fn clone(&self) -> Self { Self(self.0.clone()) }
}

// ============================================================================
// Tests
// ============================================================================
