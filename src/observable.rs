//! Observable trait and the minimal set of sources.
//!
//! General-purpose operators are out of scope for this crate; the sources here
//! exist so that streams can be fed into the UI dispatcher and exercised in
//! tests. Bridged UI event streams live in [`crate::bridge`].

use crate::{
  disposable::DisposableHandle,
  observer::{FnMutObserver, Observer, ObserverAll},
};

mod create;
mod from_iter;
mod throw_err;

pub use create::{create, Create};
pub use from_iter::{from_iter, FromIter};
pub use throw_err::{throw_err, ThrowErr};

/// A stream that can be subscribed once.
///
/// `actual_subscribe` must call [`Observer::on_subscribe`] before delivering
/// anything, and it returns a handle to the same subscription.
pub trait Observable<Item, Err> {
  fn actual_subscribe<O>(self, observer: O) -> DisposableHandle
  where
    O: Observer<Item, Err> + Send + 'static;
}

/// Convenience methods available on every [`Observable`].
pub trait ObservableExt<Item, Err>: Observable<Item, Err> + Sized {
  /// Subscribes with a closure receiving values of an infallible stream.
  fn subscribe<N>(self, next: N) -> DisposableHandle
  where
    N: FnMut(Item) + Send + 'static,
    FnMutObserver<N>: Observer<Item, Err>,
  {
    self.actual_subscribe(FnMutObserver(next))
  }

  /// Subscribes with separate closures for values, errors and completion.
  fn subscribe_all<N, E, C>(self, next: N, error: E, complete: C) -> DisposableHandle
  where
    N: FnMut(Item) + Send + 'static,
    E: FnOnce(Err) + Send + 'static,
    C: FnOnce() + Send + 'static,
  {
    self.actual_subscribe(ObserverAll::new(next, error, complete))
  }
}

impl<T, Item, Err> ObservableExt<Item, Err> for T where T: Observable<Item, Err> {}
