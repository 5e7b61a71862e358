use crate::{
  disposable::{Disposable, DisposableHandle, DisposableToken},
  observable::Observable,
  observer::{BoxedEmitter, Emitter, Observer},
};

/// An observable driven by a user closure.
#[derive(Clone)]
pub struct Create<F>(F);

/// Creates an observable from a closure that receives an owned emitter.
///
/// The emitter is `Send`, so the closure may hand it to another thread and
/// emit from there.
///
/// ```rust
/// use std::sync::{Arc, Mutex};
/// use rxui::prelude::*;
///
/// let seen = Arc::new(Mutex::new(Vec::new()));
/// let c_seen = seen.clone();
/// observable::create(|mut emitter: BoxedEmitter<i32, ()>| {
///   emitter.next(1);
///   emitter.next(2);
///   emitter.complete();
/// })
/// .subscribe_all(move |v| c_seen.lock().unwrap().push(v), |_| {}, || {});
/// assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
/// ```
pub fn create<F>(subscribe: F) -> Create<F> { Create(subscribe) }

impl<F, Item, Err> Observable<Item, Err> for Create<F>
where
  F: FnOnce(BoxedEmitter<Item, Err>),
{
  fn actual_subscribe<O>(self, mut observer: O) -> DisposableHandle
  where
    O: Observer<Item, Err> + Send + 'static,
  {
    let handle = DisposableHandle::new(DisposableToken::new(()));
    observer.on_subscribe(handle.clone());
    (self.0)(Box::new(CreateEmitter { observer: Some(observer), handle: handle.clone() }));
    handle
  }
}

struct CreateEmitter<O> {
  observer: Option<O>,
  handle: DisposableHandle,
}

impl<O, Item, Err> Emitter<Item, Err> for CreateEmitter<O>
where
  O: Observer<Item, Err>,
{
  fn next(&mut self, value: Item) {
    if self.handle.is_disposed() {
      return;
    }
    if let Some(observer) = self.observer.as_mut() {
      observer.next(value);
    }
  }

  fn error(&mut self, err: Err) {
    if self.handle.is_disposed() {
      return;
    }
    if let Some(observer) = self.observer.take() {
      observer.error(err);
    }
  }

  fn complete(&mut self) {
    if self.handle.is_disposed() {
      return;
    }
    if let Some(observer) = self.observer.take() {
      observer.complete();
    }
  }

  fn is_disposed(&self) -> bool {
    self.handle.is_disposed()
      || self
        .observer
        .as_ref()
        .map_or(true, |o| o.is_closed())
  }
}
