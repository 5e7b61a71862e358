use crate::{
  disposable::{Disposable, DisposableHandle, DisposableToken},
  observable::Observable,
  observer::Observer,
};

/// Emits every item of an iterator synchronously, then completes.
#[derive(Clone)]
pub struct FromIter<I> {
  iter: I,
}

/// Creates an observable that emits the items of `iter` on the subscribing
/// thread.
///
/// ```rust
/// use std::sync::{Arc, Mutex};
/// use rxui::prelude::*;
///
/// let seen = Arc::new(Mutex::new(Vec::new()));
/// let c_seen = seen.clone();
/// observable::from_iter(1..=3).subscribe(move |v| c_seen.lock().unwrap().push(v));
/// assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3]);
/// ```
pub fn from_iter<I: IntoIterator>(iter: I) -> FromIter<I> { FromIter { iter } }

impl<I, Err> Observable<I::Item, Err> for FromIter<I>
where
  I: IntoIterator,
{
  fn actual_subscribe<O>(self, mut observer: O) -> DisposableHandle
  where
    O: Observer<I::Item, Err> + Send + 'static,
  {
    let handle = DisposableHandle::new(DisposableToken::new(()));
    observer.on_subscribe(handle.clone());
    for v in self.iter {
      if handle.is_disposed() || observer.is_closed() {
        return handle;
      }
      observer.next(v);
    }
    if !handle.is_disposed() && !observer.is_closed() {
      observer.complete();
    }
    handle
  }
}

#[cfg(test)]
mod tests {
  use std::sync::{Arc, Mutex};

  use super::*;
  use crate::prelude::*;

  #[test]
  fn emits_then_completes() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let (n, c) = (log.clone(), log.clone());
    from_iter(0..3).subscribe_all(
      move |v: i32| n.lock().unwrap().push(v),
      |_: ()| {},
      move || c.lock().unwrap().push(-1),
    );
    assert_eq!(*log.lock().unwrap(), vec![0, 1, 2, -1]);
  }

  struct CancelAfter {
    seen: Arc<Mutex<Vec<i32>>>,
    handle: Option<DisposableHandle>,
    limit: usize,
  }

  impl Observer<i32, ()> for CancelAfter {
    fn on_subscribe(&mut self, handle: DisposableHandle) { self.handle = Some(handle); }

    fn next(&mut self, value: i32) {
      let mut seen = self.seen.lock().unwrap();
      seen.push(value);
      if seen.len() == self.limit {
        if let Some(h) = &self.handle {
          h.dispose();
        }
      }
    }

    fn error(self, _: ()) {}

    fn complete(self) { self.seen.lock().unwrap().push(-1); }
  }

  #[test]
  fn stops_when_disposed_from_next() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let handle = from_iter(0..10).actual_subscribe(CancelAfter {
      seen: seen.clone(),
      handle: None,
      limit: 2,
    });
    assert!(handle.is_disposed());
    assert_eq!(*seen.lock().unwrap(), vec![0, 1]);
  }
}
