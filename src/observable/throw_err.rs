use crate::{
  disposable::{Disposable, DisposableHandle, DisposableToken},
  observable::Observable,
  observer::Observer,
};

/// Terminates immediately with an error.
#[derive(Clone)]
pub struct ThrowErr<Err>(Err);

/// Creates an observable that emits no values and fails with `err`.
pub fn throw_err<Err>(err: Err) -> ThrowErr<Err> { ThrowErr(err) }

impl<Item, Err> Observable<Item, Err> for ThrowErr<Err> {
  fn actual_subscribe<O>(self, mut observer: O) -> DisposableHandle
  where
    O: Observer<Item, Err> + Send + 'static,
  {
    let handle = DisposableHandle::new(DisposableToken::new(()));
    observer.on_subscribe(handle.clone());
    if !handle.is_disposed() {
      observer.error(self.0);
    }
    handle
  }
}

#[cfg(test)]
mod tests {
  use std::sync::{Arc, Mutex};

  use super::*;
  use crate::observable::ObservableExt;

  #[test]
  fn errors_without_values() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let (n, e, c) = (log.clone(), log.clone(), log.clone());
    throw_err("offline".to_string()).subscribe_all(
      move |v: i32| n.lock().unwrap().push(format!("next {v}")),
      move |err: String| e.lock().unwrap().push(format!("error {err}")),
      move || c.lock().unwrap().push("complete".to_string()),
    );
    assert_eq!(*log.lock().unwrap(), vec!["error offline"]);
  }
}
