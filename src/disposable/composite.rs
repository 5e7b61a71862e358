use std::{
  fmt::{Debug, Formatter},
  sync::Mutex,
};

use smallvec::SmallVec;

use super::{Disposable, SharedDisposable};
use crate::util::lock;

/// A closable set of disposables with ID-based tracking.
///
/// Used as a worker's set of outstanding tasks: the submitting thread adds,
/// the UI thread removes finished tasks, and any thread may dispose the whole
/// set. Once disposed, adds fail instead of silently leaking a live item.
///
/// # Design
///
/// - **SmallVec Optimization**: most workers have only a couple of
///   outstanding tasks at a time.
/// - **Pre-allocation Pattern**: `reserve_id()` + `insert()` lets an item know
///   its own ID (so it can remove itself later) before it is stored.
///
/// # Examples
///
/// ```rust
/// use rxui::disposable::{CompositeDisposable, Disposable};
///
/// let set: CompositeDisposable<()> = CompositeDisposable::default();
/// let id = set.add(()).unwrap();
/// assert_eq!(set.len(), 1);
/// assert!(set.remove(id).is_some());
///
/// set.dispose();
/// assert!(set.add(()).is_err());
/// ```
pub struct CompositeDisposable<D = SharedDisposable> {
  inner: Mutex<Inner<D>>,
}

struct Inner<D> {
  closed: bool,
  next_id: usize,
  items: SmallVec<[(usize, D); 2]>,
}

impl<D> Default for CompositeDisposable<D> {
  fn default() -> Self {
    Self {
      inner: Mutex::new(Inner { closed: false, next_id: 0, items: SmallVec::new() }),
    }
  }
}

impl<D> CompositeDisposable<D> {
  /// Creates an empty, open set.
  #[inline]
  pub fn new() -> Self { Self::default() }

  /// Adds `item` and returns its ID, or gives it back if the set is closed.
  pub fn add(&self, item: D) -> Result<usize, D> {
    let mut inner = lock(&self.inner);
    if inner.closed {
      return Err(item);
    }
    let id = inner.next_id;
    inner.next_id += 1;
    inner.items.push((id, item));
    Ok(id)
  }

  /// Reserves the next ID without adding an item. `None` if closed.
  pub fn reserve_id(&self) -> Option<usize> {
    let mut inner = lock(&self.inner);
    if inner.closed {
      return None;
    }
    let id = inner.next_id;
    inner.next_id += 1;
    Some(id)
  }

  /// Inserts an item under an ID obtained from `reserve_id()`.
  ///
  /// Gives the item back if the set was closed in the meantime.
  pub fn insert(&self, id: usize, item: D) -> Result<(), D> {
    let mut inner = lock(&self.inner);
    if inner.closed {
      return Err(item);
    }
    inner.items.push((id, item));
    Ok(())
  }

  /// Removes an item by ID without disposing it.
  pub fn remove(&self, id: usize) -> Option<D> {
    let mut inner = lock(&self.inner);
    inner
      .items
      .iter()
      .position(|(i, _)| *i == id)
      .map(|pos| inner.items.remove(pos).1)
  }

  /// Checks if an ID is currently in the set.
  pub fn contains(&self, id: usize) -> bool {
    lock(&self.inner).items.iter().any(|(i, _)| *i == id)
  }

  /// Number of items currently held.
  pub fn len(&self) -> usize { lock(&self.inner).items.len() }

  /// Whether the set currently holds no items.
  pub fn is_empty(&self) -> bool { lock(&self.inner).items.is_empty() }
}

impl<D: Disposable> Disposable for CompositeDisposable<D> {
  /// Closes the set and disposes every item it held.
  ///
  /// Items are disposed after the lock is released, so an item may call
  /// back into [`remove`](Self::remove) while being disposed.
  fn dispose(&self) {
    let items = {
      let mut inner = lock(&self.inner);
      if inner.closed {
        return;
      }
      inner.closed = true;
      std::mem::take(&mut inner.items)
    };
    for (_, item) in items {
      item.dispose();
    }
  }

  fn is_disposed(&self) -> bool { lock(&self.inner).closed }
}

impl<D> Debug for CompositeDisposable<D> {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    let inner = lock(&self.inner);
    f.debug_struct("CompositeDisposable")
      .field("closed", &inner.closed)
      .field("len", &inner.items.len())
      .finish()
  }
}

#[cfg(test)]
mod tests {
  use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
  };

  use super::*;
  use crate::disposable::DisposableToken;

  #[test]
  fn add_remove() {
    let set = CompositeDisposable::<()>::new();
    let a = set.add(()).unwrap();
    let b = set.add(()).unwrap();
    let c = set.add(()).unwrap();
    assert_eq!(set.len(), 3);
    assert!(set.contains(b));
    assert!(set.remove(b).is_some());
    assert!(!set.contains(b));
    assert!(set.remove(b).is_none());
    assert_eq!(set.len(), 2);
    assert_ne!(a, c);
  }

  #[test]
  fn dispose_disposes_members_once() {
    let set = CompositeDisposable::<Arc<DisposableToken<()>>>::new();
    let tokens: Vec<_> = (0..3).map(|_| Arc::new(DisposableToken::new(()))).collect();
    for t in &tokens {
      set.add(t.clone()).unwrap();
    }
    set.dispose();
    set.dispose();
    assert!(set.is_disposed());
    assert!(set.is_empty());
    assert!(tokens.iter().all(|t| t.is_retired()));
  }

  #[test]
  fn closed_set_refuses_items() {
    let set = CompositeDisposable::<()>::new();
    let id = set.reserve_id().unwrap();
    set.dispose();
    assert_eq!(set.insert(id, ()), Err(()));
    assert_eq!(set.add(()), Err(()));
    assert_eq!(set.reserve_id(), None);
  }

  struct Reentrant {
    set: Arc<CompositeDisposable<Arc<Reentrant>>>,
    id: usize,
    disposed: AtomicUsize,
  }

  impl Disposable for Reentrant {
    fn dispose(&self) {
      self.disposed.fetch_add(1, Ordering::SeqCst);
      assert!(self.set.remove(self.id).is_none());
    }

    fn is_disposed(&self) -> bool { self.disposed.load(Ordering::SeqCst) > 0 }
  }

  #[test]
  fn members_may_call_back_while_disposed() {
    let set = Arc::new(CompositeDisposable::new());
    let id = set.reserve_id().unwrap();
    let item = Arc::new(Reentrant { set: set.clone(), id, disposed: AtomicUsize::new(0) });
    set.insert(id, item.clone()).ok();
    set.dispose();
    assert_eq!(item.disposed.load(Ordering::SeqCst), 1);
  }
}
