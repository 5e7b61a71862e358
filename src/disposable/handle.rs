use std::{
  fmt::{Debug, Formatter},
  sync::Arc,
};

use super::{Disposable, SharedDisposable};

/// A cloneable, thread-safe cancellation handle.
///
/// This is what schedulers return for submitted tasks and what observers
/// receive in [`Observer::on_subscribe`](crate::observer::Observer::on_subscribe).
/// Clones refer to the same underlying resource; disposing any of them
/// disposes all of them. Dropping a handle does *not* dispose it.
///
/// # Examples
///
/// ```rust
/// use rxui::prelude::*;
///
/// let inert = DisposableHandle::disposed();
/// assert!(inert.is_disposed());
/// inert.dispose(); // no-op
/// ```
#[derive(Clone)]
pub struct DisposableHandle(Option<SharedDisposable>);

impl DisposableHandle {
  /// Wraps any shareable disposable.
  #[inline]
  pub fn new(disposable: impl Disposable + Send + Sync + 'static) -> Self {
    Self(Some(Arc::new(disposable)))
  }

  /// Wraps an already shared disposable without another allocation.
  #[inline]
  pub fn from_arc(disposable: SharedDisposable) -> Self { Self(Some(disposable)) }

  /// An inert handle that reports itself disposed and does nothing.
  #[inline]
  pub fn disposed() -> Self { Self(None) }

  /// Returns `true` if both handles refer to the same resource.
  pub fn ptr_eq(&self, other: &Self) -> bool {
    match (&self.0, &other.0) {
      (Some(a), Some(b)) => std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b)),
      (None, None) => true,
      _ => false,
    }
  }
}

impl Disposable for DisposableHandle {
  #[inline]
  fn dispose(&self) {
    if let Some(inner) = &self.0 {
      inner.dispose();
    }
  }

  #[inline]
  fn is_disposed(&self) -> bool { self.0.as_ref().map_or(true, |d| d.is_disposed()) }
}

impl Debug for DisposableHandle {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("DisposableHandle")
      .field("is_disposed", &self.is_disposed())
      .finish()
  }
}
