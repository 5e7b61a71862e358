//! Cancellation handles.
//!
//! Everything that can be cancelled in this crate implements [`Disposable`]:
//! bridged subscriptions, scheduled tasks, workers and the dispatcher.
//! Disposal is idempotent: the first call releases the resource, every later
//! call is a no-op.

use std::sync::Arc;

mod composite;
mod handle;
mod token;

pub use composite::CompositeDisposable;
pub use handle::DisposableHandle;
pub use token::DisposableToken;

/// A resource that can be released exactly once.
///
/// Both methods take `&self` so that a handle shared between threads can be
/// disposed from any of them. Implementations must tolerate concurrent calls.
pub trait Disposable {
  /// Releases the resource. Calling this more than once has no further
  /// effect.
  fn dispose(&self);

  /// Returns `true` once the resource is released.
  fn is_disposed(&self) -> bool;
}

/// The unit disposable is always disposed. It is what inert handles hold.
impl Disposable for () {
  #[inline]
  fn dispose(&self) {}

  #[inline]
  fn is_disposed(&self) -> bool { true }
}

impl<T: Disposable + ?Sized> Disposable for Box<T> {
  #[inline]
  fn dispose(&self) { (**self).dispose() }

  #[inline]
  fn is_disposed(&self) -> bool { (**self).is_disposed() }
}

impl<T: Disposable + ?Sized> Disposable for Arc<T> {
  #[inline]
  fn dispose(&self) { (**self).dispose() }

  #[inline]
  fn is_disposed(&self) -> bool { (**self).is_disposed() }
}

/// A thread-safe, type-erased disposable.
pub type SharedDisposable = Arc<dyn Disposable + Send + Sync>;
