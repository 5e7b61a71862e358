//! The exactly-once retire slot.
//!
//! A [`DisposableToken`] is a single slot that is either empty, holds a live
//! resource handle, or is retired. Retiring is one atomic `swap`: whichever
//! thread moves the slot out of the holding state is the only one that gets
//! the handle back, and therefore the only one that runs its cleanup.

use std::{
  cell::UnsafeCell,
  fmt::{Debug, Formatter},
  sync::atomic::{AtomicU8, Ordering},
};

use super::Disposable;

const EMPTY: u8 = 0;
const ATTACHING: u8 = 1;
const HOLDING: u8 = 2;
const RETIRED: u8 = 3;

/// An atomically retirable single-slot holder.
///
/// ```
/// use rxui::disposable::DisposableToken;
///
/// let token = DisposableToken::new("listener");
/// assert_eq!(token.retire(), Some("listener"));
/// assert_eq!(token.retire(), None);
/// assert!(token.is_retired());
/// ```
pub struct DisposableToken<H> {
  state: AtomicU8,
  slot: UnsafeCell<Option<H>>,
}

// SAFETY: the slot is only read or written by the thread that won the state
// transition guarding it (`EMPTY -> ATTACHING` for writes, `HOLDING ->
// RETIRED` for the take), so the handle is moved between threads but never
// shared. `H: Send` is therefore enough for both bounds.
unsafe impl<H: Send> Send for DisposableToken<H> {}
unsafe impl<H: Send> Sync for DisposableToken<H> {}

impl<H> DisposableToken<H> {
  /// Creates a token holding `handle`.
  pub fn new(handle: H) -> Self {
    Self {
      state: AtomicU8::new(HOLDING),
      slot: UnsafeCell::new(Some(handle)),
    }
  }

  /// Creates a token that has not been attached to anything yet.
  pub fn empty() -> Self { Self { state: AtomicU8::new(EMPTY), slot: UnsafeCell::new(None) } }

  /// Creates a token that is already retired.
  pub fn retired() -> Self { Self { state: AtomicU8::new(RETIRED), slot: UnsafeCell::new(None) } }

  /// Returns `true` once the token has been retired.
  #[inline]
  pub fn is_retired(&self) -> bool { self.state.load(Ordering::Acquire) == RETIRED }

  /// Retires the token and returns the handle it held.
  ///
  /// Only the call that moves the token out of the holding state receives
  /// the handle; every other call, concurrent or later, gets `None`.
  pub fn retire(&self) -> Option<H> {
    match self.state.swap(RETIRED, Ordering::AcqRel) {
      // SAFETY: the swap above is the unique `HOLDING -> RETIRED` transition.
      HOLDING => unsafe { (*self.slot.get()).take() },
      _ => None,
    }
  }

  /// Moves an empty token into the holding state.
  ///
  /// Gives `handle` back if the token was not empty, or if it got retired
  /// while the handle was being stored. In the latter case the caller owns
  /// the cleanup.
  pub fn attach(&self, handle: H) -> Result<(), H> {
    if self
      .state
      .compare_exchange(EMPTY, ATTACHING, Ordering::Acquire, Ordering::Relaxed)
      .is_err()
    {
      return Err(handle);
    }
    // SAFETY: winning `EMPTY -> ATTACHING` grants exclusive access to the slot
    // until the state leaves `ATTACHING`.
    let slot = unsafe { &mut *self.slot.get() };
    *slot = Some(handle);
    match self
      .state
      .compare_exchange(ATTACHING, HOLDING, Ordering::AcqRel, Ordering::Acquire)
    {
      Ok(_) => Ok(()),
      // A concurrent `retire` saw `ATTACHING` and left the slot alone.
      Err(_) => slot.take().map_or(Ok(()), Err),
    }
  }
}

impl<H> Default for DisposableToken<H> {
  fn default() -> Self { Self::empty() }
}

impl<H> Disposable for DisposableToken<H> {
  #[inline]
  fn dispose(&self) { drop(self.retire()); }

  #[inline]
  fn is_disposed(&self) -> bool { self.is_retired() }
}

impl<H> Debug for DisposableToken<H> {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    let state = match self.state.load(Ordering::Acquire) {
      EMPTY => "Empty",
      ATTACHING => "Attaching",
      HOLDING => "Holding",
      _ => "Retired",
    };
    f.debug_struct("DisposableToken")
      .field("state", &state)
      .finish()
  }
}
