//! Adapts listener-based UI event sources into observables.
//!
//! A UI toolkit publishes events by calling registered listeners on its UI
//! thread. [`EventObservable`] turns such a source into a stream: subscribing
//! registers one listener, disposing the subscription unregisters it exactly
//! once, from whichever thread gets there first.
//!
//! A source may split its events into categories (mouse clicks, moves and
//! wheel turns, say). A subscription selects any subset with [`Categories`]
//! and registers its single listener once per selected category. An optional
//! filter string is passed along with every registration, for sources that can
//! narrow their events by name (property names, action commands).
//!
//! # Example
//!
//! ```rust
//! use std::sync::{Arc, Mutex};
//! use rxui::prelude::*;
//!
//! #[derive(Default)]
//! struct Button {
//!   listeners: Mutex<Vec<Listener<&'static str>>>,
//! }
//!
//! impl Button {
//!   fn click(&self) {
//!     let listeners = self.listeners.lock().unwrap().clone();
//!     for l in listeners {
//!       l("click");
//!     }
//!   }
//! }
//!
//! impl EventSource for Button {
//!   type Event = &'static str;
//!
//!   fn add_listener(
//!     &self, _: &Registration<'_>, listener: &Listener<&'static str>,
//!   ) -> Result<(), RegistrationError> {
//!     self.listeners.lock().unwrap().push(listener.clone());
//!     Ok(())
//!   }
//!
//!   fn remove_listener(&self, _: &Registration<'_>, listener: &Listener<&'static str>) {
//!     self.listeners.lock().unwrap().retain(|l| !same_listener(l, listener));
//!   }
//! }
//!
//! let button = Arc::new(Button::default());
//! let clicks = Arc::new(Mutex::new(0));
//! let c_clicks = clicks.clone();
//! let subscription = EventObservable::new(button.clone())
//!   .subscribe(move |_| *c_clicks.lock().unwrap() += 1);
//!
//! button.click();
//! subscription.dispose();
//! button.click();
//! assert_eq!(*clicks.lock().unwrap(), 1);
//! assert!(button.listeners.lock().unwrap().is_empty());
//! ```

use std::{
  fmt::{Debug, Formatter},
  ops::BitOr,
  sync::{Arc, Weak},
};

use crate::{
  disposable::{Disposable, DisposableHandle, DisposableToken},
  error::{self, RegistrationError, UiError},
  observable::Observable,
  observer::{Notification, Observer, SerializedObserver},
};

/// A registered callback. Sources keep it for as long as it is registered.
pub type Listener<E> = Arc<dyn Fn(E) + Send + Sync>;

/// Listener identity is the allocation, not the closure's behaviour.
pub fn same_listener<E>(a: &Listener<E>, b: &Listener<E>) -> bool {
  std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

// ============================================================================
// Categories
// ============================================================================

/// One kind of event a source publishes, numbered `0..32`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Category(u8);

impl Category {
  /// # Panics
  ///
  /// Panics if `index >= 32`.
  pub const fn new(index: u8) -> Self {
    assert!(index < 32, "category index out of range");
    Self(index)
  }

  #[inline]
  pub const fn index(self) -> u8 { self.0 }
}

/// A set of [`Category`] values.
///
/// The default set holds category `0` only, which is what single-category
/// sources use.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Categories(u32);

impl Categories {
  pub const NONE: Self = Self(0);
  pub const ALL: Self = Self(u32::MAX);

  #[inline]
  pub const fn from_bits(bits: u32) -> Self { Self(bits) }

  #[inline]
  pub const fn bits(self) -> u32 { self.0 }

  #[inline]
  pub const fn of(category: Category) -> Self { Self(1 << category.0) }

  #[inline]
  pub const fn with(self, category: Category) -> Self { Self(self.0 | 1 << category.0) }

  #[inline]
  pub const fn contains(self, category: Category) -> bool { self.0 & (1 << category.0) != 0 }

  #[inline]
  pub const fn is_empty(self) -> bool { self.0 == 0 }

  /// The selected categories in ascending order.
  pub fn iter(self) -> impl Iterator<Item = Category> {
    (0..32u8)
      .filter(move |i| self.0 & (1u32 << i) != 0)
      .map(Category)
  }
}

impl Default for Categories {
  fn default() -> Self { Self::of(Category(0)) }
}

impl From<Category> for Categories {
  fn from(category: Category) -> Self { Self::of(category) }
}

impl BitOr for Categories {
  type Output = Self;

  fn bitor(self, rhs: Self) -> Self { Self(self.0 | rhs.0) }
}

impl BitOr for Category {
  type Output = Categories;

  fn bitor(self, rhs: Self) -> Categories { Categories::of(self).with(rhs) }
}

impl BitOr<Category> for Categories {
  type Output = Self;

  fn bitor(self, rhs: Category) -> Self { self.with(rhs) }
}

impl Debug for Categories {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    f.debug_set()
      .entries(self.iter().map(Category::index))
      .finish()
  }
}

// ============================================================================
// Source contract
// ============================================================================

/// What a single listener registration asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Registration<'a> {
  pub category: Category,
  pub filter: Option<&'a str>,
}

/// A listener-based event source owned by the UI runtime.
///
/// Sources invoke registered listeners on the UI thread. Removing a listener
/// that is not registered for the given registration must be a no-op.
pub trait EventSource: Send + Sync + 'static {
  type Event;

  fn add_listener(
    &self, registration: &Registration<'_>, listener: &Listener<Self::Event>,
  ) -> Result<(), RegistrationError>;

  fn remove_listener(&self, registration: &Registration<'_>, listener: &Listener<Self::Event>);
}

/// Which registrations a subscription makes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BridgeConfig {
  categories: Categories,
  filter: Option<String>,
}

impl BridgeConfig {
  pub fn new() -> Self { Self::default() }

  pub fn with_categories(mut self, categories: impl Into<Categories>) -> Self {
    self.categories = categories.into();
    self
  }

  pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
    self.filter = Some(filter.into());
    self
  }

  #[inline]
  pub fn categories(&self) -> Categories { self.categories }

  #[inline]
  pub fn filter(&self) -> Option<&str> { self.filter.as_deref() }

  fn registrations(&self) -> impl Iterator<Item = Registration<'_>> {
    let filter = self.filter();
    self
      .categories
      .iter()
      .map(move |category| Registration { category, filter })
  }
}

// ============================================================================
// EventObservable
// ============================================================================

/// An observable over the events of an [`EventSource`].
///
/// Each subscription registers its own listener. The stream never errors or
/// completes on its own; it ends when the subscription is disposed.
pub struct EventObservable<S> {
  source: Arc<S>,
  config: BridgeConfig,
}

impl<S> EventObservable<S> {
  /// Observes category `0` of `source`, unfiltered.
  pub fn new(source: Arc<S>) -> Self { Self::with_config(source, BridgeConfig::default()) }

  pub fn with_config(source: Arc<S>, config: BridgeConfig) -> Self { Self { source, config } }

  pub fn with_categories(mut self, categories: impl Into<Categories>) -> Self {
    self.config = self.config.with_categories(categories);
    self
  }

  pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
    self.config = self.config.with_filter(filter);
    self
  }

  #[inline]
  pub fn config(&self) -> &BridgeConfig { &self.config }
}

impl<S> Clone for EventObservable<S> {
  fn clone(&self) -> Self { Self { source: self.source.clone(), config: self.config.clone() } }
}

impl<S> Debug for EventObservable<S> {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("EventObservable")
      .field("config", &self.config)
      .finish()
  }
}

impl<S, Err> Observable<S::Event, Err> for EventObservable<S>
where
  S: EventSource,
  S::Event: Send + 'static,
  Err: Send + 'static,
{
  fn actual_subscribe<O>(self, observer: O) -> DisposableHandle
  where
    O: Observer<S::Event, Err> + Send + 'static,
  {
    let Self { source, config } = self;
    let state = Arc::new(BridgeState::<S> { token: DisposableToken::empty() });
    let sink = SerializedObserver::<O, S::Event, Err>::new(observer);

    let c_state = state.clone();
    let c_sink = sink.clone();
    let listener: Listener<S::Event> = Arc::new(move |event: S::Event| {
      c_sink.deliver(Notification::Next(event), &*c_state, |message| {
        error::on_error(UiError::ListenerPanicked { message })
      });
    });

    let attachment = Attachment {
      source: Arc::downgrade(&source),
      listener: Arc::downgrade(&listener),
      config: config.clone(),
    };
    let handle = DisposableHandle::from_arc(state.clone());
    if state.token.attach(attachment).is_err() {
      return handle;
    }
    sink.on_subscribe(handle.clone());

    for registration in config.registrations() {
      if state.token.is_retired() {
        break;
      }
      if let Err(err) = source.add_listener(&registration, &listener) {
        let category = registration.category.index();
        tracing::debug!(category, %err, "listener registration failed");
        drop(state.token.retire());
        break;
      }
    }
    // Retired while registering: the disposer may have run before some of
    // the registrations above, so undo all of them here.
    if state.token.is_retired() {
      detach(&*source, &listener, &config);
    }
    handle
  }
}

fn detach<S>(source: &S, listener: &Listener<S::Event>, config: &BridgeConfig)
where
  S: EventSource + ?Sized,
{
  for registration in config.registrations() {
    source.remove_listener(&registration, listener);
  }
}

struct Attachment<S: EventSource> {
  source: Weak<S>,
  listener: Weak<dyn Fn(S::Event) + Send + Sync>,
  config: BridgeConfig,
}

struct BridgeState<S: EventSource> {
  token: DisposableToken<Attachment<S>>,
}

impl<S: EventSource> Disposable for BridgeState<S> {
  fn dispose(&self) {
    let Some(attachment) = self.token.retire() else {
      return;
    };
    // Either side gone means there is nothing left to unregister.
    if let (Some(source), Some(listener)) =
      (attachment.source.upgrade(), attachment.listener.upgrade())
    {
      detach(&*source, &listener, &attachment.config);
    }
  }

  #[inline]
  fn is_disposed(&self) -> bool { self.token.is_retired() }
}
