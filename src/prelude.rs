//! Prelude module for convenient imports
//!
//! This module re-exports commonly used types and traits for easy access.

// Event bridge
pub use crate::bridge::{
  same_listener, BridgeConfig, Categories, Category, EventObservable, EventSource, Listener,
  Registration,
};
// Configuration
pub use crate::config::SchedulerConfig;
// Cancellation
pub use crate::disposable::{CompositeDisposable, Disposable, DisposableHandle, DisposableToken};
// Errors
pub use crate::error::{RegistrationError, UiError};
// Hosts
#[cfg(feature = "event-loop")]
pub use crate::host::EventLoop;
pub use crate::host::{UiHost, VirtualLoop};
// Core traits and sources
pub use crate::observable::{self, Observable, ObservableExt};
pub use crate::observer::{BoxedEmitter, Emitter, Observer};
pub use crate::ops::{ObserveOnUi, ObserveOnUiExt};
// Schedulers
pub use crate::scheduler::{Scheduler, TaskHandle, UiScheduler, UiWorker, Worker};
