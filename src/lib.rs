//! # rxui: reactive bridging for single-threaded UI runtimes
//!
//! UI toolkits deliver events by calling listeners on their one UI thread, and
//! accept work from other threads through a job queue and timers. This crate
//! turns both directions into reactive building blocks:
//!
//! - **Event bridge**: any listener-based [`EventSource`] becomes an
//!   observable whose subscriptions unregister exactly once.
//! - **UI scheduler**: [`UiScheduler`] submits immediate, delayed and periodic
//!   tasks onto the UI thread; its workers cancel their tasks as a group.
//! - **Dispatcher**: `observe_on_ui` moves any stream onto the UI thread, one
//!   task per notification, in order.
//!
//! The UI runtime itself is abstracted as a [`UiHost`]. Two hosts ship with
//! the crate: the deterministic [`VirtualLoop`] and the thread-backed
//! [`EventLoop`].
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::{Arc, Mutex};
//! use rxui::prelude::*;
//!
//! let host = VirtualLoop::new();
//! let scheduler = UiScheduler::new(host.clone());
//!
//! let seen = Arc::new(Mutex::new(Vec::new()));
//! let c_seen = seen.clone();
//! observable::from_iter(1..=5)
//!   .observe_on_ui(&scheduler)
//!   .subscribe(move |v| c_seen.lock().unwrap().push(v));
//!
//! // Nothing runs until the UI thread drains its queue.
//! assert!(seen.lock().unwrap().is_empty());
//! host.run_pending();
//! assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3, 4, 5]);
//! ```
//!
//! ## Key Concepts
//!
//! | Type | Description |
//! |------|-------------|
//! | [`DisposableToken`] | Lock-free slot retired exactly once |
//! | [`EventObservable`] | Stream over a listener-based source |
//! | [`UiScheduler`] / [`UiWorker`] | Tasks on the UI thread |
//! | [`SchedulerConfig`] | Scheduler name, task decoration and error handler |
//!
//! ## Errors
//!
//! Code running on the UI thread has no caller to return an error to. Panics
//! in task bodies and listener callbacks are caught and delivered to an
//! error handler, see [`error`].
//!
//! ## Feature Flags
//!
//! - **`event-loop`** (default): the thread-backed [`EventLoop`] host
//!
//! [`EventSource`]: bridge::EventSource
//! [`EventObservable`]: bridge::EventObservable
//! [`DisposableToken`]: disposable::DisposableToken
//! [`UiScheduler`]: scheduler::UiScheduler
//! [`UiWorker`]: scheduler::UiWorker
//! [`SchedulerConfig`]: config::SchedulerConfig
//! [`UiHost`]: host::UiHost
//! [`VirtualLoop`]: host::VirtualLoop
//! [`EventLoop`]: host::EventLoop

pub mod bridge;
pub mod config;
pub mod disposable;
pub mod error;
pub mod host;
pub mod observable;
pub mod observer;
pub mod ops;
pub mod prelude;
pub mod scheduler;

mod util;

// Re-export the prelude module
pub use prelude::*;
