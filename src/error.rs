//! Error types and the process-wide error handler.
//!
//! Nothing that runs on the UI thread has a caller to return an error to: a
//! task body or a listener callback is invoked by the host's event loop. Panics
//! raised there are caught and routed to an error handler instead of unwinding
//! into the host. The handler is either the one configured on a
//! [`SchedulerConfig`](crate::config::SchedulerConfig) or the process-wide one
//! managed by [`set_error_handler`] / [`reset_error_handler`].

use std::{
  any::Any,
  io,
  sync::{Arc, PoisonError, RwLock},
};

use once_cell::sync::Lazy;
use thiserror::Error;

/// Failures that cannot be propagated to any caller.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UiError {
  /// A scheduled task body panicked. Periodic tasks are stopped by this.
  #[error("task on `{scheduler}` panicked{}: {message}", periodic_suffix(.periodic))]
  TaskPanicked {
    /// Name of the scheduler the task ran on.
    scheduler: String,
    /// Panic message.
    message: String,
    /// Whether the task was periodic.
    periodic: bool,
  },
  /// A sink panicked while a bridged native event was being forwarded.
  #[error("listener callback panicked: {message}")]
  ListenerPanicked {
    /// Panic message.
    message: String,
  },
}

impl UiError {
  /// Returns a short stable label for logs.
  pub fn as_label(&self) -> &'static str {
    match self {
      UiError::TaskPanicked { periodic: false, .. } => "task_panicked",
      UiError::TaskPanicked { periodic: true, .. } => "periodic_task_panicked",
      UiError::ListenerPanicked { .. } => "listener_panicked",
    }
  }
}

fn periodic_suffix(periodic: &bool) -> &'static str {
  if *periodic { " (periodic, stopped)" } else { "" }
}

/// Returned by an [`EventSource`](crate::bridge::EventSource) that refuses a
/// listener.
///
/// The bridge never forwards this to a sink; the subscription simply produces
/// no events.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistrationError {
  #[error("source rejected listener for category {category}: {reason}")]
  Rejected { category: u8, reason: String },
  #[error("source is closed")]
  SourceClosed,
}

/// Errors raised while starting a host event loop.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum LoopError {
  #[error("failed to spawn ui thread `{name}`")]
  Spawn {
    name: String,
    #[source]
    source: io::Error,
  },
}

/// A handler receiving errors that have nowhere else to go.
pub type ErrorHandler = Arc<dyn Fn(&UiError) + Send + Sync>;

static ERROR_HANDLER: Lazy<RwLock<Option<ErrorHandler>>> = Lazy::new(|| RwLock::new(None));

/// Installs the process-wide error handler, replacing the previous one.
pub fn set_error_handler<F>(handler: F)
where
  F: Fn(&UiError) + Send + Sync + 'static,
{
  *ERROR_HANDLER
    .write()
    .unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(handler));
}

/// Restores the default handler, which logs through `tracing`.
pub fn reset_error_handler() {
  *ERROR_HANDLER
    .write()
    .unwrap_or_else(PoisonError::into_inner) = None;
}

/// Delivers `err` to the process-wide error handler.
pub fn on_error(err: UiError) {
  let handler = ERROR_HANDLER
    .read()
    .unwrap_or_else(PoisonError::into_inner)
    .clone();
  match handler {
    Some(handler) => handler(&err),
    None => tracing::error!(label = err.as_label(), "{err}"),
  }
}

/// Extracts a readable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
  match payload.downcast_ref::<&str>() {
    Some(p) => (*p).to_string(),
    None => match payload.downcast_ref::<String>() {
      Some(p) => p.clone(),
      None => String::from("Unknown panic"),
    },
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn panic_payloads_become_messages() {
    let payload: Box<dyn Any + Send> = Box::new("boom");
    assert_eq!(panic_message(payload.as_ref()), "boom");

    let payload: Box<dyn Any + Send> = Box::new(String::from("owned boom"));
    assert_eq!(panic_message(payload.as_ref()), "owned boom");

    let payload: Box<dyn Any + Send> = Box::new(42_u8);
    assert_eq!(panic_message(payload.as_ref()), "Unknown panic");
  }

  #[test]
  fn display_mentions_periodic_stop() {
    let err = UiError::TaskPanicked {
      scheduler: "ui".into(),
      message: "bad".into(),
      periodic: true,
    };
    assert_eq!(err.to_string(), "task on `ui` panicked (periodic, stopped): bad");
    assert_eq!(err.as_label(), "periodic_task_panicked");

    let err = UiError::TaskPanicked {
      scheduler: "ui".into(),
      message: "bad".into(),
      periodic: false,
    };
    assert_eq!(err.to_string(), "task on `ui` panicked: bad");
  }
}
