//! Per-scheduler configuration.
//!
//! A [`SchedulerConfig`] is handed to [`UiScheduler::with_config`] at
//! construction time and shared by the scheduler and every worker it creates.
//!
//! [`UiScheduler::with_config`]: crate::scheduler::UiScheduler::with_config

use std::{
  fmt::{Debug, Formatter},
  sync::Arc,
};

use crate::error::{self, ErrorHandler, UiError};

/// A task body as it travels through the scheduler.
///
/// One-shot bodies are adapted to `FnMut` so that one decoration hook can wrap
/// both one-shot and periodic tasks.
pub type Runnable = Box<dyn FnMut() + Send>;

/// Wraps every task body before it is handed to the host.
pub type ScheduleHook = Arc<dyn Fn(Runnable) -> Runnable + Send + Sync>;

/// Configuration of a [`UiScheduler`](crate::scheduler::UiScheduler).
///
/// ```rust
/// use rxui::config::SchedulerConfig;
///
/// let config = SchedulerConfig::new()
///   .with_name("main")
///   .with_on_schedule(|mut task| Box::new(move || task()))
///   .with_error_handler(|err| eprintln!("{err}"));
/// assert_eq!(config.name(), "main");
/// ```
#[derive(Clone)]
pub struct SchedulerConfig {
  name: String,
  on_schedule: Option<ScheduleHook>,
  on_error: Option<ErrorHandler>,
}

impl Default for SchedulerConfig {
  fn default() -> Self { Self { name: String::from("ui"), on_schedule: None, on_error: None } }
}

impl SchedulerConfig {
  pub fn new() -> Self { Self::default() }

  /// Names the scheduler. The name shows up in logs and in
  /// [`UiError::TaskPanicked`].
  pub fn with_name(mut self, name: impl Into<String>) -> Self {
    self.name = name.into();
    self
  }

  /// Installs a hook that decorates every task body at submission time.
  pub fn with_on_schedule<F>(mut self, hook: F) -> Self
  where
    F: Fn(Runnable) -> Runnable + Send + Sync + 'static,
  {
    self.on_schedule = Some(Arc::new(hook));
    self
  }

  /// Routes this scheduler's errors to `handler` instead of the process-wide
  /// handler.
  pub fn with_error_handler<F>(mut self, handler: F) -> Self
  where
    F: Fn(&UiError) + Send + Sync + 'static,
  {
    self.on_error = Some(Arc::new(handler));
    self
  }

  #[inline]
  pub fn name(&self) -> &str { &self.name }

  pub(crate) fn decorate(&self, task: Runnable) -> Runnable {
    match &self.on_schedule {
      Some(hook) => hook(task),
      None => task,
    }
  }

  pub(crate) fn report(&self, err: UiError) {
    match &self.on_error {
      Some(handler) => handler(&err),
      None => error::on_error(err),
    }
  }
}

impl Debug for SchedulerConfig {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("SchedulerConfig")
      .field("name", &self.name)
      .field("on_schedule", &self.on_schedule.is_some())
      .field("on_error", &self.on_error.is_some())
      .finish()
  }
}

#[cfg(test)]
mod tests {
  use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Mutex,
  };

  use super::*;

  #[test]
  fn default_name() {
    let config = SchedulerConfig::default();
    assert_eq!(config.name(), "ui");
    assert_eq!(
      format!("{config:?}"),
      "SchedulerConfig { name: \"ui\", on_schedule: false, on_error: false }"
    );
  }

  #[test]
  fn decorate_wraps_the_body() {
    let wrapped = Arc::new(AtomicUsize::new(0));
    let c_wrapped = wrapped.clone();
    let config = SchedulerConfig::new().with_on_schedule(move |mut task| {
      let wrapped = c_wrapped.clone();
      Box::new(move || {
        wrapped.fetch_add(1, Ordering::SeqCst);
        task();
      })
    });

    let ran = Arc::new(AtomicUsize::new(0));
    let c_ran = ran.clone();
    let mut task = config.decorate(Box::new(move || {
      c_ran.fetch_add(1, Ordering::SeqCst);
    }));
    task();
    task();
    assert_eq!(wrapped.load(Ordering::SeqCst), 2);
    assert_eq!(ran.load(Ordering::SeqCst), 2);
  }

  #[test]
  fn report_prefers_instance_handler() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let c_seen = seen.clone();
    let config = SchedulerConfig::new()
      .with_error_handler(move |err| c_seen.lock().unwrap().push(err.as_label()));
    config.report(UiError::ListenerPanicked { message: "x".into() });
    assert_eq!(*seen.lock().unwrap(), vec!["listener_panicked"]);
  }
}
