//! Operators.
//!
//! General-purpose operators are not part of this crate. The one operator it
//! does provide moves a stream onto the UI thread.

pub mod observe_on_ui;

pub use observe_on_ui::{ObserveOnUi, ObserveOnUiExt};
