//! Watch controller
//!
//! Owns the filesystem watch session and turns its notifications into
//! create/update/delete sync events.

mod controller;
mod notify_source;
mod source;

pub use controller::{WatchController, WatchSession, WatchState};
pub use notify_source::{map_event, Debouncer, NotifySource, DEBOUNCE_MS};
pub use source::{Subscription, WatchEventKind, WatchNotification, WatchSource, WatchSpec};
