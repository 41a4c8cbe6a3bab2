//! Page session
//!
//! Lifecycle: `activate` → handlers → `teardown`, with navigation signals
//! debounced into URL-key changes that drive `navigate`.

mod controller;
mod navigation;
mod signals;

pub use controller::{format_preview, ListEntry, Mode, MouseButton, PageSession, FOCUS_DURATION};
pub use navigation::{NavigationDebouncer, NavigationSignal, URL_CHECK_DELAY};
pub use signals::{InboundSignal, OutboundSignal, SignalError};
