/*! Core types for winswitch.

Regenerate TypeScript types: `cargo test -p winswitch` (ts-rs exports on test).
*/

#![allow(missing_docs)]

mod attribute;
mod error;
mod event;
mod ids;
mod window;

pub use attribute::{AttributeKind, AttributeResult, Attributes, Rect, Size};
pub use error::{DirectoryError, DirectoryResult, SwitcherError, SwitcherResult};
pub use event::{AppEventKind, AppNotification, Event, Intent, LifecycleEvent};
pub use ids::{ProcessId, SpaceId, WindowIdentity, WindowNumber};
pub use window::{
  Mode, RunningApplication, Snapshot, Space, SpaceAssignment, WindowHandle, WindowSummary,
};
