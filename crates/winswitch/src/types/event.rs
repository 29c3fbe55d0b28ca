/*! Inbound notifications, input intents, and outbound UI events. */

use super::{ProcessId, RunningApplication, WindowHandle, WindowIdentity};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Per-process notification kinds a directory subscription can deliver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppEventKind {
  ApplicationActivated,
  WindowCreated,
  WindowDestroyed,
  FocusedWindowChanged,
  ApplicationHidden,
  ApplicationShown,
  WindowMinimized,
  WindowDeminimized,
  TitleChanged,
}

impl AppEventKind {
  /// Everything the engine subscribes to for each tracked process.
  pub const ALL: [Self; 9] = [
    Self::ApplicationActivated,
    Self::WindowCreated,
    Self::WindowDestroyed,
    Self::FocusedWindowChanged,
    Self::ApplicationHidden,
    Self::ApplicationShown,
    Self::WindowMinimized,
    Self::WindowDeminimized,
    Self::TitleChanged,
  ];
}

/// A notification from a per-process subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppNotification {
  pub pid: ProcessId,
  pub kind: AppEventKind,
  /// The window the notification is about. None for app-scoped kinds.
  pub window: Option<WindowHandle>,
}

impl AppNotification {
  pub const fn app(pid: ProcessId, kind: AppEventKind) -> Self {
    Self { pid, kind, window: None }
  }

  pub const fn window(kind: AppEventKind, window: WindowHandle) -> Self {
    Self {
      pid: window.pid,
      kind,
      window: Some(window),
    }
  }
}

/// Notifications from the global process-lifecycle observer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
  Launched(Vec<RunningApplication>),
  Terminated(Vec<RunningApplication>),
  LaunchCompleted(ProcessId),
  /// The active desktop changed.
  SpaceChanged,
}

/// Discrete actions from the global shortcut listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum Intent {
  CycleNext,
  CyclePrevious,
  BeginSession,
  CommitFocus,
  CancelSession,
}

/// Events emitted to the UI layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[serde(tag = "event", content = "data")]
#[ts(export)]
pub enum Event {
  /// A batch of mutations was applied; re-read the snapshot.
  #[serde(rename = "switcher:changed")]
  Changed { revision: u64 },

  /// A session opened; show the UI.
  #[serde(rename = "switcher:show")]
  Show,

  /// The session ended or there is nothing left to show.
  #[serde(rename = "switcher:hide")]
  Hide,

  /// A window's content changed; re-capture its thumbnail.
  #[serde(rename = "window:thumbnail")]
  RefreshThumbnail { window: WindowIdentity },
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn events_serialize_with_tag_and_data() {
    let changed = serde_json::to_value(Event::Changed { revision: 3 }).unwrap();
    assert_eq!(changed, json!({ "event": "switcher:changed", "data": { "revision": 3 } }));

    let hide = serde_json::to_value(Event::Hide).unwrap();
    assert_eq!(hide, json!({ "event": "switcher:hide" }));

    let thumb = serde_json::to_value(Event::RefreshThumbnail {
      window: WindowIdentity(9),
    })
    .unwrap();
    assert_eq!(thumb, json!({ "event": "window:thumbnail", "data": { "window": 9 } }));
  }

  #[test]
  fn intents_use_snake_case() {
    let intent: Intent = serde_json::from_value(json!("cycle_previous")).unwrap();
    assert_eq!(intent, Intent::CyclePrevious);
  }
}
