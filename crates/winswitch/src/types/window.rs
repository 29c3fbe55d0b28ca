/*! Window, application and space value types shared with the UI layer. */

use super::{ProcessId, SpaceId, WindowIdentity};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Opaque reference to an OS window element, issued by the directory.
///
/// Two handles are equal iff they refer to the same OS element. Handles are
/// only meaningful to the directory that issued them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WindowHandle {
  pub pid: ProcessId,
  pub token: u64,
}

impl WindowHandle {
  pub const fn new(pid: ProcessId, token: u64) -> Self {
    Self { pid, token }
  }
}

/// A running process as reported by the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunningApplication {
  pub pid: ProcessId,
  /// Stable identity string. `None` for daemons and for processes that have
  /// already been torn down when the report arrives.
  pub bundle_id: Option<String>,
  pub name: String,
  pub is_hidden: bool,
  pub launch_complete: bool,
}

impl RunningApplication {
  pub fn new(pid: u32, bundle_id: &str, name: &str) -> Self {
    Self {
      pid: ProcessId(pid),
      bundle_id: Some(bundle_id.to_string()),
      name: name.to_string(),
      is_hidden: false,
      launch_complete: true,
    }
  }
}

/// A virtual desktop with its 1-based display index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Space {
  pub id: SpaceId,
  pub index: u32,
}

/// Where a window lives, as resolved by the space resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpaceAssignment {
  pub id: SpaceId,
  pub index: u32,
  pub on_all_spaces: bool,
}

/// Whether a switch session is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum Mode {
  #[default]
  Idle,
  Interactive,
}

/// One row of the registry as the UI sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct WindowSummary {
  pub identity: WindowIdentity,
  pub process_id: ProcessId,
  pub title: String,
  pub is_minimized: bool,
  pub is_hidden: bool,
  /// 1-based desktop index. None until resolved or when the window is on no
  /// desktop (minimized, hidden).
  pub space_index: Option<u32>,
  pub is_on_all_spaces: bool,
  /// Whether sessions offer this window under the configured display
  /// filters. The cursor never lands on a window with this unset.
  pub is_displayed: bool,
}

/// Read-only view of the registry and focus cursor.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Snapshot {
  /// Windows in registry order.
  pub windows: Vec<WindowSummary>,
  /// Index into `windows` of the selected window. None when empty.
  pub focus_index: Option<usize>,
  pub mode: Mode,
  /// Incremented every time a batch of mutations is applied.
  pub revision: u64,
}

impl Snapshot {
  /// The window under the focus cursor.
  pub fn focused(&self) -> Option<&WindowSummary> {
    self.focus_index.and_then(|i| self.windows.get(i))
  }

  /// Titles in registry order. Handy for logging and assertions.
  pub fn titles(&self) -> Vec<&str> {
    self.windows.iter().map(|w| w.title.as_str()).collect()
  }
}
