/*! Engine configuration. */

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::types::ProcessId;

const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_RETRY_DELAY_MS: u64 = 5;
const DEFAULT_WORKER_THREADS: usize = 4;
const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 1000;

/// Bundle ids of singleton utility panels the OS reports on every desktop.
const DEFAULT_PINNED: [&str; 2] = ["com.apple.systempreferences", "com.apple.Preferences"];

/// Which desktops a session offers windows from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpacesToShow {
  /// Every desktop.
  #[default]
  All,
  /// Only windows on the current desktop (or on every desktop).
  Current,
}

/// Which applications a session offers windows from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppsToShow {
  /// Every tracked application.
  #[default]
  All,
  /// Only the frontmost application.
  Active,
  /// Everything except the frontmost application.
  NonActive,
}

/// Engine settings. Loadable from JSON; missing fields take defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwitcherConfig {
  /// The switcher's own process; never tracked.
  pub exclude_pid: Option<ProcessId>,
  /// Bundle ids that are never tracked.
  pub blacklist: Vec<String>,
  /// Bundle ids whose windows are always shown on the current desktop.
  pub pinned_bundle_ids: Vec<String>,
  /// A window must be larger than this on both axes to be switchable.
  pub min_window_size: f64,
  /// Offer minimized windows while cycling.
  pub show_minimized: bool,
  /// Offer windows of hidden applications while cycling.
  pub show_hidden: bool,
  pub spaces_to_show: SpacesToShow,
  pub apps_to_show: AppsToShow,
  /// Attempts per directory call before falling back to cached data.
  pub max_attempts: u32,
  pub retry_delay_ms: u64,
  /// Size of the pool that runs directory queries off the reconciler thread.
  pub worker_threads: usize,
  pub event_channel_capacity: usize,
}

impl Default for SwitcherConfig {
  fn default() -> Self {
    Self {
      exclude_pid: None,
      blacklist: Vec::new(),
      pinned_bundle_ids: DEFAULT_PINNED.iter().map(ToString::to_string).collect(),
      min_window_size: 0.0,
      show_minimized: true,
      show_hidden: true,
      spaces_to_show: SpacesToShow::All,
      apps_to_show: AppsToShow::All,
      max_attempts: DEFAULT_MAX_ATTEMPTS,
      retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
      worker_threads: DEFAULT_WORKER_THREADS,
      event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
    }
  }
}

impl SwitcherConfig {
  pub(crate) const fn retry_delay(&self) -> Duration {
    Duration::from_millis(self.retry_delay_ms)
  }

  pub(crate) fn is_blacklisted(&self, bundle_id: &str) -> bool {
    self.blacklist.iter().any(|b| b == bundle_id)
  }

  pub(crate) fn is_pinned(&self, bundle_id: Option<&str>) -> bool {
    bundle_id.is_some_and(|id| self.pinned_bundle_ids.iter().any(|p| p == id))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn partial_json_takes_defaults() {
    let config: SwitcherConfig =
      serde_json::from_str(r#"{ "blacklist": ["com.example.hud"], "max_attempts": 5 }"#).unwrap();
    assert_eq!(config.max_attempts, 5);
    assert!(config.is_blacklisted("com.example.hud"));
    assert_eq!(config.retry_delay_ms, DEFAULT_RETRY_DELAY_MS);
    assert!(config.is_pinned(Some("com.apple.systempreferences")));
  }

  #[test]
  fn display_filters_parse_snake_case() {
    let config: SwitcherConfig = serde_json::from_str(
      r#"{ "show_minimized": false, "spaces_to_show": "current", "apps_to_show": "non_active" }"#,
    )
    .unwrap();
    assert!(!config.show_minimized);
    assert!(config.show_hidden);
    assert_eq!(config.spaces_to_show, SpacesToShow::Current);
    assert_eq!(config.apps_to_show, AppsToShow::NonActive);
  }

  #[test]
  fn missing_bundle_is_never_pinned() {
    assert!(!SwitcherConfig::default().is_pinned(None));
  }
}
