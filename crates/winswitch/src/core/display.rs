/*!
Which tracked windows a session offers.

The registry keeps every switchable window; the filter only decides which of
them the cursor may land on. Filter options come from config; the current
desktop and the frontmost application are learned from resolutions and
activation events.
*/

use super::config::{AppsToShow, SpacesToShow, SwitcherConfig};
use super::registry::TrackedWindow;
use crate::types::{ProcessId, SpaceId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct DisplayFilter {
  show_minimized: bool,
  show_hidden: bool,
  spaces: SpacesToShow,
  apps: AppsToShow,
  current_space: Option<SpaceId>,
  frontmost: Option<ProcessId>,
}

impl Default for DisplayFilter {
  /// Offers everything.
  fn default() -> Self {
    Self {
      show_minimized: true,
      show_hidden: true,
      spaces: SpacesToShow::All,
      apps: AppsToShow::All,
      current_space: None,
      frontmost: None,
    }
  }
}

impl DisplayFilter {
  pub(crate) fn from_config(config: &SwitcherConfig) -> Self {
    Self {
      show_minimized: config.show_minimized,
      show_hidden: config.show_hidden,
      spaces: config.spaces_to_show,
      apps: config.apps_to_show,
      ..Self::default()
    }
  }

  pub(crate) fn set_current_space(&mut self, space: SpaceId) {
    self.current_space = Some(space);
  }

  pub(crate) fn set_frontmost(&mut self, pid: ProcessId) {
    self.frontmost = Some(pid);
  }

  pub(crate) fn should_display(&self, window: &TrackedWindow) -> bool {
    if window.is_minimized && !self.show_minimized {
      return false;
    }
    if window.is_hidden && !self.show_hidden {
      return false;
    }
    self.space_allows(window) && self.app_allows(window.handle.pid)
  }

  /// Windows with no resolved desktop pass: membership is unknown, not absent.
  fn space_allows(&self, window: &TrackedWindow) -> bool {
    match (self.spaces, self.current_space, window.space) {
      (SpacesToShow::All, _, _) | (SpacesToShow::Current, None, _) | (_, _, None) => true,
      (SpacesToShow::Current, Some(current), Some(space)) => {
        space.on_all_spaces || space.id == current
      }
    }
  }

  fn app_allows(&self, pid: ProcessId) -> bool {
    match (self.apps, self.frontmost) {
      (AppsToShow::All, _) | (_, None) => true,
      (AppsToShow::Active, Some(front)) => pid == front,
      (AppsToShow::NonActive, Some(front)) => pid != front,
    }
  }
}
