/*!
Space resolver: virtual desktops and window membership.

Desktops are re-resolved on demand, never cached past one job. A
[`SpaceLayout`] is the result of one resolution pass: every desktop, the
current one, and which desktops each on-screen window sits on.
*/

use std::collections::HashMap;

use super::attributes::RetryPolicy;
use crate::platform::WindowDirectory;
use crate::types::{DirectoryResult, Space, SpaceAssignment, SpaceId, WindowHandle, WindowNumber};

/// Desktop membership resolved in one pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SpaceLayout {
  pub(crate) spaces: Vec<Space>,
  pub(crate) current: Space,
  membership: HashMap<WindowNumber, Vec<SpaceId>>,
}

impl SpaceLayout {
  pub(crate) fn new(spaces: Vec<Space>, current: SpaceId) -> Self {
    let current = spaces
      .iter()
      .copied()
      .find(|s| s.id == current)
      .unwrap_or(Space {
        id: current,
        index: 0,
      });
    Self {
      spaces,
      current,
      membership: HashMap::new(),
    }
  }

  /// Record that `number` is on `space`.
  pub(crate) fn add_member(&mut self, number: WindowNumber, space: SpaceId) {
    let entry = self.membership.entry(number).or_default();
    if !entry.contains(&space) {
      entry.push(space);
    }
  }

  fn index_of(&self, id: SpaceId) -> Option<u32> {
    self.spaces.iter().find(|s| s.id == id).map(|s| s.index)
  }

  /// Where a window should be shown.
  ///
  /// Pinned windows always show on the current desktop. A window the OS lists
  /// on several desktops shows on the current one, flagged as on all spaces.
  /// `None` means the window is on no desktop (minimized, hidden, or stale).
  pub(crate) fn assign(&self, number: WindowNumber, pinned: bool) -> Option<SpaceAssignment> {
    if pinned {
      return Some(self.on_current(false));
    }
    match self.membership.get(&number).map(Vec::as_slice) {
      None | Some([]) => None,
      Some([id]) => self.index_of(*id).map(|index| SpaceAssignment {
        id: *id,
        index,
        on_all_spaces: false,
      }),
      Some(_) => Some(self.on_current(true)),
    }
  }

  const fn on_current(&self, on_all_spaces: bool) -> SpaceAssignment {
    SpaceAssignment {
      id: self.current.id,
      index: self.current.index,
      on_all_spaces,
    }
  }
}

/// Resolves desktops through the directory, with bounded retry.
pub(crate) struct SpaceResolver<'a> {
  directory: &'a dyn WindowDirectory,
  retry: RetryPolicy,
}

impl<'a> SpaceResolver<'a> {
  pub(crate) const fn new(directory: &'a dyn WindowDirectory, retry: RetryPolicy) -> Self {
    Self { directory, retry }
  }

  /// Every desktop with its 1-based index.
  pub(crate) fn all_spaces(&self) -> DirectoryResult<Vec<Space>> {
    self.retry.run("spaces", || self.directory.spaces())
  }

  pub(crate) fn current_space(&self) -> DirectoryResult<SpaceId> {
    self.retry.run("current_space", || self.directory.current_space())
  }

  /// Resolve the desktop of a single window.
  pub(crate) fn space_for(
    &self,
    handle: WindowHandle,
    pinned: bool,
  ) -> DirectoryResult<Option<SpaceAssignment>> {
    let mut layout = SpaceLayout::new(self.all_spaces()?, self.current_space()?);
    if pinned {
      return Ok(layout.assign(WindowNumber::INVALID, true));
    }
    let number = self
      .retry
      .run("window_number", || self.directory.window_number(handle))?;
    if !number.is_valid() {
      return Ok(None);
    }
    let ids = self
      .retry
      .run("spaces_for_window", || self.directory.spaces_for_window(number))?;
    for id in ids {
      layout.add_member(number, id);
    }
    Ok(layout.assign(number, false))
  }

  /// Resolve membership of every on-screen window on every desktop.
  pub(crate) fn layout(&self) -> DirectoryResult<SpaceLayout> {
    let mut layout = SpaceLayout::new(self.all_spaces()?, self.current_space()?);
    let ids: Vec<SpaceId> = layout.spaces.iter().map(|s| s.id).collect();
    for id in ids {
      let numbers = self
        .retry
        .run("windows_in_spaces", || self.directory.windows_in_spaces(&[id]))?;
      for number in numbers {
        layout.add_member(number, id);
      }
    }
    Ok(layout)
  }

  /// Global front-to-back order across every desktop.
  pub(crate) fn z_order(&self, layout: &SpaceLayout) -> DirectoryResult<Vec<WindowNumber>> {
    let ids: Vec<SpaceId> = layout.spaces.iter().map(|s| s.id).collect();
    self
      .retry
      .run("windows_in_spaces", || self.directory.windows_in_spaces(&ids))
  }

  /// Front-to-back order on the current desktop only.
  pub(crate) fn current_z_order(&self) -> DirectoryResult<Vec<WindowNumber>> {
    let current = self.current_space()?;
    self
      .retry
      .run("windows_in_spaces", || self.directory.windows_in_spaces(&[current]))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::platform::memory::MemoryDirectory;
  use crate::types::{ProcessId, RunningApplication};
  use std::time::Duration;

  fn two_spaces() -> SpaceLayout {
    SpaceLayout::new(
      vec![
        Space {
          id: SpaceId(10),
          index: 1,
        },
        Space {
          id: SpaceId(20),
          index: 2,
        },
      ],
      SpaceId(20),
    )
  }

  #[test]
  fn single_membership_uses_that_space() {
    let mut layout = two_spaces();
    layout.add_member(WindowNumber(5), SpaceId(10));
    assert_eq!(
      layout.assign(WindowNumber(5), false),
      Some(SpaceAssignment {
        id: SpaceId(10),
        index: 1,
        on_all_spaces: false
      })
    );
  }

  #[test]
  fn multiple_memberships_show_on_current() {
    let mut layout = two_spaces();
    layout.add_member(WindowNumber(5), SpaceId(10));
    layout.add_member(WindowNumber(5), SpaceId(20));
    let assigned = layout.assign(WindowNumber(5), false).unwrap();
    assert_eq!(assigned.index, 2);
    assert!(assigned.on_all_spaces);
  }

  #[test]
  fn pinned_overrides_reported_membership() {
    let mut layout = two_spaces();
    layout.add_member(WindowNumber(5), SpaceId(10));
    layout.add_member(WindowNumber(5), SpaceId(20));
    let assigned = layout.assign(WindowNumber(5), true).unwrap();
    assert_eq!(assigned.id, SpaceId(20));
    assert!(!assigned.on_all_spaces);
  }

  #[test]
  fn no_membership_is_unassigned() {
    assert_eq!(two_spaces().assign(WindowNumber(9), false), None);
  }

  #[test]
  fn resolver_reads_directory() {
    let dir = MemoryDirectory::new();
    let second = dir.add_space();
    dir.add_app(RunningApplication::new(1, "com.test.one", "One"));
    let w = dir.add_window(ProcessId(1), "w");
    dir.move_to_spaces(w, &[second]);

    let resolver = SpaceResolver::new(&dir, RetryPolicy::new(1, Duration::ZERO));
    assert_eq!(resolver.all_spaces().unwrap().len(), 2);
    assert_eq!(resolver.current_space().unwrap(), SpaceId(1));
    let assigned = resolver.space_for(w, false).unwrap().unwrap();
    assert_eq!((assigned.id, assigned.index), (second, 2));

    let layout = resolver.layout().unwrap();
    let number = dir.window_number(w).unwrap();
    assert_eq!(layout.assign(number, false).map(|s| s.index), Some(2));
  }
}
