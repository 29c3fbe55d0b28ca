/*!
Window Registry - the ordered set of switchable windows plus the focus cursor.

All fields are private. Mutations go through methods that keep the three
indexes (slot map, handle map, order) in agreement and rebase the cursor.
This guarantees:
- Identities are unique: a handle maps to at most one entry
- The cursor is in range whenever the registry is non-empty
- Removed identities never come back (slot map generations)

The cursor only lands on windows the [`DisplayFilter`] offers.

## Module Structure

- `mod.rs` - Registry struct, entry type, incremental operations
- `rebuild.rs` - full resynchronization and level sorting
*/

mod rebuild;

pub(crate) use rebuild::{AppWindows, DiscoveredWindow, RebuildInput};

use slotmap::{Key, KeyData, SlotMap};
use std::collections::HashMap;

use super::cursor::FocusCursor;
use super::display::DisplayFilter;
use crate::types::{
  Mode, ProcessId, Snapshot, SpaceAssignment, SpaceId, WindowHandle, WindowIdentity,
  WindowSummary,
};

slotmap::new_key_type! {
  /// Generation-tagged slot for a tracked window.
  pub(crate) struct WindowKey;
}

impl From<WindowKey> for WindowIdentity {
  fn from(key: WindowKey) -> Self {
    Self(key.data().as_ffi())
  }
}

impl From<WindowIdentity> for WindowKey {
  fn from(identity: WindowIdentity) -> Self {
    KeyData::from_ffi(identity.0).into()
  }
}

/// Which ordering the registry currently reflects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Ordering {
  /// Most recently used first.
  Mru,
  /// Window-server rank, after a rebuild or level sort.
  Rank,
}

/// A window ready to enter the registry.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct NewWindow {
  pub(crate) handle: WindowHandle,
  pub(crate) app_name: String,
  pub(crate) title: String,
  pub(crate) is_minimized: bool,
  pub(crate) is_hidden: bool,
  pub(crate) space: Option<SpaceAssignment>,
}

/// Per-window state.
#[derive(Debug, Clone)]
pub(crate) struct TrackedWindow {
  pub(crate) handle: WindowHandle,
  pub(crate) app_name: String,
  /// Raw accessibility title. May be empty for minimized/hidden windows.
  pub(crate) title: String,
  pub(crate) is_minimized: bool,
  pub(crate) is_hidden: bool,
  pub(crate) space: Option<SpaceAssignment>,
  pub(crate) rank: Option<usize>,
}

impl TrackedWindow {
  pub(crate) fn from_new(window: NewWindow) -> Self {
    Self {
      handle: window.handle,
      app_name: window.app_name,
      title: window.title,
      is_minimized: window.is_minimized,
      is_hidden: window.is_hidden,
      space: window.space,
      rank: None,
    }
  }

  /// Best-effort display title: the application name stands in for an empty one.
  pub(crate) fn display_title(&self) -> &str {
    if self.title.is_empty() {
      &self.app_name
    } else {
      &self.title
    }
  }
}

/// Is-actual-window predicate: a real application window has a title, or is
/// minimized, or belongs to a hidden application.
pub(crate) fn is_actual_window(title: &str, is_minimized: bool, is_hidden: bool) -> bool {
  !title.is_empty() || is_minimized || is_hidden
}

/// Authoritative ordered set of tracked windows.
#[derive(Debug)]
pub(crate) struct Registry {
  windows: SlotMap<WindowKey, TrackedWindow>,
  by_handle: HashMap<WindowHandle, WindowKey>,
  order: Vec<WindowKey>,
  cursor: FocusCursor,
  ordering: Ordering,
  filter: DisplayFilter,
}

impl Default for Registry {
  fn default() -> Self {
    Self::new()
  }
}

impl Registry {
  pub(crate) fn new() -> Self {
    Self::with_filter(DisplayFilter::default())
  }

  pub(crate) fn with_filter(filter: DisplayFilter) -> Self {
    Self {
      windows: SlotMap::with_key(),
      by_handle: HashMap::new(),
      order: Vec::new(),
      cursor: FocusCursor::default(),
      ordering: Ordering::Mru,
      filter,
    }
  }

  // ==========================================================================
  // Queries
  // ==========================================================================

  pub(crate) fn len(&self) -> usize {
    self.order.len()
  }

  pub(crate) fn is_empty(&self) -> bool {
    self.order.is_empty()
  }

  pub(crate) const fn ordering(&self) -> Ordering {
    self.ordering
  }

  pub(crate) fn identity_of(&self, handle: WindowHandle) -> Option<WindowIdentity> {
    self.by_handle.get(&handle).map(|k| (*k).into())
  }

  pub(crate) fn get(&self, identity: WindowIdentity) -> Option<&TrackedWindow> {
    self.windows.get(WindowKey::from(identity))
  }

  pub(crate) fn contains_handle(&self, handle: WindowHandle) -> bool {
    self.by_handle.contains_key(&handle)
  }

  /// Identities in registry order.
  #[cfg(test)]
  pub(crate) fn identities(&self) -> Vec<WindowIdentity> {
    self.order.iter().map(|k| (*k).into()).collect()
  }

  /// Handles of every tracked window, in registry order.
  pub(crate) fn handles(&self) -> Vec<(WindowIdentity, WindowHandle)> {
    self
      .order
      .iter()
      .filter_map(|k| self.windows.get(*k).map(|w| ((*k).into(), w.handle)))
      .collect()
  }

  fn position(&self, key: WindowKey) -> Option<usize> {
    self.order.iter().position(|k| *k == key)
  }

  /// Whether any window passes the display filter.
  pub(crate) fn has_displayed(&self) -> bool {
    (0..self.order.len()).any(|i| shown_at(&self.windows, &self.order, &self.filter, i))
  }

  // ==========================================================================
  // Display filter inputs
  // ==========================================================================

  /// Returns whether the filter changed.
  pub(crate) fn set_current_space(&mut self, space: SpaceId) -> bool {
    let before = self.filter;
    self.filter.set_current_space(space);
    self.filter != before
  }

  pub(crate) fn set_frontmost(&mut self, pid: ProcessId) {
    self.filter.set_frontmost(pid);
  }

  // ==========================================================================
  // Cursor
  // ==========================================================================

  #[cfg(test)]
  pub(crate) const fn cursor(&self) -> Option<usize> {
    self.cursor.get()
  }

  /// The window under the cursor.
  pub(crate) fn selected(&self) -> Option<(WindowIdentity, &TrackedWindow)> {
    let key = *self.order.get(self.cursor.get()?)?;
    self.windows.get(key).map(|w| (key.into(), w))
  }

  /// Select the first displayed window.
  pub(crate) fn reset_cursor(&mut self) {
    let Self {
      windows,
      order,
      cursor,
      filter,
      ..
    } = self;
    cursor.reset(order.len(), |i| shown_at(windows, order, filter, i));
  }

  /// Step over displayed windows only.
  pub(crate) fn cycle(&mut self, step: isize) {
    let Self {
      windows,
      order,
      cursor,
      filter,
      ..
    } = self;
    cursor.cycle(step, order.len(), |i| shown_at(windows, order, filter, i));
  }

  /// If the selected window stopped passing the filter, move forward to the
  /// next one that does. Returns whether the cursor moved.
  pub(crate) fn keep_selection_displayed(&mut self) -> bool {
    let hidden = self
      .selected()
      .is_some_and(|(_, w)| !self.filter.should_display(w));
    if !hidden {
      return false;
    }
    let before = self.cursor.get();
    self.cycle(1);
    self.cursor.get() != before
  }

  // ==========================================================================
  // Incremental mutations
  // ==========================================================================

  /// Prepend windows (first in `windows` ends up frontmost). Windows whose
  /// handle is already tracked are skipped. Returns the new identities.
  pub(crate) fn insert_front(&mut self, windows: Vec<NewWindow>) -> Vec<WindowIdentity> {
    let mut fresh = Vec::new();
    for window in windows {
      if self.by_handle.contains_key(&window.handle) {
        log::trace!("insert_front: {:?} already tracked, skipping", window.handle);
        continue;
      }
      let handle = window.handle;
      let key = self.windows.insert(TrackedWindow::from_new(window));
      self.by_handle.insert(handle, key);
      fresh.push(key);
    }
    if fresh.is_empty() {
      return Vec::new();
    }

    let inserted: Vec<usize> = (0..fresh.len()).collect();
    self.order.splice(0..0, fresh.iter().copied());
    self.cursor.on_insert_background(&inserted, self.order.len());
    self.ordering = Ordering::Mru;
    fresh.into_iter().map(Into::into).collect()
  }

  /// Remove the entry with `identity`. No-op if absent.
  pub(crate) fn remove_matching(&mut self, identity: WindowIdentity) -> Option<TrackedWindow> {
    let key = WindowKey::from(identity);
    let index = self.position(key)?;
    self.order.remove(index);
    let window = self.windows.remove(key)?;
    self.by_handle.remove(&window.handle);
    self.cursor.on_remove_background(index, self.order.len());
    Some(window)
  }

  /// Remove the entry for `handle`, if tracked.
  pub(crate) fn remove_handle(&mut self, handle: WindowHandle) -> Option<WindowIdentity> {
    let identity = self.identity_of(handle)?;
    self.remove_matching(identity).map(|_| identity)
  }

  /// Remove every window owned by `pid`. Returns how many were removed.
  pub(crate) fn remove_process(&mut self, pid: ProcessId) -> usize {
    let doomed: Vec<WindowIdentity> = self
      .order
      .iter()
      .rev()
      .filter(|k| self.windows.get(**k).is_some_and(|w| w.handle.pid == pid))
      .map(|k| (*k).into())
      .collect();
    // Back to front, so earlier removals don't shift later indices.
    doomed
      .into_iter()
      .filter(|id| self.remove_matching(*id).is_some())
      .count()
  }

  /// Move an existing entry to the front. The cursor keeps its logical window.
  pub(crate) fn move_to_front(&mut self, identity: WindowIdentity) -> bool {
    let key = WindowKey::from(identity);
    let Some(index) = self.position(key) else {
      return false;
    };
    self.ordering = Ordering::Mru;
    if index == 0 {
      return true;
    }
    let was_selected = self.cursor.get() == Some(index);
    self.order.remove(index);
    self.order.insert(0, key);
    if was_selected {
      self.cursor.set(0, self.order.len());
    } else if self.cursor.get().is_some_and(|c| c < index) {
      self.cursor.on_insert_background(&[0], self.order.len());
    }
    true
  }

  // ==========================================================================
  // Field updates (never reorder)
  // ==========================================================================

  /// Set the hidden flag on every window of `pid`. Returns the affected identities.
  pub(crate) fn set_hidden_for(&mut self, pid: ProcessId, hidden: bool) -> Vec<WindowIdentity> {
    let mut touched = Vec::new();
    for (key, window) in &mut self.windows {
      if window.handle.pid == pid && window.is_hidden != hidden {
        window.is_hidden = hidden;
        touched.push(key.into());
      }
    }
    touched
  }

  /// Returns the identity if the flag changed.
  pub(crate) fn set_minimized(
    &mut self,
    handle: WindowHandle,
    minimized: bool,
  ) -> Option<WindowIdentity> {
    let key = *self.by_handle.get(&handle)?;
    let window = self.windows.get_mut(key)?;
    if window.is_minimized == minimized {
      return None;
    }
    window.is_minimized = minimized;
    Some(key.into())
  }

  /// Apply a new title if the window still qualifies and the title differs.
  /// Returns the identity if something changed.
  pub(crate) fn set_title(
    &mut self,
    handle: WindowHandle,
    title: String,
  ) -> Option<WindowIdentity> {
    let key = *self.by_handle.get(&handle)?;
    let window = self.windows.get_mut(key)?;
    if window.title == title || !is_actual_window(&title, window.is_minimized, window.is_hidden) {
      return None;
    }
    window.title = title;
    Some(key.into())
  }

  pub(crate) fn set_space(
    &mut self,
    identity: WindowIdentity,
    space: Option<SpaceAssignment>,
  ) -> bool {
    match self.windows.get_mut(identity.into()) {
      Some(window) if window.space != space => {
        window.space = space;
        true
      }
      _ => false,
    }
  }

  // ==========================================================================
  // Snapshot
  // ==========================================================================

  pub(crate) fn snapshot(&self, mode: Mode, revision: u64) -> Snapshot {
    let windows = self
      .order
      .iter()
      .filter_map(|key| {
        let w = self.windows.get(*key)?;
        Some(WindowSummary {
          identity: (*key).into(),
          process_id: w.handle.pid,
          title: w.display_title().to_string(),
          is_minimized: w.is_minimized,
          is_hidden: w.is_hidden,
          space_index: w.space.map(|s| s.index),
          is_on_all_spaces: w.space.is_some_and(|s| s.on_all_spaces),
          is_displayed: self.filter.should_display(w),
        })
      })
      .collect();
    Snapshot {
      windows,
      focus_index: self.cursor.get(),
      mode,
      revision,
    }
  }
}

fn shown_at(
  windows: &SlotMap<WindowKey, TrackedWindow>,
  order: &[WindowKey],
  filter: &DisplayFilter,
  index: usize,
) -> bool {
  order
    .get(index)
    .and_then(|key| windows.get(*key))
    .is_some_and(|w| filter.should_display(w))
}

#[cfg(test)]
pub(crate) mod tests {
  use super::*;

  pub(crate) fn new_window(pid: u32, token: u64, title: &str) -> NewWindow {
    NewWindow {
      handle: WindowHandle::new(ProcessId(pid), token),
      app_name: format!("App {pid}"),
      title: title.to_string(),
      is_minimized: false,
      is_hidden: false,
      space: None,
    }
  }

  fn titles(registry: &Registry) -> Vec<String> {
    registry
      .snapshot(Mode::Idle, 0)
      .windows
      .into_iter()
      .map(|w| w.title)
      .collect()
  }

  fn registry_of(names: &[&str]) -> Registry {
    let mut registry = Registry::new();
    // insert_front prepends, so insert in reverse to get `names` order.
    for (token, name) in names.iter().enumerate().rev() {
      registry.insert_front(vec![new_window(1, token as u64, name)]);
    }
    registry.reset_cursor();
    registry
  }

  #[test]
  fn insert_front_prepends_in_batch_order() {
    let mut registry = registry_of(&["c"]);
    registry.insert_front(vec![new_window(1, 10, "a"), new_window(1, 11, "b")]);
    assert_eq!(titles(&registry), vec!["a", "b", "c"]);
  }

  #[test]
  fn duplicate_insert_is_noop() {
    let mut registry = registry_of(&["a", "b"]);
    let inserted = registry.insert_front(vec![new_window(1, 0, "a again")]);
    assert!(inserted.is_empty());
    assert_eq!(titles(&registry), vec!["a", "b"]);
  }

  #[test]
  fn insert_keeps_selected_window() {
    let mut registry = registry_of(&["w1", "w2", "w3"]);
    registry.cycle(1);
    registry.insert_front(vec![new_window(1, 4, "w4")]);
    assert_eq!(registry.selected().map(|(_, w)| w.title.as_str()), Some("w2"));
    assert_eq!(registry.cursor(), Some(2));
  }

  #[test]
  fn removed_identity_is_never_reused() {
    let mut registry = registry_of(&["a"]);
    let old = registry.identities()[0];
    registry.remove_matching(old);
    let new = registry.insert_front(vec![new_window(1, 0, "a")])[0];
    assert_ne!(old, new);
    assert!(registry.remove_matching(old).is_none());
    assert_eq!(registry.len(), 1);
  }

  #[test]
  fn remove_selected_moves_to_next_survivor() {
    let mut registry = registry_of(&["a", "b", "c"]);
    registry.cycle(1);
    let b = registry.selected().map(|(id, _)| id).unwrap();
    registry.remove_matching(b);
    assert_eq!(registry.selected().map(|(_, w)| w.title.as_str()), Some("c"));
  }

  #[test]
  fn remove_process_cascades() {
    let mut registry = Registry::new();
    registry.insert_front(vec![
      new_window(1, 1, "a1"),
      new_window(2, 2, "b"),
      new_window(1, 3, "a2"),
    ]);
    registry.reset_cursor();
    registry.cycle(1);
    assert_eq!(registry.remove_process(ProcessId(1)), 2);
    assert_eq!(titles(&registry), vec!["b"]);
    assert_eq!(registry.cursor(), Some(0));
  }

  #[test]
  fn move_to_front_preserves_selection() {
    let mut registry = registry_of(&["a", "b", "c"]);
    registry.cycle(1);
    let c = registry.identities()[2];
    assert!(registry.move_to_front(c));
    assert_eq!(titles(&registry), vec!["c", "a", "b"]);
    assert_eq!(registry.selected().map(|(_, w)| w.title.as_str()), Some("b"));
  }

  #[test]
  fn move_selected_to_front_follows_it() {
    let mut registry = registry_of(&["a", "b", "c"]);
    registry.cycle(2);
    let c = registry.identities()[2];
    registry.move_to_front(c);
    assert_eq!(registry.cursor(), Some(0));
  }

  #[test]
  fn title_update_requires_change_and_predicate() {
    let mut registry = registry_of(&["a"]);
    let handle = WindowHandle::new(ProcessId(1), 0);
    assert!(registry.set_title(handle, "a".into()).is_none());
    assert!(registry.set_title(handle, String::new()).is_none());
    assert!(registry.set_title(handle, "b".into()).is_some());

    registry.set_minimized(handle, true);
    assert!(registry.set_title(handle, String::new()).is_some());
    assert_eq!(titles(&registry), vec!["App 1"]);
  }

  #[test]
  fn hidden_flag_applies_to_whole_process() {
    let mut registry = Registry::new();
    registry.insert_front(vec![
      new_window(1, 1, "a"),
      new_window(2, 2, "b"),
      new_window(1, 3, "c"),
    ]);
    assert_eq!(registry.set_hidden_for(ProcessId(1), true).len(), 2);
    assert!(registry.set_hidden_for(ProcessId(1), true).is_empty());
    let hidden: Vec<bool> = registry
      .snapshot(Mode::Idle, 0)
      .windows
      .iter()
      .map(|w| w.is_hidden)
      .collect();
    assert_eq!(hidden, vec![true, false, true]);
  }

  #[test]
  fn cursor_skips_filtered_windows() {
    let config = crate::core::config::SwitcherConfig {
      show_minimized: false,
      ..Default::default()
    };
    let mut registry = Registry::with_filter(DisplayFilter::from_config(&config));
    let mut minimized = new_window(1, 0, "min");
    minimized.is_minimized = true;
    registry.insert_front(vec![minimized, new_window(1, 1, "a"), new_window(1, 2, "b")]);

    registry.reset_cursor();
    assert_eq!(registry.selected().map(|(_, w)| w.title.as_str()), Some("a"));
    registry.cycle(1);
    registry.cycle(1);
    assert_eq!(registry.selected().map(|(_, w)| w.title.as_str()), Some("a"));

    let displayed: Vec<bool> = registry
      .snapshot(Mode::Interactive, 0)
      .windows
      .iter()
      .map(|w| w.is_displayed)
      .collect();
    assert_eq!(displayed, vec![false, true, true]);
  }

  #[test]
  fn selection_leaves_a_window_that_stops_being_displayed() {
    let config = crate::core::config::SwitcherConfig {
      show_minimized: false,
      ..Default::default()
    };
    let mut registry = Registry::with_filter(DisplayFilter::from_config(&config));
    registry.insert_front(vec![new_window(1, 0, "a"), new_window(1, 1, "b")]);
    registry.reset_cursor();
    assert!(!registry.keep_selection_displayed());

    registry.set_minimized(WindowHandle::new(ProcessId(1), 0), true);
    assert!(registry.keep_selection_displayed());
    assert_eq!(registry.selected().map(|(_, w)| w.title.as_str()), Some("b"));

    registry.set_minimized(WindowHandle::new(ProcessId(1), 1), true);
    assert!(!registry.has_displayed());
    assert!(!registry.keep_selection_displayed());
  }

  #[test]
  fn identity_round_trips_through_key() {
    let mut registry = registry_of(&["a"]);
    let id = registry.identities()[0];
    assert_eq!(registry.get(id).map(|w| w.title.as_str()), Some("a"));
    assert_eq!(registry.identity_of(WindowHandle::new(ProcessId(1), 0)), Some(id));
  }
}
