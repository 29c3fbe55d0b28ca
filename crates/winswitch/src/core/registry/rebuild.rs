/*!
Full resynchronization against window-server truth.

Merges three sources:
- the global front-to-back window list (rank)
- per-desktop window lists (membership, via [`SpaceLayout`])
- each process's own window enumeration (catches minimized/off-screen windows)
*/

use std::collections::{HashMap, HashSet};

use super::{NewWindow, Ordering, Registry, TrackedWindow, WindowKey};
use crate::core::spaces::SpaceLayout;
use crate::core::tracker::AppInfo;
use crate::types::{ProcessId, WindowHandle, WindowNumber};

/// A window read from a process's own enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DiscoveredWindow {
  pub(crate) handle: WindowHandle,
  pub(crate) number: WindowNumber,
  pub(crate) title: String,
  pub(crate) is_minimized: bool,
}

/// One process and its eligible windows, in enumeration order.
#[derive(Debug, Clone)]
pub(crate) struct AppWindows {
  pub(crate) app: AppInfo,
  pub(crate) windows: Vec<DiscoveredWindow>,
}

/// Everything a rebuild needs, gathered off the reconciler thread.
#[derive(Debug, Clone)]
pub(crate) struct RebuildInput {
  /// Window numbers on every desktop, front to back.
  pub(crate) z_order: Vec<WindowNumber>,
  pub(crate) layout: SpaceLayout,
  pub(crate) apps: Vec<AppWindows>,
}

impl DiscoveredWindow {
  pub(crate) fn into_new(self, app: &AppInfo, layout: Option<&SpaceLayout>) -> NewWindow {
    NewWindow {
      handle: self.handle,
      app_name: app.name.clone(),
      title: self.title,
      is_minimized: self.is_minimized,
      is_hidden: app.is_hidden,
      space: layout.and_then(|l| l.assign(self.number, app.pinned)),
    }
  }
}

impl Registry {
  /// Replace the contents of the registry with a fresh view.
  ///
  /// Windows that are on no desktop are kept only if minimized or owned by a
  /// hidden process; anything else is stale. Result order is rank ascending,
  /// unranked last, ties in enumeration order. Windows of processes the input
  /// doesn't cover are kept after the rest. Tracked windows in `keep` that
  /// the input doesn't mention arrived after it was gathered; they stay at
  /// the front in their current order. Surviving windows keep their
  /// identity, and the cursor follows the selected window if it survives.
  pub(crate) fn rebuild_from_spaces(
    &mut self,
    input: RebuildInput,
    keep: &HashSet<WindowHandle>,
  ) {
    let ranks: HashMap<WindowNumber, usize> = input
      .z_order
      .iter()
      .enumerate()
      .filter(|(_, n)| n.is_valid())
      .map(|(rank, n)| (*n, rank))
      .collect();
    let covered: HashSet<ProcessId> = input.apps.iter().map(|a| a.app.pid).collect();

    let mut seen = HashSet::new();
    let mut candidates: Vec<(Option<usize>, NewWindow)> = Vec::new();
    for AppWindows { app, windows } in input.apps {
      for window in windows {
        if !seen.insert(window.handle) {
          continue;
        }
        let rank = ranks.get(&window.number).copied();
        let new = window.into_new(&app, Some(&input.layout));
        if new.space.is_none() && !new.is_minimized && !new.is_hidden {
          log::trace!("rebuild: {:?} is on no desktop, dropping as stale", new.handle);
          continue;
        }
        candidates.push((rank, new));
      }
    }
    candidates.sort_by_key(|(rank, _)| rank.unwrap_or(usize::MAX));
    self.filter.set_current_space(input.layout.current.id);

    let gathered: HashSet<WindowHandle> = candidates.iter().map(|(_, w)| w.handle).collect();
    let recent: Vec<WindowKey> = self
      .order
      .iter()
      .copied()
      .filter(|key| {
        self
          .windows
          .get(*key)
          .is_some_and(|w| keep.contains(&w.handle) && !gathered.contains(&w.handle))
      })
      .collect();

    let previous_selection = self.selected().map(|(id, _)| WindowKey::from(id));
    let previous_index = self.cursor.get();

    let mut order = recent.clone();
    for (rank, new) in candidates {
      let key = match self.by_handle.get(&new.handle).copied() {
        Some(key) => {
          if let Some(existing) = self.windows.get_mut(key) {
            existing.title = new.title;
            existing.is_minimized = new.is_minimized;
            existing.is_hidden = new.is_hidden;
            existing.space = new.space;
            existing.app_name = new.app_name;
            existing.rank = rank;
          }
          key
        }
        None => {
          let handle = new.handle;
          let mut tracked = TrackedWindow::from_new(new);
          tracked.rank = rank;
          let key = self.windows.insert(tracked);
          self.by_handle.insert(handle, key);
          key
        }
      };
      order.push(key);
    }

    for key in &self.order {
      let uncovered = self
        .windows
        .get(*key)
        .is_some_and(|w| !covered.contains(&w.handle.pid));
      if uncovered && !recent.contains(key) {
        order.push(*key);
      }
    }

    let kept: HashSet<WindowKey> = order.iter().copied().collect();
    let stale: Vec<WindowKey> = self
      .order
      .iter()
      .copied()
      .filter(|k| !kept.contains(k))
      .collect();
    for key in &stale {
      if let Some(window) = self.windows.remove(*key) {
        self.by_handle.remove(&window.handle);
      }
    }
    log::debug!(
      "rebuild: {} windows ({} dropped)",
      order.len(),
      stale.len()
    );

    self.order = order;
    self.ordering = Ordering::Rank;
    self.restore_selection(previous_selection, previous_index);
  }

  /// Reorder the windows that have a level (those on the current desktop)
  /// among the slots they already occupy. Other windows don't move.
  pub(crate) fn sort_by_level(&mut self, levels: &HashMap<WindowHandle, usize>) {
    let previous_selection = self.selected().map(|(id, _)| WindowKey::from(id));
    let previous_index = self.cursor.get();

    let mut slots = Vec::new();
    let mut leveled = Vec::new();
    for (slot, key) in self.order.iter().enumerate() {
      let level = self
        .windows
        .get(*key)
        .and_then(|w| levels.get(&w.handle).copied());
      if let Some(level) = level {
        slots.push(slot);
        leveled.push((level, *key));
      }
    }
    leveled.sort_by_key(|(level, _)| *level);

    for (slot, (level, key)) in slots.into_iter().zip(leveled) {
      if let Some(entry) = self.order.get_mut(slot) {
        *entry = key;
      }
      if let Some(window) = self.windows.get_mut(key) {
        window.rank = Some(level);
      }
    }
    self.ordering = Ordering::Rank;
    self.restore_selection(previous_selection, previous_index);
  }

  fn restore_selection(&mut self, selected: Option<WindowKey>, index: Option<usize>) {
    let position = selected.and_then(|key| self.position(key));
    match (position, index) {
      (Some(position), _) => self.cursor.set(position, self.order.len()),
      (None, Some(index)) => self.cursor.set(index, self.order.len()),
      (None, None) => self.reset_cursor(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::types::{Mode, Space, SpaceId};

  fn app(pid: u32) -> AppInfo {
    AppInfo {
      pid: ProcessId(pid),
      name: format!("App {pid}"),
      is_hidden: false,
      pinned: false,
    }
  }

  fn window(pid: u32, token: u64, title: &str) -> DiscoveredWindow {
    DiscoveredWindow {
      handle: WindowHandle::new(ProcessId(pid), token),
      number: WindowNumber(u32::try_from(token).unwrap() + 100),
      title: title.to_string(),
      is_minimized: false,
    }
  }

  fn layout(on_screen: &[&DiscoveredWindow]) -> SpaceLayout {
    let mut layout = SpaceLayout::new(
      vec![Space {
        id: SpaceId(1),
        index: 1,
      }],
      SpaceId(1),
    );
    for w in on_screen {
      layout.add_member(w.number, SpaceId(1));
    }
    layout
  }

  fn titles(registry: &Registry) -> Vec<String> {
    registry
      .snapshot(Mode::Idle, 0)
      .windows
      .into_iter()
      .map(|w| w.title)
      .collect()
  }

  #[test]
  fn orders_by_rank_across_processes() {
    let (w1, w2, w3) = (window(1, 1, "w1"), window(1, 2, "w2"), window(2, 3, "w3"));
    let input = RebuildInput {
      z_order: vec![w3.number, w1.number, w2.number],
      layout: layout(&[&w1, &w2, &w3]),
      apps: vec![
        AppWindows {
          app: app(1),
          windows: vec![w1, w2],
        },
        AppWindows {
          app: app(2),
          windows: vec![w3],
        },
      ],
    };

    let mut registry = Registry::new();
    registry.rebuild_from_spaces(input, &HashSet::new());
    assert_eq!(titles(&registry), vec!["w3", "w1", "w2"]);
    assert_eq!(registry.cursor(), Some(0));
    registry.cycle(1);
    assert_eq!(registry.selected().map(|(_, w)| w.title.as_str()), Some("w1"));
    assert_eq!(registry.ordering(), Ordering::Rank);
  }

  #[test]
  fn off_desktop_windows_need_confirmation() {
    let visible = window(1, 1, "visible");
    let stale = window(1, 2, "stale");
    let mut minimized = window(1, 3, "");
    minimized.is_minimized = true;
    let input = RebuildInput {
      z_order: vec![visible.number],
      layout: layout(&[&visible]),
      apps: vec![AppWindows {
        app: app(1),
        windows: vec![visible, stale, minimized],
      }],
    };

    let mut registry = Registry::new();
    registry.rebuild_from_spaces(input, &HashSet::new());
    assert_eq!(titles(&registry), vec!["visible", "App 1"]);
  }

  #[test]
  fn hidden_process_windows_survive_without_desktop() {
    let w = window(1, 1, "hidden doc");
    let mut hidden = app(1);
    hidden.is_hidden = true;
    let input = RebuildInput {
      z_order: Vec::new(),
      layout: layout(&[]),
      apps: vec![AppWindows {
        app: hidden,
        windows: vec![w],
      }],
    };
    let mut registry = Registry::new();
    registry.rebuild_from_spaces(input, &HashSet::new());
    assert_eq!(registry.len(), 1);
  }

  #[test]
  fn unranked_keep_enumeration_order_at_the_end() {
    let (a, b, c) = (window(1, 1, "a"), window(1, 2, "b"), window(1, 3, "c"));
    let input = RebuildInput {
      z_order: vec![c.number],
      layout: layout(&[&a, &b, &c]),
      apps: vec![AppWindows {
        app: app(1),
        windows: vec![a, b, c],
      }],
    };
    let mut registry = Registry::new();
    registry.rebuild_from_spaces(input, &HashSet::new());
    assert_eq!(titles(&registry), vec!["c", "a", "b"]);
  }

  #[test]
  fn identities_and_selection_survive_rebuild() {
    let mut registry = Registry::new();
    registry.insert_front(vec![
      window(1, 1, "a").into_new(&app(1), None),
      window(1, 2, "b").into_new(&app(1), None),
      window(1, 3, "gone").into_new(&app(1), None),
    ]);
    registry.reset_cursor();
    registry.cycle(1);
    let before: HashMap<String, _> = registry
      .snapshot(Mode::Idle, 0)
      .windows
      .into_iter()
      .map(|w| (w.title, w.identity))
      .collect();

    let (a, b) = (window(1, 1, "a"), window(1, 2, "b"));
    let input = RebuildInput {
      z_order: vec![b.number, a.number],
      layout: layout(&[&a, &b]),
      apps: vec![AppWindows {
        app: app(1),
        windows: vec![a, b],
      }],
    };
    registry.rebuild_from_spaces(input, &HashSet::new());

    let after = registry.snapshot(Mode::Idle, 0);
    assert_eq!(after.titles(), vec!["b", "a"]);
    assert_eq!(after.windows[0].identity, before["b"]);
    assert_eq!(after.windows[1].identity, before["a"]);
    assert_eq!(after.focused().map(|w| w.title.as_str()), Some("b"));
  }

  #[test]
  fn uncovered_processes_are_kept() {
    let mut registry = Registry::new();
    registry.insert_front(vec![window(9, 9, "late").into_new(&app(9), None)]);
    let a = window(1, 1, "a");
    let input = RebuildInput {
      z_order: vec![a.number],
      layout: layout(&[&a]),
      apps: vec![AppWindows {
        app: app(1),
        windows: vec![a],
      }],
    };
    registry.rebuild_from_spaces(input, &HashSet::new());
    assert_eq!(titles(&registry), vec!["a", "late"]);
  }

  #[test]
  fn windows_newer_than_the_input_stay_in_front() {
    let mut registry = Registry::new();
    registry.insert_front(vec![
      window(1, 1, "a").into_new(&app(1), None),
      window(1, 2, "b").into_new(&app(1), None),
    ]);
    registry.insert_front(vec![window(1, 5, "newer").into_new(&app(1), None)]);

    let (a, b) = (window(1, 1, "a"), window(1, 2, "b"));
    let input = RebuildInput {
      z_order: vec![b.number, a.number],
      layout: layout(&[&a, &b]),
      apps: vec![AppWindows {
        app: app(1),
        windows: vec![a, b],
      }],
    };
    let keep = HashSet::from([WindowHandle::new(ProcessId(1), 5)]);
    registry.rebuild_from_spaces(input, &keep);
    assert_eq!(titles(&registry), vec!["newer", "b", "a"]);
  }

  #[test]
  fn level_sort_only_moves_leveled_windows() {
    let mut registry = Registry::new();
    registry.insert_front(vec![
      window(1, 1, "a").into_new(&app(1), None),
      window(1, 2, "elsewhere").into_new(&app(1), None),
      window(1, 3, "c").into_new(&app(1), None),
    ]);
    registry.reset_cursor();
    let levels: HashMap<WindowHandle, usize> = [
      (WindowHandle::new(ProcessId(1), 3), 0),
      (WindowHandle::new(ProcessId(1), 1), 1),
    ]
    .into_iter()
    .collect();

    registry.sort_by_level(&levels);
    assert_eq!(titles(&registry), vec!["c", "elsewhere", "a"]);
    assert_eq!(registry.selected().map(|(_, w)| w.title.as_str()), Some("a"));
  }
}
