/*!
Focus cursor: the selected index into the registry.

The cursor tracks a *logical* window. Background inserts and removals rebase
the number so the same window stays selected; only the removal of the
selected window itself moves the selection (onto the next survivor).

Cycling and resetting take a `shown` predicate over indices and skip the
windows it rejects.
*/

/// Selected index. `None` exactly when the registry is empty.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct FocusCursor {
  index: Option<usize>,
}

impl FocusCursor {
  pub(crate) const fn get(self) -> Option<usize> {
    self.index
  }

  /// Point at the first shown index. Falls back to the front if nothing is
  /// shown, or nowhere if empty.
  pub(crate) fn reset(&mut self, count: usize, shown: impl Fn(usize) -> bool) {
    self.index = (0..count).find(|i| shown(*i)).or_else(|| front(count));
  }

  /// Point at `index`, clamped into range.
  pub(crate) fn set(&mut self, index: usize, count: usize) {
    self.index = count.checked_sub(1).map(|last| index.min(last));
  }

  /// Move by `step` with wrap-around in both directions, repeating the step
  /// while the landing index is not shown. Stays put if no step lands on a
  /// shown index.
  pub(crate) fn cycle(&mut self, step: isize, count: usize, shown: impl Fn(usize) -> bool) {
    if count == 0 {
      self.index = None;
      return;
    }
    let current = self.index.unwrap_or(0).min(count - 1);
    let modulus = isize::try_from(count).unwrap_or(isize::MAX);
    let shift = step.rem_euclid(modulus).unsigned_abs();
    let mut target = current;
    for _ in 0..count {
      target = (target + shift) % count;
      if shown(target) {
        self.index = Some(target);
        return;
      }
    }
    self.index = Some(current);
  }

  /// Rebase after windows were inserted at `inserted` (indices in the new
  /// ordering). `count` is the size after insertion.
  pub(crate) fn on_insert_background(&mut self, inserted: &[usize], count: usize) {
    let Some(mut index) = self.index else {
      self.index = front(count);
      return;
    };
    let mut sorted = inserted.to_vec();
    sorted.sort_unstable();
    for at in sorted {
      if at <= index {
        index += 1;
      }
    }
    self.set(index, count);
  }

  /// Rebase after the window at `removed` (index in the old ordering) was
  /// removed. `count` is the size after removal.
  pub(crate) fn on_remove_background(&mut self, removed: usize, count: usize) {
    let Some(index) = self.index else {
      return;
    };
    let index = if removed < index { index - 1 } else { index };
    self.set(index, count);
  }
}

const fn front(count: usize) -> Option<usize> {
  if count > 0 {
    Some(0)
  } else {
    None
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn all(_: usize) -> bool {
    true
  }

  fn at(index: usize) -> FocusCursor {
    FocusCursor { index: Some(index) }
  }

  #[test]
  fn cycle_wraps_forward_and_backward() {
    let mut cursor = at(2);
    cursor.cycle(1, 3, all);
    assert_eq!(cursor.get(), Some(0));
    cursor.cycle(-1, 3, all);
    assert_eq!(cursor.get(), Some(2));
    cursor.cycle(-7, 3, all);
    assert_eq!(cursor.get(), Some(1));
  }

  #[test]
  fn cycle_skips_windows_not_shown() {
    // [a, b*, c, d] with c hidden
    let shown = |i: usize| i != 2;
    let mut cursor = at(1);
    cursor.cycle(1, 4, shown);
    assert_eq!(cursor.get(), Some(3));
    cursor.cycle(-1, 4, shown);
    assert_eq!(cursor.get(), Some(1));
    cursor.cycle(-1, 4, shown);
    cursor.cycle(-1, 4, shown);
    assert_eq!(cursor.get(), Some(3));
  }

  #[test]
  fn cycle_stays_put_when_nothing_else_is_shown() {
    let mut cursor = at(1);
    cursor.cycle(1, 3, |i| i == 1);
    assert_eq!(cursor.get(), Some(1));
    cursor.cycle(1, 3, |_| false);
    assert_eq!(cursor.get(), Some(1));
  }

  #[test]
  fn reset_selects_first_shown() {
    let mut cursor = FocusCursor::default();
    cursor.reset(4, |i| i >= 2);
    assert_eq!(cursor.get(), Some(2));
    cursor.reset(4, |_| false);
    assert_eq!(cursor.get(), Some(0));
    cursor.reset(0, all);
    assert_eq!(cursor.get(), None);
  }

  #[test]
  fn cycle_on_empty_clears() {
    let mut cursor = at(0);
    cursor.cycle(1, 0, all);
    assert_eq!(cursor.get(), None);
  }

  #[test]
  fn insert_before_cursor_keeps_selection() {
    // [a, b*, c] + x at front => [x, a, b*, c]
    let mut cursor = at(1);
    cursor.on_insert_background(&[0], 4);
    assert_eq!(cursor.get(), Some(2));
  }

  #[test]
  fn insert_after_cursor_leaves_index() {
    let mut cursor = at(1);
    cursor.on_insert_background(&[3], 4);
    assert_eq!(cursor.get(), Some(1));
  }

  #[test]
  fn several_inserts_in_one_step() {
    // [a, b*] + x, y at front => [x, y, a, b*]
    let mut cursor = at(1);
    cursor.on_insert_background(&[1, 0], 4);
    assert_eq!(cursor.get(), Some(3));
  }

  #[test]
  fn insert_into_empty_selects_front() {
    let mut cursor = FocusCursor::default();
    cursor.on_insert_background(&[0], 1);
    assert_eq!(cursor.get(), Some(0));
  }

  #[test]
  fn removing_selected_moves_to_next_survivor() {
    // [a, b*, c] - b => [a, c*]
    let mut cursor = at(1);
    cursor.on_remove_background(1, 2);
    assert_eq!(cursor.get(), Some(1));
  }

  #[test]
  fn removing_selected_last_clamps() {
    let mut cursor = at(2);
    cursor.on_remove_background(2, 2);
    assert_eq!(cursor.get(), Some(1));
  }

  #[test]
  fn removing_only_window_clears() {
    let mut cursor = at(0);
    cursor.on_remove_background(0, 0);
    assert_eq!(cursor.get(), None);
  }

  #[test]
  fn removing_before_cursor_shifts_back() {
    let mut cursor = at(2);
    cursor.on_remove_background(0, 2);
    assert_eq!(cursor.get(), Some(1));
  }
}
