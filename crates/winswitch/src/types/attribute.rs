/*!
Typed attribute results.

Directory backends decode raw OS values once, at the boundary, into
[`AttributeResult`]. Nothing past the boundary inspects untyped values.
*/

use serde::{Deserialize, Serialize};

/// Window attributes the engine asks the directory for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeKind {
  Title,
  Minimized,
  Size,
  Frame,
  Subrole,
}

impl AttributeKind {
  /// Attributes needed to decide eligibility and build a registry entry.
  pub const DESCRIBE: [Self; 4] = [Self::Title, Self::Minimized, Self::Size, Self::Subrole];
}

/// Width and height in points.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
  pub w: f64,
  pub h: f64,
}

impl Size {
  pub const fn new(w: f64, h: f64) -> Self {
    Self { w, h }
  }

  /// True when both dimensions exceed `min`.
  pub fn exceeds(&self, min: f64) -> bool {
    self.w > min && self.h > min
  }
}

/// Position and size in screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
  pub x: f64,
  pub y: f64,
  pub w: f64,
  pub h: f64,
}

impl Rect {
  pub const fn size(&self) -> Size {
    Size::new(self.w, self.h)
  }
}

/// One decoded attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum AttributeResult {
  Text(String),
  Flag(bool),
  Size(Size),
  Rect(Rect),
  /// The element does not expose this attribute.
  Missing,
}

/// The answer to one `query_attributes` call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attributes {
  values: Vec<(AttributeKind, AttributeResult)>,
}

impl Attributes {
  pub const fn new() -> Self {
    Self { values: Vec::new() }
  }

  /// Record a value, replacing an earlier one of the same kind.
  pub fn insert(&mut self, kind: AttributeKind, value: AttributeResult) {
    if let Some(slot) = self.values.iter_mut().find(|(k, _)| *k == kind) {
      slot.1 = value;
    } else {
      self.values.push((kind, value));
    }
  }

  /// Builder-style [`Attributes::insert`].
  #[must_use]
  pub fn with(mut self, kind: AttributeKind, value: AttributeResult) -> Self {
    self.insert(kind, value);
    self
  }

  pub fn get(&self, kind: AttributeKind) -> Option<&AttributeResult> {
    self.values.iter().find(|(k, _)| *k == kind).map(|(_, v)| v)
  }

  pub fn title(&self) -> Option<&str> {
    if let Some(AttributeResult::Text(title)) = self.get(AttributeKind::Title) {
      Some(title)
    } else {
      None
    }
  }

  pub fn minimized(&self) -> Option<bool> {
    if let Some(AttributeResult::Flag(flag)) = self.get(AttributeKind::Minimized) {
      Some(*flag)
    } else {
      None
    }
  }

  /// Size, taken from `Size` or derived from `Frame`.
  pub fn size(&self) -> Option<Size> {
    if let Some(AttributeResult::Size(size)) = self.get(AttributeKind::Size) {
      return Some(*size);
    }
    if let Some(AttributeResult::Rect(rect)) = self.get(AttributeKind::Frame) {
      return Some(rect.size());
    }
    None
  }

  pub fn subrole(&self) -> Option<&str> {
    if let Some(AttributeResult::Text(subrole)) = self.get(AttributeKind::Subrole) {
      Some(subrole)
    } else {
      None
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn typed_getters_ignore_mismatched_variants() {
    let attrs = Attributes::new()
      .with(AttributeKind::Title, AttributeResult::Flag(true))
      .with(AttributeKind::Minimized, AttributeResult::Text("yes".into()));
    assert_eq!(attrs.title(), None);
    assert_eq!(attrs.minimized(), None);
  }

  #[test]
  fn insert_replaces_same_kind() {
    let mut attrs = Attributes::new().with(AttributeKind::Title, AttributeResult::Text("a".into()));
    attrs.insert(AttributeKind::Title, AttributeResult::Text("b".into()));
    assert_eq!(attrs.title(), Some("b"));
  }

  #[test]
  fn size_falls_back_to_frame() {
    let attrs = Attributes::new().with(
      AttributeKind::Frame,
      AttributeResult::Rect(Rect { x: 1.0, y: 2.0, w: 300.0, h: 200.0 }),
    );
    assert_eq!(attrs.size(), Some(Size::new(300.0, 200.0)));
  }

  #[test]
  fn missing_is_not_a_value() {
    let attrs = Attributes::new().with(AttributeKind::Subrole, AttributeResult::Missing);
    assert_eq!(attrs.subrole(), None);
    assert_eq!(attrs.get(AttributeKind::Subrole), Some(&AttributeResult::Missing));
  }
}
