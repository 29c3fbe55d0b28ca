/*! Branded ID types for type-safe entity references. */

use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Process ID - branded type to distinguish from other u32 values.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  PartialOrd,
  Ord,
  Serialize,
  Deserialize,
  TS,
  Display,
  From,
  Into,
)]
#[ts(export)]
pub struct ProcessId(pub u32);

/// Numeric window-server id (what z-order and per-space lists are expressed in).
///
/// The OS hands back `0` for a window whose handle has been released, so the
/// number alone is never used as identity.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  PartialOrd,
  Ord,
  Serialize,
  Deserialize,
  TS,
  Display,
  From,
  Into,
)]
#[ts(export)]
pub struct WindowNumber(pub u32);

impl WindowNumber {
  /// Sentinel reported for released windows.
  pub const INVALID: Self = Self(0);

  /// Whether this number still refers to a live window-server window.
  pub const fn is_valid(self) -> bool {
    self.0 != 0
  }
}

/// Virtual desktop identifier.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, Display, From, Into,
)]
#[ts(export)]
pub struct SpaceId(pub u64);

/// Stable identity of a tracked window.
///
/// Generation-tagged: once a window is removed its identity never matches a
/// later window, even if the OS recycles the underlying handle or number.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, Display, From, Into,
)]
#[ts(export)]
pub struct WindowIdentity(pub u64);
