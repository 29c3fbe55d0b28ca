/*! Error types for directory calls and engine startup. */

/// Failure of a single Window Directory call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DirectoryError {
  #[error("Window server busy")]
  Busy,

  #[error("Call could not complete")]
  CannotComplete,

  #[error("Element is no longer valid")]
  InvalidElement,

  #[error("Accessibility permissions not granted")]
  PermissionDenied,

  #[error("Operation not supported: {0}")]
  NotSupported(String),
}

impl DirectoryError {
  /// Transient failures are worth retrying; everything else is final.
  pub const fn is_transient(&self) -> bool {
    matches!(self, Self::Busy | Self::CannotComplete)
  }
}

/// Result type for Window Directory calls.
pub type DirectoryResult<T> = Result<T, DirectoryError>;

/// Errors surfaced by the engine itself.
#[derive(Debug, thiserror::Error)]
pub enum SwitcherError {
  #[error("Accessibility permissions not granted")]
  PermissionDenied,

  #[error("Window directory error: {0}")]
  Directory(#[from] DirectoryError),

  #[error("Failed to start worker: {0}")]
  Spawn(String),

  #[error("Switcher has stopped")]
  Stopped,
}

/// Result type for engine operations.
pub type SwitcherResult<T> = Result<T, SwitcherError>;

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn busy_and_cannot_complete_are_transient() {
    assert!(DirectoryError::Busy.is_transient());
    assert!(DirectoryError::CannotComplete.is_transient());
  }

  #[test]
  fn other_errors_are_final() {
    assert!(!DirectoryError::InvalidElement.is_transient());
    assert!(!DirectoryError::PermissionDenied.is_transient());
    assert!(!DirectoryError::NotSupported("x".into()).is_transient());
  }

  #[test]
  fn directory_error_converts() {
    let err: SwitcherError = DirectoryError::Busy.into();
    assert_eq!(err.to_string(), "Window directory error: Window server busy");
  }
}
