/*!
Attribute reads with bounded retry.

The directory reports a transient error when the window server is too busy
to answer. Reads retry a few times, then fall back to whatever the caller
already had. A failed read is "skipped for this cycle", never fatal.
*/

use std::sync::Arc;
use std::time::Duration;

use super::registry::{is_actual_window, DiscoveredWindow};
use super::tracker::AppInfo;
use crate::platform::WindowDirectory;
use crate::types::{AttributeKind, Attributes, DirectoryResult, WindowHandle};

/// Subroles of accessibility elements that are never application windows.
const NON_WINDOW_SUBROLES: [&str; 1] = ["AXUnknown"];

/// Bounded retry for transient directory failures.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RetryPolicy {
  max_attempts: u32,
  delay: Duration,
}

impl RetryPolicy {
  pub(crate) fn new(max_attempts: u32, delay: Duration) -> Self {
    Self {
      max_attempts: max_attempts.max(1),
      delay,
    }
  }

  /// Run `call` until it succeeds, fails permanently, or attempts run out.
  pub(crate) fn run<T>(
    &self,
    what: &str,
    mut call: impl FnMut() -> DirectoryResult<T>,
  ) -> DirectoryResult<T> {
    let mut attempt = 1;
    loop {
      match call() {
        Ok(value) => return Ok(value),
        Err(e) if e.is_transient() && attempt < self.max_attempts => {
          log::trace!("{what}: {e} (attempt {attempt}/{}), retrying", self.max_attempts);
          attempt += 1;
          if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
          }
        }
        Err(e) => {
          if e.is_transient() {
            log::warn!("{what}: giving up after {attempt} attempts: {e}");
          }
          return Err(e);
        }
      }
    }
  }
}

/// Directory reads used by worker jobs.
#[derive(Clone)]
pub(crate) struct AttributeReader {
  directory: Arc<dyn WindowDirectory>,
  retry: RetryPolicy,
  min_window_size: f64,
}

impl std::fmt::Debug for AttributeReader {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("AttributeReader")
      .field("retry", &self.retry)
      .finish_non_exhaustive()
  }
}

impl AttributeReader {
  pub(crate) fn new(
    directory: Arc<dyn WindowDirectory>,
    retry: RetryPolicy,
    min_window_size: f64,
  ) -> Self {
    Self {
      directory,
      retry,
      min_window_size,
    }
  }

  pub(crate) fn directory(&self) -> &dyn WindowDirectory {
    self.directory.as_ref()
  }

  pub(crate) const fn retry(&self) -> RetryPolicy {
    self.retry
  }

  pub(crate) fn attributes(
    &self,
    handle: WindowHandle,
    kinds: &[AttributeKind],
  ) -> DirectoryResult<Attributes> {
    self
      .retry
      .run("query_attributes", || self.directory.query_attributes(handle, kinds))
  }

  /// Current title, or `cached` if the directory can't answer right now.
  pub(crate) fn title(&self, handle: WindowHandle, cached: &str) -> String {
    match self.attributes(handle, &[AttributeKind::Title]) {
      Ok(attrs) => attrs.title().unwrap_or(cached).to_string(),
      Err(e) => {
        log::debug!("title for {handle:?} unavailable ({e}), keeping cached value");
        cached.to_string()
      }
    }
  }

  /// Read everything needed to track a window. `None` if it isn't an actual
  /// window (chrome, palettes, too small).
  pub(crate) fn describe(
    &self,
    handle: WindowHandle,
    app: &AppInfo,
  ) -> DirectoryResult<Option<DiscoveredWindow>> {
    let attrs = self.attributes(handle, &AttributeKind::DESCRIBE)?;
    if !self.is_eligible(&attrs, app.is_hidden) {
      log::trace!("{handle:?} is not an actual window, skipping");
      return Ok(None);
    }
    let number = self
      .retry
      .run("window_number", || self.directory.window_number(handle))?;
    Ok(Some(DiscoveredWindow {
      handle,
      number,
      title: attrs.title().unwrap_or_default().to_string(),
      is_minimized: attrs.minimized().unwrap_or(false),
    }))
  }

  /// Every eligible window of `app`, in the process's own enumeration order.
  /// Windows that fail to describe are skipped.
  pub(crate) fn discover(&self, app: &AppInfo) -> DirectoryResult<Vec<DiscoveredWindow>> {
    let handles = self
      .retry
      .run("enumerate_windows", || self.directory.enumerate_windows(app.pid))?;
    let mut windows = Vec::with_capacity(handles.len());
    for handle in handles {
      match self.describe(handle, app) {
        Ok(Some(window)) => windows.push(window),
        Ok(None) => {}
        Err(e) => log::debug!("discover {}: skipping {handle:?}: {e}", app.pid),
      }
    }
    Ok(windows)
  }

  fn is_eligible(&self, attrs: &Attributes, app_hidden: bool) -> bool {
    if attrs
      .subrole()
      .is_some_and(|s| NON_WINDOW_SUBROLES.contains(&s))
    {
      return false;
    }
    if attrs
      .size()
      .is_some_and(|s| !s.exceeds(self.min_window_size))
    {
      return false;
    }
    is_actual_window(
      attrs.title().unwrap_or_default(),
      attrs.minimized().unwrap_or(false),
      app_hidden,
    )
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::platform::memory::MemoryDirectory;
  use crate::types::{DirectoryError, ProcessId, RunningApplication, Size};

  fn setup() -> (Arc<MemoryDirectory>, AppInfo) {
    let dir = Arc::new(MemoryDirectory::new());
    dir.add_app(RunningApplication::new(1, "com.test.one", "One"));
    let app = AppInfo {
      pid: ProcessId(1),
      name: "One".into(),
      is_hidden: false,
      pinned: false,
    };
    (dir, app)
  }

  fn reader(dir: &Arc<MemoryDirectory>, attempts: u32) -> AttributeReader {
    AttributeReader::new(dir.clone(), RetryPolicy::new(attempts, Duration::ZERO), 0.0)
  }

  #[test]
  fn title_falls_back_to_cache_until_directory_answers() {
    let (dir, _) = setup();
    let w2 = dir.add_window(ProcessId(1), "fresh");
    dir.fail_next(w2, AttributeKind::Title, 2);
    let reader = reader(&dir, 1);

    assert_eq!(reader.title(w2, "cached"), "cached");
    assert_eq!(reader.title(w2, "cached"), "cached");
    assert_eq!(reader.title(w2, "cached"), "fresh");
  }

  #[test]
  fn retries_absorb_transient_failures() {
    let (dir, _) = setup();
    let w = dir.add_window(ProcessId(1), "fresh");
    dir.fail_next(w, AttributeKind::Title, 2);
    assert_eq!(reader(&dir, 3).title(w, "cached"), "fresh");
  }

  #[test]
  fn permanent_errors_are_not_retried() {
    let mut calls = 0;
    let policy = RetryPolicy::new(5, Duration::ZERO);
    let result: DirectoryResult<()> = policy.run("test", || {
      calls += 1;
      Err(DirectoryError::InvalidElement)
    });
    assert_eq!(result, Err(DirectoryError::InvalidElement));
    assert_eq!(calls, 1);
  }

  #[test]
  fn discover_filters_non_windows() {
    let (dir, app) = setup();
    let real = dir.add_window(ProcessId(1), "Document");
    let untitled = dir.add_window(ProcessId(1), "");
    let chrome = dir.add_window(ProcessId(1), "Tooltip");
    dir.set_subrole(chrome, "AXUnknown");
    let tiny = dir.add_window(ProcessId(1), "Tiny");
    dir.set_size(tiny, Size::new(0.0, 0.0));
    let minimized = dir.add_window(ProcessId(1), "");
    dir.set_minimized(minimized, true);

    let found: Vec<WindowHandle> = reader(&dir, 1)
      .discover(&app)
      .unwrap()
      .into_iter()
      .map(|w| w.handle)
      .collect();
    assert_eq!(found, vec![real, minimized]);
    assert!(!found.contains(&untitled));
  }

  #[test]
  fn untitled_windows_of_hidden_apps_qualify() {
    let (dir, mut app) = setup();
    let w = dir.add_window(ProcessId(1), "");
    app.is_hidden = true;
    let described = reader(&dir, 1).describe(w, &app).unwrap();
    assert!(described.is_some());
  }
}
