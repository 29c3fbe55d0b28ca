/*!
Focus dispatcher.

Focusing a window takes several window-server calls that must not overlap,
so requests run one at a time on a dedicated thread. A request queues behind
the one in flight. Requests are fire-and-forget: ending the session does not
recall one already dispatched.
*/

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Sender};

use super::attributes::RetryPolicy;
use crate::platform::WindowDirectory;
use crate::types::{DirectoryResult, SwitcherError, SwitcherResult, WindowHandle};

/// Raise, make key, bring the process front, then make key and raise again.
/// Minimized and off-desktop windows need the second round to end up focused.
pub(crate) fn focus_window(
  directory: &dyn WindowDirectory,
  retry: RetryPolicy,
  handle: WindowHandle,
) -> DirectoryResult<()> {
  retry.run("raise", || directory.raise(handle))?;
  retry.run("make_key", || directory.make_key(handle))?;
  retry.run("set_front_process", || directory.set_front_process(handle.pid))?;
  retry.run("make_key", || directory.make_key(handle))?;
  retry.run("raise", || directory.raise(handle))
}

/// Serial focus worker. Stops when dropped, after finishing queued requests.
pub(crate) struct FocusDispatcher {
  tx: Option<Sender<WindowHandle>>,
  thread: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for FocusDispatcher {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("FocusDispatcher").finish_non_exhaustive()
  }
}

impl FocusDispatcher {
  pub(crate) fn spawn(
    directory: Arc<dyn WindowDirectory>,
    retry: RetryPolicy,
  ) -> SwitcherResult<Self> {
    let (tx, rx) = unbounded::<WindowHandle>();
    let thread = thread::Builder::new()
      .name("winswitch-focus".into())
      .spawn(move || {
        for handle in rx {
          if let Err(e) = focus_window(directory.as_ref(), retry, handle) {
            log::warn!("Failed to focus {handle:?}: {e}");
          }
        }
      })
      .map_err(|e| SwitcherError::Spawn(e.to_string()))?;
    Ok(Self {
      tx: Some(tx),
      thread: Some(thread),
    })
  }

  pub(crate) fn dispatch(&self, handle: WindowHandle) {
    if let Some(tx) = &self.tx {
      if tx.send(handle).is_err() {
        log::warn!("Focus thread stopped, dropping request for {handle:?}");
      }
    }
  }
}

impl Drop for FocusDispatcher {
  fn drop(&mut self) {
    drop(self.tx.take());
    if let Some(thread) = self.thread.take() {
      drop(thread.join());
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::platform::memory::{FocusCall, MemoryDirectory};
  use crate::types::{ProcessId, RunningApplication};
  use std::time::Duration;

  #[test]
  fn focus_sequence_order() {
    let dir = MemoryDirectory::new();
    dir.add_app(RunningApplication::new(3, "com.test.three", "Three"));
    let w = dir.add_window(ProcessId(3), "w");

    focus_window(&dir, RetryPolicy::new(1, Duration::ZERO), w).unwrap();
    assert_eq!(
      dir.focus_calls(),
      vec![
        FocusCall::Raise(w),
        FocusCall::MakeKey(w),
        FocusCall::SetFrontProcess(ProcessId(3)),
        FocusCall::MakeKey(w),
        FocusCall::Raise(w),
      ]
    );
  }

  #[test]
  fn queued_requests_run_in_order() {
    let dir = Arc::new(MemoryDirectory::new());
    dir.add_app(RunningApplication::new(3, "com.test.three", "Three"));
    let a = dir.add_window(ProcessId(3), "a");
    let b = dir.add_window(ProcessId(3), "b");

    let retry = RetryPolicy::new(1, Duration::ZERO);
    let dispatcher = FocusDispatcher::spawn(dir.clone(), retry).unwrap();
    dispatcher.dispatch(a);
    dispatcher.dispatch(b);
    drop(dispatcher);

    let raises: Vec<WindowHandle> = dir
      .focus_calls()
      .into_iter()
      .filter_map(|c| match c {
        FocusCall::Raise(h) => Some(h),
        FocusCall::MakeKey(_) | FocusCall::SetFrontProcess(_) => None,
      })
      .collect();
    assert_eq!(raises, vec![a, a, b, b]);
  }
}
