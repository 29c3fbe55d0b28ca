/*!
Window Directory contract.

The engine never talks to the OS directly. A backend implements
[`WindowDirectory`] and pushes notifications into the engine through a
[`Notifier`]. Every call may fail with a transient error; backends do not
retry, callers do.
*/

use crossbeam_channel::Sender;

use crate::core::Inbound;
use crate::types::{
  AppEventKind, AppNotification, AttributeKind, Attributes, DirectoryResult, Intent,
  LifecycleEvent, ProcessId, RunningApplication, Space, SpaceId, WindowHandle, WindowNumber,
};

/// OS-provided window and process enumeration, attribute access, live change
/// notifications, and the window-server calls used to focus a window.
///
/// Shared as `Arc<dyn WindowDirectory>` between the worker pool and the focus
/// thread, so implementations must be thread-safe.
pub trait WindowDirectory: Send + Sync + 'static {
  /// Whether the accessibility permission the backend needs is granted.
  fn has_permissions(&self) -> bool;

  /// All running processes.
  fn running_applications(&self) -> DirectoryResult<Vec<RunningApplication>>;

  /// The process's own window list, including minimized and off-space windows.
  fn enumerate_windows(&self, pid: ProcessId) -> DirectoryResult<Vec<WindowHandle>>;

  /// Decode the requested attributes of one window.
  fn query_attributes(
    &self,
    handle: WindowHandle,
    kinds: &[AttributeKind],
  ) -> DirectoryResult<Attributes>;

  /// Window-server number of a window. [`WindowNumber::INVALID`] once released.
  fn window_number(&self, handle: WindowHandle) -> DirectoryResult<WindowNumber>;

  /// The process's focused window, if it has one.
  fn focused_window(&self, pid: ProcessId) -> DirectoryResult<Option<WindowHandle>>;

  /// Deliver `kinds` for `pid` to `notifier` until the subscription is dropped.
  fn subscribe(
    &self,
    pid: ProcessId,
    kinds: &[AppEventKind],
    notifier: Notifier,
  ) -> DirectoryResult<Subscription>;

  /// Deliver launch/termination/space notifications until dropped.
  fn subscribe_lifecycle(&self, notifier: Notifier) -> DirectoryResult<Subscription>;

  /// Every known virtual desktop.
  fn spaces(&self) -> DirectoryResult<Vec<Space>>;

  /// The active virtual desktop.
  fn current_space(&self) -> DirectoryResult<SpaceId>;

  /// Window numbers on any of `spaces`, front to back.
  fn windows_in_spaces(&self, spaces: &[SpaceId]) -> DirectoryResult<Vec<WindowNumber>>;

  /// Desktops a window is on. Empty for minimized or hidden windows.
  fn spaces_for_window(&self, number: WindowNumber) -> DirectoryResult<Vec<SpaceId>>;

  /// Bring a window to the front of its process.
  fn raise(&self, handle: WindowHandle) -> DirectoryResult<()>;

  /// Give a window key status.
  fn make_key(&self, handle: WindowHandle) -> DirectoryResult<()>;

  /// Bring a process to the front.
  fn set_front_process(&self, pid: ProcessId) -> DirectoryResult<()>;
}

/// Live registration with a directory. Unregisters on drop.
#[must_use = "Dropping a Subscription unregisters it"]
pub struct Subscription {
  cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
  /// Wrap the backend's unregistration call.
  pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
    Self {
      cancel: Some(Box::new(cancel)),
    }
  }

  /// A subscription with nothing to unregister.
  pub const fn detached() -> Self {
    Self { cancel: None }
  }
}

impl std::fmt::Debug for Subscription {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Subscription")
      .field("active", &self.cancel.is_some())
      .finish()
  }
}

impl Drop for Subscription {
  fn drop(&mut self) {
    if let Some(cancel) = self.cancel.take() {
      cancel();
    }
  }
}

/// Sending half of the engine's inbound queue.
///
/// Cheap to clone. Callbacks only enqueue; nothing here touches engine state.
#[derive(Clone, Debug)]
pub struct Notifier {
  tx: Sender<Inbound>,
}

impl Notifier {
  pub(crate) const fn new(tx: Sender<Inbound>) -> Self {
    Self { tx }
  }

  /// A per-process notification.
  pub fn app_event(&self, notification: AppNotification) {
    self.send(Inbound::App(notification));
  }

  /// A process-lifecycle or desktop notification.
  pub fn lifecycle(&self, event: LifecycleEvent) {
    self.send(Inbound::Lifecycle(event));
  }

  /// An input intent from the shortcut listener.
  pub fn intent(&self, intent: Intent) {
    self.send(Inbound::Intent(intent));
  }

  /// Request a full rebuild (e.g. after waking from sleep).
  pub fn resync(&self) {
    self.send(Inbound::Resync);
  }

  /// Re-sort the current desktop's windows by z-order.
  pub fn sort_by_level(&self) {
    self.send(Inbound::SortByLevel);
  }

  pub(crate) fn send(&self, message: Inbound) {
    if self.tx.send(message).is_err() {
      log::trace!("Notifier: engine stopped, dropping message");
    }
  }
}
