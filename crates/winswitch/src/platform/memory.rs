/*!
In-memory [`WindowDirectory`].

Scripts processes, windows, desktops and z-order, and emits the same
notifications a real backend would. Used by the test suite and by hosts that
want to drive the engine without an OS backend (demos, UI development).

```ignore
let dir = Arc::new(MemoryDirectory::new());
dir.add_app(RunningApplication::new(10, "com.example.editor", "Editor"));
let w = dir.add_window(ProcessId(10), "notes.txt");

let switcher = Switcher::builder().build(dir.clone())?;
dir.set_title(w, "notes.txt (edited)");
```
*/

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use super::{Notifier, Subscription, WindowDirectory};
use crate::types::{
  AppEventKind, AppNotification, AttributeKind, AttributeResult, Attributes, DirectoryError,
  DirectoryResult, LifecycleEvent, ProcessId, Rect, RunningApplication, Size, Space, SpaceId,
  WindowHandle, WindowNumber,
};

const STANDARD_SUBROLE: &str = "AXStandardWindow";
const DEFAULT_SIZE: Size = Size::new(800.0, 600.0);

/// A window-server call made by the focus dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusCall {
  Raise(WindowHandle),
  MakeKey(WindowHandle),
  SetFrontProcess(ProcessId),
}

#[derive(Debug, Clone)]
struct MemoryWindow {
  handle: WindowHandle,
  number: WindowNumber,
  title: String,
  minimized: bool,
  size: Size,
  subrole: String,
  spaces: Vec<SpaceId>,
}

enum SinkScope {
  App(ProcessId, Vec<AppEventKind>),
  Lifecycle,
}

struct Sink {
  id: u64,
  scope: SinkScope,
  notifier: Notifier,
}

struct World {
  permissions: bool,
  apps: Vec<RunningApplication>,
  /// Front to back.
  windows: Vec<MemoryWindow>,
  spaces: Vec<Space>,
  current: SpaceId,
  failures: HashMap<(WindowHandle, AttributeKind), u32>,
  sinks: Vec<Sink>,
  next_sink: u64,
  next_token: u64,
  next_number: u32,
  focus_log: Vec<FocusCall>,
}

impl World {
  fn window(&self, handle: WindowHandle) -> DirectoryResult<&MemoryWindow> {
    self
      .windows
      .iter()
      .find(|w| w.handle == handle)
      .ok_or(DirectoryError::InvalidElement)
  }

  fn window_mut(&mut self, handle: WindowHandle) -> Option<&mut MemoryWindow> {
    self.windows.iter_mut().find(|w| w.handle == handle)
  }

  fn app(&self, pid: ProcessId) -> Option<&RunningApplication> {
    self.apps.iter().find(|a| a.pid == pid)
  }

  fn app_hidden(&self, pid: ProcessId) -> bool {
    self.app(pid).is_some_and(|a| a.is_hidden)
  }

  /// Whether the window server would list this window on its desktops.
  fn on_screen(&self, window: &MemoryWindow) -> bool {
    !window.minimized && !self.app_hidden(window.handle.pid) && window.number.is_valid()
  }

  fn bring_to_front(&mut self, handle: WindowHandle) {
    if let Some(pos) = self.windows.iter().position(|w| w.handle == handle) {
      let window = self.windows.remove(pos);
      self.windows.insert(0, window);
    }
  }

  fn app_sinks(&self, pid: ProcessId, kind: AppEventKind) -> Vec<Notifier> {
    self
      .sinks
      .iter()
      .filter(|s| {
        matches!(&s.scope, SinkScope::App(p, kinds) if *p == pid && kinds.contains(&kind))
      })
      .map(|s| s.notifier.clone())
      .collect()
  }

  fn lifecycle_sinks(&self) -> Vec<Notifier> {
    self
      .sinks
      .iter()
      .filter(|s| matches!(s.scope, SinkScope::Lifecycle))
      .map(|s| s.notifier.clone())
      .collect()
  }

  fn add_sink(&mut self, scope: SinkScope, notifier: Notifier) -> u64 {
    self.next_sink += 1;
    let id = self.next_sink;
    self.sinks.push(Sink {
      id,
      scope,
      notifier,
    });
    id
  }
}

/// Scriptable in-memory window directory.
pub struct MemoryDirectory {
  world: Arc<Mutex<World>>,
}

impl std::fmt::Debug for MemoryDirectory {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let world = self.world.lock();
    f.debug_struct("MemoryDirectory")
      .field("apps", &world.apps.len())
      .field("windows", &world.windows.len())
      .field("spaces", &world.spaces.len())
      .finish_non_exhaustive()
  }
}

impl Default for MemoryDirectory {
  fn default() -> Self {
    Self::new()
  }
}

impl MemoryDirectory {
  /// One desktop, permissions granted, nothing running.
  pub fn new() -> Self {
    let first = Space {
      id: SpaceId(1),
      index: 1,
    };
    Self {
      world: Arc::new(Mutex::new(World {
        permissions: true,
        apps: Vec::new(),
        windows: Vec::new(),
        spaces: vec![first],
        current: first.id,
        failures: HashMap::new(),
        sinks: Vec::new(),
        next_sink: 0,
        next_token: 0,
        next_number: 100,
        focus_log: Vec::new(),
      })),
    }
  }

  fn emit_app(&self, pid: ProcessId, kind: AppEventKind, window: Option<WindowHandle>) {
    let sinks = self.world.lock().app_sinks(pid, kind);
    for notifier in sinks {
      notifier.app_event(AppNotification { pid, kind, window });
    }
  }

  fn emit_lifecycle(&self, event: &LifecycleEvent) {
    let sinks = self.world.lock().lifecycle_sinks();
    for notifier in sinks {
      notifier.lifecycle(event.clone());
    }
  }

  // ==========================================================================
  // Scripting
  // ==========================================================================

  pub fn set_permissions(&self, granted: bool) {
    self.world.lock().permissions = granted;
  }

  /// Add a desktop and return its id.
  pub fn add_space(&self) -> SpaceId {
    let mut world = self.world.lock();
    let index = u32::try_from(world.spaces.len()).unwrap_or(u32::MAX - 1) + 1;
    let id = SpaceId(u64::from(index));
    world.spaces.push(Space { id, index });
    id
  }

  pub fn current_space_id(&self) -> SpaceId {
    self.world.lock().current
  }

  /// Make `space` the active desktop and notify.
  pub fn switch_space(&self, space: SpaceId) {
    self.world.lock().current = space;
    self.emit_lifecycle(&LifecycleEvent::SpaceChanged);
  }

  /// Register a process without notifying (state before the engine starts).
  pub fn add_app(&self, app: RunningApplication) {
    self.world.lock().apps.push(app);
  }

  /// Register a process and notify lifecycle subscribers.
  pub fn launch(&self, app: RunningApplication) {
    self.world.lock().apps.push(app.clone());
    self.emit_lifecycle(&LifecycleEvent::Launched(vec![app]));
  }

  pub fn complete_launch(&self, pid: ProcessId) {
    {
      let mut world = self.world.lock();
      if let Some(app) = world.apps.iter_mut().find(|a| a.pid == pid) {
        app.launch_complete = true;
      }
    }
    self.emit_lifecycle(&LifecycleEvent::LaunchCompleted(pid));
  }

  /// Kill a process and its windows, and notify.
  pub fn terminate(&self, pid: ProcessId) {
    if let Some(app) = self.remove_app(pid) {
      self.emit_lifecycle(&LifecycleEvent::Terminated(vec![app]));
    }
  }

  /// Like [`MemoryDirectory::terminate`], but the report arrives after the
  /// bundle id has already been torn down.
  pub fn terminate_unidentified(&self, pid: ProcessId) {
    if let Some(mut app) = self.remove_app(pid) {
      app.bundle_id = None;
      self.emit_lifecycle(&LifecycleEvent::Terminated(vec![app]));
    }
  }

  fn remove_app(&self, pid: ProcessId) -> Option<RunningApplication> {
    let mut world = self.world.lock();
    let pos = world.apps.iter().position(|a| a.pid == pid)?;
    world.windows.retain(|w| w.handle.pid != pid);
    Some(world.apps.remove(pos))
  }

  /// Add a frontmost window on the current desktop without notifying.
  pub fn add_window(&self, pid: ProcessId, title: &str) -> WindowHandle {
    let mut world = self.world.lock();
    world.next_token += 1;
    world.next_number += 1;
    let handle = WindowHandle::new(pid, world.next_token);
    let window = MemoryWindow {
      handle,
      number: WindowNumber(world.next_number),
      title: title.to_string(),
      minimized: false,
      size: DEFAULT_SIZE,
      subrole: STANDARD_SUBROLE.to_string(),
      spaces: vec![world.current],
    };
    world.windows.insert(0, window);
    handle
  }

  /// Add a frontmost window and notify `windowCreated`.
  pub fn open_window(&self, pid: ProcessId, title: &str) -> WindowHandle {
    let handle = self.add_window(pid, title);
    self.emit_app(pid, AppEventKind::WindowCreated, Some(handle));
    handle
  }

  pub fn close_window(&self, handle: WindowHandle) {
    self.world.lock().windows.retain(|w| w.handle != handle);
    self.emit_app(handle.pid, AppEventKind::WindowDestroyed, Some(handle));
  }

  pub fn set_minimized(&self, handle: WindowHandle, minimized: bool) {
    if let Some(w) = self.world.lock().window_mut(handle) {
      w.minimized = minimized;
    }
    let kind = if minimized {
      AppEventKind::WindowMinimized
    } else {
      AppEventKind::WindowDeminimized
    };
    self.emit_app(handle.pid, kind, Some(handle));
  }

  pub fn set_title(&self, handle: WindowHandle, title: &str) {
    if let Some(w) = self.world.lock().window_mut(handle) {
      w.title = title.to_string();
    }
    self.emit_app(handle.pid, AppEventKind::TitleChanged, Some(handle));
  }

  /// Change the title without notifying (a missed notification).
  pub fn set_title_silently(&self, handle: WindowHandle, title: &str) {
    if let Some(w) = self.world.lock().window_mut(handle) {
      w.title = title.to_string();
    }
  }

  pub fn set_app_hidden(&self, pid: ProcessId, hidden: bool) {
    if let Some(app) = self.world.lock().apps.iter_mut().find(|a| a.pid == pid) {
      app.is_hidden = hidden;
    }
    let kind = if hidden {
      AppEventKind::ApplicationHidden
    } else {
      AppEventKind::ApplicationShown
    };
    self.emit_app(pid, kind, None);
  }

  /// The user brought a window's application to the front.
  pub fn activate(&self, handle: WindowHandle) {
    self.world.lock().bring_to_front(handle);
    self.emit_app(handle.pid, AppEventKind::ApplicationActivated, None);
  }

  /// The user focused another window of the active application.
  pub fn focus_window(&self, handle: WindowHandle) {
    self.world.lock().bring_to_front(handle);
    self.emit_app(handle.pid, AppEventKind::FocusedWindowChanged, Some(handle));
  }

  pub fn move_to_spaces(&self, handle: WindowHandle, spaces: &[SpaceId]) {
    if let Some(w) = self.world.lock().window_mut(handle) {
      w.spaces = spaces.to_vec();
    }
  }

  pub fn set_size(&self, handle: WindowHandle, size: Size) {
    if let Some(w) = self.world.lock().window_mut(handle) {
      w.size = size;
    }
  }

  pub fn set_subrole(&self, handle: WindowHandle, subrole: &str) {
    if let Some(w) = self.world.lock().window_mut(handle) {
      w.subrole = subrole.to_string();
    }
  }

  /// Reorder windows front to back. Unlisted windows keep their relative
  /// order behind the listed ones.
  pub fn set_z_order(&self, front_to_back: &[WindowHandle]) {
    let mut world = self.world.lock();
    world.windows.sort_by_key(|w| {
      front_to_back
        .iter()
        .position(|h| *h == w.handle)
        .unwrap_or(usize::MAX)
    });
  }

  /// Simulate the OS releasing a window's number while the element lives on.
  pub fn release_number(&self, handle: WindowHandle) {
    if let Some(w) = self.world.lock().window_mut(handle) {
      w.number = WindowNumber::INVALID;
    }
  }

  /// Fail the next `times` attribute queries touching `kind` with `Busy`.
  pub fn fail_next(&self, handle: WindowHandle, kind: AttributeKind, times: u32) {
    self.world.lock().failures.insert((handle, kind), times);
  }

  /// Focus calls made so far, in order.
  pub fn focus_calls(&self) -> Vec<FocusCall> {
    self.world.lock().focus_log.clone()
  }

  /// Live per-process subscriptions for `pid`.
  pub fn subscriber_count(&self, pid: ProcessId) -> usize {
    self
      .world
      .lock()
      .sinks
      .iter()
      .filter(|s| matches!(s.scope, SinkScope::App(p, _) if p == pid))
      .count()
  }

  fn register(&self, scope: SinkScope, notifier: Notifier) -> Subscription {
    let id = self.world.lock().add_sink(scope, notifier);
    let world: Weak<Mutex<World>> = Arc::downgrade(&self.world);
    Subscription::new(move || {
      if let Some(world) = world.upgrade() {
        world.lock().sinks.retain(|s| s.id != id);
      }
    })
  }
}

impl WindowDirectory for MemoryDirectory {
  fn has_permissions(&self) -> bool {
    self.world.lock().permissions
  }

  fn running_applications(&self) -> DirectoryResult<Vec<RunningApplication>> {
    Ok(self.world.lock().apps.clone())
  }

  fn enumerate_windows(&self, pid: ProcessId) -> DirectoryResult<Vec<WindowHandle>> {
    let world = self.world.lock();
    if world.app(pid).is_none() {
      return Err(DirectoryError::InvalidElement);
    }
    let mut handles: Vec<WindowHandle> = world
      .windows
      .iter()
      .filter(|w| w.handle.pid == pid)
      .map(|w| w.handle)
      .collect();
    handles.sort_by_key(|h| h.token);
    Ok(handles)
  }

  fn query_attributes(
    &self,
    handle: WindowHandle,
    kinds: &[AttributeKind],
  ) -> DirectoryResult<Attributes> {
    let mut world = self.world.lock();
    for kind in kinds {
      if let Some(remaining) = world.failures.get_mut(&(handle, *kind)) {
        if *remaining > 0 {
          *remaining -= 1;
          return Err(DirectoryError::Busy);
        }
      }
    }

    let window = world.window(handle)?;
    let mut attrs = Attributes::new();
    for kind in kinds {
      let value = match kind {
        AttributeKind::Title => AttributeResult::Text(window.title.clone()),
        AttributeKind::Minimized => AttributeResult::Flag(window.minimized),
        AttributeKind::Size => AttributeResult::Size(window.size),
        AttributeKind::Frame => AttributeResult::Rect(Rect {
          x: 0.0,
          y: 0.0,
          w: window.size.w,
          h: window.size.h,
        }),
        AttributeKind::Subrole => AttributeResult::Text(window.subrole.clone()),
      };
      attrs.insert(*kind, value);
    }
    Ok(attrs)
  }

  fn window_number(&self, handle: WindowHandle) -> DirectoryResult<WindowNumber> {
    Ok(self.world.lock().window(handle)?.number)
  }

  fn focused_window(&self, pid: ProcessId) -> DirectoryResult<Option<WindowHandle>> {
    let world = self.world.lock();
    if world.app(pid).is_none() {
      return Err(DirectoryError::InvalidElement);
    }
    Ok(
      world
        .windows
        .iter()
        .find(|w| w.handle.pid == pid && !w.minimized)
        .map(|w| w.handle),
    )
  }

  fn subscribe(
    &self,
    pid: ProcessId,
    kinds: &[AppEventKind],
    notifier: Notifier,
  ) -> DirectoryResult<Subscription> {
    if self.world.lock().app(pid).is_none() {
      return Err(DirectoryError::InvalidElement);
    }
    Ok(self.register(SinkScope::App(pid, kinds.to_vec()), notifier))
  }

  fn subscribe_lifecycle(&self, notifier: Notifier) -> DirectoryResult<Subscription> {
    Ok(self.register(SinkScope::Lifecycle, notifier))
  }

  fn spaces(&self) -> DirectoryResult<Vec<Space>> {
    Ok(self.world.lock().spaces.clone())
  }

  fn current_space(&self) -> DirectoryResult<SpaceId> {
    Ok(self.world.lock().current)
  }

  fn windows_in_spaces(&self, spaces: &[SpaceId]) -> DirectoryResult<Vec<WindowNumber>> {
    let world = self.world.lock();
    Ok(
      world
        .windows
        .iter()
        .filter(|w| world.on_screen(w) && w.spaces.iter().any(|s| spaces.contains(s)))
        .map(|w| w.number)
        .collect(),
    )
  }

  fn spaces_for_window(&self, number: WindowNumber) -> DirectoryResult<Vec<SpaceId>> {
    let world = self.world.lock();
    Ok(
      world
        .windows
        .iter()
        .find(|w| w.number == number && number.is_valid())
        .filter(|w| world.on_screen(w))
        .map(|w| w.spaces.clone())
        .unwrap_or_default(),
    )
  }

  fn raise(&self, handle: WindowHandle) -> DirectoryResult<()> {
    let restored = {
      let mut world = self.world.lock();
      world.focus_log.push(FocusCall::Raise(handle));
      let window = world
        .window_mut(handle)
        .ok_or(DirectoryError::InvalidElement)?;
      let restored = window.minimized;
      window.minimized = false;
      world.bring_to_front(handle);
      restored
    };
    if restored {
      self.emit_app(handle.pid, AppEventKind::WindowDeminimized, Some(handle));
    }
    Ok(())
  }

  fn make_key(&self, handle: WindowHandle) -> DirectoryResult<()> {
    let mut world = self.world.lock();
    world.focus_log.push(FocusCall::MakeKey(handle));
    world.window(handle).map(|_| ())
  }

  fn set_front_process(&self, pid: ProcessId) -> DirectoryResult<()> {
    let unhidden = {
      let mut world = self.world.lock();
      world.focus_log.push(FocusCall::SetFrontProcess(pid));
      let app = world
        .apps
        .iter_mut()
        .find(|a| a.pid == pid)
        .ok_or(DirectoryError::InvalidElement)?;
      let unhidden = app.is_hidden;
      app.is_hidden = false;
      unhidden
    };
    if unhidden {
      self.emit_app(pid, AppEventKind::ApplicationShown, None);
    }
    self.emit_app(pid, AppEventKind::ApplicationActivated, None);
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::core::Inbound;

  fn app(pid: u32) -> RunningApplication {
    RunningApplication::new(pid, &format!("com.test.{pid}"), &format!("App {pid}"))
  }

  #[test]
  fn minimized_windows_are_not_on_any_space() {
    let dir = MemoryDirectory::new();
    dir.add_app(app(1));
    let a = dir.add_window(ProcessId(1), "a");
    let b = dir.add_window(ProcessId(1), "b");
    dir.set_minimized(a, true);

    let current = dir.current_space_id();
    let listed = dir.windows_in_spaces(&[current]).unwrap();
    assert_eq!(listed, vec![dir.window_number(b).unwrap()]);
    assert!(dir.spaces_for_window(dir.window_number(a).unwrap()).unwrap().is_empty());
  }

  #[test]
  fn scripted_failures_run_out() {
    let dir = MemoryDirectory::new();
    dir.add_app(app(1));
    let w = dir.add_window(ProcessId(1), "a");
    dir.fail_next(w, AttributeKind::Title, 2);

    assert_eq!(dir.query_attributes(w, &[AttributeKind::Title]), Err(DirectoryError::Busy));
    assert!(dir.query_attributes(w, &[AttributeKind::Minimized]).is_ok());
    assert_eq!(dir.query_attributes(w, &[AttributeKind::Title]), Err(DirectoryError::Busy));
    let attrs = dir.query_attributes(w, &[AttributeKind::Title]).unwrap();
    assert_eq!(attrs.title(), Some("a"));
  }

  #[test]
  fn dropping_subscription_stops_delivery() {
    let dir = MemoryDirectory::new();
    dir.add_app(app(1));
    let (tx, rx) = crossbeam_channel::unbounded();
    let sub = dir
      .subscribe(ProcessId(1), &AppEventKind::ALL, Notifier::new(tx))
      .unwrap();
    assert_eq!(dir.subscriber_count(ProcessId(1)), 1);

    dir.open_window(ProcessId(1), "first");
    assert!(matches!(rx.try_recv(), Ok(Inbound::App(n)) if n.kind == AppEventKind::WindowCreated));

    drop(sub);
    assert_eq!(dir.subscriber_count(ProcessId(1)), 0);
    dir.open_window(ProcessId(1), "second");
    assert!(rx.try_recv().is_err());
  }

  #[test]
  fn raise_restores_minimized_window_and_moves_it_front() {
    let dir = MemoryDirectory::new();
    dir.add_app(app(1));
    let a = dir.add_window(ProcessId(1), "a");
    let _b = dir.add_window(ProcessId(1), "b");
    dir.set_minimized(a, true);

    dir.raise(a).unwrap();
    assert_eq!(dir.focused_window(ProcessId(1)).unwrap(), Some(a));
    assert_eq!(dir.focus_calls(), vec![FocusCall::Raise(a)]);
  }

  #[test]
  fn terminate_unidentified_drops_bundle_id() {
    let dir = MemoryDirectory::new();
    dir.add_app(app(7));
    let (tx, rx) = crossbeam_channel::unbounded();
    let _sub = dir.subscribe_lifecycle(Notifier::new(tx)).unwrap();

    dir.terminate_unidentified(ProcessId(7));
    match rx.try_recv() {
      Ok(Inbound::Lifecycle(LifecycleEvent::Terminated(apps))) => {
        assert_eq!(apps.len(), 1);
        assert_eq!(apps[0].pid, ProcessId(7));
        assert!(apps[0].bundle_id.is_none());
      }
      other => panic!("unexpected {other:?}"),
    }
  }
}
