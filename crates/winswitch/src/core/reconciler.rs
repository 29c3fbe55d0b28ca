/*!
Event reconciler - the single writer.

Every notification, intent and worker result arrives as an [`Inbound`]
message on one queue. The reconciler applies them one at a time, in arrival
order, to the registry and cursor it owns. It never calls the directory:
anything that needs the OS becomes a [`Job`] and comes back later as a
[`Resolution`].

# States

- `Idle`: activation and focus changes move windows to the front (MRU).
- `Interactive`: a session is open. Ordering events are ignored so the list
  doesn't shuffle under the user; creation, destruction, launch and
  termination still apply, with the cursor rebased to keep its window.

Results that add windows are checked against the [`Journal`], so a late
result neither resurrects a window destroyed after its job was dispatched nor
drops one inserted after it.

During a session the cursor only lands on windows the display filter offers.

After each message, if anything changed, the snapshot is republished and a
`Changed` event follows any buffered UI events.
*/

use std::sync::Arc;

use async_broadcast::Sender;
use parking_lot::RwLock;

use super::config::SwitcherConfig;
use super::display::DisplayFilter;
use super::jobs::{Job, Resolution};
use super::journal::{Journal, Seq};
use super::registry::{NewWindow, Registry};
use super::tracker::{AppInfo, ApplicationTracker};
use crate::types::{
  AppEventKind, AppNotification, Event, Intent, LifecycleEvent, Mode, ProcessId, Snapshot,
  WindowHandle,
};

/// Everything the reconciler consumes.
#[derive(Debug)]
pub(crate) enum Inbound {
  App(AppNotification),
  Lifecycle(LifecycleEvent),
  Intent(Intent),
  Resolved(Resolution),
  /// Discover running processes and build the initial registry.
  Bootstrap,
  /// Full rebuild against OS truth (e.g. after wake).
  Resync,
  SortByLevel,
  Shutdown,
}

/// Work the runtime performs on the reconciler's behalf.
#[derive(Debug)]
pub(crate) enum Effect {
  Job(Job),
  Focus(WindowHandle),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flow {
  Continue,
  Stop,
}

/// Publishes snapshots and UI events.
#[derive(Debug, Clone)]
pub(crate) struct Publisher {
  snapshot: Arc<RwLock<Snapshot>>,
  events: Sender<Event>,
}

impl Publisher {
  pub(crate) const fn new(snapshot: Arc<RwLock<Snapshot>>, events: Sender<Event>) -> Self {
    Self { snapshot, events }
  }

  /// Store the snapshot, then emit `events` followed by `Changed`.
  fn publish(&self, snapshot: Snapshot, events: Vec<Event>) {
    let revision = snapshot.revision;
    *self.snapshot.write() = snapshot;
    for event in events {
      self.emit(event);
    }
    self.emit(Event::Changed { revision });
  }

  fn emit(&self, event: Event) {
    match self.events.try_broadcast(event) {
      Ok(None) => {}
      Ok(Some(_)) => {
        log::error!(
          "Event channel overflow - oldest event dropped. \
           Consider increasing event_channel_capacity or processing events faster."
        );
      }
      Err(e) => {
        if e.is_full() {
          log::error!("Event channel full - event dropped.");
        }
      }
    }
  }
}

/// Owns the registry, cursor, tracker and session state.
#[derive(Debug)]
pub(crate) struct Reconciler {
  registry: Registry,
  tracker: ApplicationTracker,
  journal: Journal,
  config: Arc<SwitcherConfig>,
  publisher: Publisher,
  mode: Mode,
  /// The registry may have drifted from OS truth; rebuild before next use.
  stale: bool,
  revision: u64,
  dirty: bool,
  outbound: Vec<Event>,
  effects: Vec<Effect>,
}

impl Reconciler {
  pub(crate) fn new(config: Arc<SwitcherConfig>, publisher: Publisher) -> Self {
    Self {
      registry: Registry::with_filter(DisplayFilter::from_config(&config)),
      tracker: ApplicationTracker::new(),
      journal: Journal::default(),
      config,
      publisher,
      mode: Mode::Idle,
      stale: false,
      revision: 0,
      dirty: false,
      outbound: Vec::new(),
      effects: Vec::new(),
    }
  }

  /// Effects requested while handling the last message.
  pub(crate) fn take_effects(&mut self) -> Vec<Effect> {
    std::mem::take(&mut self.effects)
  }

  /// Apply one message as one batch.
  pub(crate) fn handle(&mut self, message: Inbound) -> Flow {
    let was_empty = self.registry.is_empty();
    self.journal.advance();
    match message {
      Inbound::Shutdown => return Flow::Stop,
      Inbound::Bootstrap => self.job(Job::Applications),
      Inbound::App(notification) => self.on_app_event(notification),
      Inbound::Lifecycle(event) => self.on_lifecycle(event),
      Inbound::Intent(intent) => self.on_intent(intent),
      Inbound::Resolved(resolution) => self.on_resolution(resolution),
      Inbound::Resync => {
        log::debug!("Resync requested");
        self.dispatch_rebuild();
      }
      Inbound::SortByLevel => {
        let handles = self.registry.handles().into_iter().map(|(_, h)| h).collect();
        self.job(Job::SortByLevel(handles));
      }
    }
    self.finish_batch(was_empty);
    Flow::Continue
  }

  fn job(&mut self, job: Job) {
    self.effects.push(Effect::Job(job));
  }

  fn finish_batch(&mut self, was_empty: bool) {
    if self.mode == Mode::Interactive && self.registry.keep_selection_displayed() {
      self.dirty = true;
    }
    if !was_empty && self.registry.is_empty() {
      log::debug!("Registry is empty, hiding");
      self.mode = Mode::Idle;
      if !self.outbound.contains(&Event::Hide) {
        self.outbound.push(Event::Hide);
      }
      self.dirty = true;
    }
    if !self.dirty && self.outbound.is_empty() {
      return;
    }
    self.dirty = false;
    self.revision += 1;
    let snapshot = self.registry.snapshot(self.mode, self.revision);
    self
      .publisher
      .publish(snapshot, std::mem::take(&mut self.outbound));
  }

  // ==========================================================================
  // Per-process notifications
  // ==========================================================================

  fn on_app_event(&mut self, notification: AppNotification) {
    let AppNotification { pid, kind, window } = notification;
    if !self.tracker.contains(pid) {
      log::debug!("{kind:?} for untracked process {pid}, dropping");
      return;
    }

    match kind {
      AppEventKind::ApplicationActivated => {
        if self.mode == Mode::Interactive {
          log::trace!("Activation of {pid} ignored during session");
          return;
        }
        self.registry.set_frontmost(pid);
        self.job(Job::ResolveFocused(pid));
      }
      AppEventKind::ApplicationHidden | AppEventKind::ApplicationShown => {
        let hidden = kind == AppEventKind::ApplicationHidden;
        self.tracker.set_hidden(pid, hidden);
        self.registry.set_hidden_for(pid, hidden);
        self.dirty = true;
      }
      AppEventKind::WindowCreated
      | AppEventKind::WindowDestroyed
      | AppEventKind::FocusedWindowChanged
      | AppEventKind::WindowMinimized
      | AppEventKind::WindowDeminimized
      | AppEventKind::TitleChanged => {
        let Some(window) = window else {
          log::debug!("{kind:?} for {pid} without a window, dropping");
          return;
        };
        self.on_window_event(pid, kind, window);
      }
    }
  }

  fn on_window_event(&mut self, pid: ProcessId, kind: AppEventKind, window: WindowHandle) {
    match kind {
      AppEventKind::WindowCreated => {
        // Un-minimizing re-announces windows we already have.
        if self.registry.contains_handle(window) {
          log::trace!("{window:?} already tracked");
          return;
        }
        self.describe(pid, window);
      }
      AppEventKind::FocusedWindowChanged => {
        if self.mode == Mode::Interactive {
          log::trace!("Focus change in {pid} ignored during session");
          return;
        }
        match self.registry.identity_of(window) {
          Some(identity) => {
            self.registry.move_to_front(identity);
            self.dirty = true;
          }
          None => self.describe(pid, window),
        }
      }
      AppEventKind::WindowDestroyed => {
        self.journal.record_destroyed(window);
        if self.registry.remove_handle(window).is_some() {
          self.dirty = true;
        } else {
          log::trace!("{window:?} destroyed but not tracked");
        }
      }
      AppEventKind::WindowMinimized | AppEventKind::WindowDeminimized => {
        let minimized = kind == AppEventKind::WindowMinimized;
        if let Some(identity) = self.registry.set_minimized(window, minimized) {
          self.outbound.push(Event::RefreshThumbnail { window: identity });
          self.dirty = true;
        }
      }
      AppEventKind::TitleChanged => {
        let cached = self
          .registry
          .identity_of(window)
          .and_then(|id| self.registry.get(id))
          .map(|w| w.title.clone());
        if let Some(cached) = cached {
          self.job(Job::RefreshTitle {
            handle: window,
            cached,
          });
        }
      }
      AppEventKind::ApplicationActivated
      | AppEventKind::ApplicationHidden
      | AppEventKind::ApplicationShown => {}
    }
  }

  fn describe(&mut self, pid: ProcessId, handle: WindowHandle) {
    if let Some(app) = self.tracker.info(pid).cloned() {
      let since = self.journal.stamp();
      self.job(Job::Describe { app, handle, since });
    }
  }

  // ==========================================================================
  // Process lifecycle
  // ==========================================================================

  fn on_lifecycle(&mut self, event: LifecycleEvent) {
    match event {
      LifecycleEvent::Launched(apps) => {
        for app in self.tracker.add_running_applications(apps, &self.config) {
          self.start_app(app);
        }
      }
      LifecycleEvent::Terminated(apps) => {
        for pid in self.tracker.remove_applications(&apps) {
          if self.registry.remove_process(pid) > 0 {
            self.dirty = true;
          }
        }
      }
      LifecycleEvent::LaunchCompleted(pid) => {
        if let Some(app) = self.tracker.mark_launch_complete(pid) {
          self.start_app(app);
        }
      }
      LifecycleEvent::SpaceChanged => {
        self.stale = true;
        if self.mode == Mode::Interactive {
          self.dispatch_rebuild();
        }
      }
    }
  }

  fn start_app(&mut self, app: AppInfo) {
    self.job(Job::Subscribe(app.pid));
    let since = self.journal.stamp();
    self.job(Job::Discover { app, since });
  }

  // ==========================================================================
  // Intents
  // ==========================================================================

  fn on_intent(&mut self, intent: Intent) {
    match (intent, self.mode) {
      (Intent::BeginSession, Mode::Idle) => self.begin(0),
      (Intent::CycleNext, Mode::Idle) => self.begin(1),
      (Intent::CyclePrevious, Mode::Idle) => self.begin(-1),
      (Intent::CycleNext, Mode::Interactive) => self.cycle(1),
      (Intent::CyclePrevious, Mode::Interactive) => self.cycle(-1),
      (Intent::CommitFocus, Mode::Interactive) => {
        if let Some((_, window)) = self.registry.selected() {
          self.effects.push(Effect::Focus(window.handle));
        }
        self.end_session();
      }
      (Intent::CancelSession, Mode::Interactive) => self.end_session(),
      (Intent::BeginSession, Mode::Interactive)
      | (Intent::CommitFocus | Intent::CancelSession, Mode::Idle) => {
        log::trace!("{intent:?} ignored in {:?}", self.mode);
      }
    }
  }

  fn begin(&mut self, step: isize) {
    if self.stale {
      self.dispatch_rebuild();
    } else {
      self.dispatch_space_refresh();
    }
    if !self.registry.has_displayed() {
      log::debug!("Nothing to switch to");
      return;
    }
    self.mode = Mode::Interactive;
    self.registry.reset_cursor();
    if step != 0 {
      self.registry.cycle(step);
    }
    self.outbound.push(Event::Show);
    self.dirty = true;
  }

  fn cycle(&mut self, step: isize) {
    if self.registry.is_empty() {
      return;
    }
    self.registry.cycle(step);
    self.dirty = true;
  }

  fn end_session(&mut self) {
    self.mode = Mode::Idle;
    self.outbound.push(Event::Hide);
    self.dirty = true;
  }

  fn dispatch_rebuild(&mut self) {
    self.stale = false;
    let apps = self.tracker.ready();
    let since = self.journal.stamp();
    self.job(Job::Rebuild { apps, since });
  }

  fn dispatch_space_refresh(&mut self) {
    if self.registry.is_empty() {
      return;
    }
    let windows = self
      .registry
      .handles()
      .into_iter()
      .map(|(identity, handle)| {
        let pinned = self.tracker.info(handle.pid).is_some_and(|a| a.pinned);
        (identity, handle, pinned)
      })
      .collect();
    self.job(Job::ResolveSpaces(windows));
  }

  // ==========================================================================
  // Worker results
  // ==========================================================================

  fn on_resolution(&mut self, resolution: Resolution) {
    match resolution {
      Resolution::Applications(apps) => {
        for app in self.tracker.add_running_applications(apps, &self.config) {
          self.job(Job::Subscribe(app.pid));
        }
        self.dispatch_rebuild();
      }
      Resolution::Subscribed { pid, subscription } => {
        self.tracker.attach_subscription(pid, subscription);
      }
      Resolution::Discovered {
        pid,
        since,
        windows,
      } => {
        if self.tracker.contains(pid) {
          self.insert_since(since, windows);
        } else {
          log::debug!("Discovery for {pid} arrived after termination");
        }
        self.journal.complete(since);
      }
      Resolution::Described { since, window } => {
        if let Some(window) = window.filter(|w| self.tracker.contains(w.handle.pid)) {
          self.insert_since(since, vec![window]);
        }
        self.journal.complete(since);
      }
      Resolution::Focused { pid, window } => {
        if self.mode == Mode::Interactive {
          return;
        }
        match self.registry.identity_of(window) {
          Some(identity) => {
            self.registry.move_to_front(identity);
            self.dirty = true;
          }
          None => log::trace!("Focused window of {pid} is not tracked"),
        }
      }
      Resolution::Title { handle, title } => {
        if self.registry.set_title(handle, title).is_some() {
          self.dirty = true;
        }
      }
      Resolution::Rebuilt { since, mut input } => {
        input.apps.retain(|a| self.tracker.contains(a.app.pid));
        for app in &mut input.apps {
          app
            .windows
            .retain(|w| !self.journal.destroyed_since(w.handle, since));
        }
        let recent = self.journal.inserted_since(since);
        self.registry.rebuild_from_spaces(input, &recent);
        self.journal.complete(since);
        log::debug!(
          "Rebuilt: {} windows in {:?} order",
          self.registry.len(),
          self.registry.ordering()
        );
        self.dirty = true;
      }
      Resolution::RebuildFailed { since } => {
        self.stale = true;
        self.journal.complete(since);
      }
      Resolution::Spaces {
        current,
        assignments,
      } => {
        if self.registry.set_current_space(current) {
          self.dirty = true;
        }
        for (identity, space) in assignments {
          if self.registry.set_space(identity, space) {
            self.dirty = true;
          }
        }
      }
      Resolution::Levels(levels) => {
        self.registry.sort_by_level(&levels);
        self.dirty = true;
      }
    }
  }

  /// Insert the windows of a result stamped `since`, minus any destroyed
  /// after it.
  fn insert_since(&mut self, since: Seq, mut windows: Vec<NewWindow>) {
    windows.retain(|w| {
      let destroyed = self.journal.destroyed_since(w.handle, since);
      if destroyed {
        log::debug!("{:?} was destroyed while being described, dropping", w.handle);
      }
      !destroyed
    });
    let fresh = self.registry.insert_front(windows);
    for identity in &fresh {
      if let Some(window) = self.registry.get(*identity) {
        self.journal.record_inserted(window.handle);
      }
    }
    if !fresh.is_empty() {
      self.dirty = true;
    }
  }
}
