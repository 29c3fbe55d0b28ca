/*!
Core switcher instance - owns the reconciler thread, the worker pool, the
focus dispatcher, and event broadcasting.

# Module Structure

- `mod.rs` - Switcher handle, builder, runtime thread
- `reconciler.rs` - single-writer state machine applying inbound messages
- `registry/` - ordered window set, identities, rank-based rebuild
- `cursor.rs` - focus cursor that tracks a logical window
- `display.rs` - which windows a session offers
- `journal.rs` - guards late results against newer creates and destroys
- `tracker.rs` - running processes and their subscriptions
- `spaces.rs` - desktop membership and z-order
- `attributes.rs` - retrying attribute reads and the eligibility filter
- `jobs.rs` - directory round-trips on the worker pool
- `focus.rs` - serial focus dispatcher
- `config.rs` - engine settings

# Example

```ignore
let switcher = Switcher::builder()
    .exclude_pid(std::process::id())
    .max_attempts(5)
    .build(directory)?;

let mut events = switcher.subscribe();
switcher.intent(Intent::CycleNext)?;
while let Ok(event) = events.recv().await {
    // re-read switcher.snapshot() on Changed
}
```
*/

mod attributes;
mod config;
mod cursor;
mod display;
mod focus;
mod jobs;
mod journal;
mod reconciler;
mod registry;
mod spaces;
mod tracker;

pub use config::{AppsToShow, SpacesToShow, SwitcherConfig};
pub(crate) use reconciler::Inbound;

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use async_broadcast::{InactiveReceiver, Sender};
use crossbeam_channel::Receiver;
use parking_lot::{Mutex, RwLock};

use self::attributes::{AttributeReader, RetryPolicy};
use self::focus::FocusDispatcher;
use self::jobs::{JobContext, Workers};
use self::reconciler::{Effect, Flow, Publisher, Reconciler};
use crate::platform::{Notifier, Subscription, WindowDirectory};
use crate::types::{Event, Intent, ProcessId, Snapshot, SwitcherError, SwitcherResult};

/// Main switcher instance.
///
/// The engine starts when built and stops when the last clone is dropped (or
/// on [`Switcher::shutdown`]). Clone is cheap (Arc bumps) - share freely
/// across threads.
pub struct Switcher {
  snapshot: Arc<RwLock<Snapshot>>,
  events_tx: Sender<Event>,
  events_keepalive: InactiveReceiver<Event>,
  notifier: Notifier,
  config: Arc<SwitcherConfig>,
  runtime: Arc<Mutex<Option<Runtime>>>,
}

impl Clone for Switcher {
  fn clone(&self) -> Self {
    Self {
      snapshot: Arc::clone(&self.snapshot),
      events_tx: self.events_tx.clone(),
      events_keepalive: self.events_keepalive.clone(),
      notifier: self.notifier.clone(),
      config: Arc::clone(&self.config),
      runtime: Arc::clone(&self.runtime),
    }
  }
}

impl std::fmt::Debug for Switcher {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Switcher")
      .field("revision", &self.snapshot.read().revision)
      .finish_non_exhaustive()
  }
}

/// Builder for configuring a Switcher instance.
///
/// # Example
///
/// ```ignore
/// let switcher = Switcher::builder()
///     .exclude_pid(std::process::id())
///     .blacklist(["com.apple.dock"])
///     .build(directory)?;
/// ```
#[derive(Debug, Default, Clone)]
#[must_use = "Builder does nothing until .build() is called"]
pub struct SwitcherBuilder {
  config: SwitcherConfig,
}

impl SwitcherBuilder {
  /// Replace the whole configuration (e.g. one loaded from JSON).
  pub fn config(mut self, config: SwitcherConfig) -> Self {
    self.config = config;
    self
  }

  /// Never track this process. Typically your own PID.
  pub const fn exclude_pid(mut self, pid: u32) -> Self {
    self.config.exclude_pid = Some(ProcessId(pid));
    self
  }

  /// Bundle ids that are never tracked.
  pub fn blacklist<I, S>(mut self, bundle_ids: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.config.blacklist = bundle_ids.into_iter().map(Into::into).collect();
    self
  }

  /// Bundle ids whose windows are always shown on the current desktop.
  pub fn pinned_bundle_ids<I, S>(mut self, bundle_ids: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.config.pinned_bundle_ids = bundle_ids.into_iter().map(Into::into).collect();
    self
  }

  /// Offer minimized windows while cycling. Default: true.
  pub const fn show_minimized(mut self, show: bool) -> Self {
    self.config.show_minimized = show;
    self
  }

  /// Offer windows of hidden applications while cycling. Default: true.
  pub const fn show_hidden(mut self, show: bool) -> Self {
    self.config.show_hidden = show;
    self
  }

  /// Limit sessions to some desktops. Default: all.
  pub const fn spaces_to_show(mut self, spaces: SpacesToShow) -> Self {
    self.config.spaces_to_show = spaces;
    self
  }

  /// Limit sessions to some applications. Default: all.
  pub const fn apps_to_show(mut self, apps: AppsToShow) -> Self {
    self.config.apps_to_show = apps;
    self
  }

  /// Minimum width and height (exclusive) of a switchable window. Default: 0.
  pub const fn min_window_size(mut self, size: f64) -> Self {
    self.config.min_window_size = size;
    self
  }

  /// Attempts per directory call. Default: 3.
  pub const fn max_attempts(mut self, attempts: u32) -> Self {
    self.config.max_attempts = attempts;
    self
  }

  /// Pause between attempts in milliseconds. Default: 5.
  pub const fn retry_delay_ms(mut self, ms: u64) -> Self {
    self.config.retry_delay_ms = ms;
    self
  }

  /// Worker pool size. Default: 4.
  pub const fn worker_threads(mut self, threads: usize) -> Self {
    self.config.worker_threads = threads;
    self
  }

  /// Buffered UI events before the oldest are dropped. Default: 1000.
  pub const fn event_channel_capacity(mut self, capacity: usize) -> Self {
    self.config.event_channel_capacity = capacity;
    self
  }

  /// Start the engine against `directory`.
  ///
  /// Returns an error if the directory lacks accessibility permissions or a
  /// thread cannot be started. The registry fills asynchronously; watch for
  /// the first `Changed` event.
  #[must_use = "Switcher instance must be stored to keep the engine running"]
  pub fn build(self, directory: Arc<dyn WindowDirectory>) -> SwitcherResult<Switcher> {
    Switcher::start(self.config, directory)
  }
}

/// Threads and subscriptions owned by a running engine.
struct Runtime {
  lifecycle: Option<Subscription>,
  notifier: Notifier,
  thread: Option<JoinHandle<()>>,
}

impl Drop for Runtime {
  fn drop(&mut self) {
    drop(self.lifecycle.take());
    self.notifier.send(Inbound::Shutdown);
    if let Some(t) = self.thread.take() {
      drop(t.join());
    }
  }
}

impl Switcher {
  /// Start with default options.
  #[must_use = "Switcher instance must be stored to keep the engine running"]
  pub fn new(directory: Arc<dyn WindowDirectory>) -> SwitcherResult<Self> {
    Self::builder().build(directory)
  }

  /// Create a builder for configuring a new Switcher instance.
  pub fn builder() -> SwitcherBuilder {
    SwitcherBuilder::default()
  }

  fn start(config: SwitcherConfig, directory: Arc<dyn WindowDirectory>) -> SwitcherResult<Self> {
    if !directory.has_permissions() {
      return Err(SwitcherError::PermissionDenied);
    }
    let config = Arc::new(config);

    let capacity = config.event_channel_capacity.max(1);
    let (mut events_tx, events_rx) = async_broadcast::broadcast(capacity);
    events_tx.set_overflow(true); // Drop oldest messages when full

    let snapshot = Arc::new(RwLock::new(Snapshot::default()));
    let (tx, rx) = crossbeam_channel::unbounded();
    let notifier = Notifier::new(tx);
    let retry = RetryPolicy::new(config.max_attempts, config.retry_delay());

    let lifecycle = directory.subscribe_lifecycle(notifier.clone())?;

    let workers = Workers::new(
      config.worker_threads,
      JobContext {
        reader: AttributeReader::new(Arc::clone(&directory), retry, config.min_window_size),
        notifier: notifier.clone(),
      },
    )
    .map_err(|e| SwitcherError::Spawn(e.to_string()))?;
    let focus = FocusDispatcher::spawn(directory, retry)?;

    let reconciler = Reconciler::new(
      Arc::clone(&config),
      Publisher::new(Arc::clone(&snapshot), events_tx.clone()),
    );
    notifier.send(Inbound::Bootstrap);

    let thread = thread::Builder::new()
      .name("winswitch-reconciler".into())
      .spawn(move || run(&rx, reconciler, &workers, &focus))
      .map_err(|e| SwitcherError::Spawn(e.to_string()))?;

    log::info!("Switcher started");

    Ok(Self {
      snapshot,
      events_tx,
      events_keepalive: events_rx.deactivate(),
      notifier: notifier.clone(),
      config,
      runtime: Arc::new(Mutex::new(Some(Runtime {
        lifecycle: Some(lifecycle),
        notifier,
        thread: Some(thread),
      }))),
    })
  }

  /// Current registry, cursor and mode.
  pub fn snapshot(&self) -> Snapshot {
    self.snapshot.read().clone()
  }

  /// Subscribe to UI events from this instance.
  pub fn subscribe(&self) -> async_broadcast::Receiver<Event> {
    self.events_keepalive.activate_cloned()
  }

  /// Feed an input intent (cycle, begin, commit, cancel).
  pub fn intent(&self, intent: Intent) -> SwitcherResult<()> {
    self.ensure_running()?;
    self.notifier.intent(intent);
    Ok(())
  }

  /// Rebuild the registry from OS truth (e.g. after waking from sleep).
  pub fn resync(&self) -> SwitcherResult<()> {
    self.ensure_running()?;
    self.notifier.resync();
    Ok(())
  }

  /// Re-sort windows by the current desktop's z-order.
  pub fn sort_by_level(&self) -> SwitcherResult<()> {
    self.ensure_running()?;
    self.notifier.sort_by_level();
    Ok(())
  }

  /// Inbound queue handle for backends and shortcut listeners.
  pub fn notifier(&self) -> Notifier {
    self.notifier.clone()
  }

  /// Settings this instance was built with.
  pub fn config(&self) -> &SwitcherConfig {
    &self.config
  }

  /// False after [`Switcher::shutdown`].
  pub fn is_running(&self) -> bool {
    self.runtime.lock().is_some()
  }

  /// Stop the engine for every clone. Pending focus requests still finish.
  pub fn shutdown(&self) {
    let runtime = self.runtime.lock().take();
    if runtime.is_some() {
      log::info!("Switcher stopping");
    }
    drop(runtime);
  }

  fn ensure_running(&self) -> SwitcherResult<()> {
    if self.is_running() {
      Ok(())
    } else {
      Err(SwitcherError::Stopped)
    }
  }
}

/// Reconciler thread: apply messages in arrival order and hand effects off.
fn run(
  rx: &Receiver<Inbound>,
  mut reconciler: Reconciler,
  workers: &Workers,
  focus: &FocusDispatcher,
) {
  for message in rx {
    if reconciler.handle(message) == Flow::Stop {
      break;
    }
    for effect in reconciler.take_effects() {
      match effect {
        Effect::Job(job) => workers.spawn(job),
        Effect::Focus(handle) => focus.dispatch(handle),
      }
    }
  }
  log::debug!("Reconciler stopped");
}
