/*!
Application tracker: the set of tracked processes and their subscriptions.

A process is tracked from the moment it is reported running (subject to
filters). Its window discovery and subscription wait for launch completion.
Each process owns at most one [`Subscription`]; removing the process drops
it, which unregisters from the directory.
*/

use std::collections::HashMap;

use super::config::SwitcherConfig;
use crate::platform::Subscription;
use crate::types::{ProcessId, RunningApplication};

/// What worker jobs need to know about a process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct AppInfo {
  pub(crate) pid: ProcessId,
  pub(crate) name: String,
  pub(crate) is_hidden: bool,
  /// Windows are pinned to the current desktop.
  pub(crate) pinned: bool,
}

#[derive(Debug)]
struct TrackedApplication {
  bundle_id: String,
  info: AppInfo,
  launch_complete: bool,
  subscription: Option<Subscription>,
}

#[derive(Debug, Default)]
pub(crate) struct ApplicationTracker {
  apps: HashMap<ProcessId, TrackedApplication>,
}

impl ApplicationTracker {
  pub(crate) fn new() -> Self {
    Self::default()
  }

  pub(crate) fn contains(&self, pid: ProcessId) -> bool {
    self.apps.contains_key(&pid)
  }

  pub(crate) fn info(&self, pid: ProcessId) -> Option<&AppInfo> {
    self.apps.get(&pid).map(|a| &a.info)
  }

  /// Processes whose launch has completed, ordered by pid.
  pub(crate) fn ready(&self) -> Vec<AppInfo> {
    let mut ready: Vec<AppInfo> = self
      .apps
      .values()
      .filter(|a| a.launch_complete)
      .map(|a| a.info.clone())
      .collect();
    ready.sort_by_key(|a| a.pid);
    ready
  }

  /// Start tracking newly reported processes.
  ///
  /// Skips the switcher's own process, processes without a bundle id,
  /// blacklisted bundles, and processes already tracked. Returns the
  /// accepted processes whose launch is complete; those are ready for
  /// subscription and window discovery now. The rest wait for
  /// [`ApplicationTracker::mark_launch_complete`].
  pub(crate) fn add_running_applications(
    &mut self,
    apps: Vec<RunningApplication>,
    config: &SwitcherConfig,
  ) -> Vec<AppInfo> {
    let mut ready = Vec::new();
    for app in apps {
      if config.exclude_pid == Some(app.pid) || self.apps.contains_key(&app.pid) {
        continue;
      }
      let Some(bundle_id) = app.bundle_id else {
        log::trace!("add_running_applications: {} has no bundle id, skipping", app.pid);
        continue;
      };
      if config.is_blacklisted(&bundle_id) {
        log::debug!("add_running_applications: {bundle_id} is blacklisted");
        continue;
      }

      let info = AppInfo {
        pid: app.pid,
        name: app.name,
        is_hidden: app.is_hidden,
        pinned: config.is_pinned(Some(&bundle_id)),
      };
      if app.launch_complete {
        ready.push(info.clone());
      }
      self.apps.insert(
        app.pid,
        TrackedApplication {
          bundle_id,
          info,
          launch_complete: app.launch_complete,
          subscription: None,
        },
      );
    }
    ready
  }

  /// Stop tracking terminated processes. Returns the pids whose windows must
  /// be removed from the registry.
  ///
  /// A report that still carries a bundle id must match the tracked process
  /// on both pid and bundle id. A report whose bundle id is already gone is
  /// matched by pid alone, and its pid is returned even if untracked so that
  /// any leftover windows are removed.
  pub(crate) fn remove_applications(&mut self, apps: &[RunningApplication]) -> Vec<ProcessId> {
    let mut removed = Vec::new();
    for app in apps {
      match &app.bundle_id {
        Some(bundle_id) => {
          let matches = self
            .apps
            .get(&app.pid)
            .is_some_and(|tracked| tracked.bundle_id == *bundle_id);
          if matches {
            self.apps.remove(&app.pid);
            removed.push(app.pid);
          } else {
            log::debug!("remove_applications: {} ({bundle_id}) not tracked", app.pid);
          }
        }
        None => {
          self.apps.remove(&app.pid);
          removed.push(app.pid);
        }
      }
    }
    removed
  }

  /// Returns the process if it was waiting on launch completion.
  pub(crate) fn mark_launch_complete(&mut self, pid: ProcessId) -> Option<AppInfo> {
    let app = self.apps.get_mut(&pid)?;
    if app.launch_complete {
      return None;
    }
    app.launch_complete = true;
    Some(app.info.clone())
  }

  /// Store a subscription on its process. Returns false (and drops the
  /// subscription) if the process is no longer tracked.
  pub(crate) fn attach_subscription(&mut self, pid: ProcessId, subscription: Subscription) -> bool {
    match self.apps.get_mut(&pid) {
      Some(app) => {
        app.subscription = Some(subscription);
        true
      }
      None => {
        log::debug!("attach_subscription: {pid} terminated before subscribing");
        false
      }
    }
  }

  /// Returns false if the process is not tracked.
  pub(crate) fn set_hidden(&mut self, pid: ProcessId, hidden: bool) -> bool {
    match self.apps.get_mut(&pid) {
      Some(app) => {
        app.info.is_hidden = hidden;
        true
      }
      None => false,
    }
  }
}
