/*!
Off-path work.

The reconciler never calls the directory. It emits [`Job`]s; a worker runs
each one against the directory and hands back a [`Resolution`] that re-enters
the inbound queue. Resolutions may arrive late; the reconciler re-checks
everything it applies.

Jobs that add windows carry the stamp they were dispatched with and always
resolve, even on failure, so the reconciler can retire the stamp.
*/

use std::collections::HashMap;
use std::sync::Arc;

use super::attributes::AttributeReader;
use super::journal::Seq;
use super::registry::{AppWindows, NewWindow, RebuildInput};
use super::spaces::{SpaceLayout, SpaceResolver};
use super::tracker::AppInfo;
use crate::platform::{Notifier, Subscription};
use crate::types::{
  AppEventKind, ProcessId, RunningApplication, SpaceAssignment, SpaceId, WindowHandle,
  WindowIdentity,
};

/// A directory round-trip requested by the reconciler.
#[derive(Debug, Clone)]
pub(crate) enum Job {
  /// List running processes (startup).
  Applications,
  /// Open the per-process notification subscription.
  Subscribe(ProcessId),
  /// Enumerate and describe every window of a process.
  Discover { app: AppInfo, since: Seq },
  /// Describe one window reported by a notification.
  Describe {
    app: AppInfo,
    handle: WindowHandle,
    since: Seq,
  },
  /// Find the focused window of a process that was activated.
  ResolveFocused(ProcessId),
  RefreshTitle { handle: WindowHandle, cached: String },
  /// Gather everything for a full rebuild.
  Rebuild { apps: Vec<AppInfo>, since: Seq },
  /// Re-resolve desktop membership of tracked windows.
  ResolveSpaces(Vec<(WindowIdentity, WindowHandle, bool)>),
  /// Read the current desktop's z-order for tracked windows.
  SortByLevel(Vec<WindowHandle>),
}

/// The result of a [`Job`], applied by the reconciler.
#[derive(Debug)]
pub(crate) enum Resolution {
  Applications(Vec<RunningApplication>),
  Subscribed {
    pid: ProcessId,
    subscription: Subscription,
  },
  /// Empty when enumeration failed.
  Discovered {
    pid: ProcessId,
    since: Seq,
    windows: Vec<NewWindow>,
  },
  /// `None` when the element is not a switchable window or could not be read.
  Described {
    since: Seq,
    window: Option<NewWindow>,
  },
  Focused {
    pid: ProcessId,
    window: WindowHandle,
  },
  Title {
    handle: WindowHandle,
    title: String,
  },
  Rebuilt {
    since: Seq,
    input: RebuildInput,
  },
  RebuildFailed {
    since: Seq,
  },
  Spaces {
    current: SpaceId,
    assignments: Vec<(WindowIdentity, Option<SpaceAssignment>)>,
  },
  Levels(HashMap<WindowHandle, usize>),
}

/// Shared state for running jobs. Cheap to clone.
#[derive(Debug, Clone)]
pub(crate) struct JobContext {
  pub(crate) reader: AttributeReader,
  pub(crate) notifier: Notifier,
}

impl JobContext {
  fn resolver(&self) -> SpaceResolver<'_> {
    SpaceResolver::new(self.reader.directory(), self.reader.retry())
  }
}

/// Run one job. `None` when there is nothing to report (the failure has
/// been logged and the job is skipped for this cycle).
pub(crate) fn run(job: Job, ctx: &JobContext) -> Option<Resolution> {
  let directory = ctx.reader.directory();
  let retry = ctx.reader.retry();
  match job {
    Job::Applications => {
      match retry.run("running_applications", || directory.running_applications()) {
        Ok(apps) => Some(Resolution::Applications(apps)),
        Err(e) => {
          log::error!("Failed to list running applications: {e}");
          None
        }
      }
    }

    Job::Subscribe(pid) => {
      let subscribe = || directory.subscribe(pid, &AppEventKind::ALL, ctx.notifier.clone());
      match retry.run("subscribe", subscribe) {
        Ok(subscription) => Some(Resolution::Subscribed { pid, subscription }),
        Err(e) => {
          log::warn!("Failed to subscribe to {pid}: {e}");
          None
        }
      }
    }

    Job::Discover { app, since } => {
      let windows = match ctx.reader.discover(&app) {
        Ok(windows) => {
          let layout = layout_or_log(&ctx.resolver());
          windows
            .into_iter()
            .map(|w| w.into_new(&app, layout.as_ref()))
            .collect()
        }
        Err(e) => {
          log::debug!("discover {}: {e}", app.pid);
          Vec::new()
        }
      };
      Some(Resolution::Discovered {
        pid: app.pid,
        since,
        windows,
      })
    }

    Job::Describe { app, handle, since } => {
      let window = match ctx.reader.describe(handle, &app) {
        Ok(Some(window)) => {
          let mut window = window.into_new(&app, None);
          window.space = ctx
            .resolver()
            .space_for(handle, app.pinned)
            .unwrap_or_else(|e| {
              log::debug!("space for {handle:?} unavailable: {e}");
              None
            });
          Some(window)
        }
        Ok(None) => None,
        Err(e) => {
          log::debug!("describe {handle:?}: {e}");
          None
        }
      };
      Some(Resolution::Described { since, window })
    }

    Job::ResolveFocused(pid) => {
      match retry.run("focused_window", || directory.focused_window(pid)) {
        Ok(Some(window)) => Some(Resolution::Focused { pid, window }),
        Ok(None) => None,
        Err(e) => {
          log::debug!("focused_window {pid}: {e}");
          None
        }
      }
    }

    Job::RefreshTitle { handle, cached } => Some(Resolution::Title {
      title: ctx.reader.title(handle, &cached),
      handle,
    }),

    Job::Rebuild { apps, since } => {
      Some(gather_rebuild(apps, since, ctx).unwrap_or(Resolution::RebuildFailed { since }))
    }

    Job::ResolveSpaces(windows) => {
      let resolver = ctx.resolver();
      let layout = layout_or_log(&resolver)?;
      let assignments = windows
        .into_iter()
        .filter_map(|(identity, handle, pinned)| {
          let number = retry
            .run("window_number", || directory.window_number(handle))
            .ok()?;
          Some((identity, layout.assign(number, pinned)))
        })
        .collect();
      Some(Resolution::Spaces {
        current: layout.current.id,
        assignments,
      })
    }

    Job::SortByLevel(handles) => {
      let z_order = match ctx.resolver().current_z_order() {
        Ok(z_order) => z_order,
        Err(e) => {
          log::warn!("sort_by_level: {e}");
          return None;
        }
      };
      let levels: HashMap<_, _> = z_order
        .iter()
        .enumerate()
        .map(|(level, number)| (*number, level))
        .collect();
      let by_handle = handles
        .into_iter()
        .filter_map(|handle| {
          let number = retry
            .run("window_number", || directory.window_number(handle))
            .ok()?;
          levels.get(&number).map(|level| (handle, *level))
        })
        .collect();
      Some(Resolution::Levels(by_handle))
    }
  }
}

fn layout_or_log(resolver: &SpaceResolver<'_>) -> Option<SpaceLayout> {
  match resolver.layout() {
    Ok(layout) => Some(layout),
    Err(e) => {
      log::debug!("space layout unavailable: {e}");
      None
    }
  }
}

/// Gather all three rebuild sources. Per-process enumeration runs in
/// parallel on the current rayon pool.
fn gather_rebuild(apps: Vec<AppInfo>, since: Seq, ctx: &JobContext) -> Option<Resolution> {
  use rayon::prelude::*;

  let resolver = ctx.resolver();
  let layout = match resolver.layout() {
    Ok(layout) => layout,
    Err(e) => {
      log::warn!("rebuild: space layout unavailable: {e}");
      return None;
    }
  };
  let z_order = match resolver.z_order(&layout) {
    Ok(z_order) => z_order,
    Err(e) => {
      log::warn!("rebuild: window order unavailable: {e}");
      return None;
    }
  };

  let apps: Vec<AppWindows> = apps
    .into_par_iter()
    .filter_map(|app| match ctx.reader.discover(&app) {
      Ok(windows) => Some(AppWindows { app, windows }),
      Err(e) => {
        log::debug!("rebuild: skipping {}: {e}", app.pid);
        None
      }
    })
    .collect();

  Some(Resolution::Rebuilt {
    since,
    input: RebuildInput {
      z_order,
      layout,
      apps,
    },
  })
}

/// Owns the worker pool and hands finished jobs back to the reconciler.
pub(crate) struct Workers {
  pool: rayon::ThreadPool,
  ctx: Arc<JobContext>,
}

impl std::fmt::Debug for Workers {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Workers")
      .field("threads", &self.pool.current_num_threads())
      .finish_non_exhaustive()
  }
}

impl Workers {
  pub(crate) fn new(threads: usize, ctx: JobContext) -> Result<Self, rayon::ThreadPoolBuildError> {
    let pool = rayon::ThreadPoolBuilder::new()
      .num_threads(threads.max(1))
      .thread_name(|i| format!("winswitch-worker-{i}"))
      .build()?;
    Ok(Self {
      pool,
      ctx: Arc::new(ctx),
    })
  }

  pub(crate) fn spawn(&self, job: Job) {
    let ctx = Arc::clone(&self.ctx);
    self.pool.spawn(move || {
      if let Some(resolution) = run(job, &ctx) {
        ctx.notifier.send(super::Inbound::Resolved(resolution));
      }
    });
  }
}
