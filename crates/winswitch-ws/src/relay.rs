/*!
Engine events to client frames.

The engine emits a batch's UI events and then `Changed`. Clients get the
batch's snapshot first, as `switcher:state`, and then the UI events, so a
`switcher:show` always lands on a list that is already current.
*/

use serde::Serialize;
use ts_rs::TS;
use winswitch::{Event, Snapshot, WindowIdentity};

/// Frames pushed to every connected client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[serde(tag = "event", content = "data")]
#[ts(export)]
pub enum ServerFrame {
  /// Sent once on connect, and again if the client fell behind.
  #[serde(rename = "sync:init")]
  SyncInit(Snapshot),

  /// The snapshot after a batch of mutations.
  #[serde(rename = "switcher:state")]
  State(Snapshot),

  /// A session opened.
  #[serde(rename = "switcher:show")]
  Show,

  /// The session ended.
  #[serde(rename = "switcher:hide")]
  Hide,

  /// Re-capture this window's thumbnail.
  #[serde(rename = "window:thumbnail")]
  RefreshThumbnail { window: WindowIdentity },
}

/// Buffers UI events until their batch's snapshot has gone out.
#[derive(Debug, Default)]
pub(crate) struct Relay {
  pending: Vec<ServerFrame>,
  sent_revision: Option<u64>,
}

impl Relay {
  /// Frames to send for one engine event. `snapshot` is read only when a
  /// batch closes with a revision newer than the last one sent.
  pub(crate) fn accept(
    &mut self,
    event: Event,
    snapshot: impl FnOnce() -> Snapshot,
  ) -> Vec<ServerFrame> {
    match event {
      Event::Show => self.pending.push(ServerFrame::Show),
      Event::Hide => self.pending.push(ServerFrame::Hide),
      Event::RefreshThumbnail { window } => {
        self.pending.push(ServerFrame::RefreshThumbnail { window });
      }
      Event::Changed { revision } => {
        // A later batch's snapshot already went out.
        if self.sent_revision.is_some_and(|sent| revision <= sent) {
          return std::mem::take(&mut self.pending);
        }
        return self.resync(snapshot());
      }
    }
    Vec::new()
  }

  /// Send `snapshot` now, then whatever was buffered.
  pub(crate) fn resync(&mut self, snapshot: Snapshot) -> Vec<ServerFrame> {
    self.sent_revision = Some(snapshot.revision);
    let mut frames = vec![ServerFrame::State(snapshot)];
    frames.append(&mut self.pending);
    frames
  }
}
