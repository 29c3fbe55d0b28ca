/*!
Bookkeeping for results that land late.

Describe, discover and rebuild jobs read the directory off-thread, so their
results can be older than what the reconciler has applied since. Each such
job is stamped with the sequence number of the message that dispatched it.
While any stamped job is in flight, the journal records which handles were
destroyed and which were inserted, and at what sequence number. A result
stamped `since` must not resurrect a handle destroyed after `since`, and a
rebuild stamped `since` must not drop a handle inserted after it.

Entries no in-flight job can ask about are pruned, so the journal is empty
whenever nothing is in flight.
*/

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::types::WindowHandle;

/// Sequence number of an inbound message.
pub(crate) type Seq = u64;

#[derive(Debug, Default)]
pub(crate) struct Journal {
  seq: Seq,
  /// Stamp -> number of jobs in flight with that stamp.
  in_flight: BTreeMap<Seq, usize>,
  destroyed: HashMap<WindowHandle, Seq>,
  inserted: HashMap<WindowHandle, Seq>,
}

impl Journal {
  /// Start a new message.
  pub(crate) fn advance(&mut self) {
    self.seq += 1;
  }

  /// Register a job dispatched by the current message.
  pub(crate) fn stamp(&mut self) -> Seq {
    *self.in_flight.entry(self.seq).or_default() += 1;
    self.seq
  }

  /// A job stamped `since` has been applied.
  pub(crate) fn complete(&mut self, since: Seq) {
    if let Some(count) = self.in_flight.get_mut(&since) {
      *count -= 1;
      if *count == 0 {
        self.in_flight.remove(&since);
      }
    }
    self.prune();
  }

  pub(crate) fn record_destroyed(&mut self, handle: WindowHandle) {
    if !self.in_flight.is_empty() {
      self.destroyed.insert(handle, self.seq);
    }
  }

  pub(crate) fn record_inserted(&mut self, handle: WindowHandle) {
    if !self.in_flight.is_empty() {
      self.inserted.insert(handle, self.seq);
    }
  }

  /// Whether `handle` was destroyed after a job stamped `since` dispatched.
  pub(crate) fn destroyed_since(&self, handle: WindowHandle, since: Seq) -> bool {
    self.destroyed.get(&handle).is_some_and(|at| *at > since)
  }

  /// Handles inserted after a job stamped `since` dispatched.
  pub(crate) fn inserted_since(&self, since: Seq) -> HashSet<WindowHandle> {
    self
      .inserted
      .iter()
      .filter(|(_, at)| **at > since)
      .map(|(handle, _)| *handle)
      .collect()
  }

  fn prune(&mut self) {
    match self.in_flight.keys().next().copied() {
      None => {
        self.destroyed.clear();
        self.inserted.clear();
      }
      Some(oldest) => {
        self.destroyed.retain(|_, at| *at > oldest);
        self.inserted.retain(|_, at| *at > oldest);
      }
    }
  }

  #[cfg(test)]
  pub(crate) fn is_idle(&self) -> bool {
    self.in_flight.is_empty() && self.destroyed.is_empty() && self.inserted.is_empty()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::types::ProcessId;

  fn handle(token: u64) -> WindowHandle {
    WindowHandle::new(ProcessId(1), token)
  }

  #[test]
  fn nothing_is_recorded_without_jobs_in_flight() {
    let mut journal = Journal::default();
    journal.advance();
    journal.record_destroyed(handle(1));
    journal.record_inserted(handle(2));
    assert!(journal.is_idle());
  }

  #[test]
  fn only_changes_after_the_stamp_count() {
    let mut journal = Journal::default();
    journal.advance();
    let first = journal.stamp();
    journal.advance();
    journal.record_destroyed(handle(1));
    let second = journal.stamp();
    journal.advance();
    journal.record_inserted(handle(2));

    assert!(journal.destroyed_since(handle(1), first));
    assert!(!journal.destroyed_since(handle(1), second));
    assert_eq!(journal.inserted_since(first), HashSet::from([handle(2)]));
    assert_eq!(journal.inserted_since(second), HashSet::from([handle(2)]));
  }

  #[test]
  fn completing_prunes_what_no_job_can_ask_about() {
    let mut journal = Journal::default();
    journal.advance();
    let first = journal.stamp();
    journal.advance();
    journal.record_destroyed(handle(1));
    let second = journal.stamp();
    journal.advance();
    journal.record_destroyed(handle(2));

    journal.complete(first);
    assert!(!journal.destroyed_since(handle(1), first));
    assert!(journal.destroyed_since(handle(2), second));

    journal.complete(second);
    assert!(journal.is_idle());
  }

  #[test]
  fn same_stamp_counts_every_job() {
    let mut journal = Journal::default();
    journal.advance();
    let a = journal.stamp();
    let b = journal.stamp();
    assert_eq!(a, b);
    journal.advance();
    journal.record_inserted(handle(3));
    journal.complete(a);
    assert_eq!(journal.inserted_since(b), HashSet::from([handle(3)]));
    journal.complete(b);
    assert!(journal.is_idle());
  }
}
