#![allow(dead_code)]

use fibre_fwatcher::{Event, EventKind, OwnedEvent, WaitStatus, WatchEntry, Watcher};

use std::cell::RefCell;
use std::rc::Rc;

/// Generous bound for a wait that is expected to succeed.
pub const READY_WAIT_MS: i64 = 2_000;
pub const MAX_EVENTS: usize = 64;

pub type Log<T> = Rc<RefCell<Vec<T>>>;

pub fn log<T>() -> Log<T> {
  Rc::new(RefCell::new(Vec::new()))
}

/// Waits for the queue to turn readable, then reads one batch of events.
pub fn wait_and_drain(watcher: &mut Watcher, entry: WatchEntry, max: usize) -> Vec<OwnedEvent> {
  assert_eq!(watcher.wait(entry, READY_WAIT_MS).unwrap(), WaitStatus::Ready);
  drain(watcher, entry, max)
}

pub fn drain(watcher: &mut Watcher, entry: WatchEntry, max: usize) -> Vec<OwnedEvent> {
  let mut out = Vec::new();
  let n = watcher.events(entry, &mut out, max).unwrap();
  assert_eq!(n, out.len());
  out.iter().map(Event::to_owned_event).collect()
}

pub fn kinds_and_names(events: &[OwnedEvent]) -> Vec<(EventKind, String)> {
  events
    .iter()
    .map(|e| (e.kind, e.path.to_string_lossy().into_owned()))
    .collect()
}
