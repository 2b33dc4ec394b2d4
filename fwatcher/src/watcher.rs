use crate::config::{WaitStrategy, WatcherConfig};
use crate::entry::{EventMask, WatchEntry};
use crate::error::{Result, WatchError};
use crate::event::{decode_records, Event, RECORD_HEADER};
use crate::sys;
use crate::table::WatchTable;

use fibre_co::Coroutine;

use std::fmt;
use std::os::fd::{AsFd, OwnedFd};
use std::path::Path;
use std::time::{Duration, Instant};

// Room reserved per record on top of the header; most names fit.
const NAME_ALLOWANCE: usize = 16;
// One record with the longest legal name must always fit.
const MIN_BUFFER: usize = RECORD_HEADER + libc::NAME_MAX as usize + 1;

/// Outcome of waiting for a watcher to become readable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitStatus {
  /// Change records are queued; call [`Watcher::events`].
  Ready,
  TimedOut,
}

/// Owns one inotify instance and the scratch buffer records are read into.
///
/// All watches added to a watcher share its notification queue. Events read
/// through any entry therefore may belong to any live watch; each [`Event`]
/// names the [`WatchEntry`] it was queued for.
pub struct Watcher {
  fd: OwnedFd,
  buffer: Box<[u8]>,
  table: WatchTable,
  config: WatcherConfig,
}

impl fmt::Debug for Watcher {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Watcher")
      .field("fd", &self.fd)
      .field("buffer_len", &self.buffer.len())
      .field("watches", &self.table.len())
      .field("config", &self.config)
      .finish()
  }
}

// Negative waits forever, zero polls, positive is clamped to what poll(2) takes.
fn poll_timeout(timeout_ms: i64) -> i32 {
  if timeout_ms < 0 {
    -1
  } else {
    i32::try_from(timeout_ms).unwrap_or(i32::MAX)
  }
}

impl Watcher {
  pub fn new() -> Result<Self> {
    Self::with_config(WatcherConfig::default())
  }

  pub fn with_config(config: WatcherConfig) -> Result<Self> {
    let fd = sys::inotify_init().map_err(|err| {
      tracing::warn!(%err, "watcher: inotify_init1 failed");
      WatchError::Init(err)
    })?;

    let len = config
      .buffer_records
      .saturating_mul(RECORD_HEADER + NAME_ALLOWANCE)
      .max(MIN_BUFFER);
    tracing::debug!(?fd, buffer_len = len, strategy = ?config.wait_strategy, "watcher: init");

    Ok(Self {
      fd,
      buffer: vec![0u8; len].into_boxed_slice(),
      table: WatchTable::new(),
      config,
    })
  }

  pub fn config(&self) -> &WatcherConfig {
    &self.config
  }

  /// Closes the notification queue, dropping every watch with it.
  ///
  /// Dropping a `Watcher` does the same but cannot report a failing close.
  pub fn close(self) -> Result<()> {
    let Watcher { fd, table, .. } = self;
    tracing::debug!(?fd, watches = table.len(), "watcher: close");
    sys::close(fd).map_err(|err| {
      tracing::warn!(%err, "watcher: close failed");
      WatchError::Close(err)
    })
  }

  /// Starts watching `dir` for the changes in `mask`.
  ///
  /// Adding a directory that is already watched returns its existing entry
  /// and replaces its mask.
  pub fn add(&mut self, dir: impl AsRef<Path>, mask: EventMask) -> Result<WatchEntry> {
    let dir = dir.as_ref();
    if mask.is_empty() {
      return Err(WatchError::EmptyMask);
    }

    let wd = sys::add_watch(self.fd.as_fd(), dir, mask.to_inotify()).map_err(|source| {
      tracing::warn!(path = %dir.display(), err = %source, "watcher: add failed");
      WatchError::Add {
        path: dir.to_path_buf(),
        source,
      }
    })?;
    // The kernel never hands out a negative descriptor on success.
    let Some(entry) = WatchEntry::from_descriptor(wd) else {
      unreachable!("inotify_add_watch succeeded with descriptor {wd}");
    };

    self.table.insert(entry, dir, mask);
    tracing::debug!(?entry, path = %dir.display(), ?mask, "watcher: add");
    Ok(entry)
  }

  /// Stops the watch behind `entry`. The entry is rejected from then on.
  pub fn remove(&mut self, entry: WatchEntry) -> Result<()> {
    if !self.table.contains(entry) {
      return Err(WatchError::UnknownEntry(entry));
    }
    let removed = self.table.remove(entry);

    sys::rm_watch(self.fd.as_fd(), entry.descriptor()).map_err(|source| {
      tracing::warn!(?entry, err = %source, "watcher: remove failed");
      WatchError::Remove { entry, source }
    })?;
    tracing::debug!(?entry, path = ?removed.map(|info| info.path), "watcher: remove");
    Ok(())
  }

  /// Entries currently watched, in no particular order.
  pub fn entries(&self) -> impl Iterator<Item = WatchEntry> + '_ {
    self.table.entries()
  }

  /// Directory `entry` was added for.
  pub fn path(&self, entry: WatchEntry) -> Option<&Path> {
    self.table.get(entry).map(|info| info.path.as_path())
  }

  /// Mask `entry` currently subscribes to.
  pub fn mask(&self, entry: WatchEntry) -> Option<EventMask> {
    self.table.get(entry).map(|info| info.mask)
  }

  fn check(&self, entry: WatchEntry) -> Result<()> {
    if self.table.contains(entry) {
      Ok(())
    } else {
      Err(WatchError::UnknownEntry(entry))
    }
  }

  /// Blocks the calling thread until change records are queued or
  /// `timeout_ms` elapses. Negative waits forever, `0` only checks.
  pub fn wait(&self, entry: WatchEntry, timeout_ms: i64) -> Result<WaitStatus> {
    self.check(entry)?;
    let ready = sys::poll_readable(self.fd.as_fd(), poll_timeout(timeout_ms)).map_err(|err| {
      tracing::warn!(?entry, %err, "watcher: poll failed");
      WatchError::Wait(err)
    })?;
    let status = if ready { WaitStatus::Ready } else { WaitStatus::TimedOut };
    tracing::trace!(?entry, timeout_ms, ?status, "watcher: wait");
    Ok(status)
  }

  /// Like [`wait`](Self::wait), from inside a coroutine.
  ///
  /// With [`WaitStrategy::Blocking`] (the default) this is exactly `wait` and
  /// blocks the whole scheduler thread. With [`WaitStrategy::Cooperative`] the
  /// coroutine checks readiness without blocking and sleeps between checks,
  /// so other coroutines keep running.
  pub async fn wait_in(&self, co: &Coroutine, entry: WatchEntry, timeout_ms: i64) -> Result<WaitStatus> {
    if self.config.wait_strategy == WaitStrategy::Blocking || timeout_ms == 0 {
      return self.wait(entry, timeout_ms);
    }
    self.check(entry)?;

    let deadline = u64::try_from(timeout_ms)
      .ok()
      .and_then(|ms| Instant::now().checked_add(Duration::from_millis(ms)));
    let interval = self.config.poll_interval_duration();

    loop {
      if self.wait(entry, 0)? == WaitStatus::Ready {
        tracing::trace!(coroutine = ?co.id(), ?entry, "watcher: wait_in ready");
        return Ok(WaitStatus::Ready);
      }
      let nap = match deadline {
        None => interval,
        Some(deadline) => {
          let left = deadline.saturating_duration_since(Instant::now());
          if left.is_zero() {
            tracing::trace!(coroutine = ?co.id(), ?entry, "watcher: wait_in timed out");
            return Ok(WaitStatus::TimedOut);
          }
          left.min(interval)
        }
      };
      co.sleep(nap).await;
    }
  }

  /// Reads the queued change records in one go and decodes up to `max` of
  /// them into `out`, returning how many were appended.
  ///
  /// Records beyond `max` that were already read are dropped, not kept for
  /// the next call. An empty queue yields `0`. The returned events borrow the
  /// watcher's buffer, so they have to be released before the next call.
  pub fn events<'a>(&'a mut self, entry: WatchEntry, out: &mut Vec<Event<'a>>, max: usize) -> Result<usize> {
    self.check(entry)?;
    if max == 0 {
      return Ok(0);
    }

    let n = sys::read(self.fd.as_fd(), &mut self.buffer).map_err(|err| {
      tracing::warn!(?entry, %err, "watcher: read failed");
      WatchError::Read(err)
    })?;
    let produced = decode_records(&self.buffer[..n], out, max);
    tracing::trace!(?entry, bytes = n, produced, "watcher: events");
    Ok(produced)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn timeout_mapping() {
    assert_eq!(poll_timeout(-1), -1);
    assert_eq!(poll_timeout(i64::MIN), -1);
    assert_eq!(poll_timeout(0), 0);
    assert_eq!(poll_timeout(250), 250);
    assert_eq!(poll_timeout(i64::MAX), i32::MAX);
  }

  #[test]
  fn buffer_holds_at_least_one_long_name() {
    let watcher = Watcher::with_config(WatcherConfig::new().buffer_records(0)).unwrap();
    assert_eq!(watcher.buffer.len(), MIN_BUFFER);

    let watcher = Watcher::with_config(WatcherConfig::new().buffer_records(64)).unwrap();
    assert_eq!(watcher.buffer.len(), MIN_BUFFER.max(64 * 32));
  }

  #[test]
  fn unknown_entry_is_rejected() {
    let mut watcher = Watcher::new().unwrap();
    let bogus = WatchEntry::from_descriptor(9999).unwrap();
    assert!(matches!(watcher.remove(bogus), Err(WatchError::UnknownEntry(e)) if e == bogus));
    assert!(matches!(watcher.wait(bogus, 0), Err(WatchError::UnknownEntry(_))));
    let mut out = Vec::new();
    assert!(matches!(watcher.events(bogus, &mut out, 4), Err(WatchError::UnknownEntry(_))));
  }
}
