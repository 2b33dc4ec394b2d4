//! Structured change events and the decoder for raw inotify records.
//!
//! A raw record is a fixed header (`wd`, `mask`, `cookie`, `len`) followed by
//! `len` bytes of NUL-padded file name, relative to the watched directory.

use crate::entry::WatchEntry;

use std::ffi::OsStr;
use std::mem;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

/// Size of the fixed part of one raw record.
pub(crate) const RECORD_HEADER: usize = mem::size_of::<libc::inotify_event>();

/// What happened to the file named by an [`Event`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EventKind {
  Create,
  Delete,
  Modify,
}

impl EventKind {
  /// Picks the kind a raw mask maps to. Create wins over Delete, which wins
  /// over Modify; masks with none of the three bits produce no event.
  fn from_inotify(mask: u32) -> Option<Self> {
    if mask & libc::IN_CREATE != 0 {
      Some(EventKind::Create)
    } else if mask & libc::IN_DELETE != 0 {
      Some(EventKind::Delete)
    } else if mask & libc::IN_MODIFY != 0 {
      Some(EventKind::Modify)
    } else {
      None
    }
  }
}

/// One decoded change.
///
/// `path` borrows the watcher's scratch buffer and is only valid until the
/// next call to [`Watcher::events`](crate::Watcher::events). Use
/// [`to_owned_event`](Self::to_owned_event) to keep it longer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Event<'a> {
  /// The subscription the record was queued for.
  pub entry: WatchEntry,
  pub kind: EventKind,
  /// Name relative to the watched directory.
  pub path: &'a Path,
}

impl Event<'_> {
  pub fn to_owned_event(&self) -> OwnedEvent {
    OwnedEvent {
      entry: self.entry,
      kind: self.kind,
      path: self.path.to_path_buf(),
    }
  }
}

/// An [`Event`] that owns its path.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct OwnedEvent {
  pub entry: WatchEntry,
  pub kind: EventKind,
  pub path: PathBuf,
}

#[inline]
fn read_u32(bytes: &[u8], at: usize) -> u32 {
  let mut raw = [0u8; 4];
  raw.copy_from_slice(&bytes[at..at + 4]);
  u32::from_ne_bytes(raw)
}

/// Decodes raw records from `buf` in the order they appear, appending at most
/// `max` events to `out`. Returns how many were appended.
///
/// Decoding stops as soon as `max` events have been produced; whatever is left
/// in `buf` is not looked at. A truncated trailing record is ignored.
pub fn decode_records<'a>(buf: &'a [u8], out: &mut Vec<Event<'a>>, max: usize) -> usize {
  let mut offset = 0;
  let mut produced = 0;

  while produced < max {
    let Some(header) = buf.get(offset..offset + RECORD_HEADER) else {
      break;
    };
    let wd = read_u32(header, 0) as i32;
    let mask = read_u32(header, 4);
    let name_len = read_u32(header, 12) as usize;

    let name_start = offset + RECORD_HEADER;
    let Some(name) = buf.get(name_start..name_start + name_len) else {
      break;
    };
    offset = name_start + name_len;

    let kind = EventKind::from_inotify(mask);
    let entry = WatchEntry::from_descriptor(wd);
    if let (Some(kind), Some(entry)) = (kind, entry) {
      let end = name.iter().position(|&b| b == 0).unwrap_or(name.len());
      out.push(Event {
        entry,
        kind,
        path: Path::new(OsStr::from_bytes(&name[..end])),
      });
      produced += 1;
    }
  }

  produced
}

#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;

  /// Encodes one record the way the kernel does, name NUL-padded to 16 bytes.
  fn record(wd: i32, mask: u32, name: &str) -> Vec<u8> {
    let padded = if name.is_empty() { 0 } else { (name.len() + 1).div_ceil(16) * 16 };
    let mut buf = Vec::with_capacity(RECORD_HEADER + padded);
    buf.extend_from_slice(&wd.to_ne_bytes());
    buf.extend_from_slice(&mask.to_ne_bytes());
    buf.extend_from_slice(&0u32.to_ne_bytes());
    buf.extend_from_slice(&(padded as u32).to_ne_bytes());
    buf.extend_from_slice(name.as_bytes());
    buf.resize(RECORD_HEADER + padded, 0);
    buf
  }

  fn kinds_and_paths(events: &[Event<'_>]) -> Vec<(EventKind, String)> {
    events
      .iter()
      .map(|e| (e.kind, e.path.to_string_lossy().into_owned()))
      .collect()
  }

  #[test]
  fn header_size_matches_kernel_struct() {
    assert_eq!(RECORD_HEADER, 16);
  }

  #[test]
  fn decodes_in_kernel_order() {
    let mut buf = record(1, libc::IN_CREATE, "a.txt");
    buf.extend(record(1, libc::IN_MODIFY, "b.txt"));

    let mut out = Vec::new();
    assert_eq!(decode_records(&buf, &mut out, 2), 2);
    assert_eq!(
      kinds_and_paths(&out),
      vec![
        (EventKind::Create, "a.txt".to_string()),
        (EventKind::Modify, "b.txt".to_string()),
      ]
    );
    assert_eq!(out[0].entry, WatchEntry::from_descriptor(1).unwrap());
  }

  #[test]
  fn stops_at_max_count() {
    let mut buf = record(1, libc::IN_CREATE, "a.txt");
    buf.extend(record(1, libc::IN_MODIFY, "b.txt"));

    let mut out = Vec::new();
    assert_eq!(decode_records(&buf, &mut out, 1), 1);
    assert_eq!(kinds_and_paths(&out), vec![(EventKind::Create, "a.txt".to_string())]);
  }

  #[test]
  fn skips_records_without_a_known_kind() {
    let mut buf = record(3, libc::IN_ATTRIB, "ignored");
    buf.extend(record(3, libc::IN_IGNORED, ""));
    buf.extend(record(3, libc::IN_DELETE | libc::IN_ISDIR, "sub"));

    let mut out = Vec::new();
    assert_eq!(decode_records(&buf, &mut out, 8), 1);
    assert_eq!(kinds_and_paths(&out), vec![(EventKind::Delete, "sub".to_string())]);
  }

  #[test]
  fn create_wins_over_modify() {
    let buf = record(0, libc::IN_CREATE | libc::IN_MODIFY, "both");
    let mut out = Vec::new();
    decode_records(&buf, &mut out, 1);
    assert_eq!(out[0].kind, EventKind::Create);
    assert_eq!(out[0].entry.descriptor(), 0);
  }

  #[test]
  fn truncated_record_is_ignored() {
    let mut buf = record(1, libc::IN_CREATE, "whole");
    let partial = record(1, libc::IN_CREATE, "cut-off-name");
    buf.extend_from_slice(&partial[..RECORD_HEADER + 4]);

    let mut out = Vec::new();
    assert_eq!(decode_records(&buf, &mut out, 8), 1);
    assert_eq!(out[0].path, Path::new("whole"));
  }

  #[test]
  fn owned_event_outlives_buffer() {
    let owned = {
      let buf = record(2, libc::IN_MODIFY, "kept.log");
      let mut out = Vec::new();
      decode_records(&buf, &mut out, 1);
      out[0].to_owned_event()
    };
    assert_eq!(owned.path, PathBuf::from("kept.log"));
    assert_eq!(owned.kind, EventKind::Modify);
  }
}
