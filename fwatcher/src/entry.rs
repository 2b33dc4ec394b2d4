//! Watch handles and the portable event mask.

use bitflags::bitflags;
use std::fmt;

bitflags! {
  /// Which kinds of change a watch subscribes to.
  #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
  #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
  pub struct EventMask: u32 {
    /// A file in the directory was written to.
    const MODIFY = 0b001;
    /// A file or directory was created in the directory.
    const CREATE = 0b010;
    /// A file or directory was deleted from the directory.
    const DELETE = 0b100;
  }
}

impl EventMask {
  /// The equivalent inotify mask.
  pub(crate) fn to_inotify(self) -> u32 {
    let mut mask = 0;
    if self.contains(EventMask::MODIFY) {
      mask |= libc::IN_MODIFY;
    }
    if self.contains(EventMask::CREATE) {
      mask |= libc::IN_CREATE;
    }
    if self.contains(EventMask::DELETE) {
      mask |= libc::IN_DELETE;
    }
    mask
  }
}

/// Handle to one directory subscription of a [`Watcher`](crate::Watcher).
///
/// The handle is only a lookup key: the watcher owns the kernel subscription.
/// A handle stays `Copy`-able after [`Watcher::remove`](crate::Watcher::remove),
/// but the watcher rejects it from then on.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatchEntry {
  wd: i32,
}

impl fmt::Debug for WatchEntry {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "WatchEntry({})", self.wd)
  }
}

impl WatchEntry {
  /// Wraps a raw watch descriptor. Negative descriptors (the kernel's failure
  /// value is `-1`) have no handle; `0` is a valid one.
  pub fn from_descriptor(wd: i32) -> Option<Self> {
    (wd >= 0).then_some(Self { wd })
  }

  /// The raw watch descriptor.
  #[inline]
  pub fn descriptor(&self) -> i32 {
    self.wd
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn invalid_descriptor_has_no_handle() {
    assert_eq!(WatchEntry::from_descriptor(-1), None);
    assert_eq!(WatchEntry::from_descriptor(i32::MIN), None);
  }

  #[test]
  fn descriptor_zero_is_a_valid_handle() {
    let entry = WatchEntry::from_descriptor(0).unwrap();
    assert_eq!(entry.descriptor(), 0);
    assert_eq!(WatchEntry::from_descriptor(41).map(|e| e.descriptor()), Some(41));
  }

  #[test]
  fn mask_translation() {
    assert_eq!(EventMask::empty().to_inotify(), 0);
    assert_eq!(EventMask::MODIFY.to_inotify(), libc::IN_MODIFY);
    assert_eq!(
      (EventMask::CREATE | EventMask::DELETE).to_inotify(),
      libc::IN_CREATE | libc::IN_DELETE
    );
    assert_eq!(
      EventMask::all().to_inotify(),
      libc::IN_MODIFY | libc::IN_CREATE | libc::IN_DELETE
    );
  }
}
