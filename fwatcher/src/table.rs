//! Bookkeeping for the directories a watcher subscribes to.

use crate::entry::{EventMask, WatchEntry};

use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct WatchInfo {
  pub(crate) path: PathBuf,
  pub(crate) mask: EventMask,
}

/// Maps live watch handles to the directory and mask they were added with.
///
/// The kernel hands back the same descriptor when a directory is added twice;
/// the table then keeps the latest mask, matching the kernel's replace
/// semantics.
#[derive(Debug, Default)]
pub(crate) struct WatchTable {
  entries: HashMap<WatchEntry, WatchInfo>,
}

impl WatchTable {
  pub(crate) fn new() -> Self {
    Self::default()
  }

  pub(crate) fn len(&self) -> usize {
    self.entries.len()
  }

  pub(crate) fn contains(&self, entry: WatchEntry) -> bool {
    self.entries.contains_key(&entry)
  }

  pub(crate) fn get(&self, entry: WatchEntry) -> Option<&WatchInfo> {
    self.entries.get(&entry)
  }

  pub(crate) fn insert(&mut self, entry: WatchEntry, path: &Path, mask: EventMask) {
    self.entries.insert(
      entry,
      WatchInfo {
        path: path.to_path_buf(),
        mask,
      },
    );
  }

  pub(crate) fn remove(&mut self, entry: WatchEntry) -> Option<WatchInfo> {
    self.entries.remove(&entry)
  }

  pub(crate) fn entries(&self) -> impl Iterator<Item = WatchEntry> + '_ {
    self.entries.keys().copied()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn entry(wd: i32) -> WatchEntry {
    WatchEntry::from_descriptor(wd).unwrap()
  }

  #[test]
  fn insert_get_remove() {
    let mut table = WatchTable::new();
    table.insert(entry(1), Path::new("/tmp/a"), EventMask::CREATE);
    assert!(table.contains(entry(1)));
    assert!(!table.contains(entry(2)));
    assert_eq!(table.get(entry(1)).map(|i| i.path.as_path()), Some(Path::new("/tmp/a")));

    let info = table.remove(entry(1)).unwrap();
    assert_eq!(info.mask, EventMask::CREATE);
    assert_eq!(table.len(), 0);
    assert!(table.remove(entry(1)).is_none());
  }

  #[test]
  fn re_adding_replaces_the_mask() {
    let mut table = WatchTable::new();
    table.insert(entry(0), Path::new("/tmp/a"), EventMask::CREATE);
    table.insert(entry(0), Path::new("/tmp/a"), EventMask::MODIFY | EventMask::DELETE);
    assert_eq!(table.len(), 1);
    assert_eq!(table.get(entry(0)).unwrap().mask, EventMask::MODIFY | EventMask::DELETE);
  }
}
