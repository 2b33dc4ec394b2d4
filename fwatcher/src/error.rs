use crate::entry::WatchEntry;

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// The error type for watcher operations.
#[derive(Debug, Error)]
pub enum WatchError {
  #[error("Failed to create the change-notification queue: {0}")]
  Init(#[source] io::Error),

  #[error("Failed to close the change-notification queue: {0}")]
  Close(#[source] io::Error),

  #[error("An empty event mask subscribes to nothing")]
  EmptyMask,

  #[error("Failed to watch '{}': {source}", .path.display())]
  Add {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("Failed to remove watch {entry:?}: {source}")]
  Remove {
    entry: WatchEntry,
    #[source]
    source: io::Error,
  },

  #[error("Watch {0:?} is not registered with this watcher")]
  UnknownEntry(WatchEntry),

  #[error("Waiting for change notifications failed: {0}")]
  Wait(#[source] io::Error),

  #[error("Reading change notifications failed: {0}")]
  Read(#[source] io::Error),
}

/// A specialized `Result` type for watcher operations.
pub type Result<T, E = WatchError> = std::result::Result<T, E>;
