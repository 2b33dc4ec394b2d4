//! Directory change watching for the fibre_co coroutine runtime.
//!
//! A [`Watcher`] owns one kernel change-notification queue (inotify). Directories
//! are subscribed with [`Watcher::add`], which hands back a [`WatchEntry`]. The
//! caller then drives a poll loop: [`Watcher::wait`] (or, inside a coroutine,
//! [`Watcher::wait_in`]) until the queue is readable, and
//! [`Watcher::events`] to drain and decode pending change records.
//!
//! ```no_run
//! use fibre_fwatcher::{EventMask, WaitStatus, Watcher};
//!
//! let mut watcher = Watcher::new()?;
//! let entry = watcher.add("/tmp", EventMask::CREATE | EventMask::DELETE)?;
//! if watcher.wait(entry, 1000)? == WaitStatus::Ready {
//!   let mut events = Vec::new();
//!   watcher.events(entry, &mut events, 64)?;
//!   for event in &events {
//!     println!("{:?} {}", event.kind, event.path.display());
//!   }
//! }
//! # Ok::<(), fibre_fwatcher::WatchError>(())
//! ```

#![cfg(target_os = "linux")]

pub mod config;
pub mod entry;
pub mod error;
pub mod event;

mod sys;
mod table;
mod watcher;

pub use config::{WaitStrategy, WatcherConfig};
pub use entry::{EventMask, WatchEntry};
pub use error::{Result, WatchError};
pub use event::{Event, EventKind, OwnedEvent};
pub use watcher::{WaitStatus, Watcher};
