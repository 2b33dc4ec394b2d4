//! Typed channels for a single-threaded cooperative coroutine runtime.
//!
//! The crate provides a small [`Scheduler`](runtime::Scheduler) whose
//! coroutines suspend only at explicit points, a counting
//! [`Semaphore`](coord::Semaphore) for those coroutines, and a
//! [`Channel`](channel::Channel) that is either buffered (fixed ring) or a
//! synchronous rendezvous. Every blocking operation takes the calling
//! coroutine's [`Coroutine`](runtime::Coroutine) context explicitly; there is
//! no ambient "current coroutine".

pub mod channel;
pub mod coord;
pub mod error;
pub mod runtime;

// Internal utilities - not part of public API but exposed for crate use
mod internal;

pub use channel::Channel;
pub use error::{RecvError, SendError, TryRecvError, TrySendError, WaitError};
pub use runtime::{Coroutine, CoroutineId, Scheduler, Wakeup};
