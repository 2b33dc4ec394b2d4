//! A typed channel between coroutines on the same cooperative scheduler.
//!
//! The mode is chosen once, by capacity:
//!
//! - **Buffered** (`capacity > 0`): values go through a fixed ring. `send`
//!   only parks while every slot is taken and `recv` only while none is.
//! - **Unbuffered** (`capacity == 0`): a synchronous rendezvous. There is no
//!   storage; `send` parks until a receiver has taken the value, and `recv`
//!   parks until a sender shows up. Parked senders and receivers are each
//!   matched in the order they started waiting.
//!
//! This is not a thread-safe channel. It is meant to be shared between
//! coroutines of one scheduler through an `Rc`, and relies on the fact that
//! nothing else runs between two suspension points.
//!
//! ```
//! use fibre_co::{Channel, Scheduler};
//! use std::rc::Rc;
//!
//! let sched = Scheduler::new();
//! let chan = Rc::new(Channel::new(0));
//!
//! let rx = chan.clone();
//! sched.spawn(move |co| async move {
//!   assert_eq!(rx.recv(&co).await.unwrap(), "ping");
//! });
//! let tx = chan.clone();
//! sched.spawn(move |co| async move {
//!   tx.send(&co, "ping").await.unwrap();
//! });
//!
//! assert_eq!(sched.run(), 0);
//! ```

mod buffered;
mod unbuffered;

use self::buffered::Buffered;
use self::unbuffered::Rendezvous;
use crate::error::{RecvError, SendError, TryRecvError, TrySendError};
use crate::runtime::Coroutine;

use std::fmt;

enum Mode<T> {
  Buffered(Buffered<T>),
  Unbuffered(Rendezvous<T>),
}

/// Channel carrying values of type `T` between coroutines.
pub struct Channel<T> {
  mode: Mode<T>,
}

impl<T> fmt::Debug for Channel<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match &self.mode {
      Mode::Buffered(b) => f.debug_struct("Channel").field("buffered", b).finish(),
      Mode::Unbuffered(r) => f.debug_struct("Channel").field("unbuffered", r).finish(),
    }
  }
}

impl<T> Channel<T> {
  /// Creates a channel. A `capacity` of `0` selects rendezvous mode, anything
  /// larger a ring with that many slots.
  pub fn new(capacity: usize) -> Self {
    let mode = if capacity > 0 {
      Mode::Buffered(Buffered::new(capacity))
    } else {
      Mode::Unbuffered(Rendezvous::new())
    };
    tracing::trace!(capacity, "channel: init");
    Self { mode }
  }

  /// Destroys the channel.
  ///
  /// No coroutine may still be parked in `send` or `recv`. This is checked in
  /// debug builds only; in release builds those coroutines simply never resume.
  pub fn exit(self) {
    debug_assert!(
      self.is_idle(),
      "channel destroyed with {} parked sender(s) and {} parked receiver(s)",
      self.parked_senders(),
      self.parked_receivers()
    );
    tracing::trace!("channel: exit");
  }

  /// Whether no coroutine is parked in `send` or `recv`.
  pub fn is_idle(&self) -> bool {
    match &self.mode {
      Mode::Buffered(b) => b.is_idle(),
      Mode::Unbuffered(r) => r.is_idle(),
    }
  }

  pub fn is_buffered(&self) -> bool {
    matches!(self.mode, Mode::Buffered(_))
  }

  /// Number of slots. `0` for a rendezvous channel.
  pub fn capacity(&self) -> usize {
    match &self.mode {
      Mode::Buffered(b) => b.capacity(),
      Mode::Unbuffered(_) => 0,
    }
  }

  /// Values currently buffered. For a rendezvous channel, the number of
  /// senders parked with a value nobody has taken yet.
  pub fn len(&self) -> usize {
    match &self.mode {
      Mode::Buffered(b) => b.len(),
      Mode::Unbuffered(r) => r.parked_senders(),
    }
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Buffered: every slot is taken, so a `send` right now would park.
  /// Rendezvous: no receiver is parked, so a `try_send` would fail. A
  /// rendezvous `send` always parks until its value is taken.
  pub fn is_full(&self) -> bool {
    match &self.mode {
      Mode::Buffered(b) => b.free_slots() == 0,
      Mode::Unbuffered(r) => r.parked_receivers() == 0,
    }
  }

  /// Free and filled slot counts as tracked by the channel's semaphores.
  /// `None` for a rendezvous channel.
  pub fn slots(&self) -> Option<(usize, usize)> {
    match &self.mode {
      Mode::Buffered(b) => Some((b.free_slots(), b.filled_slots())),
      Mode::Unbuffered(_) => None,
    }
  }

  /// Coroutines parked in `send`.
  pub fn parked_senders(&self) -> usize {
    match &self.mode {
      Mode::Buffered(b) => b.parked_senders(),
      Mode::Unbuffered(r) => r.parked_senders(),
    }
  }

  /// Coroutines parked in `recv`.
  pub fn parked_receivers(&self) -> usize {
    match &self.mode {
      Mode::Buffered(b) => b.parked_receivers(),
      Mode::Unbuffered(r) => r.parked_receivers(),
    }
  }

  /// Sends `value`, parking the calling coroutine while needed.
  ///
  /// # Errors
  ///
  /// `SendError::Wait(value)` if the wait for a free slot failed. The value is
  /// returned and nothing was enqueued.
  pub async fn send(&self, co: &Coroutine, value: T) -> Result<(), SendError<T>> {
    match &self.mode {
      Mode::Buffered(b) => b.send(co, value).await,
      Mode::Unbuffered(r) => r.send(co, value).await,
    }
  }

  /// Receives a value, parking the calling coroutine while none is available.
  ///
  /// # Errors
  ///
  /// `RecvError::Wait` if the wait for a filled slot failed.
  pub async fn recv(&self, co: &Coroutine) -> Result<T, RecvError> {
    match &self.mode {
      Mode::Buffered(b) => b.recv(co).await,
      Mode::Unbuffered(r) => r.recv(co).await,
    }
  }

  /// Sends without parking.
  ///
  /// A buffered channel needs a free slot; a rendezvous channel needs a
  /// receiver already parked in `recv`, which the value is handed to directly.
  pub fn try_send(&self, co: &Coroutine, value: T) -> Result<(), TrySendError<T>> {
    match &self.mode {
      Mode::Buffered(b) => b.try_send(co, value),
      Mode::Unbuffered(r) => r.try_send(co, value),
    }
  }

  /// Receives without parking.
  ///
  /// A rendezvous channel needs a sender already parked in `send`; that sender
  /// is resumed.
  pub fn try_recv(&self, co: &Coroutine) -> Result<T, TryRecvError> {
    match &self.mode {
      Mode::Buffered(b) => b.try_recv(co),
      Mode::Unbuffered(r) => r.try_recv(co),
    }
  }
}
