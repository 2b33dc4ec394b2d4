//! Buffered mode: a fixed ring guarded by two counting semaphores.
//!
//! `space` counts free slots and `data` counts filled ones. A sender takes a
//! `space` unit before writing and posts a `data` unit after; a receiver does
//! the mirror image. At any point where no coroutine is between those two
//! steps, `space.value() + data.value() == capacity`.

use crate::coord::Semaphore;
use crate::error::{RecvError, SendError, TryRecvError, TrySendError};
use crate::internal::ring_buffer::RingBuffer;
use crate::runtime::Coroutine;

use std::cell::RefCell;
use std::fmt;

pub(crate) struct Buffered<T> {
  ring: RefCell<RingBuffer<T>>,
  space: Semaphore,
  data: Semaphore,
}

impl<T> fmt::Debug for Buffered<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Buffered")
      .field("ring", &*self.ring.borrow())
      .field("space", &self.space)
      .field("data", &self.data)
      .finish()
  }
}

impl<T> Buffered<T> {
  pub(crate) fn new(capacity: usize) -> Self {
    Self {
      ring: RefCell::new(RingBuffer::with_capacity(capacity)),
      space: Semaphore::new(capacity),
      data: Semaphore::new(0),
    }
  }

  pub(crate) fn capacity(&self) -> usize {
    self.ring.borrow().capacity()
  }

  pub(crate) fn len(&self) -> usize {
    self.ring.borrow().len()
  }

  pub(crate) fn free_slots(&self) -> usize {
    self.space.value()
  }

  pub(crate) fn filled_slots(&self) -> usize {
    self.data.value()
  }

  pub(crate) fn parked_senders(&self) -> usize {
    self.space.waiters()
  }

  pub(crate) fn parked_receivers(&self) -> usize {
    self.data.waiters()
  }

  /// No coroutine is parked on either semaphore.
  pub(crate) fn is_idle(&self) -> bool {
    self.space.waiters() == 0 && self.data.waiters() == 0
  }

  // Caller holds a `space` unit, so there is a free slot.
  fn put(&self, co: &Coroutine, value: T) {
    let put = self.ring.borrow_mut().put(value);
    if put.is_err() {
      unreachable!("free-slot unit held but the ring is full");
    }
    tracing::trace!(coroutine = ?co.id(), "send: put data");
    self.data.post(co, 1);
  }

  // Caller holds a `data` unit, so there is a filled slot.
  fn take(&self, co: &Coroutine) -> T {
    let value = self.ring.borrow_mut().pop();
    let Some(value) = value else {
      unreachable!("filled-slot unit held but the ring is empty");
    };
    tracing::trace!(coroutine = ?co.id(), "recv: get data");
    self.space.post(co, 1);
    value
  }

  pub(crate) async fn send(&self, co: &Coroutine, value: T) -> Result<(), SendError<T>> {
    if self.space.value() == 0 {
      tracing::trace!(coroutine = ?co.id(), parked = self.space.waiters(), "send: wait ..");
    }
    // Only a closed semaphore fails an untimed wait; the channel never closes
    // its own, so this is the abandon path for a failed environment.
    if let Err(err) = self.space.wait(co, None).await {
      tracing::trace!(coroutine = ?co.id(), %err, "send: wait failed");
      return Err(SendError::Wait(value));
    }
    self.put(co, value);
    tracing::trace!(coroutine = ?co.id(), "send: ok");
    Ok(())
  }

  pub(crate) async fn recv(&self, co: &Coroutine) -> Result<T, RecvError> {
    if self.data.value() == 0 {
      tracing::trace!(coroutine = ?co.id(), parked = self.data.waiters(), "recv: wait ..");
    }
    // See `send`: reached only when the semaphore was closed underneath us.
    if let Err(err) = self.data.wait(co, None).await {
      tracing::trace!(coroutine = ?co.id(), %err, "recv: wait failed");
      return Err(err.into());
    }
    let value = self.take(co);
    tracing::trace!(coroutine = ?co.id(), "recv: ok");
    Ok(value)
  }

  pub(crate) fn try_send(&self, co: &Coroutine, value: T) -> Result<(), TrySendError<T>> {
    if !self.space.try_acquire() {
      return Err(TrySendError::Full(value));
    }
    self.put(co, value);
    Ok(())
  }

  pub(crate) fn try_recv(&self, co: &Coroutine) -> Result<T, TryRecvError> {
    if !self.data.try_acquire() {
      return Err(TryRecvError::Empty);
    }
    Ok(self.take(co))
  }
}
