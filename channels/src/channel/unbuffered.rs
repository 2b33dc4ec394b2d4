//! Unbuffered mode: synchronous rendezvous between a sender and a receiver.
//!
//! A sender always parks with its value stored in a handoff cell keyed by its
//! own coroutine id. If a receiver was already parked, the sender resumes it
//! first so it comes back and collects. A receiver pops the oldest parked
//! sender, takes the value out of that sender's cell and resumes it; `send`
//! therefore returns only once a receiver owns the value.
//!
//! The non-suspending `try_send` cannot park, so it drops its value straight
//! into the oldest parked receiver's cell instead. A receiver checks its own
//! cell before looking at the sender queue.

use crate::error::{RecvError, SendError, TryRecvError, TrySendError};
use crate::internal::wait_queue::WaitQueue;
use crate::runtime::{Coroutine, CoroutineId};

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;

struct RendezvousState<T> {
  senders: WaitQueue,
  receivers: WaitQueue,
  // Values of parked senders, not yet taken.
  outgoing: HashMap<CoroutineId, T>,
  // Values pushed into parked receivers by `try_send`, not yet picked up.
  incoming: HashMap<CoroutineId, T>,
}

pub(crate) struct Rendezvous<T> {
  state: RefCell<RendezvousState<T>>,
}

impl<T> fmt::Debug for Rendezvous<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let state = self.state.borrow();
    f.debug_struct("Rendezvous")
      .field("senders", &state.senders)
      .field("receivers", &state.receivers)
      .finish_non_exhaustive()
  }
}

impl<T> Rendezvous<T> {
  pub(crate) fn new() -> Self {
    Self {
      state: RefCell::new(RendezvousState {
        senders: WaitQueue::new(),
        receivers: WaitQueue::new(),
        outgoing: HashMap::new(),
        incoming: HashMap::new(),
      }),
    }
  }

  pub(crate) fn parked_senders(&self) -> usize {
    self.state.borrow().senders.len()
  }

  pub(crate) fn parked_receivers(&self) -> usize {
    self.state.borrow().receivers.len()
  }

  /// No coroutine is parked on either side.
  pub(crate) fn is_idle(&self) -> bool {
    let state = self.state.borrow();
    state.senders.is_empty() && state.receivers.is_empty()
  }

  pub(crate) async fn send(&self, co: &Coroutine, value: T) -> Result<(), SendError<T>> {
    let me = co.id();
    let receiver = {
      let mut state = self.state.borrow_mut();
      let receiver = state.receivers.pop_front();
      state.senders.push_back(me);
      state.outgoing.insert(me, value);
      receiver
    };

    if let Some(receiver) = receiver {
      tracing::trace!(coroutine = ?me, ?receiver, "send: resume waiting receiver");
      co.resume(receiver);
    }

    let _parked = ParkedSender { rendezvous: self, id: me };
    loop {
      tracing::trace!(coroutine = ?me, "send: wait ..");
      co.suspend().await;
      if !self.state.borrow().outgoing.contains_key(&me) {
        tracing::trace!(coroutine = ?me, "send: ok");
        return Ok(());
      }
      // Woken without our value being taken; still queued.
    }
  }

  pub(crate) async fn recv(&self, co: &Coroutine) -> Result<T, RecvError> {
    let me = co.id();
    let _parked = ParkedReceiver { rendezvous: self, id: me };
    loop {
      let taken = {
        let mut state = self.state.borrow_mut();
        if let Some(value) = state.incoming.remove(&me) {
          tracing::trace!(coroutine = ?me, "recv: ok (handed in)");
          return Ok(value);
        }
        match state.senders.pop_front() {
          Some(sender) => Some((sender, state.outgoing.remove(&sender))),
          None => {
            if !state.receivers.contains(me) {
              state.receivers.push_back(me);
            }
            None
          }
        }
      };

      match taken {
        Some((sender, value)) => {
          tracing::trace!(coroutine = ?me, ?sender, "recv: resume waiting sender");
          co.resume(sender);
          if let Some(value) = value {
            tracing::trace!(coroutine = ?me, "recv: ok");
            return Ok(value);
          }
        }
        None => {
          tracing::trace!(coroutine = ?me, "recv: wait ..");
          co.suspend().await;
        }
      }
    }
  }

  pub(crate) fn try_send(&self, co: &Coroutine, value: T) -> Result<(), TrySendError<T>> {
    let receiver = {
      let mut state = self.state.borrow_mut();
      match state.receivers.pop_front() {
        Some(receiver) => {
          state.incoming.insert(receiver, value);
          receiver
        }
        None => return Err(TrySendError::Full(value)),
      }
    };
    tracing::trace!(coroutine = ?co.id(), ?receiver, "send: handed to waiting receiver");
    co.resume(receiver);
    Ok(())
  }

  pub(crate) fn try_recv(&self, co: &Coroutine) -> Result<T, TryRecvError> {
    let (sender, value) = {
      let mut state = self.state.borrow_mut();
      let Some(sender) = state.senders.pop_front() else {
        return Err(TryRecvError::Empty);
      };
      (sender, state.outgoing.remove(&sender))
    };
    co.resume(sender);
    value.ok_or(TryRecvError::Empty)
  }
}

// Takes an abandoned sender (its future dropped while parked) off the queue
// together with its undelivered value.
struct ParkedSender<'a, T> {
  rendezvous: &'a Rendezvous<T>,
  id: CoroutineId,
}

impl<T> Drop for ParkedSender<'_, T> {
  fn drop(&mut self) {
    if let Ok(mut state) = self.rendezvous.state.try_borrow_mut() {
      if state.outgoing.remove(&self.id).is_some() {
        state.senders.remove(self.id);
      }
    }
  }
}

struct ParkedReceiver<'a, T> {
  rendezvous: &'a Rendezvous<T>,
  id: CoroutineId,
}

impl<T> Drop for ParkedReceiver<'_, T> {
  fn drop(&mut self) {
    if let Ok(mut state) = self.rendezvous.state.try_borrow_mut() {
      state.receivers.remove(self.id);
      state.incoming.remove(&self.id);
    }
  }
}
