//! A counting semaphore for coroutines on the cooperative scheduler.
//!
//! Units are handed directly to the oldest waiter on `post`, so a coroutine
//! that arrives later can never take a unit a parked waiter was promised
//! ("permit stealing"). With no preemption there is no lock: the state sits in
//! a `RefCell` that is never borrowed across a suspension point.

use crate::error::WaitError;
use crate::runtime::{Coroutine, CoroutineId, Wakeup};

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;
use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Grant {
  Pending,
  Granted,
  Closed,
}

#[derive(Debug)]
struct Waiter {
  id: CoroutineId,
  grant: Rc<Cell<Grant>>,
}

#[derive(Debug)]
struct SemaphoreState {
  count: usize,
  closed: bool,
  waiters: VecDeque<Waiter>,
}

/// Counting semaphore whose waiters are parked coroutines.
pub struct Semaphore {
  state: RefCell<SemaphoreState>,
}

impl fmt::Debug for Semaphore {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let state = self.state.borrow();
    f.debug_struct("Semaphore")
      .field("count", &state.count)
      .field("closed", &state.closed)
      .field("waiters", &state.waiters.len())
      .finish()
  }
}

impl Semaphore {
  /// Creates a semaphore holding `initial` units.
  pub fn new(initial: usize) -> Self {
    Self {
      state: RefCell::new(SemaphoreState {
        count: initial,
        closed: false,
        waiters: VecDeque::new(),
      }),
    }
  }

  /// Units currently available.
  pub fn value(&self) -> usize {
    self.state.borrow().count
  }

  /// Number of coroutines parked in [`wait`](Self::wait).
  pub fn waiters(&self) -> usize {
    self.state.borrow().waiters.len()
  }

  pub fn is_closed(&self) -> bool {
    self.state.borrow().closed
  }

  /// Takes one unit if that can be done without parking.
  pub fn try_acquire(&self) -> bool {
    let mut state = self.state.borrow_mut();
    if !state.closed && state.count > 0 {
      state.count -= 1;
      true
    } else {
      false
    }
  }

  /// Adds `n` units. Each unit goes to the oldest parked waiter first, the
  /// rest increase the count.
  pub fn post(&self, co: &Coroutine, n: usize) {
    let mut woken = Vec::new();
    {
      let mut state = self.state.borrow_mut();
      let granted = n.min(state.waiters.len());
      for waiter in state.waiters.drain(..granted) {
        waiter.grant.set(Grant::Granted);
        woken.push(waiter.id);
      }
      state.count = state.count.saturating_add(n - granted);
    }
    for id in woken {
      co.resume(id);
    }
  }

  /// Takes one unit, parking the caller while none is available.
  ///
  /// `timeout` of `None` waits forever. Returns the number of units left after
  /// this one was taken.
  pub async fn wait(&self, co: &Coroutine, timeout: Option<Duration>) -> Result<usize, WaitError> {
    let grant = {
      let mut state = self.state.borrow_mut();
      if state.closed {
        return Err(WaitError::Closed);
      }
      if state.count > 0 {
        state.count -= 1;
        return Ok(state.count);
      }
      if timeout == Some(Duration::ZERO) {
        return Err(WaitError::TimedOut);
      }
      let grant = Rc::new(Cell::new(Grant::Pending));
      state.waiters.push_back(Waiter {
        id: co.id(),
        grant: grant.clone(),
      });
      grant
    };

    let mut guard = WaitGuard {
      semaphore: self,
      co,
      grant,
      consumed: false,
    };
    let deadline = timeout.and_then(|t| Instant::now().checked_add(t));

    loop {
      let remaining = deadline.map(|d| d.saturating_duration_since(Instant::now()));
      let wakeup = co.suspend_timeout(remaining).await;

      match guard.grant.get() {
        Grant::Granted => {
          guard.consumed = true;
          return Ok(self.value());
        }
        Grant::Closed => {
          guard.consumed = true;
          return Err(WaitError::Closed);
        }
        Grant::Pending => {
          let expired = deadline.is_some_and(|d| Instant::now() >= d);
          if wakeup == Wakeup::TimedOut || expired {
            // Dropping the guard takes us off the waiter queue.
            return Err(WaitError::TimedOut);
          }
          // Resumed by someone else; still queued, park again.
        }
      }
    }
  }

  /// Fails every current and future wait with [`WaitError::Closed`].
  pub fn close(&self, co: &Coroutine) {
    let woken: Vec<CoroutineId> = {
      let mut state = self.state.borrow_mut();
      state.closed = true;
      state
        .waiters
        .drain(..)
        .map(|waiter| {
          waiter.grant.set(Grant::Closed);
          waiter.id
        })
        .collect()
    };
    for id in woken {
      co.resume(id);
    }
  }
}

// Keeps the waiter queue consistent if a wait is abandoned: a timed-out (or
// dropped) waiter leaves the queue, and a unit granted to a waiter that never
// picked it up is passed on.
struct WaitGuard<'a> {
  semaphore: &'a Semaphore,
  co: &'a Coroutine,
  grant: Rc<Cell<Grant>>,
  consumed: bool,
}

impl Drop for WaitGuard<'_> {
  fn drop(&mut self) {
    if self.consumed {
      return;
    }
    match self.grant.get() {
      Grant::Pending => {
        let id = self.co.id();
        if let Ok(mut state) = self.semaphore.state.try_borrow_mut() {
          state.waiters.retain(|w| w.id != id);
        }
      }
      Grant::Granted => self.semaphore.post(self.co, 1),
      Grant::Closed => {}
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::runtime::Scheduler;

  #[test]
  fn wait_takes_available_units() {
    let sched = Scheduler::new();
    let sem = Rc::new(Semaphore::new(2));
    let s = sem.clone();
    sched.spawn(move |co| async move {
      assert_eq!(s.wait(&co, None).await, Ok(1));
      assert_eq!(s.wait(&co, None).await, Ok(0));
      assert_eq!(s.wait(&co, Some(Duration::ZERO)).await, Err(WaitError::TimedOut));
    });
    assert_eq!(sched.run(), 0);
    assert_eq!(sem.value(), 0);
  }

  #[test]
  fn post_wakes_waiters_in_fifo_order() {
    let sched = Scheduler::new();
    let sem = Rc::new(Semaphore::new(0));
    let order = Rc::new(RefCell::new(Vec::new()));

    for i in 0..3 {
      let (s, o) = (sem.clone(), order.clone());
      sched.spawn(move |co| async move {
        s.wait(&co, None).await.unwrap();
        o.borrow_mut().push(i);
      });
    }
    let s = sem.clone();
    sched.spawn(move |co| async move {
      assert_eq!(s.waiters(), 3);
      s.post(&co, 3);
    });

    assert_eq!(sched.run(), 0);
    assert_eq!(*order.borrow(), vec![0, 1, 2]);
    assert_eq!(sem.value(), 0);
  }

  #[test]
  fn granted_unit_is_not_stolen_by_late_arrival() {
    let sched = Scheduler::new();
    let sem = Rc::new(Semaphore::new(0));
    let got = Rc::new(RefCell::new(Vec::new()));

    let (s, g) = (sem.clone(), got.clone());
    sched.spawn(move |co| async move {
      s.wait(&co, None).await.unwrap();
      g.borrow_mut().push("parked");
    });
    let s = sem.clone();
    sched.spawn(move |co| async move {
      s.post(&co, 1);
    });
    let (s, g) = (sem.clone(), got.clone());
    sched.spawn(move |_co| async move {
      // Runs before the parked waiter gets its turn.
      if s.try_acquire() {
        g.borrow_mut().push("late");
      }
    });

    assert_eq!(sched.run(), 0);
    assert_eq!(*got.borrow(), vec!["parked"]);
  }

  #[test]
  fn wait_times_out_and_leaves_queue() {
    let sched = Scheduler::new();
    let sem = Rc::new(Semaphore::new(0));
    let s = sem.clone();
    sched.spawn(move |co| async move {
      let res = s.wait(&co, Some(Duration::from_millis(10))).await;
      assert_eq!(res, Err(WaitError::TimedOut));
      assert_eq!(s.waiters(), 0);
    });
    assert_eq!(sched.run(), 0);
    assert_eq!(sem.value(), 0);
  }

  #[test]
  fn huge_post_wakes_waiters_and_saturates_count() {
    let sched = Scheduler::new();
    let sem = Rc::new(Semaphore::new(0));
    let woken = Rc::new(RefCell::new(Vec::new()));

    for i in 0..2 {
      let (s, w) = (sem.clone(), woken.clone());
      sched.spawn(move |co| async move {
        s.wait(&co, None).await.unwrap();
        w.borrow_mut().push(i);
      });
    }
    let s = sem.clone();
    sched.spawn(move |co| async move {
      s.post(&co, usize::MAX);
      s.post(&co, 5);
    });

    assert_eq!(sched.run(), 0);
    assert_eq!(*woken.borrow(), vec![0, 1]);
    assert_eq!(sem.value(), usize::MAX);
    assert_eq!(sem.waiters(), 0);
  }

  #[test]
  fn close_fails_waiters() {
    let sched = Scheduler::new();
    let sem = Rc::new(Semaphore::new(0));
    let results = Rc::new(RefCell::new(Vec::new()));

    for _ in 0..2 {
      let (s, r) = (sem.clone(), results.clone());
      sched.spawn(move |co| async move {
        let value = s.wait(&co, None).await;
        r.borrow_mut().push(value);
      });
    }
    let s = sem.clone();
    sched.spawn(move |co| async move {
      s.close(&co);
    });

    assert_eq!(sched.run(), 0);
    assert_eq!(*results.borrow(), vec![Err(WaitError::Closed), Err(WaitError::Closed)]);
    assert!(sem.is_closed());
  }
}
