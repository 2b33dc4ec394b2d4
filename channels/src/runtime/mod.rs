//! A single-threaded cooperative scheduler.
//!
//! Coroutines are `'static` futures that receive a [`Coroutine`] context when
//! spawned. Exactly one coroutine runs at a time and control only changes hands
//! at an explicit suspension point ([`Coroutine::suspend`],
//! [`Coroutine::yield_now`], [`Coroutine::sleep`]). A suspended coroutine stays
//! parked until some other coroutine calls [`Coroutine::resume`] with its id, or
//! until the timeout it suspended with expires.
//!
//! The scheduler does not use `Waker`s to drive coroutines: futures are polled
//! with a no-op waker and rescheduled only through the coroutine table. A
//! coroutine that awaits a foreign future (one that returns `Pending` without
//! parking through the context) is treated as having yielded and is polled
//! again on the next pass.

mod coroutine;

pub use coroutine::{Coroutine, Suspend, YieldNow};

use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, VecDeque};
use std::fmt;
use std::future::Future;
use std::mem;
use std::rc::Rc;
use std::task::{Context, Poll};
use std::thread;
use std::time::{Duration, Instant};

use futures_util::future::LocalBoxFuture;
use futures_util::task::noop_waker_ref;
use generational_arena::{Arena, Index};

/// Stable lookup key for a coroutine in the scheduler's table.
///
/// An id does not keep its coroutine alive. Once the coroutine finishes the id
/// goes stale and resuming it is a no-op.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CoroutineId(Index);

/// How a suspended coroutine came back.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Wakeup {
  /// Another coroutine resumed it.
  Resumed,
  /// Its suspension timeout expired first.
  TimedOut,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TaskState {
  Ready,
  Running,
  Parked,
}

struct Task {
  future: Option<LocalBoxFuture<'static, ()>>,
  state: TaskState,
  wakeup: Option<Wakeup>,
  // Bumped on every park so timers armed for an earlier park can be told apart.
  generation: u64,
}

#[derive(Debug)]
struct Timer {
  deadline: Instant,
  seq: u64,
  id: CoroutineId,
  generation: u64,
}

impl PartialEq for Timer {
  fn eq(&self, other: &Self) -> bool {
    self.deadline == other.deadline && self.seq == other.seq
  }
}
impl Eq for Timer {}
impl PartialOrd for Timer {
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
    Some(self.cmp(other))
  }
}
impl Ord for Timer {
  // Reversed so the max-heap pops the earliest deadline first.
  fn cmp(&self, other: &Self) -> Ordering {
    other
      .deadline
      .cmp(&self.deadline)
      .then_with(|| other.seq.cmp(&self.seq))
  }
}

pub(crate) struct Core {
  tasks: Arena<Task>,
  ready: VecDeque<CoroutineId>,
  timers: BinaryHeap<Timer>,
  timer_seq: u64,
}

impl Core {
  fn new() -> Self {
    Self {
      tasks: Arena::new(),
      ready: VecDeque::new(),
      timers: BinaryHeap::new(),
      timer_seq: 0,
    }
  }

  /// Marks `id` as parked, optionally arming a timeout.
  pub(crate) fn park(&mut self, id: CoroutineId, timeout: Option<Duration>) {
    let Some(task) = self.tasks.get_mut(id.0) else {
      return;
    };
    task.state = TaskState::Parked;
    task.wakeup = None;
    task.generation = task.generation.wrapping_add(1);
    let generation = task.generation;

    if let Some(deadline) = timeout.and_then(|t| Instant::now().checked_add(t)) {
      self.timer_seq = self.timer_seq.wrapping_add(1);
      self.timers.push(Timer {
        deadline,
        seq: self.timer_seq,
        id,
        generation,
      });
    }
  }

  /// Undoes a park that is being abandoned by the coroutine itself.
  pub(crate) fn unpark(&mut self, id: CoroutineId) {
    if let Some(task) = self.tasks.get_mut(id.0) {
      if task.state == TaskState::Parked {
        task.state = TaskState::Running;
        task.generation = task.generation.wrapping_add(1);
      }
    }
  }

  /// Moves a parked coroutine to the back of the ready queue.
  pub(crate) fn resume(&mut self, id: CoroutineId, wakeup: Wakeup) -> bool {
    match self.tasks.get_mut(id.0) {
      Some(task) if task.state == TaskState::Parked => {
        task.state = TaskState::Ready;
        task.wakeup = Some(wakeup);
        self.ready.push_back(id);
        true
      }
      _ => false,
    }
  }

  pub(crate) fn take_wakeup(&mut self, id: CoroutineId) -> Option<Wakeup> {
    self.tasks.get_mut(id.0).and_then(|task| task.wakeup.take())
  }

  fn is_stale(&self, timer: &Timer) -> bool {
    match self.tasks.get(timer.id.0) {
      Some(task) => task.state != TaskState::Parked || task.generation != timer.generation,
      None => true,
    }
  }

  fn fire_timers(&mut self, now: Instant) {
    while let Some(timer) = self.timers.peek() {
      if timer.deadline > now {
        break;
      }
      if let Some(timer) = self.timers.pop() {
        if !self.is_stale(&timer) {
          tracing::trace!(coroutine = ?timer.id, "timer: expired");
          self.resume(timer.id, Wakeup::TimedOut);
        }
      }
    }
  }

  fn next_deadline(&mut self) -> Option<Instant> {
    while let Some(timer) = self.timers.peek() {
      if !self.is_stale(timer) {
        return Some(timer.deadline);
      }
      self.timers.pop();
    }
    None
  }

  fn insert(&mut self) -> CoroutineId {
    CoroutineId(self.tasks.insert(Task {
      future: None,
      state: TaskState::Ready,
      wakeup: None,
      generation: 0,
    }))
  }
}

pub(crate) fn spawn_in<F, Fut>(core: &Rc<RefCell<Core>>, f: F) -> CoroutineId
where
  F: FnOnce(Coroutine) -> Fut,
  Fut: Future<Output = ()> + 'static,
{
  let id = core.borrow_mut().insert();
  let co = Coroutine::new(Rc::downgrade(core), id);
  let future: LocalBoxFuture<'static, ()> = Box::pin(f(co));

  let mut core = core.borrow_mut();
  if let Some(task) = core.tasks.get_mut(id.0) {
    task.future = Some(future);
  }
  core.ready.push_back(id);
  tracing::trace!(coroutine = ?id, "spawn");
  id
}

/// Owner of the coroutine table and the run loop.
///
/// Dropping the scheduler drops every coroutine that has not finished yet.
pub struct Scheduler {
  core: Rc<RefCell<Core>>,
}

impl fmt::Debug for Scheduler {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let core = self.core.borrow();
    f.debug_struct("Scheduler")
      .field("coroutines", &core.tasks.len())
      .field("ready", &core.ready.len())
      .field("timers", &core.timers.len())
      .finish()
  }
}

impl Default for Scheduler {
  fn default() -> Self {
    Self::new()
  }
}

impl Scheduler {
  pub fn new() -> Self {
    Self {
      core: Rc::new(RefCell::new(Core::new())),
    }
  }

  /// Creates a coroutine. It starts running on the next call to [`run`](Self::run).
  pub fn spawn<F, Fut>(&self, f: F) -> CoroutineId
  where
    F: FnOnce(Coroutine) -> Fut,
    Fut: Future<Output = ()> + 'static,
  {
    spawn_in(&self.core, f)
  }

  /// Number of coroutines that have not finished.
  pub fn len(&self) -> usize {
    self.core.borrow().tasks.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Runs coroutines until none is runnable.
  ///
  /// When every live coroutine is parked but some have a pending timeout, the
  /// thread sleeps until the earliest one expires. Returns the number of
  /// coroutines left parked with nothing able to resume them; `0` means every
  /// coroutine ran to completion.
  pub fn run(&self) -> usize {
    loop {
      let next = {
        let mut core = self.core.borrow_mut();
        core.fire_timers(Instant::now());
        core.ready.pop_front()
      };

      if let Some(id) = next {
        self.poll_one(id);
        continue;
      }

      let deadline = self.core.borrow_mut().next_deadline();
      match deadline {
        Some(deadline) => {
          let now = Instant::now();
          if deadline > now {
            thread::sleep(deadline - now);
          }
        }
        None => break,
      }
    }

    let stalled = self.len();
    if stalled > 0 {
      tracing::debug!(stalled, "scheduler: no runnable coroutines left");
    }
    stalled
  }

  fn poll_one(&self, id: CoroutineId) {
    let mut future = {
      let mut core = self.core.borrow_mut();
      let Some(task) = core.tasks.get_mut(id.0) else {
        return;
      };
      match task.future.take() {
        Some(future) => {
          task.state = TaskState::Running;
          future
        }
        None => return,
      }
    };

    let mut cx = Context::from_waker(noop_waker_ref());
    let poll = future.as_mut().poll(&mut cx);

    let mut core = self.core.borrow_mut();
    match poll {
      Poll::Ready(()) => {
        let finished = core.tasks.remove(id.0);
        drop(core);
        drop(finished);
        drop(future);
        tracing::trace!(coroutine = ?id, "finished");
      }
      Poll::Pending => {
        if let Some(task) = core.tasks.get_mut(id.0) {
          task.future = Some(future);
          if task.state == TaskState::Running {
            task.state = TaskState::Ready;
            core.ready.push_back(id);
          }
        }
      }
    }
  }
}

impl Drop for Scheduler {
  fn drop(&mut self) {
    // Coroutine futures may touch the core while being dropped, so release the
    // borrow before dropping them.
    let tasks = {
      let mut core = self.core.borrow_mut();
      core.ready.clear();
      core.timers.clear();
      mem::replace(&mut core.tasks, Arena::new())
    };
    drop(tasks);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::cell::Cell;

  #[test]
  fn runs_in_spawn_order() {
    let sched = Scheduler::new();
    let log = Rc::new(RefCell::new(Vec::new()));
    for i in 0..3 {
      let log = log.clone();
      sched.spawn(move |_co| async move {
        log.borrow_mut().push(i);
      });
    }
    assert_eq!(sched.run(), 0);
    assert_eq!(*log.borrow(), vec![0, 1, 2]);
  }

  #[test]
  fn yield_interleaves() {
    let sched = Scheduler::new();
    let log = Rc::new(RefCell::new(Vec::new()));
    for name in ["a", "b"] {
      let log = log.clone();
      sched.spawn(move |co| async move {
        log.borrow_mut().push(format!("{name}1"));
        co.yield_now().await;
        log.borrow_mut().push(format!("{name}2"));
      });
    }
    sched.run();
    assert_eq!(*log.borrow(), vec!["a1", "b1", "a2", "b2"]);
  }

  #[test]
  fn parked_without_resumer_is_reported_stalled() {
    let sched = Scheduler::new();
    sched.spawn(|co| async move {
      co.suspend().await;
    });
    assert_eq!(sched.run(), 1);
  }

  #[test]
  fn resume_delivers_wakeup() {
    let sched = Scheduler::new();
    let parked = Rc::new(Cell::new(None));
    let seen = Rc::new(Cell::new(None));

    let (p, s) = (parked.clone(), seen.clone());
    sched.spawn(move |co| async move {
      p.set(Some(co.id()));
      s.set(Some(co.suspend().await));
    });
    let p = parked.clone();
    sched.spawn(move |co| async move {
      let target = p.get().unwrap();
      assert!(co.resume(target));
      // Already queued, a second resume does nothing.
      assert!(!co.resume(target));
    });

    assert_eq!(sched.run(), 0);
    assert_eq!(seen.get(), Some(Wakeup::Resumed));
  }

  #[test]
  fn suspend_timeout_expires() {
    let sched = Scheduler::new();
    let seen = Rc::new(Cell::new(None));
    let s = seen.clone();
    sched.spawn(move |co| async move {
      s.set(Some(co.suspend_timeout(Some(Duration::from_millis(10))).await));
    });
    assert_eq!(sched.run(), 0);
    assert_eq!(seen.get(), Some(Wakeup::TimedOut));
  }

  #[test]
  fn stale_timer_does_not_delay_exit() {
    let sched = Scheduler::new();
    let parked = Rc::new(Cell::new(None));
    let p = parked.clone();
    sched.spawn(move |co| async move {
      p.set(Some(co.id()));
      let wakeup = co.suspend_timeout(Some(Duration::from_secs(30))).await;
      assert_eq!(wakeup, Wakeup::Resumed);
    });
    let p = parked.clone();
    sched.spawn(move |co| async move {
      co.resume(p.get().unwrap());
    });

    let started = Instant::now();
    assert_eq!(sched.run(), 0);
    assert!(started.elapsed() < Duration::from_secs(5));
  }

  #[test]
  fn resuming_finished_coroutine_is_noop() {
    let sched = Scheduler::new();
    let first = sched.spawn(|_co| async {});
    sched.run();
    sched.spawn(move |co| async move {
      assert!(!co.resume(first));
    });
    assert_eq!(sched.run(), 0);
  }

  #[test]
  fn spawn_from_inside_a_coroutine() {
    let sched = Scheduler::new();
    let hits = Rc::new(Cell::new(0));
    let h = hits.clone();
    sched.spawn(move |co| async move {
      let h2 = h.clone();
      co.spawn(move |_co| async move {
        h2.set(h2.get() + 1);
      });
      h.set(h.get() + 1);
    });
    assert_eq!(sched.run(), 0);
    assert_eq!(hits.get(), 2);
  }
}
