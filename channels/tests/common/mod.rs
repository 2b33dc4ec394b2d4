#![allow(dead_code)]

use fibre_co::Scheduler;

use std::cell::RefCell;
use std::rc::Rc;

pub const ITEMS_LOW: usize = 50;
pub const ITEMS_MEDIUM: usize = 200;
pub const ITEMS_HIGH: usize = 1000;

/// Shared append-only log that coroutines write into.
pub type Log<T> = Rc<RefCell<Vec<T>>>;

pub fn log<T>() -> Log<T> {
  Rc::new(RefCell::new(Vec::new()))
}

/// Runs the scheduler and asserts that no coroutine was left parked.
pub fn run_to_completion(sched: &Scheduler) {
  let stalled = sched.run();
  assert_eq!(stalled, 0, "{} coroutine(s) left parked", stalled);
}
