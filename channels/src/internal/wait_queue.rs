use crate::runtime::CoroutineId;

use std::collections::VecDeque;
use std::fmt;

/// Ordered list of parked coroutines.
///
/// The queue only records *which* coroutines wait and in what order; it does
/// not own them. Ids are matched strictly first-in first-out.
#[derive(Default)]
pub(crate) struct WaitQueue {
  ids: VecDeque<CoroutineId>,
}

impl fmt::Debug for WaitQueue {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("WaitQueue").field("len", &self.ids.len()).finish()
  }
}

impl WaitQueue {
  pub(crate) fn new() -> Self {
    Self::default()
  }

  #[inline]
  pub(crate) fn len(&self) -> usize {
    self.ids.len()
  }

  #[inline]
  pub(crate) fn is_empty(&self) -> bool {
    self.ids.is_empty()
  }

  pub(crate) fn push_back(&mut self, id: CoroutineId) {
    debug_assert!(
      !self.contains(id),
      "attempted to enqueue a coroutine that is already waiting in this queue"
    );
    self.ids.push_back(id);
  }

  pub(crate) fn pop_front(&mut self) -> Option<CoroutineId> {
    self.ids.pop_front()
  }

  pub(crate) fn contains(&self, id: CoroutineId) -> bool {
    self.ids.contains(&id)
  }

  /// Removes `id` wherever it sits. Returns whether it was queued.
  pub(crate) fn remove(&mut self, id: CoroutineId) -> bool {
    match self.ids.iter().position(|&queued| queued == id) {
      Some(pos) => {
        self.ids.remove(pos);
        true
      }
      None => false,
    }
  }
}
