use std::fmt;

/// Fixed-capacity FIFO ring.
///
/// `head` and `tail` are free-running counters; the slot index is taken modulo
/// the capacity, so `head - tail` is always the number of stored values.
pub(crate) struct RingBuffer<T> {
  slots: Box<[Option<T>]>,
  head: usize, // next write
  tail: usize, // next read
}

impl<T> fmt::Debug for RingBuffer<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("RingBuffer")
      .field("capacity", &self.capacity())
      .field("len", &self.len())
      .finish()
  }
}

impl<T> RingBuffer<T> {
  pub(crate) fn with_capacity(capacity: usize) -> Self {
    assert!(capacity > 0, "ring buffer capacity must be greater than 0");
    let mut slots = Vec::with_capacity(capacity);
    slots.resize_with(capacity, || None);
    Self {
      slots: slots.into_boxed_slice(),
      head: 0,
      tail: 0,
    }
  }

  #[inline]
  pub(crate) fn capacity(&self) -> usize {
    self.slots.len()
  }

  #[inline]
  pub(crate) fn len(&self) -> usize {
    self.head.wrapping_sub(self.tail)
  }

  #[inline]
  pub(crate) fn is_empty(&self) -> bool {
    self.head == self.tail
  }

  #[inline]
  pub(crate) fn is_full(&self) -> bool {
    self.len() == self.capacity()
  }

  /// Appends `value`, handing it back if every slot is taken.
  pub(crate) fn put(&mut self, value: T) -> Result<(), T> {
    if self.is_full() {
      return Err(value);
    }
    let idx = self.head % self.capacity();
    self.slots[idx] = Some(value);
    self.head = self.head.wrapping_add(1);
    Ok(())
  }

  /// Removes the oldest value.
  pub(crate) fn pop(&mut self) -> Option<T> {
    if self.is_empty() {
      return None;
    }
    let idx = self.tail % self.capacity();
    let value = self.slots[idx].take();
    self.tail = self.tail.wrapping_add(1);
    value
  }
}
