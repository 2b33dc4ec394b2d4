use super::{spawn_in, Core, CoroutineId, Wakeup};

use std::cell::RefCell;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::Weak;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

/// Execution context handed to every coroutine.
///
/// This is the only way to reach the scheduler from inside a coroutine: it
/// answers "who am I" ([`id`](Self::id)), parks the caller
/// ([`suspend`](Self::suspend)) and wakes others ([`resume`](Self::resume)).
/// It holds a weak reference, so a context outliving its scheduler simply
/// stops resuming anything.
#[derive(Clone)]
pub struct Coroutine {
  core: Weak<RefCell<Core>>,
  id: CoroutineId,
}

impl fmt::Debug for Coroutine {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Coroutine").field("id", &self.id).finish()
  }
}

impl Coroutine {
  pub(crate) fn new(core: Weak<RefCell<Core>>, id: CoroutineId) -> Self {
    Self { core, id }
  }

  /// The id of the coroutine this context belongs to.
  #[inline]
  pub fn id(&self) -> CoroutineId {
    self.id
  }

  /// Makes a parked coroutine runnable again.
  ///
  /// Returns `false` if `id` is not parked (already runnable, running, or
  /// finished).
  pub fn resume(&self, id: CoroutineId) -> bool {
    match self.core.upgrade() {
      Some(core) => core.borrow_mut().resume(id, Wakeup::Resumed),
      None => false,
    }
  }

  /// Parks the calling coroutine until another one resumes it.
  pub fn suspend(&self) -> Suspend<'_> {
    self.suspend_timeout(None)
  }

  /// Parks the calling coroutine until it is resumed or `timeout` elapses.
  /// `None` waits forever.
  pub fn suspend_timeout(&self, timeout: Option<Duration>) -> Suspend<'_> {
    Suspend {
      co: self,
      timeout,
      parked: false,
      done: false,
    }
  }

  /// Lets every other runnable coroutine run once before continuing.
  pub fn yield_now(&self) -> YieldNow<'_> {
    YieldNow {
      co: self,
      yielded: false,
    }
  }

  /// Parks the calling coroutine for at least `duration`.
  ///
  /// Resumes that arrive before the deadline are ignored.
  pub async fn sleep(&self, duration: Duration) {
    let Some(deadline) = Instant::now().checked_add(duration) else {
      self.suspend().await;
      return;
    };
    loop {
      let now = Instant::now();
      if now >= deadline {
        return;
      }
      if self.suspend_timeout(Some(deadline - now)).await == Wakeup::TimedOut {
        return;
      }
    }
  }

  /// Spawns a sibling coroutine on the same scheduler.
  ///
  /// Returns `None` if the scheduler is gone.
  pub fn spawn<F, Fut>(&self, f: F) -> Option<CoroutineId>
  where
    F: FnOnce(Coroutine) -> Fut,
    Fut: Future<Output = ()> + 'static,
  {
    self.core.upgrade().map(|core| spawn_in(&core, f))
  }
}

/// Future returned by [`Coroutine::suspend`] and [`Coroutine::suspend_timeout`].
#[must_use = "a coroutine only parks when the suspension is awaited"]
pub struct Suspend<'a> {
  co: &'a Coroutine,
  timeout: Option<Duration>,
  parked: bool,
  done: bool,
}

impl fmt::Debug for Suspend<'_> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Suspend")
      .field("id", &self.co.id)
      .field("parked", &self.parked)
      .finish()
  }
}

impl Future for Suspend<'_> {
  type Output = Wakeup;

  fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Wakeup> {
    let this = self.get_mut();
    let Some(core) = this.co.core.upgrade() else {
      return Poll::Pending;
    };
    let mut core = core.borrow_mut();

    if !this.parked {
      core.park(this.co.id, this.timeout);
      this.parked = true;
      return Poll::Pending;
    }

    match core.take_wakeup(this.co.id) {
      Some(wakeup) => {
        this.done = true;
        Poll::Ready(wakeup)
      }
      None => Poll::Pending,
    }
  }
}

impl Drop for Suspend<'_> {
  fn drop(&mut self) {
    if self.parked && !self.done {
      if let Some(core) = self.co.core.upgrade() {
        if let Ok(mut core) = core.try_borrow_mut() {
          core.unpark(self.co.id);
        }
      }
    }
  }
}

/// Future returned by [`Coroutine::yield_now`].
#[must_use = "a coroutine only yields when the future is awaited"]
pub struct YieldNow<'a> {
  co: &'a Coroutine,
  yielded: bool,
}

impl fmt::Debug for YieldNow<'_> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("YieldNow")
      .field("id", &self.co.id)
      .field("yielded", &self.yielded)
      .finish()
  }
}

impl Future for YieldNow<'_> {
  type Output = ();

  fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<()> {
    let this = self.get_mut();
    if this.yielded {
      if let Some(core) = this.co.core.upgrade() {
        core.borrow_mut().take_wakeup(this.co.id);
      }
      return Poll::Ready(());
    }
    this.yielded = true;
    if let Some(core) = this.co.core.upgrade() {
      let mut core = core.borrow_mut();
      core.park(this.co.id, None);
      core.resume(this.co.id, Wakeup::Resumed);
    }
    Poll::Pending
  }
}
