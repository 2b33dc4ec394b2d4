use std::time::Duration;

#[cfg(not(feature = "small"))]
const DEFAULT_BUFFER_RECORDS: usize = 8192;
#[cfg(feature = "small")]
const DEFAULT_BUFFER_RECORDS: usize = 4096;

const DEFAULT_POLL_INTERVAL_MS: u64 = 10;

/// How [`Watcher::wait_in`](crate::Watcher::wait_in) waits for readiness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum WaitStrategy {
  /// Block the whole thread in `poll(2)`, like [`Watcher::wait`](crate::Watcher::wait).
  #[default]
  Blocking,

  /// Check readiness without blocking and let other coroutines run between
  /// checks. The coroutine sleeps `poll_interval_ms` between checks.
  Cooperative,
}

/// Tuning for a [`Watcher`](crate::Watcher).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct WatcherConfig {
  /// Size of the scratch read buffer, in raw records with a short name.
  pub buffer_records: usize,
  pub wait_strategy: WaitStrategy,
  pub poll_interval_ms: u64,
}

impl Default for WatcherConfig {
  fn default() -> Self {
    Self {
      buffer_records: DEFAULT_BUFFER_RECORDS,
      wait_strategy: WaitStrategy::default(),
      poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
    }
  }
}

impl WatcherConfig {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn buffer_records(mut self, records: usize) -> Self {
    self.buffer_records = records;
    self
  }

  pub fn wait_strategy(mut self, strategy: WaitStrategy) -> Self {
    self.wait_strategy = strategy;
    self
  }

  pub fn poll_interval(mut self, interval: Duration) -> Self {
    self.poll_interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
    self
  }

  pub(crate) fn poll_interval_duration(&self) -> Duration {
    Duration::from_millis(self.poll_interval_ms.max(1))
  }
}
