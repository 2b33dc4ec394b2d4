// src/error.rs

use core::fmt;

/// Why a semaphore wait gave up without acquiring a unit.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum WaitError {
  /// The timeout elapsed before a unit became available.
  TimedOut,
  /// The semaphore was closed while (or before) waiting.
  Closed,
}
impl std::error::Error for WaitError {}
impl fmt::Display for WaitError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      WaitError::TimedOut => write!(f, "semaphore wait timed out"),
      WaitError::Closed => write!(f, "semaphore closed"),
    }
  }
}

macro_rules! impl_error_for_enum_with_inner {
    (
        $enum_name:ident < $generic_param:ident >,
        $($variant:ident ( $message:expr ) ),+
        $(,)?
    ) => {
        impl<$generic_param> $enum_name<$generic_param> {
            /// Consumes the error, returning the value that was not delivered.
            #[inline]
            pub fn into_inner(self) -> $generic_param {
                match self {
                    $( $enum_name::$variant(v) => v, )+
                }
            }
        }

        impl<$generic_param> fmt::Display for $enum_name<$generic_param> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                match self {
                    $( $enum_name::$variant(_) => f.write_str($message), )+
                }
            }
        }

        impl<$generic_param: fmt::Debug> std::error::Error for $enum_name<$generic_param> {}
    };
}

/// Error returned by `try_send` when the value could not be handed over
/// without suspending. The value is returned.
#[derive(PartialEq, Eq, Clone)]
pub enum TrySendError<T> {
  /// Buffered: every slot is taken. Unbuffered: no receiver is parked.
  Full(T),
}

impl<T> fmt::Debug for TrySendError<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      TrySendError::Full(_) => write!(f, "TrySendError::Full(..)"),
    }
  }
}

impl_error_for_enum_with_inner!(
  TrySendError<T>,
  Full("channel full"),
);

/// Error returned by `send` when the blocking wait on the channel failed.
///
/// The operation was abandoned and the value is handed back untouched.
#[derive(PartialEq, Eq, Clone)]
pub enum SendError<T> {
  /// The wait for a free slot failed.
  Wait(T),
}

impl<T> fmt::Debug for SendError<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      SendError::Wait(_) => write!(f, "SendError::Wait(..)"),
    }
  }
}

impl_error_for_enum_with_inner!(
  SendError<T>,
  Wait("channel send aborted: wait for free slot failed"),
);

/// Error returned by `try_recv` when no value could be taken without suspending.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum TryRecvError {
  Empty,
}
impl std::error::Error for TryRecvError {}
impl fmt::Display for TryRecvError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      TryRecvError::Empty => write!(f, "channel empty"),
    }
  }
}

/// Error returned by `recv` when the blocking wait on the channel failed.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum RecvError {
  /// The wait for a filled slot failed; no value was produced.
  Wait(WaitError),
}
impl std::error::Error for RecvError {}
impl fmt::Display for RecvError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      RecvError::Wait(e) => write!(f, "channel recv aborted: {}", e),
    }
  }
}

impl From<WaitError> for RecvError {
  fn from(e: WaitError) -> Self {
    RecvError::Wait(e)
  }
}
