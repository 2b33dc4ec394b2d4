//! Thin wrappers over the inotify and poll syscalls.

use std::ffi::CString;
use std::io;
use std::os::fd::{AsRawFd, BorrowedFd, FromRawFd, IntoRawFd, OwnedFd};
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

/// Opens a non-blocking, close-on-exec inotify instance.
pub(crate) fn inotify_init() -> io::Result<OwnedFd> {
  let fd = unsafe { libc::inotify_init1(libc::IN_NONBLOCK | libc::IN_CLOEXEC) };
  if fd < 0 {
    return Err(io::Error::last_os_error());
  }
  // SAFETY: `fd` was just returned by the kernel and is owned by nobody else.
  Ok(unsafe { OwnedFd::from_raw_fd(fd) })
}

/// Closes `fd`, reporting the `close(2)` result the way `OwnedFd`'s drop does not.
pub(crate) fn close(fd: OwnedFd) -> io::Result<()> {
  let raw = fd.into_raw_fd();
  if unsafe { libc::close(raw) } < 0 {
    return Err(io::Error::last_os_error());
  }
  Ok(())
}

pub(crate) fn add_watch(fd: BorrowedFd<'_>, path: &Path, mask: u32) -> io::Result<i32> {
  let c_path = CString::new(path.as_os_str().as_bytes())
    .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "path contains a NUL byte"))?;
  let wd = unsafe { libc::inotify_add_watch(fd.as_raw_fd(), c_path.as_ptr(), mask) };
  if wd < 0 {
    return Err(io::Error::last_os_error());
  }
  Ok(wd)
}

pub(crate) fn rm_watch(fd: BorrowedFd<'_>, wd: i32) -> io::Result<()> {
  if unsafe { libc::inotify_rm_watch(fd.as_raw_fd(), wd) } < 0 {
    return Err(io::Error::last_os_error());
  }
  Ok(())
}

/// Reads whatever records are queued into `buf`. An empty queue reads as `0`.
pub(crate) fn read(fd: BorrowedFd<'_>, buf: &mut [u8]) -> io::Result<usize> {
  loop {
    let n = unsafe { libc::read(fd.as_raw_fd(), buf.as_mut_ptr().cast(), buf.len()) };
    if n >= 0 {
      return Ok(n as usize);
    }
    let err = io::Error::last_os_error();
    match err.raw_os_error() {
      Some(libc::EINTR) => continue,
      Some(libc::EAGAIN) => return Ok(0),
      _ => return Err(err),
    }
  }
}

/// Waits until `fd` is readable. `timeout_ms < 0` waits forever, `0` only
/// checks. Returns whether the fd became readable.
pub(crate) fn poll_readable(fd: BorrowedFd<'_>, timeout_ms: i32) -> io::Result<bool> {
  let mut pfd = libc::pollfd {
    fd: fd.as_raw_fd(),
    events: libc::POLLIN,
    revents: 0,
  };
  loop {
    let n = unsafe { libc::poll(&mut pfd, 1, timeout_ms) };
    if n >= 0 {
      return Ok(n > 0 && pfd.revents & libc::POLLIN != 0);
    }
    let err = io::Error::last_os_error();
    if err.raw_os_error() != Some(libc::EINTR) {
      return Err(err);
    }
  }
}
