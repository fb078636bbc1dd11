//! Liveness watch over the observed process.
//!
//! We must notice the emulator exiting without reaping or signalling it
//! (it is not our child). A pidfd gives exactly that: the fd becomes
//! readable when the process terminates, so a zero-timeout poll is a cheap
//! non-blocking "has it exited?" probe. On kernels without `pidfd_open`
//! the watcher falls back to checking that the stats region still exists
//! under `/dev/shm`.

#![allow(unsafe_code)] // pidfd_open has no libc wrapper yet

use std::os::fd::{AsFd, FromRawFd, OwnedFd, RawFd};

use log::debug;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};

use crate::shm::region_path;

/// Non-blocking exit detector for one observed pid.
pub struct ProcessWatcher {
    pid: i32,
    pidfd: Option<OwnedFd>,
}

impl ProcessWatcher {
    #[must_use]
    pub fn new(pid: i32) -> Self {
        let pidfd = pidfd_open(pid);
        if pidfd.is_none() {
            debug!("pidfd_open unavailable for pid {pid}, falling back to region probe");
        }
        Self { pid, pidfd }
    }

    /// Polls for target exit without blocking.
    #[must_use]
    pub fn has_exited(&self) -> bool {
        match &self.pidfd {
            Some(fd) => {
                let mut fds = [PollFd::new(fd.as_fd(), PollFlags::POLLIN)];
                match poll(&mut fds, PollTimeout::ZERO) {
                    // The pidfd becomes readable exactly once: on exit.
                    Ok(n) => n > 0,
                    Err(_) => true,
                }
            }
            None => !region_path(self.pid).exists(),
        }
    }
}

fn pidfd_open(pid: i32) -> Option<OwnedFd> {
    // SAFETY: pidfd_open takes a pid and a flags word and returns a new fd
    // or -1; no pointers are involved.
    let ret = unsafe { libc::syscall(libc::SYS_pidfd_open, pid as libc::pid_t, 0u32) };
    if ret < 0 {
        return None;
    }

    #[allow(clippy::cast_possible_truncation)] // fds fit in c_int
    let raw = ret as RawFd;
    // SAFETY: the syscall just returned this fd and nothing else owns it.
    Some(unsafe { OwnedFd::from_raw_fd(raw) })
}
