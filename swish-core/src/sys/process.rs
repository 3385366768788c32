//! Process creation, descriptor plumbing, and child reaping.

use std::ffi::CString;
use std::os::fd::{FromRawFd, OwnedFd, RawFd};

use nix::errno::Errno;
use nix::sys::wait::{WaitPidFlag, WaitStatus};

use crate::error;

pub(crate) use nix::unistd::ForkResult;
pub(crate) use nix::unistd::Pid;

/// Forks the current process.
pub(crate) fn fork() -> Result<ForkResult, error::Error> {
    // SAFETY: the shell runs single-threaded, so no other thread can hold a
    // lock or be mid-allocation across the fork.
    let result = unsafe { nix::unistd::fork() }?;
    Ok(result)
}

/// Creates a pipe, returning its (read, write) ends.
pub(crate) fn pipe() -> Result<(OwnedFd, OwnedFd), error::Error> {
    Ok(nix::unistd::pipe()?)
}

/// Duplicates `from` onto descriptor number `to`, closing whatever `to`
/// previously referred to. Ownership of `from` is unaffected.
pub(crate) fn dup2(from: RawFd, to: RawFd) -> Result<(), error::Error> {
    if from == to {
        return Ok(());
    }
    // SAFETY: plain descriptor duplication; both numbers stay owned by their
    // existing handles.
    let rc = unsafe { nix::libc::dup2(from, to) };
    if rc < 0 {
        return Err(Errno::last().into());
    }
    Ok(())
}

/// Duplicates a descriptor to a fresh number, returning an owned handle.
pub(crate) fn dup_fd(fd: RawFd) -> Result<OwnedFd, error::Error> {
    // SAFETY: F_DUPFD returns a brand-new descriptor that we alone own.
    let new_fd = unsafe { nix::libc::fcntl(fd, nix::libc::F_DUPFD, 0) };
    if new_fd < 0 {
        return Err(Errno::last().into());
    }
    // SAFETY: just created above; not shared with anything else.
    Ok(unsafe { OwnedFd::from_raw_fd(new_fd) })
}

/// Duplicates a descriptor to a number of at least 10, with close-on-exec
/// set, for saving across a redirection.
pub(crate) fn save_fd(fd: RawFd) -> Result<OwnedFd, error::Error> {
    // SAFETY: F_DUPFD_CLOEXEC returns a brand-new descriptor that we alone
    // own.
    let new_fd = unsafe { nix::libc::fcntl(fd, nix::libc::F_DUPFD_CLOEXEC, 10) };
    if new_fd < 0 {
        return Err(Errno::last().into());
    }
    // SAFETY: just created above; not shared with anything else.
    Ok(unsafe { OwnedFd::from_raw_fd(new_fd) })
}

/// Closes a raw descriptor number, ignoring errors.
pub(crate) fn close_fd(fd: RawFd) {
    // SAFETY: used only on descriptor numbers the caller is deliberately
    // vacating.
    unsafe {
        nix::libc::close(fd);
    }
}

/// Replaces the current process image. On success this never returns; the
/// returned value is always an error.
pub(crate) fn execve(
    path: &CString,
    argv: &[CString],
    envp: &[CString],
) -> nix::errno::Errno {
    match nix::unistd::execve(path, argv, envp) {
        Ok(infallible) => match infallible {},
        Err(errno) => errno,
    }
}

/// Decodes a wait status into a shell exit status.
pub(crate) fn exit_status_of(status: WaitStatus) -> Option<u8> {
    match status {
        WaitStatus::Exited(_, code) => Some((code & 0xFF) as u8),
        WaitStatus::Signaled(_, signal, _) => Some(128u8.wrapping_add(signal as i32 as u8)),
        _ => None,
    }
}

/// Waits for the given child to terminate, retrying on signal interruption.
pub(crate) fn wait_for_pid(pid: Pid) -> Result<u8, error::Error> {
    loop {
        match nix::sys::wait::waitpid(pid, None) {
            Ok(status) => {
                if let Some(code) = exit_status_of(status) {
                    return Ok(code);
                }
            }
            Err(Errno::EINTR) => continue,
            Err(Errno::ECHILD) => return Ok(0),
            Err(errno) => return Err(errno.into()),
        }
    }
}

/// Polls the given child without blocking. Returns its exit status if it has
/// terminated.
pub(crate) fn try_reap_pid(pid: Pid) -> Result<Option<u8>, error::Error> {
    match nix::sys::wait::waitpid(pid, Some(WaitPidFlag::WNOHANG)) {
        Ok(WaitStatus::StillAlive) => Ok(None),
        Ok(status) => Ok(exit_status_of(status)),
        Err(Errno::ECHILD) => Ok(Some(0)),
        Err(errno) => Err(errno.into()),
    }
}
