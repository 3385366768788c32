//! Signal handling: the process-wide pending-signal mask and disposition
//! management.
//!
//! Handlers installed here do nothing but record the signal in an atomic
//! mask; the evaluator drains the mask at statement boundaries. That keeps
//! arbitrary work out of signal context and defers delivery across critical
//! sections for free.

use std::sync::atomic::{AtomicU64, Ordering};

use nix::sys::signal::{SaFlags, SigAction, SigHandler, SigSet};

use crate::error;

pub(crate) use nix::sys::signal::Signal;

// One bit per signal number (1..=63).
static PENDING: AtomicU64 = AtomicU64::new(0);

extern "C" fn record_signal(signo: nix::libc::c_int) {
    if (1..64).contains(&signo) {
        PENDING.fetch_or(1 << signo, Ordering::SeqCst);
    }
}

/// Installs the recording handler for the given signal.
///
/// `SA_RESTART` is deliberately not set: blocking reads and waits must
/// return `EINTR` so the evaluator notices pending signals promptly.
pub(crate) fn catch(signal: Signal) -> Result<(), error::Error> {
    let action = SigAction::new(
        SigHandler::Handler(record_signal),
        SaFlags::empty(),
        SigSet::empty(),
    );
    // SAFETY: the handler only touches an atomic.
    unsafe { nix::sys::signal::sigaction(signal, &action) }?;
    Ok(())
}

/// Restores the default disposition for the given signal.
pub(crate) fn set_default(signal: Signal) -> Result<(), error::Error> {
    let action = SigAction::new(SigHandler::SigDfl, SaFlags::empty(), SigSet::empty());
    // SAFETY: installs the default disposition; no handler code involved.
    unsafe { nix::sys::signal::sigaction(signal, &action) }?;
    Ok(())
}

/// Ignores the given signal.
pub(crate) fn ignore(signal: Signal) -> Result<(), error::Error> {
    let action = SigAction::new(SigHandler::SigIgn, SaFlags::empty(), SigSet::empty());
    // SAFETY: installs the ignore disposition; no handler code involved.
    unsafe { nix::sys::signal::sigaction(signal, &action) }?;
    Ok(())
}

/// Atomically takes the set of pending signals, clearing it.
pub(crate) fn take_pending() -> u64 {
    PENDING.swap(0, Ordering::SeqCst)
}

/// Returns whether any signal is pending.
pub(crate) fn any_pending() -> bool {
    PENDING.load(Ordering::SeqCst) != 0
}

/// Returns whether a SIGINT is pending, without clearing it.
pub(crate) fn interrupt_pending() -> bool {
    PENDING.load(Ordering::SeqCst) & (1 << (Signal::SIGINT as i32)) != 0
}

/// Clears every pending signal (used after a fork).
pub(crate) fn clear_pending() {
    PENDING.store(0, Ordering::SeqCst);
}

/// Returns whether the given bit is set in a mask previously returned from
/// [`take_pending`].
pub(crate) fn mask_contains(mask: u64, signal: Signal) -> bool {
    mask & (1 << (signal as i32)) != 0
}

/// Sends a signal to a process.
pub(crate) fn kill_process(pid: super::process::Pid, signal: Signal) -> Result<(), error::Error> {
    nix::sys::signal::kill(pid, signal)?;
    Ok(())
}
