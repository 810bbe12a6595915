// SPDX-License-Identifier: MIT
#![allow(unsafe_code)]
//
// Signal handling — async-signal-safe flags, folded into the event stream.
//
// Signal handlers may do almost nothing safely: no allocation, no locks,
// no panicking. Ours store into process-global atomics and return; the
// event loop polls the flags each iteration and turns them into
// High-priority events. Worst-case latency from signal to event is one
// loop tick.
//
// Registration is additive: the previous `sigaction` for each signal is
// saved and, when it was a real handler function, called after our flag
// store. An embedding host's own SIGINT handling keeps working with the
// runtime loaded.
//
// Nothing in a handler can fail, so nothing can throw past the handler
// boundary — the error-handling contract for signal context is enforced
// by construction.

#[cfg(unix)]
use std::sync::Once;
use std::sync::atomic::{AtomicBool, Ordering};
#[cfg(unix)]
use std::sync::atomic::AtomicUsize;

use crate::event::SignalKind;

/// Signals the runtime tracks, in drain order.
///
/// WindowChange drains first so buffer reallocation is queued ahead of
/// anything reacting to a termination request.
const TRACKED: [SignalKind; 4] = [
    SignalKind::WindowChange,
    SignalKind::Interrupt,
    SignalKind::Terminate,
    SignalKind::Hangup,
];

/// One pending flag per tracked signal, indexed by [`slot`].
static PENDING: [AtomicBool; 4] = [
    AtomicBool::new(false),
    AtomicBool::new(false),
    AtomicBool::new(false),
    AtomicBool::new(false),
];

/// Previous `sa_sigaction` values for chaining, indexed by [`slot`].
/// `0` is `SIG_DFL`, `1` is `SIG_IGN`; anything larger is a function.
#[cfg(unix)]
static PREVIOUS: [AtomicUsize; 4] = [
    AtomicUsize::new(0),
    AtomicUsize::new(0),
    AtomicUsize::new(0),
    AtomicUsize::new(0),
];

/// Whether the previous action used `SA_SIGINFO` (three-argument form).
#[cfg(unix)]
static PREVIOUS_SIGINFO: [AtomicBool; 4] = [
    AtomicBool::new(false),
    AtomicBool::new(false),
    AtomicBool::new(false),
    AtomicBool::new(false),
];

const fn slot(kind: SignalKind) -> usize {
    match kind {
        SignalKind::WindowChange => 0,
        SignalKind::Interrupt => 1,
        SignalKind::Terminate => 2,
        SignalKind::Hangup => 3,
    }
}

#[cfg(unix)]
const fn signo(kind: SignalKind) -> libc::c_int {
    match kind {
        SignalKind::WindowChange => libc::SIGWINCH,
        SignalKind::Interrupt => libc::SIGINT,
        SignalKind::Terminate => libc::SIGTERM,
        SignalKind::Hangup => libc::SIGHUP,
    }
}

#[cfg(unix)]
const fn kind_of(sig: libc::c_int) -> Option<SignalKind> {
    match sig {
        libc::SIGWINCH => Some(SignalKind::WindowChange),
        libc::SIGINT => Some(SignalKind::Interrupt),
        libc::SIGTERM => Some(SignalKind::Terminate),
        libc::SIGHUP => Some(SignalKind::Hangup),
        _ => None,
    }
}

/// Hook run inside the handler for terminating signals (everything but
/// SIGWINCH), before chaining. The raw mode manager points this at its
/// cooked-mode restore so the terminal is usable before any pre-existing
/// handler — or the default action — gets to exit the process.
///
/// Stored as a `fn()` address; the pointed-to function must itself be
/// async-signal-safe.
#[cfg(unix)]
static EXIT_HOOK: AtomicUsize = AtomicUsize::new(0);

/// Install the terminating-signal hook. Pass a function that is safe to
/// run in signal context (no allocation, no locks).
#[cfg(unix)]
pub(crate) fn set_exit_hook(hook: fn()) {
    EXIT_HOOK.store(hook as usize, Ordering::Relaxed);
}

#[cfg(not(unix))]
pub(crate) fn set_exit_hook(_hook: fn()) {}

// ─── Handler ─────────────────────────────────────────────────────────────────

#[cfg(unix)]
extern "C" fn on_signal(sig: libc::c_int) {
    let Some(kind) = kind_of(sig) else { return };
    let idx = slot(kind);
    PENDING[idx].store(true, Ordering::Relaxed);

    if !matches!(kind, SignalKind::WindowChange) {
        let hook = EXIT_HOOK.load(Ordering::Relaxed);
        if hook != 0 {
            unsafe {
                let f: fn() = std::mem::transmute(hook);
                f();
            }
        }
    }

    // Chain to whatever handler was installed before ours.
    let prev = PREVIOUS[idx].load(Ordering::Relaxed);
    if prev > 1 {
        unsafe {
            if PREVIOUS_SIGINFO[idx].load(Ordering::Relaxed) {
                let f: extern "C" fn(libc::c_int, *mut libc::siginfo_t, *mut libc::c_void) =
                    std::mem::transmute(prev);
                f(sig, std::ptr::null_mut(), std::ptr::null_mut());
            } else {
                let f: extern "C" fn(libc::c_int) = std::mem::transmute(prev);
                f(sig);
            }
        }
    }
}

// ─── Installation ────────────────────────────────────────────────────────────

#[cfg(unix)]
static INSTALLED: Once = Once::new();

/// Install flag handlers for SIGWINCH, SIGINT, SIGTERM, and SIGHUP.
///
/// Idempotent — at most one installation per process. Pre-existing
/// handlers are preserved and chained to.
#[cfg(unix)]
pub fn install() {
    INSTALLED.call_once(|| {
        for kind in TRACKED {
            unsafe {
                let mut action: libc::sigaction = std::mem::zeroed();
                action.sa_sigaction = on_signal as *const () as usize;
                action.sa_flags = libc::SA_RESTART;
                libc::sigemptyset(&raw mut action.sa_mask);

                let mut old: libc::sigaction = std::mem::zeroed();
                if libc::sigaction(signo(kind), &raw const action, &raw mut old) == 0 {
                    let idx = slot(kind);
                    PREVIOUS[idx].store(old.sa_sigaction, Ordering::Relaxed);
                    PREVIOUS_SIGINFO[idx]
                        .store(old.sa_flags & libc::SA_SIGINFO != 0, Ordering::Relaxed);
                }
            }
        }
    });
}

#[cfg(not(unix))]
pub fn install() {}

// ─── Polling ─────────────────────────────────────────────────────────────────

/// Consume the pending flag for one signal.
pub fn take(kind: SignalKind) -> bool {
    PENDING[slot(kind)].swap(false, Ordering::Relaxed)
}

/// Drain all pending signals, window changes first.
#[must_use]
pub fn drain() -> Vec<SignalKind> {
    TRACKED.into_iter().filter(|&k| take(k)).collect()
}

/// Record a signal as pending without going through the OS.
///
/// Used by the loop's stop handle and by tests; the real handlers call
/// the same store.
pub fn note(kind: SignalKind) {
    PENDING[slot(kind)].store(true, Ordering::Relaxed);
}

// ─── Tests ───────────────────────────────────────────────────────────────────
