// SPDX-License-Identifier: MIT
//
// Raw mode management — the process-wide terminal state owner.
//
// Safety: this module necessarily uses `unsafe` for termios (tcgetattr,
// tcsetattr), ioctl (TIOCGWINSZ), and raw fd writes. These are the
// standard POSIX interfaces for terminal control; each unsafe block is
// minimal.
#![allow(unsafe_code)]
//
// The manager is the single, explicitly-owned holder of raw/cooked
// state: construct one per process, pass references to dependents. It
// owns three restoration paths so the user's shell never ends up stuck
// in raw mode:
//
//   1. Normal: `exit()` / `leave_session()` / Drop.
//   2. Panic: a hook writes a pre-built restore sequence directly to
//      fd 1 (bypassing Rust's stdout lock, which the panicking thread
//      may hold mid-frame) and restores termios from a global backup.
//   3. Signals: SIGINT/SIGTERM/SIGHUP run an async-signal-safe restore
//      before chaining to any pre-existing handler. The saved termios
//      for this path lives behind an acquire/release validity flag, not
//      a Mutex — locks are off-limits in signal context.
//
// `enter()` on a non-TTY stream is an error, not a silent no-op: raw
// mode that silently didn't happen is the kind of bug that only shows
// up as "input is weird in CI".

use std::io::{self, Write};
#[cfg(unix)]
use std::mem::MaybeUninit;
#[cfg(unix)]
use std::sync::Mutex;
use std::sync::Once;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::ansi;
use crate::caps::{self, TerminalCapabilities};
use crate::error::TermError;
use crate::signal;

// ─── Size ────────────────────────────────────────────────────────────────────

/// Terminal dimensions in character cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Size {
    /// Number of columns.
    pub cols: u16,
    /// Number of rows.
    pub rows: u16,
}

impl Size {
    /// Total number of cells (`cols × rows`).
    #[inline]
    #[must_use]
    pub const fn area(self) -> u32 {
        self.cols as u32 * self.rows as u32
    }
}

/// Query the current terminal size via `ioctl(TIOCGWINSZ)`.
///
/// Returns `None` if stdout is not a terminal or the query fails.
#[cfg(unix)]
#[must_use]
pub fn terminal_size() -> Option<Size> {
    let mut ws: libc::winsize = unsafe { std::mem::zeroed() };
    let result = unsafe { libc::ioctl(libc::STDOUT_FILENO, libc::TIOCGWINSZ, &mut ws) };

    if result == 0 && ws.ws_col > 0 && ws.ws_row > 0 {
        Some(Size {
            cols: ws.ws_col,
            rows: ws.ws_row,
        })
    } else {
        None
    }
}

#[cfg(not(unix))]
#[must_use]
pub fn terminal_size() -> Option<Size> {
    None
}

// ─── Emergency Restore ───────────────────────────────────────────────────────

/// Complete terminal restore sequence for abnormal exits.
///
/// Concatenation of: end synchronized output, disable mouse (SGR and
/// UTF-8 extensions, motion, clicks), disable the Kitty keyboard
/// protocol, disable bracketed paste, disable focus reporting, reset
/// SGR attributes, reset cursor shape, show cursor, exit alternate
/// screen. Alternate-screen exit is last so the restored shell content
/// appears with no TUI artifacts.
#[rustfmt::skip]
const EMERGENCY_RESTORE: &[u8] = b"\
    \x1b[?2026l\
    \x1b[?1006l\x1b[?1005l\x1b[?1002l\x1b[?1000l\
    \x1b[<u\
    \x1b[?2004l\
    \x1b[?1004l\
    \x1b[0m\
    \x1b[0 q\
    \x1b[?25h\
    \x1b[?1049l";

/// Global termios backup for the panic hook (Mutex is fine in panic
/// context — the panicking thread owns no locks of ours).
#[cfg(unix)]
static TERMIOS_BACKUP: Mutex<Option<libc::termios>> = Mutex::new(None);

/// Async-signal-safe termios backup for the signal restore path.
///
/// `SIGNAL_BACKUP_VALID` is cleared before the struct is written and set
/// (release) after, so the handler (acquire) never observes a torn value.
#[cfg(unix)]
static mut SIGNAL_BACKUP: MaybeUninit<libc::termios> = MaybeUninit::uninit();
#[cfg(unix)]
static SIGNAL_BACKUP_VALID: AtomicBool = AtomicBool::new(false);

/// Whether a TUI session (alternate screen + features) is active, for
/// the signal/panic paths to decide whether escape restoration is due.
static SESSION_ACTIVE: AtomicBool = AtomicBool::new(false);

#[cfg(unix)]
fn store_signal_backup(termios: libc::termios) {
    SIGNAL_BACKUP_VALID.store(false, Ordering::Release);
    unsafe {
        SIGNAL_BACKUP = MaybeUninit::new(termios);
    }
    SIGNAL_BACKUP_VALID.store(true, Ordering::Release);
}

#[cfg(unix)]
fn clear_signal_backup() {
    SIGNAL_BACKUP_VALID.store(false, Ordering::Release);
}

/// Restore cooked mode and terminal modes from signal context.
///
/// Async-signal-safe: one `write()` to fd 1 plus `tcsetattr`, both on
/// the POSIX safe list. Registered with the signal module as the
/// terminating-signal hook.
fn restore_for_exit_signal() {
    if SESSION_ACTIVE.load(Ordering::Relaxed) {
        #[cfg(unix)]
        unsafe {
            let _ = libc::write(
                libc::STDOUT_FILENO,
                EMERGENCY_RESTORE.as_ptr().cast::<libc::c_void>(),
                EMERGENCY_RESTORE.len(),
            );
        }
    }
    #[cfg(unix)]
    if SIGNAL_BACKUP_VALID.load(Ordering::Acquire) {
        unsafe {
            let _ = libc::tcsetattr(
                libc::STDIN_FILENO,
                libc::TCSANOW,
                (&raw const SIGNAL_BACKUP).cast(),
            );
        }
    }
}

/// Panic hook guard — the hook is installed at most once per process.
static PANIC_HOOK_INSTALLED: Once = Once::new();

/// Install a panic hook that restores the terminal before printing the
/// error. Without this, a panic in raw mode leaves the user's terminal
/// with no echo and no line editing — and the panic message unreadable.
fn install_panic_hook() {
    PANIC_HOOK_INSTALLED.call_once(|| {
        let original = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            emergency_restore();

            #[cfg(unix)]
            if let Ok(guard) = TERMIOS_BACKUP.lock() {
                if let Some(ref original) = *guard {
                    unsafe {
                        let _ = libc::tcsetattr(libc::STDIN_FILENO, libc::TCSANOW, original);
                    }
                }
            }

            original(info);
        }));
    });
}

/// Write the restore sequence directly to stdout's file descriptor,
/// bypassing Rust's `io::stdout()` lock (the panic may have happened
/// while it was held mid-flush).
fn emergency_restore() {
    #[cfg(unix)]
    unsafe {
        let _ = libc::write(
            libc::STDOUT_FILENO,
            EMERGENCY_RESTORE.as_ptr().cast::<libc::c_void>(),
            EMERGENCY_RESTORE.len(),
        );
    }

    #[cfg(not(unix))]
    {
        let _ = io::stdout().write_all(EMERGENCY_RESTORE);
        let _ = io::stdout().flush();
    }
}

// ─── RawModeManager ──────────────────────────────────────────────────────────

/// Raw mode state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawModeState {
    /// Cooked mode; the terminal behaves normally.
    Inactive,
    /// Raw mode; keystrokes arrive unbuffered and unechoed.
    Active,
}

/// Lifecycle observer callback.
type Observer = Box<dyn FnMut()>;

/// Owner of the terminal's raw/cooked state and TUI session.
///
/// Construct once per process; restoration on drop, panic, and
/// terminating signals is guaranteed once `enter()` has succeeded.
///
/// ```no_run
/// use emberterm::caps;
/// use emberterm::raw_mode::RawModeManager;
///
/// let mut raw = RawModeManager::new(caps::detect());
/// raw.enter()?;
/// // ... run the event loop ...
/// raw.exit()?;
/// # Ok::<(), emberterm::error::TermError>(())
/// ```
pub struct RawModeManager {
    #[cfg(unix)]
    original_termios: Option<libc::termios>,
    state: RawModeState,
    session_active: bool,
    caps: TerminalCapabilities,
    on_start: Vec<Observer>,
    on_stop: Vec<Observer>,
}

impl RawModeManager {
    /// Create an inactive manager for a terminal with the given
    /// capabilities.
    #[must_use]
    pub fn new(caps: TerminalCapabilities) -> Self {
        Self {
            #[cfg(unix)]
            original_termios: None,
            state: RawModeState::Inactive,
            session_active: false,
            caps,
            on_start: Vec::new(),
            on_stop: Vec::new(),
        }
    }

    /// Current state.
    #[inline]
    #[must_use]
    pub const fn state(&self) -> RawModeState {
        self.state
    }

    /// Whether raw mode is active.
    #[inline]
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state == RawModeState::Active
    }

    /// The capabilities this manager was built with.
    #[inline]
    #[must_use]
    pub const fn capabilities(&self) -> &TerminalCapabilities {
        &self.caps
    }

    // ─── Lifecycle observers ─────────────────────────────────────────────

    /// Register a callback fired after each successful `enter()`.
    pub fn on_start(&mut self, callback: impl FnMut() + 'static) {
        self.on_start.push(Box::new(callback));
    }

    /// Register a callback fired after each `exit()` that left Active.
    pub fn on_stop(&mut self, callback: impl FnMut() + 'static) {
        self.on_stop.push(Box::new(callback));
    }

    // ─── Raw mode transitions ────────────────────────────────────────────

    /// Enter raw mode: `Inactive → Active`.
    ///
    /// Saves the current termios for every restoration path, applies a
    /// `cfmakeraw`-equivalent configuration, and installs the panic hook
    /// and signal handlers (additively — pre-existing handlers chain).
    /// Calling while already Active is a no-op.
    ///
    /// # Errors
    ///
    /// [`TermError::NotATty`] when stdin is not a terminal; the state
    /// stays `Inactive`. [`TermError::Io`] if termios calls fail.
    pub fn enter(&mut self) -> Result<(), TermError> {
        if self.state == RawModeState::Active {
            return Ok(());
        }
        if !caps::is_tty() {
            return Err(TermError::NotATty);
        }

        install_panic_hook();
        signal::install();
        signal::set_exit_hook(restore_for_exit_signal);

        self.enable_raw()?;

        self.state = RawModeState::Active;
        log::debug!("raw mode entered");
        for callback in &mut self.on_start {
            callback();
        }
        Ok(())
    }

    /// Leave raw mode: `Active → Inactive`.
    ///
    /// Idempotent — calling while Inactive is a no-op. Safe to call on
    /// any exit path.
    ///
    /// # Errors
    ///
    /// Returns [`TermError::Io`] if the termios restore fails.
    pub fn exit(&mut self) -> Result<(), TermError> {
        if self.state == RawModeState::Inactive {
            return Ok(());
        }

        self.disable_raw()?;
        self.state = RawModeState::Inactive;
        log::debug!("raw mode exited");
        for callback in &mut self.on_stop {
            callback();
        }
        Ok(())
    }

    /// Flip between raw and cooked mode.
    ///
    /// # Errors
    ///
    /// Propagates [`enter`](Self::enter) / [`exit`](Self::exit) errors.
    pub fn toggle(&mut self) -> Result<(), TermError> {
        match self.state {
            RawModeState::Inactive => self.enter(),
            RawModeState::Active => self.exit(),
        }
    }

    // ─── TUI session ─────────────────────────────────────────────────────

    /// Enter the full TUI session: raw mode, alternate screen, hidden
    /// cursor, and every input feature the detected capabilities
    /// support (mouse protocol, bracketed paste, focus reporting).
    ///
    /// # Errors
    ///
    /// Propagates [`enter`](Self::enter) errors and stdout write failures.
    pub fn enter_session(&mut self) -> Result<(), TermError> {
        self.enter()?;
        if self.session_active {
            return Ok(());
        }

        let stdout = io::stdout();
        let mut lock = stdout.lock();
        ansi::enter_alt_screen(&mut lock)?;
        ansi::cursor_hide(&mut lock)?;
        ansi::clear_screen(&mut lock)?;
        ansi::enable_mouse(&mut lock, self.caps.mouse_protocol)?;
        if self.caps.keyboard_enhancement {
            ansi::enable_kitty_keyboard(&mut lock, 1)?;
        }
        if self.caps.bracketed_paste {
            ansi::enable_bracketed_paste(&mut lock)?;
        }
        if self.caps.focus_events {
            ansi::enable_focus_reporting(&mut lock)?;
        }
        lock.flush()?;

        self.session_active = true;
        SESSION_ACTIVE.store(true, Ordering::Relaxed);
        Ok(())
    }

    /// Leave the TUI session and restore cooked mode.
    ///
    /// Disables features in reverse order, exits the alternate screen,
    /// then drops raw mode. Idempotent.
    ///
    /// # Errors
    ///
    /// Propagates stdout write and termios failures.
    pub fn leave_session(&mut self) -> Result<(), TermError> {
        if self.session_active {
            let stdout = io::stdout();
            let mut lock = stdout.lock();
            ansi::end_sync(&mut lock)?;
            if self.caps.focus_events {
                ansi::disable_focus_reporting(&mut lock)?;
            }
            if self.caps.bracketed_paste {
                ansi::disable_bracketed_paste(&mut lock)?;
            }
            if self.caps.keyboard_enhancement {
                ansi::disable_kitty_keyboard(&mut lock)?;
            }
            ansi::disable_mouse(&mut lock)?;
            ansi::reset(&mut lock)?;
            ansi::set_cursor_shape(&mut lock, ansi::CursorShape::Default)?;
            ansi::cursor_show(&mut lock)?;
            ansi::exit_alt_screen(&mut lock)?;
            lock.flush()?;

            self.session_active = false;
            SESSION_ACTIVE.store(false, Ordering::Relaxed);
        }

        self.exit()
    }

    // ─── termios ─────────────────────────────────────────────────────────

    #[cfg(unix)]
    fn enable_raw(&mut self) -> io::Result<()> {
        unsafe {
            let mut termios: libc::termios = std::mem::zeroed();
            if libc::tcgetattr(libc::STDIN_FILENO, &raw mut termios) != 0 {
                return Err(io::Error::last_os_error());
            }

            // Save for every restoration path.
            self.original_termios = Some(termios);
            if let Ok(mut guard) = TERMIOS_BACKUP.lock() {
                *guard = Some(termios);
            }
            store_signal_backup(termios);

            // cfmakeraw equivalent: disable all line processing.
            termios.c_iflag &= !(libc::IGNBRK
                | libc::BRKINT
                | libc::PARMRK
                | libc::ISTRIP
                | libc::INLCR
                | libc::IGNCR
                | libc::ICRNL
                | libc::IXON);
            termios.c_oflag &= !libc::OPOST;
            termios.c_lflag &=
                !(libc::ECHO | libc::ECHONL | libc::ICANON | libc::ISIG | libc::IEXTEN);
            termios.c_cflag &= !(libc::CSIZE | libc::PARENB);
            termios.c_cflag |= libc::CS8;

            // VMIN=1, VTIME=0: read() blocks until at least one byte.
            termios.c_cc[libc::VMIN] = 1;
            termios.c_cc[libc::VTIME] = 0;

            if libc::tcsetattr(libc::STDIN_FILENO, libc::TCSAFLUSH, &raw const termios) != 0 {
                return Err(io::Error::last_os_error());
            }
        }
        Ok(())
    }

    #[cfg(not(unix))]
    fn enable_raw(&mut self) -> io::Result<()> {
        Ok(())
    }

    #[cfg(unix)]
    fn disable_raw(&mut self) -> io::Result<()> {
        if let Some(ref original) = self.original_termios {
            unsafe {
                if libc::tcsetattr(libc::STDIN_FILENO, libc::TCSAFLUSH, original) != 0 {
                    return Err(io::Error::last_os_error());
                }
            }

            if let Ok(mut guard) = TERMIOS_BACKUP.lock() {
                *guard = None;
            }
            clear_signal_backup();
            self.original_termios = None;
        }
        Ok(())
    }

    #[cfg(not(unix))]
    fn disable_raw(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for RawModeManager {
    fn drop(&mut self) {
        let _ = self.leave_session();
    }
}

impl std::fmt::Debug for RawModeManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RawModeManager({:?})", self.state)
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
