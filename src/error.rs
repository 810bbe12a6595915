// SPDX-License-Identifier: MIT
//
// Crate error taxonomy.
//
// Only conditions the caller can meaningfully react to get a variant.
// Recoverable conditions (malformed escape sequences, queue overflow)
// are handled where they occur and never surface as errors.

use std::io;

/// Errors surfaced by the terminal runtime.
#[derive(Debug, thiserror::Error)]
pub enum TermError {
    /// Raw mode was requested but the input stream is not a terminal.
    ///
    /// Raw mode is a termios operation; without a TTY there is nothing
    /// to configure. Callers running under pipes or CI should check
    /// [`crate::caps::is_tty`] first.
    #[error("stdin is not a TTY; raw mode requires a terminal")]
    NotATty,

    /// `start()` was called while the event loop was not `Stopped`.
    #[error("event loop is already running")]
    AlreadyRunning,

    /// An operation that requires a running loop found it stopped.
    #[error("event loop is not running")]
    NotRunning,

    /// An underlying terminal I/O or termios call failed.
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Convenience alias for fallible runtime operations.
pub type Result<T> = std::result::Result<T, TermError>;

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_a_tty_message_mentions_tty() {
        let msg = TermError::NotATty.to_string();
        assert!(msg.contains("TTY"));
    }

    #[test]
    fn io_error_converts() {
        let io_err = io::Error::new(io::ErrorKind::BrokenPipe, "pipe closed");
        let err: TermError = io_err.into();
        assert!(matches!(err, TermError::Io(_)));
    }

    #[test]
    fn io_error_message_passes_through() {
        let io_err = io::Error::new(io::ErrorKind::BrokenPipe, "pipe closed");
        let err: TermError = io_err.into();
        assert_eq!(err.to_string(), "pipe closed");
    }

    #[test]
    fn state_errors_are_distinct() {
        assert_ne!(
            TermError::AlreadyRunning.to_string(),
            TermError::NotRunning.to_string()
        );
    }
}
