// SPDX-License-Identifier: MIT
#![allow(unsafe_code)]
//
// Background stdin reader — raw bytes from the terminal, off-thread.
//
// `read()` on stdin blocks, and the event loop must stay responsive for
// rendering, timers, and escape-sequence timeouts. A dedicated thread
// does the blocking and ships byte chunks over a standard channel; the
// loop consumes them with `recv_timeout`, which is what makes the whole
// runtime cooperative — nothing on the main thread ever waits on
// terminal I/O.
//
// Shutdown: the thread polls stdin's fd with a short timeout and checks
// a stop flag between polls, so it never wedges in a blocking read when
// the loop wants to exit.

#[cfg(unix)]
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::thread::{self, JoinHandle};

/// Read chunk size. A keypress is 1–6 bytes; a paste can be kilobytes.
const READ_BUF_SIZE: usize = 4096;

/// Poll timeout between stop-flag checks (milliseconds). Bounds
/// shutdown latency.
const POLL_TIMEOUT_MS: i32 = 50;

/// Handle to the background reader thread.
///
/// ```no_run
/// use emberterm::reader::StdinReader;
///
/// let (mut reader, rx) = StdinReader::spawn();
/// while let Ok(bytes) = rx.recv() {
///     // feed bytes to the input parser
///     let _ = bytes;
/// }
/// reader.stop();
/// ```
pub struct StdinReader {
    /// `None` after `stop()` has joined the thread.
    handle: Option<JoinHandle<()>>,
    stop: Arc<AtomicBool>,
}

impl StdinReader {
    /// Spawn the reader thread. Each received `Vec<u8>` is a non-empty
    /// chunk of raw stdin bytes; the channel closes on stop or EOF.
    ///
    /// # Panics
    ///
    /// Panics if the OS cannot spawn a thread.
    #[must_use]
    pub fn spawn() -> (Self, Receiver<Vec<u8>>) {
        let (tx, rx) = mpsc::channel();
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);

        let handle = thread::Builder::new()
            .name("stdin-reader".into())
            .spawn(move || Self::reader_loop(&tx, &stop_flag))
            .expect("failed to spawn stdin reader thread");

        (
            Self {
                handle: Some(handle),
                stop,
            },
            rx,
        )
    }

    /// Signal the thread to stop and join it. Idempotent.
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }

    #[cfg(unix)]
    fn reader_loop(tx: &mpsc::Sender<Vec<u8>>, stop: &AtomicBool) {
        use std::os::unix::io::AsRawFd;

        let stdin_fd = io::stdin().as_raw_fd();
        let mut buf = [0u8; READ_BUF_SIZE];

        loop {
            if stop.load(Ordering::Relaxed) {
                break;
            }

            let ready = unsafe {
                let mut pfd = libc::pollfd {
                    fd: stdin_fd,
                    events: libc::POLLIN,
                    revents: 0,
                };
                libc::poll(&raw mut pfd, 1, POLL_TIMEOUT_MS)
            };

            // Timeout or EINTR: loop back to the stop-flag check.
            if ready <= 0 {
                continue;
            }

            let n = unsafe { libc::read(stdin_fd, buf.as_mut_ptr().cast(), buf.len()) };
            if n <= 0 {
                // EOF or read error — the channel closing tells the loop.
                break;
            }

            #[allow(clippy::cast_sign_loss)] // n > 0 checked above.
            let chunk = buf[..n as usize].to_vec();
            if tx.send(chunk).is_err() {
                break;
            }
        }
    }

    /// Non-unix fallback: blocking reads, no poll. Shutdown is less
    /// graceful (the thread may sit in one last read) but functional.
    #[cfg(not(unix))]
    fn reader_loop(tx: &mpsc::Sender<Vec<u8>>, stop: &AtomicBool) {
        use std::io::Read;

        let stdin = std::io::stdin();
        let mut buf = [0u8; READ_BUF_SIZE];

        loop {
            if stop.load(Ordering::Relaxed) {
                break;
            }
            match stdin.lock().read(&mut buf) {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    if tx.send(buf[..n].to_vec()).is_err() {
                        break;
                    }
                }
            }
        }
    }
}

impl Drop for StdinReader {
    fn drop(&mut self) {
        self.stop();
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn spawn_and_stop() {
        let (mut reader, _rx) = StdinReader::spawn();
        reader.stop();
    }

    #[test]
    fn stop_is_idempotent() {
        let (mut reader, _rx) = StdinReader::spawn();
        reader.stop();
        reader.stop();
    }

    #[test]
    fn drop_stops_the_thread() {
        let (reader, _rx) = StdinReader::spawn();
        drop(reader); // Must not hang.
    }

    #[test]
    fn channel_closes_after_stop() {
        let (mut reader, rx) = StdinReader::spawn();
        reader.stop();
        while rx.try_recv().is_ok() {}
        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
    }
}
