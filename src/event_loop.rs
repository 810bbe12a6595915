// SPDX-License-Identifier: MIT
//
// Event loop — the scheduler that pumps the whole runtime.
//
// One iteration per tick:
//
//   1. Receive stdin bytes (blocking on the reader channel with the
//      tick timeout) and drain the parser into the queue. The timeout
//      doubles as the escape-sequence timeout: a lone ESC resolves to a
//      real Escape keypress within one tick.
//   2. Fold pending signal flags into High-priority events. SIGWINCH
//      becomes a Resize event carrying the new dimensions.
//   3. Fire due timers.
//   4. Dispatch queued events in priority order, one at a time, through
//      the phased dispatcher. Priority ordering plus sequential
//      dispatch is what guarantees a resize is fully handled (buffers
//      reallocated) before any event queued after it.
//   5. If nothing was dispatched and the queue is empty, deliver one
//      Idle event and run the idle callbacks. Nothing else runs while
//      an idle callback does — that is the cooperative yield point.
//
// Blocking on the channel gives instant input response and 0% CPU when
// idle; the timeout keeps ticks flowing for animation and timers.
//
// `stop()` — or any clone of the StopHandle, which is safe to use from
// signal handlers and dispatch callbacks — ends the loop at the next
// iteration boundary: the in-flight dispatch finishes, pending queued
// events are discarded, and the state returns to Stopped.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

use crate::caps::TerminalCapabilities;
use crate::error::TermError;
use crate::event::{Event, EventKind, SignalKind};
use crate::input::Parser;
use crate::queue::{Dispatcher, EventQueue, QueueConfig};
use crate::raw_mode::{terminal_size, Size};
use crate::reader::StdinReader;
use crate::signal;

// ─── Configuration ───────────────────────────────────────────────────────────

/// Event loop timing and queue configuration.
#[derive(Debug, Clone, Copy)]
pub struct LoopConfig {
    /// Channel receive timeout — the tick interval. Controls idle tick
    /// rate and the escape-sequence flush latency. Default 8333µs
    /// (120 Hz).
    pub tick_interval: Duration,
    /// Queue capacities.
    pub queue: QueueConfig,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_micros(8333),
            queue: QueueConfig::default(),
        }
    }
}

// ─── Loop State ──────────────────────────────────────────────────────────────

/// Event loop lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Not running. The only state `start()` accepts.
    Stopped,
    /// `start()` is initializing (reader spawn, signal install).
    Starting,
    /// Pumping events.
    Running,
    /// Stop requested; finishing the current iteration.
    Stopping,
}

/// Requests loop shutdown from anywhere: dispatch handlers, timers,
/// other threads, signal handlers. Cloneable; all clones share one flag.
#[derive(Clone)]
pub struct StopHandle {
    flag: Arc<AtomicBool>,
}

impl StopHandle {
    /// Request the loop to stop at the next iteration boundary.
    /// Idempotent.
    pub fn stop(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }
}

// ─── Timers ──────────────────────────────────────────────────────────────────

/// Identifies a scheduled timer for cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(u64);

struct TimerEntry {
    id: TimerId,
    deadline: Instant,
    /// `Some` for repeating timers, `None` for one-shots.
    period: Option<Duration>,
    callback: Box<dyn FnMut()>,
}

/// One-shot and repeating timers, serviced by the loop each tick.
///
/// Debounce/throttle collaborators build on these two primitives.
#[derive(Default)]
pub struct Timers {
    entries: Vec<TimerEntry>,
    next_id: u64,
}

impl Timers {
    /// Create an empty timer set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule a one-shot callback after `delay`.
    pub fn after(&mut self, delay: Duration, callback: impl FnMut() + 'static) -> TimerId {
        self.schedule(delay, None, callback)
    }

    /// Schedule a repeating callback every `period`.
    pub fn every(&mut self, period: Duration, callback: impl FnMut() + 'static) -> TimerId {
        self.schedule(period, Some(period), callback)
    }

    fn schedule(
        &mut self,
        delay: Duration,
        period: Option<Duration>,
        callback: impl FnMut() + 'static,
    ) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        self.entries.push(TimerEntry {
            id,
            deadline: Instant::now() + delay,
            period,
            callback: Box::new(callback),
        });
        id
    }

    /// Cancel a timer. Returns whether it was still scheduled.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.id != id);
        self.entries.len() != before
    }

    /// Number of scheduled timers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no timers are scheduled.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Run every timer whose deadline has passed. One-shots are removed;
    /// repeating timers are rescheduled from `now` (no catch-up bursts
    /// after a stall). Returns the number of callbacks fired.
    pub fn fire_due(&mut self, now: Instant) -> usize {
        let mut fired = 0;
        let mut i = 0;
        while i < self.entries.len() {
            if self.entries[i].deadline > now {
                i += 1;
                continue;
            }
            fired += 1;
            let entry = &mut self.entries[i];
            (entry.callback)();
            if let Some(period) = entry.period {
                entry.deadline = now + period;
                i += 1;
            } else {
                self.entries.swap_remove(i);
            }
        }
        fired
    }
}

impl std::fmt::Debug for Timers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Timers({} scheduled)", self.entries.len())
    }
}

// ─── EventLoop ───────────────────────────────────────────────────────────────

/// The cooperative event loop.
///
/// Owns the input parser, queue, dispatcher, and timers. `start()`
/// blocks in the loop until a [`StopHandle`] fires or stdin closes.
///
/// ```no_run
/// use emberterm::caps;
/// use emberterm::event::EventKind;
/// use emberterm::event_loop::EventLoop;
/// use emberterm::queue::Phase;
///
/// let mut event_loop = EventLoop::new(caps::detect());
/// let stop = event_loop.stop_handle();
///
/// event_loop.dispatcher().on(Phase::Target, move |event| {
///     if matches!(event.kind(), EventKind::Key(_)) {
///         stop.stop();
///     }
/// });
///
/// event_loop.start()?;
/// # Ok::<(), emberterm::error::TermError>(())
/// ```
pub struct EventLoop {
    state: LoopState,
    queue: EventQueue,
    dispatcher: Dispatcher,
    parser: Parser,
    timers: Timers,
    idle_callbacks: Vec<Box<dyn FnMut()>>,
    stop_flag: Arc<AtomicBool>,
    config: LoopConfig,
    last_size: Size,
}

impl EventLoop {
    /// Create a loop for a terminal with the given capabilities (the
    /// parser's mouse decoding follows the detected protocol).
    #[must_use]
    pub fn new(caps: TerminalCapabilities) -> Self {
        Self::with_config(caps, LoopConfig::default())
    }

    /// Create a loop with explicit configuration.
    #[must_use]
    pub fn with_config(caps: TerminalCapabilities, config: LoopConfig) -> Self {
        Self {
            state: LoopState::Stopped,
            queue: EventQueue::with_config(config.queue),
            dispatcher: Dispatcher::new(),
            parser: Parser::new(caps.mouse_protocol),
            timers: Timers::new(),
            idle_callbacks: Vec::new(),
            stop_flag: Arc::new(AtomicBool::new(false)),
            config,
            last_size: terminal_size().unwrap_or(Size { cols: 80, rows: 24 }),
        }
    }

    /// Current lifecycle state.
    #[inline]
    #[must_use]
    pub const fn state(&self) -> LoopState {
        self.state
    }

    /// The dispatcher, for registering handlers. Cloneable — keep a
    /// clone wherever handlers are managed.
    #[must_use]
    pub const fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// The last known terminal size.
    #[inline]
    #[must_use]
    pub const fn size(&self) -> Size {
        self.last_size
    }

    /// A handle that stops the loop from handlers, timers, other
    /// threads, or signal context.
    #[must_use]
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            flag: Arc::clone(&self.stop_flag),
        }
    }

    /// Register an idle callback, run when a tick finds the queue empty.
    pub fn on_idle(&mut self, callback: impl FnMut() + 'static) {
        self.idle_callbacks.push(Box::new(callback));
    }

    /// Schedule a one-shot timer.
    pub fn after(&mut self, delay: Duration, callback: impl FnMut() + 'static) -> TimerId {
        self.timers.after(delay, callback)
    }

    /// Schedule a repeating timer.
    pub fn every(&mut self, period: Duration, callback: impl FnMut() + 'static) -> TimerId {
        self.timers.every(period, callback)
    }

    /// Cancel a timer.
    pub fn cancel_timer(&mut self, id: TimerId) -> bool {
        self.timers.cancel(id)
    }

    /// Inject an event from outside the input stream (Custom events,
    /// tests, cross-thread wakeups via a channel of your own).
    pub fn enqueue(&mut self, event: Event) {
        self.queue.enqueue(event);
    }

    /// Request the loop to stop. Equivalent to a [`StopHandle`];
    /// idempotent, a no-op when already Stopped.
    pub fn stop(&mut self) {
        if self.state != LoopState::Stopped {
            self.stop_flag.store(true, Ordering::Relaxed);
        }
    }

    // ─── Run ─────────────────────────────────────────────────────────────

    /// Run the loop until stopped or stdin closes.
    ///
    /// Valid only from `Stopped`. Spawns the background stdin reader,
    /// installs signal handlers (additively), and blocks. On return the
    /// reader has been joined, pending queued events are discarded, and
    /// the state is `Stopped` again.
    ///
    /// # Errors
    ///
    /// [`TermError::AlreadyRunning`] when called while not `Stopped`.
    pub fn start(&mut self) -> Result<(), TermError> {
        if self.state != LoopState::Stopped {
            return Err(TermError::AlreadyRunning);
        }
        self.state = LoopState::Starting;

        signal::install();
        let (mut reader, rx) = StdinReader::spawn();

        self.state = LoopState::Running;
        log::debug!("event loop running");
        self.run_inner(&rx);

        self.state = LoopState::Stopping;
        reader.stop();
        // Stop discards; nothing queued survives into the next run, and
        // the consumed stop request doesn't either. A StopHandle fired
        // before start() still wins: the flag is only cleared here, on
        // the way out.
        self.queue.clear();
        self.stop_flag.store(false, Ordering::Relaxed);
        self.state = LoopState::Stopped;
        log::debug!("event loop stopped");
        Ok(())
    }

    fn run_inner(&mut self, rx: &Receiver<Vec<u8>>) {
        loop {
            if self.stop_flag.load(Ordering::Relaxed) {
                return;
            }

            // ── 1. Input ─────────────────────────────────────────
            match rx.recv_timeout(self.config.tick_interval) {
                Ok(bytes) => self.pump_input(&bytes),
                Err(RecvTimeoutError::Timeout) => {
                    if self.parser.has_pending() {
                        for event in self.parser.flush() {
                            self.queue.enqueue(event);
                        }
                    }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    // stdin closed — nothing more will ever arrive.
                    return;
                }
            }

            // ── 2. Signals ───────────────────────────────────────
            self.pump_signals();

            // ── 3. Timers ────────────────────────────────────────
            self.timers.fire_due(Instant::now());

            // ── 4. Dispatch ──────────────────────────────────────
            let dispatched = self.dispatch_pending();

            // ── 5. Idle ──────────────────────────────────────────
            if dispatched == 0 && self.queue.is_empty() {
                self.run_idle();
            }
        }
    }

    /// Parse one input chunk into the queue.
    fn pump_input(&mut self, bytes: &[u8]) {
        for event in self.parser.advance(bytes) {
            self.queue.enqueue(event);
        }
    }

    /// Fold pending signals into High-priority events. SIGWINCH arrives
    /// as a Resize carrying the new dimensions; the remaining signals
    /// arrive as Signal events for the application to act on.
    fn pump_signals(&mut self) {
        for kind in signal::drain() {
            let event = if kind == SignalKind::WindowChange {
                if let Some(size) = terminal_size() {
                    self.last_size = size;
                }
                Event::new(EventKind::Resize {
                    cols: self.last_size.cols,
                    rows: self.last_size.rows,
                })
            } else {
                Event::new(EventKind::Signal(kind))
            };
            self.queue.enqueue(event);
        }
    }

    /// Dispatch everything queued, in priority order. Returns the count.
    ///
    /// Sequential dispatch out of a priority queue is what realizes the
    /// resize ordering guarantee: the High-priority Resize is fully
    /// handled before any Normal/Low event queued around it.
    fn dispatch_pending(&mut self) -> usize {
        let mut dispatched = 0;
        while let Some(mut event) = self.queue.dequeue() {
            self.dispatcher.dispatch(&mut event);
            dispatched += 1;
            if self.stop_flag.load(Ordering::Relaxed) {
                break;
            }
        }
        dispatched
    }

    /// Deliver one Idle event and run idle callbacks.
    fn run_idle(&mut self) {
        let mut idle = Event::new(EventKind::Idle);
        self.dispatcher.dispatch(&mut idle);
        for callback in &mut self.idle_callbacks {
            callback();
        }
    }
}

impl std::fmt::Debug for EventLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EventLoop({:?}, {:?})", self.state, self.queue)
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use serial_test::serial;

    use super::*;
    use crate::caps::{detect_from, EnvSnapshot};
    use crate::event::{KeyCode, KeyEvent, KeyEventKind, Modifiers};
    use crate::queue::Phase;

    fn test_loop() -> EventLoop {
        EventLoop::new(detect_from(&EnvSnapshot::default()))
    }

    fn key_event(ch: char) -> Event {
        Event::new(EventKind::Key(KeyEvent {
            code: KeyCode::Char(ch),
            modifiers: Modifiers::empty(),
            kind: KeyEventKind::Press,
        }))
    }

    // ── Config / construction ────────────────────────────────────────────

    #[test]
    fn default_tick_is_120hz() {
        assert_eq!(LoopConfig::default().tick_interval, Duration::from_micros(8333));
    }

    #[test]
    fn new_loop_is_stopped() {
        let event_loop = test_loop();
        assert_eq!(event_loop.state(), LoopState::Stopped);
    }

    // ── State machine ────────────────────────────────────────────────────

    #[test]
    fn start_from_non_stopped_is_rejected() {
        let mut event_loop = test_loop();
        event_loop.state = LoopState::Running;
        assert!(matches!(event_loop.start(), Err(TermError::AlreadyRunning)));
        // The failed call must not have touched the state.
        assert_eq!(event_loop.state(), LoopState::Running);
    }

    #[test]
    fn stop_while_stopped_is_a_noop() {
        let mut event_loop = test_loop();
        event_loop.stop();
        assert!(!event_loop.stop_flag.load(Ordering::Relaxed));
    }

    #[test]
    fn start_returns_to_stopped_after_stop_request() {
        let mut event_loop = test_loop();
        event_loop.stop_handle().stop();
        // Either the stop flag or stdin EOF (under the test harness)
        // ends the loop promptly.
        event_loop.start().unwrap();
        assert_eq!(event_loop.state(), LoopState::Stopped);
    }

    #[test]
    fn loop_can_run_again_after_stopping() {
        let mut event_loop = test_loop();
        event_loop.stop_handle().stop();
        event_loop.start().unwrap();
        event_loop.stop_handle().stop();
        event_loop.start().unwrap();
        assert_eq!(event_loop.state(), LoopState::Stopped);
    }

    #[test]
    fn pending_events_are_discarded_on_stop() {
        let mut event_loop = test_loop();
        // Pre-set the stop flag: the first iteration exits before
        // dispatching, and shutdown clears the queue.
        event_loop.stop_handle().stop();
        event_loop.enqueue(key_event('x'));
        event_loop.start().unwrap();
        assert!(event_loop.queue.is_empty());
    }

    // ── Pump stages (unit level) ─────────────────────────────────────────

    #[test]
    fn pump_input_parses_and_enqueues() {
        let mut event_loop = test_loop();
        event_loop.pump_input(b"ab");
        assert_eq!(event_loop.queue.len(), 2);
    }

    #[test]
    #[serial(signals)]
    fn pump_signals_turns_winch_into_resize() {
        let mut event_loop = test_loop();
        let _ = signal::drain();
        signal::note(SignalKind::WindowChange);
        event_loop.pump_signals();

        let event = event_loop.queue.dequeue().unwrap();
        assert!(matches!(event.kind(), EventKind::Resize { .. }));
    }

    #[test]
    #[serial(signals)]
    fn pump_signals_passes_other_signals_through() {
        let mut event_loop = test_loop();
        let _ = signal::drain();
        signal::note(SignalKind::Hangup);
        event_loop.pump_signals();

        let event = event_loop.queue.dequeue().unwrap();
        assert_eq!(event.kind(), &EventKind::Signal(SignalKind::Hangup));
    }

    #[test]
    fn dispatch_pending_delivers_in_priority_order() {
        let mut event_loop = test_loop();
        let order = Rc::new(RefCell::new(Vec::new()));
        {
            let order = Rc::clone(&order);
            event_loop.dispatcher().on(Phase::Target, move |event| {
                let tag = match event.kind() {
                    EventKind::Resize { .. } => "resize",
                    EventKind::Key(_) => "key",
                    _ => "other",
                };
                order.borrow_mut().push(tag);
            });
        }

        event_loop.enqueue(key_event('a'));
        event_loop.enqueue(Event::new(EventKind::Resize { cols: 100, rows: 40 }));

        let dispatched = event_loop.dispatch_pending();
        assert_eq!(dispatched, 2);
        assert_eq!(*order.borrow(), vec!["resize", "key"]);
    }

    #[test]
    fn run_idle_emits_idle_event_then_callbacks() {
        let mut event_loop = test_loop();
        let order = Rc::new(RefCell::new(Vec::new()));
        {
            let order = Rc::clone(&order);
            event_loop.dispatcher().on(Phase::Target, move |event| {
                if matches!(event.kind(), EventKind::Idle) {
                    order.borrow_mut().push("idle-event");
                }
            });
        }
        {
            let order = Rc::clone(&order);
            event_loop.on_idle(move || order.borrow_mut().push("idle-callback"));
        }

        event_loop.run_idle();
        assert_eq!(*order.borrow(), vec!["idle-event", "idle-callback"]);
    }

    // ── Timers ───────────────────────────────────────────────────────────

    #[test]
    fn one_shot_timer_fires_once_and_unschedules() {
        let mut timers = Timers::new();
        let count = Rc::new(RefCell::new(0));
        {
            let count = Rc::clone(&count);
            timers.after(Duration::ZERO, move || *count.borrow_mut() += 1);
        }

        let now = Instant::now();
        assert_eq!(timers.fire_due(now), 1);
        assert!(timers.is_empty());
        assert_eq!(timers.fire_due(now), 0);
        assert_eq!(*count.borrow(), 1);
    }

    #[test]
    fn repeating_timer_reschedules() {
        let mut timers = Timers::new();
        let count = Rc::new(RefCell::new(0));
        {
            let count = Rc::clone(&count);
            timers.every(Duration::from_millis(5), move || *count.borrow_mut() += 1);
        }

        let later = Instant::now() + Duration::from_millis(10);
        assert_eq!(timers.fire_due(later), 1);
        assert_eq!(timers.len(), 1, "repeating timer stays scheduled");

        let much_later = later + Duration::from_millis(10);
        assert_eq!(timers.fire_due(much_later), 1);
        assert_eq!(*count.borrow(), 2);
    }

    #[test]
    fn timer_not_due_does_not_fire() {
        let mut timers = Timers::new();
        timers.after(Duration::from_secs(3600), || {});
        assert_eq!(timers.fire_due(Instant::now()), 0);
        assert_eq!(timers.len(), 1);
    }

    #[test]
    fn cancel_removes_timer() {
        let mut timers = Timers::new();
        let id = timers.after(Duration::ZERO, || {});
        assert!(timers.cancel(id));
        assert!(!timers.cancel(id));
        assert_eq!(timers.fire_due(Instant::now()), 0);
    }

    #[test]
    fn loop_timer_api_delegates() {
        let mut event_loop = test_loop();
        let id = event_loop.after(Duration::from_secs(60), || {});
        assert!(event_loop.cancel_timer(id));
        let id = event_loop.every(Duration::from_secs(60), || {});
        assert!(event_loop.cancel_timer(id));
    }
}
