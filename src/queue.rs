// SPDX-License-Identifier: MIT
//
// Event queue and phased dispatcher.
//
// The queue is three FIFO rings, one per priority. That gives O(1)
// enqueue/dequeue, strict priority ordering, and insertion-order
// stability within a priority — without heap bookkeeping.
//
// Backpressure: input floods (mouse movement above all) must never
// starve or evict the events that matter. Low events are bounded by
// their own capacity, oldest dropped first, so the queue keeps the most
// recent motion. When the total crosses the overall capacity, Low goes
// first, then Normal. High events (signals, resizes) are never dropped;
// if only High events remain the queue grows past capacity rather than
// lose one.
//
// The dispatcher delivers one event through three phases — Capture,
// Target, Bubble — to handlers registered per phase. Registration
// returns a Disposer that is safe to call *during* dispatch: the
// registry hands each callback out before running it and tombstones
// removals while a dispatch is in flight, so the in-progress iteration
// never observes a half-removed entry.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::{Rc, Weak};

use crate::event::{Event, Priority};

// ─── Queue Configuration ─────────────────────────────────────────────────────

/// Capacity bounds for the event queue.
#[derive(Debug, Clone, Copy)]
pub struct QueueConfig {
    /// Total events held across all priorities before dropping starts.
    pub capacity: usize,
    /// Dedicated bound for Low-priority events (the flood-prone ones).
    pub low_capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: 1024,
            low_capacity: 64,
        }
    }
}

/// Drop counters for diagnostics.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueueStats {
    /// Events accepted into the queue.
    pub enqueued: u64,
    /// Low-priority events dropped under backpressure.
    pub dropped_low: u64,
    /// Normal-priority events dropped under backpressure.
    pub dropped_normal: u64,
}

// ─── EventQueue ──────────────────────────────────────────────────────────────

/// Priority-ordered event buffer with backpressure.
///
/// ```
/// use emberterm::event::{Event, EventKind, SignalKind};
/// use emberterm::queue::EventQueue;
///
/// let mut queue = EventQueue::new();
/// queue.enqueue(Event::new(EventKind::Idle));
/// queue.enqueue(Event::new(EventKind::Signal(SignalKind::WindowChange)));
///
/// // The signal dispatches first despite arriving second.
/// assert!(matches!(
///     queue.dequeue().unwrap().kind(),
///     EventKind::Signal(SignalKind::WindowChange)
/// ));
/// ```
pub struct EventQueue {
    high: VecDeque<Event>,
    normal: VecDeque<Event>,
    low: VecDeque<Event>,
    config: QueueConfig,
    stats: QueueStats,
    drop_warned: bool,
}

impl EventQueue {
    /// Create a queue with default capacities.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(QueueConfig::default())
    }

    /// Create a queue with explicit capacities.
    #[must_use]
    pub fn with_config(config: QueueConfig) -> Self {
        Self {
            high: VecDeque::new(),
            normal: VecDeque::new(),
            low: VecDeque::new(),
            config,
            stats: QueueStats::default(),
            drop_warned: false,
        }
    }

    /// Number of queued events across all priorities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.high.len() + self.normal.len() + self.low.len()
    }

    /// Whether the queue holds no events.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.high.is_empty() && self.normal.is_empty() && self.low.is_empty()
    }

    /// Queue an event, applying the backpressure policy.
    ///
    /// Never fails and never panics: overflow is resolved by dropping
    /// the lowest-priority, oldest events.
    pub fn enqueue(&mut self, event: Event) {
        match event.priority() {
            Priority::High => self.high.push_back(event),
            Priority::Normal => self.normal.push_back(event),
            Priority::Low => {
                self.low.push_back(event);
                while self.low.len() > self.config.low_capacity {
                    self.low.pop_front();
                    self.note_drop(Priority::Low);
                }
            }
        }
        self.stats.enqueued += 1;

        while self.len() > self.config.capacity {
            if self.low.pop_front().is_some() {
                self.note_drop(Priority::Low);
            } else if self.normal.pop_front().is_some() {
                self.note_drop(Priority::Normal);
            } else {
                // Only High events remain — the queue grows instead.
                break;
            }
        }
    }

    /// Take the next event: High first, then Normal, then Low; FIFO
    /// within each priority.
    pub fn dequeue(&mut self) -> Option<Event> {
        self.high
            .pop_front()
            .or_else(|| self.normal.pop_front())
            .or_else(|| self.low.pop_front())
    }

    /// Discard all queued events (loop shutdown — nothing is replayed).
    pub fn clear(&mut self) {
        self.high.clear();
        self.normal.clear();
        self.low.clear();
    }

    /// Drop counters.
    #[must_use]
    pub const fn stats(&self) -> &QueueStats {
        &self.stats
    }

    fn note_drop(&mut self, priority: Priority) {
        match priority {
            Priority::Low => self.stats.dropped_low += 1,
            Priority::Normal => self.stats.dropped_normal += 1,
            Priority::High => {}
        }
        if !self.drop_warned {
            self.drop_warned = true;
            log::warn!("event queue over capacity, dropping {priority:?}-priority events");
        }
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "EventQueue(high={}, normal={}, low={})",
            self.high.len(),
            self.normal.len(),
            self.low.len()
        )
    }
}

// ─── Dispatch Phases ─────────────────────────────────────────────────────────

/// Dispatch phase, delivered in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Root-to-target descent.
    Capture,
    /// At the target.
    Target,
    /// Target-to-root ascent.
    Bubble,
}

impl Phase {
    /// All phases in dispatch order.
    pub const ALL: [Self; 3] = [Self::Capture, Self::Target, Self::Bubble];
}

// ─── Dispatcher ──────────────────────────────────────────────────────────────

/// A handler callback. Receives the event mutably so it can latch
/// `stop_propagation` / `prevent_default`.
pub type Handler = Box<dyn FnMut(&mut Event)>;

struct HandlerEntry {
    id: u64,
    phase: Phase,
    /// Taken out while the callback runs so dispatch holds no registry
    /// borrow during user code.
    callback: Option<Handler>,
    removed: bool,
}

struct Registry {
    entries: Vec<HandlerEntry>,
    next_id: u64,
    dispatch_depth: u32,
}

impl Registry {
    fn remove(&mut self, id: u64) {
        if self.dispatch_depth > 0 {
            // Tombstone; the active dispatch compacts afterwards.
            if let Some(entry) = self.entries.iter_mut().find(|e| e.id == id) {
                entry.removed = true;
                entry.callback = None;
            }
        } else {
            self.entries.retain(|e| e.id != id);
        }
    }
}

/// Phased event dispatcher.
///
/// Handlers registered during a dispatch do not run for the event being
/// dispatched — each phase iterates a snapshot taken when the phase
/// starts.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Rc<RefCell<Registry>>,
}

/// Undoes one handler registration.
///
/// Safe to call at any time, including from inside a handler while its
/// event is being dispatched. Dropping a Disposer without calling
/// [`dispose`](Self::dispose) leaves the handler registered.
pub struct Disposer {
    registry: Weak<RefCell<Registry>>,
    id: u64,
}

impl Disposer {
    /// Remove the handler this disposer was returned for.
    pub fn dispose(self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.borrow_mut().remove(self.id);
        }
    }
}

impl Dispatcher {
    /// Create an empty dispatcher.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(Registry {
                entries: Vec::new(),
                next_id: 0,
                dispatch_depth: 0,
            })),
        }
    }

    /// Register a handler for one phase. Returns its disposer.
    pub fn on(&self, phase: Phase, handler: impl FnMut(&mut Event) + 'static) -> Disposer {
        let mut registry = self.inner.borrow_mut();
        let id = registry.next_id;
        registry.next_id += 1;
        registry.entries.push(HandlerEntry {
            id,
            phase,
            callback: Some(Box::new(handler)),
            removed: false,
        });
        Disposer {
            registry: Rc::downgrade(&self.inner),
            id,
        }
    }

    /// Number of live handlers.
    #[must_use]
    pub fn handler_count(&self) -> usize {
        self.inner.borrow().entries.iter().filter(|e| !e.removed).count()
    }

    /// Deliver one event through Capture, Target, and Bubble.
    ///
    /// `stop_propagation` latched during a phase lets that phase finish,
    /// then halts the remaining phases. `prevent_default` never alters
    /// dispatch flow.
    pub fn dispatch(&self, event: &mut Event) {
        // One snapshot for the whole dispatch: handlers registered while
        // this event is in flight wait for the next one.
        let snapshot: Vec<(Phase, u64)> = {
            let mut registry = self.inner.borrow_mut();
            registry.dispatch_depth += 1;
            registry
                .entries
                .iter()
                .filter(|e| !e.removed)
                .map(|e| (e.phase, e.id))
                .collect()
        };

        for phase in Phase::ALL {
            if event.propagation_stopped() {
                break;
            }
            self.dispatch_phase(phase, &snapshot, event);
        }

        let mut registry = self.inner.borrow_mut();
        registry.dispatch_depth -= 1;
        if registry.dispatch_depth == 0 {
            registry.entries.retain(|e| !e.removed);
        }
    }

    fn dispatch_phase(&self, phase: Phase, snapshot: &[(Phase, u64)], event: &mut Event) {
        for &(entry_phase, id) in snapshot {
            if entry_phase != phase {
                continue;
            }
            let callback = {
                let mut registry = self.inner.borrow_mut();
                registry
                    .entries
                    .iter_mut()
                    .find(|e| e.id == id && !e.removed)
                    .and_then(|e| e.callback.take())
            };

            let Some(mut callback) = callback else {
                continue;
            };
            // No registry borrow is held here, so the handler may freely
            // register or dispose handlers.
            callback(event);

            let mut registry = self.inner.borrow_mut();
            if let Some(entry) = registry.entries.iter_mut().find(|e| e.id == id) {
                if !entry.removed {
                    entry.callback = Some(callback);
                }
            }
        }
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Dispatcher({} handlers)", self.handler_count())
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::event::{
        EventKind, KeyCode, KeyEvent, KeyEventKind, Modifiers, MouseEvent, MouseEventKind,
    };

    fn key(ch: char) -> Event {
        Event::new(EventKind::Key(KeyEvent {
            code: KeyCode::Char(ch),
            modifiers: Modifiers::empty(),
            kind: KeyEventKind::Press,
        }))
    }

    fn mouse_move(x: u16) -> Event {
        Event::new(EventKind::Mouse(MouseEvent {
            kind: MouseEventKind::Move,
            x,
            y: 0,
            modifiers: Modifiers::empty(),
        }))
    }

    fn resize(cols: u16, rows: u16) -> Event {
        Event::new(EventKind::Resize { cols, rows })
    }

    // ── Queue — ordering ─────────────────────────────────────────────────

    #[test]
    fn priority_order_wins_over_arrival_order() {
        let mut queue = EventQueue::new();
        queue.enqueue(mouse_move(1));
        queue.enqueue(key('a'));
        queue.enqueue(resize(80, 24));

        assert!(matches!(queue.dequeue().unwrap().kind(), EventKind::Resize { .. }));
        assert!(matches!(queue.dequeue().unwrap().kind(), EventKind::Key(_)));
        assert!(matches!(queue.dequeue().unwrap().kind(), EventKind::Mouse(_)));
        assert!(queue.dequeue().is_none());
    }

    #[test]
    fn fifo_within_priority() {
        let mut queue = EventQueue::new();
        queue.enqueue(key('a'));
        queue.enqueue(key('b'));
        queue.enqueue(key('c'));

        let order: Vec<char> = std::iter::from_fn(|| queue.dequeue())
            .map(|e| match e.kind() {
                EventKind::Key(k) => match k.code {
                    KeyCode::Char(c) => c,
                    other => panic!("unexpected code {other:?}"),
                },
                other => panic!("unexpected kind {other:?}"),
            })
            .collect();
        assert_eq!(order, vec!['a', 'b', 'c']);
    }

    // ── Queue — backpressure ─────────────────────────────────────────────

    #[test]
    fn low_capacity_keeps_most_recent_motion() {
        // The runtime's contract scenario: queue capacity 3 for Low,
        // one resize plus five mouse moves — the resize survives and at
        // most the 3 most recent moves are delivered.
        let mut queue = EventQueue::with_config(QueueConfig {
            capacity: 1024,
            low_capacity: 3,
        });

        queue.enqueue(resize(80, 24));
        for x in 1..=5 {
            queue.enqueue(mouse_move(x));
        }

        assert!(matches!(queue.dequeue().unwrap().kind(), EventKind::Resize { .. }));

        let xs: Vec<u16> = std::iter::from_fn(|| queue.dequeue())
            .map(|e| match e.kind() {
                EventKind::Mouse(m) => m.x,
                other => panic!("unexpected kind {other:?}"),
            })
            .collect();
        assert_eq!(xs, vec![3, 4, 5], "only the most recent moves survive");
        assert_eq!(queue.stats().dropped_low, 2);
    }

    #[test]
    fn total_capacity_drops_low_before_normal() {
        let mut queue = EventQueue::with_config(QueueConfig {
            capacity: 4,
            low_capacity: 64,
        });
        queue.enqueue(mouse_move(1));
        queue.enqueue(key('a'));
        queue.enqueue(key('b'));
        queue.enqueue(key('c'));
        queue.enqueue(key('d')); // pushes total to 5 → oldest Low goes

        assert_eq!(queue.len(), 4);
        assert_eq!(queue.stats().dropped_low, 1);
        assert_eq!(queue.stats().dropped_normal, 0);
    }

    #[test]
    fn normal_dropped_when_no_low_left() {
        let mut queue = EventQueue::with_config(QueueConfig {
            capacity: 2,
            low_capacity: 64,
        });
        queue.enqueue(key('a'));
        queue.enqueue(key('b'));
        queue.enqueue(key('c'));

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.stats().dropped_normal, 1);
    }

    #[test]
    fn high_is_never_dropped() {
        let mut queue = EventQueue::with_config(QueueConfig {
            capacity: 2,
            low_capacity: 64,
        });
        for _ in 0..10 {
            queue.enqueue(resize(80, 24));
        }
        // The queue grows past capacity rather than lose a High event.
        assert_eq!(queue.len(), 10);
        assert_eq!(queue.stats().dropped_low, 0);
        assert_eq!(queue.stats().dropped_normal, 0);
    }

    #[test]
    fn clear_discards_everything() {
        let mut queue = EventQueue::new();
        queue.enqueue(key('a'));
        queue.enqueue(resize(80, 24));
        queue.clear();
        assert!(queue.is_empty());
        assert!(queue.dequeue().is_none());
    }

    // ── Dispatcher — phases ──────────────────────────────────────────────

    #[test]
    fn phases_run_in_order() {
        let dispatcher = Dispatcher::new();
        let order = Rc::new(RefCell::new(Vec::new()));

        for (phase, tag) in [(Phase::Capture, "c"), (Phase::Target, "t"), (Phase::Bubble, "b")] {
            let order = Rc::clone(&order);
            dispatcher.on(phase, move |_| order.borrow_mut().push(tag));
        }

        dispatcher.dispatch(&mut key('a'));
        assert_eq!(*order.borrow(), vec!["c", "t", "b"]);
    }

    #[test]
    fn handlers_within_phase_run_in_registration_order() {
        let dispatcher = Dispatcher::new();
        let order = Rc::new(RefCell::new(Vec::new()));
        for tag in [1, 2, 3] {
            let order = Rc::clone(&order);
            dispatcher.on(Phase::Target, move |_| order.borrow_mut().push(tag));
        }
        dispatcher.dispatch(&mut key('a'));
        assert_eq!(*order.borrow(), vec![1, 2, 3]);
    }

    #[test]
    fn stop_propagation_finishes_current_phase_then_halts() {
        let dispatcher = Dispatcher::new();
        let order = Rc::new(RefCell::new(Vec::new()));

        {
            let order = Rc::clone(&order);
            dispatcher.on(Phase::Capture, move |event| {
                order.borrow_mut().push("capture-1");
                event.stop_propagation();
            });
        }
        {
            let order = Rc::clone(&order);
            dispatcher.on(Phase::Capture, move |_| {
                order.borrow_mut().push("capture-2");
            });
        }
        {
            let order = Rc::clone(&order);
            dispatcher.on(Phase::Target, move |_| {
                order.borrow_mut().push("target");
            });
        }

        dispatcher.dispatch(&mut key('a'));
        // The second capture handler still runs; Target and Bubble do not.
        assert_eq!(*order.borrow(), vec!["capture-1", "capture-2"]);
    }

    #[test]
    fn prevent_default_does_not_alter_dispatch() {
        let dispatcher = Dispatcher::new();
        let count = Rc::new(RefCell::new(0));

        {
            let count = Rc::clone(&count);
            dispatcher.on(Phase::Capture, move |event| {
                *count.borrow_mut() += 1;
                event.prevent_default();
            });
        }
        {
            let count = Rc::clone(&count);
            dispatcher.on(Phase::Bubble, move |_| {
                *count.borrow_mut() += 1;
            });
        }

        let mut event = key('a');
        dispatcher.dispatch(&mut event);
        assert_eq!(*count.borrow(), 2);
        assert!(event.default_prevented());
    }

    // ── Dispatcher — disposers ───────────────────────────────────────────

    #[test]
    fn disposed_handler_no_longer_runs() {
        let dispatcher = Dispatcher::new();
        let count = Rc::new(RefCell::new(0));

        let disposer = {
            let count = Rc::clone(&count);
            dispatcher.on(Phase::Target, move |_| *count.borrow_mut() += 1)
        };

        dispatcher.dispatch(&mut key('a'));
        disposer.dispose();
        dispatcher.dispatch(&mut key('b'));

        assert_eq!(*count.borrow(), 1);
        assert_eq!(dispatcher.handler_count(), 0);
    }

    #[test]
    fn dispose_during_dispatch_is_safe() {
        let dispatcher = Dispatcher::new();
        let count = Rc::new(RefCell::new(0));

        // The first handler disposes the second mid-dispatch.
        let second = {
            let count = Rc::clone(&count);
            dispatcher.on(Phase::Target, move |_| *count.borrow_mut() += 10)
        };
        let slot: Rc<RefCell<Option<Disposer>>> = Rc::new(RefCell::new(None));

        {
            let slot = Rc::clone(&slot);
            let count = Rc::clone(&count);
            let first = dispatcher.on(Phase::Capture, move |_| {
                *count.borrow_mut() += 1;
                if let Some(d) = slot.borrow_mut().take() {
                    d.dispose();
                }
            });
            // first runs before second (Capture before Target).
            drop(first);
        }
        *slot.borrow_mut() = Some(second);

        dispatcher.dispatch(&mut key('a'));

        // The disposed Target handler never ran.
        assert_eq!(*count.borrow(), 1);
        assert_eq!(dispatcher.handler_count(), 1);
    }

    #[test]
    fn handler_can_dispose_itself_while_running() {
        let dispatcher = Dispatcher::new();
        let count = Rc::new(RefCell::new(0));
        let slot: Rc<RefCell<Option<Disposer>>> = Rc::new(RefCell::new(None));

        let disposer = {
            let slot = Rc::clone(&slot);
            let count = Rc::clone(&count);
            dispatcher.on(Phase::Target, move |_| {
                *count.borrow_mut() += 1;
                if let Some(d) = slot.borrow_mut().take() {
                    d.dispose();
                }
            })
        };
        *slot.borrow_mut() = Some(disposer);

        dispatcher.dispatch(&mut key('a'));
        dispatcher.dispatch(&mut key('b'));

        assert_eq!(*count.borrow(), 1, "self-disposed handler runs once");
        assert_eq!(dispatcher.handler_count(), 0);
    }

    #[test]
    fn handler_registered_during_dispatch_skips_current_event() {
        let dispatcher = Dispatcher::new();
        let count = Rc::new(RefCell::new(0));

        {
            let dispatcher2 = dispatcher.clone();
            let count = Rc::clone(&count);
            dispatcher.on(Phase::Capture, move |_| {
                let count = Rc::clone(&count);
                // Registers for a phase that has not run yet.
                let _keep = dispatcher2.on(Phase::Bubble, move |_| *count.borrow_mut() += 1);
            });
        }

        dispatcher.dispatch(&mut key('a'));
        assert_eq!(*count.borrow(), 0, "snapshot excludes late registration");

        dispatcher.dispatch(&mut key('b'));
        assert_eq!(*count.borrow(), 1, "late registration runs next dispatch");
    }

    #[test]
    fn dispose_after_dispatcher_dropped_is_harmless() {
        let dispatcher = Dispatcher::new();
        let disposer = dispatcher.on(Phase::Target, |_| {});
        drop(dispatcher);
        disposer.dispose(); // Weak upgrade fails; nothing to do.
    }
}
