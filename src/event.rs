// SPDX-License-Identifier: MIT
//
// Event taxonomy — everything that flows through the queue.
//
// An Event is a tagged-union kind wrapped in a small envelope: a
// dispatch priority fixed at construction, plus two one-way latches for
// the dispatcher (`stop_propagation`, `prevent_default`). The kind
// discriminant never changes after construction — both envelope fields
// and the kind are private behind accessors to keep that invariant
// structural rather than conventional.
//
// Events are created by the input parser or the signal pump, queued,
// dispatched exactly once, and discarded.

use bitflags::bitflags;

// ─── Priority ────────────────────────────────────────────────────────────────

/// Dispatch priority. Lower value dispatches first.
///
/// The derived `Ord` follows declaration order, so
/// `Priority::High < Priority::Normal < Priority::Low`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Priority {
    /// Signals and resizes — never starved, never dropped.
    High = 0,
    /// Keys, pastes, focus changes, button presses.
    Normal = 1,
    /// Floods: mouse movement, idle ticks. First to be dropped under
    /// backpressure.
    Low = 2,
}

// ─── Key Events ──────────────────────────────────────────────────────────────

/// A keyboard event with key identity, modifiers, and press state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    /// Which key was pressed.
    pub code: KeyCode,
    /// Active modifier keys.
    pub modifiers: Modifiers,
    /// Press, repeat, or release (Kitty keyboard protocol).
    pub kind: KeyEventKind,
}

/// Key press / repeat / release distinction.
///
/// Terminals speaking the Kitty keyboard protocol report all three;
/// legacy terminals report everything as [`Press`](KeyEventKind::Press).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyEventKind {
    /// Initial key press (or legacy mode where state is unknown).
    #[default]
    Press,
    /// Key held down long enough to trigger auto-repeat.
    Repeat,
    /// Key released.
    Release,
}

/// Identity of a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyCode {
    /// A Unicode character (printable).
    Char(char),
    // ── Named keys ──────────────────────────────────────────────
    Enter,
    Tab,
    Backspace,
    Escape,
    Delete,
    Insert,
    // ── Navigation ──────────────────────────────────────────────
    Up,
    Down,
    Left,
    Right,
    Home,
    End,
    PageUp,
    PageDown,
    // ── Function keys ───────────────────────────────────────────
    /// F1 through F35.
    F(u8),
}

bitflags! {
    /// Keyboard modifier flags.
    ///
    /// Matches the Kitty keyboard protocol bitmask (also compatible
    /// with xterm CSI modifier encoding where `param = 1 + bitmask`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
    pub struct Modifiers: u8 {
        const SHIFT = 0b0000_0001;
        const ALT   = 0b0000_0010;
        const CTRL  = 0b0000_0100;
        const SUPER = 0b0000_1000;
    }
}

// ─── Mouse Events ────────────────────────────────────────────────────────────

/// A mouse event with action, position, and modifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MouseEvent {
    /// What happened.
    pub kind: MouseEventKind,
    /// 0-indexed column.
    pub x: u16,
    /// 0-indexed row.
    pub y: u16,
    /// Active modifier keys during the mouse event.
    pub modifiers: Modifiers,
}

/// Mouse event classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseEventKind {
    /// Button pressed.
    Press(MouseButton),
    /// Button released.
    Release(MouseButton),
    /// Mouse moved while a button is held.
    Drag(MouseButton),
    /// Mouse moved without any button held.
    Move,
    /// Scroll wheel up.
    ScrollUp,
    /// Scroll wheel down.
    ScrollDown,
}

impl MouseEventKind {
    /// Whether this is a motion event (the flood-prone kind).
    #[must_use]
    pub const fn is_motion(self) -> bool {
        matches!(self, Self::Move | Self::Drag(_))
    }
}

/// Mouse button identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Middle,
    Right,
}

// ─── Signals ─────────────────────────────────────────────────────────────────

/// Process signal folded into the event stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    /// SIGINT (Ctrl-C from the controlling terminal).
    Interrupt,
    /// SIGTERM.
    Terminate,
    /// SIGHUP (controlling terminal closed).
    Hangup,
    /// SIGWINCH (terminal window resized).
    WindowChange,
}

// ─── Event ───────────────────────────────────────────────────────────────────

/// The tagged-union payload of an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    /// A keyboard event.
    Key(KeyEvent),
    /// A mouse event.
    Mouse(MouseEvent),
    /// The terminal was resized to `cols × rows`.
    Resize { cols: u16, rows: u16 },
    /// Terminal window gained focus (`CSI I`).
    FocusGained,
    /// Terminal window lost focus (`CSI O`).
    FocusLost,
    /// Bracketed paste content, delivered as one event.
    Paste(String),
    /// A process signal.
    Signal(SignalKind),
    /// The queue drained; idle callbacks are about to run.
    Idle,
    /// Application-defined event.
    Custom { name: String, payload: String },
}

impl EventKind {
    /// The priority an event of this kind is created with.
    ///
    /// Signals and resizes are High so a flood of mouse movement can
    /// never starve them; motion and idle are Low so they are the first
    /// dropped under backpressure.
    #[must_use]
    pub const fn default_priority(&self) -> Priority {
        match self {
            Self::Signal(_) | Self::Resize { .. } => Priority::High,
            Self::Idle => Priority::Low,
            Self::Mouse(m) => {
                if m.kind.is_motion() {
                    Priority::Low
                } else {
                    Priority::Normal
                }
            }
            _ => Priority::Normal,
        }
    }
}

/// An event: kind plus dispatch envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    kind: EventKind,
    priority: Priority,
    propagation_stopped: bool,
    default_prevented: bool,
}

impl Event {
    /// Create an event with the kind's default priority.
    #[must_use]
    pub const fn new(kind: EventKind) -> Self {
        let priority = kind.default_priority();
        Self {
            kind,
            priority,
            propagation_stopped: false,
            default_prevented: false,
        }
    }

    /// The payload. The discriminant never changes after construction.
    #[inline]
    #[must_use]
    pub const fn kind(&self) -> &EventKind {
        &self.kind
    }

    /// Dispatch priority, fixed at creation.
    #[inline]
    #[must_use]
    pub const fn priority(&self) -> Priority {
        self.priority
    }

    /// Stop the remaining dispatch phases for this event.
    ///
    /// A one-way latch: once set it is never reset.
    #[inline]
    pub const fn stop_propagation(&mut self) {
        self.propagation_stopped = true;
    }

    /// Whether propagation has been stopped.
    #[inline]
    #[must_use]
    pub const fn propagation_stopped(&self) -> bool {
        self.propagation_stopped
    }

    /// Mark the event's default action as prevented.
    ///
    /// Purely advisory: consumers check it, the dispatcher does not
    /// alter control flow on it. A one-way latch like
    /// [`stop_propagation`](Self::stop_propagation).
    #[inline]
    pub const fn prevent_default(&mut self) {
        self.default_prevented = true;
    }

    /// Whether the default action has been prevented.
    #[inline]
    #[must_use]
    pub const fn default_prevented(&self) -> bool {
        self.default_prevented
    }
}

impl From<EventKind> for Event {
    fn from(kind: EventKind) -> Self {
        Self::new(kind)
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn mouse_move(x: u16, y: u16) -> EventKind {
        EventKind::Mouse(MouseEvent {
            kind: MouseEventKind::Move,
            x,
            y,
            modifiers: Modifiers::empty(),
        })
    }

    fn key(ch: char) -> EventKind {
        EventKind::Key(KeyEvent {
            code: KeyCode::Char(ch),
            modifiers: Modifiers::empty(),
            kind: KeyEventKind::Press,
        })
    }

    // ── Priority ordering ────────────────────────────────────────────────

    #[test]
    fn priority_orders_high_first() {
        assert!(Priority::High < Priority::Normal);
        assert!(Priority::Normal < Priority::Low);
    }

    // ── Default priorities ───────────────────────────────────────────────

    #[test]
    fn signals_and_resize_are_high() {
        assert_eq!(
            EventKind::Signal(SignalKind::WindowChange).default_priority(),
            Priority::High
        );
        assert_eq!(
            EventKind::Resize { cols: 80, rows: 24 }.default_priority(),
            Priority::High
        );
    }

    #[test]
    fn mouse_motion_and_idle_are_low() {
        assert_eq!(mouse_move(1, 1).default_priority(), Priority::Low);
        assert_eq!(EventKind::Idle.default_priority(), Priority::Low);
        let drag = EventKind::Mouse(MouseEvent {
            kind: MouseEventKind::Drag(MouseButton::Left),
            x: 0,
            y: 0,
            modifiers: Modifiers::empty(),
        });
        assert_eq!(drag.default_priority(), Priority::Low);
    }

    #[test]
    fn keys_presses_and_pastes_are_normal() {
        assert_eq!(key('a').default_priority(), Priority::Normal);
        assert_eq!(
            EventKind::Paste("text".into()).default_priority(),
            Priority::Normal
        );
        let press = EventKind::Mouse(MouseEvent {
            kind: MouseEventKind::Press(MouseButton::Left),
            x: 0,
            y: 0,
            modifiers: Modifiers::empty(),
        });
        assert_eq!(press.default_priority(), Priority::Normal);
    }

    // ── Envelope latches ─────────────────────────────────────────────────

    #[test]
    fn new_event_has_clean_latches() {
        let event = Event::new(key('a'));
        assert!(!event.propagation_stopped());
        assert!(!event.default_prevented());
        assert_eq!(event.priority(), Priority::Normal);
    }

    #[test]
    fn stop_propagation_latches() {
        let mut event = Event::new(key('a'));
        event.stop_propagation();
        assert!(event.propagation_stopped());
        // Setting again is a no-op, never a reset.
        event.stop_propagation();
        assert!(event.propagation_stopped());
    }

    #[test]
    fn prevent_default_latches_independently() {
        let mut event = Event::new(key('a'));
        event.prevent_default();
        assert!(event.default_prevented());
        assert!(!event.propagation_stopped());
    }

    #[test]
    fn kind_is_stable() {
        let event = Event::new(EventKind::FocusGained);
        assert_eq!(event.kind(), &EventKind::FocusGained);
    }

    #[test]
    fn from_kind_uses_default_priority() {
        let event: Event = EventKind::Idle.into();
        assert_eq!(event.priority(), Priority::Low);
    }

    #[test]
    fn custom_event_carries_payload() {
        let event = Event::new(EventKind::Custom {
            name: "refresh".into(),
            payload: "{}".into(),
        });
        match event.kind() {
            EventKind::Custom { name, payload } => {
                assert_eq!(name, "refresh");
                assert_eq!(payload, "{}");
            }
            other => panic!("unexpected kind: {other:?}"),
        }
    }
}
