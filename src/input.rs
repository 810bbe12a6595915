// SPDX-License-Identifier: MIT
//
// Terminal input parser.
//
// Turns raw stdin bytes into structured events: keys, mouse actions,
// paste content, and focus changes. Handles every protocol the session
// manager can enable:
//
// - Legacy CSI sequences (arrows, function keys, editing keys)
// - SS3 sequences (F1-F4 alternate encoding from some terminals)
// - Mouse reporting in the protocol negotiated at detection time —
//   SGR, legacy X10 bytes, or the UTF-8 coordinate extension; the
//   three differ in coordinate and byte layout, so the parser branches
//   on the protocol it was constructed with
// - Kitty keyboard protocol (unambiguous codepoints + modifiers)
// - Bracketed paste (accumulates pasted text between delimiters)
// - Focus reporting (terminal gained / lost focus)
// - Alt+key (ESC followed by printable character)
// - UTF-8 multi-byte characters
//
// # Design
//
// The parser maintains a small internal byte buffer because escape
// sequences can span multiple `read()` calls: an incomplete sequence is
// buffered, never dropped or mis-parsed as literal characters, so
// feeding a byte stream in one chunk or split at any boundary yields
// the same events. Unrecognized or garbled sequences are discarded with
// a debug log and no event — malformed input must never take the loop
// down.
//
// After a timeout with no new bytes, call [`Parser::flush`] to resolve
// the lone-ESC ambiguity (Escape key vs. start of a sequence).

use crate::caps::MouseProtocol;
use crate::event::{
    Event, EventKind, KeyCode, KeyEvent, KeyEventKind, Modifiers, MouseButton, MouseEvent,
    MouseEventKind,
};

/// Bracketed paste opening delimiter: `ESC [ 200 ~`
const PASTE_START: &[u8] = b"\x1b[200~";
/// Bracketed paste closing delimiter: `ESC [ 201 ~`
const PASTE_END: &[u8] = b"\x1b[201~";

// ─── Parser ─────────────────────────────────────────────────────────────────

/// Incremental terminal input parser.
///
/// Feed raw bytes via [`advance`](Parser::advance) and collect
/// [`Event`]s. State (partial escape sequences, an open paste) persists
/// across calls.
///
/// ```
/// use emberterm::caps::MouseProtocol;
/// use emberterm::input::Parser;
///
/// let mut parser = Parser::new(MouseProtocol::Sgr);
/// let events = parser.advance(b"hi");
/// assert_eq!(events.len(), 2);
/// ```
pub struct Parser {
    /// Accumulated raw bytes waiting to be parsed.
    buf: Vec<u8>,
    /// Inside a bracketed paste, accumulating until the terminator.
    in_paste: bool,
    /// Mouse encoding to decode, from the capability snapshot.
    mouse: MouseProtocol,
}

impl Parser {
    /// Create a parser decoding mouse input per the given protocol.
    #[must_use]
    pub fn new(mouse: MouseProtocol) -> Self {
        Self {
            buf: Vec::with_capacity(64),
            in_paste: false,
            mouse,
        }
    }

    /// Feed raw bytes and return all events that can be parsed.
    ///
    /// Bytes forming an incomplete sequence stay buffered and combine
    /// with future calls. Call [`flush`](Parser::flush) after a timeout
    /// to emit any pending lone ESC.
    pub fn advance(&mut self, data: &[u8]) -> Vec<Event> {
        self.buf.extend_from_slice(data);
        let mut events = Vec::new();
        let mut pos = 0;

        while pos < self.buf.len() {
            // ── Paste mode: scan for the closing delimiter ──────────
            if self.in_paste {
                let remaining = &self.buf[pos..];
                if let Some(end_offset) = find_subsequence(remaining, PASTE_END) {
                    let text = String::from_utf8_lossy(&remaining[..end_offset]).into_owned();
                    events.push(Event::new(EventKind::Paste(text)));
                    pos += end_offset + PASTE_END.len();
                    self.in_paste = false;
                } else {
                    // Terminator not here yet — keep everything pending.
                    break;
                }
                continue;
            }

            // ── Paste start: checked before general CSI parsing ─────
            let remaining = &self.buf[pos..];
            if remaining.len() >= PASTE_START.len() && remaining[..PASTE_START.len()] == *PASTE_START
            {
                self.in_paste = true;
                pos += PASTE_START.len();
                continue;
            }
            // A strict prefix of the paste opener: wait for more bytes
            // before deciding (it could still become a different CSI).
            if remaining.len() < PASTE_START.len()
                && PASTE_START.starts_with(remaining)
                && remaining.starts_with(b"\x1b[")
            {
                break;
            }

            // ── Normal parsing ──────────────────────────────────────
            match try_parse(&self.buf, pos, self.mouse) {
                Parsed::Event(event, consumed) => {
                    events.push(event);
                    pos += consumed;
                }
                Parsed::Incomplete => break,
                Parsed::Skip(n) => {
                    if self.buf[pos] == 0x1B {
                        log::debug!("discarding {n} bytes of unrecognized escape sequence");
                    }
                    pos += n.max(1);
                }
            }
        }

        if pos > 0 {
            self.buf.drain(..pos);
        }

        events
    }

    /// Are there unconsumed bytes that might complete with more data?
    #[must_use]
    pub fn has_pending(&self) -> bool {
        !self.buf.is_empty()
    }

    /// Flush pending bytes as literal key events.
    ///
    /// Called after a timeout to resolve the ESC ambiguity: a lone ESC
    /// becomes an Escape keypress, other leftover bytes become their
    /// literal keys.
    pub fn flush(&mut self) -> Vec<Event> {
        let mut events = Vec::new();
        for &byte in &self.buf {
            let code = match byte {
                0x1B => KeyCode::Escape,
                0x00 => KeyCode::Char('@'),
                b @ 0x01..=0x1A => KeyCode::Char((b + b'a' - 1) as char),
                0x7F => KeyCode::Backspace,
                b @ 0x20..=0x7E => KeyCode::Char(b as char),
                _ => continue,
            };
            let modifiers = match byte {
                0x00..=0x1A => Modifiers::CTRL,
                _ => Modifiers::empty(),
            };
            events.push(Event::new(EventKind::Key(KeyEvent {
                code,
                modifiers,
                kind: KeyEventKind::Press,
            })));
        }
        self.buf.clear();
        events
    }
}

// ─── Stateless Parsing Functions ────────────────────────────────────────────
//
// All parse functions are pure: they read from `buf[pos..]` and report
// what they found plus how many bytes to consume.

/// Result of trying to parse one event from the buffer.
enum Parsed {
    /// Successfully parsed an event, consuming `usize` bytes.
    Event(Event, usize),
    /// Sequence is incomplete — need more bytes.
    Incomplete,
    /// Unrecognized byte(s), skip `usize` bytes.
    Skip(usize),
}

fn try_parse(buf: &[u8], pos: usize, mouse: MouseProtocol) -> Parsed {
    let remaining = &buf[pos..];
    if remaining.is_empty() {
        return Parsed::Skip(0);
    }

    match remaining[0] {
        // ESC — escape sequence or standalone Escape key.
        0x1B => parse_escape(remaining, mouse),
        // Control characters.
        0x00 => Parsed::Event(ctrl_key(KeyCode::Char('@')), 1),
        b @ (0x01..=0x07 | 0x0B..=0x0C | 0x0E..=0x1A) => {
            Parsed::Event(ctrl_key(KeyCode::Char((b + b'a' - 1) as char)), 1)
        }
        0x08 | 0x7F => Parsed::Event(press(KeyCode::Backspace), 1),
        0x09 => Parsed::Event(press(KeyCode::Tab), 1),
        0x0A | 0x0D => Parsed::Event(press(KeyCode::Enter), 1),
        // ASCII printable.
        b @ 0x20..=0x7E => Parsed::Event(press(KeyCode::Char(b as char)), 1),
        // UTF-8 multi-byte.
        0xC0..=0xFF => parse_utf8(remaining),
        // Bare continuation bytes — invalid lead, skip.
        _ => Parsed::Skip(1),
    }
}

// ── Escape sequences ────────────────────────────────────────────────────────

fn parse_escape(buf: &[u8], mouse: MouseProtocol) -> Parsed {
    debug_assert_eq!(buf[0], 0x1B);

    if buf.len() < 2 {
        return Parsed::Incomplete;
    }

    match buf[1] {
        // CSI: ESC [
        b'[' => parse_csi(buf, mouse),
        // SS3: ESC O
        b'O' => parse_ss3(buf),
        // Alt+ESC.
        0x1B => Parsed::Event(key_with(KeyCode::Escape, Modifiers::ALT), 2),
        // Alt+printable character.
        b @ 0x20..=0x7E => Parsed::Event(key_with(KeyCode::Char(b as char), Modifiers::ALT), 2),
        // Alt+control character.
        b @ 0x01..=0x1A => Parsed::Event(
            key_with(
                KeyCode::Char((b + b'a' - 1) as char),
                Modifiers::ALT | Modifiers::CTRL,
            ),
            2,
        ),
        // Unknown byte after ESC — emit standalone Escape.
        _ => Parsed::Event(press(KeyCode::Escape), 1),
    }
}

// ── CSI (Control Sequence Introducer) ───────────────────────────────────────

fn parse_csi(buf: &[u8], mouse: MouseProtocol) -> Parsed {
    debug_assert!(buf.len() >= 2 && buf[0] == 0x1B && buf[1] == b'[');

    if buf.len() < 3 {
        return Parsed::Incomplete;
    }

    // SGR mouse: ESC [ <
    if buf[2] == b'<' {
        return parse_sgr_mouse(buf);
    }

    // Legacy mouse frame: ESC [ M, coordinate layout per protocol.
    if buf[2] == b'M' {
        return match mouse {
            MouseProtocol::Utf8 => parse_utf8_mouse(buf),
            _ => parse_x10_mouse(buf),
        };
    }

    // Focus reporting: ESC [ I (gained) / ESC [ O (lost).
    if buf[2] == b'I' {
        return Parsed::Event(Event::new(EventKind::FocusGained), 3);
    }
    if buf[2] == b'O' {
        return Parsed::Event(Event::new(EventKind::FocusLost), 3);
    }

    // Scan for the final byte (0x40..=0x7E). Parameter bytes are
    // 0x30..=0x3F, intermediate 0x20..=0x2F.
    let mut end = 2;
    while end < buf.len() {
        let b = buf[end];
        if (0x40..=0x7E).contains(&b) {
            break;
        }
        if !(0x20..=0x3F).contains(&b) {
            // Invalid byte inside a CSI sequence — abort it.
            return Parsed::Skip(end + 1);
        }
        end += 1;
    }

    if end >= buf.len() {
        return Parsed::Incomplete;
    }

    let final_byte = buf[end];
    let params_raw = &buf[2..end];
    let consumed = end + 1;

    // ── Tilde-terminated sequences (editing keys, function keys) ─────
    if final_byte == b'~' {
        let params = parse_csi_params(params_raw);
        let first = params.first().map_or(0, |p| p.0);
        let modifiers = params
            .get(1)
            .map_or(Modifiers::empty(), |p| decode_modifiers(p.0));

        let code = match first {
            1 | 7 => KeyCode::Home,
            2 => KeyCode::Insert,
            3 => KeyCode::Delete,
            4 | 8 => KeyCode::End,
            5 => KeyCode::PageUp,
            6 => KeyCode::PageDown,
            15 => KeyCode::F(5),
            17 => KeyCode::F(6),
            18 => KeyCode::F(7),
            19 => KeyCode::F(8),
            20 => KeyCode::F(9),
            21 => KeyCode::F(10),
            23 => KeyCode::F(11),
            24 => KeyCode::F(12),
            25 => KeyCode::F(13),
            26 => KeyCode::F(14),
            28 => KeyCode::F(15),
            29 => KeyCode::F(16),
            31 => KeyCode::F(17),
            32 => KeyCode::F(18),
            33 => KeyCode::F(19),
            34 => KeyCode::F(20),
            _ => return Parsed::Skip(consumed),
        };
        return Parsed::Event(key_with(code, modifiers), consumed);
    }

    // ── Kitty keyboard: CSI codepoint [; modifiers[:event_type]] u ───
    if final_byte == b'u' {
        return parse_kitty_key(params_raw, consumed);
    }

    // ── Standard CSI sequences with letter final bytes ──────────────
    let params = parse_csi_params(params_raw);
    let modifiers = params
        .get(1)
        .map_or(Modifiers::empty(), |p| decode_modifiers(p.0));

    let event = match final_byte {
        b'A' => key_with(KeyCode::Up, modifiers),
        b'B' => key_with(KeyCode::Down, modifiers),
        b'C' => key_with(KeyCode::Right, modifiers),
        b'D' => key_with(KeyCode::Left, modifiers),
        b'H' => key_with(KeyCode::Home, modifiers),
        b'F' => key_with(KeyCode::End, modifiers),
        b'P' => key_with(KeyCode::F(1), modifiers),
        b'Q' => key_with(KeyCode::F(2), modifiers),
        b'R' => key_with(KeyCode::F(3), modifiers),
        b'S' => key_with(KeyCode::F(4), modifiers),
        b'Z' => key_with(KeyCode::Tab, Modifiers::SHIFT),
        _ => return Parsed::Skip(consumed),
    };

    Parsed::Event(event, consumed)
}

// ── SS3 (Single Shift 3) ───────────────────────────────────────────────────

fn parse_ss3(buf: &[u8]) -> Parsed {
    debug_assert!(buf.len() >= 2 && buf[0] == 0x1B && buf[1] == b'O');

    if buf.len() < 3 {
        return Parsed::Incomplete;
    }

    let code = match buf[2] {
        b'A' => KeyCode::Up,
        b'B' => KeyCode::Down,
        b'C' => KeyCode::Right,
        b'D' => KeyCode::Left,
        b'H' => KeyCode::Home,
        b'F' => KeyCode::End,
        b'P' => KeyCode::F(1),
        b'Q' => KeyCode::F(2),
        b'R' => KeyCode::F(3),
        b'S' => KeyCode::F(4),
        _ => return Parsed::Skip(3),
    };

    Parsed::Event(press(code), 3)
}

// ── SGR Mouse Protocol ─────────────────────────────────────────────────────

fn parse_sgr_mouse(buf: &[u8]) -> Parsed {
    // Format: ESC [ < Pb ; Px ; Py M    (press/motion)
    //         ESC [ < Pb ; Px ; Py m    (release)
    debug_assert!(buf.len() >= 3 && buf[2] == b'<');

    let start = 3;
    let mut end = start;
    while end < buf.len() {
        if buf[end] == b'M' || buf[end] == b'm' {
            break;
        }
        if !buf[end].is_ascii_digit() && buf[end] != b';' {
            return Parsed::Skip(end + 1);
        }
        end += 1;
    }

    if end >= buf.len() {
        return Parsed::Incomplete;
    }

    let is_release = buf[end] == b'm';
    let consumed = end + 1;

    // Three semicolon-separated numbers: button_flags ; x ; y
    let params = &buf[start..end];
    let (cb, rest) = parse_u16_from(params);
    let rest = skip_byte(rest, b';');
    let (raw_x, rest) = parse_u16_from(rest);
    let rest = skip_byte(rest, b';');
    let (raw_y, _) = parse_u16_from(rest);

    // SGR coordinates are 1-indexed.
    let x = raw_x.saturating_sub(1);
    let y = raw_y.saturating_sub(1);

    Parsed::Event(mouse_event(cb, x, y, is_release), consumed)
}

// ── X10 / UTF-8 Mouse Protocols ────────────────────────────────────────────

fn parse_x10_mouse(buf: &[u8]) -> Parsed {
    // Format: ESC [ M Cb Cx Cy — three raw bytes offset by 32, with
    // coordinates additionally offset by 1 (so 33 total). Coordinates
    // cap at 223 (255 - 32); larger terminals need SGR.
    if buf.len() < 6 {
        return Parsed::Incomplete;
    }

    let cb = u16::from(buf[3].wrapping_sub(32));
    let x = u16::from(buf[4].wrapping_sub(33));
    let y = u16::from(buf[5].wrapping_sub(33));

    // X10 reports release as button 3 in the low bits.
    let is_release = cb & 3 == 3 && cb & 64 == 0;
    Parsed::Event(mouse_event(cb, x, y, is_release), 6)
}

fn parse_utf8_mouse(buf: &[u8]) -> Parsed {
    // DEC 1005: X10 framing, but Cx/Cy are UTF-8 encoded codepoints so
    // coordinates can exceed 223. The button byte stays single-byte.
    if buf.len() < 4 {
        return Parsed::Incomplete;
    }

    let cb = u16::from(buf[3].wrapping_sub(32));

    let Some((raw_x, x_len)) = decode_utf8_coord(&buf[4..]) else {
        return Parsed::Incomplete;
    };
    let Some((raw_y, y_len)) = decode_utf8_coord(&buf[4 + x_len..]) else {
        return Parsed::Incomplete;
    };

    let x = raw_x.saturating_sub(33);
    let y = raw_y.saturating_sub(33);
    let consumed = 4 + x_len + y_len;

    let is_release = cb & 3 == 3 && cb & 64 == 0;
    Parsed::Event(mouse_event(cb, x, y, is_release), consumed)
}

/// Decode one UTF-8 coordinate (1 or 2 bytes in this protocol).
/// Returns the value and byte length, or `None` when incomplete.
fn decode_utf8_coord(buf: &[u8]) -> Option<(u16, usize)> {
    let first = *buf.first()?;
    if first < 0x80 {
        return Some((u16::from(first), 1));
    }
    // Two-byte form: 110xxxxx 10xxxxxx.
    let second = *buf.get(1)?;
    if first & 0xE0 == 0xC0 && second & 0xC0 == 0x80 {
        let value = (u16::from(first & 0x1F) << 6) | u16::from(second & 0x3F);
        Some((value, 2))
    } else {
        // Garbled coordinate; treat the lead byte as the value to keep
        // the stream moving.
        Some((u16::from(first), 1))
    }
}

/// Build a mouse event from shared button-byte semantics.
///
/// The modifier and action bits are identical across all three
/// protocols; only the coordinate encoding differs.
fn mouse_event(cb: u16, x: u16, y: u16, is_release: bool) -> Event {
    let mut modifiers = Modifiers::empty();
    if cb & 4 != 0 {
        modifiers |= Modifiers::SHIFT;
    }
    if cb & 8 != 0 {
        modifiers |= Modifiers::ALT;
    }
    if cb & 16 != 0 {
        modifiers |= Modifiers::CTRL;
    }

    let is_scroll = cb & 64 != 0;
    let is_motion = cb & 32 != 0;
    let base = cb & 3;

    let kind = if is_scroll {
        if base == 0 {
            MouseEventKind::ScrollUp
        } else {
            MouseEventKind::ScrollDown
        }
    } else if is_motion {
        match base {
            0 => MouseEventKind::Drag(MouseButton::Left),
            1 => MouseEventKind::Drag(MouseButton::Middle),
            2 => MouseEventKind::Drag(MouseButton::Right),
            _ => MouseEventKind::Move,
        }
    } else if is_release {
        // X10 reports release with base 3 and no button identity; SGR
        // carries the real button.
        let button = if base == 3 {
            MouseButton::Left
        } else {
            decode_mouse_button(base)
        };
        MouseEventKind::Release(button)
    } else {
        MouseEventKind::Press(decode_mouse_button(base))
    };

    Event::new(EventKind::Mouse(MouseEvent { kind, x, y, modifiers }))
}

// ── Kitty Keyboard Protocol ────────────────────────────────────────────────

fn parse_kitty_key(params_raw: &[u8], consumed: usize) -> Parsed {
    // Format: CSI codepoint [; modifiers[:event_type]] u
    let params = parse_csi_params(params_raw);

    let codepoint = params.first().map_or(0, |p| p.0);
    let (modifier_val, event_type) = params.get(1).map_or((0, 0), |p| (p.0, p.1));

    let modifiers = if modifier_val > 0 {
        decode_modifiers(modifier_val)
    } else {
        Modifiers::empty()
    };

    let kind = match event_type {
        2 => KeyEventKind::Repeat,
        3 => KeyEventKind::Release,
        _ => KeyEventKind::Press,
    };

    let Some(code) = kitty_codepoint_to_keycode(codepoint) else {
        return Parsed::Skip(consumed);
    };

    Parsed::Event(
        Event::new(EventKind::Key(KeyEvent { code, modifiers, kind })),
        consumed,
    )
}

// ── UTF-8 ──────────────────────────────────────────────────────────────────

fn parse_utf8(buf: &[u8]) -> Parsed {
    let expected = utf8_char_len(buf[0]);

    if expected == 0 {
        return Parsed::Skip(1);
    }
    if buf.len() < expected {
        return Parsed::Incomplete;
    }

    for &b in &buf[1..expected] {
        if b & 0xC0 != 0x80 {
            return Parsed::Skip(1);
        }
    }

    std::str::from_utf8(&buf[..expected]).map_or(Parsed::Skip(1), |s| {
        s.chars().next().map_or(Parsed::Skip(expected), |ch| {
            Parsed::Event(press(KeyCode::Char(ch)), expected)
        })
    })
}

// ─── Helpers ────────────────────────────────────────────────────────────────

const fn press(code: KeyCode) -> Event {
    Event::new(EventKind::Key(KeyEvent {
        code,
        modifiers: Modifiers::empty(),
        kind: KeyEventKind::Press,
    }))
}

const fn ctrl_key(code: KeyCode) -> Event {
    Event::new(EventKind::Key(KeyEvent {
        code,
        modifiers: Modifiers::CTRL,
        kind: KeyEventKind::Press,
    }))
}

const fn key_with(code: KeyCode, modifiers: Modifiers) -> Event {
    Event::new(EventKind::Key(KeyEvent {
        code,
        modifiers,
        kind: KeyEventKind::Press,
    }))
}

/// CSI parameter: `(main_value, colon_sub_parameter)`.
///
/// The colon sub-parameter carries the Kitty event type inside the
/// modifier parameter: `modifier:event_type`.
struct CsiParam(u16, u16);

/// Parse semicolon-separated CSI parameters with optional colon
/// sub-params: `1;2` → `[(1,0), (2,0)]`, `97;5:2` → `[(97,0), (5,2)]`.
fn parse_csi_params(raw: &[u8]) -> Vec<CsiParam> {
    if raw.is_empty() {
        return Vec::new();
    }

    let mut params = Vec::with_capacity(4);
    let mut pos = 0;

    while pos <= raw.len() {
        let (main_val, next) = parse_u16_at(raw, pos);
        pos = next;

        let sub_val = if pos < raw.len() && raw[pos] == b':' {
            pos += 1;
            let (v, n) = parse_u16_at(raw, pos);
            pos = n;
            v
        } else {
            0
        };

        params.push(CsiParam(main_val, sub_val));

        if pos < raw.len() && raw[pos] == b';' {
            pos += 1;
        } else {
            break;
        }
    }

    params
}

/// Parse a u16 at `start`, stopping at the first non-digit.
fn parse_u16_at(buf: &[u8], start: usize) -> (u16, usize) {
    let mut val: u16 = 0;
    let mut pos = start;
    while pos < buf.len() && buf[pos].is_ascii_digit() {
        val = val.saturating_mul(10).saturating_add(u16::from(buf[pos] - b'0'));
        pos += 1;
    }
    (val, pos)
}

/// Parse a u16 from the front of a slice, returning the remainder.
fn parse_u16_from(buf: &[u8]) -> (u16, &[u8]) {
    let (val, pos) = parse_u16_at(buf, 0);
    (val, &buf[pos..])
}

fn skip_byte(buf: &[u8], expected: u8) -> &[u8] {
    if buf.first() == Some(&expected) {
        &buf[1..]
    } else {
        buf
    }
}

/// Decode a CSI modifier parameter (`1 + bitmask` encoding, shared by
/// xterm and Kitty). A parameter of 0 or 1 means no modifiers. Only the
/// low bits carry flags we track.
#[allow(clippy::cast_possible_truncation)]
const fn decode_modifiers(param: u16) -> Modifiers {
    let val = if param > 0 { param - 1 } else { 0 };
    Modifiers::from_bits_truncate(val as u8)
}

const fn decode_mouse_button(base: u16) -> MouseButton {
    match base {
        0 => MouseButton::Left,
        1 => MouseButton::Middle,
        _ => MouseButton::Right,
    }
}

/// Map a Kitty keyboard codepoint to a key. Functional keys use the
/// Unicode Private Use Area starting at 57344; PUA codes for keys we
/// don't model (lock keys, media keys) return `None`.
fn kitty_codepoint_to_keycode(cp: u16) -> Option<KeyCode> {
    let code = match cp {
        27 | 57344 => KeyCode::Escape,
        13 | 57345 => KeyCode::Enter,
        9 | 57346 => KeyCode::Tab,
        127 | 57347 => KeyCode::Backspace,
        57348 => KeyCode::Insert,
        57349 => KeyCode::Delete,
        57350 => KeyCode::Left,
        57351 => KeyCode::Right,
        57352 => KeyCode::Up,
        57353 => KeyCode::Down,
        57354 => KeyCode::PageUp,
        57355 => KeyCode::PageDown,
        57356 => KeyCode::Home,
        57357 => KeyCode::End,
        // F1–F35. The range keeps the result within u8.
        #[allow(clippy::cast_possible_truncation)]
        cp @ 57364..=57398 => KeyCode::F((cp - 57364 + 1) as u8),
        57358..=57363 => return None,
        cp => KeyCode::Char(char::from_u32(u32::from(cp))?),
    };
    Some(code)
}

/// Expected byte length of a UTF-8 character from its lead byte; 0 for
/// invalid leads.
const fn utf8_char_len(lead: u8) -> usize {
    match lead {
        0x00..=0x7F => 1,
        0xC0..=0xDF => 2,
        0xE0..=0xEF => 3,
        0xF0..=0xF7 => 4,
        _ => 0,
    }
}

fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

// ─── Tests ──────────────────────────────────────────────────────────────────
