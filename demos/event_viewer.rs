// SPDX-License-Identifier: MIT
//
// emberterm demo — a live event viewer that proves every module works
// together.
//
// This wires the complete pipeline: capability detection → raw mode →
// StdinReader → Parser → priority queue → phased dispatch → back
// buffer → strategy-selected diff → single write(). Run it and press
// keys, move the mouse, paste, resize the terminal. Ctrl-Q to quit.
//
// Usage:
//   cargo run --example event_viewer

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Instant;

use emberterm::buffer::ScreenBuffer;
use emberterm::caps;
use emberterm::cell::{Attr, Color};
use emberterm::event::{EventKind, KeyCode, KeyEvent, Modifiers};
use emberterm::event_loop::EventLoop;
use emberterm::queue::Phase;
use emberterm::raw_mode::RawModeManager;
use emberterm::renderer::Renderer;

/// Maximum number of events kept in the scrolling log.
const MAX_LOG_ENTRIES: usize = 100;

/// The demo state shared between dispatch handlers and the idle hook.
struct Demo {
    log: VecDeque<String>,
    event_count: u64,
    start: Instant,
    dirty: bool,
}

impl Demo {
    fn new() -> Self {
        Self {
            log: VecDeque::with_capacity(MAX_LOG_ENTRIES),
            event_count: 0,
            start: Instant::now(),
            dirty: true,
        }
    }

    fn push_log(&mut self, msg: String) {
        if self.log.len() >= MAX_LOG_ENTRIES {
            self.log.pop_front();
        }
        self.log.push_back(msg);
        self.dirty = true;
    }

    fn format_event(kind: &EventKind) -> String {
        match kind {
            EventKind::Key(ke) => {
                let mods = format_modifiers(ke.modifiers);
                let key = format_keycode(ke.code);
                if mods.is_empty() {
                    format!("Key: {key} ({:?})", ke.kind)
                } else {
                    format!("Key: {mods}+{key} ({:?})", ke.kind)
                }
            }
            EventKind::Mouse(me) => format!("Mouse: {:?} at ({}, {})", me.kind, me.x, me.y),
            EventKind::Paste(text) => {
                let preview: String = text.chars().take(40).collect();
                let suffix = if text.chars().count() > 40 { "..." } else { "" };
                format!("Paste: \"{preview}{suffix}\" ({} bytes)", text.len())
            }
            EventKind::Resize { cols, rows } => format!("Resize: {cols}x{rows}"),
            EventKind::FocusGained => "Focus: gained".into(),
            EventKind::FocusLost => "Focus: lost".into(),
            EventKind::Signal(kind) => format!("Signal: {kind:?}"),
            EventKind::Idle => "Idle".into(),
            EventKind::Custom { name, .. } => format!("Custom: {name}"),
        }
    }

    fn paint(&self, buf: &mut ScreenBuffer) {
        let w = buf.width();
        let h = buf.height();
        if w < 20 || h < 5 {
            return; // Too small to draw anything useful.
        }
        buf.clear();

        // ── Header ───────────────────────────────────────────────
        let header_fg = Color::Rgb(0, 0, 0);
        let header_bg = Color::Rgb(100, 200, 255);
        buf.fill_rect(0, 0, w, 1, header_bg, None);
        let title = format!(
            " emberterm demo | {w}x{h} | {} events | {:.1}s ",
            self.event_count,
            self.start.elapsed().as_secs_f64()
        );
        buf.paint_text(0, 0, &title, header_fg, header_bg, Attr::BOLD, None);

        let hint = "Ctrl-Q to quit";
        #[allow(clippy::cast_possible_truncation)] // hint is 14 columns.
        let hint_start = w.saturating_sub(hint.len() as u16 + 1);
        buf.paint_text(hint_start, 0, hint, header_fg, header_bg, Attr::empty(), None);

        // ── Event log ────────────────────────────────────────────
        let log_start_y: u16 = 1;
        let visible_rows = h.saturating_sub(log_start_y + 1);
        let skip = self.log.len().saturating_sub(usize::from(visible_rows));

        for (i, entry) in self.log.iter().skip(skip).enumerate() {
            #[allow(clippy::cast_possible_truncation)] // i < visible_rows.
            let y = log_start_y + i as u16;
            if y >= h - 1 {
                break;
            }
            let bg = if i % 2 == 0 {
                Color::Default
            } else {
                Color::Rgb(20, 20, 30)
            };
            buf.fill_rect(0, y, w, 1, bg, None);
            buf.paint_text(1, y, entry, event_color(entry), bg, Attr::empty(), None);
        }

        // ── Status bar ───────────────────────────────────────────
        let status_bg = Color::Rgb(80, 80, 100);
        buf.fill_rect(0, h - 1, w, 1, status_bg, None);
        let status = format!(
            " {} events | type, click, scroll, paste, resize — everything is wired",
            self.event_count
        );
        buf.paint_text(1, h - 1, &status, Color::Rgb(0, 0, 0), status_bg, Attr::empty(), None);
    }
}

fn format_modifiers(mods: Modifiers) -> String {
    let mut parts = Vec::new();
    if mods.contains(Modifiers::CTRL) {
        parts.push("Ctrl");
    }
    if mods.contains(Modifiers::ALT) {
        parts.push("Alt");
    }
    if mods.contains(Modifiers::SHIFT) {
        parts.push("Shift");
    }
    if mods.contains(Modifiers::SUPER) {
        parts.push("Super");
    }
    parts.join("+")
}

fn format_keycode(code: KeyCode) -> String {
    match code {
        KeyCode::Char(' ') => "Space".into(),
        KeyCode::Char(c) => format!("'{c}'"),
        KeyCode::F(n) => format!("F{n}"),
        other => format!("{other:?}"),
    }
}

/// Color-code log lines by event type prefix.
fn event_color(entry: &str) -> Color {
    if entry.starts_with("Key:") {
        Color::Rgb(130, 220, 130)
    } else if entry.starts_with("Mouse:") {
        Color::Rgb(180, 180, 255)
    } else if entry.starts_with("Paste:") {
        Color::Rgb(255, 200, 100)
    } else if entry.starts_with("Resize:") {
        Color::Rgb(255, 255, 100)
    } else if entry.starts_with("Signal:") || entry.starts_with("Focus:") {
        Color::Rgb(200, 150, 255)
    } else {
        Color::Rgb(200, 200, 200)
    }
}

fn main() -> Result<(), emberterm::error::TermError> {
    let capabilities = caps::detect();
    let mut raw = RawModeManager::new(capabilities);
    raw.enter_session()?;

    let mut event_loop = EventLoop::new(capabilities);
    let size = event_loop.size();

    let demo = Rc::new(RefCell::new(Demo::new()));
    let renderer = Rc::new(RefCell::new(Renderer::new(size.cols, size.rows)));

    {
        let mut demo = demo.borrow_mut();
        demo.push_log("Welcome to emberterm! All modules wired and running.".into());
        demo.push_log(format!("Terminal: {}x{} ({} cells)", size.cols, size.rows, size.area()));
        demo.push_log(caps::describe(&capabilities).trim_end().replace('\n', " | "));
    }

    // Event handling: log everything, react to resize, quit on Ctrl-Q/C.
    let stop = event_loop.stop_handle();
    {
        let demo = Rc::clone(&demo);
        let renderer = Rc::clone(&renderer);
        event_loop.dispatcher().on(Phase::Target, move |event| {
            if let EventKind::Key(KeyEvent {
                code: KeyCode::Char('q' | 'c'),
                modifiers,
                ..
            }) = event.kind()
            {
                if modifiers.contains(Modifiers::CTRL) {
                    stop.stop();
                    return;
                }
            }

            if let EventKind::Resize { cols, rows } = *event.kind() {
                renderer.borrow_mut().resize(cols, rows);
            }

            let mut demo = demo.borrow_mut();
            demo.event_count += 1;
            let msg = Demo::format_event(event.kind());
            demo.push_log(msg);
        });
    }

    // Rendering: repaint on the idle tick whenever something changed.
    {
        let demo = Rc::clone(&demo);
        let renderer = Rc::clone(&renderer);
        event_loop.on_idle(move || {
            let mut demo = demo.borrow_mut();
            let mut renderer = renderer.borrow_mut();
            if demo.dirty && renderer.ready() {
                demo.paint(renderer.back_buffer());
                if renderer.render().is_ok() {
                    demo.dirty = false;
                }
            }
        });
    }

    let result = event_loop.start();
    raw.leave_session()?;
    result
}
