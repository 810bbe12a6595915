// SPDX-License-Identifier: MIT
//
// Terminal capability detection.
//
// One inspection of the environment at startup produces an immutable
// `TerminalCapabilities` snapshot. Everything downstream — the input
// parser's mouse decoding, the renderer's color emission, the raw mode
// manager's feature toggles — reads that snapshot instead of polling
// the environment.
//
// Detection is a pure function of an `EnvSnapshot`, so tests can probe
// every variable combination without touching the process environment.
// `detect()` is the convenience entry that snapshots the real one.
//
// Color resolution precedence (first match wins):
//
//   1. NO_COLOR set           → None, regardless of anything else
//   2. FORCE_COLOR numeric    → mapped directly to a tier
//   3. not a TTY / TERM=dumb  → None
//   4. COLORTERM truecolor    → TrueColor
//   5. TERM heuristics        → TrueColor / Ansi256 / Basic
//
// Modern xterm builds advertise `xterm-256color` while supporting 24-bit
// SGR, so that value maps to TrueColor; multiplexer TERMs ending in
// `-256color` (screen, tmux) stay at Ansi256.

use std::env;
use std::fmt::Write as _;

// ─── Capability Types ────────────────────────────────────────────────────────

/// Color depth tier supported by the terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ColorSupport {
    /// No color output (NO_COLOR, dumb terminal, or not a TTY).
    None,
    /// The 16 standard ANSI colors.
    Basic,
    /// The 256-color palette.
    Ansi256,
    /// 24-bit true color.
    TrueColor,
}

impl ColorSupport {
    /// Number of distinct colors available at this tier.
    #[must_use]
    pub const fn max_colors(self) -> u32 {
        match self {
            Self::None => 0,
            Self::Basic => 16,
            Self::Ansi256 => 256,
            Self::TrueColor => 16_777_216,
        }
    }
}

/// Mouse reporting protocol the terminal is expected to speak.
///
/// The encodings differ in coordinate layout, so the input parser
/// branches on this value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseProtocol {
    /// No mouse reporting.
    None,
    /// Legacy X10 bytes (`ESC [ M b x y`, coordinates capped at 223).
    X10,
    /// X10 framing with UTF-8 encoded coordinates (DEC 1005).
    Utf8,
    /// SGR decimal parameters (`ESC [ < b;x;y M/m`, unbounded coordinates).
    Sgr,
}

/// Immutable snapshot of detected terminal capabilities.
///
/// Created once per process via [`detect`]; a new detection pass builds
/// a new value. Never mutated in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminalCapabilities {
    /// Color depth tier.
    pub color_support: ColorSupport,
    /// Number of distinct colors at that tier.
    pub max_colors: u32,
    /// Mouse reporting protocol to enable and decode.
    pub mouse_protocol: MouseProtocol,
    /// Whether the locale indicates UTF-8 output is safe.
    pub unicode: bool,
    /// Whether OSC 8 hyperlinks are expected to work.
    pub hyperlinks: bool,
    /// Whether bracketed paste (DEC 2004) is expected to work.
    pub bracketed_paste: bool,
    /// Whether focus reporting (DEC 1004) is expected to work.
    pub focus_events: bool,
    /// Whether the Kitty keyboard protocol is expected to work.
    pub keyboard_enhancement: bool,
}

// ─── Environment Snapshot ────────────────────────────────────────────────────

/// The environment variables and TTY state that detection reads.
///
/// Captured once by [`EnvSnapshot::from_env`]; tests construct values
/// directly to probe variable combinations.
#[derive(Debug, Clone, Default)]
pub struct EnvSnapshot {
    pub term: Option<String>,
    pub colorterm: Option<String>,
    pub no_color: Option<String>,
    pub force_color: Option<String>,
    pub term_program: Option<String>,
    pub lang: Option<String>,
    pub lc_all: Option<String>,
    pub ci: Option<String>,
    /// Whether stdin/stdout are connected to a terminal.
    pub tty: bool,
}

impl EnvSnapshot {
    /// Capture the current process environment and TTY state.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            term: env::var("TERM").ok(),
            colorterm: env::var("COLORTERM").ok(),
            no_color: env::var("NO_COLOR").ok(),
            force_color: env::var("FORCE_COLOR").ok(),
            term_program: env::var("TERM_PROGRAM").ok(),
            lang: env::var("LANG").ok(),
            lc_all: env::var("LC_ALL").ok(),
            ci: env::var("CI").ok(),
            tty: is_tty(),
        }
    }

    fn term_str(&self) -> &str {
        self.term.as_deref().unwrap_or("")
    }
}

// ─── TTY / CI Probes ─────────────────────────────────────────────────────────

/// Whether stdin is connected to a terminal.
#[cfg(unix)]
#[allow(unsafe_code)] // isatty is the POSIX TTY probe; no safe equivalent.
#[must_use]
pub fn is_tty() -> bool {
    unsafe { libc::isatty(libc::STDIN_FILENO) != 0 }
}

#[cfg(not(unix))]
#[must_use]
pub fn is_tty() -> bool {
    false
}

/// Whether the process appears to run under a CI environment.
///
/// Checks the conventional `CI` marker plus a few providers that
/// predate it.
#[must_use]
pub fn is_ci() -> bool {
    const MARKERS: &[&str] = &["CI", "GITHUB_ACTIONS", "GITLAB_CI", "BUILDKITE", "JENKINS_URL"];
    MARKERS.iter().any(|m| env::var_os(m).is_some())
}

// ─── Detection ───────────────────────────────────────────────────────────────

/// Terminal programs known to support 24-bit color, SGR mouse, and
/// focus reporting. Matched against `TERM_PROGRAM`.
const MODERN_PROGRAMS: &[&str] = &["iTerm.app", "WezTerm", "ghostty", "vscode", "Hyper"];

/// TERM values that identify a modern 24-bit terminal directly.
const MODERN_TERMS: &[&str] = &[
    "xterm-kitty",
    "xterm-ghostty",
    "wezterm",
    "alacritty",
    "foot",
    "contour",
    "rio",
];

/// Detect capabilities from the current process environment.
///
/// Pure apart from reading the environment and `isatty`; calling it twice
/// without environment changes yields equal snapshots.
#[must_use]
pub fn detect() -> TerminalCapabilities {
    detect_from(&EnvSnapshot::from_env())
}

/// Detect capabilities from an explicit environment snapshot.
#[must_use]
pub fn detect_from(env: &EnvSnapshot) -> TerminalCapabilities {
    let color_support = detect_color(env);
    TerminalCapabilities {
        color_support,
        max_colors: color_support.max_colors(),
        mouse_protocol: detect_mouse(env),
        unicode: detect_unicode(env),
        hyperlinks: detect_hyperlinks(env),
        bracketed_paste: detect_bracketed_paste(env),
        focus_events: detect_focus_events(env),
        keyboard_enhancement: detect_keyboard_enhancement(env),
    }
}

fn detect_color(env: &EnvSnapshot) -> ColorSupport {
    // NO_COLOR overrides everything. An empty value or "0" does not count
    // as set, matching the informal standard.
    if let Some(v) = &env.no_color {
        if !v.is_empty() && v != "0" {
            return ColorSupport::None;
        }
    }

    // FORCE_COLOR maps numeric levels directly, even without a TTY —
    // forcing color through a pipe is its whole purpose.
    if let Some(v) = &env.force_color {
        return match v.as_str() {
            "0" | "false" => ColorSupport::None,
            "2" => ColorSupport::Ansi256,
            "3" => ColorSupport::TrueColor,
            _ => ColorSupport::Basic,
        };
    }

    let term = env.term_str();
    if !env.tty || term == "dumb" {
        return ColorSupport::None;
    }

    if let Some(ct) = &env.colorterm {
        if ct == "truecolor" || ct == "24bit" {
            return ColorSupport::TrueColor;
        }
    }

    if is_modern(env) || term == "xterm-256color" || term.contains("direct") {
        return ColorSupport::TrueColor;
    }

    if term.ends_with("-256color") {
        return ColorSupport::Ansi256;
    }

    if term.starts_with("xterm")
        || term.starts_with("screen")
        || term.starts_with("tmux")
        || term.starts_with("rxvt")
        || term.starts_with("vt100")
        || term.starts_with("vt220")
        || term == "linux"
        || term.contains("color")
        || term.contains("ansi")
    {
        return ColorSupport::Basic;
    }

    ColorSupport::None
}

fn is_modern(env: &EnvSnapshot) -> bool {
    let program_modern = env
        .term_program
        .as_deref()
        .is_some_and(|p| MODERN_PROGRAMS.contains(&p));
    program_modern || MODERN_TERMS.contains(&env.term_str())
}

fn detect_mouse(env: &EnvSnapshot) -> MouseProtocol {
    if !env.tty {
        return MouseProtocol::None;
    }
    let term = env.term_str();

    if is_modern(env) || term.ends_with("-256color") {
        return MouseProtocol::Sgr;
    }
    if term.starts_with("rxvt") {
        return MouseProtocol::Utf8;
    }
    if term.starts_with("xterm") || term.starts_with("screen") || term.starts_with("tmux") {
        return MouseProtocol::X10;
    }
    MouseProtocol::None
}

fn detect_unicode(env: &EnvSnapshot) -> bool {
    // LC_ALL wins over LANG when both are set, per POSIX locale rules.
    let locale = env.lc_all.as_deref().or(env.lang.as_deref()).unwrap_or("");
    let lower = locale.to_ascii_lowercase();
    lower.contains("utf-8") || lower.contains("utf8")
}

fn detect_hyperlinks(env: &EnvSnapshot) -> bool {
    env.tty && is_modern(env)
}

fn detect_bracketed_paste(env: &EnvSnapshot) -> bool {
    let term = env.term_str();
    env.tty && !term.is_empty() && term != "dumb" && term != "linux"
}

fn detect_focus_events(env: &EnvSnapshot) -> bool {
    let term = env.term_str();
    env.tty && (is_modern(env) || term.starts_with("xterm") || term.ends_with("-256color"))
}

fn detect_keyboard_enhancement(env: &EnvSnapshot) -> bool {
    // Progressive enhancement is harmless to push on terminals that
    // ignore it, but the disable sequence confuses a few legacy ones,
    // so only the modern allow-list gets it.
    env.tty && is_modern(env)
}

// ─── Diagnostics ─────────────────────────────────────────────────────────────

/// Render a human-readable capability summary.
///
/// For diagnostics and bug reports; the format is not stable and not
/// meant to be parsed.
#[must_use]
pub fn describe(caps: &TerminalCapabilities) -> String {
    let yes_no = |b: bool| if b { "yes" } else { "no" };
    let mut out = String::from("terminal capabilities:\n");
    let _ = writeln!(
        out,
        "  color support:   {:?} ({} colors)",
        caps.color_support, caps.max_colors
    );
    let _ = writeln!(out, "  mouse protocol:  {:?}", caps.mouse_protocol);
    let _ = writeln!(out, "  unicode:         {}", yes_no(caps.unicode));
    let _ = writeln!(out, "  hyperlinks:      {}", yes_no(caps.hyperlinks));
    let _ = writeln!(out, "  bracketed paste: {}", yes_no(caps.bracketed_paste));
    let _ = writeln!(out, "  focus events:    {}", yes_no(caps.focus_events));
    let _ = writeln!(out, "  kitty keyboard:  {}", yes_no(caps.keyboard_enhancement));
    out
}

// ─── Tests ───────────────────────────────────────────────────────────────────
