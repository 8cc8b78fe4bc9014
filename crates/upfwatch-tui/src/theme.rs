//! Dashboard colors and the handful of styles built from them.
//!
//! Colors are named for what they signal on screen. Link health and drop
//! severity share one scale: `HEALTHY`, `WARN`, `DEGRADED`, `FAULT`.

use ratatui::style::{Color, Modifier, Style};

// ── Signal scale ─────────────────────────────────────────────────────

pub const HEALTHY: Color = Color::Rgb(80, 250, 123);
pub const WARN: Color = Color::Rgb(241, 250, 140);
/// Still working, but on the fallback path (polling without push).
pub const DEGRADED: Color = Color::Rgb(255, 106, 193);
pub const FAULT: Color = Color::Rgb(255, 99, 99);

// ── Traffic directions ───────────────────────────────────────────────

pub const UPLINK: Color = HEALTHY;
pub const DOWNLINK: Color = Color::Rgb(139, 233, 253);

// ── Chrome ───────────────────────────────────────────────────────────

pub const ACCENT: Color = Color::Rgb(128, 255, 234);
pub const FOCUS: Color = Color::Rgb(225, 53, 255);
pub const TEXT: Color = Color::Rgb(189, 193, 207);
/// Borders, hints, axis labels and placeholders.
pub const MUTED: Color = Color::Rgb(98, 114, 164);
pub const OVERLAY_BG: Color = Color::Rgb(30, 31, 41);

pub fn title_style() -> Style {
    Style::default().fg(ACCENT).add_modifier(Modifier::BOLD)
}

/// Border of the help overlay, the only panel that takes focus.
pub fn border_focused() -> Style {
    Style::default().fg(FOCUS)
}

pub fn border_default() -> Style {
    Style::default().fg(MUTED)
}

/// Column titles of the session and drop-reason tables.
pub fn table_header() -> Style {
    Style::default()
        .fg(ACCENT)
        .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
}

pub fn table_row() -> Style {
    Style::default().fg(TEXT)
}

/// Secondary text: counters' labels, data age, key legend.
pub fn key_hint() -> Style {
    Style::default().fg(MUTED)
}

/// The key itself in the help overlay (`f`, `q`, ...).
pub fn key_hint_key() -> Style {
    Style::default().fg(ACCENT).add_modifier(Modifier::BOLD)
}
