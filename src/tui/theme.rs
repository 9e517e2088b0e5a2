//! Theme and Styling
//!
//! Defines colors and styles for the TUI interface.

use ratatui::style::{Color, Modifier, Style};

/// Application theme
pub struct Theme;

impl Theme {
    // === Primary Colors ===

    /// Primary accent color (violet, as on the spl402 site)
    pub const ACCENT: Color = Color::Rgb(153, 69, 255);

    /// Token amounts (green)
    pub const TOKEN: Color = Color::Rgb(20, 241, 149);

    /// Warning color (yellow/amber)
    pub const WARNING: Color = Color::Rgb(251, 191, 36);

    /// Error color (red)
    pub const ERROR: Color = Color::Rgb(239, 68, 68);

    // === Text Colors ===

    pub const TEXT_PRIMARY: Color = Color::Rgb(229, 229, 229);
    pub const TEXT_SECONDARY: Color = Color::Rgb(161, 161, 161);
    pub const TEXT_DIM: Color = Color::Rgb(82, 82, 82);

    /// Inline and block code
    pub const CODE: Color = Color::Rgb(249, 168, 212);

    // === Border Colors ===

    pub const BORDER: Color = Color::Rgb(51, 51, 51);
    pub const BORDER_FOCUSED: Color = Color::Rgb(153, 69, 255);

    // === Role Colors ===

    pub const USER: Color = Color::Rgb(20, 241, 149);
    pub const ASSISTANT: Color = Color::Rgb(153, 69, 255);
    pub const SYSTEM: Color = Color::Rgb(251, 191, 36);

    // === Styles ===

    pub fn text() -> Style {
        Style::default().fg(Self::TEXT_PRIMARY)
    }

    pub fn text_secondary() -> Style {
        Style::default().fg(Self::TEXT_SECONDARY)
    }

    pub fn text_dim() -> Style {
        Style::default().fg(Self::TEXT_DIM)
    }

    pub fn title() -> Style {
        Style::default()
            .fg(Self::ACCENT)
            .add_modifier(Modifier::BOLD)
    }

    pub fn heading() -> Style {
        Style::default()
            .fg(Self::TEXT_PRIMARY)
            .add_modifier(Modifier::BOLD)
    }

    /// Running spend in the header
    pub fn spend() -> Style {
        Style::default()
            .fg(Self::TOKEN)
            .add_modifier(Modifier::BOLD)
    }

    pub fn link() -> Style {
        Style::default()
            .fg(Self::ACCENT)
            .add_modifier(Modifier::UNDERLINED)
    }

    pub fn code() -> Style {
        Style::default().fg(Self::CODE)
    }

    pub fn warning() -> Style {
        Style::default().fg(Self::WARNING)
    }

    pub fn error() -> Style {
        Style::default().fg(Self::ERROR)
    }

    pub fn border() -> Style {
        Style::default().fg(Self::BORDER)
    }

    pub fn border_focused() -> Style {
        Style::default().fg(Self::BORDER_FOCUSED)
    }

    pub fn user_message() -> Style {
        Style::default()
            .fg(Self::USER)
            .add_modifier(Modifier::BOLD)
    }

    pub fn assistant_message() -> Style {
        Style::default()
            .fg(Self::ASSISTANT)
            .add_modifier(Modifier::BOLD)
    }

    pub fn system_message() -> Style {
        Style::default()
            .fg(Self::SYSTEM)
            .add_modifier(Modifier::BOLD)
    }

    /// Keyboard shortcut style
    pub fn shortcut_key() -> Style {
        Style::default()
            .fg(Self::ACCENT)
            .add_modifier(Modifier::BOLD)
    }

    /// Shortcut description style
    pub fn shortcut_desc() -> Style {
        Style::default().fg(Self::TEXT_SECONDARY)
    }

    /// Payment in flight
    pub fn active() -> Style {
        Style::default()
            .fg(Self::WARNING)
            .add_modifier(Modifier::BOLD)
    }
}

pub struct Icons;

impl Icons {
    pub const DOT: &'static str = "•";
    const SPINNER: [&'static str; 4] = ["◐", "◓", "◑", "◒"];

    /// Spinner frame for the given tick
    pub fn spinner(tick: u64) -> &'static str {
        Self::SPINNER[(tick % Self::SPINNER.len() as u64) as usize]
    }
}
