//! TUI color theme
//!
//! HUD-style scheme: green for nominal, amber for caution, red for
//! saturation.

use ratatui::style::{Color, Modifier, Style};

pub const HUD_GREEN: Color = Color::Rgb(0, 220, 60);
pub const CAUTION_AMBER: Color = Color::Rgb(255, 191, 0);
pub const CRITICAL_RED: Color = Color::Rgb(255, 60, 40);
pub const SOFTFLOAT_MAGENTA: Color = Color::Rgb(220, 80, 220);
pub const INFO_DIM: Color = Color::Rgb(110, 110, 110);

pub struct Theme {
    pub border: Style,
    pub border_selected: Style,
    pub title: Style,
    pub label: Style,
    pub value: Style,
    pub dim: Style,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            border: Style::default().fg(INFO_DIM),
            border_selected: Style::default().fg(HUD_GREEN),
            title: Style::default().fg(HUD_GREEN).add_modifier(Modifier::BOLD),
            label: Style::default().fg(Color::Gray),
            value: Style::default().fg(Color::White),
            dim: Style::default().fg(INFO_DIM),
        }
    }
}

/// Severity color for a load percentage.
///
/// Above 100% means more than one core-equivalent of JIT work; above 50%
/// the JIT is a serious share of the period.
#[must_use]
pub fn load_color(percentage: f64) -> Color {
    if percentage >= 100.0 {
        CRITICAL_RED
    } else if percentage >= 50.0 {
        CAUTION_AMBER
    } else {
        HUD_GREEN
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_color_thresholds() {
        assert_eq!(load_color(0.0), HUD_GREEN);
        assert_eq!(load_color(49.9), HUD_GREEN);
        assert_eq!(load_color(50.0), CAUTION_AMBER);
        assert_eq!(load_color(150.0), CRITICAL_RED);
    }
}
