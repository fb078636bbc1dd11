//! Scrolling load histogram: one bar per past frame, newest on the right.

use std::collections::VecDeque;

use ratatui::layout::Rect;
use ratatui::style::Style;
use ratatui::widgets::{Bar, BarChart, BarGroup};
use ratatui::Frame;

use super::theme::{Theme, CAUTION_AMBER, CRITICAL_RED, HUD_GREEN, SOFTFLOAT_MAGENTA};
use crate::sampling::HistogramEntry;

pub fn render(f: &mut Frame, area: Rect, histogram: &VecDeque<HistogramEntry>, theme: &Theme) {
    if area.width < 2 || area.height < 2 {
        return;
    }

    // One column per bar; show as many of the newest entries as fit.
    let visible = area.width as usize;
    let start = histogram.len().saturating_sub(visible);

    let bars: Vec<Bar<'_>> = histogram
        .iter()
        .skip(start)
        .map(|entry| {
            let value = f64::from(entry.load_percent).clamp(0.0, 100.0);
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let value = value.round() as u64;
            Bar::default()
                .value(value.max(1))
                .text_value(String::new())
                .style(Style::default().fg(bar_color(entry)))
        })
        .collect();

    let chart = BarChart::default()
        .bar_width(1)
        .bar_gap(0)
        .max(100)
        .bar_style(theme.border)
        .data(BarGroup::default().bars(&bars));

    f.render_widget(chart, area);
}

/// Worst condition wins: saturation, then invalidation pressure, then
/// soft-float pressure.
fn bar_color(entry: &HistogramEntry) -> ratatui::style::Color {
    if entry.high_jit_load {
        CRITICAL_RED
    } else if entry.high_invalidation || entry.high_sigbus {
        CAUTION_AMBER
    } else if entry.high_softfloat {
        SOFTFLOAT_MAGENTA
    } else {
        HUD_GREEN
    }
}
