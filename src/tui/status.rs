//! Top status line: who we are attached to and how.

use ratatui::layout::Rect;
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use ratatui::Frame;

use super::theme::{Theme, CAUTION_AMBER};
use crate::domain::SessionMetadata;

pub struct StatusLine<'a> {
    pub metadata: &'a SessionMetadata,
    pub replay: bool,
    pub target_exited: bool,
    pub sample_period_ns: Option<u64>,
}

pub fn render(f: &mut Frame, area: Rect, status: &StatusLine<'_>, theme: &Theme) {
    let mode = if status.replay { "REPLAY" } else { "LIVE" };
    let period = status
        .sample_period_ns
        .map_or_else(String::new, |ns| format!("  {} ms", ns / 1_000_000));

    let mut spans = vec![
        Span::styled(" fexscope ", theme.title),
        Span::styled(format!("[{mode}]"), theme.value),
        Span::styled(
            format!(
                "  PID {}  FEX {} ({})",
                status.metadata.pid, status.metadata.fex_version, status.metadata.app_type
            ),
            theme.label,
        ),
        Span::styled(period, theme.dim),
    ];

    if status.target_exited {
        spans.push(Span::styled("  — target exited", CAUTION_AMBER));
    }

    f.render_widget(Paragraph::new(Line::from(spans)), area);
}
