//! Playback bar shown in replay mode.

use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Gauge, Paragraph};
use ratatui::Frame;

use super::theme::Theme;
use crate::recording::ReplaySource;

pub const PLAYBACK_BAR_HEIGHT: u16 = 4;

pub fn render(f: &mut Frame, area: Rect, source: &ReplaySource, theme: &Theme) {
    if area.height < PLAYBACK_BAR_HEIGHT || area.width < 20 {
        return;
    }

    let block = Block::default()
        .title(" Playback ")
        .borders(Borders::ALL)
        .border_style(theme.border)
        .title_style(theme.title);
    let inner = block.inner(area);
    f.render_widget(block, area);

    if inner.height < 2 || inner.width < 10 {
        return;
    }

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Length(1)])
        .split(inner);

    let state = if source.is_finished() {
        "end"
    } else if source.is_paused() {
        "paused"
    } else {
        "playing"
    };
    let position = source.position().map_or(0, |p| p + 1);
    let label = format!(
        " {state}  {:.2}x  frame {position}/{}",
        source.speed(),
        source.frame_count()
    );

    let gauge = Gauge::default()
        .ratio(source.progress_fraction().clamp(0.0, 1.0))
        .label(label)
        .gauge_style(theme.border_selected);
    f.render_widget(gauge, rows[0]);

    let help = Line::from(vec![
        Span::styled("[space]", theme.title),
        Span::raw(" pause  "),
        Span::styled("[←/→]", theme.title),
        Span::raw(" step  "),
        Span::styled("[+/-]", theme.title),
        Span::raw(" speed  "),
        Span::styled("[home/end]", theme.title),
        Span::raw(" jump  "),
        Span::styled("[q]", theme.title),
        Span::raw(" quit"),
    ]);
    f.render_widget(Paragraph::new(help), rows[1]);
}
