//! JIT statistics panel: overall load, period totals, per-thread loads.

use ratatui::layout::Rect;
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use ratatui::Frame;

use super::theme::{load_color, Theme};
use crate::domain::SessionMetadata;
use crate::sampling::ComputedFrame;

pub fn render(
    f: &mut Frame,
    area: Rect,
    frame: &ComputedFrame,
    metadata: &SessionMetadata,
    theme: &Theme,
) {
    let freq = metadata.cycle_counter_frequency;
    let mut lines = Vec::new();

    lines.push(Line::from(vec![
        Span::styled("JIT load      ", theme.label),
        Span::styled(
            format!("{:6.1}%", frame.fex_load_percent),
            ratatui::style::Style::default().fg(load_color(frame.fex_load_percent)),
        ),
        Span::styled(format!("   threads {}", frame.threads_sampled), theme.dim),
    ]));
    lines.push(Line::default());

    lines.push(two_cells(
        theme,
        "JIT time",
        &ticks_ms(frame.total_jit_time, freq),
        "Signal time",
        &ticks_ms(frame.total_signal_time, freq),
    ));
    lines.push(two_cells(
        theme,
        "Cache rd lock",
        &ticks_ms(frame.total_cache_read_lock_time, freq),
        "Cache wr lock",
        &ticks_ms(frame.total_cache_write_lock_time, freq),
    ));
    lines.push(two_cells(
        theme,
        "JIT blocks",
        &frame.total_jit_count.to_string(),
        "Cache misses",
        &frame.total_cache_miss_count.to_string(),
    ));
    lines.push(Line::default());

    lines.push(Line::from(Span::styled("events            period        total", theme.dim)));
    lines.push(event_row(theme, "SMC", frame.total_smc_count, frame.cumulative.smc));
    lines.push(event_row(theme, "SIGBUS", frame.total_sigbus_count, frame.cumulative.sigbus));
    lines.push(event_row(
        theme,
        "Softfloat",
        frame.total_float_fallback_count,
        frame.cumulative.float_fallback,
    ));
    lines.push(event_row(
        theme,
        "JIT invocations",
        frame.total_jit_count,
        frame.cumulative.jit_invocations,
    ));
    lines.push(Line::default());

    if !frame.thread_loads.is_empty() {
        lines.push(Line::from(Span::styled("top threads", theme.dim)));
        for load in &frame.thread_loads {
            // Raw load may exceed 100 on counter bursts; clamp for display.
            let shown = f64::from(load.load_percent).min(100.0);
            lines.push(Line::from(vec![
                Span::styled(format!("  tid {:<8}", load.tid), theme.label),
                Span::styled(
                    format!("{shown:5.1}%"),
                    ratatui::style::Style::default().fg(load_color(shown)),
                ),
                Span::styled(format!("  {}", ticks_ms(load.total_cycles, freq)), theme.dim),
            ]));
        }
    }

    f.render_widget(Paragraph::new(lines), area);
}

fn two_cells(theme: &Theme, label_a: &str, value_a: &str, label_b: &str, value_b: &str) -> Line<'static> {
    Line::from(vec![
        Span::styled(format!("{label_a:<14}"), theme.label),
        Span::styled(format!("{value_a:>10}"), theme.value),
        Span::styled(format!("   {label_b:<14}"), theme.label),
        Span::styled(format!("{value_b:>10}"), theme.value),
    ])
}

fn event_row(theme: &Theme, label: &str, period: u64, total: u64) -> Line<'static> {
    Line::from(vec![
        Span::styled(format!("  {label:<16}"), theme.label),
        Span::styled(format!("{period:>10}"), theme.value),
        Span::styled(format!("{total:>13}"), theme.dim),
    ])
}

/// Formats raw cycle-counter ticks as milliseconds.
fn ticks_ms(ticks: u64, freq: u64) -> String {
    #[allow(clippy::cast_precision_loss)]
    let ms = ticks as f64 / freq.max(1) as f64 * 1000.0;
    format!("{ms:.2} ms")
}
