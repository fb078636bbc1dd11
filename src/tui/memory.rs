//! Resident-memory panel.

use ratatui::layout::Rect;
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use ratatui::Frame;

use super::theme::Theme;
use crate::residency::MemSnapshot;

pub fn render(f: &mut Frame, area: Rect, mem: Option<&MemSnapshot>, theme: &Theme) {
    let Some(mem) = mem else {
        f.render_widget(Paragraph::new("collecting memory map..."), area);
        return;
    };

    let rows: [(&str, u64); 10] = [
        ("JIT code", mem.jit_code),
        ("Op dispatcher", mem.op_dispatcher),
        ("Frontend", mem.frontend),
        ("CPU backend", mem.cpu_backend),
        ("Lookup", mem.lookup),
        ("Lookup L1", mem.lookup_l1),
        ("Thread states", mem.thread_states),
        ("Block links", mem.block_links),
        ("Misc", mem.misc),
        ("Allocator", mem.allocator),
    ];

    let mut lines = vec![Line::from(vec![
        Span::styled("Resident total  ", theme.label),
        Span::styled(format_bytes(mem.total_anon), theme.title),
        Span::styled(
            format!("   unaccounted {}", format_bytes(mem.unaccounted)),
            theme.dim,
        ),
    ])];
    lines.push(Line::default());

    for (label, bytes) in rows {
        lines.push(Line::from(vec![
            Span::styled(format!("  {label:<14}"), theme.label),
            Span::styled(format!("{:>12}", format_bytes(bytes)), theme.value),
        ]));
    }

    if mem.largest_anon.size > 0 {
        lines.push(Line::default());
        lines.push(Line::from(Span::styled(
            format!(
                "largest allocator block {:#x}-{:#x} ({})",
                mem.largest_anon.begin,
                mem.largest_anon.end,
                format_bytes(mem.largest_anon.size)
            ),
            theme.dim,
        )));
    }

    f.render_widget(Paragraph::new(lines), area);
}

fn format_bytes(bytes: u64) -> String {
    #[allow(clippy::cast_precision_loss)]
    let b = bytes as f64;
    if bytes >= 1024 * 1024 * 1024 {
        format!("{:.2} GiB", b / (1024.0 * 1024.0 * 1024.0))
    } else if bytes >= 1024 * 1024 {
        format!("{:.2} MiB", b / (1024.0 * 1024.0))
    } else if bytes >= 1024 {
        format!("{:.1} KiB", b / 1024.0)
    } else {
        format!("{bytes} B")
    }
}
