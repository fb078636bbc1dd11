//! Terminal user interface
//!
//! Interactive HUD over any [`FrameSource`]: a status line, three
//! collapsible panels (JIT statistics, memory residency, load histogram)
//! and, in replay mode, a playback bar.
//!
//! The UI owns the poll cadence: it waits at most 10 ms for input, asks the
//! source for a frame (which returns `None` until one is due) and redraws.
//! Live and replay sessions share everything except action routing.

use std::collections::VecDeque;
use std::io::{self, Stdout};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyEventKind};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Terminal;

mod histogram;
mod input;
mod memory;
mod playback;
mod stats;
mod status;
mod theme;

use input::{map_key, Action};
use theme::Theme;

use crate::domain::SessionMetadata;
use crate::recording::ReplaySource;
use crate::sampling::{ComputedFrame, LiveSource, SourceState, HISTOGRAM_CAPACITY};
use crate::source::FrameSource;

const EVENT_POLL_TIMEOUT: Duration = Duration::from_millis(10);
const COLLAPSED_HEIGHT: u16 = 2;

struct Panel {
    name: &'static str,
    collapsed: bool,
}

/// Display state shared by live and replay modes.
struct App {
    metadata: SessionMetadata,
    latest: Option<ComputedFrame>,
    histogram: VecDeque<crate::sampling::HistogramEntry>,
    panels: Vec<Panel>,
    selected: usize,
    replay: bool,
    target_exited: bool,
    should_quit: bool,
    theme: Theme,
}

impl App {
    fn new(metadata: SessionMetadata, replay: bool) -> Self {
        Self {
            metadata,
            latest: None,
            histogram: VecDeque::with_capacity(HISTOGRAM_CAPACITY),
            panels: vec![
                Panel { name: "JIT Stats", collapsed: false },
                Panel { name: "Memory Residency", collapsed: false },
                Panel { name: "Load Histogram", collapsed: false },
            ],
            selected: 0,
            replay,
            target_exited: false,
            should_quit: false,
            theme: Theme::default(),
        }
    }

    fn push_frame(&mut self, frame: ComputedFrame) {
        if let Some(entry) = &frame.histogram_entry {
            if self.histogram.len() >= HISTOGRAM_CAPACITY {
                self.histogram.pop_front();
            }
            self.histogram.push_back(entry.clone());
        }
        self.latest = Some(frame);
    }

    /// Handles the actions that are not playback-specific.
    fn apply(&mut self, action: Action) {
        match action {
            Action::Quit => self.should_quit = true,
            Action::PanelUp => self.selected = self.selected.saturating_sub(1),
            Action::PanelDown => {
                self.selected = (self.selected + 1).min(self.panels.len() - 1);
            }
            Action::ToggleCollapse => {
                if let Some(panel) = self.panels.get_mut(self.selected) {
                    panel.collapsed = !panel.collapsed;
                }
            }
            _ => {}
        }
    }

    fn render(&self, f: &mut ratatui::Frame, replay_source: Option<&ReplaySource>) {
        let outer = f.area();
        if outer.height < 4 || outer.width < 20 {
            return;
        }

        let mut constraints =
            vec![Constraint::Length(1), Constraint::Min(1)];
        if replay_source.is_some() {
            constraints.push(Constraint::Length(playback::PLAYBACK_BAR_HEIGHT));
        }
        let vertical = Layout::default()
            .direction(Direction::Vertical)
            .constraints(constraints)
            .split(outer);

        status::render(
            f,
            vertical[0],
            &status::StatusLine {
                metadata: &self.metadata,
                replay: self.replay,
                target_exited: self.target_exited,
                sample_period_ns: self.latest.as_ref().map(|fr| fr.sample_period_ns),
            },
            &self.theme,
        );

        self.render_panels(f, vertical[1]);

        if let Some(source) = replay_source {
            playback::render(f, vertical[2], source, &self.theme);
        }
    }

    fn render_panels(&self, f: &mut ratatui::Frame, area: Rect) {
        let constraints: Vec<Constraint> = self
            .panels
            .iter()
            .map(|p| {
                if p.collapsed {
                    Constraint::Length(COLLAPSED_HEIGHT)
                } else {
                    Constraint::Min(8)
                }
            })
            .collect();
        let areas = Layout::default()
            .direction(Direction::Vertical)
            .constraints(constraints)
            .split(area);

        for (i, (panel, panel_area)) in self.panels.iter().zip(areas.iter()).enumerate() {
            let selected = i == self.selected;
            let marker = if selected { "›" } else { " " };
            let border_style =
                if selected { self.theme.border_selected } else { self.theme.border };

            let block = Block::default()
                .title(format!("{marker} {}", panel.name))
                .borders(Borders::ALL)
                .border_style(border_style)
                .title_style(self.theme.title);
            let inner = block.inner(*panel_area);
            f.render_widget(block, *panel_area);

            if panel.collapsed || inner.width < 2 || inner.height < 1 {
                continue;
            }

            match (i, &self.latest) {
                (0, Some(frame)) => {
                    stats::render(f, inner, frame, &self.metadata, &self.theme);
                }
                (1, Some(frame)) => {
                    memory::render(f, inner, frame.mem.as_ref(), &self.theme);
                }
                (2, _) => histogram::render(f, inner, &self.histogram, &self.theme),
                _ => f.render_widget(Paragraph::new("waiting for data..."), inner),
            }
        }
    }
}

/// Runs the live HUD until the user quits, the shutdown flag is raised or
/// the target exits and the user leaves.
///
/// # Errors
///
/// Returns terminal and event-loop errors.
pub fn run_live(source: &mut LiveSource, shutdown: &AtomicBool) -> Result<()> {
    let mut terminal = setup_terminal()?;
    let mut app = App::new(source.metadata().clone(), false);
    let result = live_loop(&mut terminal, &mut app, source, shutdown);
    restore_terminal(&mut terminal)?;
    result
}

fn live_loop(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    app: &mut App,
    source: &mut LiveSource,
    shutdown: &AtomicBool,
) -> Result<()> {
    loop {
        if shutdown.load(Ordering::Relaxed) || app.should_quit {
            return Ok(());
        }

        if let Some(action) = poll_action(false)? {
            app.apply(action);
        }

        if let Some(frame) = source.next_frame() {
            app.push_frame(frame);
        }
        app.target_exited = source.state() == SourceState::TargetExited;

        terminal.draw(|f| app.render(f, None)).context("failed to draw frame")?;
    }
}

/// Runs the replay HUD over a decoded recording.
///
/// # Errors
///
/// Returns terminal and event-loop errors.
pub fn run_replay(source: &mut ReplaySource, shutdown: &AtomicBool) -> Result<()> {
    let mut terminal = setup_terminal()?;
    let mut app = App::new(source.metadata().clone(), true);
    let result = replay_loop(&mut terminal, &mut app, source, shutdown);
    restore_terminal(&mut terminal)?;
    result
}

fn replay_loop(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    app: &mut App,
    source: &mut ReplaySource,
    shutdown: &AtomicBool,
) -> Result<()> {
    // After a seek the histogram cannot be extended incrementally; it is
    // rebuilt from the start of the recording when the sought frame arrives.
    let mut rebuild_histogram = false;

    loop {
        if shutdown.load(Ordering::Relaxed) || app.should_quit {
            return Ok(());
        }

        if let Some(action) = poll_action(true)? {
            match action {
                Action::TogglePause => source.toggle_pause(),
                Action::SpeedUp => source.speed_up(),
                Action::SpeedDown => source.speed_down(),
                Action::SeekForward => {
                    source.seek_forward();
                    rebuild_histogram = true;
                }
                Action::SeekBackward => {
                    source.seek_backward();
                    rebuild_histogram = true;
                }
                Action::SeekStart => {
                    source.seek_start();
                    rebuild_histogram = true;
                }
                Action::SeekEnd => {
                    source.seek_end();
                    rebuild_histogram = true;
                }
                other => app.apply(other),
            }
        }

        if let Some(frame) = source.next_frame() {
            if rebuild_histogram {
                rebuild_histogram = false;
                app.histogram = source.histogram_through(source.position().unwrap_or(0));
                app.latest = Some(frame);
            } else {
                app.push_frame(frame);
            }
        }

        terminal.draw(|f| app.render(f, Some(source))).context("failed to draw frame")?;
    }
}

fn poll_action(replay: bool) -> Result<Option<Action>> {
    if !event::poll(EVENT_POLL_TIMEOUT).context("failed to poll events")? {
        return Ok(None);
    }
    if let Event::Key(key) = event::read().context("failed to read event")? {
        if key.kind == KeyEventKind::Press {
            return Ok(Some(map_key(key.code, replay)));
        }
    }
    Ok(None)
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode().context("failed to enable raw mode")?;
    let mut stdout = io::stdout();
    crossterm::execute!(stdout, EnterAlternateScreen)
        .context("failed to enter alternate screen")?;
    Terminal::new(CrosstermBackend::new(stdout)).context("failed to create terminal")
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode().context("failed to disable raw mode")?;
    crossterm::execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("failed to leave alternate screen")?;
    terminal.show_cursor().context("failed to show cursor")?;
    Ok(())
}
