use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, Paragraph, Widget},
};

use crate::phase::Phase;
use crate::playback::TrackInfo;
use crate::session::SessionSnapshot;

const HORIZONTAL_MARGIN: u16 = 2;

pub const KEY_HELP: &str =
    "space start  p pause  r reset  [ ] exercise  { } rest  < > sets  q quit";

/// `MM:SS`, minutes are not capped at 59.
pub fn format_time(seconds: u32) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

pub fn phase_label(phase: Phase) -> &'static str {
    match phase {
        Phase::Preparing => "GET READY",
        Phase::Exercising => "WORK",
        Phase::Resting => "REST",
        Phase::Completed => "DONE",
    }
}

pub fn phase_color(phase: Phase) -> Color {
    match phase {
        Phase::Preparing => Color::Yellow,
        Phase::Exercising => Color::Red,
        Phase::Resting => Color::Green,
        Phase::Completed => Color::Blue,
    }
}

/// Fraction of the current phase already elapsed, in [0, 1].
pub fn progress_ratio(snapshot: &SessionSnapshot) -> f64 {
    if snapshot.phase == Phase::Completed {
        return 1.0;
    }
    let total = snapshot.phase_duration();
    if total == 0 {
        return 0.0;
    }
    let done = total.saturating_sub(snapshot.remaining_seconds);
    (done as f64 / total as f64).clamp(0.0, 1.0)
}

fn run_label(snapshot: &SessionSnapshot) -> &'static str {
    match (snapshot.phase, snapshot.is_running, snapshot.is_paused) {
        (Phase::Completed, _, _) => "finished, press r to go again",
        (_, true, true) => "paused",
        (_, true, false) => "running",
        _ => "ready",
    }
}

/// Whole screen: phase, big countdown, progress, set counter and settings.
pub struct TimerView<'a> {
    pub snapshot: &'a SessionSnapshot,
    pub track: Option<&'a TrackInfo>,
    pub status: Option<&'a str>,
    pub audio_enabled: bool,
}

impl<'a> TimerView<'a> {
    pub fn new(snapshot: &'a SessionSnapshot) -> Self {
        Self {
            snapshot,
            track: None,
            status: None,
            audio_enabled: true,
        }
    }
}

impl Widget for TimerView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let s = self.snapshot;
        let color = phase_color(s.phase);
        let bold = Style::default().add_modifier(Modifier::BOLD);
        let dim = Style::default().add_modifier(Modifier::DIM);

        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(color))
            .title(" hiitr ");
        let inner = block.inner(area);
        block.render(area, buf);

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .horizontal_margin(HORIZONTAL_MARGIN)
            .constraints([
                Constraint::Min(0),
                Constraint::Length(1), // phase
                Constraint::Length(1), // countdown
                Constraint::Length(1),
                Constraint::Length(1), // gauge
                Constraint::Length(1), // sets
                Constraint::Min(0),
                Constraint::Length(1), // config
                Constraint::Length(1), // music / status
                Constraint::Length(1), // keys
            ])
            .split(inner);

        Paragraph::new(Span::styled(
            phase_label(s.phase),
            Style::default().patch(bold).fg(color),
        ))
        .alignment(Alignment::Center)
        .render(chunks[1], buf);

        Paragraph::new(Line::from(vec![
            Span::styled(format_time(s.remaining_seconds), bold),
            Span::styled(format!("  ({})", run_label(s)), dim),
        ]))
        .alignment(Alignment::Center)
        .render(chunks[2], buf);

        Gauge::default()
            .gauge_style(Style::default().fg(color))
            .ratio(progress_ratio(s))
            .label("")
            .render(chunks[4], buf);

        Paragraph::new(format!("Set {}/{}", s.current_set, s.total_sets))
            .alignment(Alignment::Center)
            .render(chunks[5], buf);

        Paragraph::new(Span::styled(
            format!(
                "exercise {}s  rest {}s  sets {}{}",
                s.config.exercise_seconds,
                s.config.rest_seconds,
                s.config.total_sets,
                if self.audio_enabled { "" } else { "  (muted)" }
            ),
            dim,
        ))
        .alignment(Alignment::Center)
        .render(chunks[7], buf);

        let info = match (self.status, self.track) {
            (Some(status), _) => {
                Span::styled(status.to_string(), Style::default().fg(Color::Magenta))
            }
            (None, Some(track)) => Span::styled(
                format!("♪ {} - {}", track.artist, track.title),
                Style::default().add_modifier(Modifier::ITALIC),
            ),
            (None, None) => Span::raw(""),
        };
        Paragraph::new(info)
            .alignment(Alignment::Center)
            .render(chunks[8], buf);

        Paragraph::new(Span::styled(KEY_HELP, dim))
            .alignment(Alignment::Center)
            .render(chunks[9], buf);
    }
}
