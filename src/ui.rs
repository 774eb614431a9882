pub mod map;

use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget},
};

use crate::App;

const HORIZONTAL_MARGIN: u16 = 2;
const VERTICAL_MARGIN: u16 = 1;

impl Widget for &App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let display = self.tracker.display();
        let running = self.tracker.is_running();

        let bold_style = Style::default().add_modifier(Modifier::BOLD);
        let italic_style = Style::default().add_modifier(Modifier::ITALIC);
        let accent = if running { Color::Green } else { Color::Gray };

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .horizontal_margin(HORIZONTAL_MARGIN)
            .vertical_margin(VERTICAL_MARGIN)
            .constraints([
                Constraint::Length(3), // counters
                Constraint::Min(5),    // map
                Constraint::Length(1), // status line
                Constraint::Length(1), // legend
            ])
            .split(area);

        let counters = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Ratio(1, 3),
                Constraint::Ratio(1, 3),
                Constraint::Ratio(1, 3),
            ])
            .split(chunks[0]);

        for (value, title, rect) in [
            (&display.elapsed, "Time", counters[0]),
            (&display.distance, "Distance", counters[1]),
            (&display.steps, "Steps", counters[2]),
        ] {
            Paragraph::new(Span::styled(value.as_str(), bold_style.fg(accent)))
                .alignment(Alignment::Center)
                .block(Block::default().borders(Borders::ALL).title(title))
                .render(rect, buf);
        }

        map::render_map(self.tracker.path(), chunks[1], buf);

        let mut status = vec![Span::styled(
            if running { "walking" } else { "stopped" },
            bold_style.fg(accent),
        )];
        if let Some(position) = map::format_position(self.tracker.path()) {
            status.push(Span::raw(format!("   at {position}")));
        }
        if running && !self.tracker.motion_subscribed() {
            status.push(Span::styled(
                "   no motion sensor",
                Style::default().fg(Color::Yellow),
            ));
        }
        if let Some(user) = &self.user {
            status.push(Span::styled(format!("   {}", user.nickname), italic_style));
        }
        Paragraph::new(Line::from(status))
            .alignment(Alignment::Center)
            .render(chunks[2], buf);

        Paragraph::new(Span::styled(
            format!("(space) {} / (r)eset / (q)uit", display.toggle_label),
            italic_style,
        ))
        .alignment(Alignment::Center)
        .render(chunks[3], buf);
    }
}
