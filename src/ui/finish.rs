use super::common::help_line;
use crate::app::App;
use crate::pairing::FilePair;
use crate::queue::{BatchSummary, JobStatus};
use ratatui::{
    Frame,
    layout::{Constraint, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph},
};

pub fn render_finish(f: &mut Frame, app: &App) {
    let [summary_area, results_area, help_area] = Layout::vertical([
        Constraint::Length(7),
        Constraint::Min(5),
        Constraint::Length(2),
    ])
    .margin(1)
    .areas(f.area());

    let framed = |title: &'static str| {
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray))
            .title(title)
    };

    let lines = app.summary.as_ref().map(summary_lines).unwrap_or_default();
    f.render_widget(
        Paragraph::new(lines).centered().block(framed(" Summary ")),
        summary_area,
    );

    let results: Vec<ListItem> = app.pairs.iter().map(result_row).collect();
    f.render_widget(List::new(results).block(framed(" Results ")), results_area);

    f.render_widget(
        Paragraph::new(help_line(&[("Enter", "Back to queue"), ("q", "Quit")])).centered(),
        help_area,
    );
}

fn summary_lines(summary: &BatchSummary) -> Vec<Line<'static>> {
    let (headline, color) = match summary.cancelled {
        true => ("Batch Stopped", Color::Yellow),
        false => ("Batch Complete", Color::Green),
    };
    let count = |symbol: &'static str, color: Color, label: &str, n: usize| {
        [
            Span::styled(symbol, Style::default().fg(color)),
            Span::raw(format!(" {} {}   ", label, n)),
        ]
    };

    let mut lines = vec![
        Line::from(Span::styled(
            headline,
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(
            [
                count("✓", Color::Green, "Done", summary.done),
                count("✗", Color::Red, "Errors", summary.errors),
                count("⏹", Color::Yellow, "Stopped", summary.stopped),
            ]
            .concat(),
        ),
    ];

    // Per-pair detail lines are indented; the results list shows those.
    lines.extend(
        summary
            .report_lines()
            .into_iter()
            .skip(1)
            .filter(|l| !l.starts_with("  "))
            .map(|l| Line::from(Span::styled(l, Style::default().fg(Color::DarkGray)))),
    );
    lines
}

fn result_row(pair: &FilePair) -> ListItem<'static> {
    let (color, detail) = match &pair.status {
        JobStatus::Done => (Color::Green, String::new()),
        JobStatus::Error { message } => (Color::Red, format!(": {}", message)),
        JobStatus::Stopped => (Color::Yellow, String::new()),
        _ => (Color::DarkGray, String::new()),
    };

    ListItem::new(format!(
        "  {} {}{}",
        pair.status.symbol(),
        pair.display_name(),
        detail
    ))
    .style(Style::default().fg(color))
}
