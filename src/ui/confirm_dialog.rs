use super::common::centered_rect;
use crate::app::{App, ConfirmAction};
use ratatui::{
    Frame,
    layout::Alignment,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Padding, Paragraph, Wrap},
};

pub fn render_confirm_dialog(f: &mut Frame, app: &App) {
    let Some(action) = &app.confirm_dialog else {
        return;
    };

    let (title, question, detail) = match action {
        ConfirmAction::StopBatch => (
            " Stop Batch ",
            "Stop the running batch?",
            "Running encodes are terminated and their partial output is removed.",
        ),
        ConfirmAction::ExitApp => (
            " Exit ",
            "A batch is still running. Exit anyway?",
            "The batch and any preview are stopped before exiting.",
        ),
    };

    let button = |label: &'static str, active: bool, color: Color| {
        if active {
            Span::styled(
                label,
                Style::default()
                    .fg(Color::Black)
                    .bg(color)
                    .add_modifier(Modifier::BOLD),
            )
        } else {
            Span::styled(label, Style::default().fg(color))
        }
    };

    let lines = vec![
        Line::from(Span::styled(
            question,
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(Span::styled(detail, Style::default().fg(Color::Gray))),
        Line::from(""),
        Line::from(vec![
            button(" Yes ", app.confirm_selection, Color::Red),
            Span::raw("    "),
            button(" No ", !app.confirm_selection, Color::Green),
        ]),
    ];

    let dialog = Paragraph::new(lines)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Yellow))
                .title(title)
                .title_style(
                    Style::default()
                        .fg(Color::Yellow)
                        .add_modifier(Modifier::BOLD),
                )
                .padding(Padding::uniform(1)),
        );

    let area = centered_rect(50, 35, f.area());
    f.render_widget(Clear, area);
    f.render_widget(dialog, area);
}
