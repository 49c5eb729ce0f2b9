use super::common::help_line;
use crate::app::App;
use crate::pairing::FilePair;
use crate::queue::JobStatus;
use crate::utils::format_duration;
use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, List, ListItem, Paragraph},
};

pub fn render_queue(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4),
            Constraint::Min(5),
            Constraint::Length(3),
            Constraint::Length(2),
        ])
        .margin(1)
        .split(f.area());

    render_header(f, app, chunks[0]);

    // Pair list
    let running = app.is_running();
    let items: Vec<ListItem> = app
        .pairs
        .iter()
        .map(|pair| create_queue_item(pair, running))
        .collect();

    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::DarkGray))
                .title(format!(" Pairs ({}) ", app.pairs.len())),
        )
        .highlight_style(Style::default().bg(Color::DarkGray));
    f.render_stateful_widget(list, chunks[1], &mut app.list_state);

    // Batch progress, or the last message when idle
    if running {
        let progress = app.overall_progress();
        let elapsed = app
            .elapsed_time()
            .map(format_duration)
            .unwrap_or_else(|| "--:--".to_string());
        let eta = app
            .estimated_time_remaining()
            .map(format_duration)
            .unwrap_or_else(|| "--:--".to_string());

        let label = format!(
            "{:.1}%  |  {}/{}  |  Elapsed: {}  |  ETA: {}",
            progress, app.batch_processed, app.batch_total, elapsed, eta
        );

        let gauge = Gauge::default()
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::DarkGray))
                    .title(" Batch "),
            )
            .gauge_style(Style::default().fg(Color::Cyan).bg(Color::DarkGray))
            .percent(progress as u16)
            .label(label);
        f.render_widget(gauge, chunks[2]);
    } else {
        let text = app.message.clone().unwrap_or_else(|| {
            if app.pairs.is_empty() {
                "Press a to add files or folders".to_string()
            } else {
                "Ready".to_string()
            }
        });
        let status = Paragraph::new(text).alignment(Alignment::Center).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::DarkGray))
                .title(" Status "),
        );
        f.render_widget(status, chunks[2]);
    }

    let hints: &[(&str, &str)] = if running {
        &[("Esc", "Stop"), ("↑↓", "Navigate"), ("q", "Quit")]
    } else {
        &[
            ("Enter", "Start"),
            ("a", "Add"),
            ("p", "Preview"),
            ("d", "Remove"),
            ("c", "Clear"),
            ("i/o", "Options"),
            ("[ ] - +", "Volume"),
            ("q", "Quit"),
        ]
    };
    let help = Paragraph::new(help_line(hints)).centered();
    f.render_widget(help, chunks[3]);
}

fn render_header(f: &mut Frame, app: &App, area: ratatui::layout::Rect) {
    let flag = |on: bool| if on { "on" } else { "off" };

    let mut lines = vec![
        Line::from(vec![
            Span::styled("Original ", Style::default().fg(Color::DarkGray)),
            Span::styled(
                format!("{:>3}%", app.mix.original_volume),
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            ),
            Span::raw("   "),
            Span::styled("Translation ", Style::default().fg(Color::DarkGray)),
            Span::styled(
                format!("{:>3}%", app.mix.translation_volume),
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            ),
            Span::raw("   "),
            Span::styled("Invert ", Style::default().fg(Color::DarkGray)),
            Span::raw(flag(app.mix.invert_tracks)),
            Span::raw("   "),
            Span::styled("Keep original ", Style::default().fg(Color::DarkGray)),
            Span::raw(flag(app.mix.keep_original_track)),
        ]),
    ];

    if app.is_previewing() {
        lines.push(Line::from(Span::styled(
            "♪ Preview playing (p to stop)",
            Style::default().fg(Color::Magenta),
        )));
    } else if let Some(pair) = app.selected_pair() {
        let detail = match &pair.audio {
            Some(_) => format!("Audio: {}", pair.audio_name()),
            None => track_roles(pair, app.mix.invert_tracks),
        };
        lines.push(Line::from(Span::styled(
            detail,
            Style::default().fg(Color::DarkGray),
        )));
    }

    let header = Paragraph::new(lines).alignment(Alignment::Center).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray))
            .title(" dubmix "),
    );
    f.render_widget(header, area);
}

/// Embedded tracks with the role each one plays in the mix
fn track_roles(pair: &FilePair, invert: bool) -> String {
    let (Some(tracks), Some(roles)) = (pair.tracks(), pair.embedded_roles(invert)) else {
        return format!("Tracks: {}", pair.track_summary());
    };
    tracks
        .iter()
        .map(|t| match roles.role_of(t) {
            Some(role) => format!("{} {}", t.display_name(), role.label()),
            None => t.display_name(),
        })
        .collect::<Vec<_>>()
        .join("  ")
}

fn create_queue_item(pair: &FilePair, running: bool) -> ListItem<'static> {
    let name = pair.display_name();
    let source = match &pair.audio {
        Some(_) => format!(" + {}", pair.audio_name()),
        None => format!(" [{}]", pair.track_summary()),
    };

    let (style, status) = match &pair.status {
        JobStatus::Pending if running => (Style::default().fg(Color::DarkGray), "Queued".to_string()),
        JobStatus::Pending => (Style::default().fg(Color::White), String::new()),
        JobStatus::Processing { progress } => (
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            format!("{:.1}%", progress),
        ),
        JobStatus::Done => (Style::default().fg(Color::Green), "Done".to_string()),
        JobStatus::Error { message } => (Style::default().fg(Color::Red), message.clone()),
        JobStatus::Stopped => (Style::default().fg(Color::Yellow), "Stopped".to_string()),
    };

    ListItem::new(Line::from(vec![
        Span::styled(format!("  {} {}", pair.status.symbol(), name), style),
        Span::styled(source, Style::default().fg(Color::DarkGray)),
        Span::styled(format!("  {}", status), style),
    ]))
}
