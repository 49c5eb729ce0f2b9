use super::common::help_line;
use crate::app::App;
use crate::pairing::{MediaKind, classify};
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph},
};
use std::path::Path;

/// What an explorer row points at
enum Entry {
    Parent,
    Folder,
    Media(MediaKind),
}

impl Entry {
    fn of(path: &Path) -> Option<Self> {
        if path == Path::new("..") {
            Some(Entry::Parent)
        } else if path.is_dir() {
            Some(Entry::Folder)
        } else {
            classify(path).map(Entry::Media)
        }
    }

    fn icon(&self) -> (&'static str, Color) {
        match self {
            Entry::Parent => ("↑", Color::Yellow),
            Entry::Folder => ("▶", Color::Blue),
            Entry::Media(MediaKind::Video) => ("▷", Color::Green),
            Entry::Media(MediaKind::Audio) => ("♪", Color::Magenta),
        }
    }
}

pub fn render_explorer(f: &mut Frame, app: &mut App) {
    let [header_area, list_area, help_area] = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(5),
            Constraint::Length(2),
        ])
        .margin(1)
        .areas(f.area());

    let (videos, audios) = app
        .dir_entries
        .iter()
        .filter_map(|p| classify(p))
        .fold((0, 0), |(v, a), kind| match kind {
            MediaKind::Video => (v + 1, a),
            MediaKind::Audio => (v, a + 1),
        });

    let header = Paragraph::new(Line::from(vec![
        Span::styled(
            app.current_dir.to_string_lossy().to_string(),
            Style::default().fg(Color::Cyan),
        ),
        Span::styled(
            format!("   {} video, {} audio", videos, audios),
            Style::default().fg(Color::DarkGray),
        ),
    ]))
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray))
            .title(" Add Files "),
    );
    f.render_widget(header, header_area);

    let rows: Vec<ListItem> = app
        .dir_entries
        .iter()
        .filter_map(|path| Entry::of(path).map(|entry| entry_row(path, &entry)))
        .collect();

    let list = List::new(rows)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::DarkGray)),
        )
        .highlight_symbol("> ")
        .highlight_style(
            Style::default()
                .bg(Color::DarkGray)
                .add_modifier(Modifier::BOLD),
        );
    f.render_stateful_widget(list, list_area, &mut app.explorer_list_state);

    let help = Paragraph::new(help_line(&[
        ("↑↓", "Move"),
        ("Enter", "Open folder"),
        ("Space", "Add file or folder"),
        ("Esc", "Back"),
    ]))
    .centered();
    f.render_widget(help, help_area);
}

fn entry_row(path: &Path, entry: &Entry) -> ListItem<'static> {
    let name = match entry {
        Entry::Parent => "..".to_string(),
        _ => path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.to_string_lossy().to_string()),
    };
    let (icon, color) = entry.icon();

    ListItem::new(Line::from(vec![
        Span::styled(format!("{} ", icon), Style::default().fg(color)),
        Span::styled(name, Style::default().fg(color)),
    ]))
}
