use super::{format_size, image_summary};
use crate::app::{App, InputMode};
use crate::resolver::ImageRef;
use crate::view::CardImage;
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
};

pub fn render<S, P, W>(app: &App<S, P, W>, frame: &mut Frame) {
    let area = frame.area();
    let (Some(detail), Some(record)) = (&app.detail, app.detail_record()) else {
        return;
    };

    // Layout: hero(5) + names(min) + prompt(3) + status(1)
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(5),
            Constraint::Min(5),
            Constraint::Length(3),
            Constraint::Length(1),
        ])
        .split(area);

    // ── Hero ──
    let mut hero_lines = vec![
        Line::from(Span::styled(
            format!(" {}", record.label_name()),
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
        )),
        Line::from(vec![Span::raw(" "), image_summary(&detail.image)]),
    ];
    match &detail.image {
        CardImage::Resolved(ImageRef::Remote(url)) => hero_lines.push(Line::from(Span::styled(
            format!(" {}", url),
            Style::default().fg(Color::Blue).add_modifier(Modifier::UNDERLINED),
        ))),
        CardImage::Resolved(ImageRef::Override(bytes)) => hero_lines.push(Line::from(Span::styled(
            format!(" Stored on this device, {}", format_size(bytes.len())),
            Style::default().fg(Color::DarkGray),
        ))),
        CardImage::Placeholder(_) => hero_lines.push(Line::from(Span::styled(
            " No photo found. Press p to add your own.",
            Style::default().fg(Color::DarkGray),
        ))),
        CardImage::Skeleton => {}
    }
    let hero = Paragraph::new(hero_lines).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray))
            .title(" Species "),
    );
    frame.render_widget(hero, chunks[0]);

    // ── Names and taxonomy ──
    let label = Style::default().fg(Color::DarkGray);
    let field = |name: &'static str, value: &str, style: Style| {
        let value = if value.trim().is_empty() { "—" } else { value };
        Line::from(vec![
            Span::styled(format!(" {:<12}", name), label),
            Span::styled(value.to_string(), style),
        ])
    };
    let white = Style::default().fg(Color::White);
    let seen = match app.grid.store().seen(&record.id) {
        Some(marker) => Span::styled(
            format!("✓ seen on {}", marker.label()),
            Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
        ),
        None => Span::styled("not seen yet", Style::default().fg(Color::DarkGray)),
    };
    let lines = vec![
        field("Dutch", &record.dutch_name, white),
        field("English", &record.english_name, white),
        field("Spanish", &record.spanish_name, white),
        field(
            "Latin",
            &record.latin_name,
            Style::default().fg(Color::Gray).add_modifier(Modifier::ITALIC),
        ),
        Line::from(""),
        field("Family", &record.family, Style::default().fg(Color::Cyan)),
        field("Order", &record.order, Style::default().fg(Color::Cyan)),
        field(
            "Status",
            record.conservation_status.as_deref().unwrap_or(""),
            Style::default().fg(Color::Yellow),
        ),
        Line::from(""),
        Line::from(vec![Span::styled(format!(" {:<12}", "Seen"), label), seen]),
    ];
    let names = Paragraph::new(lines).wrap(Wrap { trim: false }).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray))
            .title(format!(" {} ", record.title())),
    );
    frame.render_widget(names, chunks[1]);

    // ── Photo prompt ──
    let (prompt, style) = if app.input_mode == InputMode::PhotoPath {
        (
            format!(" 📷 Photo file (Enter to save, Esc to cancel): {}", app.path_input),
            Style::default().fg(Color::Magenta),
        )
    } else {
        (" Press p to use your own photo".to_string(), Style::default().fg(Color::DarkGray))
    };
    let prompt_bar = Paragraph::new(prompt.clone()).style(style).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(style)
            .title(" Photo "),
    );
    frame.render_widget(prompt_bar, chunks[2]);
    if app.input_mode == InputMode::PhotoPath {
        use unicode_width::UnicodeWidthStr;
        let cursor_x = chunks[2].x + 1 + prompt.width() as u16;
        frame.set_cursor_position((cursor_x.min(chunks[2].right().saturating_sub(2)), chunks[2].y + 1));
    }

    // ── Status bar ──
    let key = Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD);
    let status_line = Line::from(vec![
        Span::styled(" Space", key),
        Span::raw(" Seen  "),
        Span::styled("p", key),
        Span::raw(" Photo  "),
        Span::styled("o", key),
        Span::raw(" Open image  "),
        Span::styled("r", key),
        Span::raw(" Retry lookup  "),
        Span::styled("Esc", key),
        Span::raw(" Back"),
    ]);
    frame.render_widget(Paragraph::new(status_line), chunks[3]);
}
