use super::{image_summary, truncate_str};
use crate::app::{App, InputMode};
use crate::records::SeenMarker;
use crate::scheduler::Span as RowSpan;
use crate::view::Card;
use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
};

pub fn render<S, P, W>(app: &App<S, P, W>, frame: &mut Frame) {
    let area = frame.area();

    // Layout: header(1) + filter(3) + grid(min) + status(1)
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(3),
            Constraint::Min(3),
            Constraint::Length(1),
        ])
        .split(area);

    // ── Header ──
    let header = Line::from(vec![
        Span::styled(
            " 🐦 birdnerd   ",
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ),
        Span::raw(format!(
            "{} species found — {} total",
            app.grid.filtered_len(),
            app.grid.store().len()
        )),
    ]);
    frame.render_widget(Paragraph::new(header), chunks[0]);

    render_filter_bar(app, frame, chunks[1]);
    render_cards(app, frame, chunks[2]);

    // ── Status bar ──
    let key = Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD);
    let mut status = vec![
        Span::styled(" ←↑↓→", key),
        Span::raw(" Move  "),
        Span::styled("Space", key),
        Span::raw(" Seen  "),
        Span::styled("Enter", key),
        Span::raw(" Detail  "),
        Span::styled("p", key),
        Span::raw(" Photo  "),
        Span::styled("?", key),
        Span::raw(" Help  "),
    ];
    if !app.grid.cards().is_empty() {
        status.push(Span::styled(
            format!("{}/{}", app.selected + 1, app.grid.filtered_len()),
            Style::default().fg(Color::DarkGray),
        ));
    }
    frame.render_widget(Paragraph::new(Line::from(status)), chunks[3]);
}

fn render_filter_bar<S, P, W>(app: &App<S, P, W>, frame: &mut Frame, area: Rect) {
    let filter = app.grid.filter();
    let (label, text, style) = match app.input_mode {
        InputMode::PhotoPath => (
            " 📷 Photo file (Enter to save, Esc to cancel): ",
            app.path_input.clone(),
            Style::default().fg(Color::Magenta),
        ),
        InputMode::EditingQuery => (
            " 🔍 Search (Enter to finish): ",
            filter.query.clone(),
            Style::default().fg(Color::Yellow),
        ),
        InputMode::Normal => (
            " 🔍 Search (/): ",
            filter.query.clone(),
            Style::default().fg(Color::DarkGray),
        ),
    };

    let families = app.grid.families();
    let family = match &filter.family {
        Some(f) => {
            let position = families.iter().position(|x| x == f).map_or(0, |i| i + 1);
            format!("{} {}/{}", f, position, families.len())
        }
        None => "All families".to_string(),
    };
    let spotted = if filter.spotted_only { "spotted only" } else { "all birds" };
    let line = Line::from(vec![
        Span::raw(label),
        Span::styled(text.clone(), Style::default().fg(Color::White)),
    ]);
    let bar = Paragraph::new(line).style(style).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(style)
            .title(" Filters ")
            .title(
                Line::from(format!(" {} (f/F) · {} (v) ", family, spotted)).alignment(Alignment::Right),
            ),
    );
    frame.render_widget(bar, area);

    if app.input_mode != InputMode::Normal {
        use unicode_width::UnicodeWidthStr;
        let cursor_x = area.x + 1 + label.width() as u16 + text.width() as u16;
        frame.set_cursor_position((cursor_x.min(area.right().saturating_sub(2)), area.y + 1));
    }
}

fn render_cards<S, P, W>(app: &App<S, P, W>, frame: &mut Frame, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(" Species ");
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let cards = app.grid.cards();
    if cards.is_empty() {
        let empty = Paragraph::new("No birds match these filters")
            .alignment(Alignment::Center)
            .style(Style::default().fg(Color::DarkGray));
        frame.render_widget(empty, inner);
        return;
    }

    let geometry = app.geometry;
    let viewport = RowSpan::new(app.scroll_top, u32::from(inner.height));
    let column_width = inner.width / geometry.columns.max(1) as u16;

    for (index, card) in cards.iter().enumerate() {
        let span = geometry.span_of(index);
        if !span.intersects(&viewport) {
            continue;
        }
        let column = (index % geometry.columns) as u16;
        let x = inner.x + column * column_width;
        render_card(app, frame, card, index == app.selected, span, viewport, x, column_width, inner.y);
    }

    let marker = geometry.sentinel_span(cards.len());
    if marker.intersects(&viewport) && marker.top < viewport.bottom() {
        let y = inner.y + (marker.top - viewport.top) as u16;
        let text = if app.has_more() {
            "Loading more…".to_string()
        } else {
            format!("End of list · {} species", app.grid.filtered_len())
        };
        let line = Paragraph::new(text)
            .alignment(Alignment::Center)
            .style(Style::default().fg(Color::DarkGray));
        frame.render_widget(line, Rect::new(inner.x, y, inner.width, 1));
    }
}

/// Draw one card, clipped to the viewport.
#[allow(clippy::too_many_arguments)]
fn render_card<S, P, W>(
    app: &App<S, P, W>,
    frame: &mut Frame,
    card: &Card,
    selected: bool,
    span: RowSpan,
    viewport: RowSpan,
    x: u16,
    width: u16,
    origin_y: u16,
) {
    let record = app.grid.record_of(card);
    let top = span.top.max(viewport.top);
    let bottom = span.bottom().min(viewport.bottom());
    if bottom <= top {
        return;
    }
    let clipped_top = top - span.top;
    let clipped_bottom = span.bottom() - bottom;

    let mut borders = Borders::LEFT | Borders::RIGHT;
    if clipped_top == 0 {
        borders |= Borders::TOP;
    }
    if clipped_bottom == 0 {
        borders |= Borders::BOTTOM;
    }
    let border_style = if selected {
        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::DarkGray)
    };

    let text_width = width.saturating_sub(4) as usize;
    let seen = app.grid.store().seen(&record.id);
    let lines = vec![
        title_line(record.title(), seen, text_width),
        Line::from(Span::styled(
            truncate_str(&record.latin_name, text_width),
            Style::default().fg(Color::Gray).add_modifier(Modifier::ITALIC),
        )),
        Line::from(Span::styled(
            truncate_str(record.badge(), text_width),
            Style::default().fg(Color::Cyan),
        )),
        Line::from(image_summary(&card.image)),
    ];

    let scroll = clipped_top.saturating_sub(1) as u16;
    let paragraph = Paragraph::new(lines)
        .scroll((scroll, 0))
        .block(Block::default().borders(borders).border_style(border_style));
    let rect = Rect::new(x, origin_y + (top - viewport.top) as u16, width, (bottom - top) as u16);
    frame.render_widget(paragraph, rect);
}

/// Card title, followed by the seen date when there is one.
fn title_line(title: &str, seen: Option<SeenMarker>, width: usize) -> Line<'static> {
    use unicode_width::UnicodeWidthStr;

    let badge = seen.map(|marker| format!(" ✓ {}", marker.label()));
    let badge_width = badge.as_deref().map_or(0, UnicodeWidthStr::width);
    let mut spans = vec![Span::styled(
        truncate_str(title, width.saturating_sub(badge_width)),
        Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
    )];
    if let Some(badge) = badge {
        spans.push(Span::styled(badge, Style::default().fg(Color::Green)));
    }
    Line::from(spans)
}
