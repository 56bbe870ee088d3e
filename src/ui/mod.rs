mod detail;
mod grid;
mod help;

use crate::app::{App, ToastKind, View};
use crate::commands::CommandTable;
use crate::placeholder::{PLACEHOLDER_BG, PLACEHOLDER_FG};
use crate::resolver::ImageRef;
use crate::view::CardImage;
use ratatui::{
    Frame,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::Span,
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// Top-level render dispatch.
pub fn render<S, P, W>(app: &App<S, P, W>, commands: &CommandTable<App<S, P, W>>, frame: &mut Frame) {
    match app.view {
        View::Grid => grid::render(app, frame),
        View::Detail => detail::render(app, frame),
    }

    if let Some(toast) = &app.toast {
        render_toast(&toast.message, toast.kind, frame);
    }

    // Render help overlay on top if active
    if app.show_help {
        help::render(commands, frame);
    }
}

fn render_toast(message: &str, kind: ToastKind, frame: &mut Frame) {
    let area = frame.area();
    let width = (message.width() as u16 + 4).min(area.width);
    let rect = Rect {
        x: area.x + area.width.saturating_sub(width + 1),
        y: area.y + 1,
        width,
        height: 3.min(area.height),
    };
    let color = match kind {
        ToastKind::Info => Color::Green,
        ToastKind::Error => Color::Red,
    };
    frame.render_widget(Clear, rect);
    let toast = Paragraph::new(message)
        .wrap(Wrap { trim: true })
        .style(Style::default().fg(color).add_modifier(Modifier::BOLD))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(color)),
        );
    frame.render_widget(toast, rect);
}

/// One-line description of where a card's image comes from.
pub fn image_summary(image: &CardImage) -> Span<'static> {
    match image {
        CardImage::Skeleton => Span::styled(
            "loading image…",
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        ),
        CardImage::Resolved(ImageRef::Override(bytes)) => Span::styled(
            format!("📷 your photo ({})", format_size(bytes.len())),
            Style::default().fg(Color::Magenta),
        ),
        CardImage::Resolved(ImageRef::Remote(url)) => {
            Span::styled(format!("🖼 {}", url_host(url)), Style::default().fg(Color::Blue))
        }
        CardImage::Placeholder(p) => Span::styled(
            format!(" {} ", p.initials),
            Style::default()
                .fg(PLACEHOLDER_FG)
                .bg(PLACEHOLDER_BG)
                .add_modifier(Modifier::BOLD),
        ),
    }
}

pub fn url_host(url: &str) -> String {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| url.to_string())
}

pub fn format_size(bytes: usize) -> String {
    if bytes >= 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else if bytes >= 1024 {
        format!("{} KB", bytes / 1024)
    } else {
        format!("{} B", bytes)
    }
}

/// Truncate a string to `max_width` display columns, adding "…" if truncated.
pub fn truncate_str(s: &str, max_width: usize) -> String {
    if s.width() <= max_width {
        return s.to_string();
    }
    let mut result = String::new();
    let mut used = 0;
    for c in s.chars() {
        let w = c.width().unwrap_or(0);
        if used + w + 1 > max_width {
            break;
        }
        result.push(c);
        used += w;
    }
    result.push('…');
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::placeholder::placeholder;

    #[test]
    fn test_truncate_str_counts_columns() {
        assert_eq!(truncate_str("Yigüirro", 20), "Yigüirro");
        assert_eq!(truncate_str("Clay-colored Thrush", 8), "Clay-co…");
        assert_eq!(truncate_str("鳥鳥鳥鳥", 5), "鳥鳥…");
    }

    #[test]
    fn test_url_host() {
        assert_eq!(
            url_host("https://inaturalist-open-data.s3.amazonaws.com/photos/1/medium.jpg"),
            "inaturalist-open-data.s3.amazonaws.com"
        );
        assert_eq!(url_host("not a url"), "not a url");
    }

    #[test]
    fn test_image_summary_variants() {
        assert_eq!(image_summary(&CardImage::Skeleton).content, "loading image…");
        let span = image_summary(&CardImage::Placeholder(placeholder("Clay-colored Thrush")));
        assert_eq!(span.content, " CT ");
        assert_eq!(span.style.bg, Some(PLACEHOLDER_BG));
        let span = image_summary(&CardImage::Resolved(ImageRef::Override(vec![0u8; 2048].into())));
        assert_eq!(span.content, "📷 your photo (2 KB)");
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(4 * 1024 * 1024), "4.0 MB");
    }
}
