use crate::commands::{Action, CommandTable};
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
};

const SECTIONS: [(&str, &[Action]); 3] = [
    ("Global", &[Action::Help, Action::Quit, Action::Back]),
    (
        "Browse",
        &[
            Action::Up,
            Action::Down,
            Action::Left,
            Action::Right,
            Action::PageUp,
            Action::PageDown,
            Action::EditQuery,
            Action::NextFamily,
            Action::PrevFamily,
            Action::ToggleSpotted,
            Action::OpenDetail,
        ],
    ),
    (
        "Species",
        &[
            Action::ToggleSeen,
            Action::UploadPhoto,
            Action::OpenUrl,
            Action::RetryImage,
        ],
    ),
];

pub fn render<T>(commands: &CommandTable<T>, frame: &mut Frame) {
    let area = centered_rect(60, 80, frame.area());

    // Clear the area behind the popup
    frame.render_widget(Clear, area);

    let mut help_text = vec![Line::from("")];
    for (title, actions) in SECTIONS {
        help_text.push(Line::from(Span::styled(
            format!("  {}", title),
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        )));
        for &action in actions {
            let keys = commands.keys_for(action).join("/");
            help_text.push(Line::from(vec![
                Span::styled(format!("    {:<12}", keys), Style::default().fg(Color::Yellow)),
                Span::raw(action.description()),
            ]));
        }
        help_text.push(Line::from(""));
    }

    let help = Paragraph::new(help_text)
        .wrap(Wrap { trim: false })
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan))
                .title(" Help — Keybindings ")
                .title_bottom(Line::from(" Press any key to close ").style(Style::default().fg(Color::DarkGray))),
        )
        .style(Style::default().fg(Color::White));

    frame.render_widget(help, area);
}

/// Create a centered rectangle using percentage of parent area.
fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1]);

    horizontal[1]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_action_has_a_help_entry() {
        let listed: Vec<Action> = SECTIONS.iter().flat_map(|(_, a)| a.iter().copied()).collect();
        for action in Action::ALL {
            assert!(listed.contains(&action), "{action:?} missing from help");
        }
        assert_eq!(listed.len(), Action::ALL.len());
    }

    #[test]
    fn test_centered_rect_is_inside_parent() {
        let parent = Rect::new(0, 0, 100, 40);
        let rect = centered_rect(60, 80, parent);
        assert_eq!(rect.width, 60);
        assert_eq!(rect.height, 32);
        assert_eq!(rect.x, 20);
    }
}
