use ratatui::style::Color;

pub const PLACEHOLDER_BG: Color = Color::Rgb(0x0f, 0x1b, 0x16);
pub const PLACEHOLDER_FG: Color = Color::Rgb(0x35, 0xc4, 0x8d);

/// Locally generated stand-in for a record without any image.
///
/// Regenerated on every render from the display name; never cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
    pub initials: String,
}

/// Up to two initials from the first letters of the name's words.
pub fn placeholder(name: &str) -> Placeholder {
    if name.trim().is_empty() {
        return Placeholder {
            initials: "??".to_string(),
        };
    }
    let initials = name
        .split_whitespace()
        .filter_map(|word| word.chars().next())
        .take(2)
        .flat_map(char::to_uppercase)
        .collect();
    Placeholder { initials }
}
