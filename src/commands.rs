//! Key bindings mapped to named actions, and actions mapped to handlers.
//!
//! Both tables are checked when built, so a key can never be bound twice and
//! every action has something to run.

use crate::error::AppError;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Action {
    Quit,
    Help,
    Back,
    EditQuery,
    NextFamily,
    PrevFamily,
    ToggleSpotted,
    ToggleSeen,
    OpenDetail,
    UploadPhoto,
    OpenUrl,
    RetryImage,
    Up,
    Down,
    Left,
    Right,
    PageUp,
    PageDown,
}

impl Action {
    pub const ALL: [Action; 18] = [
        Action::Quit,
        Action::Help,
        Action::Back,
        Action::EditQuery,
        Action::NextFamily,
        Action::PrevFamily,
        Action::ToggleSpotted,
        Action::ToggleSeen,
        Action::OpenDetail,
        Action::UploadPhoto,
        Action::OpenUrl,
        Action::RetryImage,
        Action::Up,
        Action::Down,
        Action::Left,
        Action::Right,
        Action::PageUp,
        Action::PageDown,
    ];

    pub fn description(self) -> &'static str {
        match self {
            Action::Quit => "Quit",
            Action::Help => "Toggle this help",
            Action::Back => "Back to grid / clear search",
            Action::EditQuery => "Search names",
            Action::NextFamily => "Next family",
            Action::PrevFamily => "Previous family",
            Action::ToggleSpotted => "Show spotted birds only",
            Action::ToggleSeen => "Mark as seen / not seen",
            Action::OpenDetail => "Open species detail",
            Action::UploadPhoto => "Use your own photo",
            Action::OpenUrl => "Open image in browser",
            Action::RetryImage => "Look up the image again",
            Action::Up => "Move up",
            Action::Down => "Move down",
            Action::Left => "Move left",
            Action::Right => "Move right",
            Action::PageUp => "Page up",
            Action::PageDown => "Page down",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyBinding {
    pub code: KeyCode,
    pub modifiers: KeyModifiers,
}

impl KeyBinding {
    pub const fn plain(code: KeyCode) -> Self {
        Self {
            code,
            modifiers: KeyModifiers::NONE,
        }
    }

    pub const fn ctrl(c: char) -> Self {
        Self {
            code: KeyCode::Char(c),
            modifiers: KeyModifiers::CONTROL,
        }
    }

    /// Shift is part of the character for printable keys, so it is dropped.
    pub fn from_event(key: KeyEvent) -> Self {
        let mut modifiers = key.modifiers & (KeyModifiers::CONTROL | KeyModifiers::ALT | KeyModifiers::SHIFT);
        if matches!(key.code, KeyCode::Char(_)) {
            modifiers.remove(KeyModifiers::SHIFT);
        }
        Self {
            code: key.code,
            modifiers,
        }
    }

    pub fn label(&self) -> String {
        let key = match self.code {
            KeyCode::Char(' ') => "Space".to_string(),
            KeyCode::Char(c) => c.to_string(),
            KeyCode::Enter => "Enter".to_string(),
            KeyCode::Esc => "Esc".to_string(),
            KeyCode::Up => "↑".to_string(),
            KeyCode::Down => "↓".to_string(),
            KeyCode::Left => "←".to_string(),
            KeyCode::Right => "→".to_string(),
            KeyCode::PageUp => "PgUp".to_string(),
            KeyCode::PageDown => "PgDn".to_string(),
            other => format!("{other:?}"),
        };
        if self.modifiers.contains(KeyModifiers::CONTROL) {
            format!("Ctrl+{key}")
        } else {
            key
        }
    }
}

pub type Handler<T> = fn(&mut T);

pub struct CommandTable<T> {
    bindings: HashMap<KeyBinding, Action>,
    handlers: HashMap<Action, Handler<T>>,
}

impl<T> CommandTable<T> {
    /// Build and validate the tables.
    ///
    /// Fails on a key bound twice, an action registered twice, or any action
    /// in [`Action::ALL`] without a handler.
    pub fn new(
        bindings: &[(KeyBinding, Action)],
        handlers: &[(Action, Handler<T>)],
    ) -> Result<Self, AppError> {
        let mut binding_map = HashMap::new();
        for &(key, action) in bindings {
            if let Some(existing) = binding_map.insert(key, action) {
                return Err(AppError::Bindings(format!(
                    "{} is bound to both {:?} and {:?}",
                    key.label(),
                    existing,
                    action
                )));
            }
        }

        let mut handler_map = HashMap::new();
        for &(action, handler) in handlers {
            if handler_map.insert(action, handler).is_some() {
                return Err(AppError::Bindings(format!("{action:?} has two handlers")));
            }
        }
        if let Some(missing) = Action::ALL.iter().find(|a| !handler_map.contains_key(*a)) {
            return Err(AppError::Bindings(format!("{missing:?} has no handler")));
        }

        Ok(Self {
            bindings: binding_map,
            handlers: handler_map,
        })
    }

    pub fn action_for(&self, key: KeyEvent) -> Option<Action> {
        self.bindings.get(&KeyBinding::from_event(key)).copied()
    }

    /// Run the handler bound to `key`. Returns `false` for unbound keys.
    pub fn dispatch(&self, target: &mut T, key: KeyEvent) -> bool {
        let Some(action) = self.action_for(key) else {
            return false;
        };
        match self.handlers.get(&action) {
            Some(handler) => {
                handler(target);
                true
            }
            None => false,
        }
    }

    /// Keys for `action`, in a stable order for display.
    pub fn keys_for(&self, action: Action) -> Vec<String> {
        let mut keys: Vec<String> = self
            .bindings
            .iter()
            .filter(|(_, a)| **a == action)
            .map(|(k, _)| k.label())
            .collect();
        keys.sort();
        keys
    }
}

/// The stock key map.
pub fn default_bindings() -> Vec<(KeyBinding, Action)> {
    use KeyCode::*;
    vec![
        (KeyBinding::plain(Char('q')), Action::Quit),
        (KeyBinding::ctrl('c'), Action::Quit),
        (KeyBinding::plain(Char('?')), Action::Help),
        (KeyBinding::plain(Esc), Action::Back),
        (KeyBinding::plain(Char('/')), Action::EditQuery),
        (KeyBinding::plain(Char('f')), Action::NextFamily),
        (KeyBinding::plain(Char('F')), Action::PrevFamily),
        (KeyBinding::plain(Char('v')), Action::ToggleSpotted),
        (KeyBinding::plain(Char(' ')), Action::ToggleSeen),
        (KeyBinding::plain(Enter), Action::OpenDetail),
        (KeyBinding::plain(Char('p')), Action::UploadPhoto),
        (KeyBinding::plain(Char('o')), Action::OpenUrl),
        (KeyBinding::plain(Char('r')), Action::RetryImage),
        (KeyBinding::plain(Up), Action::Up),
        (KeyBinding::plain(Char('k')), Action::Up),
        (KeyBinding::plain(Down), Action::Down),
        (KeyBinding::plain(Char('j')), Action::Down),
        (KeyBinding::plain(Left), Action::Left),
        (KeyBinding::plain(Char('h')), Action::Left),
        (KeyBinding::plain(Right), Action::Right),
        (KeyBinding::plain(Char('l')), Action::Right),
        (KeyBinding::plain(PageUp), Action::PageUp),
        (KeyBinding::plain(PageDown), Action::PageDown),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Counter {
        hits: Vec<Action>,
    }

    fn quit(c: &mut Counter) {
        c.hits.push(Action::Quit);
    }

    fn down(c: &mut Counter) {
        c.hits.push(Action::Down);
    }

    fn prev_family(c: &mut Counter) {
        c.hits.push(Action::PrevFamily);
    }

    fn ignore(_: &mut Counter) {}

    fn handlers() -> Vec<(Action, Handler<Counter>)> {
        Action::ALL
            .iter()
            .map(|&action| {
                let handler: Handler<Counter> = match action {
                    Action::Quit => quit,
                    Action::Down => down,
                    Action::PrevFamily => prev_family,
                    _ => ignore,
                };
                (action, handler)
            })
            .collect()
    }

    fn press(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, modifiers)
    }

    #[test]
    fn test_default_table_is_valid_and_complete() {
        let table = CommandTable::new(&default_bindings(), &handlers()).unwrap();
        for action in Action::ALL {
            assert!(!table.keys_for(action).is_empty(), "{action:?} has no key");
        }
        assert_eq!(table.keys_for(Action::Quit), ["Ctrl+c", "q"]);
    }

    #[test]
    fn test_dispatch_routes_to_handler() {
        let table = CommandTable::new(&default_bindings(), &handlers()).unwrap();
        let mut counter = Counter::default();
        assert!(table.dispatch(&mut counter, press(KeyCode::Char('j'), KeyModifiers::NONE)));
        assert!(table.dispatch(&mut counter, press(KeyCode::Char('c'), KeyModifiers::CONTROL)));
        // Terminals report uppercase letters with SHIFT set.
        assert!(table.dispatch(&mut counter, press(KeyCode::Char('F'), KeyModifiers::SHIFT)));
        assert!(!table.dispatch(&mut counter, press(KeyCode::Char('z'), KeyModifiers::NONE)));
        assert_eq!(counter.hits, [Action::Down, Action::Quit, Action::PrevFamily]);
    }

    #[test]
    fn test_duplicate_binding_rejected() {
        let mut bindings = default_bindings();
        bindings.push((KeyBinding::plain(KeyCode::Char('q')), Action::Help));
        let err = CommandTable::new(&bindings, &handlers()).err().unwrap();
        assert!(matches!(err, AppError::Bindings(msg) if msg.contains("Quit")));
    }

    #[test]
    fn test_missing_handler_rejected() {
        let partial: Vec<_> = handlers()
            .into_iter()
            .filter(|(a, _)| *a != Action::OpenUrl)
            .collect();
        let err = CommandTable::new(&default_bindings(), &partial).err().unwrap();
        assert!(matches!(err, AppError::Bindings(msg) if msg.contains("OpenUrl")));
    }

    #[test]
    fn test_duplicate_handler_rejected() {
        let mut doubled = handlers();
        doubled.push((Action::Quit, ignore as Handler<Counter>));
        assert!(CommandTable::new(&default_bindings(), &doubled).is_err());
    }
}
