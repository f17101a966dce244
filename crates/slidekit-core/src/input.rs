//! Pointer and keyboard events delivered by the host.

use kurbo::Point;
use serde::{Deserialize, Serialize};

use crate::document::ElementId;
use crate::selection::HandleKind;

/// Mouse button identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MouseButton {
    #[default]
    Left,
    Right,
    Middle,
}

/// Modifier keys state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
}

impl Modifiers {
    /// Ctrl on Linux/Windows, Cmd on macOS.
    pub fn command(self) -> bool {
        self.ctrl || self.meta
    }
}

/// What the pointer landed on, as reported by the rendered tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PointerTarget {
    /// Empty canvas.
    Canvas,
    /// An element body.
    Element(ElementId),
    /// A resize handle of an element.
    Handle(ElementId, HandleKind),
    /// Outside the canvas (toolbars, panels).
    Outside,
}

/// Pointer event in client (viewport) coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PointerEvent {
    Down {
        position: Point,
        button: MouseButton,
        modifiers: Modifiers,
        target: PointerTarget,
    },
    Move {
        position: Point,
    },
    Up {
        position: Point,
        button: MouseButton,
    },
}

/// Keyboard event. `key` follows DOM `KeyboardEvent.key` naming.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEvent {
    pub key: String,
    pub modifiers: Modifiers,
}

impl KeyEvent {
    pub fn new(key: impl Into<String>, modifiers: Modifiers) -> Self {
        Self {
            key: key.into(),
            modifiers,
        }
    }

    /// A key with no modifiers held.
    pub fn plain(key: impl Into<String>) -> Self {
        Self::new(key, Modifiers::default())
    }

    /// A key with ctrl held.
    pub fn ctrl(key: impl Into<String>) -> Self {
        Self::new(
            key,
            Modifiers {
                ctrl: true,
                ..Modifiers::default()
            },
        )
    }
}

/// Editor command bound to a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyCommand {
    Cancel,
    Delete,
    Undo,
    Redo,
    Duplicate,
    SelectAll,
}

impl KeyCommand {
    /// Map a key event to a command.
    pub fn from_event(event: &KeyEvent) -> Option<Self> {
        let command = event.modifiers.command();
        let key = event.key.to_ascii_lowercase();
        match key.as_str() {
            "escape" => Some(KeyCommand::Cancel),
            "delete" | "backspace" if !command => Some(KeyCommand::Delete),
            "z" if command && event.modifiers.shift => Some(KeyCommand::Redo),
            "z" if command => Some(KeyCommand::Undo),
            "y" if command => Some(KeyCommand::Redo),
            "d" if command => Some(KeyCommand::Duplicate),
            "a" if command => Some(KeyCommand::SelectAll),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_bindings() {
        assert_eq!(KeyCommand::from_event(&KeyEvent::plain("Escape")), Some(KeyCommand::Cancel));
        assert_eq!(KeyCommand::from_event(&KeyEvent::plain("Backspace")), Some(KeyCommand::Delete));
        assert_eq!(KeyCommand::from_event(&KeyEvent::ctrl("z")), Some(KeyCommand::Undo));
        assert_eq!(KeyCommand::from_event(&KeyEvent::ctrl("y")), Some(KeyCommand::Redo));
        assert_eq!(KeyCommand::from_event(&KeyEvent::plain("z")), None);

        let redo = KeyEvent::new(
            "Z",
            Modifiers {
                meta: true,
                shift: true,
                ..Modifiers::default()
            },
        );
        assert_eq!(KeyCommand::from_event(&redo), Some(KeyCommand::Redo));
    }

    #[test]
    fn test_event_json() {
        let event = PointerEvent::Down {
            position: Point::new(10.0, 20.0),
            button: MouseButton::Left,
            modifiers: Modifiers::default(),
            target: PointerTarget::Handle("el-1".into(), HandleKind::SouthEast),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"se\""));
        let back: PointerEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}
