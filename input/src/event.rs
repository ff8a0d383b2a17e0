use std::time::Duration;

#[cfg(not(target_arch = "wasm32"))]
pub use std::time::Instant;
#[cfg(target_arch = "wasm32")]
pub use web_time::Instant;

use hud_geometry::Point;

use crate::PointerId;

/// The kind of device that produced a pointer event. Mouse, pen, and touch input all share the same
/// event model and must produce identical gesture behavior.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub enum PointerKind {
    #[default]
    Mouse,
    Pen,
    Touch,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub enum Button {
    #[default]
    Primary,
    Auxiliary,
    Secondary,
    Other(i16),
}

impl Button {
    /// Converts the DOM `MouseEvent.button` numbering.
    pub fn from_dom(button: i16) -> Self {
        match button {
            0 => Button::Primary,
            1 => Button::Auxiliary,
            2 => Button::Secondary,
            other => Button::Other(other),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct PointerEvent {
    pub pointer: PointerId,
    pub kind: PointerKind,
    /// `false` for the additional contacts of a multi-touch gesture.
    pub is_primary: bool,
    pub button: Button,
    /// Viewport coordinates in CSS pixels.
    pub pos: Point,
    pub time: Instant,
}

impl PointerEvent {
    /// A primary mouse event.
    pub fn new(pointer: impl Into<PointerId>, pos: impl Into<Point>, time: Instant) -> Self {
        Self {
            pointer: pointer.into(),
            kind: PointerKind::Mouse,
            is_primary: true,
            button: Button::Primary,
            pos: pos.into(),
            time,
        }
    }

    /// A touch contact. Hosts report only the first touch of a touch list, so it is always the
    /// primary one.
    pub fn touch(identifier: i32, pos: impl Into<Point>, time: Instant) -> Self {
        Self {
            kind: PointerKind::Touch,
            ..Self::new(identifier, pos, time)
        }
    }

    #[must_use]
    pub fn with_button(mut self, button: Button) -> Self {
        self.button = button;
        self
    }

    #[must_use]
    pub fn with_kind(mut self, kind: PointerKind) -> Self {
        self.kind = kind;
        self
    }

    #[must_use]
    pub fn secondary_contact(mut self) -> Self {
        self.is_primary = false;
        self
    }

    /// A press that may start a gesture: the primary contact with the primary button.
    pub fn is_primary_press(&self) -> bool {
        self.is_primary && self.button == Button::Primary
    }

    /// The same event, `offset` later and at `pos`.
    #[must_use]
    pub fn moved_to(&self, pos: impl Into<Point>, offset: Duration) -> Self {
        Self {
            pos: pos.into(),
            time: self.time + offset,
            ..self.clone()
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Key {
    Space,
    Enter,
    Other,
}

impl Key {
    /// Maps the DOM `KeyboardEvent.code` / `KeyboardEvent.key` pair.
    pub fn from_dom(code: &str, key: &str) -> Self {
        if code == "Space" || key == " " {
            return Key::Space;
        }
        if key == "Enter" || code == "Enter" || code == "NumpadEnter" {
            return Key::Enter;
        }
        Key::Other
    }

    /// Space and Enter activate hold controls, like they activate buttons.
    pub fn activates(&self) -> bool {
        matches!(self, Key::Space | Key::Enter)
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct KeyEvent {
    pub key: Key,
    /// Auto-repeat events are generated while a key is held and never start a session.
    pub repeat: bool,
    pub time: Instant,
}

impl KeyEvent {
    pub fn new(key: Key, time: Instant) -> Self {
        Self {
            key,
            repeat: false,
            time,
        }
    }

    #[must_use]
    pub fn repeated(mut self) -> Self {
        self.repeat = true;
        self
    }
}

/// Everything a gesture engine reacts to.
#[derive(Clone, Debug, PartialEq)]
pub enum InputEvent {
    PointerDown(PointerEvent),
    PointerMove(PointerEvent),
    PointerUp(PointerEvent),
    PointerCancel(PointerEvent),
    KeyDown(KeyEvent),
    KeyUp(KeyEvent),
    /// Animation frame or interval callback.
    Tick(Instant),
    /// The element or page lost visibility or focus (blur, `pagehide`, hidden tab).
    Hidden(Instant),
}

impl InputEvent {
    pub fn time(&self) -> Instant {
        use InputEvent::*;
        match self {
            PointerDown(e) | PointerMove(e) | PointerUp(e) | PointerCancel(e) => e.time,
            KeyDown(e) | KeyUp(e) => e.time,
            Tick(time) | Hidden(time) => *time,
        }
    }

    pub fn pointer(&self) -> Option<&PointerEvent> {
        use InputEvent::*;
        match self {
            PointerDown(e) | PointerMove(e) | PointerUp(e) | PointerCancel(e) => Some(e),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dom_keys_map_to_activation_keys() {
        assert_eq!(Key::from_dom("Space", " "), Key::Space);
        assert_eq!(Key::from_dom("", " "), Key::Space);
        assert_eq!(Key::from_dom("Enter", "Enter"), Key::Enter);
        assert_eq!(Key::from_dom("KeyA", "a"), Key::Other);
        assert!(!Key::Other.activates());
    }

    #[test]
    fn only_primary_button_of_primary_contact_presses() {
        let now = Instant::now();
        let press = PointerEvent::new(1, (0.0, 0.0), now);
        assert!(press.is_primary_press());
        assert!(!press.clone().with_button(Button::from_dom(2)).is_primary_press());
        assert!(!press.secondary_contact().is_primary_press());
        assert!(PointerEvent::touch(7, (0.0, 0.0), now).is_primary_press());
    }
}
