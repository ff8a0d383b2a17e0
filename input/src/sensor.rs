use derive_more::{Display, From};

use crate::InputEvent;

/// Identifies a pointer for the lifetime of its contact. Mirrors the DOM's `pointerId` and touch
/// `identifier`.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Display, From)]
#[display("pointer#{_0}")]
pub struct PointerId(pub i32);

/// What holds a session down: a specific pointer, or the keyboard.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Sensor {
    Pointer(PointerId),
    Keyboard,
}

impl Sensor {
    /// `true` if `event` releases this sensor.
    ///
    /// For the keyboard, releasing any activation key counts.
    pub fn released_by(&self, event: &InputEvent) -> bool {
        match (self, event) {
            (Sensor::Pointer(id), InputEvent::PointerUp(e) | InputEvent::PointerCancel(e)) => {
                e.pointer == *id
            }
            (Sensor::Keyboard, InputEvent::KeyUp(e)) => e.key.activates(),
            _ => false,
        }
    }

    pub fn pointer(&self) -> Option<PointerId> {
        match self {
            Sensor::Pointer(id) => Some(*id),
            Sensor::Keyboard => None,
        }
    }
}

impl From<Option<PointerId>> for Sensor {
    fn from(pointer: Option<PointerId>) -> Self {
        pointer.map(Sensor::Pointer).unwrap_or(Sensor::Keyboard)
    }
}
