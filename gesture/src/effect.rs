use std::time::Duration;

use derive_more::{Deref, From};

use hud_geometry::{Point, UnitInterval};
use hud_input::PointerId;

/// A side effect the host has to apply to the element a gesture is bound to.
///
/// Engines never touch the platform themselves. Effects of one element are applied in the order
/// they are returned.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Set the element's `left` / `top` offset.
    Move(Point),
    /// Set the element's position transition.
    Transition(Transition),
    /// Route the pointer's subsequent events to the element. Skipped if unsupported.
    CapturePointer(PointerId),
    ReleasePointer(PointerId),
    /// Render the hold progress.
    Progress(UnitInterval),
    /// The control is visibly held down.
    Pressed(bool),
    /// Haptic feedback. Skipped if unsupported.
    Vibrate(Vibration),
    /// Leave the page after `delay`.
    Navigate { url: String, delay: Duration },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Follow the pointer without lag.
    None,
    /// Ease into the new position over the given duration.
    Eased(Duration),
}

/// A vibration pattern in milliseconds, alternating between vibrating and pausing.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deref, From)]
pub struct Vibration(Vec<u32>);

impl Vibration {
    pub fn pulse(ms: u32) -> Self {
        Self(vec![ms])
    }

    pub fn is_silent(&self) -> bool {
        self.0.iter().all(|ms| *ms == 0)
    }
}
