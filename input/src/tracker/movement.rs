use derive_more::Deref;
use log::debug;

use hud_geometry::{Point, Vector};
use hud_util::Progress;

use crate::{InputEvent, PointerSession, Session};

/// Tracks the pointer of a session relative to where it was pressed.
// `Clone` because of the borrow checker.
#[derive(Clone, Debug, Deref)]
pub struct Movement {
    #[deref]
    session: PointerSession,

    /// The current movement vector relative to the session's origin.
    pub delta: Vector,
}

impl Movement {
    pub fn new(session: PointerSession) -> Self {
        Self {
            session,
            delta: Vector::default(),
        }
    }

    /// Tracks movements. Updates `delta` if the current position of the owning pointer changed.
    ///
    /// `None` if the event was unrelated to the movement and it stays active.
    pub fn track(&mut self, event: &InputEvent) -> Option<Progress<Vector>> {
        match event {
            InputEvent::PointerMove(e) if self.session.owns(e) => {
                let delta = e.pos - self.session.origin;
                if delta == self.delta {
                    return None;
                }
                self.delta = delta;
                Some(Progress::Proceed(delta))
            }
            InputEvent::PointerUp(e) if self.session.owns(e) => {
                // The release position is authoritative, some platforms skip the last move.
                self.delta = e.pos - self.session.origin;
                Some(Progress::Commit)
            }
            InputEvent::PointerCancel(e) if self.session.owns(e) => Some(Progress::Cancel),
            InputEvent::Hidden(_) => {
                debug!("Movement cancelled, page hidden");
                Some(Progress::Cancel)
            }
            _ => None,
        }
    }

    /// The anchor moved by the current delta.
    pub fn to(&self) -> Point {
        self.session.anchor + self.delta
    }
}

impl Session for Movement {
    fn session(&self) -> &PointerSession {
        &self.session
    }

    fn session_mut(&mut self) -> &mut PointerSession {
        &mut self.session
    }
}
