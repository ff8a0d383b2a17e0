//! The lifecycle every gesture shares: a press starts a session, moves and ticks update it, and a
//! release, a cancellation, or a time-out ends it.

use std::time::Duration;

use hud_geometry::Point;
use log::debug;

use crate::{Instant, KeyEvent, PointerEvent, PointerId, Sensor};

#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Active,
    Committed,
    Aborted,
}

/// One in-progress gesture.
#[derive(Clone, Debug, PartialEq)]
pub struct PointerSession {
    /// Pointer coordinates at session start. For keyboard sessions this is the anchor.
    pub origin: Point,
    /// The element's position (or another reference point) at session start.
    pub anchor: Point,
    /// The captured pointer, `None` for keyboard sessions.
    pub pointer: Option<PointerId>,
    pub started: Instant,
    state: SessionState,
}

impl PointerSession {
    pub fn for_pointer(event: &PointerEvent, anchor: impl Into<Point>) -> Self {
        Self {
            origin: event.pos,
            anchor: anchor.into(),
            pointer: Some(event.pointer),
            started: event.time,
            state: SessionState::Active,
        }
    }

    pub fn for_key(event: &KeyEvent, anchor: impl Into<Point>) -> Self {
        let anchor = anchor.into();
        Self {
            origin: anchor,
            anchor,
            pointer: None,
            started: event.time,
            state: SessionState::Active,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn sensor(&self) -> Sensor {
        self.pointer.into()
    }

    pub fn is_keyboard(&self) -> bool {
        self.pointer.is_none()
    }

    /// `true` if the event comes from the pointer that owns this session.
    pub fn owns(&self, event: &PointerEvent) -> bool {
        self.pointer == Some(event.pointer)
    }

    pub fn elapsed(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.started)
    }

    /// Euclidean distance of `pos` from the session's origin.
    pub fn distance_from_origin(&self, pos: Point) -> f64 {
        self.origin.distance_to(pos)
    }

    fn end(&mut self, state: SessionState) {
        debug_assert_eq!(self.state, SessionState::Active);
        self.state = state;
    }
}

/// Access to the [`PointerSession`] a gesture tracker is built on.
pub trait Session {
    fn session(&self) -> &PointerSession;
    fn session_mut(&mut self) -> &mut PointerSession;
}

impl Session for PointerSession {
    fn session(&self) -> &PointerSession {
        self
    }

    fn session_mut(&mut self) -> &mut PointerSession {
        self
    }
}

/// Holds at most one active session per gesture-bound element.
///
/// A press that arrives while a session is active is ignored, not queued.
#[derive(Debug)]
pub struct SessionSlot<S = PointerSession> {
    active: Option<S>,
}

impl<S> Default for SessionSlot<S> {
    fn default() -> Self {
        Self { active: None }
    }
}

impl<S: Session> SessionSlot<S> {
    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn state(&self) -> SessionState {
        match &self.active {
            Some(_) => SessionState::Active,
            None => SessionState::Idle,
        }
    }

    pub fn active(&self) -> Option<&S> {
        self.active.as_ref()
    }

    pub fn active_mut(&mut self) -> Option<&mut S> {
        self.active.as_mut()
    }

    /// Starts `session` if no other session is active.
    ///
    /// Returns `false` and drops `session` if the slot is occupied.
    #[must_use]
    pub fn begin(&mut self, session: S) -> bool {
        if self.active.is_some() {
            debug!("Ignoring press, a session is already active");
            return false;
        }
        self.active = Some(session);
        true
    }

    /// Ends the active session as committed and returns it.
    pub fn commit(&mut self) -> Option<S> {
        self.finish(SessionState::Committed)
    }

    /// Ends the active session as aborted and returns it.
    pub fn abort(&mut self) -> Option<S> {
        self.finish(SessionState::Aborted)
    }

    fn finish(&mut self, state: SessionState) -> Option<S> {
        let mut session = self.active.take()?;
        session.session_mut().end(state);
        Some(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(id: i32, pos: (f64, f64), time: Instant) -> PointerEvent {
        PointerEvent::new(id, pos, time)
    }

    #[test]
    fn second_press_while_active_is_ignored() {
        let now = Instant::now();
        let mut slot = SessionSlot::default();
        assert_eq!(slot.state(), SessionState::Idle);

        assert!(slot.begin(PointerSession::for_pointer(&press(1, (10.0, 10.0), now), (0.0, 0.0))));
        let later = now + Duration::from_millis(50);
        assert!(!slot.begin(PointerSession::for_pointer(&press(2, (90.0, 90.0), later), (0.0, 0.0))));

        let active = slot.active().unwrap();
        assert_eq!(active.pointer, Some(PointerId(1)));
        assert_eq!(active.origin, Point::new(10.0, 10.0));
        assert_eq!(active.started, now);
    }

    #[test]
    fn ending_returns_the_final_state_and_frees_the_slot() {
        let now = Instant::now();
        let mut slot = SessionSlot::default();
        assert!(slot.begin(PointerSession::for_pointer(&press(1, (0.0, 0.0), now), (0.0, 0.0))));

        let ended = slot.commit().unwrap();
        assert_eq!(ended.state(), SessionState::Committed);
        assert!(!slot.is_active());
        assert!(slot.commit().is_none());
        assert!(slot.abort().is_none());

        assert!(slot.begin(PointerSession::for_key(
            &KeyEvent::new(crate::Key::Space, now),
            (5.0, 5.0)
        )));
        let ended = slot.abort().unwrap();
        assert_eq!(ended.state(), SessionState::Aborted);
        assert!(ended.is_keyboard());
        assert_eq!(ended.sensor(), Sensor::Keyboard);
    }

    #[test]
    fn elapsed_never_underflows() {
        let now = Instant::now();
        let session = PointerSession::for_pointer(&press(1, (0.0, 0.0), now), (0.0, 0.0));
        assert_eq!(session.elapsed(now), Duration::ZERO);
        assert_eq!(
            session.elapsed(now + Duration::from_millis(120)),
            Duration::from_millis(120)
        );
    }
}
