//! Hold-to-activate: a control activates after it was held for a configured duration.
//!
//! The machine is a single transition function [`step`] from a [`HoldState`] and an
//! [`InputEvent`] to the next state plus the effects to apply. [`HoldMachine`] keeps the state
//! between events.

use std::time::Duration;

use anyhow::{Result, bail};
use log::debug;
use replace_with::replace_with_or_abort;

use hud_geometry::UnitInterval;
use hud_input::{
    InputEvent, KeyEvent, PointerEvent, PointerSession, Sensor, SessionState,
    detect::{elapsed_fraction, exceeds_tolerance},
};

use crate::{Effect, Vibration};

#[derive(Debug, Clone, PartialEq)]
pub struct HoldConfig {
    /// Time until the hold commits. Must be greater than zero.
    pub hold_duration: Duration,
    /// Moving the pointer strictly farther than this from where it was pressed aborts the hold.
    pub move_tolerance: f64,
    pub start_vibration: Vibration,
    pub commit_vibration: Vibration,
}

impl Default for HoldConfig {
    fn default() -> Self {
        crate::config::HoldSettings::default().hold_config()
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum HoldState {
    #[default]
    Idle,
    Active {
        session: PointerSession,
        progress: UnitInterval,
    },
    /// Committed, but the pointer or key that committed it is still down. Inert until released.
    Spent { sensor: Sensor },
}

impl HoldState {
    pub fn session_state(&self) -> SessionState {
        match self {
            HoldState::Idle => SessionState::Idle,
            HoldState::Active { .. } => SessionState::Active,
            HoldState::Spent { .. } => SessionState::Committed,
        }
    }

    pub fn progress(&self) -> UnitInterval {
        match self {
            HoldState::Idle => UnitInterval::ZERO,
            HoldState::Active { progress, .. } => *progress,
            HoldState::Spent { .. } => UnitInterval::ONE,
        }
    }
}

/// What happened while processing one event.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HoldOutput {
    pub effects: Vec<Effect>,
    /// `Committed` or `Aborted` if a session ended.
    pub outcome: Option<SessionState>,
}

impl HoldOutput {
    pub fn committed(&self) -> bool {
        self.outcome == Some(SessionState::Committed)
    }

    pub fn aborted(&self) -> bool {
        self.outcome == Some(SessionState::Aborted)
    }

    fn push(&mut self, effect: Effect) {
        self.effects.push(effect);
    }

    fn end(&mut self, outcome: SessionState) {
        debug_assert!(self.outcome.is_none(), "A session ended twice in one step");
        self.outcome = Some(outcome);
    }
}

/// The transition function.
///
/// Time decides before the event does: an active session whose duration has elapsed at the
/// event's time commits first, and the event is then applied to the committed state. A release
/// that arrives after the duration therefore never aborts.
pub fn step(
    state: HoldState,
    event: &InputEvent,
    config: &HoldConfig,
    out: &mut HoldOutput,
) -> HoldState {
    match state {
        HoldState::Idle => match event {
            InputEvent::PointerDown(e) if e.is_primary_press() => begin_pointer(e, config, out),
            InputEvent::KeyDown(e) if e.key.activates() && !e.repeat => begin_key(e, out),
            _ => HoldState::Idle,
        },

        HoldState::Active { session, progress } => {
            let fraction = elapsed_fraction(session.started, event.time(), config.hold_duration);
            if fraction.is_complete() {
                let spent = commit(session, config, out);
                return step(spent, event, config, out);
            }

            let progress = if fraction > progress {
                out.push(Effect::Progress(fraction));
                fraction
            } else {
                progress
            };

            match event {
                InputEvent::PointerMove(e)
                    if session.owns(e)
                        && exceeds_tolerance(session.origin, e.pos, config.move_tolerance) =>
                {
                    debug!(
                        "Hold aborted, {} moved {:.1}px",
                        e.pointer,
                        session.distance_from_origin(e.pos)
                    );
                    abort(session, out)
                }
                InputEvent::PointerUp(e) | InputEvent::PointerCancel(e) if session.owns(e) => {
                    debug!("Hold aborted, {} released early", e.pointer);
                    abort(session, out)
                }
                InputEvent::KeyUp(e) if session.is_keyboard() && e.key.activates() => {
                    debug!("Hold aborted, key released early");
                    abort(session, out)
                }
                InputEvent::Hidden(_) => {
                    debug!("Hold aborted, page hidden");
                    abort(session, out)
                }
                // Includes presses while active: ignored, not queued.
                _ => HoldState::Active { session, progress },
            }
        }

        HoldState::Spent { sensor } => {
            if sensor.released_by(event) || matches!(event, InputEvent::Hidden(_)) {
                release(sensor, out);
                HoldState::Idle
            } else {
                HoldState::Spent { sensor }
            }
        }
    }
}

fn begin_pointer(event: &PointerEvent, config: &HoldConfig, out: &mut HoldOutput) -> HoldState {
    debug!("Hold started by {}", event.pointer);
    out.push(Effect::CapturePointer(event.pointer));
    out.push(Effect::Pressed(true));
    if !config.start_vibration.is_silent() {
        out.push(Effect::Vibrate(config.start_vibration.clone()));
    }
    out.push(Effect::Progress(UnitInterval::ZERO));
    HoldState::Active {
        session: PointerSession::for_pointer(event, event.pos),
        progress: UnitInterval::ZERO,
    }
}

fn begin_key(event: &KeyEvent, out: &mut HoldOutput) -> HoldState {
    debug!("Hold started by {:?}", event.key);
    out.push(Effect::Pressed(true));
    out.push(Effect::Progress(UnitInterval::ZERO));
    HoldState::Active {
        session: PointerSession::for_key(event, (0.0, 0.0)),
        progress: UnitInterval::ZERO,
    }
}

fn commit(session: PointerSession, config: &HoldConfig, out: &mut HoldOutput) -> HoldState {
    debug!("Hold committed after {:?}", config.hold_duration);
    out.push(Effect::Progress(UnitInterval::ONE));
    out.push(Effect::Pressed(false));
    if !config.commit_vibration.is_silent() {
        out.push(Effect::Vibrate(config.commit_vibration.clone()));
    }
    out.end(SessionState::Committed);
    HoldState::Spent {
        sensor: session.sensor(),
    }
}

fn abort(session: PointerSession, out: &mut HoldOutput) -> HoldState {
    out.push(Effect::Progress(UnitInterval::ZERO));
    out.push(Effect::Pressed(false));
    if let Some(pointer) = session.pointer {
        out.push(Effect::ReleasePointer(pointer));
    }
    out.end(SessionState::Aborted);
    HoldState::Idle
}

fn release(sensor: Sensor, out: &mut HoldOutput) {
    out.push(Effect::Progress(UnitInterval::ZERO));
    if let Some(pointer) = sensor.pointer() {
        out.push(Effect::ReleasePointer(pointer));
    }
}

/// A self-contained hold-to-activate state machine for one control.
#[derive(Debug, Clone, Default)]
pub struct HoldMachine {
    config: HoldConfig,
    state: HoldState,
}

impl HoldMachine {
    pub fn new(config: HoldConfig) -> Self {
        Self {
            config,
            state: HoldState::Idle,
        }
    }

    /// Takes over a session that was started by `press` elsewhere. The start effects were already
    /// applied and are not repeated.
    pub(crate) fn resume(config: HoldConfig, press: &InputEvent, committed: bool) -> Self {
        let mut machine = Self::new(config);
        machine.handle(press);
        if committed {
            replace_with_or_abort(&mut machine.state, |state| match state {
                HoldState::Active { session, .. } => HoldState::Spent {
                    sensor: session.sensor(),
                },
                state => state,
            });
        }
        machine
    }

    pub fn config(&self) -> &HoldConfig {
        &self.config
    }

    pub fn state(&self) -> &HoldState {
        &self.state
    }

    pub fn progress(&self) -> UnitInterval {
        self.state.progress()
    }

    /// While a hold is active, the host has to deliver [`InputEvent::Tick`]s, once per frame for a
    /// smooth progress indicator.
    pub fn wants_ticks(&self) -> bool {
        matches!(self.state, HoldState::Active { .. })
    }

    pub fn handle(&mut self, event: &InputEvent) -> HoldOutput {
        let mut out = HoldOutput::default();
        let config = &self.config;
        replace_with_or_abort(&mut self.state, |state| step(state, event, config, &mut out));
        out
    }

    /// Aborts an active hold and resets a spent one.
    pub fn cancel(&mut self) -> HoldOutput {
        let mut out = HoldOutput::default();
        replace_with_or_abort(&mut self.state, |state| match state {
            HoldState::Active { session, .. } => abort(session, &mut out),
            HoldState::Spent { sensor } => {
                release(sensor, &mut out);
                HoldState::Idle
            }
            HoldState::Idle => HoldState::Idle,
        });
        out
    }

    /// Changes the hold duration. An active hold continues with the new duration.
    pub fn set_hold_duration(&mut self, duration: Duration) -> Result<()> {
        if duration.is_zero() {
            bail!("Hold duration must be greater than zero");
        }
        self.config.hold_duration = duration;
        Ok(())
    }
}
