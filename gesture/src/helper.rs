//! Delegating hold controls to a shared helper.
//!
//! A page may publish a [`SharedHelper`] that runs the hold logic of all its controls. A
//! [`HoldBinding`] prefers the helper, but if there is none, or the helper fails, the binding
//! continues with its own [`HoldMachine`]. Controls work the same either way.

use std::{fmt, rc::Rc, time::Duration};

use anyhow::{Result, bail};
use log::{debug, warn};

use hud_geometry::UnitInterval;
use hud_input::{InputEvent, SessionState};

use crate::{Effect, ElementId, HoldConfig, HoldMachine, HoldOutput};

pub trait SharedHelper {
    fn name(&self) -> &str;

    /// Starts running the hold logic of `element`.
    ///
    /// Must be reentrant: handles of different elements must not share mutable state.
    fn attach(&self, element: &ElementId, config: HoldConfig) -> Result<Box<dyn HelperHandle>>;
}

/// The helper's side of one attached element.
pub trait HelperHandle {
    fn process(&mut self, event: &InputEvent) -> Result<HoldOutput>;
    fn progress(&self) -> UnitInterval;
    fn state(&self) -> SessionState;
    fn wants_ticks(&self) -> bool;
    fn cancel(&mut self) -> HoldOutput;
    /// Detaches from the element. The handle is not used afterwards.
    fn destroy(&mut self);
    fn set_hold_duration(&mut self, duration: Duration) -> Result<()>;
}

/// The canonical helper: one independent [`HoldMachine`] per attached element.
#[derive(Debug, Default)]
pub struct StandardHelper;

impl SharedHelper for StandardHelper {
    fn name(&self) -> &str {
        "standard"
    }

    fn attach(&self, element: &ElementId, config: HoldConfig) -> Result<Box<dyn HelperHandle>> {
        debug!("Standard helper attached to {element}");
        Ok(Box::new(HoldMachine::new(config)))
    }
}

impl HelperHandle for HoldMachine {
    fn process(&mut self, event: &InputEvent) -> Result<HoldOutput> {
        Ok(self.handle(event))
    }

    fn progress(&self) -> UnitInterval {
        HoldMachine::progress(self)
    }

    fn state(&self) -> SessionState {
        HoldMachine::state(self).session_state()
    }

    fn wants_ticks(&self) -> bool {
        HoldMachine::wants_ticks(self)
    }

    fn cancel(&mut self) -> HoldOutput {
        HoldMachine::cancel(self)
    }

    fn destroy(&mut self) {
        HoldMachine::cancel(self);
    }

    fn set_hold_duration(&mut self, duration: Duration) -> Result<()> {
        HoldMachine::set_hold_duration(self, duration)
    }
}

/// The page-level helper registry. Looking up a helper that was never registered is a normal
/// case.
#[derive(Default)]
pub struct HelperRegistry {
    helper: Option<Rc<dyn SharedHelper>>,
}

impl fmt::Debug for HelperRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HelperRegistry")
            .field("helper", &self.helper.as_ref().map(|h| h.name().to_string()))
            .finish()
    }
}

impl HelperRegistry {
    pub fn with_standard_helper() -> Self {
        let mut registry = Self::default();
        registry.register(Rc::new(StandardHelper));
        registry
    }

    /// Registers `helper`, replacing a previously registered one.
    pub fn register(&mut self, helper: Rc<dyn SharedHelper>) {
        debug!("Registered shared helper `{}`", helper.name());
        self.helper = Some(helper);
    }

    pub fn unregister(&mut self) -> Option<Rc<dyn SharedHelper>> {
        self.helper.take()
    }

    pub fn lookup(&self) -> Option<Rc<dyn SharedHelper>> {
        self.helper.clone()
    }
}

enum Strategy {
    Delegated {
        helper: String,
        handle: Box<dyn HelperHandle>,
        /// The session the helper is running, continued self-contained if the helper fails.
        held: Option<Held>,
    },
    SelfContained(HoldMachine),
}

struct Held {
    press: InputEvent,
    committed: bool,
}

impl Held {
    /// Follows the helper's session after it processed `event`.
    fn follow(held: Option<Held>, event: &InputEvent, state: SessionState) -> Option<Held> {
        let committed = match state {
            SessionState::Active => false,
            SessionState::Committed => true,
            _ => return None,
        };
        let press = match held {
            Some(held) => held.press,
            None if matches!(event, InputEvent::PointerDown(_) | InputEvent::KeyDown(_)) => {
                event.clone()
            }
            None => return None,
        };
        Some(Held { press, committed })
    }
}

/// The hold logic of one control, delegated or self-contained.
pub struct HoldBinding {
    element: ElementId,
    config: HoldConfig,
    strategy: Strategy,
}

impl fmt::Debug for HoldBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let strategy = match &self.strategy {
            Strategy::Delegated { helper, .. } => helper.as_str(),
            Strategy::SelfContained(_) => "self-contained",
        };
        f.debug_struct("HoldBinding")
            .field("element", &self.element)
            .field("strategy", &strategy)
            .finish()
    }
}

impl HoldBinding {
    /// Attaches to the registered helper, or runs self-contained if there is none or attaching
    /// fails.
    pub fn attach(element: ElementId, config: HoldConfig, helpers: &HelperRegistry) -> Self {
        let Some(helper) = helpers.lookup() else {
            debug!("No shared helper, {element} holds self-contained");
            return Self::self_contained(element, config);
        };

        match helper.attach(&element, config.clone()) {
            Ok(handle) => Self {
                element,
                config,
                strategy: Strategy::Delegated {
                    helper: helper.name().to_string(),
                    handle,
                    held: None,
                },
            },
            Err(e) => {
                warn!(
                    "Shared helper `{}` failed to attach to {element}, falling back: {e:#}",
                    helper.name()
                );
                Self::self_contained(element, config)
            }
        }
    }

    pub fn self_contained(element: ElementId, config: HoldConfig) -> Self {
        let machine = HoldMachine::new(config.clone());
        Self {
            element,
            config,
            strategy: Strategy::SelfContained(machine),
        }
    }

    pub fn element(&self) -> &ElementId {
        &self.element
    }

    pub fn is_delegated(&self) -> bool {
        matches!(self.strategy, Strategy::Delegated { .. })
    }

    pub fn handle(&mut self, event: &InputEvent) -> HoldOutput {
        let failure = match &mut self.strategy {
            Strategy::SelfContained(machine) => return machine.handle(event),
            Strategy::Delegated { handle, held, .. } => match handle.process(event) {
                Ok(output) => {
                    *held = Held::follow(held.take(), event, handle.state());
                    return output;
                }
                Err(e) => e,
            },
        };

        warn!(
            "Shared helper failed on {}, continuing self-contained: {failure:#}",
            self.element
        );
        self.fall_back(Some(event))
    }

    pub fn cancel(&mut self) -> HoldOutput {
        match &mut self.strategy {
            Strategy::Delegated { handle, held, .. } => {
                *held = None;
                handle.cancel()
            }
            Strategy::SelfContained(machine) => machine.cancel(),
        }
    }

    pub fn progress(&self) -> UnitInterval {
        match &self.strategy {
            Strategy::Delegated { handle, .. } => handle.progress(),
            Strategy::SelfContained(machine) => machine.progress(),
        }
    }

    pub fn state(&self) -> SessionState {
        match &self.strategy {
            Strategy::Delegated { handle, .. } => handle.state(),
            Strategy::SelfContained(machine) => machine.state().session_state(),
        }
    }

    pub fn wants_ticks(&self) -> bool {
        match &self.strategy {
            Strategy::Delegated { handle, .. } => handle.wants_ticks(),
            Strategy::SelfContained(machine) => machine.wants_ticks(),
        }
    }

    pub fn set_hold_duration(&mut self, duration: Duration) -> Result<()> {
        if duration.is_zero() {
            bail!("Hold duration of {} must be greater than zero", self.element);
        }
        self.config.hold_duration = duration;
        let failure = match &mut self.strategy {
            Strategy::SelfContained(machine) => return machine.set_hold_duration(duration),
            Strategy::Delegated { handle, .. } => match handle.set_hold_duration(duration) {
                Ok(()) => return Ok(()),
                Err(e) => e,
            },
        };
        warn!(
            "Shared helper rejected the hold duration of {}, continuing self-contained: {failure:#}",
            self.element
        );
        self.fall_back(None);
        Ok(())
    }

    /// Detaches from the helper. Used when the element leaves the page.
    pub fn destroy(&mut self) -> HoldOutput {
        match &mut self.strategy {
            Strategy::Delegated { handle, .. } => {
                let output = handle.cancel();
                handle.destroy();
                output
            }
            Strategy::SelfContained(machine) => machine.cancel(),
        }
    }

    /// Replaces the helper with a self-contained machine and replays `event` into it.
    ///
    /// A session the helper was running continues in the new machine. Otherwise the returned
    /// effects start by resetting whatever the helper left behind.
    fn fall_back(&mut self, event: Option<&InputEvent>) -> HoldOutput {
        let held = match &mut self.strategy {
            Strategy::Delegated { handle, held, .. } => {
                handle.destroy();
                held.take()
            }
            Strategy::SelfContained(_) => None,
        };
        let (mut machine, mut output) = match held {
            Some(Held { press, committed }) => {
                debug!("Continuing the hold of {} self-contained", self.element);
                let machine = HoldMachine::resume(self.config.clone(), &press, committed);
                (machine, HoldOutput::default())
            }
            None => (
                HoldMachine::new(self.config.clone()),
                HoldOutput {
                    effects: vec![Effect::Progress(UnitInterval::ZERO), Effect::Pressed(false)],
                    outcome: None,
                },
            ),
        };
        if let Some(event) = event {
            let replayed = machine.handle(event);
            output.effects.extend(replayed.effects);
            output.outcome = replayed.outcome;
        }
        self.strategy = Strategy::SelfContained(machine);
        output
    }
}
