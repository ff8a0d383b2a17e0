//! Scripted gesture scenarios.

use std::{collections::BTreeMap, fs, path::Path, time::Duration};

use anyhow::{Context, Result, bail};
use log::{debug, warn};
use serde::Deserialize;

use hud_geometry::{Point, Rect, Size};
use hud_gesture::{ElementDescriptor, ElementId, Hud, HudConfig, HudEffect, PressTarget};
use hud_input::{Instant, InputEvent, Key, KeyEvent, PointerEvent, PointerId};

/// Frame interval of the simulated animation loop.
pub const FRAME: Duration = Duration::from_millis(16);
/// Ticking stops this long after the last event even if a hold is still active.
const SETTLE_LIMIT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    pub viewport: Size,
    #[serde(default)]
    pub default_url: Option<String>,
    #[serde(default)]
    pub elements: Vec<Element>,
    #[serde(default)]
    pub events: Vec<TimedEvent>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Element {
    pub id: String,
    #[serde(default = "default_tag")]
    pub tag: String,
    #[serde(default)]
    pub classes: Vec<String>,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    /// Left, top, width, height.
    #[serde(default)]
    pub rect: [f64; 4],
}

fn default_tag() -> String {
    "div".into()
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TimedEvent {
    pub at_ms: u64,
    #[serde(flatten)]
    pub action: Action,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Action {
    Down {
        target: String,
        #[serde(default = "default_pointer")]
        pointer: i32,
        pos: Point,
        /// Tags of the elements between the pressed one and the target.
        #[serde(default)]
        path: Vec<String>,
    },
    Move {
        #[serde(default = "default_pointer")]
        pointer: i32,
        pos: Point,
    },
    Up {
        #[serde(default = "default_pointer")]
        pointer: i32,
        pos: Point,
    },
    Cancel {
        #[serde(default = "default_pointer")]
        pointer: i32,
    },
    KeyDown {
        target: String,
        key: String,
    },
    KeyUp {
        target: String,
        key: String,
    },
    Hide,
    Resize {
        viewport: Size,
    },
    Remove {
        target: String,
    },
    /// The element's bounds changed, `[left, top, width, height]`.
    Measure {
        target: String,
        rect: [f64; 4],
    },
}

fn default_pointer() -> i32 {
    1
}

/// One line of the replay's output.
#[derive(Debug, Clone, PartialEq)]
pub struct Recorded {
    pub at_ms: u64,
    pub effect: HudEffect,
}

impl Scenario {
    pub fn from_toml_str(toml: &str) -> Result<Self> {
        let scenario: Scenario = toml::from_str(toml).context("Failed to parse the scenario")?;
        scenario.validate()?;
        Ok(scenario)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let toml = fs::read_to_string(path)
            .with_context(|| format!("Failed to read the scenario {}", path.display()))?;
        Self::from_toml_str(&toml).with_context(|| format!("In {}", path.display()))
    }

    fn validate(&self) -> Result<()> {
        if self.viewport.is_empty() {
            bail!("The viewport must not be empty");
        }
        if let Some(pair) = self.events.windows(2).find(|w| w[1].at_ms < w[0].at_ms) {
            bail!(
                "Events must be ordered by time, {} ms comes after {} ms",
                pair[1].at_ms,
                pair[0].at_ms
            );
        }
        Ok(())
    }

    fn descriptors(&self) -> Vec<ElementDescriptor> {
        self.elements.iter().map(Element::descriptor).collect()
    }

    /// Replays the scenario against a fresh controller and returns every effect with the time it
    /// was emitted at.
    pub fn run(&self, config: HudConfig) -> Result<Vec<Recorded>> {
        let mut hud = Hud::new(config, self.viewport);
        if self.default_url.is_some() {
            hud.set_default_url(self.default_url.clone());
        }

        let mut replay = Replay {
            hud,
            start: Instant::now(),
            now: Duration::ZERO,
            recorded: Vec::new(),
        };

        let effects = replay.hud.scan(&self.descriptors());
        replay.record(effects);

        for event in &self.events {
            replay.advance_to(Duration::from_millis(event.at_ms));
            replay.apply(&event.action)?;
        }
        replay.settle();
        Ok(replay.recorded)
    }
}

impl Element {
    fn descriptor(&self) -> ElementDescriptor {
        let [left, top, width, height] = self.rect;
        let mut descriptor = ElementDescriptor::new(self.id.as_str(), self.tag.as_str())
            .with_rect(Rect::new((left, top), (width, height)));
        descriptor.classes = self.classes.clone();
        descriptor.attributes = self.attributes.clone();
        descriptor
    }
}

struct Replay {
    hud: Hud,
    start: Instant,
    /// Time since the start of the scenario.
    now: Duration,
    recorded: Vec<Recorded>,
}

impl Replay {
    fn instant(&self) -> Instant {
        self.start + self.now
    }

    fn record(&mut self, effects: Vec<HudEffect>) {
        let at_ms = self.now.as_millis() as u64;
        self.recorded
            .extend(effects.into_iter().map(|effect| Recorded { at_ms, effect }));
    }

    /// Frames are on a fixed grid, independent of the event times.
    fn next_frame(&self) -> Duration {
        let frame = FRAME.as_millis() as u64;
        Duration::from_millis((self.now.as_millis() as u64 / frame + 1) * frame)
    }

    fn tick(&mut self) {
        self.now = self.next_frame();
        let effects = self.hud.tick(self.instant());
        self.record(effects);
    }

    /// Ticks frames while the controller wants them, then jumps to `time`.
    fn advance_to(&mut self, time: Duration) {
        while self.hud.wants_ticks() && self.next_frame() <= time {
            self.tick();
        }
        self.now = self.now.max(time);
    }

    fn settle(&mut self) {
        let limit = self.now + SETTLE_LIMIT;
        while self.hud.wants_ticks() {
            if self.now >= limit {
                warn!("Holds still active {SETTLE_LIMIT:?} after the last event");
                break;
            }
            self.tick();
        }
    }

    fn apply(&mut self, action: &Action) -> Result<()> {
        let time = self.instant();
        debug!("{:>6} ms {action:?}", self.now.as_millis());
        let effects = match action {
            Action::Down {
                target,
                pointer,
                pos,
                path,
            } => {
                let event = PointerEvent::new(PointerId(*pointer), *pos, time);
                let path: Vec<PressTarget> = path.iter().map(PressTarget::new).collect();
                self.hud
                    .dispatch(&target.as_str().into(), &InputEvent::PointerDown(event), &path)
            }
            Action::Move { pointer, pos } => {
                let event = PointerEvent::new(PointerId(*pointer), *pos, time);
                self.hud.route_pointer(&InputEvent::PointerMove(event))
            }
            Action::Up { pointer, pos } => {
                let event = PointerEvent::new(PointerId(*pointer), *pos, time);
                self.hud.route_pointer(&InputEvent::PointerUp(event))
            }
            Action::Cancel { pointer } => {
                let event = PointerEvent::new(PointerId(*pointer), Point::ZERO, time);
                self.hud.route_pointer(&InputEvent::PointerCancel(event))
            }
            Action::KeyDown { target, key } => {
                let event = KeyEvent::new(parse_key(key)?, time);
                self.hud
                    .dispatch(&target.as_str().into(), &InputEvent::KeyDown(event), &[])
            }
            Action::KeyUp { target, key } => {
                let event = KeyEvent::new(parse_key(key)?, time);
                self.hud
                    .dispatch(&target.as_str().into(), &InputEvent::KeyUp(event), &[])
            }
            Action::Hide => self.hud.hide(time),
            Action::Resize { viewport } => self.hud.set_viewport(*viewport),
            Action::Remove { target } => self.hud.element_removed(&ElementId::from(target.as_str())),
            Action::Measure { target, rect } => {
                let [left, top, width, height] = *rect;
                self.hud.refresh_element(
                    &ElementId::from(target.as_str()),
                    Rect::new((left, top), (width, height)),
                );
                Vec::new()
            }
        };
        self.record(effects);
        Ok(())
    }
}

fn parse_key(key: &str) -> Result<Key> {
    match Key::from_dom(key, key) {
        Key::Other => bail!("Unsupported key `{key}`, expected `Space` or `Enter`"),
        key => Ok(key),
    }
}

#[cfg(test)]
mod tests {
    use hud_geometry::UnitInterval;
    use hud_gesture::Effect;

    use super::*;

    const HOLD: &str = r#"
viewport = [1000.0, 800.0]
default_url = "video_scene2_.html"

[[elements]]
id = "advanceBtn"
tag = "button"
rect = [900.0, 700.0, 80.0, 40.0]

[[events]]
at_ms = 0
kind = "down"
target = "advanceBtn"
pos = [920.0, 710.0]

[[events]]
at_ms = 200
kind = "move"
pos = [925.0, 712.0]
"#;

    #[test]
    fn parses_elements_and_events() {
        let scenario = Scenario::from_toml_str(HOLD).unwrap();
        assert_eq!(scenario.viewport, Size::new(1000.0, 800.0));
        assert_eq!(scenario.elements[0].tag, "button");
        assert_eq!(scenario.events.len(), 2);
        assert_eq!(
            scenario.events[1].action,
            Action::Move {
                pointer: 1,
                pos: Point::new(925.0, 712.0)
            }
        );
    }

    #[test]
    fn rejects_unordered_events() {
        let toml = r#"
viewport = [100.0, 100.0]

[[events]]
at_ms = 50
kind = "hide"

[[events]]
at_ms = 10
kind = "hide"
"#;
        assert!(Scenario::from_toml_str(toml).is_err());
    }

    #[test]
    fn hold_scenario_navigates_after_the_duration() {
        let scenario = Scenario::from_toml_str(HOLD).unwrap();
        let recorded = scenario.run(HudConfig::default()).unwrap();

        let navigate = recorded
            .iter()
            .find(|r| matches!(r.effect.effect, Effect::Navigate { .. }))
            .unwrap();
        assert_eq!(
            navigate.effect.effect,
            Effect::Navigate {
                url: "video_scene2_.html".into(),
                delay: Duration::from_millis(120)
            }
        );
        // 800 ms is reached at the 50th frame.
        assert_eq!(navigate.at_ms, 800);
        assert!(recorded.iter().any(|r| r.effect.effect == Effect::Progress(UnitInterval::ONE)));
    }

    #[test]
    fn measured_panels_snap_with_their_new_width() {
        let toml = r#"
viewport = [1000.0, 800.0]

[[elements]]
id = "w1"
classes = ["miniWin"]
rect = [300.0, 300.0, 200.0, 100.0]

[[events]]
at_ms = 0
kind = "measure"
target = "w1"
rect = [300.0, 300.0, 300.0, 100.0]

[[events]]
at_ms = 10
kind = "down"
target = "w1"
pos = [350.0, 320.0]

[[events]]
at_ms = 30
kind = "up"
pos = [650.0, 320.0]
"#;
        let scenario = Scenario::from_toml_str(toml).unwrap();
        let recorded = scenario.run(HudConfig::default()).unwrap();
        assert!(
            recorded
                .iter()
                .any(|r| r.effect.effect == Effect::Move(Point::new(688.0, 300.0)))
        );
    }

    #[test]
    fn moving_away_aborts_the_hold() {
        let toml = HOLD.replace("pos = [925.0, 712.0]", "pos = [960.0, 712.0]");
        let scenario = Scenario::from_toml_str(&toml).unwrap();
        let recorded = scenario.run(HudConfig::default()).unwrap();
        assert!(
            !recorded
                .iter()
                .any(|r| matches!(r.effect.effect, Effect::Navigate { .. }))
        );
        assert_eq!(
            recorded.last().map(|r| &r.effect.effect),
            Some(&Effect::ReleasePointer(PointerId(1)))
        );
    }
}
