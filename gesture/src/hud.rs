//! The page-level controller. Binds drag engines and hold controls to elements and routes input
//! to them.

use std::{collections::BTreeMap, time::Duration};

use anyhow::{Context, Result};
use log::{debug, info};

use hud_geometry::{Point, Rect, Size, UnitInterval};
use hud_input::{Instant, InputEvent, SessionState};

use crate::{
    ActivationEffect, ActivationSignal, DragEngine, DragTarget, Effect, ElementDescriptor,
    ElementId, HelperRegistry, HoldBinding, HoldOutput, HudConfig, Navigation, PressTarget,
    SignalListeners, Verdict, activate,
};

/// An effect for a specific element.
#[derive(Debug, Clone, PartialEq)]
pub struct HudEffect {
    pub element: ElementId,
    pub effect: Effect,
}

impl HudEffect {
    fn all(element: &ElementId, effects: impl IntoIterator<Item = Effect>) -> Vec<Self> {
        effects
            .into_iter()
            .map(|effect| HudEffect {
                element: element.clone(),
                effect,
            })
            .collect()
    }
}

#[derive(Debug)]
struct HoldControl {
    binding: HoldBinding,
    activation: ActivationEffect,
}

#[derive(Debug)]
pub struct Hud {
    config: HudConfig,
    viewport: Size,
    navigation: Navigation,
    helpers: HelperRegistry,
    listeners: SignalListeners,
    drags: BTreeMap<ElementId, DragEngine>,
    holds: BTreeMap<ElementId, HoldControl>,
    /// A navigation was emitted, the page is about to be left.
    leaving: bool,
}

impl Hud {
    pub fn new(config: HudConfig, viewport: Size) -> Self {
        let navigation = Navigation::new(
            config.navigation.default_url.clone(),
            config.navigation.fallback_url.clone(),
            config.hold.grace(),
        );
        Self {
            config,
            viewport,
            navigation,
            helpers: HelperRegistry::default(),
            listeners: SignalListeners::default(),
            drags: BTreeMap::new(),
            holds: BTreeMap::new(),
            leaving: false,
        }
    }

    pub fn config(&self) -> &HudConfig {
        &self.config
    }

    /// Register a shared helper here before binding hold controls.
    pub fn helpers_mut(&mut self) -> &mut HelperRegistry {
        &mut self.helpers
    }

    /// Adds a listener that is notified before every navigation and may veto it.
    pub fn on_activation(&mut self, listener: impl FnMut(&ActivationSignal) -> Verdict + 'static) {
        self.listeners.add(listener);
    }

    pub fn set_default_url(&mut self, url: Option<String>) {
        self.navigation.set_default_url(url);
    }

    pub fn viewport(&self) -> Size {
        self.viewport
    }

    /// Updates the viewport and re-centers the panels that are centered on resize.
    pub fn set_viewport(&mut self, viewport: Size) -> Vec<HudEffect> {
        self.viewport = viewport;
        self.center_panels()
    }

    pub fn is_leaving(&self) -> bool {
        self.leaving
    }

    /// Binds the elements of a freshly loaded page.
    ///
    /// If no element declares a hold target, the fallback element is bound to navigate to the page
    /// default.
    pub fn scan(&mut self, elements: &[ElementDescriptor]) -> Vec<HudEffect> {
        let mut effects = self.elements_added(elements);

        if !elements.iter().any(|e| e.is_hold_control())
            && let Some(fallback) = self.config.navigation.fallback_element.as_deref()
            && let Some(element) = elements.iter().find(|e| e.id.as_str() == fallback)
            && !self.holds.contains_key(&element.id)
        {
            info!("No hold controls on the page, binding {}", element.id);
            self.bind_hold(element, ActivationEffect::Navigate(None));
        }

        effects.extend(self.center_panels());
        effects
    }

    /// Binds elements that were added to the page. Already bound elements are skipped.
    pub fn elements_added(&mut self, elements: &[ElementDescriptor]) -> Vec<HudEffect> {
        let mut effects = Vec::new();
        for element in elements {
            if element.is_hold_control() && !self.holds.contains_key(&element.id) {
                let url = element.binding_options().url;
                self.bind_hold(element, ActivationEffect::Navigate(url));
            }
            if self.config.drag.is_draggable(element.id.as_str(), &element.classes)
                && !self.drags.contains_key(&element.id)
            {
                self.bind_drag(element);
                if self.config.drag.is_centered(element.id.as_str()) {
                    effects.extend(self.center(&element.id));
                }
            }
        }
        effects
    }

    /// Unbinds a removed element. Its active sessions end.
    pub fn element_removed(&mut self, id: &ElementId) -> Vec<HudEffect> {
        let mut effects = Vec::new();
        let drag = self.drags.remove(id);
        let hold = self.holds.remove(id);
        if drag.is_none() && hold.is_none() {
            return effects;
        }
        debug!("Unbinding removed element {id}");
        if let Some(mut drag) = drag {
            effects.extend(HudEffect::all(id, drag.cancel()));
        }
        if let Some(mut hold) = hold {
            effects.extend(HudEffect::all(id, hold.binding.destroy().effects));
        }
        effects
    }

    pub fn bind_drag(&mut self, element: &ElementDescriptor) {
        let drag = &self.config.drag;
        let engine = DragEngine::new(
            DragTarget::new(element.rect.origin(), element.rect.size()),
            drag.snap_policy(),
            drag.exclusions(),
            drag.settle_duration(),
        );
        debug!("{} is draggable", element.id);
        self.drags.insert(element.id.clone(), engine);
    }

    /// Binds a hold control. The element's attributes override the configured duration and
    /// tolerance, and its URL becomes the target of a callback that continues.
    pub fn bind_hold(&mut self, element: &ElementDescriptor, activation: ActivationEffect) {
        let options = element.binding_options();
        let config = options.apply_to(&self.config.hold.hold_config());
        let activation = with_url(activation, options.url);
        debug!(
            "{} is a hold control ({:?}, {:?})",
            element.id, config.hold_duration, activation
        );
        let binding = HoldBinding::attach(element.id.clone(), config, &self.helpers);
        self.holds.insert(
            element.id.clone(),
            HoldControl {
                binding,
                activation,
            },
        );
    }

    /// Delivers an event that targets a bound element: presses and key events.
    ///
    /// `path` lists the elements from the pressed one up to, excluding, the bound element.
    pub fn dispatch(
        &mut self,
        target: &ElementId,
        event: &InputEvent,
        path: &[PressTarget],
    ) -> Vec<HudEffect> {
        if self.leaving {
            return Vec::new();
        }
        let mut effects = Vec::new();
        if let Some(drag) = self.drags.get_mut(target) {
            effects.extend(HudEffect::all(target, drag.handle(event, path, self.viewport)));
        }
        self.hold_event(target, event, &mut effects);
        effects
    }

    /// Delivers a page-level pointer event (move, up, cancel) to every bound element. Engines only
    /// react to the pointers they own.
    pub fn route_pointer(&mut self, event: &InputEvent) -> Vec<HudEffect> {
        if matches!(event, InputEvent::PointerDown(_)) {
            debug!("Presses must be dispatched to their element");
            return Vec::new();
        }
        self.broadcast(event)
    }

    /// Advances the progress of active holds. Call once per animation frame while
    /// [`Self::wants_ticks`].
    pub fn tick(&mut self, now: Instant) -> Vec<HudEffect> {
        if self.leaving {
            return Vec::new();
        }
        let mut effects = Vec::new();
        let ticking: Vec<ElementId> = self
            .holds
            .iter()
            .filter(|(_, hold)| hold.binding.wants_ticks())
            .map(|(id, _)| id.clone())
            .collect();
        for id in ticking {
            if self.leaving {
                break;
            }
            self.hold_event(&id, &InputEvent::Tick(now), &mut effects);
        }
        effects
    }

    /// The page was hidden or lost focus. Every gesture in progress ends.
    pub fn hide(&mut self, now: Instant) -> Vec<HudEffect> {
        self.broadcast(&InputEvent::Hidden(now))
    }

    pub fn wants_ticks(&self) -> bool {
        !self.leaving && self.holds.values().any(|hold| hold.binding.wants_ticks())
    }

    pub fn progress(&self, id: &ElementId) -> Option<UnitInterval> {
        self.holds.get(id).map(|hold| hold.binding.progress())
    }

    pub fn hold_state(&self, id: &ElementId) -> Option<SessionState> {
        self.holds.get(id).map(|hold| hold.binding.state())
    }

    pub fn is_delegated(&self, id: &ElementId) -> Option<bool> {
        self.holds.get(id).map(|hold| hold.binding.is_delegated())
    }

    pub fn drag_position(&self, id: &ElementId) -> Option<Point> {
        self.drags.get(id).map(|drag| drag.target().position)
    }

    pub fn is_dragging(&self, id: &ElementId) -> bool {
        self.drags.get(id).is_some_and(|drag| drag.is_dragging())
    }

    /// Updates a draggable element's bounds from a fresh measurement. Hosts call this before a
    /// press and before a release is dispatched, so drags start from and snap with the element's
    /// current geometry.
    pub fn refresh_element(&mut self, id: &ElementId, rect: Rect) {
        if let Some(drag) = self.drags.get_mut(id) {
            drag.refresh(rect);
        }
    }

    /// Ends the element's gestures without activating.
    pub fn cancel(&mut self, id: &ElementId) -> Vec<HudEffect> {
        let mut effects = Vec::new();
        if let Some(drag) = self.drags.get_mut(id) {
            effects.extend(HudEffect::all(id, drag.cancel()));
        }
        if let Some(hold) = self.holds.get_mut(id) {
            effects.extend(HudEffect::all(id, hold.binding.cancel().effects));
        }
        effects
    }

    /// Replaces what a bound hold control does when it commits. A callback without a URL of its
    /// own continues to the URL the control was bound with.
    pub fn set_activation(&mut self, id: &ElementId, activation: ActivationEffect) -> Result<()> {
        let hold = self
            .holds
            .get_mut(id)
            .with_context(|| format!("{id} is not a hold control"))?;
        let url = match &hold.activation {
            ActivationEffect::Navigate(url) | ActivationEffect::Invoke { url, .. } => url.clone(),
        };
        hold.activation = with_url(activation, url);
        debug!("{id} activates {:?}", hold.activation);
        Ok(())
    }

    pub fn set_hold_duration(&mut self, id: &ElementId, duration: Duration) -> Result<()> {
        let hold = self
            .holds
            .get_mut(id)
            .with_context(|| format!("{id} is not a hold control"))?;
        hold.binding.set_hold_duration(duration)
    }

    fn broadcast(&mut self, event: &InputEvent) -> Vec<HudEffect> {
        if self.leaving {
            return Vec::new();
        }
        let mut effects = Vec::new();
        for (id, drag) in &mut self.drags {
            effects.extend(HudEffect::all(id, drag.handle(event, &[], self.viewport)));
        }
        let ids: Vec<ElementId> = self.holds.keys().cloned().collect();
        for id in ids {
            if self.leaving {
                break;
            }
            self.hold_event(&id, event, &mut effects);
        }
        effects
    }

    fn hold_event(&mut self, id: &ElementId, event: &InputEvent, effects: &mut Vec<HudEffect>) {
        let Some(hold) = self.holds.get_mut(id) else {
            return;
        };
        let HoldOutput {
            effects: hold_effects,
            outcome,
        } = hold.binding.handle(event);
        effects.extend(HudEffect::all(id, hold_effects));

        if outcome != Some(SessionState::Committed) {
            return;
        }
        if let Some(navigate) = activate(
            id,
            &mut hold.activation,
            &self.navigation,
            &mut self.listeners,
        ) {
            self.leaving = true;
            effects.push(HudEffect {
                element: id.clone(),
                effect: navigate,
            });
        }
    }

    fn center_panels(&mut self) -> Vec<HudEffect> {
        let centered: Vec<ElementId> = self
            .drags
            .keys()
            .filter(|id| self.config.drag.is_centered(id.as_str()))
            .cloned()
            .collect();
        centered.iter().flat_map(|id| self.center(id)).collect()
    }

    fn center(&mut self, id: &ElementId) -> Vec<HudEffect> {
        let top = self.config.drag.initial_top;
        let viewport = self.viewport;
        match self.drags.get_mut(id) {
            Some(drag) => HudEffect::all(id, drag.center_horizontally(viewport, top)),
            None => Vec::new(),
        }
    }
}

fn with_url(activation: ActivationEffect, url: Option<String>) -> ActivationEffect {
    match activation {
        ActivationEffect::Invoke { callback, url: None } => ActivationEffect::Invoke { callback, url },
        activation => activation,
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use anyhow::bail;

    use hud_input::{Key, KeyEvent, PointerEvent, PointerId};

    use super::*;
    use crate::{HelperHandle, SharedHelper, URL_ATTRIBUTE};

    const MS: Duration = Duration::from_millis(1);
    const VIEWPORT: Size = Size::new(1000.0, 800.0);

    fn hud() -> Hud {
        let mut config = HudConfig::default();
        config.navigation.default_url = Some("video_scene2_.html".into());
        Hud::new(config, VIEWPORT)
    }

    fn control(id: &str, url: &str) -> ElementDescriptor {
        ElementDescriptor::new(id, "a")
            .with_attribute(URL_ATTRIBUTE, url)
            .with_rect(Rect::new((0.0, 0.0), (80.0, 40.0)))
    }

    fn panel(id: &str, left: f64) -> ElementDescriptor {
        ElementDescriptor::new(id, "div")
            .with_class("miniWin")
            .with_rect(Rect::new((left, 300.0), (200.0, 100.0)))
    }

    fn id(id: &str) -> ElementId {
        ElementId::from(id)
    }

    fn navigations(effects: &[HudEffect]) -> Vec<(&str, &str)> {
        effects
            .iter()
            .filter_map(|e| match &e.effect {
                Effect::Navigate { url, .. } => Some((e.element.as_str(), url.as_str())),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn scan_binds_controls_and_panels() {
        let mut hud = hud();
        let shell = ElementDescriptor::new("hudShell", "div")
            .with_rect(Rect::new((0.0, 0.0), (400.0, 60.0)));
        let effects = hud.scan(&[
            control("next", "b.html"),
            panel("w1", 300.0),
            shell,
            ElementDescriptor::new("advanceBtn", "button"),
        ]);

        assert_eq!(hud.hold_state(&id("next")), Some(SessionState::Idle));
        assert_eq!(hud.drag_position(&id("w1")), Some(Point::new(300.0, 300.0)));
        // There is a hold control, so the fallback element stays unbound.
        assert_eq!(hud.hold_state(&id("advanceBtn")), None);
        assert_eq!(
            effects,
            vec![HudEffect {
                element: id("hudShell"),
                effect: Effect::Move(Point::new(300.0, 20.0)),
            }]
        );

        let effects = hud.set_viewport(Size::new(600.0, 800.0));
        assert_eq!(effects[0].effect, Effect::Move(Point::new(100.0, 20.0)));
    }

    #[test]
    fn fallback_element_navigates_to_the_page_default() {
        let mut hud = hud();
        hud.scan(&[ElementDescriptor::new("advanceBtn", "button")]);
        assert!(hud.hold_state(&id("advanceBtn")).is_some());

        let t0 = Instant::now();
        let press = PointerEvent::new(1, (10.0, 10.0), t0);
        hud.dispatch(&id("advanceBtn"), &InputEvent::PointerDown(press.clone()), &[]);
        assert!(hud.wants_ticks());

        assert!(navigations(&hud.tick(t0 + MS * 400)).is_empty());
        let effects = hud.tick(t0 + MS * 800);
        assert_eq!(
            navigations(&effects),
            vec![("advanceBtn", "video_scene2_.html")]
        );
        assert!(hud.is_leaving());
        assert!(!hud.wants_ticks());

        // Nothing happens once the page is being left.
        let again = PointerEvent::new(2, (10.0, 10.0), t0 + MS * 900);
        assert!(
            hud.dispatch(&id("advanceBtn"), &InputEvent::PointerDown(again), &[])
                .is_empty()
        );
    }

    #[test]
    fn holds_do_not_interfere() {
        let mut hud = hud();
        hud.scan(&[control("a", "a.html"), control("b", "b.html")]);
        let t0 = Instant::now();

        let press_a = PointerEvent::new(1, (0.0, 0.0), t0);
        hud.dispatch(&id("a"), &InputEvent::PointerDown(press_a.clone()), &[]);
        let press_b = PointerEvent::touch(2, (500.0, 0.0), t0 + MS * 100);
        hud.dispatch(&id("b"), &InputEvent::PointerDown(press_b.clone()), &[]);

        // Releasing b early aborts b only.
        let effects =
            hud.route_pointer(&InputEvent::PointerUp(press_b.moved_to((500.0, 0.0), MS * 300)));
        assert!(effects.contains(&HudEffect {
            element: id("b"),
            effect: Effect::Pressed(false),
        }));
        assert!(
            !effects
                .iter()
                .any(|e| e.element == id("a") && e.effect == Effect::Pressed(false))
        );
        assert_eq!(hud.hold_state(&id("b")), Some(SessionState::Idle));
        assert_eq!(hud.hold_state(&id("a")), Some(SessionState::Active));

        let effects = hud.tick(t0 + MS * 800);
        assert_eq!(navigations(&effects), vec![("a", "a.html")]);
    }

    #[test]
    fn hiding_the_page_ends_everything() {
        let mut hud = hud();
        hud.scan(&[control("a", "a.html"), panel("w1", 300.0)]);
        let t0 = Instant::now();

        hud.dispatch(
            &id("a"),
            &InputEvent::PointerDown(PointerEvent::new(1, (0.0, 0.0), t0)),
            &[],
        );
        hud.dispatch(
            &id("w1"),
            &InputEvent::PointerDown(PointerEvent::touch(2, (350.0, 320.0), t0)),
            &[],
        );
        assert!(hud.is_dragging(&id("w1")));

        let effects = hud.hide(t0 + MS * 300);
        assert!(effects.contains(&HudEffect {
            element: id("a"),
            effect: Effect::Progress(UnitInterval::ZERO),
        }));
        assert!(effects.contains(&HudEffect {
            element: id("w1"),
            effect: Effect::ReleasePointer(PointerId(2)),
        }));
        assert_eq!(hud.hold_state(&id("a")), Some(SessionState::Idle));
        assert!(!hud.is_dragging(&id("w1")));
        assert!(!hud.wants_ticks());
    }

    #[test]
    fn vetoed_activation_stays_on_the_page() {
        let mut hud = hud();
        let signals = Rc::new(RefCell::new(Vec::new()));
        hud.on_activation({
            let signals = signals.clone();
            move |signal| {
                signals.borrow_mut().push(signal.clone());
                Verdict::Veto
            }
        });
        hud.scan(&[control("a", "a.html")]);

        let t0 = Instant::now();
        hud.dispatch(&id("a"), &InputEvent::KeyDown(KeyEvent::new(Key::Enter, t0)), &[]);
        let effects = hud.tick(t0 + MS * 800);

        assert!(navigations(&effects).is_empty());
        assert!(!hud.is_leaving());
        assert_eq!(
            *signals.borrow(),
            vec![ActivationSignal {
                element: id("a"),
                url: "a.html".into()
            }]
        );
    }

    #[test]
    fn dragging_a_hold_control_aborts_the_hold() {
        let mut hud = hud();
        let both = panel("w1", 300.0).with_attribute(URL_ATTRIBUTE, "w.html");
        hud.scan(&[both]);

        let t0 = Instant::now();
        let press = PointerEvent::new(1, (350.0, 320.0), t0);
        hud.dispatch(&id("w1"), &InputEvent::PointerDown(press.clone()), &[]);
        assert!(hud.is_dragging(&id("w1")));
        assert_eq!(hud.hold_state(&id("w1")), Some(SessionState::Active));

        let moved = press.moved_to((380.0, 320.0), MS * 50);
        let effects = hud.route_pointer(&InputEvent::PointerMove(moved));
        assert!(effects.contains(&HudEffect {
            element: id("w1"),
            effect: Effect::Move(Point::new(330.0, 300.0)),
        }));
        assert_eq!(hud.hold_state(&id("w1")), Some(SessionState::Idle));
        assert!(hud.is_dragging(&id("w1")));
    }

    #[test]
    fn presses_on_buttons_inside_panels_do_not_drag() {
        let mut hud = hud();
        hud.scan(&[panel("w1", 300.0)]);
        let press = PointerEvent::new(1, (350.0, 320.0), Instant::now());
        let effects = hud.dispatch(
            &id("w1"),
            &InputEvent::PointerDown(press),
            &[PressTarget::new("BUTTON")],
        );
        assert!(effects.is_empty());
        assert!(!hud.is_dragging(&id("w1")));
    }

    #[test]
    fn removed_elements_are_unbound() {
        let mut hud = hud();
        hud.scan(&[control("a", "a.html")]);
        hud.elements_added(&[panel("w2", 100.0)]);
        assert!(hud.drag_position(&id("w2")).is_some());

        hud.dispatch(
            &id("a"),
            &InputEvent::PointerDown(PointerEvent::new(1, (0.0, 0.0), Instant::now())),
            &[],
        );
        let effects = hud.element_removed(&id("a"));
        assert!(effects.contains(&HudEffect {
            element: id("a"),
            effect: Effect::ReleasePointer(PointerId(1)),
        }));
        assert_eq!(hud.hold_state(&id("a")), None);
        assert!(!hud.wants_ticks());
        assert!(hud.set_hold_duration(&id("a"), MS * 100).is_err());
    }

    #[test]
    fn attribute_duration_and_runtime_changes() {
        let mut hud = hud();
        hud.scan(&[control("a", "a.html").with_attribute("data-hold-ms", "1400")]);
        let t0 = Instant::now();
        hud.dispatch(
            &id("a"),
            &InputEvent::PointerDown(PointerEvent::new(1, (0.0, 0.0), t0)),
            &[],
        );
        assert!(navigations(&hud.tick(t0 + MS * 800)).is_empty());
        assert!(hud.set_hold_duration(&id("a"), Duration::ZERO).is_err());
        hud.set_hold_duration(&id("a"), MS * 1000).unwrap();
        assert_eq!(
            navigations(&hud.tick(t0 + MS * 1000)),
            vec![("a", "a.html")]
        );
    }

    #[test]
    fn callbacks_run_on_activation() {
        let mut hud = hud();
        let calls = Rc::new(RefCell::new(Vec::new()));
        let element = control("a", "a.html");
        hud.bind_hold(
            &element,
            ActivationEffect::invoke({
                let calls = calls.clone();
                move |id| {
                    calls.borrow_mut().push(id.clone());
                    Ok(std::ops::ControlFlow::Continue(()))
                }
            }),
        );

        let t0 = Instant::now();
        hud.dispatch(&id("a"), &InputEvent::KeyDown(KeyEvent::new(Key::Space, t0)), &[]);
        let effects = hud.tick(t0 + MS * 800);
        assert_eq!(*calls.borrow(), vec![id("a")]);
        // The element's own URL is the callback's explicit target.
        assert_eq!(navigations(&effects), vec![("a", "a.html")]);
    }

    fn drag_right(hud: &mut Hud, id: &ElementId, by: f64) -> Vec<HudEffect> {
        let press = PointerEvent::new(1, (350.0, 320.0), Instant::now());
        hud.dispatch(id, &InputEvent::PointerDown(press.clone()), &[]);
        let to = (350.0 + by, 320.0);
        hud.route_pointer(&InputEvent::PointerMove(press.moved_to(to, MS * 16)));
        hud.route_pointer(&InputEvent::PointerUp(press.moved_to(to, MS * 32)))
    }

    #[test]
    fn snapping_uses_the_measured_width() {
        let mut hud = hud();
        hud.scan(&[panel("w1", 300.0), panel("w2", 300.0)]);

        // w1's content grew after it was bound.
        hud.refresh_element(&id("w1"), Rect::new((300.0, 300.0), (300.0, 100.0)));
        let effects = drag_right(&mut hud, &id("w1"), 300.0);
        assert!(effects.contains(&HudEffect {
            element: id("w1"),
            effect: Effect::Move(Point::new(688.0, 300.0)),
        }));

        let effects = drag_right(&mut hud, &id("w2"), 300.0);
        assert!(effects.contains(&HudEffect {
            element: id("w2"),
            effect: Effect::Move(Point::new(788.0, 300.0)),
        }));
    }

    #[test]
    fn drags_start_from_the_measured_position() {
        let mut hud = hud();
        hud.scan(&[panel("w1", 300.0)]);
        hud.refresh_element(&id("w1"), Rect::new((350.0, 250.0), (200.0, 100.0)));
        assert_eq!(hud.drag_position(&id("w1")), Some(Point::new(350.0, 250.0)));

        let press = PointerEvent::new(1, (400.0, 300.0), Instant::now());
        hud.dispatch(&id("w1"), &InputEvent::PointerDown(press.clone()), &[]);
        let effects =
            hud.route_pointer(&InputEvent::PointerMove(press.moved_to((410.0, 300.0), MS * 16)));
        assert_eq!(effects[0].effect, Effect::Move(Point::new(360.0, 250.0)));
    }

    #[test]
    fn one_frame_leaves_the_page_once() {
        let mut hud = hud();
        hud.scan(&[control("a", "a.html"), control("b", "b.html")]);
        let t0 = Instant::now();
        hud.dispatch(
            &id("a"),
            &InputEvent::PointerDown(PointerEvent::new(1, (0.0, 0.0), t0)),
            &[],
        );
        hud.dispatch(
            &id("b"),
            &InputEvent::PointerDown(PointerEvent::touch(2, (500.0, 0.0), t0)),
            &[],
        );

        let effects = hud.tick(t0 + MS * 800);
        assert_eq!(navigations(&effects), vec![("a", "a.html")]);
        assert_eq!(hud.hold_state(&id("b")), Some(SessionState::Active));
    }

    #[test]
    fn activation_can_be_replaced_by_a_callback() {
        let mut hud = hud();
        hud.scan(&[control("a", "a.html")]);
        let calls = Rc::new(RefCell::new(0));
        hud.set_activation(
            &id("a"),
            ActivationEffect::invoke({
                let calls = calls.clone();
                move |_| {
                    *calls.borrow_mut() += 1;
                    Ok(std::ops::ControlFlow::Break(()))
                }
            }),
        )
        .unwrap();
        assert!(
            hud.set_activation(&id("nope"), ActivationEffect::default())
                .is_err()
        );

        let t0 = Instant::now();
        hud.dispatch(&id("a"), &InputEvent::KeyDown(KeyEvent::new(Key::Enter, t0)), &[]);
        assert!(navigations(&hud.tick(t0 + MS * 800)).is_empty());
        assert_eq!(*calls.borrow(), 1);
        assert!(!hud.is_leaving());

        // A continuing callback keeps the control's own URL.
        hud.set_activation(
            &id("a"),
            ActivationEffect::invoke(|_| Ok(std::ops::ControlFlow::Continue(()))),
        )
        .unwrap();
        hud.dispatch(&id("a"), &InputEvent::KeyUp(KeyEvent::new(Key::Enter, t0 + MS * 900)), &[]);
        let t1 = t0 + MS * 1000;
        hud.dispatch(&id("a"), &InputEvent::KeyDown(KeyEvent::new(Key::Enter, t1)), &[]);
        assert_eq!(navigations(&hud.tick(t1 + MS * 800)), vec![("a", "a.html")]);
    }

    struct BrokenHelper;

    impl SharedHelper for BrokenHelper {
        fn name(&self) -> &str {
            "broken"
        }

        fn attach(&self, _: &ElementId, _: crate::HoldConfig) -> Result<Box<dyn HelperHandle>> {
            bail!("helper script failed to load")
        }
    }

    #[test]
    fn broken_helper_still_commits_and_navigates() {
        let mut hud = hud();
        hud.helpers_mut().register(Rc::new(BrokenHelper));
        hud.scan(&[control("a", "a.html")]);
        assert_eq!(hud.is_delegated(&id("a")), Some(false));

        let t0 = Instant::now();
        hud.dispatch(
            &id("a"),
            &InputEvent::PointerDown(PointerEvent::new(1, (0.0, 0.0), t0)),
            &[],
        );
        assert_eq!(navigations(&hud.tick(t0 + MS * 800)), vec![("a", "a.html")]);
    }
}
