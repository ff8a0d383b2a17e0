//! The browser side of the HUD: DOM events in, effects out.

use std::{
    cell::{Cell, RefCell, RefMut},
    collections::BTreeMap,
    ops::ControlFlow,
    rc::{Rc, Weak},
    time::Duration,
};

use anyhow::{Context, Result};
use log::{debug, info, warn};
use wasm_bindgen::{JsCast, JsValue, closure::Closure};
use web_sys::{
    AddEventListenerOptions, Document, Event, EventTarget, HtmlElement, KeyboardEvent,
    MutationObserver, MutationObserverInit, MutationRecord, NodeList, Window,
};

use hud_geometry::Size;
use hud_gesture::{
    ActivationEffect, ActivationSignal, Effect, ElementId, HelperRegistry, Hud, HudConfig,
    HudEffect, Verdict,
};
use hud_input::{InputEvent, Instant};

use crate::{
    css,
    dom::{self, KEY_ATTRIBUTE, js_error},
};

/// A `<script type="application/toml">` element with this id configures the HUD.
const CONFIG_ELEMENT: &str = "hud-config";
/// The page global holding the default navigation target.
const NEXT_PAGE_GLOBAL: &str = "nextPage";

/// An event listener that is removed when dropped.
struct Listener {
    target: EventTarget,
    kind: &'static str,
    callback: Closure<dyn FnMut(Event)>,
}

impl Listener {
    fn add(
        target: &EventTarget,
        kind: &'static str,
        passive: bool,
        callback: impl FnMut(Event) + 'static,
    ) -> Result<Self> {
        let callback = Closure::<dyn FnMut(Event)>::new(callback);
        let options = AddEventListenerOptions::new();
        options.set_passive(passive);
        target
            .add_event_listener_with_callback_and_add_event_listener_options(
                kind,
                callback.as_ref().unchecked_ref(),
                &options,
            )
            .map_err(js_error)
            .with_context(|| format!("Failed to listen to `{kind}`"))?;
        Ok(Self {
            target: target.clone(),
            kind,
            callback,
        })
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        let _ = self
            .target
            .remove_event_listener_with_callback(self.kind, self.callback.as_ref().unchecked_ref());
    }
}

struct Bound {
    element: HtmlElement,
    _listeners: Vec<Listener>,
}

type MutationCallback = Closure<dyn FnMut(js_sys::Array, MutationObserver)>;

pub struct Host {
    window: Window,
    document: Document,
    hud: RefCell<Hud>,
    /// Selects the elements that may be bound.
    selector: String,
    bound: RefCell<BTreeMap<ElementId, Bound>>,
    page_listeners: RefCell<Vec<Listener>>,
    observer: RefCell<Option<(MutationObserver, MutationCallback)>>,
    frame_pending: Cell<bool>,
    next_key: Cell<u32>,
}

impl Host {
    pub fn install() -> Result<Rc<Self>> {
        let window = web_sys::window().context("No window")?;
        let document = window.document().context("No document")?;

        let config = load_config(&document);
        let selector = css::bindable_selector(&config);
        let mut hud = Hud::new(config, viewport(&window));
        *hud.helpers_mut() = HelperRegistry::with_standard_helper();
        if let Some(url) = next_page(&window) {
            hud.set_default_url(Some(url));
        }

        let host = Rc::new(Self {
            window,
            document,
            hud: RefCell::new(hud),
            selector,
            bound: RefCell::default(),
            page_listeners: RefCell::default(),
            observer: RefCell::default(),
            frame_pending: Cell::new(false),
            next_key: Cell::new(0),
        });

        let announcer = Rc::downgrade(&host);
        host.hud.borrow_mut().on_activation(move |signal| {
            announcer
                .upgrade()
                .map_or(Verdict::Proceed, |host| host.announce(signal))
        });

        host.listen_to_page()?;
        let elements = html_elements(
            &host
                .document
                .query_selector_all(&host.selector)
                .map_err(js_error)?,
        );
        host.bind_elements(elements, true)?;
        host.observe_mutations()?;
        info!("HUD installed, {} elements bound", host.bound.borrow().len());
        Ok(host)
    }

    pub fn set_default_url(&self, url: Option<String>) -> Result<()> {
        self.hud_mut()?.set_default_url(url);
        Ok(())
    }

    pub fn set_hold_duration(&self, id: &str, duration: Duration) -> Result<()> {
        self.hud_mut()?
            .set_hold_duration(&ElementId::from(id), duration)
    }

    pub fn cancel(self: &Rc<Self>, id: &str) -> Result<()> {
        let effects = self.hud_mut()?.cancel(&ElementId::from(id));
        self.apply(effects);
        Ok(())
    }

    /// Makes the element with `id` a hold control that calls `callback` when it commits, with
    /// the element as `this`. Returning `false` cancels, anything else continues to the element's
    /// URL if it has one.
    pub fn bind_hold_callback(self: &Rc<Self>, id: &str, callback: js_sys::Function) -> Result<()> {
        let id = ElementId::from(id);
        let bound = self.bound.borrow().get(&id).map(|bound| bound.element.clone());
        let element = match bound {
            Some(element) => element,
            None => self
                .document
                .get_element_by_id(id.as_str())
                .and_then(|element| element.dyn_into::<HtmlElement>().ok())
                .with_context(|| format!("No element with id `{id}`"))?,
        };

        let activation = ActivationEffect::invoke({
            let element = element.clone();
            move |_| {
                let result = callback.call0(&element).map_err(js_error)?;
                Ok(if result.as_bool() == Some(false) {
                    ControlFlow::Break(())
                } else {
                    ControlFlow::Continue(())
                })
            }
        });

        {
            let mut hud = self.hud_mut()?;
            if hud.hold_state(&id).is_some() {
                return hud.set_activation(&id, activation);
            }
            hud.bind_hold(&dom::describe(&element, id.clone()), activation);
        }
        // Listen again, now as a hold control.
        self.bound.borrow_mut().remove(&id);
        self.bind(element, id)
    }

    /// Page scripts may call back into the HUD while it is busy, for example from an activation
    /// listener.
    fn hud_mut(&self) -> Result<RefMut<'_, Hud>> {
        self.hud
            .try_borrow_mut()
            .context("The HUD is busy, try again later")
    }

    /// Dispatches the activation event on the element. The page vetoes by cancelling it.
    fn announce(&self, signal: &ActivationSignal) -> Verdict {
        let element = self
            .bound
            .borrow()
            .get(&signal.element)
            .map(|bound| bound.element.clone());
        let Some(element) = element else {
            return Verdict::Proceed;
        };
        let dispatched = dom::activation_event(&signal.url)
            .and_then(|event| element.dispatch_event(&event).map_err(js_error));
        match dispatched {
            Ok(true) => Verdict::Proceed,
            Ok(false) => {
                info!("The page cancelled the activation of {}", signal.element);
                Verdict::Veto
            }
            Err(e) => {
                warn!("Failed to announce the activation of {}: {e:#}", signal.element);
                Verdict::Proceed
            }
        }
    }

    fn listen_to_page(self: &Rc<Self>) -> Result<()> {
        let window: &EventTarget = &self.window;
        type MakeEvent = fn(hud_input::PointerEvent) -> InputEvent;
        let pointer_events: [(&'static str, MakeEvent, bool); 3] = [
            ("pointermove", InputEvent::PointerMove, false),
            ("pointerup", InputEvent::PointerUp, true),
            ("pointercancel", InputEvent::PointerCancel, false),
        ];

        let mut listeners = Vec::new();
        for (kind, make, releases) in pointer_events {
            let host = Rc::downgrade(self);
            listeners.push(Listener::add(window, kind, true, move |event| {
                with_host(&host, |host| host.on_page_pointer(&event, make, releases))
            })?);
        }
        for kind in ["blur", "pagehide"] {
            let host = Rc::downgrade(self);
            listeners.push(Listener::add(window, kind, true, move |_| {
                with_host(&host, |host| host.on_hidden())
            })?);
        }
        let host = Rc::downgrade(self);
        listeners.push(Listener::add(
            &self.document,
            "visibilitychange",
            true,
            move |_| {
                with_host(&host, |host| {
                    if host.document.hidden() {
                        host.on_hidden()
                    }
                })
            },
        )?);
        let host = Rc::downgrade(self);
        listeners.push(Listener::add(window, "resize", true, move |_| {
            with_host(&host, |host| {
                let effects = host.hud.borrow_mut().set_viewport(viewport(&host.window));
                host.apply(effects);
            })
        })?);

        *self.page_listeners.borrow_mut() = listeners;
        Ok(())
    }

    fn observe_mutations(self: &Rc<Self>) -> Result<()> {
        let host = Rc::downgrade(self);
        let callback: MutationCallback =
            Closure::new(move |records: js_sys::Array, _: MutationObserver| {
                with_host(&host, |host| host.on_mutations(&records))
            });
        let observer = MutationObserver::new(callback.as_ref().unchecked_ref()).map_err(js_error)?;
        let options = MutationObserverInit::new();
        options.set_child_list(true);
        options.set_subtree(true);
        let body = self.document.body().context("No document body")?;
        observer
            .observe_with_options(&body, &options)
            .map_err(js_error)
            .context("Failed to observe the document")?;
        *self.observer.borrow_mut() = Some((observer, callback));
        Ok(())
    }

    /// Describes `elements` to the controller and listens to the ones it binds.
    fn bind_elements(self: &Rc<Self>, elements: Vec<HtmlElement>, initial: bool) -> Result<()> {
        let descriptors: Vec<_> = elements
            .iter()
            .map(|element| dom::describe(element, self.element_id(element)))
            .collect();

        let effects = {
            let mut hud = self.hud.borrow_mut();
            if initial {
                hud.scan(&descriptors)
            } else {
                hud.elements_added(&descriptors)
            }
        };

        for (element, descriptor) in elements.into_iter().zip(descriptors) {
            self.bind(element, descriptor.id)?;
        }
        self.apply(effects);
        Ok(())
    }

    fn bind(self: &Rc<Self>, element: HtmlElement, id: ElementId) -> Result<()> {
        let (holds, drags) = {
            let hud = self.hud.borrow();
            (
                hud.hold_state(&id).is_some(),
                hud.drag_position(&id).is_some(),
            )
        };
        if !(holds || drags) || self.bound.borrow().contains_key(&id) {
            return Ok(());
        }
        if holds && element.tab_index() < 0 {
            // Keyboard activation needs focus.
            element.set_tab_index(0);
        }

        let target: &EventTarget = &element;
        let mut listeners = Vec::new();
        {
            let (host, id) = (Rc::downgrade(self), id.clone());
            listeners.push(Listener::add(target, "pointerdown", false, move |event| {
                with_host(&host, |host| host.on_press(&id, &event))
            })?);
        }
        for (kind, down) in [("keydown", true), ("keyup", false)] {
            let (host, id) = (Rc::downgrade(self), id.clone());
            listeners.push(Listener::add(target, kind, false, move |event| {
                with_host(&host, |host| host.on_key(&id, &event, down))
            })?);
        }
        if holds {
            // Long presses on touch screens open the context menu.
            listeners.push(Listener::add(target, "contextmenu", false, |event| {
                event.prevent_default()
            })?);
        }

        debug!("Listening to {id}");
        self.bound.borrow_mut().insert(
            id,
            Bound {
                element,
                _listeners: listeners,
            },
        );
        Ok(())
    }

    /// The element's id, or a generated key if it has none.
    fn element_id(&self, element: &HtmlElement) -> ElementId {
        let id = element.id();
        if !id.is_empty() {
            return id.into();
        }
        if let Some(key) = element.get_attribute(KEY_ATTRIBUTE) {
            return key.into();
        }
        let key = format!("hud-{}", self.next_key.get());
        self.next_key.set(self.next_key.get() + 1);
        if let Err(e) = element.set_attribute(KEY_ATTRIBUTE, &key) {
            debug!("Failed to mark element with {key}: {e:?}");
        }
        key.into()
    }

    fn on_press(self: &Rc<Self>, id: &ElementId, event: &Event) {
        let Some(pointer) = event.dyn_ref::<web_sys::PointerEvent>() else {
            return;
        };
        let (path, bounds) = match self.bound.borrow().get(id) {
            Some(bound) => (
                dom::press_path(event, &bound.element),
                dom::bounds(&bound.element),
            ),
            None => return,
        };
        let effects = {
            let mut hud = self.hud.borrow_mut();
            hud.refresh_element(id, bounds);
            hud.dispatch(
                id,
                &InputEvent::PointerDown(dom::pointer_event(pointer)),
                &path,
            )
        };
        if !effects.is_empty() {
            event.prevent_default();
        }
        self.apply(effects);
    }

    fn on_key(self: &Rc<Self>, id: &ElementId, event: &Event, down: bool) {
        let Some(keyboard) = event.dyn_ref::<KeyboardEvent>() else {
            return;
        };
        let key = dom::key_event(keyboard);
        if !key.key.activates() || self.hud.borrow().hold_state(id).is_none() {
            return;
        }
        // Space would scroll, and Enter would click.
        event.prevent_default();
        let input = if down {
            InputEvent::KeyDown(key)
        } else {
            InputEvent::KeyUp(key)
        };
        let effects = self.hud.borrow_mut().dispatch(id, &input, &[]);
        self.apply(effects);
    }

    fn on_page_pointer(
        self: &Rc<Self>,
        event: &Event,
        make: fn(hud_input::PointerEvent) -> InputEvent,
        releases: bool,
    ) {
        let Some(pointer) = event.dyn_ref::<web_sys::PointerEvent>() else {
            return;
        };
        if releases {
            self.measure_dragged();
        }
        let effects = self
            .hud
            .borrow_mut()
            .route_pointer(&make(dom::pointer_event(pointer)));
        self.apply(effects);
    }

    /// Panels snap with the size they have when they are released.
    fn measure_dragged(&self) {
        let bound = self.bound.borrow();
        let mut hud = self.hud.borrow_mut();
        for (id, bound) in bound.iter() {
            if hud.is_dragging(id) {
                hud.refresh_element(id, dom::bounds(&bound.element));
            }
        }
    }

    fn on_hidden(self: &Rc<Self>) {
        let effects = self.hud.borrow_mut().hide(Instant::now());
        self.apply(effects);
    }

    fn on_mutations(self: &Rc<Self>, records: &js_sys::Array) {
        let mut added = Vec::new();
        let mut removed = false;
        for record in records.iter() {
            let Ok(record) = record.dyn_into::<MutationRecord>() else {
                continue;
            };
            for element in html_elements(&record.added_nodes()) {
                if element.matches(&self.selector).unwrap_or(false) {
                    added.push(element.clone());
                }
                if let Ok(inner) = element.query_selector_all(&self.selector) {
                    added.extend(html_elements(&inner));
                }
            }
            removed |= record.removed_nodes().length() > 0;
        }

        if removed {
            self.unbind_disconnected();
        }
        if !added.is_empty()
            && let Err(e) = self.bind_elements(added, false)
        {
            warn!("Failed to bind added elements: {e:#}");
        }
    }

    fn unbind_disconnected(self: &Rc<Self>) {
        let gone: Vec<ElementId> = self
            .bound
            .borrow()
            .iter()
            .filter(|(_, bound)| !bound.element.is_connected())
            .map(|(id, _)| id.clone())
            .collect();
        for id in gone {
            let effects = self.hud.borrow_mut().element_removed(&id);
            self.apply(effects);
            self.bound.borrow_mut().remove(&id);
        }
    }

    fn on_frame(self: &Rc<Self>) {
        self.frame_pending.set(false);
        let effects = self.hud.borrow_mut().tick(Instant::now());
        self.apply(effects);
    }

    fn request_frame(self: &Rc<Self>) {
        if self.frame_pending.replace(true) {
            return;
        }
        let host = Rc::downgrade(self);
        let callback = Closure::once_into_js(move |_: f64| with_host(&host, |host| host.on_frame()));
        if let Err(e) = self.window.request_animation_frame(callback.unchecked_ref()) {
            warn!("Failed to request an animation frame: {}", js_error(e));
            self.frame_pending.set(false);
        }
    }

    fn apply(self: &Rc<Self>, effects: Vec<HudEffect>) {
        {
            let bound = self.bound.borrow();
            for HudEffect { element, effect } in effects {
                if let Effect::Navigate { url, delay } = effect {
                    self.navigate(url, delay);
                    continue;
                }
                let Some(bound) = bound.get(&element) else {
                    debug!("{element} is not bound, dropping {effect:?}");
                    continue;
                };
                // Unsupported capabilities are skipped.
                if let Err(e) = apply_effect(&self.window, &bound.element, &effect) {
                    debug!("Skipped {effect:?} on {element}: {e:#}");
                }
            }
        }
        if self.hud.borrow().wants_ticks() {
            self.request_frame();
        }
    }

    fn navigate(&self, url: String, delay: Duration) {
        info!("Leaving for {url} in {delay:?}");
        let location = self.window.location();
        let leave = {
            let (location, url) = (location.clone(), url.clone());
            Closure::once_into_js(move || {
                if let Err(e) = location.set_href(&url) {
                    warn!("Failed to navigate to {url}: {}", js_error(e));
                }
            })
        };
        if let Err(e) = self
            .window
            .set_timeout_with_callback_and_timeout_and_arguments_0(
                leave.unchecked_ref(),
                i32::try_from(delay.as_millis()).unwrap_or(i32::MAX),
            )
        {
            debug!("No timer ({}), navigating right away", js_error(e));
            if let Err(e) = location.set_href(&url) {
                warn!("Failed to navigate to {url}: {}", js_error(e));
            }
        }
    }
}

fn apply_effect(window: &Window, element: &HtmlElement, effect: &Effect) -> Result<()> {
    let style = element.style();
    match effect {
        Effect::Move(pos) => {
            style.set_property("left", &css::px(pos.x)).map_err(js_error)?;
            style.set_property("top", &css::px(pos.y)).map_err(js_error)?;
        }
        Effect::Transition(transition) => {
            style
                .set_property("transition", &css::transition(*transition))
                .map_err(js_error)?;
        }
        Effect::CapturePointer(pointer) => {
            element.set_pointer_capture(pointer.0).map_err(js_error)?;
        }
        Effect::ReleasePointer(pointer) => {
            if element.has_pointer_capture(pointer.0) {
                element.release_pointer_capture(pointer.0).map_err(js_error)?;
            }
        }
        Effect::Progress(progress) => {
            style
                .set_property(css::PROGRESS_PROPERTY, &css::progress(*progress))
                .map_err(js_error)?;
        }
        Effect::Pressed(pressed) => {
            element
                .set_attribute("aria-pressed", if *pressed { "true" } else { "false" })
                .map_err(js_error)?;
            element
                .class_list()
                .toggle_with_force(css::HOLDING_CLASS, *pressed)
                .map_err(js_error)?;
        }
        Effect::Vibrate(pattern) => {
            let pattern: js_sys::Array = pattern.iter().map(|ms| JsValue::from(*ms)).collect();
            if !window.navigator().vibrate_with_pattern(&pattern) {
                debug!("Vibration is not available");
            }
        }
        // Navigation is page-wide, see `Host::navigate`.
        Effect::Navigate { .. } => {}
    }
    Ok(())
}

fn with_host(host: &Weak<Host>, f: impl FnOnce(&Rc<Host>)) {
    if let Some(host) = host.upgrade() {
        f(&host);
    }
}

fn html_elements(list: &NodeList) -> Vec<HtmlElement> {
    (0..list.length())
        .filter_map(|i| list.get(i))
        .filter_map(|node| node.dyn_into::<HtmlElement>().ok())
        .collect()
}

fn viewport(window: &Window) -> Size {
    let dimension = |value: Result<JsValue, JsValue>| {
        value.ok().and_then(|v| v.as_f64()).unwrap_or_default()
    };
    Size::new(
        dimension(window.inner_width()),
        dimension(window.inner_height()),
    )
}

fn load_config(document: &Document) -> HudConfig {
    let Some(toml) = document
        .get_element_by_id(CONFIG_ELEMENT)
        .and_then(|element| element.text_content())
    else {
        return HudConfig::default();
    };
    HudConfig::from_toml_str(&toml).unwrap_or_else(|e| {
        warn!("Ignoring the HUD configuration: {e:#}");
        HudConfig::default()
    })
}

fn next_page(window: &Window) -> Option<String> {
    js_sys::Reflect::get(window, &JsValue::from_str(NEXT_PAGE_GLOBAL))
        .ok()?
        .as_string()
        .filter(|url| !url.is_empty())
}
