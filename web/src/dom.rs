//! Reading the DOM into the controller's model.

use std::collections::BTreeMap;

use anyhow::{Error, Result, anyhow};
use js_sys::{Object, Reflect};
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{CustomEvent, CustomEventInit, Element, Event, HtmlElement, KeyboardEvent};

use hud_geometry::{Point, Rect};
use hud_gesture::{
    DURATION_ATTRIBUTES, ElementDescriptor, ElementId, PressTarget, TOLERANCE_ATTRIBUTE,
    URL_ATTRIBUTE,
};
use hud_input::{Button, Instant, Key, KeyEvent, PointerEvent, PointerKind};

/// Marks elements without an id with the key the controller knows them by.
pub const KEY_ATTRIBUTE: &str = "data-hud-key";
/// Dispatched on a hold control before it navigates. Cancelling it keeps the page.
pub const ACTIVATION_EVENT: &str = "advanceActivated";

pub fn js_error(err: JsValue) -> Error {
    anyhow!("{}", err.as_string().unwrap_or_else(|| format!("{err:?}")))
}

pub fn bounds(element: &Element) -> Rect {
    let rect = element.get_bounding_client_rect();
    Rect::new((rect.left(), rect.top()), (rect.width(), rect.height()))
}

pub fn describe(element: &HtmlElement, id: ElementId) -> ElementDescriptor {
    let classes = element.class_list();
    let mut descriptor = ElementDescriptor::new(id, element.tag_name().to_lowercase())
        .with_rect(bounds(element));
    descriptor.classes = (0..classes.length())
        .filter_map(|i| classes.item(i))
        .collect();
    descriptor.attributes = attributes(element);
    descriptor
}

fn attributes(element: &Element) -> BTreeMap<String, String> {
    [URL_ATTRIBUTE, TOLERANCE_ATTRIBUTE]
        .into_iter()
        .chain(DURATION_ATTRIBUTES)
        .filter_map(|name| {
            element
                .get_attribute(name)
                .map(|value| (name.to_string(), value))
        })
        .collect()
}

/// A bubbling, cancelable [`ACTIVATION_EVENT`] with `{ url, source }` as its detail.
pub fn activation_event(url: &str) -> Result<CustomEvent> {
    let detail = Object::new();
    Reflect::set(&detail, &JsValue::from_str("url"), &JsValue::from_str(url)).map_err(js_error)?;
    Reflect::set(&detail, &JsValue::from_str("source"), &JsValue::from_str("hud"))
        .map_err(js_error)?;
    let init = CustomEventInit::new();
    init.set_bubbles(true);
    init.set_cancelable(true);
    init.set_detail(&detail);
    CustomEvent::new_with_event_init_dict(ACTIVATION_EVENT, &init).map_err(js_error)
}

pub fn pointer_event(event: &web_sys::PointerEvent) -> PointerEvent {
    let kind = match event.pointer_type().as_str() {
        "touch" => PointerKind::Touch,
        "pen" => PointerKind::Pen,
        _ => PointerKind::Mouse,
    };
    let pos = Point::new(event.client_x() as f64, event.client_y() as f64);
    let mut pointer = PointerEvent::new(event.pointer_id(), pos, Instant::now())
        .with_kind(kind)
        .with_button(Button::from_dom(event.button()));
    pointer.is_primary = event.is_primary();
    pointer
}

pub fn key_event(event: &KeyboardEvent) -> KeyEvent {
    let key = KeyEvent::new(Key::from_dom(&event.code(), &event.key()), Instant::now());
    if event.repeat() { key.repeated() } else { key }
}

/// The elements between the event's target and `bound`, innermost first.
pub fn press_path(event: &Event, bound: &Element) -> Vec<PressTarget> {
    let mut path = Vec::new();
    let mut current = event
        .target()
        .and_then(|target| target.dyn_into::<Element>().ok());
    while let Some(element) = current {
        if element == *bound {
            break;
        }
        let classes = element.class_list();
        path.push(PressTarget {
            tag: element.tag_name(),
            classes: (0..classes.length())
                .filter_map(|i| classes.item(i))
                .collect(),
        });
        current = element.parent_element();
    }
    path
}
