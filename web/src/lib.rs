//! Runs the HUD gestures in the browser.
//!
//! On start, the page is scanned for hold controls (`data-longpress-url`) and draggable panels, and
//! a mutation observer binds the ones added later. The page's `nextPage` global is the default
//! navigation target, `setNextPage()` changes it at runtime.
pub mod css;

#[cfg(target_arch = "wasm32")]
mod dom;
#[cfg(target_arch = "wasm32")]
mod host;

#[cfg(target_arch = "wasm32")]
mod exports {
    use std::{cell::RefCell, rc::Rc, time::Duration};

    use wasm_bindgen::prelude::*;

    use crate::host::Host;

    thread_local! {
        static HOST: RefCell<Option<Rc<Host>>> = const { RefCell::new(None) };
    }

    #[wasm_bindgen(start)]
    pub fn start() -> Result<(), JsValue> {
        console_error_panic_hook::set_once();
        // The page may have initialized a logger already.
        let _ = console_log::init();

        let document = web_sys::window()
            .and_then(|window| window.document())
            .ok_or_else(|| JsValue::from_str("No document"))?;
        if document.ready_state() != "loading" {
            install();
            return Ok(());
        }
        let on_ready = Closure::once_into_js(install);
        document.add_event_listener_with_callback("DOMContentLoaded", on_ready.unchecked_ref())
    }

    fn install() {
        match Host::install() {
            Ok(host) => HOST.with_borrow_mut(|slot| *slot = Some(host)),
            Err(e) => log::error!("Failed to install the HUD: {e:#}"),
        }
    }

    fn with_host<R>(f: impl FnOnce(&Rc<Host>) -> R) -> Result<R, JsValue> {
        HOST.with_borrow(|host| host.as_ref().map(f))
            .ok_or_else(|| JsValue::from_str("The HUD is not installed"))
    }

    fn js_error(e: anyhow::Error) -> JsValue {
        JsValue::from_str(&format!("{e:#}"))
    }

    /// Changes the default navigation target of hold controls without their own URL.
    #[wasm_bindgen(js_name = setNextPage)]
    pub fn set_next_page(url: Option<String>) -> Result<(), JsValue> {
        with_host(|host| host.set_default_url(url))?.map_err(js_error)
    }

    #[wasm_bindgen(js_name = setHoldDuration)]
    pub fn set_hold_duration(id: &str, ms: u32) -> Result<(), JsValue> {
        with_host(|host| host.set_hold_duration(id, Duration::from_millis(ms.into())))?
            .map_err(js_error)
    }

    /// Ends the gestures of an element without activating it.
    #[wasm_bindgen(js_name = cancelGestures)]
    pub fn cancel_gestures(id: &str) -> Result<(), JsValue> {
        with_host(|host| host.cancel(id))?.map_err(js_error)
    }

    /// Calls `callback` when the hold control with `id` commits. The element is bound as a hold
    /// control if it is not one yet.
    #[wasm_bindgen(js_name = bindHoldCallback)]
    pub fn bind_hold_callback(id: &str, callback: js_sys::Function) -> Result<(), JsValue> {
        with_host(|host| host.bind_hold_callback(id, callback))?.map_err(js_error)
    }
}
