//! What happens when a hold commits.

use std::{fmt, ops::ControlFlow, time::Duration};

use anyhow::Result;
use log::{info, warn};

use crate::{Effect, ElementId};

/// A host function invoked on activation. `Break` cancels the activation, so does an error.
pub type Callback = Box<dyn FnMut(&ElementId) -> Result<ControlFlow<()>>>;

pub enum ActivationEffect {
    /// Leave the page. `None` navigates to the page's default target.
    Navigate(Option<String>),
    /// Run `callback`, and if it continues, navigate to `url`. Without a `url`, nothing happens
    /// after the callback.
    Invoke {
        callback: Callback,
        url: Option<String>,
    },
}

impl fmt::Debug for ActivationEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Navigate(url) => f.debug_tuple("Navigate").field(url).finish(),
            Self::Invoke { url, .. } => f.debug_struct("Invoke").field("url", url).finish(),
        }
    }
}

impl Default for ActivationEffect {
    fn default() -> Self {
        Self::Navigate(None)
    }
}

impl ActivationEffect {
    pub fn invoke(
        callback: impl FnMut(&ElementId) -> Result<ControlFlow<()>> + 'static,
    ) -> Self {
        Self::Invoke {
            callback: Box::new(callback),
            url: None,
        }
    }

    #[must_use]
    pub fn then_navigate(self, target: impl Into<String>) -> Self {
        match self {
            Self::Navigate(_) => Self::Navigate(Some(target.into())),
            Self::Invoke { callback, .. } => Self::Invoke {
                callback,
                url: Some(target.into()),
            },
        }
    }
}

/// Page-level navigation targets.
#[derive(Debug, Clone, PartialEq)]
pub struct Navigation {
    default_url: Option<String>,
    fallback_url: Option<String>,
    /// Delay before leaving, so that the completed progress can be seen.
    grace: Duration,
}

impl Navigation {
    pub fn new(
        default_url: Option<String>,
        fallback_url: Option<String>,
        grace: Duration,
    ) -> Self {
        Self {
            default_url: non_empty(default_url),
            fallback_url: non_empty(fallback_url),
            grace,
        }
    }

    pub fn set_default_url(&mut self, url: Option<String>) {
        self.default_url = non_empty(url);
    }

    pub fn default_url(&self) -> Option<&str> {
        self.default_url.as_deref()
    }

    pub fn grace(&self) -> Duration {
        self.grace
    }

    /// The first of the element's own target, the page default, and the fallback.
    pub fn resolve<'a>(&'a self, explicit: Option<&'a str>) -> Option<&'a str> {
        explicit
            .filter(|url| !url.is_empty())
            .or(self.default_url.as_deref())
            .or(self.fallback_url.as_deref())
    }
}

fn non_empty(url: Option<String>) -> Option<String> {
    url.filter(|url| !url.is_empty())
}

/// Announced before navigating. Any listener can veto.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationSignal {
    pub element: ElementId,
    pub url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Proceed,
    Veto,
}

type Listener = Box<dyn FnMut(&ActivationSignal) -> Verdict>;

#[derive(Default)]
pub struct SignalListeners {
    listeners: Vec<Listener>,
}

impl fmt::Debug for SignalListeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalListeners")
            .field("len", &self.listeners.len())
            .finish()
    }
}

impl SignalListeners {
    pub fn add(&mut self, listener: impl FnMut(&ActivationSignal) -> Verdict + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Notifies every listener, even after one vetoed.
    pub fn notify(&mut self, signal: &ActivationSignal) -> Verdict {
        let mut verdict = Verdict::Proceed;
        for listener in &mut self.listeners {
            if listener(signal) == Verdict::Veto {
                verdict = Verdict::Veto;
            }
        }
        verdict
    }
}

/// Runs the activation of a committed hold and returns the navigation to perform, if any.
pub fn activate(
    element: &ElementId,
    effect: &mut ActivationEffect,
    navigation: &Navigation,
    listeners: &mut SignalListeners,
) -> Option<Effect> {
    let explicit = match effect {
        ActivationEffect::Navigate(url) => url.as_deref(),
        ActivationEffect::Invoke { callback, url } => {
            match callback(element) {
                Ok(ControlFlow::Continue(())) => {}
                Ok(ControlFlow::Break(())) => {
                    info!("Activation of {element} stopped by its callback");
                    return None;
                }
                Err(e) => {
                    warn!("Activation callback of {element} failed: {e:#}");
                    return None;
                }
            }
            match url.as_deref() {
                Some(url) if !url.is_empty() => Some(url),
                _ => return None,
            }
        }
    };

    let Some(url) = navigation.resolve(explicit) else {
        warn!("{element} activated, but there is no navigation target");
        return None;
    };

    let signal = ActivationSignal {
        element: element.clone(),
        url: url.to_string(),
    };
    if listeners.notify(&signal) == Verdict::Veto {
        info!("Navigation of {element} to {url} vetoed");
        return None;
    }

    info!("{element} activated, navigating to {url}");
    Some(Effect::Navigate {
        url: signal.url,
        delay: navigation.grace,
    })
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use anyhow::anyhow;

    use super::*;

    const GRACE: Duration = Duration::from_millis(120);

    fn navigation(default_url: Option<&str>) -> Navigation {
        Navigation::new(default_url.map(Into::into), Some("/".into()), GRACE)
    }

    fn navigate(url: &str) -> Option<Effect> {
        Some(Effect::Navigate {
            url: url.into(),
            delay: GRACE,
        })
    }

    #[test]
    fn urls_resolve_by_priority() {
        let nav = navigation(Some("video_scene2_.html"));
        assert_eq!(nav.resolve(Some("own.html")), Some("own.html"));
        assert_eq!(nav.resolve(Some("")), Some("video_scene2_.html"));
        assert_eq!(nav.resolve(None), Some("video_scene2_.html"));

        let mut nav = navigation(Some(""));
        assert_eq!(nav.resolve(None), Some("/"));
        nav.set_default_url(Some("next.html".into()));
        assert_eq!(nav.resolve(None), Some("next.html"));

        let nowhere = Navigation::new(None, None, GRACE);
        assert_eq!(nowhere.resolve(None), None);
    }

    #[test]
    fn navigates_after_the_grace_delay() {
        let element = ElementId::from("advanceBtn");
        let mut effect = ActivationEffect::default();
        let mut listeners = SignalListeners::default();
        assert_eq!(
            activate(&element, &mut effect, &navigation(Some("b.html")), &mut listeners),
            navigate("b.html")
        );
    }

    #[test]
    fn missing_target_is_a_no_op() {
        let element = ElementId::from("advanceBtn");
        let mut effect = ActivationEffect::Navigate(None);
        let nav = Navigation::new(None, None, GRACE);
        assert_eq!(
            activate(&element, &mut effect, &nav, &mut SignalListeners::default()),
            None
        );
    }

    #[test]
    fn every_listener_sees_the_signal_and_one_veto_suffices() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut listeners = SignalListeners::default();
        listeners.add({
            let seen = seen.clone();
            move |signal| {
                seen.borrow_mut().push(signal.url.clone());
                Verdict::Veto
            }
        });
        listeners.add({
            let seen = seen.clone();
            move |signal| {
                seen.borrow_mut().push(signal.element.to_string());
                Verdict::Proceed
            }
        });

        let element = ElementId::from("next");
        let mut effect = ActivationEffect::Navigate(Some("c.html".into()));
        assert_eq!(
            activate(&element, &mut effect, &navigation(None), &mut listeners),
            None
        );
        assert_eq!(*seen.borrow(), vec!["c.html".to_string(), "next".to_string()]);
    }

    #[test]
    fn callbacks_decide_and_navigate_only_to_explicit_targets() {
        let element = ElementId::from("ctl");
        let nav = navigation(Some("default.html"));
        let mut listeners = SignalListeners::default();

        let calls = Rc::new(RefCell::new(0));
        let mut effect = ActivationEffect::invoke({
            let calls = calls.clone();
            move |_| {
                *calls.borrow_mut() += 1;
                Ok(ControlFlow::Continue(()))
            }
        });
        assert_eq!(activate(&element, &mut effect, &nav, &mut listeners), None);
        assert_eq!(*calls.borrow(), 1);

        let mut effect = effect.then_navigate("explicit.html");
        assert_eq!(
            activate(&element, &mut effect, &nav, &mut listeners),
            navigate("explicit.html")
        );
        assert_eq!(*calls.borrow(), 2);

        let mut stop =
            ActivationEffect::invoke(|_| Ok(ControlFlow::Break(()))).then_navigate("x.html");
        assert_eq!(activate(&element, &mut stop, &nav, &mut listeners), None);

        let mut failing =
            ActivationEffect::invoke(|_| Err(anyhow!("camera busy"))).then_navigate("x.html");
        assert_eq!(activate(&element, &mut failing, &nav, &mut listeners), None);
    }
}
