//! How effects and configuration are expressed in CSS.

use hud_geometry::UnitInterval;
use hud_gesture::{HudConfig, Transition, URL_ATTRIBUTE};

/// The custom property hold controls render their progress from.
pub const PROGRESS_PROPERTY: &str = "--hold-progress";
/// Set on hold controls while they are held down.
pub const HOLDING_CLASS: &str = "holding";

pub fn px(v: f64) -> String {
    format!("{v}px")
}

pub fn transition(transition: Transition) -> String {
    match transition {
        Transition::None => "none".into(),
        Transition::Eased(duration) => format!("all {}s ease-out", duration.as_secs_f64()),
    }
}

pub fn progress(progress: UnitInterval) -> String {
    format!("{:.3}", progress.value())
}

/// Selects every element the controller may bind.
pub fn bindable_selector(config: &HudConfig) -> String {
    let mut selectors = vec![format!("[{URL_ATTRIBUTE}]")];
    selectors.extend(config.drag.draggable_class.iter().map(|c| format!(".{c}")));
    selectors.extend(config.drag.draggable_ids.iter().map(|id| format!("#{id}")));
    selectors.extend(
        config
            .navigation
            .fallback_element
            .iter()
            .map(|id| format!("#{id}")),
    );
    selectors.join(", ")
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn transitions() {
        assert_eq!(transition(Transition::None), "none");
        assert_eq!(
            transition(Transition::Eased(Duration::from_millis(250))),
            "all 0.25s ease-out"
        );
    }

    #[test]
    fn values() {
        assert_eq!(px(12.0), "12px");
        assert_eq!(px(787.5), "787.5px");
        assert_eq!(progress(UnitInterval::new(0.25)), "0.250");
        assert_eq!(progress(UnitInterval::ONE), "1.000");
    }

    #[test]
    fn default_selector() {
        assert_eq!(
            bindable_selector(&HudConfig::default()),
            "[data-longpress-url], .miniWin, #hudShell, #advanceBtn"
        );
    }
}
