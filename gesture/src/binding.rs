use std::{collections::BTreeMap, time::Duration};

use derive_more::{Display, From};
use log::warn;

use hud_geometry::Rect;

use crate::{HoldConfig, PressTarget};

/// The id of a bound element.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Display, From)]
pub struct ElementId(String);

impl From<&str> for ElementId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl ElementId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

pub const URL_ATTRIBUTE: &str = "data-longpress-url";
pub const DURATION_ATTRIBUTES: [&str; 2] = ["data-longpress-duration", "data-hold-ms"];
pub const TOLERANCE_ATTRIBUTE: &str = "data-move-tolerance";

/// Per-element overrides of the hold configuration, read from the element's attributes.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BindingOptions {
    pub url: Option<String>,
    pub hold_duration: Option<Duration>,
    pub move_tolerance: Option<f64>,
}

impl BindingOptions {
    /// Invalid values are logged and ignored.
    pub fn from_attributes(attributes: &BTreeMap<String, String>) -> Self {
        let url = attributes
            .get(URL_ATTRIBUTE)
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty());

        let hold_duration = DURATION_ATTRIBUTES
            .iter()
            .find_map(|name| attributes.get(*name).map(|value| (*name, value)))
            .and_then(|(name, value)| match value.trim().parse::<u64>() {
                Ok(ms) if ms > 0 => Some(Duration::from_millis(ms)),
                _ => {
                    warn!("Ignoring {name}=\"{value}\", expected milliseconds greater than zero");
                    None
                }
            });

        let move_tolerance = attributes.get(TOLERANCE_ATTRIBUTE).and_then(|value| {
            match value.trim().parse::<f64>() {
                Ok(px) if px.is_finite() && px >= 0.0 => Some(px),
                _ => {
                    warn!(
                        "Ignoring {TOLERANCE_ATTRIBUTE}=\"{value}\", expected a non-negative number"
                    );
                    None
                }
            }
        });

        Self {
            url,
            hold_duration,
            move_tolerance,
        }
    }

    /// `config` with this binding's overrides applied.
    pub fn apply_to(&self, config: &HoldConfig) -> HoldConfig {
        HoldConfig {
            hold_duration: self.hold_duration.unwrap_or(config.hold_duration),
            move_tolerance: self.move_tolerance.unwrap_or(config.move_tolerance),
            ..config.clone()
        }
    }
}

/// What the controller needs to know about an element of the page.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ElementDescriptor {
    pub id: ElementId,
    pub tag: String,
    pub classes: Vec<String>,
    pub attributes: BTreeMap<String, String>,
    /// The element's layout box in viewport coordinates.
    pub rect: Rect,
}

impl ElementDescriptor {
    pub fn new(id: impl Into<ElementId>, tag: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tag: tag.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.classes.push(class.into());
        self
    }

    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_rect(mut self, rect: impl Into<Rect>) -> Self {
        self.rect = rect.into();
        self
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }

    /// `true` if the element declares a hold target.
    pub fn is_hold_control(&self) -> bool {
        self.attributes.contains_key(URL_ATTRIBUTE)
    }

    pub fn binding_options(&self) -> BindingOptions {
        BindingOptions::from_attributes(&self.attributes)
    }
}

impl From<&ElementDescriptor> for PressTarget {
    fn from(element: &ElementDescriptor) -> Self {
        PressTarget {
            tag: element.tag.clone(),
            classes: element.classes.clone(),
        }
    }
}
