//! The HUD configuration, loaded from TOML. Every field has a default, so an empty file is a valid
//! configuration.

use std::{fs, path::Path, time::Duration};

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use crate::{ExclusionSet, HoldConfig, SnapPolicy, Vibration};

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HudConfig {
    pub hold: HoldSettings,
    pub drag: DragSettings,
    pub navigation: NavigationSettings,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HoldSettings {
    /// How long a control has to be held before it activates.
    pub duration_ms: u64,
    /// How far the pointer may wander from where it was pressed, in CSS pixels.
    pub move_tolerance: f64,
    /// Delay between the activation and the navigation, so that the progress indicator can be seen
    /// completing.
    pub grace_ms: u64,
    pub start_vibration_ms: u32,
    pub commit_vibration_ms: Vec<u32>,
}

impl Default for HoldSettings {
    fn default() -> Self {
        Self {
            duration_ms: 800,
            move_tolerance: 12.0,
            grace_ms: 120,
            start_vibration_ms: 8,
            commit_vibration_ms: vec![20, 40, 10],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DragSettings {
    /// Distance kept from the viewport edges after snapping.
    pub margin: f64,
    /// Panels whose left edge ends left of this fraction of the viewport width snap left.
    pub left_fraction: f64,
    /// Panels whose right edge ends right of this fraction of the viewport width snap right.
    pub right_fraction: f64,
    /// Duration of the eased transition into the snapped position.
    pub transition_ms: u64,
    /// Top offset of panels that are centered on load and resize.
    pub initial_top: f64,
    /// Presses on or inside these elements never start a drag.
    pub excluded_tags: Vec<String>,
    pub excluded_classes: Vec<String>,
    /// Elements with this class are draggable, including those added later.
    pub draggable_class: Option<String>,
    /// Elements with these ids are draggable and centered horizontally on load and resize.
    pub draggable_ids: Vec<String>,
}

impl Default for DragSettings {
    fn default() -> Self {
        Self {
            margin: 12.0,
            left_fraction: 0.25,
            right_fraction: 0.75,
            transition_ms: 250,
            initial_top: 20.0,
            excluded_tags: vec!["button".into(), "input".into()],
            excluded_classes: vec!["hud-btn".into()],
            draggable_class: Some("miniWin".into()),
            draggable_ids: vec!["hudShell".into()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NavigationSettings {
    /// The page-level navigation target, used when a control has no URL of its own.
    pub default_url: Option<String>,
    /// Used when neither the control nor the page define a target.
    pub fallback_url: Option<String>,
    /// Bound as a hold control if the page has no `data-longpress-url` element.
    pub fallback_element: Option<String>,
}

impl Default for NavigationSettings {
    fn default() -> Self {
        Self {
            default_url: None,
            fallback_url: Some("/".into()),
            fallback_element: Some("advanceBtn".into()),
        }
    }
}

impl HudConfig {
    pub fn from_toml_str(toml: &str) -> Result<Self> {
        let config: HudConfig =
            toml::from_str(toml).context("Failed to parse the HUD configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let toml = fs::read_to_string(path)
            .with_context(|| format!("Failed to read the HUD configuration {}", path.display()))?;
        Self::from_toml_str(&toml).with_context(|| format!("In {}", path.display()))
    }

    pub fn validate(&self) -> Result<()> {
        let hold = &self.hold;
        if hold.duration_ms == 0 {
            bail!("hold.duration_ms must be greater than zero");
        }
        if !(hold.move_tolerance.is_finite() && hold.move_tolerance >= 0.0) {
            bail!(
                "hold.move_tolerance must be a non-negative number, was {}",
                hold.move_tolerance
            );
        }

        let drag = &self.drag;
        if !(drag.margin.is_finite() && drag.margin >= 0.0) {
            bail!("drag.margin must be a non-negative number, was {}", drag.margin);
        }
        if !(0.0..=1.0).contains(&drag.left_fraction)
            || !(0.0..=1.0).contains(&drag.right_fraction)
            || drag.left_fraction > drag.right_fraction
        {
            bail!(
                "drag fractions must satisfy 0 <= left_fraction ({}) <= right_fraction ({}) <= 1",
                drag.left_fraction,
                drag.right_fraction
            );
        }
        Ok(())
    }
}

impl HoldSettings {
    pub fn hold_config(&self) -> HoldConfig {
        HoldConfig {
            hold_duration: Duration::from_millis(self.duration_ms),
            move_tolerance: self.move_tolerance,
            start_vibration: Vibration::pulse(self.start_vibration_ms),
            commit_vibration: self.commit_vibration_ms.clone().into(),
        }
    }

    pub fn grace(&self) -> Duration {
        Duration::from_millis(self.grace_ms)
    }
}

impl DragSettings {
    pub fn snap_policy(&self) -> SnapPolicy {
        SnapPolicy {
            margin: self.margin,
            left_fraction: self.left_fraction,
            right_fraction: self.right_fraction,
        }
    }

    pub fn exclusions(&self) -> ExclusionSet {
        ExclusionSet::new(self.excluded_tags.clone(), self.excluded_classes.clone())
    }

    pub fn settle_duration(&self) -> Duration {
        Duration::from_millis(self.transition_ms)
    }

    pub fn is_draggable(&self, id: &str, classes: &[String]) -> bool {
        self.draggable_ids.iter().any(|d| d == id)
            || self
                .draggable_class
                .as_ref()
                .is_some_and(|class| classes.contains(class))
    }

    pub fn is_centered(&self, id: &str) -> bool {
        self.draggable_ids.iter().any(|d| d == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_is_the_default() {
        let config = HudConfig::from_toml_str("").unwrap();
        assert_eq!(config, HudConfig::default());
        assert_eq!(config.hold.duration_ms, 800);
        assert_eq!(config.drag.margin, 12.0);
        assert_eq!(config.navigation.fallback_url.as_deref(), Some("/"));
    }

    #[test]
    fn partial_sections_keep_defaults() {
        let config = HudConfig::from_toml_str(
            r#"
[hold]
duration_ms = 1400

[navigation]
default_url = "video_scene2_.html"
            "#,
        )
        .unwrap();

        assert_eq!(config.hold.duration_ms, 1400);
        assert_eq!(config.hold.move_tolerance, 12.0);
        assert_eq!(
            config.hold.hold_config().hold_duration,
            Duration::from_millis(1400)
        );
        assert_eq!(
            config.navigation.default_url.as_deref(),
            Some("video_scene2_.html")
        );
        assert_eq!(
            config.navigation.fallback_element.as_deref(),
            Some("advanceBtn")
        );
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(HudConfig::from_toml_str("[hold]\nduration_ms = 0").is_err());
        assert!(HudConfig::from_toml_str("[hold]\nmove_tolerance = -1.0").is_err());
        assert!(
            HudConfig::from_toml_str("[drag]\nleft_fraction = 0.8\nright_fraction = 0.2").is_err()
        );
        assert!(HudConfig::from_toml_str("[hold]\nunknown = 1").is_err());
    }

    #[test]
    fn draggable_by_id_or_class() {
        let drag = DragSettings::default();
        assert!(drag.is_draggable("hudShell", &[]));
        assert!(drag.is_draggable("win-1", &["miniWin".to_string()]));
        assert!(!drag.is_draggable("advanceBtn", &["hud-btn".to_string()]));
        assert!(drag.is_centered("hudShell"));
        assert!(!drag.is_centered("win-1"));
    }
}
