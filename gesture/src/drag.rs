//! Dragging panels around, and snapping them to an edge when they are released.

use std::time::Duration;

use log::debug;

use hud_geometry::{Point, Rect, Size};
use hud_input::{InputEvent, Movement, PointerEvent, PointerSession, SessionSlot};
use hud_util::Progress;

use crate::{Effect, Transition};

/// Where a released panel comes to rest.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SnapPolicy {
    pub margin: f64,
    pub left_fraction: f64,
    pub right_fraction: f64,
}

impl Default for SnapPolicy {
    fn default() -> Self {
        crate::config::DragSettings::default().snap_policy()
    }
}

impl SnapPolicy {
    /// Computes the resting position of `rect` inside `viewport`.
    ///
    /// Horizontally, a panel that ends up in the left quarter snaps to the left edge, one that
    /// reaches into the right quarter snaps to the right edge, and anything in between stays.
    /// Vertically the panel is kept `margin` away from both edges. A panel taller than the space
    /// between the margins is placed `margin` below the top edge and overflows at the bottom.
    pub fn rest_position(&self, rect: Rect, viewport: Size) -> Point {
        let margin = self.margin;
        let left = if rect.left < viewport.width * self.left_fraction {
            margin
        } else if rect.right > viewport.width * self.right_fraction {
            viewport.width - rect.width() - margin
        } else {
            rect.left
        };

        let top = rect
            .top
            .min(viewport.height - rect.height() - margin)
            .max(margin);

        Point::new(left, top)
    }
}

/// An element on the path from the pressed element up to the dragged one.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PressTarget {
    pub tag: String,
    pub classes: Vec<String>,
}

impl PressTarget {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            classes: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.classes.push(class.into());
        self
    }
}

/// Interactive elements inside a panel that must keep working instead of starting a drag.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExclusionSet {
    tags: Vec<String>,
    classes: Vec<String>,
}

impl ExclusionSet {
    pub fn new(tags: Vec<String>, classes: Vec<String>) -> Self {
        Self { tags, classes }
    }

    /// `true` if any element on the press path is excluded. Tags compare case-insensitively, DOM
    /// tag names are upper case.
    pub fn excludes(&self, path: &[PressTarget]) -> bool {
        path.iter().any(|target| {
            self.tags.iter().any(|tag| tag.eq_ignore_ascii_case(&target.tag))
                || target.classes.iter().any(|c| self.classes.contains(c))
        })
    }
}

/// The draggable element's geometry. Only the engine that owns the element writes its position.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DragTarget {
    pub position: Point,
    pub size: Size,
}

impl DragTarget {
    pub fn new(position: impl Into<Point>, size: impl Into<Size>) -> Self {
        Self {
            position: position.into(),
            size: size.into(),
        }
    }

    pub fn rect(&self) -> Rect {
        Rect::new(self.position, self.size)
    }
}

/// Moves one element with the pointer that pressed it.
#[derive(Debug)]
pub struct DragEngine {
    target: DragTarget,
    policy: SnapPolicy,
    exclusions: ExclusionSet,
    /// Duration of the eased transition into the resting position.
    settle: Duration,
    slot: SessionSlot<Movement>,
}

impl DragEngine {
    pub fn new(
        target: DragTarget,
        policy: SnapPolicy,
        exclusions: ExclusionSet,
        settle: Duration,
    ) -> Self {
        Self {
            target,
            policy,
            exclusions,
            settle,
            slot: SessionSlot::default(),
        }
    }

    pub fn target(&self) -> &DragTarget {
        &self.target
    }

    /// Adopts the element's measured bounds, for example after its content changed.
    ///
    /// While dragging only the size is taken, the position is the one the engine writes. Empty
    /// bounds, as measured on hidden elements, are ignored.
    pub fn refresh(&mut self, rect: Rect) {
        if rect.size().is_empty() {
            debug!("Ignoring empty bounds {rect:?}");
            return;
        }
        self.target.size = rect.size();
        if !self.is_dragging() {
            self.target.position = rect.origin();
        }
    }

    pub fn is_dragging(&self) -> bool {
        self.slot.is_active()
    }

    /// Starts dragging, unless the press landed on an excluded element, was not a primary press, or
    /// a drag is already in progress.
    pub fn begin(&mut self, event: &PointerEvent, path: &[PressTarget]) -> Vec<Effect> {
        if !event.is_primary_press() {
            return Vec::new();
        }
        if self.exclusions.excludes(path) {
            debug!("Press on an excluded element, not dragging");
            return Vec::new();
        }
        let session = PointerSession::for_pointer(event, self.target.position);
        if !self.slot.begin(Movement::new(session)) {
            return Vec::new();
        }
        debug!("Drag started by {} at {:?}", event.pointer, event.pos);
        vec![
            Effect::Transition(Transition::None),
            Effect::CapturePointer(event.pointer),
        ]
    }

    /// Follows a pointer move. Only the pointer that started the drag moves the element.
    pub fn update(&mut self, event: &PointerEvent) -> Vec<Effect> {
        self.track(&InputEvent::PointerMove(event.clone()), Size::default())
    }

    /// Releases the element and lets it settle at its resting position.
    pub fn end(&mut self, viewport: Size) -> Vec<Effect> {
        let Some(movement) = self.slot.commit() else {
            return Vec::new();
        };
        self.target.position = movement.to();
        let rest = self.policy.rest_position(self.target.rect(), viewport);
        debug!(
            "Drag ended at {:?}, settling at {:?}",
            self.target.position, rest
        );
        self.target.position = rest;

        let mut effects = vec![
            Effect::Transition(Transition::Eased(self.settle)),
            Effect::Move(rest),
        ];
        effects.extend(movement.pointer.map(Effect::ReleasePointer));
        effects
    }

    /// Ends the drag where the element is, without snapping.
    pub fn cancel(&mut self) -> Vec<Effect> {
        let Some(movement) = self.slot.abort() else {
            return Vec::new();
        };
        debug!("Drag cancelled at {:?}", self.target.position);
        movement.pointer.map(Effect::ReleasePointer).into_iter().collect()
    }

    /// Routes any input event. `path` is only consulted for presses, `viewport` only on release.
    pub fn handle(&mut self, event: &InputEvent, path: &[PressTarget], viewport: Size) -> Vec<Effect> {
        match event {
            InputEvent::PointerDown(e) => self.begin(e, path),
            event => self.track(event, viewport),
        }
    }

    /// Places the element horizontally centered, `top` pixels from the top of the viewport.
    ///
    /// Ignored while the element is being dragged.
    pub fn center_horizontally(&mut self, viewport: Size, top: f64) -> Vec<Effect> {
        if self.is_dragging() {
            debug!("Not centering, drag in progress");
            return Vec::new();
        }
        let left = ((viewport.width - self.target.size.width) / 2.0).max(0.0);
        let position = Point::new(left, top);
        if position == self.target.position {
            return Vec::new();
        }
        self.target.position = position;
        vec![Effect::Move(position)]
    }

    fn track(&mut self, event: &InputEvent, viewport: Size) -> Vec<Effect> {
        let Some(movement) = self.slot.active_mut() else {
            return Vec::new();
        };
        match movement.track(event) {
            None => Vec::new(),
            Some(Progress::Proceed(_)) => {
                let position = movement.to();
                self.target.position = position;
                vec![Effect::Move(position)]
            }
            Some(Progress::Commit) => self.end(viewport),
            Some(Progress::Cancel) => self.cancel(),
        }
    }
}
