//! Geometry primitives for positioning HUD panels in CSS pixel space.

mod point;
mod rect;
mod size;
mod unit_interval;

pub use point::*;
pub use rect::*;
pub use size::*;
pub use unit_interval::*;
