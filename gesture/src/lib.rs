//! Pointer-driven gesture interpretation for HUD panels and controls.
//!
//! Two engines share the [`hud_input::PointerSession`] lifecycle:
//!
//! - [`DragEngine`] repositions a panel in lock-step with the pointer and snaps it to an edge on
//!   release.
//! - [`HoldMachine`] activates a control after the pointer (or Space / Enter) was held for a
//!   configured duration.
//!
//! Engines are pure state machines: they consume [`hud_input::InputEvent`]s and return the
//! [`Effect`]s a host has to apply. [`Hud`] composes them per element.
mod activation;
mod binding;
pub mod config;
mod drag;
mod effect;
mod helper;
mod hold;
mod hud;

pub use activation::*;
pub use binding::*;
pub use config::HudConfig;
pub use drag::*;
pub use effect::*;
pub use helper::*;
pub use hold::*;
pub use hud::*;
