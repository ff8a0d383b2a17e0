//! A unified pointer, touch, and keyboard event model and the pointer session lifecycle the
//! gesture engines are built on.
pub mod detect;
mod event;
mod sensor;
mod session;
mod tracker;

pub use event::*;
pub use sensor::*;
pub use session::*;
pub use tracker::*;
