mod movement;

pub use movement::*;
