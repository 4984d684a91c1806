//! Color model shared between shape construction and the renderer.

mod color;

pub use color::Color;
