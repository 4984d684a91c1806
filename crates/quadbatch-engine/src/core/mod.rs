//! Core engine-facing contracts.
//!
//! The runtime drives an [`App`] through its lifecycle: load once, then
//! update and render every frame, then close.

mod app;
mod clock;

pub use app::App;
pub use clock::FrameClock;
