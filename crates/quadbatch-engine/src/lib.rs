//! quadbatch engine crate.
//!
//! A 2D renderer that batches named shapes into one vertex buffer and one
//! index buffer and draws them with a single indexed call, plus the window
//! and GPU runtime that hosts it.

pub mod device;
pub mod window;
pub mod core;

pub mod logging;
pub mod coords;
pub mod render;
pub mod paint;
