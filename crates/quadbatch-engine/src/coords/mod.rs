//! Coordinate types shared by the renderer and its host.
//!
//! Canonical CPU space:
//! - Logical pixels
//! - Origin bottom-left
//! - +X right, +Y up
//!
//! The batch shader converts to clip space through an orthographic `mvp` uniform.

mod viewport;

pub use viewport::Viewport;
