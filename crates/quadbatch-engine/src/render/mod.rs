//! GPU rendering subsystem.
//!
//! Convention:
//! - CPU geometry is in logical pixels (bottom-left origin, +Y up).
//! - The vertex shader maps it to clip space with an orthographic `mvp` uniform.

mod ctx;
pub mod batch;

pub use ctx::{RenderCtx, RenderTarget};
