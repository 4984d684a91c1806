use anyhow::Result;

use crate::render::{RenderCtx, RenderTarget};

/// Application contract driven by [`Runtime`](crate::window::Runtime).
///
/// An error from `on_load` or `on_update` ends the loop; `on_close` still runs.
pub trait App {
    /// Called once the GPU context exists, before the first frame.
    fn on_load(&mut self, ctx: &RenderCtx<'_>) -> Result<()>;

    /// Called once per frame before rendering. `dt` is in seconds.
    fn on_update(&mut self, ctx: &RenderCtx<'_>, dt: f32) -> Result<()>;

    /// Records draw commands for the frame into `target`.
    fn on_render(&mut self, ctx: &RenderCtx<'_>, target: &mut RenderTarget<'_>);

    /// Called once before the GPU context is dropped.
    fn on_close(&mut self) {}
}
