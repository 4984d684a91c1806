mod layer;

use anyhow::{Context, Result};

use quadbatch_engine::core::App;
use quadbatch_engine::coords::Viewport;
use quadbatch_engine::device::GpuInit;
use quadbatch_engine::logging::{init_logging, LoggingConfig};
use quadbatch_engine::render::batch::{BatchConfig, BatchRenderer, TextureImage};
use quadbatch_engine::render::{RenderCtx, RenderTarget};
use quadbatch_engine::window::{Runtime, RuntimeConfig};

use layer::TaskbarLayer;

const CHECKER_SLOT: u32 = 0;

/// Whether the panels must be laid out again for `viewport`.
fn needs_layout(laid_out: Option<Viewport>, viewport: Viewport) -> bool {
    laid_out != Some(viewport)
}

#[derive(Default)]
struct DemoApp {
    renderer: Option<BatchRenderer>,
    layer: TaskbarLayer,
    /// Viewport the registered shapes were laid out for.
    laid_out: Option<Viewport>,
}

impl App for DemoApp {
    fn on_load(&mut self, ctx: &RenderCtx<'_>) -> Result<()> {
        let mut renderer = BatchRenderer::with_default_shader(ctx, BatchConfig::default())
            .context("failed to create batch renderer")?;

        let checker = TextureImage::checkerboard(64, 8, [240, 240, 240, 255], [40, 40, 40, 255]);
        renderer
            .bind_texture(ctx, CHECKER_SLOT, &checker)
            .context("failed to bind checkerboard texture")?;

        self.renderer = Some(renderer);
        Ok(())
    }

    fn on_update(&mut self, ctx: &RenderCtx<'_>, _dt: f32) -> Result<()> {
        let Some(renderer) = self.renderer.as_mut() else {
            return Ok(());
        };

        // Panels are anchored to the top edge: rebuild the whole set on resize.
        if needs_layout(self.laid_out, ctx.viewport) {
            renderer.clear_shapes();
            for (name, quad) in self.layer.panels(ctx.viewport, CHECKER_SLOT) {
                renderer
                    .add_or_ignore(name, quad)
                    .with_context(|| format!("failed to register {name}"))?;
            }
            self.laid_out = Some(ctx.viewport);
            log::debug!("layout for {}x{}", ctx.viewport.width, ctx.viewport.height);
        }

        renderer.update(ctx).context("batch upload failed")?;
        Ok(())
    }

    fn on_render(&mut self, ctx: &RenderCtx<'_>, target: &mut RenderTarget<'_>) {
        if let Some(renderer) = self.renderer.as_mut() {
            renderer.render(ctx, target);
        }
    }

    fn on_close(&mut self) {
        if let Some(renderer) = self.renderer.take() {
            renderer.destroy();
        }
    }
}

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());

    let config = RuntimeConfig {
        title: "quadbatch demo".to_string(),
        ..Default::default()
    };

    Runtime::run(config, GpuInit::default(), DemoApp::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── layout ────────────────────────────────────────────────────────────

    #[test]
    fn first_frame_lays_out() {
        assert!(needs_layout(None, Viewport::new(800.0, 600.0)));
    }

    #[test]
    fn steady_viewport_skips_layout() {
        let vp = Viewport::new(800.0, 600.0);
        assert!(!needs_layout(Some(vp), vp));
    }

    #[test]
    fn resize_lays_out_again() {
        let vp = Viewport::new(800.0, 600.0);
        assert!(needs_layout(Some(vp), Viewport::new(1024.0, 600.0)));
    }
}
