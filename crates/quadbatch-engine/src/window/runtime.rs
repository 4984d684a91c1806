use anyhow::{Context, Result};
use ouroboros::self_referencing;

use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

use crate::core::{App, FrameClock};
use crate::device::{Gpu, GpuInit, SurfaceErrorAction};
use crate::render::RenderTarget;

/// Window configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub title: String,
    pub initial_size: LogicalSize<f64>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            title: "quadbatch".to_string(),
            initial_size: LogicalSize::new(1280.0, 720.0),
        }
    }
}

/// Entry point for the runtime.
pub struct Runtime;

impl Runtime {
    /// Opens one window and drives `app` until the window closes or a callback fails.
    pub fn run<A>(config: RuntimeConfig, gpu_init: GpuInit, app: A) -> Result<()>
    where
        A: 'static + App,
    {
        let event_loop = EventLoop::new().context("failed to create winit EventLoop")?;
        let mut state = AppState::new(config, gpu_init, app);

        event_loop
            .run_app(&mut state)
            .context("winit event loop terminated with error")?;

        Ok(())
    }
}

#[self_referencing]
struct WindowEntry {
    clock: FrameClock,

    window: Window,

    #[borrows(window)]
    #[covariant]
    gpu: Gpu<'this>,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum Flow {
    Continue,
    Exit,
}

struct AppState<A>
where
    A: App + 'static,
{
    config: RuntimeConfig,
    gpu_init: GpuInit,
    app: A,

    entry: Option<WindowEntry>,
    closed: bool,
}

impl<A> AppState<A>
where
    A: App + 'static,
{
    fn new(config: RuntimeConfig, gpu_init: GpuInit, app: A) -> Self {
        Self {
            config,
            gpu_init,
            app,
            entry: None,
            closed: false,
        }
    }

    fn create_entry(&mut self, event_loop: &ActiveEventLoop) -> Result<WindowEntry> {
        let attrs = Window::default_attributes()
            .with_title(self.config.title.clone())
            .with_inner_size(self.config.initial_size);

        let window = event_loop
            .create_window(attrs)
            .context("failed to create window")?;

        let gpu_init = self.gpu_init.clone();
        WindowEntryTryBuilder {
            clock: FrameClock::default(),
            window,
            gpu_builder: |w| pollster::block_on(Gpu::new(w, gpu_init)),
        }
        .try_build()
        .context("GPU initialization failed")
    }

    /// Runs `on_close` (once) while the GPU context is alive, then drops it.
    fn shutdown(&mut self, event_loop: &ActiveEventLoop) {
        if !self.closed {
            self.closed = true;
            self.app.on_close();
            self.entry = None;
            log::debug!("runtime shut down");
        }
        event_loop.exit();
    }

    fn frame(&mut self) -> Flow {
        let app = &mut self.app;
        let Some(entry) = self.entry.as_mut() else {
            return Flow::Continue;
        };

        entry.with_mut(|fields| {
            let size = fields.gpu.size();
            if size.width == 0 || size.height == 0 {
                return Flow::Continue;
            }

            let dt = fields.clock.tick();
            let gpu = fields.gpu;

            {
                let ctx = gpu.render_ctx();
                if let Err(e) = app.on_update(&ctx, dt) {
                    log::error!("update failed: {e:#}");
                    return Flow::Exit;
                }
            }

            let mut frame = match gpu.begin_frame() {
                Ok(f) => f,
                Err(err) => {
                    return match gpu.handle_surface_error(err) {
                        SurfaceErrorAction::Fatal => {
                            log::error!("fatal surface error; exiting");
                            Flow::Exit
                        }
                        _ => Flow::Continue,
                    };
                }
            };

            {
                let ctx = gpu.render_ctx();
                let mut target = RenderTarget::new(&mut frame.encoder, &frame.view);
                app.on_render(&ctx, &mut target);
            }

            fields.window.pre_present_notify();
            gpu.submit(frame);
            Flow::Continue
        })
    }
}

impl<A> ApplicationHandler for AppState<A>
where
    A: App + 'static,
{
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.entry.is_some() || self.closed {
            return;
        }

        let entry = match self.create_entry(event_loop) {
            Ok(entry) => entry,
            Err(e) => {
                log::error!("failed to create window: {e:#}");
                self.closed = true;
                event_loop.exit();
                return;
            }
        };

        let loaded = entry.with_gpu(|gpu| self.app.on_load(&gpu.render_ctx()));
        self.entry = Some(entry);

        if let Err(e) = loaded {
            log::error!("load failed: {e:#}");
            self.shutdown(event_loop);
            return;
        }

        if let Some(entry) = self.entry.as_mut() {
            entry.with_clock_mut(|clock| clock.reset());
            entry.with_window(|w| w.request_redraw());
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.closed {
            event_loop.exit();
            return;
        }

        // Continuous redraw.
        event_loop.set_control_flow(ControlFlow::Wait);
        if let Some(entry) = self.entry.as_ref() {
            entry.with_window(|w| w.request_redraw());
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        if self.closed {
            event_loop.exit();
            return;
        }

        match event {
            WindowEvent::CloseRequested => self.shutdown(event_loop),

            WindowEvent::Resized(new_size) => {
                if let Some(entry) = self.entry.as_mut() {
                    entry.with_gpu_mut(|gpu| gpu.resize(new_size));
                    entry.with_window(|w| w.request_redraw());
                }
            }

            WindowEvent::ScaleFactorChanged { scale_factor, .. } => {
                if let Some(entry) = self.entry.as_mut() {
                    let new_size = entry.with_window(|w| w.inner_size());
                    entry.with_gpu_mut(|gpu| {
                        gpu.set_scale_factor(scale_factor);
                        gpu.resize(new_size);
                    });
                    entry.with_window(|w| w.request_redraw());
                }
            }

            WindowEvent::RedrawRequested => {
                if self.frame() == Flow::Exit {
                    self.shutdown(event_loop);
                }
            }

            _ => {}
        }
    }
}
