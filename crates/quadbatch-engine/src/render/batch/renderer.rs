use crate::coords::Viewport;
use crate::paint::Color;
use crate::render::{RenderCtx, RenderTarget};

use super::buffer::{check_write, BufferKind, DynamicBuffer};
use super::error::{BufferError, RenderError, TextureError};
use super::registry::{Batch, DrawCall, Insertion, ShapeRegistry};
use super::shader::{Shader, ShaderSources, UniformValue, DEFAULT_SHADER};
use super::shape::Shape;
use super::texture::{TextureImage, TextureSlots};
use super::vertex::{Vertex, VertexLayout};

const INDEX_SIZE: u64 = std::mem::size_of::<u32>() as u64;

/// Construction parameters of a [`BatchRenderer`].
#[derive(Debug, Clone, PartialEq)]
pub struct BatchConfig {
    /// Vertex buffer capacity, in vertices.
    pub max_vertices: u32,
    /// Index buffer capacity, in indices.
    pub max_indices: u32,
    pub clear_color: Color,
    /// Prefix of GPU object labels and log lines.
    pub label: &'static str,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_vertices: 1000,
            max_indices: 1000,
            clear_color: Color::GRAY,
            label: "quadbatch",
        }
    }
}

impl BatchConfig {
    pub fn validate(&self) -> Result<(), RenderError> {
        if self.max_vertices == 0 {
            return Err(RenderError::Config("max_vertices must be greater than zero".into()));
        }
        if self.max_indices == 0 {
            return Err(RenderError::Config("max_indices must be greater than zero".into()));
        }
        if !self.clear_color.is_finite() {
            return Err(RenderError::Config(format!(
                "clear_color has non-finite components: {:?}",
                self.clear_color
            )));
        }
        Ok(())
    }

    /// Fails if either buffer would exceed the device's `max_buffer_size`.
    pub fn check_limits(&self, limits: &wgpu::Limits) -> Result<(), RenderError> {
        let max = limits.max_buffer_size;
        for (what, bytes) in [("vertex", self.vertex_capacity()), ("index", self.index_capacity())] {
            if bytes > max {
                return Err(RenderError::Config(format!(
                    "{what} buffer needs {bytes} bytes, device limit is {max}"
                )));
            }
        }
        Ok(())
    }

    #[inline]
    pub fn vertex_capacity(&self) -> u64 {
        self.max_vertices as u64 * Vertex::STRIDE
    }

    #[inline]
    pub fn index_capacity(&self) -> u64 {
        self.max_indices as u64 * INDEX_SIZE
    }
}

/// Checks that both payloads of `batch` fit before either is uploaded.
fn check_capacity(batch: &Batch, vertex_capacity: u64, index_capacity: u64) -> Result<(), BufferError> {
    check_write(BufferKind::Vertex, vertex_capacity, 0, batch.vertex_bytes().len() as u64)?;
    check_write(BufferKind::Index, index_capacity, 0, batch.index_bytes().len() as u64)
}

/// Checks `batch` against both capacities, runs `write` and records the new
/// draw in `uploaded`. On any error `uploaded` keeps the previous draw.
fn stage_upload(
    uploaded: &mut Option<DrawCall>,
    batch: &Batch,
    vertex_capacity: u64,
    index_capacity: u64,
    write: impl FnOnce(&Batch) -> Result<(), BufferError>,
) -> Result<(), BufferError> {
    check_capacity(batch, vertex_capacity, index_capacity)?;
    write(batch)?;
    *uploaded = batch.draw_call();
    Ok(())
}

/// Whether the projection has to be rebuilt for `current`.
///
/// A degenerate viewport (minimized window) keeps the last projection.
fn needs_resize(last: Viewport, current: Viewport) -> bool {
    current.is_valid() && current != last
}

/// Draws every registered shape with one indexed draw call.
///
/// Per frame: shapes are (re)registered, [`BatchRenderer::update`] uploads the
/// batch, [`BatchRenderer::render`] draws it. Shapes persist across frames
/// until [`BatchRenderer::clear_shapes`].
pub struct BatchRenderer {
    config: BatchConfig,

    registry: ShapeRegistry,
    batch: Batch,
    uploaded: Option<DrawCall>,

    layout: VertexLayout,
    vertex_buffer: DynamicBuffer,
    index_buffer: DynamicBuffer,
    shader: Shader,
    textures: Option<TextureSlots>,

    viewport: Viewport,
}

impl BatchRenderer {
    pub fn new(ctx: &RenderCtx<'_>, config: BatchConfig, sources: &ShaderSources) -> Result<Self, RenderError> {
        config.validate()?;
        config.check_limits(&ctx.device.limits())?;
        let label = config.label;

        let layout = VertexLayout::standard();
        let mut shader = Shader::new(ctx.device, sources, &layout, ctx.surface_format, label)?;

        let vertex_buffer = DynamicBuffer::new(
            ctx.device,
            BufferKind::Vertex,
            config.vertex_capacity(),
            &format!("{label} vertex buffer"),
        );
        let index_buffer = DynamicBuffer::new(
            ctx.device,
            BufferKind::Index,
            config.index_capacity(),
            &format!("{label} index buffer"),
        );

        let textures = shader
            .texture_layout()
            .and_then(|bgl| TextureSlots::new(ctx.device, ctx.queue, bgl, shader.reflection(), label));

        // Texture index i samples slot i until the caller remaps it.
        let slot_count = textures.as_ref().map_or(0, |t| t.len());
        if slot_count > 0 {
            let slots: Vec<i32> = (0..slot_count as i32).collect();
            shader.set_uniform("slots", UniformValue::I32Array(&slots));
        }
        shader.set_uniform("mvp", UniformValue::Mat4(ctx.viewport.orthographic()));

        log::debug!(
            "{label}: renderer ready ({} vertices, {} indices, {slot_count} texture slots)",
            config.max_vertices,
            config.max_indices,
        );

        Ok(Self {
            config,
            registry: ShapeRegistry::new(),
            batch: Batch::default(),
            uploaded: None,
            layout,
            vertex_buffer,
            index_buffer,
            shader,
            textures,
            viewport: ctx.viewport,
        })
    }

    /// Renderer using the bundled batch shader.
    pub fn with_default_shader(ctx: &RenderCtx<'_>, config: BatchConfig) -> Result<Self, RenderError> {
        let sources = ShaderSources::parse(DEFAULT_SHADER)?;
        Self::new(ctx, config, &sources)
    }

    #[inline]
    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    #[inline]
    pub fn layout(&self) -> &VertexLayout {
        &self.layout
    }

    /// Number of texture slots the shader samples; zero without a sampler.
    #[inline]
    pub fn texture_slots(&self) -> u32 {
        self.textures.as_ref().map_or(0, |t| t.len())
    }

    /// Registers `shape` unless `name` is taken.
    ///
    /// Fails without registering if a textured vertex names a slot past
    /// [`BatchRenderer::texture_slots`].
    pub fn add_or_ignore(
        &mut self,
        name: impl Into<String>,
        shape: impl Into<Shape>,
    ) -> Result<Insertion, RenderError> {
        let shape = shape.into();
        shape.check_texture_slots(self.texture_slots())?;
        Ok(self.registry.add_or_ignore(name, shape))
    }

    /// Registers `shape`, replacing an existing shape of the same name in place.
    ///
    /// Texture slots are checked as in [`BatchRenderer::add_or_ignore`].
    pub fn add_or_replace(
        &mut self,
        name: impl Into<String>,
        shape: impl Into<Shape>,
    ) -> Result<Insertion, RenderError> {
        let shape = shape.into();
        shape.check_texture_slots(self.texture_slots())?;
        Ok(self.registry.add_or_replace(name, shape))
    }

    /// Drops every shape. The GPU buffers keep their last upload until the next `update`.
    #[inline]
    pub fn clear_shapes(&mut self) {
        self.registry.clear();
    }

    #[inline]
    pub fn registry(&self) -> &ShapeRegistry {
        &self.registry
    }

    /// The draw that the next [`BatchRenderer::render`] will issue.
    #[inline]
    pub fn uploaded(&self) -> Option<DrawCall> {
        self.uploaded
    }

    /// Flattens the registry and uploads vertices and global indices.
    ///
    /// Both capacities are checked first; on overflow neither buffer is
    /// touched and the previous upload stays drawable.
    pub fn update(&mut self, ctx: &RenderCtx<'_>) -> Result<(), RenderError> {
        self.registry.flatten_into(&mut self.batch);

        let vertex_buffer = &mut self.vertex_buffer;
        let index_buffer = &mut self.index_buffer;
        stage_upload(
            &mut self.uploaded,
            &self.batch,
            vertex_buffer.capacity(),
            index_buffer.capacity(),
            |batch| {
                vertex_buffer.write(ctx.queue, 0, batch.vertex_bytes())?;
                index_buffer.write(ctx.queue, 0, batch.index_bytes())
            },
        )?;

        log::trace!(
            "{}: uploaded {} vertices / {} indices",
            self.config.label,
            self.batch.vertex_count(),
            self.batch.index_count()
        );
        Ok(())
    }

    /// Sets the `mvp` uniform from `viewport`.
    pub fn resize(&mut self, viewport: Viewport) {
        self.viewport = viewport;
        self.shader
            .set_uniform("mvp", UniformValue::Mat4(viewport.orthographic()));
    }

    /// Clears the target and draws the last uploaded batch.
    ///
    /// Returns the issued draw, or `None` if the batch was empty.
    pub fn render(&mut self, ctx: &RenderCtx<'_>, target: &mut RenderTarget<'_>) -> Option<DrawCall> {
        if needs_resize(self.viewport, ctx.viewport) {
            self.resize(ctx.viewport);
        }
        self.shader.flush(ctx.queue);

        let mut pass = target.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(self.config.label),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target.color_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(self.config.clear_color.to_wgpu()),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });

        let draw = self.uploaded?;
        let vertices = self.vertex_buffer.filled_slice()?;
        let indices = self.index_buffer.filled_slice()?;

        pass.set_pipeline(self.shader.pipeline());
        pass.set_bind_group(0, self.shader.uniform_bind_group(), &[]);
        if let Some(textures) = self.textures.as_ref() {
            pass.set_bind_group(1, textures.bind_group(), &[]);
        }
        pass.set_vertex_buffer(0, vertices);
        pass.set_index_buffer(indices, wgpu::IndexFormat::Uint32);
        pass.draw_indexed(0..draw.index_count, 0, 0..1);

        log::trace!("{}: draw_indexed({} indices)", self.config.label, draw.index_count);
        Some(draw)
    }

    #[inline]
    pub fn set_uniform(&mut self, name: &str, value: UniformValue<'_>) -> bool {
        self.shader.set_uniform(name, value)
    }

    /// Uploads `image` into texture `slot`.
    pub fn bind_texture(&mut self, ctx: &RenderCtx<'_>, slot: u32, image: &TextureImage) -> Result<(), RenderError> {
        let Some(textures) = self.textures.as_mut() else {
            return Err(TextureError::SlotOutOfRange { slot, slots: 0 }.into());
        };
        textures.bind(ctx.device, ctx.queue, slot, image)?;
        Ok(())
    }

    /// Destroys the vertex and index buffers, the shader's uniform buffer and
    /// every slot texture. The pipeline and bind groups are dropped with them.
    pub fn destroy(self) {
        let Self {
            config,
            vertex_buffer,
            index_buffer,
            shader,
            textures,
            ..
        } = self;

        vertex_buffer.destroy();
        index_buffer.destroy();
        shader.destroy();
        if let Some(textures) = textures {
            textures.destroy();
        }
        log::debug!("{}: renderer destroyed", config.label);
    }
}
