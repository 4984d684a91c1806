//! Shader program of the batch renderer.
//!
//! A [`Shader`] owns the render pipeline, the uniform buffer with its bind
//! group (group 0), and the layout of the texture bind group (group 1).
//! Sources are checked with naga before any GPU object is created, so a bad
//! program surfaces as a [`ShaderError`] instead of a device error.

mod reflect;
mod source;
mod uniform;

pub use reflect::{ArrayShape, Reflection, UniformBlock, UniformField};
pub use source::{ShaderSources, Stage};
pub use uniform::{UniformCache, UniformValue};

use crate::render::batch::error::ShaderError;
use crate::render::batch::vertex::VertexLayout;

/// Combined source of the bundled batch shader.
pub const DEFAULT_SHADER: &str = include_str!("../shaders/batch.shader");

pub struct Shader {
    reflection: Reflection,
    pipeline: wgpu::RenderPipeline,

    uniforms: UniformCache,
    uniform_buffer: Option<wgpu::Buffer>,
    uniform_bind_group: wgpu::BindGroup,

    texture_layout: Option<wgpu::BindGroupLayout>,
}

impl Shader {
    /// Compiles, links and builds the pipeline for `format`.
    pub fn new(
        device: &wgpu::Device,
        sources: &ShaderSources,
        layout: &VertexLayout,
        format: wgpu::TextureFormat,
        label: &str,
    ) -> Result<Self, ShaderError> {
        let reflection = reflect::build(sources, layout)?;
        log::debug!(
            "{label}: linked `{}`/`{}`, {} uniform fields, {} texture slots",
            reflection.vertex_entry,
            reflection.fragment_entry,
            reflection.uniform.as_ref().map_or(0, |u| u.fields.len()),
            reflection.texture_slots(),
        );

        let uniforms = UniformCache::new(reflection.uniform.as_ref());

        // Group 0 is always present; it is empty when the program has no uniforms.
        let uniform_entries: Vec<wgpu::BindGroupLayoutEntry> = reflection
            .uniform
            .as_ref()
            .map(|block| wgpu::BindGroupLayoutEntry {
                binding: reflect::UNIFORM_BINDING,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: wgpu::BufferSize::new(block.buffer_size()),
                },
                count: None,
            })
            .into_iter()
            .collect();

        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(&format!("{label} uniform bgl")),
            entries: &uniform_entries,
        });

        let uniform_buffer = reflection.uniform.as_ref().map(|block| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(&format!("{label} uniform buffer")),
                size: block.buffer_size(),
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        });

        let uniform_bind_entries: Vec<wgpu::BindGroupEntry<'_>> = uniform_buffer
            .as_ref()
            .map(|buffer| wgpu::BindGroupEntry {
                binding: reflect::UNIFORM_BINDING,
                resource: buffer.as_entire_binding(),
            })
            .into_iter()
            .collect();

        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&format!("{label} uniform bind group")),
            layout: &uniform_layout,
            entries: &uniform_bind_entries,
        });

        let texture_layout = texture_layout(device, &reflection, label);

        let mut group_layouts = vec![&uniform_layout];
        if let Some(textures) = texture_layout.as_ref() {
            group_layouts.push(textures);
        }

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(&format!("{label} pipeline layout")),
            bind_group_layouts: &group_layouts,
            immediate_size: 0,
        });

        let vs_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(&format!("{label} vertex shader")),
            source: wgpu::ShaderSource::Wgsl(sources.vertex.as_str().into()),
        });
        let fs_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(&format!("{label} fragment shader")),
            source: wgpu::ShaderSource::Wgsl(sources.fragment.as_str().into()),
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(&format!("{label} pipeline")),
            layout: Some(&pipeline_layout),

            vertex: wgpu::VertexState {
                module: &vs_module,
                entry_point: Some(reflection.vertex_entry.as_str()),
                compilation_options: Default::default(),
                buffers: &[layout.buffer_layout()],
            },

            fragment: Some(wgpu::FragmentState {
                module: &fs_module,
                entry_point: Some(reflection.fragment_entry.as_str()),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),

            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },

            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        });

        Ok(Self {
            reflection,
            pipeline,
            uniforms,
            uniform_buffer,
            uniform_bind_group,
            texture_layout,
        })
    }

    /// Writes a uniform into the CPU copy; uploaded by [`Shader::flush`].
    /// Unknown names and mismatched sizes are logged and skipped.
    #[inline]
    pub fn set_uniform(&mut self, name: &str, value: UniformValue<'_>) -> bool {
        self.uniforms.set(name, value)
    }

    /// Uploads the uniform block if it changed since the last flush.
    pub fn flush(&mut self, queue: &wgpu::Queue) {
        if !self.uniforms.take_dirty() {
            return;
        }
        if let Some(buffer) = self.uniform_buffer.as_ref() {
            queue.write_buffer(buffer, 0, self.uniforms.bytes());
        }
    }

    #[inline]
    pub fn pipeline(&self) -> &wgpu::RenderPipeline {
        &self.pipeline
    }

    #[inline]
    pub fn uniform_bind_group(&self) -> &wgpu::BindGroup {
        &self.uniform_bind_group
    }

    /// Layout of group 1, if the program samples textures.
    #[inline]
    pub fn texture_layout(&self) -> Option<&wgpu::BindGroupLayout> {
        self.texture_layout.as_ref()
    }

    #[inline]
    pub fn reflection(&self) -> &Reflection {
        &self.reflection
    }

    /// Releases the uniform buffer; the pipeline is dropped with `self`.
    pub fn destroy(self) {
        if let Some(buffer) = self.uniform_buffer {
            buffer.destroy();
        }
        log::debug!(
            "shader `{}`/`{}` destroyed",
            self.reflection.vertex_entry,
            self.reflection.fragment_entry
        );
    }
}

fn texture_layout(
    device: &wgpu::Device,
    reflection: &Reflection,
    label: &str,
) -> Option<wgpu::BindGroupLayout> {
    let sampler = reflection.sampler?;

    let mut entries: Vec<wgpu::BindGroupLayoutEntry> = reflection
        .textures
        .iter()
        .map(|&binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        })
        .collect();

    entries.push(wgpu::BindGroupLayoutEntry {
        binding: sampler,
        visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
        count: None,
    });

    Some(device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(&format!("{label} texture bgl")),
        entries: &entries,
    }))
}
