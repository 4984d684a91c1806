//! Vertex batching: named shapes are flattened into one vertex buffer and
//! one index buffer and drawn with a single indexed draw call.
//!
//! Data flow per frame:
//! `Shape` -> [`ShapeRegistry`] (local indices) -> [`Batch`] (global indices)
//! -> [`DynamicBuffer`] uploads -> one `draw_indexed`.

mod buffer;
mod error;
mod registry;
mod renderer;
mod shape;
mod texture;
mod vertex;

pub mod shader;

pub use buffer::{check_write, BufferKind, DynamicBuffer};
pub use error::{BufferError, RenderError, ShaderError, ShapeError, TextureError};
pub use registry::{Batch, DrawCall, Insertion, ShapeRegistry, ShapeSpan};
pub use renderer::{BatchConfig, BatchRenderer};
pub use shader::{Shader, ShaderSources, Stage, UniformValue, DEFAULT_SHADER};
pub use shape::{Quad, Shape, QUAD_INDICES};
pub use texture::{check_texture_size, TextureImage, TextureSlots};
pub use vertex::{Vertex, VertexLayout};
