//! Error types of the batch renderer.

use thiserror::Error;

use super::buffer::BufferKind;
use super::shader::Stage;

/// A shape that would break the index contract of the batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShapeError {
    #[error("shape has no vertices")]
    Empty,

    #[error("shape index count {len} is not a multiple of 3")]
    NotTriangles { len: usize },

    #[error("local index {index} out of range for a shape with {vertex_count} vertices")]
    IndexOutOfRange { index: u32, vertex_count: u32 },
}

/// A rejected sub-range upload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BufferError {
    #[error("{kind} buffer overflow: {required} bytes required, capacity is {capacity}")]
    Overflow {
        kind: BufferKind,
        required: u64,
        capacity: u64,
    },

    #[error("{kind} buffer write at offset {offset} with {len} bytes is not 4-byte aligned")]
    Misaligned { kind: BufferKind, offset: u64, len: u64 },
}

/// Shader source, compile and link failures. All of them are fatal for construction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShaderError {
    #[error("{0} stage source is missing or empty")]
    MissingStage(Stage),

    #[error("unknown shader stage marker: {line:?}")]
    UnknownStage { line: String },

    #[error("{stage} shader failed to compile:\n{diagnostic}")]
    Compile { stage: Stage, diagnostic: String },

    #[error("program failed to link: {reason}")]
    Link { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TextureError {
    #[error("texture slot {slot} out of range; shader declares {slots} slots")]
    SlotOutOfRange { slot: u32, slots: u32 },

    #[error("texture has zero width or height")]
    ZeroSize,

    #[error("texture data is {actual} bytes, expected {expected} (width * height * 4)")]
    SizeMismatch { expected: usize, actual: usize },

    #[error("texture is {width}x{height}, device limit is {max} px per side")]
    TooLarge { width: u32, height: u32, max: u32 },
}

/// Umbrella error returned by [`BatchRenderer`](super::BatchRenderer) operations.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error(transparent)]
    Shape(#[from] ShapeError),

    #[error(transparent)]
    Buffer(#[from] BufferError),

    #[error(transparent)]
    Shader(#[from] ShaderError),

    #[error(transparent)]
    Texture(#[from] TextureError),

    #[error("invalid renderer configuration: {0}")]
    Config(String),
}
