//! Batchable geometry: shapes with local indices, and the quad kinds that build them.

use crate::paint::Color;

use super::error::{ShapeError, TextureError};
use super::vertex::Vertex;

/// Vertices plus a triangle list of *local* indices (`0 <= i < vertex_count`).
///
/// Construction validates the index contract, so a `Shape` taken alone always
/// forms valid triangles over its own vertices.
#[derive(Debug, Clone, PartialEq)]
pub struct Shape {
    vertices: Vec<Vertex>,
    indices: Vec<u32>,
}

impl Shape {
    pub fn new(vertices: Vec<Vertex>, indices: Vec<u32>) -> Result<Self, ShapeError> {
        if vertices.is_empty() {
            return Err(ShapeError::Empty);
        }
        if indices.len() % 3 != 0 {
            return Err(ShapeError::NotTriangles { len: indices.len() });
        }

        let vertex_count = vertices.len() as u32;
        if let Some(&index) = indices.iter().find(|&&i| i >= vertex_count) {
            return Err(ShapeError::IndexOutOfRange {
                index,
                vertex_count,
            });
        }

        Ok(Self { vertices, indices })
    }

    #[inline]
    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    /// Local indices, relative to this shape's own vertices.
    #[inline]
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    #[inline]
    pub fn vertex_count(&self) -> u32 {
        self.vertices.len() as u32
    }

    #[inline]
    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }

    /// Flattened `vertex_count * 10` scalar view of the vertices.
    #[inline]
    pub fn scalars(&self) -> &[f32] {
        bytemuck::cast_slice(&self.vertices)
    }

    /// Fails if a textured vertex names a slot at or past `slots`.
    pub fn check_texture_slots(&self, slots: u32) -> Result<(), TextureError> {
        let out_of_range = self
            .vertices
            .iter()
            .filter(|v| v.is_textured())
            .map(|v| v.tex_index.round() as u32)
            .find(|&slot| slot >= slots);
        match out_of_range {
            Some(slot) => Err(TextureError::SlotOutOfRange { slot, slots }),
            None => Ok(()),
        }
    }

    /// Indices translated by `base`, for placement at vertex `base` of a batch.
    pub fn offset_indices(&self, base: u32) -> impl Iterator<Item = u32> + '_ {
        self.indices.iter().map(move |&i| i + base)
    }
}

/// Local indices shared by every quad: two triangles over
/// bottom-left (0), top-left (1), top-right (2), bottom-right (3).
pub const QUAD_INDICES: [u32; 6] = [0, 1, 3, 1, 2, 3];

/// Axis-aligned quad in logical pixels (origin bottom-left, +Y up).
///
/// A quad is either colored or textured, never both; the variant decides the
/// vertex encoding.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Quad {
    /// Per-corner colors in corner order (bottom-left, top-left, top-right, bottom-right).
    Colored {
        origin: [f32; 3],
        size: [f32; 2],
        colors: [Color; 4],
    },
    /// Samples the texture bound to `slot` across the whole quad.
    Textured {
        origin: [f32; 3],
        size: [f32; 2],
        slot: u32,
    },
}

impl Quad {
    /// Solid-color quad.
    #[inline]
    pub fn colored(x: f32, y: f32, z: f32, width: f32, height: f32, color: Color) -> Self {
        Quad::Colored {
            origin: [x, y, z],
            size: [width, height],
            colors: [color; 4],
        }
    }

    /// Quad sampling texture `slot`. The slot is checked against the
    /// renderer's slot count when the quad is added to a
    /// [`BatchRenderer`](super::BatchRenderer).
    #[inline]
    pub fn textured(x: f32, y: f32, z: f32, width: f32, height: f32, slot: u32) -> Self {
        Quad::Textured {
            origin: [x, y, z],
            size: [width, height],
            slot,
        }
    }

    fn corners(origin: [f32; 3], size: [f32; 2]) -> [[f32; 3]; 4] {
        let [x, y, z] = origin;
        let [w, h] = size;
        [[x, y, z], [x, y + h, z], [x + w, y + h, z], [x + w, y, z]]
    }

    pub fn vertices(&self) -> [Vertex; 4] {
        match *self {
            Quad::Colored {
                origin,
                size,
                colors,
            } => {
                let c = Self::corners(origin, size);
                [
                    Vertex::colored(c[0], colors[0]),
                    Vertex::colored(c[1], colors[1]),
                    Vertex::colored(c[2], colors[2]),
                    Vertex::colored(c[3], colors[3]),
                ]
            }
            Quad::Textured { origin, size, slot } => {
                // Texture rows start at the top, so v = 0 on the top edge.
                let c = Self::corners(origin, size);
                [
                    Vertex::textured(c[0], [0.0, 1.0], slot),
                    Vertex::textured(c[1], [0.0, 0.0], slot),
                    Vertex::textured(c[2], [1.0, 0.0], slot),
                    Vertex::textured(c[3], [1.0, 1.0], slot),
                ]
            }
        }
    }
}

impl From<Quad> for Shape {
    fn from(quad: Quad) -> Self {
        Shape {
            vertices: quad.vertices().to_vec(),
            indices: QUAD_INDICES.to_vec(),
        }
    }
}
