//! Vertex encoding and the attribute layout derived from it.

use bytemuck::{Pod, Zeroable};

use crate::paint::Color;

/// One batch vertex: 10 contiguous `f32` scalars.
///
/// Field order is the wire contract with [`VertexLayout::standard`]:
/// position (3), color (4), uv (2), texture index (1).
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub color: [f32; 4],
    pub uv: [f32; 2],
    /// Texture slot encoded as a float, or [`Vertex::UNTEXTURED`].
    pub tex_index: f32,
}

impl Vertex {
    /// Number of scalars per vertex.
    pub const SCALARS: usize = 10;

    /// Byte stride of one vertex.
    pub const STRIDE: u64 = (Self::SCALARS * std::mem::size_of::<f32>()) as u64;

    /// Texture index meaning "use the vertex color".
    pub const UNTEXTURED: f32 = -1.0;

    /// Component counts of the four attributes, in location order.
    pub const COMPONENTS: [u32; 4] = [3, 4, 2, 1];

    #[inline]
    pub const fn new(position: [f32; 3], color: [f32; 4], uv: [f32; 2], tex_index: f32) -> Self {
        Self {
            position,
            color,
            uv,
            tex_index,
        }
    }

    /// Untextured vertex.
    #[inline]
    pub const fn colored(position: [f32; 3], color: Color) -> Self {
        Self::new(position, color.to_array(), [0.0, 0.0], Self::UNTEXTURED)
    }

    /// Textured vertex. Color is zero; the shader samples `slot` at `uv`.
    #[inline]
    pub const fn textured(position: [f32; 3], uv: [f32; 2], slot: u32) -> Self {
        Self::new(position, [0.0; 4], uv, slot as f32)
    }

    pub fn is_textured(&self) -> bool {
        self.tex_index >= 0.0
    }

    #[inline]
    pub fn to_array(self) -> [f32; Self::SCALARS] {
        bytemuck::cast(self)
    }

    #[inline]
    pub fn from_array(scalars: [f32; Self::SCALARS]) -> Self {
        bytemuck::cast(scalars)
    }
}

/// Immutable vertex attribute descriptor.
///
/// Built once from per-attribute component counts; attribute `i` gets shader
/// location `i` and a byte offset equal to the sum of the preceding counts.
#[derive(Debug, Clone, PartialEq)]
pub struct VertexLayout {
    stride: u64,
    attributes: Vec<wgpu::VertexAttribute>,
}

impl VertexLayout {
    /// The layout matching [`Vertex`].
    pub fn standard() -> Self {
        // Counts are 1..=4 by construction.
        Self::from_counts(&Vertex::COMPONENTS, Vertex::STRIDE)
            .unwrap_or_else(|| unreachable!("Vertex::COMPONENTS are valid float counts"))
    }

    /// Builds a float-only layout. Returns `None` if a count is not 1..=4 or the
    /// attributes do not fit in `stride`.
    pub fn from_counts(counts: &[u32], stride: u64) -> Option<Self> {
        let mut offset = 0u64;
        let mut attributes = Vec::with_capacity(counts.len());

        for (location, &count) in counts.iter().enumerate() {
            let format = match count {
                1 => wgpu::VertexFormat::Float32,
                2 => wgpu::VertexFormat::Float32x2,
                3 => wgpu::VertexFormat::Float32x3,
                4 => wgpu::VertexFormat::Float32x4,
                _ => return None,
            };
            attributes.push(wgpu::VertexAttribute {
                format,
                offset,
                shader_location: location as u32,
            });
            offset += format.size();
        }

        if offset > stride {
            return None;
        }

        Some(Self { stride, attributes })
    }

    #[inline]
    pub fn stride(&self) -> u64 {
        self.stride
    }

    #[inline]
    pub fn attributes(&self) -> &[wgpu::VertexAttribute] {
        &self.attributes
    }

    /// Whether an attribute is declared at `location`.
    pub fn provides(&self, location: u32) -> bool {
        self.attributes.iter().any(|a| a.shader_location == location)
    }

    pub fn buffer_layout(&self) -> wgpu::VertexBufferLayout<'_> {
        wgpu::VertexBufferLayout {
            array_stride: self.stride,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &self.attributes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── encoding ──────────────────────────────────────────────────────────

    #[test]
    fn vertex_is_ten_scalars() {
        assert_eq!(std::mem::size_of::<Vertex>(), 40);
        assert_eq!(Vertex::STRIDE, 40);
    }

    #[test]
    fn to_array_uses_attribute_order() {
        let v = Vertex::new([1.0, 2.0, 3.0], [0.1, 0.2, 0.3, 0.4], [0.5, 0.6], 7.0);
        assert_eq!(
            v.to_array(),
            [1.0, 2.0, 3.0, 0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 7.0]
        );
        assert_eq!(Vertex::from_array(v.to_array()), v);
    }

    #[test]
    fn colored_vertex_is_untextured() {
        let v = Vertex::colored([0.0; 3], Color::RED);
        assert_eq!(v.tex_index, Vertex::UNTEXTURED);
        assert!(!v.is_textured());
        assert_eq!(v.color, [1.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn textured_vertex_zeroes_color() {
        let v = Vertex::textured([0.0; 3], [1.0, 0.0], 3);
        assert_eq!(v.color, [0.0; 4]);
        assert_eq!(v.tex_index, 3.0);
        assert!(v.is_textured());
    }

    // ── layout ────────────────────────────────────────────────────────────

    #[test]
    fn standard_layout_offsets() {
        let layout = VertexLayout::standard();
        let offsets: Vec<u64> = layout.attributes().iter().map(|a| a.offset).collect();
        let locations: Vec<u32> = layout.attributes().iter().map(|a| a.shader_location).collect();
        assert_eq!(offsets, vec![0, 12, 28, 36]);
        assert_eq!(locations, vec![0, 1, 2, 3]);
        assert_eq!(layout.stride(), 40);
    }

    #[test]
    fn standard_layout_formats() {
        let formats: Vec<wgpu::VertexFormat> = VertexLayout::standard()
            .attributes()
            .iter()
            .map(|a| a.format)
            .collect();
        assert_eq!(
            formats,
            vec![
                wgpu::VertexFormat::Float32x3,
                wgpu::VertexFormat::Float32x4,
                wgpu::VertexFormat::Float32x2,
                wgpu::VertexFormat::Float32,
            ]
        );
    }

    #[test]
    fn layouts_are_independent_across_constructions() {
        // Building a second layout must not shift locations of the first.
        let a = VertexLayout::standard();
        let b = VertexLayout::standard();
        assert_eq!(a, b);
    }

    #[test]
    fn from_counts_rejects_bad_input() {
        assert!(VertexLayout::from_counts(&[5], 40).is_none());
        assert!(VertexLayout::from_counts(&[4, 4, 4], 40).is_none());
    }

    #[test]
    fn provides_locations() {
        let layout = VertexLayout::standard();
        assert!(layout.provides(3));
        assert!(!layout.provides(4));
    }
}
