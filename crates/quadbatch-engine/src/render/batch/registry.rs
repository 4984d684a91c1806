//! Named-shape registry and the flatten pass that produces a batch.
//!
//! Shapes are stored with their *local* indices. Global indices are computed
//! during [`ShapeRegistry::flatten_into`] as `local + Σ vertex_count` of the
//! shapes inserted before, so replacing or clearing shapes never leaves stale
//! offsets behind.

use std::collections::HashMap;

use super::shape::Shape;
use super::vertex::Vertex;

/// Outcome of a registry insertion.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Insertion {
    /// The name was new; the shape was appended.
    Inserted,
    /// The name was already present; the registry is unchanged.
    Ignored,
    /// The name was already present; its shape was replaced in place.
    Replaced,
}

#[derive(Debug, Clone)]
struct Entry {
    name: String,
    shape: Shape,
}

/// Insertion-ordered `name -> Shape` map.
#[derive(Debug, Default, Clone)]
pub struct ShapeRegistry {
    entries: Vec<Entry>,
    lookup: HashMap<String, usize>,
    vertex_count: u32,
    index_count: u32,
}

impl ShapeRegistry {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `shape` under `name` unless the name is already taken.
    ///
    /// First registration wins; a duplicate leaves the registry untouched.
    pub fn add_or_ignore(&mut self, name: impl Into<String>, shape: Shape) -> Insertion {
        let name = name.into();
        if self.lookup.contains_key(&name) {
            log::debug!("shape {name:?} already registered; ignoring");
            return Insertion::Ignored;
        }
        self.push(name, shape);
        Insertion::Inserted
    }

    /// Inserts `shape` under `name`, replacing an existing shape of that name.
    ///
    /// A replaced shape keeps its position in draw order.
    pub fn add_or_replace(&mut self, name: impl Into<String>, shape: Shape) -> Insertion {
        let name = name.into();
        let Some(&slot) = self.lookup.get(&name) else {
            self.push(name, shape);
            return Insertion::Inserted;
        };

        let entry = &mut self.entries[slot];
        self.vertex_count = self.vertex_count - entry.shape.vertex_count() + shape.vertex_count();
        self.index_count = self.index_count - entry.shape.index_count() + shape.index_count();
        entry.shape = shape;
        Insertion::Replaced
    }

    fn push(&mut self, name: String, shape: Shape) {
        self.vertex_count += shape.vertex_count();
        self.index_count += shape.index_count();
        self.lookup.insert(name.clone(), self.entries.len());
        self.entries.push(Entry { name, shape });
    }

    /// Removes every shape and resets the running counts.
    ///
    /// This is the rebuild path: clear, then re-add shapes in the desired order.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.lookup.clear();
        self.vertex_count = 0;
        self.index_count = 0;
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.lookup.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&Shape> {
        self.lookup.get(name).map(|&i| &self.entries[i].shape)
    }

    /// Shape names in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    /// Total vertices of all registered shapes (the running offset for the next insertion).
    #[inline]
    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    #[inline]
    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    /// Global indices of `name` within the current batch.
    pub fn global_indices(&self, name: &str) -> Option<Vec<u32>> {
        let &slot = self.lookup.get(name)?;
        let base: u32 = self.entries[..slot]
            .iter()
            .map(|e| e.shape.vertex_count())
            .sum();
        Some(self.entries[slot].shape.offset_indices(base).collect())
    }

    /// Flattens all shapes into `batch`, reusing its allocations.
    pub fn flatten_into(&self, batch: &mut Batch) {
        batch.clear();
        batch.vertices.reserve(self.vertex_count as usize);
        batch.indices.reserve(self.index_count as usize);

        let mut base = 0u32;
        for entry in &self.entries {
            let shape = &entry.shape;
            batch.spans.push(ShapeSpan {
                first_vertex: base,
                vertex_count: shape.vertex_count(),
                first_index: batch.indices.len() as u32,
                index_count: shape.index_count(),
            });
            batch.vertices.extend_from_slice(shape.vertices());
            batch.indices.extend(shape.offset_indices(base));
            base += shape.vertex_count();
        }
    }

    pub fn flatten(&self) -> Batch {
        let mut batch = Batch::default();
        self.flatten_into(&mut batch);
        batch
    }
}

/// Where a shape landed inside a [`Batch`].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct ShapeSpan {
    pub first_vertex: u32,
    pub vertex_count: u32,
    pub first_index: u32,
    pub index_count: u32,
}

/// Parameters of the single indexed draw covering a batch.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct DrawCall {
    pub index_count: u32,
    /// Largest global index referenced by the draw.
    pub max_index: u32,
}

/// Concatenated vertex and global index data of all registered shapes.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Batch {
    vertices: Vec<Vertex>,
    indices: Vec<u32>,
    spans: Vec<ShapeSpan>,
}

impl Batch {
    pub fn clear(&mut self) {
        self.vertices.clear();
        self.indices.clear();
        self.spans.clear();
    }

    #[inline]
    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    /// `10 * vertex_count` scalars.
    #[inline]
    pub fn vertex_scalars(&self) -> &[f32] {
        bytemuck::cast_slice(&self.vertices)
    }

    #[inline]
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    /// Per-shape ranges, in insertion order.
    #[inline]
    pub fn spans(&self) -> &[ShapeSpan] {
        &self.spans
    }

    #[inline]
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    #[inline]
    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }

    #[inline]
    pub fn vertex_count(&self) -> u32 {
        self.vertices.len() as u32
    }

    #[inline]
    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// The draw for this batch, or `None` when there is nothing to draw.
    pub fn draw_call(&self) -> Option<DrawCall> {
        let max_index = self.indices.iter().copied().max()?;
        Some(DrawCall {
            index_count: self.index_count(),
            max_index,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paint::Color;
    use crate::render::batch::shape::Quad;

    fn unit_quad(color: Color) -> Shape {
        Quad::colored(0.0, 0.0, 0.0, 1.0, 1.0, color).into()
    }

    fn triangle() -> Shape {
        let v = Vertex::colored([0.0; 3], Color::BLUE);
        Shape::new(vec![v; 3], vec![0, 1, 2]).unwrap()
    }

    // ── offset protocol ───────────────────────────────────────────────────

    #[test]
    fn second_quad_is_offset_by_first() {
        let mut reg = ShapeRegistry::new();
        reg.add_or_ignore("A", unit_quad(Color::RED));
        reg.add_or_ignore("B", unit_quad(Color::GREEN));

        assert_eq!(reg.global_indices("A").unwrap(), vec![0, 1, 3, 1, 2, 3]);
        assert_eq!(reg.global_indices("B").unwrap(), vec![4, 5, 7, 5, 6, 7]);
        assert_eq!(reg.vertex_count(), 8);
        assert_eq!(reg.index_count(), 12);

        let batch = reg.flatten();
        assert_eq!(batch.vertex_count(), 8);
        assert_eq!(batch.index_count(), 12);
        assert_eq!(
            batch.draw_call(),
            Some(DrawCall {
                index_count: 12,
                max_index: 7
            })
        );
    }

    #[test]
    fn kth_shape_offset_is_prefix_sum() {
        let shapes = [triangle(), unit_quad(Color::RED), triangle(), unit_quad(Color::WHITE)];
        let mut reg = ShapeRegistry::new();
        for (i, s) in shapes.iter().enumerate() {
            reg.add_or_ignore(format!("s{i}"), s.clone());
        }

        let mut prefix = 0u32;
        for (i, s) in shapes.iter().enumerate() {
            let expected: Vec<u32> = s.indices().iter().map(|&x| x + prefix).collect();
            assert_eq!(reg.global_indices(&format!("s{i}")).unwrap(), expected);
            prefix += s.vertex_count();
        }
        assert_eq!(reg.vertex_count(), prefix);
    }

    #[test]
    fn flatten_concatenates_in_insertion_order() {
        let mut reg = ShapeRegistry::new();
        reg.add_or_ignore("tri", triangle());
        reg.add_or_ignore("quad", unit_quad(Color::RED));

        let batch = reg.flatten();
        assert_eq!(batch.indices(), &[0, 1, 2, 3, 4, 6, 4, 5, 6]);
        assert_eq!(
            batch.spans(),
            &[
                ShapeSpan { first_vertex: 0, vertex_count: 3, first_index: 0, index_count: 3 },
                ShapeSpan { first_vertex: 3, vertex_count: 4, first_index: 3, index_count: 6 },
            ]
        );
        assert_eq!(reg.names().collect::<Vec<_>>(), vec!["tri", "quad"]);
    }

    #[test]
    fn vertex_scalars_length_is_ten_per_vertex() {
        let mut reg = ShapeRegistry::new();
        reg.add_or_ignore("a", triangle());
        reg.add_or_ignore("b", unit_quad(Color::RED));
        reg.add_or_ignore("c", unit_quad(Color::GREEN));

        let batch = reg.flatten();
        assert_eq!(batch.vertex_scalars().len(), 10 * reg.vertex_count() as usize);
        assert_eq!(batch.vertex_bytes().len(), 40 * reg.vertex_count() as usize);
        assert_eq!(batch.index_bytes().len(), 4 * reg.index_count() as usize);
    }

    #[test]
    fn draw_never_exceeds_vertex_range() {
        let mut reg = ShapeRegistry::new();
        for i in 0..10 {
            let shape = if i % 2 == 0 { triangle() } else { unit_quad(Color::RED) };
            reg.add_or_ignore(format!("{i}"), shape);
            let draw = reg.flatten().draw_call().unwrap();
            assert!(draw.max_index < reg.vertex_count());
            assert_eq!(draw.index_count, reg.index_count());
        }
    }

    // ── duplicates ────────────────────────────────────────────────────────

    #[test]
    fn duplicate_name_is_ignored() {
        let mut reg = ShapeRegistry::new();
        let first = unit_quad(Color::RED);
        assert_eq!(reg.add_or_ignore("X", first.clone()), Insertion::Inserted);
        assert_eq!(reg.add_or_ignore("X", unit_quad(Color::GREEN)), Insertion::Ignored);

        assert_eq!(reg.len(), 1);
        assert_eq!(reg.vertex_count(), 4);
        assert_eq!(reg.get("X"), Some(&first));
    }

    #[test]
    fn duplicate_leaves_later_offsets_intact() {
        let mut reg = ShapeRegistry::new();
        reg.add_or_ignore("X", unit_quad(Color::RED));
        reg.add_or_ignore("X", unit_quad(Color::RED));
        reg.add_or_ignore("Y", unit_quad(Color::RED));
        assert_eq!(reg.global_indices("Y").unwrap(), vec![4, 5, 7, 5, 6, 7]);
    }

    #[test]
    fn replace_keeps_position_and_updates_offsets() {
        let mut reg = ShapeRegistry::new();
        reg.add_or_ignore("A", unit_quad(Color::RED));
        reg.add_or_ignore("B", unit_quad(Color::RED));

        assert_eq!(reg.add_or_replace("A", triangle()), Insertion::Replaced);
        assert_eq!(reg.names().collect::<Vec<_>>(), vec!["A", "B"]);
        assert_eq!(reg.vertex_count(), 7);
        assert_eq!(reg.index_count(), 9);
        assert_eq!(reg.global_indices("B").unwrap(), vec![3, 4, 6, 4, 5, 6]);
        assert_eq!(reg.add_or_replace("C", triangle()), Insertion::Inserted);
    }

    // ── rebuild ───────────────────────────────────────────────────────────

    #[test]
    fn clear_resets_offsets() {
        let mut reg = ShapeRegistry::new();
        reg.add_or_ignore("A", unit_quad(Color::RED));
        reg.add_or_ignore("B", unit_quad(Color::RED));
        reg.clear();
        assert!(reg.is_empty());
        assert_eq!(reg.vertex_count(), 0);

        reg.add_or_ignore("B", unit_quad(Color::RED));
        reg.add_or_ignore("A", unit_quad(Color::RED));
        assert_eq!(reg.global_indices("B").unwrap(), vec![0, 1, 3, 1, 2, 3]);
        assert_eq!(reg.global_indices("A").unwrap(), vec![4, 5, 7, 5, 6, 7]);
    }

    #[test]
    fn empty_registry_has_no_draw() {
        let batch = ShapeRegistry::new().flatten();
        assert!(batch.is_empty());
        assert_eq!(batch.draw_call(), None);
        assert!(batch.vertex_bytes().is_empty());
    }

    #[test]
    fn flatten_is_idempotent() {
        let mut reg = ShapeRegistry::new();
        reg.add_or_ignore("A", unit_quad(Color::RED));
        reg.add_or_ignore("B", triangle());

        let mut batch = Batch::default();
        reg.flatten_into(&mut batch);
        let (v1, i1) = (batch.vertex_bytes().to_vec(), batch.index_bytes().to_vec());
        reg.flatten_into(&mut batch);
        assert_eq!(batch.vertex_bytes(), v1.as_slice());
        assert_eq!(batch.index_bytes(), i1.as_slice());
    }

    #[test]
    fn unknown_name_has_no_indices() {
        assert!(ShapeRegistry::new().global_indices("nope").is_none());
    }
}
