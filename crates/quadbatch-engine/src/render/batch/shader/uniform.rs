//! Uniform name lookup and the CPU-side copy of the uniform block.

use std::collections::HashMap;

use glam::Mat4;

use super::reflect::{UniformBlock, UniformField};

/// A value written with [`UniformCache::set`].
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum UniformValue<'a> {
    F32(f32),
    I32(i32),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
    /// One `i32` per array element, written at the element stride
    /// (e.g. sampler indices in an `array<vec4<i32>, N>`).
    I32Array(&'a [i32]),
    Mat4(Mat4),
}

impl UniformValue<'_> {
    fn kind(&self) -> &'static str {
        match self {
            UniformValue::F32(_) => "f32",
            UniformValue::I32(_) => "i32",
            UniformValue::Vec2(_) => "vec2<f32>",
            UniformValue::Vec3(_) => "vec3<f32>",
            UniformValue::Vec4(_) => "vec4<f32>",
            UniformValue::I32Array(_) => "i32 array",
            UniformValue::Mat4(_) => "mat4x4<f32>",
        }
    }
}

/// Lazily populated `name -> field` cache over a reflected uniform block.
///
/// Writes land in a shadow copy of the block; [`UniformCache::take_dirty`]
/// tells the owner when the GPU buffer needs re-uploading.
#[derive(Debug, Default)]
pub struct UniformCache {
    fields: Vec<UniformField>,
    /// `None` caches a miss so it is only reported once.
    locations: HashMap<String, Option<usize>>,
    shadow: Vec<u8>,
    dirty: bool,
}

impl UniformCache {
    pub fn new(block: Option<&UniformBlock>) -> Self {
        let (fields, size) = match block {
            Some(b) => (b.fields.clone(), b.buffer_size() as usize),
            None => (Vec::new(), 0),
        };
        Self {
            fields,
            locations: HashMap::new(),
            shadow: vec![0; size],
            dirty: false,
        }
    }

    /// Looks up `name`, consulting the shader reflection on first use.
    pub fn location(&mut self, name: &str) -> Option<&UniformField> {
        let slot = match self.locations.get(name) {
            Some(&cached) => cached,
            None => {
                let found = self.fields.iter().position(|f| f.name == name);
                if found.is_none() {
                    log::warn!("uniform `{name}` not found in shader; writes will be skipped");
                }
                self.locations.insert(name.to_string(), found);
                found
            }
        };
        slot.map(|i| &self.fields[i])
    }

    /// Writes `value` into the shadow block. Returns `false` if the write was skipped.
    pub fn set(&mut self, name: &str, value: UniformValue<'_>) -> bool {
        let Some(field) = self.location(name).cloned() else {
            return false;
        };

        let written = match value {
            UniformValue::I32Array(values) => self.write_array(&field, values),
            UniformValue::F32(v) => self.write_exact(&field, bytemuck::bytes_of(&v)),
            UniformValue::I32(v) => self.write_exact(&field, bytemuck::bytes_of(&v)),
            UniformValue::Vec2(v) => self.write_exact(&field, bytemuck::bytes_of(&v)),
            UniformValue::Vec3(v) => self.write_exact(&field, bytemuck::bytes_of(&v)),
            UniformValue::Vec4(v) => self.write_exact(&field, bytemuck::bytes_of(&v)),
            UniformValue::Mat4(m) => {
                self.write_exact(&field, bytemuck::cast_slice(&m.to_cols_array()))
            }
        };

        if !written {
            log::warn!(
                "uniform `{name}` ({} bytes) cannot hold a {} value; write skipped",
                field.size,
                value.kind()
            );
        }
        self.dirty |= written;
        written
    }

    fn write_exact(&mut self, field: &UniformField, bytes: &[u8]) -> bool {
        if field.array.is_some() || bytes.len() != field.size as usize {
            return false;
        }
        self.write_at(field.offset as usize, bytes)
    }

    fn write_array(&mut self, field: &UniformField, values: &[i32]) -> bool {
        let Some(shape) = field.array else { return false };
        if values.len() > shape.len as usize {
            return false;
        }
        values.iter().enumerate().all(|(i, v)| {
            let offset = field.offset as usize + i * shape.stride as usize;
            self.write_at(offset, bytemuck::bytes_of(v))
        })
    }

    fn write_at(&mut self, offset: usize, bytes: &[u8]) -> bool {
        let Some(dst) = self.shadow.get_mut(offset..offset + bytes.len()) else {
            return false;
        };
        dst.copy_from_slice(bytes);
        true
    }

    /// The shadow block, sized for the uniform buffer.
    #[inline]
    pub fn bytes(&self) -> &[u8] {
        &self.shadow
    }

    /// Returns whether anything was written since the last call.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::batch::shader::reflect::ArrayShape;

    fn block() -> UniformBlock {
        UniformBlock {
            size: 96,
            fields: vec![
                UniformField { name: "mvp".into(), offset: 0, size: 64, array: None },
                UniformField {
                    name: "slots".into(),
                    offset: 64,
                    size: 32,
                    array: Some(ArrayShape { stride: 16, len: 2 }),
                },
            ],
        }
    }

    fn read_i32(bytes: &[u8], offset: usize) -> i32 {
        bytemuck::pod_read_unaligned(&bytes[offset..offset + 4])
    }

    #[test]
    fn matrix_is_written_column_major() {
        let mut cache = UniformCache::new(Some(&block()));
        let m = Mat4::from_cols_array(&std::array::from_fn(|i| i as f32));
        assert!(cache.set("mvp", UniformValue::Mat4(m)));

        let floats: &[f32] = bytemuck::cast_slice(&cache.bytes()[..64]);
        assert_eq!(floats, &m.to_cols_array());
        assert!(cache.take_dirty());
        assert!(!cache.take_dirty());
    }

    #[test]
    fn int_array_uses_element_stride() {
        let mut cache = UniformCache::new(Some(&block()));
        assert!(cache.set("slots", UniformValue::I32Array(&[7, 9])));
        assert_eq!(read_i32(cache.bytes(), 64), 7);
        assert_eq!(read_i32(cache.bytes(), 80), 9);
        // Padding lanes stay untouched.
        assert_eq!(read_i32(cache.bytes(), 68), 0);
    }

    #[test]
    fn int_array_longer_than_declared_is_skipped() {
        let mut cache = UniformCache::new(Some(&block()));
        assert!(!cache.set("slots", UniformValue::I32Array(&[1, 2, 3])));
        assert!(!cache.take_dirty());
    }

    #[test]
    fn missing_uniform_is_a_cached_noop() {
        let mut cache = UniformCache::new(Some(&block()));
        let before = cache.bytes().to_vec();
        assert!(!cache.set("u_time", UniformValue::F32(1.0)));
        assert!(!cache.set("u_time", UniformValue::F32(2.0)));
        assert_eq!(cache.bytes(), before.as_slice());
        assert_eq!(cache.locations.get("u_time"), Some(&None));
        assert!(!cache.take_dirty());
    }

    #[test]
    fn lookup_is_lazy() {
        let mut cache = UniformCache::new(Some(&block()));
        assert!(cache.locations.is_empty());
        assert_eq!(cache.location("mvp").map(|f| f.offset), Some(0));
        assert_eq!(cache.locations.get("mvp"), Some(&Some(0)));
    }

    #[test]
    fn size_mismatch_is_skipped() {
        let mut cache = UniformCache::new(Some(&block()));
        assert!(!cache.set("mvp", UniformValue::Vec4([1.0; 4])));
        assert!(!cache.set("mvp", UniformValue::I32Array(&[1])));
    }

    #[test]
    fn cache_without_block_misses_everything() {
        let mut cache = UniformCache::new(None);
        assert!(cache.bytes().is_empty());
        assert!(!cache.set("mvp", UniformValue::Mat4(Mat4::IDENTITY)));
    }
}
