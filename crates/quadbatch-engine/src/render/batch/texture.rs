//! Texture slots sampled by the batch shader (bind group 1).
//!
//! Every slot the shader declares always has a texture bound: slots start
//! with a 1x1 white placeholder and are replaced with [`TextureSlots::bind`].

use crate::render::batch::error::TextureError;
use crate::render::batch::shader::Reflection;

const BYTES_PER_TEXEL: usize = 4;

/// Tightly packed RGBA8 pixels, top row first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureImage {
    width: u32,
    height: u32,
    rgba: Vec<u8>,
}

impl TextureImage {
    pub fn new(width: u32, height: u32, rgba: Vec<u8>) -> Result<Self, TextureError> {
        if width == 0 || height == 0 {
            return Err(TextureError::ZeroSize);
        }
        let expected = width as usize * height as usize * BYTES_PER_TEXEL;
        if rgba.len() != expected {
            return Err(TextureError::SizeMismatch {
                expected,
                actual: rgba.len(),
            });
        }
        Ok(Self { width, height, rgba })
    }

    /// A 1x1 image of one color.
    pub fn solid(rgba: [u8; 4]) -> Self {
        Self {
            width: 1,
            height: 1,
            rgba: rgba.to_vec(),
        }
    }

    /// `size` x `size` texels alternating between `a` and `b` in `cell`-sized squares.
    pub fn checkerboard(size: u32, cell: u32, a: [u8; 4], b: [u8; 4]) -> Self {
        let size = size.max(1);
        let cell = cell.max(1);
        let mut rgba = Vec::with_capacity(size as usize * size as usize * BYTES_PER_TEXEL);
        for y in 0..size {
            for x in 0..size {
                let texel = if (x / cell + y / cell) % 2 == 0 { a } else { b };
                rgba.extend_from_slice(&texel);
            }
        }
        Self {
            width: size,
            height: size,
            rgba,
        }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn rgba(&self) -> &[u8] {
        &self.rgba
    }

    fn extent(&self) -> wgpu::Extent3d {
        wgpu::Extent3d {
            width: self.width,
            height: self.height,
            depth_or_array_layers: 1,
        }
    }
}

/// Rejects images the device cannot hold as a 2D texture.
pub fn check_texture_size(image: &TextureImage, limits: &wgpu::Limits) -> Result<(), TextureError> {
    let max = limits.max_texture_dimension_2d;
    if image.width > max || image.height > max {
        return Err(TextureError::TooLarge {
            width: image.width,
            height: image.height,
            max,
        });
    }
    Ok(())
}

struct SlotTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl SlotTexture {
    fn upload(device: &wgpu::Device, queue: &wgpu::Queue, image: &TextureImage, label: &str) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: image.extent(),
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            image.rgba(),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(image.width * BYTES_PER_TEXEL as u32),
                rows_per_image: Some(image.height),
            },
            image.extent(),
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self { texture, view }
    }
}

pub struct TextureSlots {
    label: String,
    layout: wgpu::BindGroupLayout,
    bindings: Vec<u32>,
    sampler_binding: u32,

    slots: Vec<SlotTexture>,
    sampler: wgpu::Sampler,
    bind_group: wgpu::BindGroup,
}

impl TextureSlots {
    /// Fills every slot of `layout` with the white placeholder.
    ///
    /// Returns `None` if the program declares no sampler.
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        layout: &wgpu::BindGroupLayout,
        reflection: &Reflection,
        label: &str,
    ) -> Option<Self> {
        let sampler_binding = reflection.sampler?;
        let placeholder = TextureImage::solid([255; 4]);

        let slots: Vec<SlotTexture> = reflection
            .textures
            .iter()
            .enumerate()
            .map(|(slot, _)| {
                SlotTexture::upload(device, queue, &placeholder, &format!("{label} slot {slot}"))
            })
            .collect();

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some(&format!("{label} sampler")),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let bind_group = create_bind_group(
            device,
            layout,
            &reflection.textures,
            &slots,
            sampler_binding,
            &sampler,
            label,
        );

        Some(Self {
            label: label.to_string(),
            layout: layout.clone(),
            bindings: reflection.textures.clone(),
            sampler_binding,
            slots,
            sampler,
            bind_group,
        })
    }

    #[inline]
    pub fn len(&self) -> u32 {
        self.slots.len() as u32
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Uploads `image` into `slot`, replacing (and destroying) the previous texture.
    pub fn bind(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        slot: u32,
        image: &TextureImage,
    ) -> Result<(), TextureError> {
        let slots = self.len();
        let Some(current) = self.slots.get_mut(slot as usize) else {
            return Err(TextureError::SlotOutOfRange { slot, slots });
        };
        check_texture_size(image, &device.limits())?;

        let next = SlotTexture::upload(device, queue, image, &format!("{} slot {slot}", self.label));
        std::mem::replace(current, next).texture.destroy();

        self.bind_group = create_bind_group(
            device,
            &self.layout,
            &self.bindings,
            &self.slots,
            self.sampler_binding,
            &self.sampler,
            &self.label,
        );
        log::debug!(
            "{}: bound {}x{} texture to slot {slot}",
            self.label,
            image.width,
            image.height
        );
        Ok(())
    }

    #[inline]
    pub fn bind_group(&self) -> &wgpu::BindGroup {
        &self.bind_group
    }

    pub fn destroy(self) {
        for slot in self.slots {
            slot.texture.destroy();
        }
        log::debug!("{}: texture slots destroyed", self.label);
    }
}

fn create_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    bindings: &[u32],
    slots: &[SlotTexture],
    sampler_binding: u32,
    sampler: &wgpu::Sampler,
    label: &str,
) -> wgpu::BindGroup {
    let mut entries: Vec<wgpu::BindGroupEntry<'_>> = bindings
        .iter()
        .zip(slots)
        .map(|(&binding, slot)| wgpu::BindGroupEntry {
            binding,
            resource: wgpu::BindingResource::TextureView(&slot.view),
        })
        .collect();
    entries.push(wgpu::BindGroupEntry {
        binding: sampler_binding,
        resource: wgpu::BindingResource::Sampler(sampler),
    });

    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(&format!("{label} texture bind group")),
        layout,
        entries: &entries,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── TextureImage ──────────────────────────────────────────────────────

    #[test]
    fn new_accepts_exact_size() {
        let img = TextureImage::new(2, 3, vec![0; 24]).unwrap();
        assert_eq!((img.width(), img.height()), (2, 3));
        assert_eq!(img.rgba().len(), 24);
    }

    #[test]
    fn new_rejects_zero_size() {
        assert_eq!(TextureImage::new(0, 4, Vec::new()), Err(TextureError::ZeroSize));
        assert_eq!(TextureImage::new(4, 0, Vec::new()), Err(TextureError::ZeroSize));
    }

    #[test]
    fn new_rejects_wrong_byte_count() {
        assert_eq!(
            TextureImage::new(2, 2, vec![0; 15]),
            Err(TextureError::SizeMismatch {
                expected: 16,
                actual: 15
            })
        );
    }

    #[test]
    fn solid_is_one_texel() {
        let img = TextureImage::solid([1, 2, 3, 4]);
        assert_eq!((img.width(), img.height()), (1, 1));
        assert_eq!(img.rgba(), &[1, 2, 3, 4]);
    }

    #[test]
    fn checkerboard_alternates_cells() {
        let a = [255, 255, 255, 255];
        let b = [0, 0, 0, 255];
        let img = TextureImage::checkerboard(4, 2, a, b);
        assert_eq!(img.rgba().len(), 4 * 4 * 4);

        let texel = |x: usize, y: usize| &img.rgba()[(y * 4 + x) * 4..(y * 4 + x) * 4 + 4];
        assert_eq!(texel(0, 0), &a);
        assert_eq!(texel(1, 1), &a);
        assert_eq!(texel(2, 0), &b);
        assert_eq!(texel(0, 2), &b);
        assert_eq!(texel(3, 3), &a);
    }

    #[test]
    fn checkerboard_clamps_degenerate_args() {
        let img = TextureImage::checkerboard(0, 0, [1; 4], [2; 4]);
        assert_eq!((img.width(), img.height()), (1, 1));
        assert_eq!(img.rgba(), &[1; 4]);
    }

    // ── device limits ─────────────────────────────────────────────────────

    #[test]
    fn oversized_image_is_rejected() {
        let limits = wgpu::Limits::downlevel_defaults();
        // Only the extent matters here; skip the 64 MB of pixels.
        let img = TextureImage {
            width: 4096,
            height: 4096,
            rgba: Vec::new(),
        };
        assert_eq!(
            check_texture_size(&img, &limits),
            Err(TextureError::TooLarge {
                width: 4096,
                height: 4096,
                max: 2048
            })
        );
    }

    #[test]
    fn one_long_side_is_enough_to_reject() {
        let limits = wgpu::Limits::downlevel_defaults();
        let img = TextureImage::new(2049, 1, vec![0; 2049 * 4]).unwrap();
        assert!(matches!(
            check_texture_size(&img, &limits),
            Err(TextureError::TooLarge { width: 2049, .. })
        ));
    }

    #[test]
    fn image_at_the_limit_fits() {
        let limits = wgpu::Limits::downlevel_defaults();
        let img = TextureImage::new(2048, 1, vec![0; 2048 * 4]).unwrap();
        assert!(check_texture_size(&img, &limits).is_ok());
        assert!(check_texture_size(&TextureImage::solid([0; 4]), &limits).is_ok());
    }
}
