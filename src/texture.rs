use std::path::{Path, PathBuf};

use glam::{Vec2, Vec3, Vec4};

use crate::error::{Error, Result};

/// Interleaved pixel layouts, top-left origin, scanline order. Byte formats
/// are 8-bit unorm; float formats are 32-bit IEEE.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Format {
    R8,
    Rg8,
    Rgb8,
    Rgba8,
    R32f,
    Rg32f,
    Rgb32f,
    Rgba32f,
}

impl Format {
    pub fn channels(&self) -> usize {
        match self {
            Format::R8 | Format::R32f => 1,
            Format::Rg8 | Format::Rg32f => 2,
            Format::Rgb8 | Format::Rgb32f => 3,
            Format::Rgba8 | Format::Rgba32f => 4,
        }
    }

    pub fn pixel_size(&self) -> usize {
        match self {
            Format::R8 => 1,
            Format::Rg8 => 2,
            Format::Rgb8 => 3,
            Format::Rgba8 => 4,
            Format::R32f => 4,
            Format::Rg32f => 8,
            Format::Rgb32f => 12,
            Format::Rgba32f => 16,
        }
    }

    pub fn is_float(&self) -> bool {
        matches!(
            self,
            Format::R32f | Format::Rg32f | Format::Rgb32f | Format::Rgba32f
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Extent {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
}

/// Nearest-neighbour sampling over a flat pixel buffer. `depth` > 1 holds
/// cube faces stacked in memory.
fn texel_base(extent: Extent, format: Format, uv: Vec2, face: u32) -> usize {
    let width = i64::from(extent.width);
    let height = i64::from(extent.height);
    let x = ((uv.x * extent.width as f32) as i64).rem_euclid(width) as usize;
    let y = ((uv.y * extent.height as f32) as i64).rem_euclid(height) as usize;

    let pixel_size = format.pixel_size();
    pixel_size * (y * extent.width as usize + x)
        + face as usize * extent.width as usize * extent.height as usize * pixel_size
}

fn read_channel(data: &[u8], format: Format, base: usize, channel: usize) -> f32 {
    if channel >= format.channels() {
        return 0.0;
    }
    if format.is_float() {
        let offset = base + channel * 4;
        bytemuck::pod_read_unaligned::<f32>(&data[offset..offset + 4])
    } else {
        data[base + channel] as f32 / 255.0
    }
}

/// A 2D texture. Construction from a path only records the header; the
/// pixel memory becomes resident when the owning material is added to the
/// material manager.
pub struct Texture2D {
    path: Option<PathBuf>,
    extent: Extent,
    format: Format,
    data: Vec<u8>,
}

impl Texture2D {
    pub fn open(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(Error::FileMissing(path.to_path_buf()));
        }
        let (width, height) = image::image_dimensions(path)?;

        Ok(Self {
            path: Some(path.to_path_buf()),
            extent: Extent {
                width,
                height,
                depth: 1,
            },
            format: Format::Rgba8,
            data: Vec::new(),
        })
    }

    pub fn from_raw(data: Vec<u8>, width: u32, height: u32, format: Format) -> Self {
        debug_assert_eq!(
            data.len(),
            width as usize * height as usize * format.pixel_size()
        );
        Self {
            path: None,
            extent: Extent {
                width,
                height,
                depth: 1,
            },
            format,
            data,
        }
    }

    pub fn is_resident(&self) -> bool {
        !self.data.is_empty()
    }

    pub fn residence_size(&self) -> usize {
        if self.is_resident() {
            self.data.len()
        } else {
            self.extent.width as usize * self.extent.height as usize * self.format.pixel_size()
        }
    }

    pub fn make_resident(&mut self) -> Result<()> {
        if self.is_resident() {
            return Ok(());
        }
        let path = match &self.path {
            Some(path) => path,
            None => return Ok(()),
        };

        let decoded = image::open(path)?;
        let (format, data) = match decoded {
            image::DynamicImage::ImageLuma8(img) => (Format::R8, img.into_raw()),
            image::DynamicImage::ImageLumaA8(img) => (Format::Rg8, img.into_raw()),
            image::DynamicImage::ImageRgb8(img) => (Format::Rgb8, img.into_raw()),
            image::DynamicImage::ImageRgba8(img) => (Format::Rgba8, img.into_raw()),
            image::DynamicImage::ImageRgb32F(img) => (
                Format::Rgb32f,
                bytemuck::cast_slice(img.as_raw()).to_vec(),
            ),
            image::DynamicImage::ImageRgba32F(img) => (
                Format::Rgba32f,
                bytemuck::cast_slice(img.as_raw()).to_vec(),
            ),
            other => (Format::Rgba8, other.into_rgba8().into_raw()),
        };

        self.format = format;
        self.data = data;
        Ok(())
    }

    pub fn extent(&self) -> Extent {
        self.extent
    }

    pub fn sample(&self, uv: Vec2) -> f32 {
        let base = texel_base(self.extent, self.format, uv, 0);
        read_channel(&self.data, self.format, base, 0)
    }

    pub fn sample2(&self, uv: Vec2) -> Vec2 {
        let base = texel_base(self.extent, self.format, uv, 0);
        Vec2::new(
            read_channel(&self.data, self.format, base, 0),
            read_channel(&self.data, self.format, base, 1),
        )
    }

    pub fn sample3(&self, uv: Vec2) -> Vec3 {
        let base = texel_base(self.extent, self.format, uv, 0);
        Vec3::new(
            read_channel(&self.data, self.format, base, 0),
            read_channel(&self.data, self.format, base, 1),
            read_channel(&self.data, self.format, base, 2),
        )
    }

    pub fn sample4(&self, uv: Vec2) -> Vec4 {
        let base = texel_base(self.extent, self.format, uv, 0);
        Vec4::new(
            read_channel(&self.data, self.format, base, 0),
            read_channel(&self.data, self.format, base, 1),
            read_channel(&self.data, self.format, base, 2),
            read_channel(&self.data, self.format, base, 3),
        )
    }
}

/// Six faces stacked +X, -X, +Y, -Y, +Z, -Z.
pub struct TextureCube {
    extent: Extent,
    format: Format,
    data: Vec<u8>,
}

impl TextureCube {
    pub fn new(data: Vec<u8>, width: u32, height: u32, format: Format) -> Self {
        debug_assert_eq!(
            data.len(),
            width as usize * height as usize * 6 * format.pixel_size()
        );
        Self {
            extent: Extent {
                width,
                height,
                depth: 6,
            },
            format,
            data,
        }
    }

    /// A 1x1 cube of a single colour, used until a scene provides a skybox.
    pub fn solid(colour: Vec4) -> Self {
        let texel = [
            (colour.x * 255.0) as u8,
            (colour.y * 255.0) as u8,
            (colour.z * 255.0) as u8,
            (colour.w * 255.0) as u8,
        ];
        let mut data = Vec::with_capacity(24);
        for _ in 0..6 {
            data.extend_from_slice(&texel);
        }
        Self::new(data, 1, 1, Format::Rgba8)
    }

    /// Load the six face images. All faces must decode to the same
    /// dimensions; everything is normalised to RGBA8.
    pub fn from_faces(paths: &[PathBuf; 6]) -> Result<Self> {
        let mut data = Vec::new();
        let mut extent: Option<(u32, u32)> = None;

        for path in paths {
            if !path.is_file() {
                return Err(Error::FileMissing(path.clone()));
            }
            let face = image::open(path)?.into_rgba8();
            match extent {
                None => extent = Some(face.dimensions()),
                Some(dims) if dims != face.dimensions() => {
                    return Err(Error::MalformedScene(format!(
                        "skybox face {} is {}x{}, expected {}x{}",
                        path.display(),
                        face.dimensions().0,
                        face.dimensions().1,
                        dims.0,
                        dims.1,
                    )))
                }
                Some(_) => {}
            }
            data.extend_from_slice(face.as_raw());
        }

        let (width, height) = extent.unwrap_or((0, 0));
        Ok(Self::new(data, width, height, Format::Rgba8))
    }

    pub fn extent(&self) -> Extent {
        self.extent
    }

    /// Which face a direction lands on and where, following the usual
    /// major-axis projection.
    pub fn resolve_cubemap_uv(&self, v: Vec3) -> (u32, Vec2) {
        let v_abs = v.abs();
        let face;
        let ma;
        let uv;
        if v_abs.z >= v_abs.x && v_abs.z >= v_abs.y {
            face = if v.z < 0.0 { 5 } else { 4 };
            ma = 0.5 / v_abs.z;
            uv = Vec2::new(if v.z < 0.0 { -v.x } else { v.x }, -v.y);
        } else if v_abs.y >= v_abs.x {
            face = if v.y < 0.0 { 3 } else { 2 };
            ma = 0.5 / v_abs.y;
            uv = Vec2::new(v.x, if v.y < 0.0 { -v.z } else { v.z });
        } else {
            face = if v.x < 0.0 { 1 } else { 0 };
            ma = 0.5 / v_abs.x;
            uv = Vec2::new(if v.x < 0.0 { v.z } else { -v.z }, -v.y);
        }

        (face, uv * ma + 0.5)
    }

    pub fn sample(&self, direction: Vec3) -> f32 {
        let (face, uv) = self.resolve_cubemap_uv(direction);
        let base = texel_base(self.extent, self.format, uv, face);
        read_channel(&self.data, self.format, base, 0)
    }

    pub fn sample3(&self, direction: Vec3) -> Vec3 {
        let (face, uv) = self.resolve_cubemap_uv(direction);
        let base = texel_base(self.extent, self.format, uv, face);
        Vec3::new(
            read_channel(&self.data, self.format, base, 0),
            read_channel(&self.data, self.format, base, 1),
            read_channel(&self.data, self.format, base, 2),
        )
    }

    pub fn sample4(&self, direction: Vec3) -> Vec4 {
        let (face, uv) = self.resolve_cubemap_uv(direction);
        let base = texel_base(self.extent, self.format, uv, face);
        Vec4::new(
            read_channel(&self.data, self.format, base, 0),
            read_channel(&self.data, self.format, base, 1),
            read_channel(&self.data, self.format, base, 2),
            read_channel(&self.data, self.format, base, 3),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn face_centres_resolve_to_face_middles() {
        let cube = TextureCube::solid(Vec4::ONE);
        let cases = [
            (Vec3::X, 0),
            (Vec3::NEG_X, 1),
            (Vec3::Y, 2),
            (Vec3::NEG_Y, 3),
            (Vec3::Z, 4),
            (Vec3::NEG_Z, 5),
        ];
        for (direction, expected_face) in cases {
            let (face, uv) = cube.resolve_cubemap_uv(direction);
            assert_eq!(face, expected_face);
            assert!((uv - Vec2::splat(0.5)).abs().max_element() < 1e-6);
        }
    }

    #[test]
    fn byte_texture_sampling_reads_texels() {
        // 2x1, left texel red, right texel green.
        let data = vec![255, 0, 0, 255, 0, 255, 0, 255];
        let tex = Texture2D::from_raw(data, 2, 1, Format::Rgba8);

        let left = tex.sample4(Vec2::new(0.25, 0.5));
        let right = tex.sample4(Vec2::new(0.75, 0.5));
        assert_eq!(left, Vec4::new(1.0, 0.0, 0.0, 1.0));
        assert_eq!(right, Vec4::new(0.0, 1.0, 0.0, 1.0));
    }

    #[test]
    fn uv_wraps_outside_unit_range() {
        let data = vec![255, 0, 0, 255, 0, 255, 0, 255];
        let tex = Texture2D::from_raw(data, 2, 1, Format::Rgba8);

        assert_eq!(
            tex.sample4(Vec2::new(1.25, 0.5)),
            tex.sample4(Vec2::new(0.25, 0.5))
        );
        assert_eq!(
            tex.sample4(Vec2::new(-0.25, 0.5)),
            tex.sample4(Vec2::new(0.75, 0.5))
        );
    }

    #[test]
    fn float_texture_sampling_reads_texels() {
        let texels: Vec<f32> = vec![0.25, 0.5, 2.0];
        let tex = Texture2D::from_raw(
            bytemuck::cast_slice(&texels).to_vec(),
            1,
            1,
            Format::Rgb32f,
        );
        assert_eq!(tex.sample3(Vec2::splat(0.5)), Vec3::new(0.25, 0.5, 2.0));
        // Missing alpha reads as zero.
        assert_eq!(tex.sample4(Vec2::splat(0.5)).w, 0.0);
    }

    #[test]
    fn solid_cube_returns_colour_everywhere() {
        let cube = TextureCube::solid(Vec4::new(0.5, 0.25, 1.0, 1.0));
        for direction in [Vec3::X, Vec3::NEG_Y, Vec3::new(0.3, 0.8, -0.2)] {
            let sample = cube.sample4(direction.normalize());
            assert!((sample.x - 0.5).abs() < 1.0 / 255.0);
            assert!((sample.y - 0.25).abs() < 1.0 / 255.0);
            assert!((sample.z - 1.0).abs() < 1.0 / 255.0);
        }
    }
}
