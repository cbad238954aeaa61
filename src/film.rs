use glam::Vec3;

use crate::util;

/// The render target: a running mean per pixel plus the number of
/// accumulated estimates. Tiles cover disjoint pixel ranges and the merge
/// happens on one thread, so no locking is needed.
pub struct Film {
    width: u32,
    height: u32,
    pixels: Vec<Vec3>,
    sample_counts: Vec<u32>,
}

impl Film {
    pub fn new(width: u32, height: u32) -> Self {
        let size = width as usize * height as usize;
        Self {
            width,
            height,
            pixels: vec![Vec3::ZERO; size],
            sample_counts: vec![0; size],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    fn index(&self, x: u32, y: u32) -> usize {
        debug_assert!(x < self.width && y < self.height);
        (y * self.width + x) as usize
    }

    /// Fold one estimate into the running mean for a pixel.
    pub fn accumulate(&mut self, x: u32, y: u32, value: Vec3) {
        let index = self.index(x, y);
        let count = self.sample_counts[index] + 1;
        self.sample_counts[index] = count;

        let mean = self.pixels[index];
        self.pixels[index] = mean + (value - mean) / count as f32;
    }

    pub fn pixel(&self, x: u32, y: u32) -> Vec3 {
        self.pixels[self.index(x, y)]
    }

    pub fn sample_count(&self, x: u32, y: u32) -> u32 {
        self.sample_counts[self.index(x, y)]
    }

    pub fn min_sample_count(&self) -> u32 {
        self.sample_counts.iter().copied().min().unwrap_or(0)
    }

    /// Clamp to the displayable range and pack as RGBA8, alpha opaque.
    pub fn to_rgba8(&self) -> Vec<u8> {
        let packed: Vec<u32> = self
            .pixels
            .iter()
            .map(|pixel| util::pack_colour(pixel.clamp(Vec3::ZERO, Vec3::ONE).extend(1.0)))
            .collect();

        bytemuck::cast_slice(&packed).to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn running_mean_averages_estimates() {
        let mut film = Film::new(2, 2);
        film.accumulate(1, 1, Vec3::splat(1.0));
        film.accumulate(1, 1, Vec3::splat(3.0));

        assert_eq!(film.pixel(1, 1), Vec3::splat(2.0));
        assert_eq!(film.sample_count(1, 1), 2);
        assert_eq!(film.sample_count(0, 0), 0);
        assert_eq!(film.min_sample_count(), 0);
    }

    #[test]
    fn rgba_output_is_clamped_and_opaque() {
        let mut film = Film::new(1, 1);
        film.accumulate(0, 0, Vec3::new(2.0, -1.0, 0.5));

        let bytes = film.to_rgba8();
        assert_eq!(bytes.len(), 4);
        assert_eq!(bytes[0], 255);
        assert_eq!(bytes[1], 0);
        assert_eq!(bytes[2], 127);
        assert_eq!(bytes[3], 255);
    }
}
