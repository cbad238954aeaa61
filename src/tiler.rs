use glam::UVec2;

use crate::pool::ThreadPool;
use crate::rng::XorShift;

/// Partitions an image into tiles and fans them out over the worker pool.
/// Each tile gets its own seed so the image is deterministic for a fixed
/// master seed, whatever order the workers finish in.
pub struct Tiler<'a> {
    pool: &'a ThreadPool,
    resolution: UVec2,
    tile_size: UVec2,
}

impl<'a> Tiler<'a> {
    pub fn new(pool: &'a ThreadPool, resolution: UVec2, tile_size: UVec2) -> Self {
        debug_assert!(tile_size.x > 0 && tile_size.y > 0);
        Self {
            pool,
            resolution,
            tile_size,
        }
    }

    /// Submit one task per tile and join them all. The callback receives
    /// the tile origin, its clamped size and the tile seed.
    pub fn execute_over_surface<T, F>(&self, rng: &mut XorShift, tile_task: F) -> Vec<T>
    where
        T: Send + 'static,
        F: Fn(UVec2, UVec2, u64) -> T + Clone + Send + 'static,
    {
        let mut handles = Vec::new();

        let mut x = 0;
        while x < self.resolution.x {
            let mut y = 0;
            while y < self.resolution.y {
                let clamped = UVec2::new(
                    self.tile_size.x.min(self.resolution.x - x),
                    self.tile_size.y.min(self.resolution.y - y),
                );
                let origin = UVec2::new(x, y);
                let seed = rng.next_u64();

                let task = tile_task.clone();
                handles.push(
                    self.pool
                        .add_task(move || task(origin, clamped, seed)),
                );

                y += self.tile_size.y;
            }
            x += self.tile_size.x;
        }

        handles.into_iter().map(|handle| handle.wait()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tile_grid_covers_every_pixel_exactly_once() {
        let pool = ThreadPool::new(4);
        let tiler = Tiler::new(&pool, UVec2::new(100, 100), UVec2::new(32, 32));
        let mut rng = XorShift::new(1);

        let tiles = tiler.execute_over_surface(&mut rng, |origin, size, _seed| (origin, size));

        // ceil(100 / 32)^2 tiles.
        assert_eq!(tiles.len(), 16);

        let mut coverage = vec![0u32; 100 * 100];
        for (origin, size) in &tiles {
            assert!(size.x <= 32 && size.y <= 32);
            for y in origin.y..origin.y + size.y {
                for x in origin.x..origin.x + size.x {
                    coverage[(y * 100 + x) as usize] += 1;
                }
            }
        }
        assert!(coverage.iter().all(|&count| count == 1));
    }

    #[test]
    fn edge_tiles_are_clamped() {
        let pool = ThreadPool::new(2);
        let tiler = Tiler::new(&pool, UVec2::new(100, 100), UVec2::new(32, 32));
        let mut rng = XorShift::new(1);

        let tiles = tiler.execute_over_surface(&mut rng, |origin, size, _seed| (origin, size));
        let last_column: Vec<_> = tiles.iter().filter(|(origin, _)| origin.x == 96).collect();
        assert_eq!(last_column.len(), 4);
        assert!(last_column.iter().all(|(_, size)| size.x == 4));
    }

    #[test]
    fn tile_seeds_are_unique_and_deterministic() {
        let pool = ThreadPool::new(2);
        let tiler = Tiler::new(&pool, UVec2::new(64, 64), UVec2::new(16, 16));

        let mut rng = XorShift::new(99);
        let first = tiler.execute_over_surface(&mut rng, |_, _, seed| seed);
        let mut rng = XorShift::new(99);
        let second = tiler.execute_over_surface(&mut rng, |_, _, seed| seed);

        assert_eq!(first, second);
        let mut sorted = first.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), first.len());
    }

    #[test]
    fn exact_division_produces_full_tiles() {
        let pool = ThreadPool::new(2);
        let tiler = Tiler::new(&pool, UVec2::new(64, 64), UVec2::new(32, 32));
        let mut rng = XorShift::new(7);

        let tiles = tiler.execute_over_surface(&mut rng, |_, size, _| size);
        assert_eq!(tiles.len(), 4);
        assert!(tiles.iter().all(|size| *size == UVec2::new(32, 32)));
    }
}
