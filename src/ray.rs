use glam::{Mat3, Mat4, Vec3, Vec4};

/// A ray carrying its Monte-Carlo state: accumulated radiance, path
/// throughput and the stack of refraction indices it has entered.
/// The stack always has air (1.0) at the bottom while the ray is alive.
#[derive(Clone, Debug)]
pub struct Ray {
    pub origin: Vec4,
    pub direction: Vec3,
    pub length: f32,

    pub payload: Vec3,
    pub throughput: Vec3,

    ior_stack: Vec<f32>,
}

impl Ray {
    pub fn new(origin: Vec4, direction: Vec3, length: f32) -> Self {
        Self {
            origin,
            direction,
            length,
            payload: Vec3::ZERO,
            throughput: Vec3::ONE,
            ior_stack: vec![1.0],
        }
    }

    pub fn push_ior(&mut self, ior: f32) {
        self.ior_stack.push(ior);
    }

    pub fn pop_ior(&mut self) -> f32 {
        debug_assert!(!self.ior_stack.is_empty());
        let ior = self.ior_stack.pop().unwrap_or(1.0);
        debug_assert!(!self.ior_stack.is_empty());
        ior
    }

    pub fn current_ior(&self) -> f32 {
        *self.ior_stack.last().unwrap_or(&1.0)
    }

    /// Refraction index of the medium the ray re-enters when it leaves the
    /// current one.
    pub fn ior_below_top(&self) -> f32 {
        if self.ior_stack.len() > 1 {
            self.ior_stack[self.ior_stack.len() - 2]
        } else {
            1.0
        }
    }

    pub fn inside_geometry(&self) -> bool {
        self.ior_stack.len() > 1
    }

    pub fn ior_stack_depth(&self) -> usize {
        self.ior_stack.len()
    }

    /// Move the ray into another frame. The direction is multiplied by the
    /// 3x3 part only and deliberately not renormalised; hit distances are
    /// recomputed in world space by the caller.
    pub fn transformed(&self, transform: &Mat4) -> Ray {
        let mut ray = Ray::new(
            *transform * self.origin,
            Mat3::from_mat4(*transform) * self.direction,
            self.length,
        );
        ray.payload = self.payload;
        ray.throughput = self.throughput;
        ray
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Quat;

    #[test]
    fn ior_stack_starts_with_air() {
        let ray = Ray::new(Vec4::W, Vec3::Z, 100.0);
        assert_eq!(ray.current_ior(), 1.0);
        assert!(!ray.inside_geometry());
    }

    #[test]
    fn ior_stack_push_pop() {
        let mut ray = Ray::new(Vec4::W, Vec3::Z, 100.0);
        ray.push_ior(1.5);
        assert!(ray.inside_geometry());
        assert_eq!(ray.current_ior(), 1.5);
        assert_eq!(ray.ior_below_top(), 1.0);
        assert_eq!(ray.pop_ior(), 1.5);
        assert_eq!(ray.current_ior(), 1.0);
    }

    #[test]
    fn transform_round_trip_recovers_world_point() {
        let transform = Mat4::from_scale_rotation_translation(
            Vec3::new(2.0, 0.5, 1.5),
            Quat::from_rotation_y(0.7),
            Vec3::new(3.0, -2.0, 8.0),
        );
        let inverse = transform.inverse();

        let ray = Ray::new(Vec4::new(1.0, 2.0, 3.0, 1.0), Vec3::Z, 100.0);
        let local = ray.transformed(&inverse);
        let back = local.transformed(&transform);

        assert!((back.origin - ray.origin).length() < 1e-3);
    }
}
