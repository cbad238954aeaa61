use glam::{Vec2, Vec3, Vec4};

use crate::aabb::Aabb;
use crate::primitive::LocalHit;
use crate::rng::{self, HammersleyGenerator};

/// An implicit sphere centred at the local origin.
pub struct Sphere {
    radius: f32,
}

impl Sphere {
    pub fn new(radius: f32) -> Self {
        Self { radius }
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    pub fn bounds(&self) -> Aabb {
        Aabb::new(
            Vec4::new(-self.radius, -self.radius, -self.radius, 1.0),
            Vec4::new(self.radius, self.radius, self.radius, 1.0),
        )
    }

    pub fn intersect(&self, ray: &crate::ray::Ray) -> Option<LocalHit> {
        let m = ray.origin.truncate();

        let b = m.dot(ray.direction);
        let c = m.dot(m) - self.radius * self.radius;

        // Origin outside and pointing away.
        if c > 0.0 && b > 0.0 {
            return None;
        }
        let discriminant = b * b - c;
        if discriminant < 0.0 {
            return None;
        }

        let mut t = -b - discriminant.sqrt();
        // Origin inside the sphere.
        if t < 0.0 {
            t = 0.0;
        }
        if t > ray.length {
            return None;
        }

        let position = ray.origin.truncate() + t * ray.direction;
        let normal = position.normalize();
        let uv = Vec2::new(
            normal.x.atan2(normal.z) / (2.0 * std::f32::consts::PI) + 0.5,
            normal.y * 0.5 + 0.5,
        );

        Some(LocalHit {
            position: position.extend(1.0),
            uv,
            normal,
            colour: Vec4::ONE,
        })
    }

    /// Draw a point on the sphere surface facing the shading hemisphere.
    pub fn sample_geometry(
        &self,
        rng: &mut HammersleyGenerator,
        point: Vec3,
        normal: Vec3,
    ) -> Option<(Vec3, f32)> {
        let unit_point = rng::uniform_sample_sphere(rng.next());
        let sphere_point = self.radius * unit_point;

        let to_point = (sphere_point - point).normalize();
        let sample_point = if to_point.dot(normal) >= 0.0 {
            sphere_point
        } else {
            -sphere_point
        };

        Some((sample_point, 1.0))
    }
}
