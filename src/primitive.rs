use glam::{Vec2, Vec3, Vec4};

use crate::aabb::Aabb;
use crate::mesh::TriangleMesh;
use crate::ray::Ray;
use crate::rng::HammersleyGenerator;
use crate::sphere::Sphere;

/// A hit in a primitive's local frame, before the instance transform and
/// material are applied.
#[derive(Clone, Copy, Debug)]
pub struct LocalHit {
    pub position: Vec4,
    pub uv: Vec2,
    pub normal: Vec3,
    pub colour: Vec4,
}

/// The lower level of the two-tier acceleration structure: one piece of
/// geometry answering intersection and light-sampling queries in its own
/// local space.
pub enum Primitive {
    Mesh(TriangleMesh),
    Sphere(Sphere),
}

impl Primitive {
    pub fn intersect(&self, ray: &Ray) -> Option<LocalHit> {
        match self {
            Primitive::Mesh(mesh) => mesh.intersect(ray),
            Primitive::Sphere(sphere) => sphere.intersect(ray),
        }
    }

    pub fn bounds(&self) -> Aabb {
        match self {
            Primitive::Mesh(mesh) => mesh.bounds(),
            Primitive::Sphere(sphere) => sphere.bounds(),
        }
    }

    pub fn generate_sampling_data(&mut self) {
        if let Primitive::Mesh(mesh) = self {
            mesh.generate_sampling_data();
        }
    }

    /// Draw a light sample toward `point` (all in the primitive's local
    /// frame). Returns the sampled position and its weight, or None when no
    /// front-facing candidate exists.
    pub fn sample_geometry(
        &self,
        rng: &mut HammersleyGenerator,
        point: Vec3,
        normal: Vec3,
    ) -> Option<(Vec3, f32)> {
        match self {
            Primitive::Mesh(mesh) => mesh.sample_geometry(rng, point, normal),
            Primitive::Sphere(sphere) => sphere.sample_geometry(rng, point, normal),
        }
    }
}
