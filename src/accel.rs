use glam::{Mat3, Mat4, Vec2, Vec3, Vec4};

use crate::aabb::Aabb;
use crate::bsdf::Bsrdf;
use crate::error::{Error, Result};
use crate::octree::{BoundedValue, OctTree, OctTreeBuilder};
use crate::primitive::Primitive;
use crate::ray::Ray;

/// A surface hit in world space, carrying everything the integrator needs
/// to continue the path.
#[derive(Clone, Copy, Debug)]
pub struct InterpolatedVertex {
    pub position: Vec4,
    pub uv: Vec2,
    pub normal: Vec3,
    pub colour: Vec4,
    pub bsdf: Bsrdf,
}

/// One placed instance: a transform pair, the primitive it instantiates and
/// the scattering model applied to it.
pub struct Entry {
    pub transform: Mat4,
    pub inverse_transform: Mat4,
    pub primitive: u32,
    pub bsdf: Bsrdf,
}

/// The upper level of the acceleration structure: an oct-tree over the
/// world-space bounds of every instance. Routes world rays into each
/// candidate's local frame and lifts hits back out.
#[derive(Default)]
pub struct TopLevel {
    entries: Vec<Entry>,
    tree: Option<OctTree<u32>>,
}

impl TopLevel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an instance. Not safe to call concurrently with `build`.
    pub fn add_entry(&mut self, primitive: u32, transform: Mat4, bsdf: Bsrdf) {
        self.entries.push(Entry {
            transform,
            inverse_transform: transform.inverse(),
            primitive,
            bsdf,
        });
        self.tree = None;
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn is_built(&self) -> bool {
        self.tree.is_some()
    }

    /// Compute world bounds per entry and build the oct-tree over them.
    pub fn build(&mut self, primitives: &[Primitive]) -> Result<()> {
        if self.entries.is_empty() {
            return Err(Error::Build("scene contains no instances".into()));
        }

        let mut values = Vec::with_capacity(self.entries.len());
        let mut scene_bounds = Aabb::empty();
        for (index, entry) in self.entries.iter().enumerate() {
            let bounds = primitives[entry.primitive as usize]
                .bounds()
                .transformed(&entry.transform);
            scene_bounds.union_with(&bounds);
            values.push(BoundedValue {
                bounds,
                value: index as u32,
            });
        }

        if scene_bounds.is_degenerate() {
            return Err(Error::Build("scene bounds are degenerate".into()));
        }

        self.tree = Some(OctTreeBuilder::new(scene_bounds, values).build());
        Ok(())
    }

    fn candidates(&self, ray: &Ray) -> Vec<u32> {
        match &self.tree {
            Some(tree) => tree.ray_intersections(ray),
            None => Vec::new(),
        }
    }

    fn intersect_entry(
        &self,
        primitives: &[Primitive],
        entry: &Entry,
        ray: &Ray,
    ) -> Option<(InterpolatedVertex, f32)> {
        let local_ray = ray.transformed(&entry.inverse_transform);
        let hit = primitives[entry.primitive as usize].intersect(&local_ray)?;

        let position = entry.transform * hit.position;
        let normal = (Mat3::from_mat4(entry.transform) * hit.normal).normalize();
        let distance = (position.truncate() - ray.origin.truncate()).length();

        Some((
            InterpolatedVertex {
                position,
                uv: hit.uv,
                normal,
                colour: hit.colour,
                bsdf: entry.bsdf,
            },
            distance,
        ))
    }

    /// The hit whose world-space position is nearest the ray origin.
    pub fn closest_intersection(
        &self,
        primitives: &[Primitive],
        ray: &Ray,
    ) -> Option<InterpolatedVertex> {
        let mut closest_distance = f32::INFINITY;
        let mut closest = None;

        for candidate in self.candidates(ray) {
            let entry = &self.entries[candidate as usize];
            if let Some((vertex, distance)) = self.intersect_entry(primitives, entry, ray) {
                if distance < closest_distance {
                    closest_distance = distance;
                    closest = Some(vertex);
                }
            }
        }

        closest
    }

    /// Every hit along the ray, in candidate order.
    pub fn all_intersections(
        &self,
        primitives: &[Primitive],
        ray: &Ray,
    ) -> Vec<InterpolatedVertex> {
        let mut out = Vec::new();
        for candidate in self.candidates(ray) {
            let entry = &self.entries[candidate as usize];
            if let Some((vertex, _)) = self.intersect_entry(primitives, entry, ray) {
                out.push(vertex);
            }
        }
        out
    }
}
