use glam::{Vec2, Vec3, Vec4};

use crate::aabb::Aabb;
use crate::error::{Error, Result};
use crate::primitive::LocalHit;
use crate::ray::Ray;
use crate::rng::{self, HammersleyGenerator};
use crate::util;

#[derive(Clone, Copy, Default)]
struct BvhNode {
    aabb_min: Vec3,
    aabb_max: Vec3,
    /// Left child index for interior nodes, first entry in the triangle
    /// ordering for leaves.
    left_or_first: u32,
    triangle_count: u32,
}

impl BvhNode {
    fn is_leaf(&self) -> bool {
        self.triangle_count > 0
    }

    fn right_child(&self) -> u32 {
        self.left_or_first + 1
    }
}

/// Per-triangle record used for light sampling.
#[derive(Clone, Copy)]
pub struct TriangleFace {
    pub normal: Vec3,
    pub area: f32,
}

/// An indexed triangle mesh with its own bounding volume hierarchy, built
/// once at construction. All queries are in the mesh's local frame.
pub struct TriangleMesh {
    positions: Vec<Vec3>,
    normals: Vec<Vec3>,
    uvs: Vec<Vec2>,
    colours: Vec<Vec4>,
    indices: Vec<u32>,

    nodes: Vec<BvhNode>,
    triangle_order: Vec<u32>,

    faces: Vec<TriangleFace>,
    bounds: Aabb,
}

fn slab_distance(aabb_min: Vec3, aabb_max: Vec3, ro: Vec3, rd: Vec3, prev_min_t: f32) -> f32 {
    let inv = rd.recip();
    let t1 = (aabb_min - ro) * inv;
    let t2 = (aabb_max - ro) * inv;
    let tmin = t1.min(t2).max_element();
    let tmax = t1.max(t2).min_element();

    if tmax >= tmin && tmax > 0.0 && tmin < prev_min_t {
        tmin
    } else {
        f32::INFINITY
    }
}

fn muller_trumbore(ro: Vec3, rd: Vec3, a: Vec3, b: Vec3, c: Vec3) -> Option<(f32, f32, f32)> {
    let edge1 = b - a;
    let edge2 = c - a;

    let pv = rd.cross(edge2);
    let det = edge1.dot(pv);

    // Ray lies in the plane of the triangle.
    if det.abs() < 1e-6 {
        return None;
    }
    let inv_det = 1.0 / det;

    let tv = ro - a;
    let u = tv.dot(pv) * inv_det;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }

    let qv = tv.cross(edge1);
    let v = rd.dot(qv) * inv_det;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }

    let t = edge2.dot(qv) * inv_det;
    if t < 0.0 {
        return None;
    }

    Some((t, u, v))
}

impl TriangleMesh {
    pub fn new(
        positions: Vec<Vec3>,
        normals: Vec<Vec3>,
        uvs: Vec<Vec2>,
        colours: Vec<Vec4>,
        indices: Vec<u32>,
    ) -> Result<Self> {
        if indices.is_empty() || indices.len() % 3 != 0 {
            return Err(Error::Build(format!(
                "mesh index count {} is not a non-empty multiple of 3",
                indices.len()
            )));
        }
        if let Some(&bad) = indices.iter().find(|&&i| i as usize >= positions.len()) {
            return Err(Error::Build(format!(
                "mesh index {bad} out of range for {} vertices",
                positions.len()
            )));
        }
        if positions.iter().any(|p| !p.is_finite()) {
            return Err(Error::Build("mesh contains non-finite positions".into()));
        }
        if normals.len() != positions.len() {
            return Err(Error::Build(format!(
                "mesh has {} normals for {} vertices",
                normals.len(),
                positions.len()
            )));
        }

        let mut bounds = Aabb::empty();
        for position in &positions {
            bounds.add_point(position.extend(1.0));
        }

        let mut mesh = Self {
            positions,
            normals,
            uvs,
            colours,
            indices,
            nodes: Vec::new(),
            triangle_order: Vec::new(),
            faces: Vec::new(),
            bounds,
        };
        mesh.build_bvh();
        Ok(mesh)
    }

    pub fn bounds(&self) -> Aabb {
        self.bounds
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    fn triangle_positions(&self, triangle: u32) -> (Vec3, Vec3, Vec3) {
        let base = triangle as usize * 3;
        (
            self.positions[self.indices[base] as usize],
            self.positions[self.indices[base + 1] as usize],
            self.positions[self.indices[base + 2] as usize],
        )
    }

    fn build_bvh(&mut self) {
        let triangle_count = self.triangle_count();
        self.triangle_order = (0..triangle_count as u32).collect();

        // Precompute per-triangle bounds and centroids once.
        let mut tri_min = Vec::with_capacity(triangle_count);
        let mut tri_max = Vec::with_capacity(triangle_count);
        let mut centroids = Vec::with_capacity(triangle_count);
        for triangle in 0..triangle_count as u32 {
            let (a, b, c) = self.triangle_positions(triangle);
            tri_min.push(a.min(b).min(c));
            tri_max.push(a.max(b).max(c));
            centroids.push((a + b + c) / 3.0);
        }

        let update_bounds = |node: &mut BvhNode, order: &[u32]| {
            node.aabb_min = Vec3::splat(f32::INFINITY);
            node.aabb_max = Vec3::splat(f32::NEG_INFINITY);
            for i in 0..node.triangle_count {
                let triangle = order[(node.left_or_first + i) as usize] as usize;
                node.aabb_min = node.aabb_min.min(tri_min[triangle]);
                node.aabb_max = node.aabb_max.max(tri_max[triangle]);
            }
        };

        let mut nodes = vec![BvhNode::default(); triangle_count * 2 - 1];
        let mut node_count = 1;

        nodes[0].left_or_first = 0;
        nodes[0].triangle_count = triangle_count as u32;
        update_bounds(&mut nodes[0], &self.triangle_order);

        let mut stack = vec![0usize];
        while let Some(node_idx) = stack.pop() {
            let node = nodes[node_idx];
            if node.triangle_count <= 2 {
                continue;
            }

            // Split along the longest axis at the midpoint.
            let extent = node.aabb_max - node.aabb_min;
            let mut axis = 0;
            if extent.y > extent.x {
                axis = 1;
            }
            if extent.z > extent[axis] {
                axis = 2;
            }
            let split = node.aabb_min[axis] + extent[axis] * 0.5;

            // Partition the triangle ordering in place.
            let mut a = node.left_or_first;
            let mut b = a + node.triangle_count - 1;
            while a <= b {
                let centroid = centroids[self.triangle_order[a as usize] as usize][axis];
                if centroid < split {
                    a += 1;
                } else {
                    self.triangle_order.swap(a as usize, b as usize);
                    if b == 0 {
                        break;
                    }
                    b -= 1;
                }
            }

            let left_count = a - node.left_or_first;
            if left_count == 0 || left_count == node.triangle_count {
                continue;
            }

            let left_idx = node_count;
            let right_idx = node_count + 1;
            node_count += 2;

            nodes[left_idx].left_or_first = node.left_or_first;
            nodes[left_idx].triangle_count = left_count;
            nodes[right_idx].left_or_first = a;
            nodes[right_idx].triangle_count = node.triangle_count - left_count;
            update_bounds(&mut nodes[left_idx], &self.triangle_order);
            update_bounds(&mut nodes[right_idx], &self.triangle_order);

            nodes[node_idx].left_or_first = left_idx as u32;
            nodes[node_idx].triangle_count = 0;

            stack.push(right_idx);
            stack.push(left_idx);
        }

        nodes.truncate(node_count);
        self.nodes = nodes;
    }

    pub fn intersect(&self, ray: &Ray) -> Option<LocalHit> {
        let ro = ray.origin.truncate();
        let rd = ray.direction;

        let mut best_t = ray.length;
        let mut best: Option<(u32, f32, f32)> = None;

        let mut stack = Vec::with_capacity(32);
        stack.push(0u32);

        while let Some(node_index) = stack.pop() {
            let node = &self.nodes[node_index as usize];
            if node.is_leaf() {
                for i in 0..node.triangle_count {
                    let triangle = self.triangle_order[(node.left_or_first + i) as usize];
                    let (a, b, c) = self.triangle_positions(triangle);
                    if let Some((t, u, v)) = muller_trumbore(ro, rd, a, b, c) {
                        if t > 1e-3 && t < best_t {
                            best_t = t;
                            best = Some((triangle, u, v));
                        }
                    }
                }
            } else {
                // Visit the nearer child first and skip children that cannot
                // beat the current best hit.
                let mut near_index = node.left_or_first;
                let mut far_index = node.right_child();
                let near = &self.nodes[near_index as usize];
                let far = &self.nodes[far_index as usize];
                let mut near_dist = slab_distance(near.aabb_min, near.aabb_max, ro, rd, best_t);
                let mut far_dist = slab_distance(far.aabb_min, far.aabb_max, ro, rd, best_t);
                if near_dist > far_dist {
                    std::mem::swap(&mut near_index, &mut far_index);
                    std::mem::swap(&mut near_dist, &mut far_dist);
                }

                if near_dist.is_infinite() {
                    continue;
                }
                if far_dist.is_finite() {
                    stack.push(far_index);
                }
                stack.push(near_index);
            }
        }

        best.map(|(triangle, u, v)| self.interpolate(triangle, u, v))
    }

    fn interpolate(&self, triangle: u32, u: f32, v: f32) -> LocalHit {
        let base = triangle as usize * 3;
        let i0 = self.indices[base] as usize;
        let i1 = self.indices[base + 1] as usize;
        let i2 = self.indices[base + 2] as usize;

        let w = 1.0 - u - v;

        let position = w * self.positions[i0] + u * self.positions[i1] + v * self.positions[i2];
        let normal =
            (w * self.normals[i0] + u * self.normals[i1] + v * self.normals[i2]).normalize();

        let uv = if self.uvs.is_empty() {
            Vec2::ZERO
        } else {
            w * self.uvs[i0] + u * self.uvs[i1] + v * self.uvs[i2]
        };
        let colour = if self.colours.is_empty() {
            Vec4::ONE
        } else {
            w * self.colours[i0] + u * self.colours[i1] + v * self.colours[i2]
        };

        LocalHit {
            position: position.extend(1.0),
            uv,
            normal,
            colour,
        }
    }

    /// Precompute per-face normals and areas for light sampling.
    pub fn generate_sampling_data(&mut self) {
        if !self.faces.is_empty() {
            return;
        }

        self.faces.reserve(self.triangle_count());
        for triangle in 0..self.triangle_count() as u32 {
            let base = triangle as usize * 3;
            let normal = (self.normals[self.indices[base] as usize]
                + self.normals[self.indices[base + 1] as usize]
                + self.normals[self.indices[base + 2] as usize])
                .normalize();

            let (a, b, c) = self.triangle_positions(triangle);
            let area = 0.5 * (b - a).cross(c - a).length();

            self.faces.push(TriangleFace { normal, area });
        }

        log::debug!("generated sampling data for {} faces", self.faces.len());
    }

    /// Sample a point on the surface for direct lighting: collect one
    /// candidate per front-facing triangle, then pick one in proportion to
    /// its subtended solid angle. Returns the point and the total solid
    /// angle the pick was drawn from.
    pub fn sample_geometry(
        &self,
        rng: &mut HammersleyGenerator,
        point: Vec3,
        normal: Vec3,
    ) -> Option<(Vec3, f32)> {
        let mut sample_solid_angles = Vec::with_capacity(self.faces.len());
        let mut sample_positions = Vec::with_capacity(self.faces.len());

        let mut total_solid_angle = 0.0;
        for (face_index, face) in self.faces.iter().enumerate() {
            if (-normal).dot(face.normal) <= 0.0 {
                continue;
            }

            let barycentrics = rng::uniform_sample_triangle(rng.next());
            let base = face_index * 3;
            let sampled = (1.0 - barycentrics.x - barycentrics.y)
                * self.positions[self.indices[base] as usize]
                + barycentrics.x * self.positions[self.indices[base + 1] as usize]
                + barycentrics.y * self.positions[self.indices[base + 2] as usize];

            let wi = (sampled - point).normalize();
            if face.normal.dot(-wi) > 0.0 {
                let face_solid_angle = util::solid_angle(point, sampled, face.normal, face.area);
                total_solid_angle += face_solid_angle;
                sample_solid_angles.push(face_solid_angle);
                sample_positions.push(sampled);
            }
        }

        let xi = rng.next();
        rng::choose(xi.y, &sample_solid_angles, total_solid_angle)
            .map(|index| (sample_positions[index], total_solid_angle))
    }
}
