use glam::{Mat4, Vec3, Vec4};

use crate::ray::Ray;

/// How one box relates to another, judged by the corners of the tested box.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Containment {
    Disjoint,
    Partial,
    Contains,
}

/// An axis aligned bounding box. Min and max are componentwise ordered.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    minimum: Vec4,
    maximum: Vec4,
}

impl Aabb {
    pub fn new(minimum: Vec4, maximum: Vec4) -> Self {
        Self { minimum, maximum }
    }

    /// An empty box that unions correctly with anything.
    pub fn empty() -> Self {
        Self {
            minimum: Vec4::new(f32::INFINITY, f32::INFINITY, f32::INFINITY, 1.0),
            maximum: Vec4::new(f32::NEG_INFINITY, f32::NEG_INFINITY, f32::NEG_INFINITY, 1.0),
        }
    }

    pub fn minimum(&self) -> Vec4 {
        self.minimum
    }

    pub fn maximum(&self) -> Vec4 {
        self.maximum
    }

    pub fn central_point(&self) -> Vec4 {
        self.minimum + (self.maximum - self.minimum) * 0.5
    }

    pub fn side_lengths(&self) -> Vec3 {
        (self.maximum - self.minimum).truncate().abs()
    }

    pub fn corners(&self) -> [Vec4; 8] {
        let min = self.minimum;
        let max = self.maximum;
        [
            Vec4::new(min.x, min.y, min.z, 1.0),
            Vec4::new(min.x, min.y, max.z, 1.0),
            Vec4::new(max.x, min.y, max.z, 1.0),
            Vec4::new(max.x, min.y, min.z, 1.0),
            Vec4::new(min.x, max.y, min.z, 1.0),
            Vec4::new(min.x, max.y, max.z, 1.0),
            Vec4::new(max.x, max.y, max.z, 1.0),
            Vec4::new(max.x, max.y, min.z, 1.0),
        ]
    }

    /// Slab test. Returns the nearest entry distance, or infinity on a miss.
    /// When the ray starts inside the box the returned distance is negative;
    /// it is not clamped to zero.
    pub fn intersection_distance(&self, ray: &Ray) -> f32 {
        let origin = ray.origin.truncate();
        let inv_dir = ray.direction.recip();

        let t1 = (self.minimum.truncate() - origin) * inv_dir;
        let t2 = (self.maximum.truncate() - origin) * inv_dir;

        let tmin = t1.min(t2).max_element();
        let tmax = t1.max(t2).min_element();

        // tmax < 0 means the whole box is behind the ray.
        if tmax < 0.0 || tmin > tmax {
            f32::INFINITY
        } else {
            tmin
        }
    }

    pub fn contains_point(&self, point: Vec4) -> bool {
        point.x >= self.minimum.x
            && point.x <= self.maximum.x
            && point.y >= self.minimum.y
            && point.y <= self.maximum.y
            && point.z >= self.minimum.z
            && point.z <= self.maximum.z
    }

    /// Classify `other` by counting how many of its corners fall inside.
    pub fn contains(&self, other: &Aabb) -> Containment {
        let mut inside = 0;
        for corner in other.corners() {
            if self.contains_point(corner) {
                inside += 1;
            }
        }

        match inside {
            0 => Containment::Disjoint,
            8 => Containment::Contains,
            _ => Containment::Partial,
        }
    }

    pub fn add_point(&mut self, point: Vec4) {
        self.minimum = self.minimum.min(point);
        self.maximum = self.maximum.max(point);
    }

    pub fn union_with(&mut self, other: &Aabb) {
        self.minimum = self.minimum.min(other.minimum);
        self.maximum = self.maximum.max(other.maximum);
    }

    pub fn union(lhs: &Aabb, rhs: &Aabb) -> Aabb {
        let mut out = *lhs;
        out.union_with(rhs);
        out
    }

    /// Transform all eight corners and rebound, so the result stays axis
    /// aligned rather than becoming an oriented box.
    pub fn transformed(&self, transform: &Mat4) -> Aabb {
        let mut smallest = Vec4::splat(f32::INFINITY);
        let mut largest = Vec4::splat(f32::NEG_INFINITY);
        for corner in self.corners() {
            let mut point = *transform * corner;
            point /= point.w;
            smallest = smallest.min(point);
            largest = largest.max(point);
        }

        Aabb::new(
            Vec4::new(smallest.x, smallest.y, smallest.z, 1.0),
            Vec4::new(largest.x, largest.y, largest.z, 1.0),
        )
    }

    pub fn is_degenerate(&self) -> bool {
        !self.minimum.is_finite()
            || !self.maximum.is_finite()
            || self.minimum.truncate().cmpgt(self.maximum.truncate()).any()
    }
}
