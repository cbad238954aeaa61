use glam::Vec4;

use crate::aabb::{Aabb, Containment};
use crate::ray::Ray;

pub const INVALID_NODE: u32 = u32::MAX;

/// A value and the bounds it occupies inside the tree.
#[derive(Clone)]
pub struct BoundedValue<T> {
    pub bounds: Aabb,
    pub value: T,
}

struct Node<T> {
    bounds: Aabb,
    values: Vec<BoundedValue<T>>,
    children: [u32; 8],
}

/// Fan-out-8 spatial index. Nodes live in an arena addressed by u32 ids so
/// the tree is cheap to move and share.
pub struct OctTree<T> {
    root: u32,
    nodes: Vec<Node<T>>,
}

impl<T: Copy> OctTree<T> {
    pub fn empty() -> Self {
        Self {
            root: INVALID_NODE,
            nodes: Vec::new(),
        }
    }

    /// Every stored value whose bounds the ray pierces. A superset of the
    /// exact hit set; the caller narrows it with real intersection tests.
    pub fn ray_intersections(&self, ray: &Ray) -> Vec<T> {
        let mut out = Vec::new();
        if self.root != INVALID_NODE {
            self.gather(self.root, ray, &mut out);
        }
        out
    }

    fn gather(&self, node_index: u32, ray: &Ray, out: &mut Vec<T>) {
        let node = &self.nodes[node_index as usize];
        if node.bounds.intersection_distance(ray).is_infinite() {
            return;
        }

        for value in &node.values {
            if value.bounds.intersection_distance(ray).is_finite() {
                out.push(value.value);
            }
        }

        for &child in &node.children {
            if child != INVALID_NODE {
                self.gather(child, ray, out);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.root == INVALID_NODE
    }
}

/// Builds an oct-tree by recursive centre splits. Values larger than half
/// their node, or claimed by no child octant, are retained at that node.
pub struct OctTreeBuilder<T> {
    root_bounds: Aabb,
    values: Vec<BoundedValue<T>>,
    max_depth: u32,
    nodes: Vec<Node<T>>,
}

impl<T: Copy> OctTreeBuilder<T> {
    pub fn new(root_bounds: Aabb, values: Vec<BoundedValue<T>>) -> Self {
        Self {
            root_bounds,
            values,
            max_depth: 32,
            nodes: Vec::new(),
        }
    }

    pub fn max_depth(mut self, depth: u32) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn build(mut self) -> OctTree<T> {
        let values = std::mem::take(&mut self.values);
        let root = self.subdivide(self.root_bounds, values, 0);
        OctTree {
            root,
            nodes: self.nodes,
        }
    }

    fn add_node(&mut self, node: Node<T>) -> u32 {
        let index = self.nodes.len() as u32;
        self.nodes.push(node);
        index
    }

    fn split_bounds(bounds: &Aabb) -> [Aabb; 8] {
        let min = bounds.minimum();
        let centre = bounds.central_point();
        let half = (bounds.maximum() - min) * 0.5;

        let mut out = [Aabb::new(min, centre); 8];
        for (i, sub) in out.iter_mut().enumerate() {
            let offset = Vec4::new(
                if i & 1 != 0 { half.x } else { 0.0 },
                if i & 2 != 0 { half.y } else { 0.0 },
                if i & 4 != 0 { half.z } else { 0.0 },
                0.0,
            );
            *sub = Aabb::new(min + offset, centre + offset);
        }
        out
    }

    fn subdivide(&mut self, bounds: Aabb, values: Vec<BoundedValue<T>>, depth: u32) -> u32 {
        if values.is_empty() {
            return INVALID_NODE;
        }

        let mut retained = Vec::new();
        let mut unfitted = Vec::new();

        if depth >= self.max_depth {
            retained = values;
        } else {
            // Anything bigger than half the node stays here.
            let half = bounds.side_lengths() / 2.0;
            for value in values {
                let size = value.bounds.side_lengths();
                if size.x > half.x || size.y > half.y || size.z > half.z {
                    retained.push(value);
                } else {
                    unfitted.push(value);
                }
            }
        }

        let mut children = [INVALID_NODE; 8];
        let mut child_count = 0;
        let mut claims = vec![0u32; unfitted.len()];

        if !unfitted.is_empty() {
            for (octant, sub_bounds) in Self::split_bounds(&bounds).iter().enumerate() {
                let mut sub_values = Vec::new();
                for (index, value) in unfitted.iter().enumerate() {
                    if sub_bounds.contains(&value.bounds) == Containment::Contains {
                        sub_values.push(value.clone());
                        claims[index] += 1;
                    }
                }

                let child = self.subdivide(*sub_bounds, sub_values, depth + 1);
                if child != INVALID_NODE {
                    child_count += 1;
                }
                children[octant] = child;
            }

            // Straddlers that no octant wholly contains stay at this node.
            for (index, value) in unfitted.into_iter().enumerate() {
                if claims[index] == 0 {
                    retained.push(value);
                }
            }
        }

        if retained.is_empty() && child_count == 0 {
            return INVALID_NODE;
        }

        self.add_node(Node {
            bounds,
            values: retained,
            children,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Vec3, Vec4};

    fn boxed(min: Vec3, max: Vec3) -> Aabb {
        Aabb::new(min.extend(1.0), max.extend(1.0))
    }

    fn random_boxes(count: usize, seed: u64) -> Vec<BoundedValue<usize>> {
        let mut rng = crate::rng::XorShift::new(seed);
        (0..count)
            .map(|i| {
                let centre = Vec3::new(
                    rng.next_f32() * 40.0 - 20.0,
                    rng.next_f32() * 40.0 - 20.0,
                    rng.next_f32() * 40.0 - 20.0,
                );
                let half = Vec3::new(
                    rng.next_f32() * 2.0 + 0.1,
                    rng.next_f32() * 2.0 + 0.1,
                    rng.next_f32() * 2.0 + 0.1,
                );
                BoundedValue {
                    bounds: boxed(centre - half, centre + half),
                    value: i,
                }
            })
            .collect()
    }

    fn enclosing(values: &[BoundedValue<usize>]) -> Aabb {
        let mut bounds = Aabb::empty();
        for value in values {
            bounds.union_with(&value.bounds);
        }
        bounds
    }

    #[test]
    fn empty_input_builds_empty_tree() {
        let tree: OctTree<usize> = OctTreeBuilder::new(
            boxed(Vec3::splat(-1.0), Vec3::splat(1.0)),
            Vec::new(),
        )
        .build();
        assert!(tree.is_empty());

        let ray = Ray::new(Vec4::new(0.0, 0.0, -5.0, 1.0), Vec3::Z, 100.0);
        assert!(tree.ray_intersections(&ray).is_empty());
    }

    #[test]
    fn query_returns_superset_of_linear_scan() {
        let values = random_boxes(200, 7);
        let tree = OctTreeBuilder::new(enclosing(&values), values.clone()).build();

        let mut rng = crate::rng::XorShift::new(13);
        for _ in 0..100 {
            let origin = Vec3::new(
                rng.next_f32() * 80.0 - 40.0,
                rng.next_f32() * 80.0 - 40.0,
                rng.next_f32() * 80.0 - 40.0,
            );
            let target = Vec3::new(
                rng.next_f32() * 40.0 - 20.0,
                rng.next_f32() * 40.0 - 20.0,
                rng.next_f32() * 40.0 - 20.0,
            );
            let direction = (target - origin).normalize();
            let ray = Ray::new(origin.extend(1.0), direction, 1000.0);

            let found = tree.ray_intersections(&ray);
            for value in &values {
                if value.bounds.intersection_distance(&ray).is_finite() {
                    assert!(
                        found.contains(&value.value),
                        "oct-tree missed box {} pierced by the ray",
                        value.value
                    );
                }
            }
        }
    }

    #[test]
    fn max_depth_zero_retains_everything_at_the_root() {
        let values = random_boxes(32, 3);
        let tree = OctTreeBuilder::new(enclosing(&values), values.clone())
            .max_depth(0)
            .build();

        assert_eq!(tree.nodes.len(), 1);
        assert_eq!(tree.nodes[0].values.len(), values.len());
    }

    #[test]
    fn oversize_values_stay_at_the_parent() {
        let huge = BoundedValue {
            bounds: boxed(Vec3::splat(-9.0), Vec3::splat(9.0)),
            value: 0usize,
        };
        let small = BoundedValue {
            bounds: boxed(Vec3::splat(1.0), Vec3::splat(2.0)),
            value: 1usize,
        };
        let root = boxed(Vec3::splat(-10.0), Vec3::splat(10.0));
        let tree = OctTreeBuilder::new(root, vec![huge, small]).build();

        // The root holds the oversize box; the small one sank into a child.
        let root_node = &tree.nodes[tree.root as usize];
        assert_eq!(root_node.values.len(), 1);
        assert_eq!(root_node.values[0].value, 0);
    }
}
