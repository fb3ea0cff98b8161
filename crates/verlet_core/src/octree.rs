//! Broad phase: an octree rebuilt from scratch every step.
//!
//! Nodes live in a flat arena and refer to their children by index. Only
//! octants that actually contain a body are created, so a sparse scene
//! produces a sparse tree. A body is placed in every octant it touches;
//! bodies straddling a split plane therefore appear in several leaves.
//!
//! Recursion stops at the configured depth or as soon as an octant holds a
//! single body. Only leaves store body indices.

use bevy::math::Vec3;

use crate::body::{RigidBody, Shape};
use crate::narrow_phase::{obb_intersects_aabb, sphere_aabb, Aabb};

/// Index of a node in the octree arena.
pub type NodeIndex = usize;

/// A cube of space.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub center: Vec3,
    pub half_size: f32,
    pub depth: u32,
    pub children: Vec<NodeIndex>,
    /// Indices into the body slice the tree was built from.
    pub bodies: Vec<usize>,
}

impl Node {
    fn new(center: Vec3, half_size: f32, depth: u32) -> Self {
        Self {
            center,
            half_size,
            depth,
            children: Vec::new(),
            bodies: Vec::new(),
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub fn aabb(&self) -> Aabb {
        Aabb::from_center_half_extents(self.center, Vec3::splat(self.half_size))
    }
}

/// Octree over a cube centred at the origin.
#[derive(Debug, Clone)]
pub struct Octree {
    half_size: f32,
    max_depth: u32,
    nodes: Vec<Node>,
}

impl Octree {
    /// An empty tree covering `[-half_size, half_size]³`.
    pub fn new(half_size: f32, max_depth: u32) -> Self {
        Self {
            half_size,
            max_depth,
            nodes: vec![Node::new(Vec3::ZERO, half_size, 0)],
        }
    }

    pub fn half_size(&self) -> f32 {
        self.half_size
    }

    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }

    /// Drop every node below the root.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.nodes.push(Node::new(Vec3::ZERO, self.half_size, 0));
    }

    pub fn root(&self) -> &Node {
        &self.nodes[0]
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Discard the current tree and partition `bodies` again.
    pub fn rebuild(&mut self, bodies: &[RigidBody]) {
        self.clear();

        let root_box = self.nodes[0].aabb();
        let members: Vec<usize> = (0..bodies.len())
            .filter(|&i| touches(&bodies[i], &root_box))
            .collect();

        self.subdivide(0, members, bodies);
    }

    fn subdivide(&mut self, node: NodeIndex, members: Vec<usize>, bodies: &[RigidBody]) {
        let (center, half_size, depth) = {
            let n = &self.nodes[node];
            (n.center, n.half_size, n.depth)
        };

        if members.len() <= 1 || depth >= self.max_depth {
            self.nodes[node].bodies = members;
            return;
        }

        let child_half = half_size * 0.5;
        for octant in 0..8 {
            let child_center = octant_center(center, half_size, octant);
            let cell = Aabb::from_center_half_extents(child_center, Vec3::splat(child_half));

            let inside: Vec<usize> = members
                .iter()
                .copied()
                .filter(|&i| touches(&bodies[i], &cell))
                .collect();
            if inside.is_empty() {
                continue;
            }

            let child = self.nodes.len();
            self.nodes.push(Node::new(child_center, child_half, depth + 1));
            self.nodes[node].children.push(child);
            self.subdivide(child, inside, bodies);
        }

        // Rounding can leave members that no octant claims; keep them here
        // rather than lose them.
        if self.nodes[node].children.is_empty() {
            self.nodes[node].bodies = members;
        }
    }

    /// Every leaf, including empty ones.
    pub fn leaves(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(|n| n.is_leaf())
    }

    /// Leaves holding more than one body: the collision candidates.
    pub fn leaves_with_multiple_bodies(&self) -> impl Iterator<Item = &Node> {
        self.leaves().filter(|n| n.bodies.len() > 1)
    }
}

/// Centre of octant `i` of a cube.
///
/// Bit 1 selects +X, bit 2 selects -Y and bit 0 selects +Z.
fn octant_center(center: Vec3, half_size: f32, octant: usize) -> Vec3 {
    let q = half_size * 0.5;
    Vec3::new(
        if octant & 2 != 0 { center.x + q } else { center.x - q },
        if octant & 4 != 0 { center.y - q } else { center.y + q },
        if octant & 1 != 0 { center.z + q } else { center.z - q },
    )
}

/// Membership test: exact OBB for cuboids, sphere for balls.
fn touches(body: &RigidBody, cell: &Aabb) -> bool {
    match body.shape() {
        Shape::Cuboid { .. } => obb_intersects_aabb(&body.obb(), cell),
        Shape::Ball { radius, .. } => sphere_aabb(body.center(), radius, cell),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::BodyDesc;
    use crate::narrow_phase::{obb_overlap, sphere_sphere};
    use bevy::math::Quat;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn cuboid(id: u32, position: Vec3, half: f32) -> RigidBody {
        RigidBody::new(id, &BodyDesc::cuboid(position, Vec3::splat(half)), 10.0, 0.8).unwrap()
    }

    fn ball(id: u32, position: Vec3, radius: f32) -> RigidBody {
        RigidBody::new(id, &BodyDesc::ball(position, radius), 10.0, 0.8).unwrap()
    }

    fn share_a_leaf(tree: &Octree, a: usize, b: usize) -> bool {
        tree.leaves_with_multiple_bodies()
            .any(|leaf| leaf.bodies.contains(&a) && leaf.bodies.contains(&b))
    }

    #[test]
    fn test_octant_centers_cover_all_sign_combinations() {
        let mut seen: Vec<Vec3> = (0..8).map(|i| octant_center(Vec3::ZERO, 4.0, i)).collect();
        for c in &seen {
            assert_eq!(c.abs(), Vec3::splat(2.0));
        }
        seen.sort_by(|a, b| a.to_array().partial_cmp(&b.to_array()).unwrap());
        seen.dedup();
        assert_eq!(seen.len(), 8, "octants must be distinct");

        assert_eq!(octant_center(Vec3::ZERO, 4.0, 0), Vec3::new(-2.0, 2.0, -2.0));
        assert_eq!(octant_center(Vec3::ZERO, 4.0, 7), Vec3::new(2.0, -2.0, 2.0));
    }

    #[test]
    fn test_empty_and_single_body_trees_stay_flat() {
        let mut tree = Octree::new(10.0, 5);
        tree.rebuild(&[]);
        assert_eq!(tree.nodes().len(), 1);
        assert_eq!(tree.leaves_with_multiple_bodies().count(), 0);

        let bodies = [cuboid(0, Vec3::new(3.0, 3.0, 3.0), 0.5)];
        tree.rebuild(&bodies);
        assert_eq!(tree.nodes().len(), 1, "one body never subdivides");
        assert_eq!(tree.root().bodies, vec![0]);
    }

    #[test]
    fn test_distant_bodies_are_not_candidates() {
        let bodies = [
            cuboid(0, Vec3::new(-6.0, 6.0, -6.0), 0.5),
            cuboid(1, Vec3::new(6.0, -6.0, 6.0), 0.5),
        ];
        let mut tree = Octree::new(10.0, 5);
        tree.rebuild(&bodies);

        assert_eq!(tree.root().children.len(), 2, "only occupied octants exist");
        assert_eq!(tree.leaves_with_multiple_bodies().count(), 0);
    }

    #[test]
    fn test_straddling_pair_shares_several_leaves() {
        // Both boxes cross the x = 0 and z = 0 planes.
        let bodies = [
            cuboid(0, Vec3::new(0.0, -0.9, 0.0), 1.0),
            cuboid(1, Vec3::new(0.0, 0.9, 0.0), 1.0),
        ];
        let mut tree = Octree::new(10.0, 5);
        tree.rebuild(&bodies);

        let shared = tree
            .leaves_with_multiple_bodies()
            .filter(|leaf| leaf.bodies == vec![0, 1])
            .count();
        assert!(shared > 1, "expected the pair in several leaves, got {}", shared);
        for leaf in tree.leaves_with_multiple_bodies() {
            assert_eq!(leaf.depth, 5, "crowded leaves only stop at max depth");
        }
    }

    #[test]
    fn test_clear_resets_to_empty_root() {
        let bodies = [
            cuboid(0, Vec3::new(0.5, 0.0, 0.0), 1.0),
            cuboid(1, Vec3::new(-0.5, 0.0, 0.0), 1.0),
        ];
        let mut tree = Octree::new(10.0, 3);
        tree.rebuild(&bodies);
        assert!(tree.nodes().len() > 1);

        tree.clear();
        assert_eq!(tree.nodes().len(), 1);
        assert!(tree.root().is_leaf());
        assert!(tree.root().bodies.is_empty());
        assert_eq!(tree.root().half_size, 10.0);
    }

    #[test]
    fn test_no_false_negatives_against_brute_force() {
        let mut rng = StdRng::seed_from_u64(0x5eed);

        for round in 0..20 {
            let bodies: Vec<RigidBody> = (0..24)
                .map(|i| {
                    let position = Vec3::new(
                        rng.gen_range(-6.0..6.0),
                        rng.gen_range(-6.0..6.0),
                        rng.gen_range(-6.0..6.0),
                    );
                    if rng.gen_bool(0.3) {
                        ball(i, position, rng.gen_range(0.3..1.5))
                    } else {
                        let desc = BodyDesc {
                            rotation: Quat::from_euler(
                                bevy::math::EulerRot::XYZ,
                                rng.gen_range(0.0..3.0),
                                rng.gen_range(0.0..3.0),
                                rng.gen_range(0.0..3.0),
                            ),
                            ..BodyDesc::cuboid(
                                position,
                                Vec3::new(
                                    rng.gen_range(0.3..1.5),
                                    rng.gen_range(0.3..1.5),
                                    rng.gen_range(0.3..1.5),
                                ),
                            )
                        };
                        RigidBody::new(i, &desc, 10.0, 0.8).unwrap()
                    }
                })
                .collect();

            let mut tree = Octree::new(10.0, 5);
            tree.rebuild(&bodies);

            for a in 0..bodies.len() {
                for b in (a + 1)..bodies.len() {
                    let overlapping = match (bodies[a].shape(), bodies[b].shape()) {
                        (Shape::Ball { radius: ra, .. }, Shape::Ball { radius: rb, .. }) => {
                            sphere_sphere(bodies[a].center(), ra, bodies[b].center(), rb)
                        }
                        (Shape::Cuboid { .. }, Shape::Cuboid { .. }) => {
                            obb_overlap(&bodies[a].obb(), &bodies[b].obb()).is_some()
                        }
                        _ => false,
                    };
                    if overlapping {
                        assert!(
                            share_a_leaf(&tree, a, b),
                            "round {}: overlapping bodies {} and {} never share a leaf",
                            round,
                            a,
                            b
                        );
                    }
                }
            }
        }
    }
}
