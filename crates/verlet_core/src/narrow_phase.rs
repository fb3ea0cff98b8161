//! Geometric overlap tests.
//!
//! Pure functions over value types, with no knowledge of bodies or the world:
//!
//! - [`obb_overlap`]: 15-axis separating-axis test between oriented boxes
//! - [`obb_intersects_aabb`]: the same test against a world-aligned cell
//! - [`sphere_sphere`] and [`sphere_aabb`]: squared-distance tests
//! - [`ray_triangle`]: Möller–Trumbore with back-face culling
//!
//! The SAT follows the rotation-matrix formulation from Ericson's *Real-Time
//! Collision Detection* (5.2.1), with an epsilon on `|R|` so that parallel
//! edges do not produce false separations.

use bevy::math::Vec3;

/// Added to `|R|` entries to absorb rounding when two edges are parallel.
const SAT_EPSILON: f32 = 1e-6;

/// Edge-cross axes shorter than this (squared) come from near-parallel edges
/// and are not trusted as contact normals.
const PARALLEL_EPSILON: f32 = 1e-6;

/// Tolerance for ray/triangle determinant and hit distance.
pub const RAY_EPSILON: f32 = 1e-4;

/// Slack on the barycentric bounds so that a ray through the edge shared by
/// two triangles hits at least one of them.
const EDGE_TOLERANCE: f32 = 1e-6;

/// Corner indices of the 12 triangles of a box, counter-clockwise when viewed
/// from outside so that `(v1 - v0) × (v2 - v0)` points out of the box.
///
/// Corners are numbered as in `RigidBody`: 0..4 on the +Y face, 4..8 on -Y.
pub const CUBOID_TRIANGLES: [[usize; 3]; 12] = [
    // +Y
    [0, 3, 2],
    [0, 2, 1],
    // -Y
    [4, 5, 6],
    [4, 6, 7],
    // +X
    [0, 4, 7],
    [0, 7, 3],
    // -X
    [1, 2, 6],
    [1, 6, 5],
    // +Z
    [0, 1, 5],
    [0, 5, 4],
    // -Z
    [3, 7, 6],
    [3, 6, 2],
];

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    pub fn from_center_half_extents(center: Vec3, half_extents: Vec3) -> Self {
        Self {
            min: center - half_extents,
            max: center + half_extents,
        }
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn half_extents(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    pub fn contains(&self, point: Vec3) -> bool {
        point.cmpge(self.min).all() && point.cmple(self.max).all()
    }
}

/// Oriented bounding box: centre, three orthonormal axes and the half extent
/// along each of them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Obb {
    pub center: Vec3,
    pub axes: [Vec3; 3],
    pub half_extents: Vec3,
}

impl Obb {
    pub fn new(center: Vec3, axes: [Vec3; 3], half_extents: Vec3) -> Self {
        Self {
            center,
            axes,
            half_extents,
        }
    }

    /// World-aligned box with the given centre and half extents.
    pub fn axis_aligned(center: Vec3, half_extents: Vec3) -> Self {
        Self::new(center, [Vec3::X, Vec3::Y, Vec3::Z], half_extents)
    }

    /// Whether `point` lies inside or on the surface of the box.
    pub fn contains(&self, point: Vec3) -> bool {
        let v = point - self.center;
        let h = self.half_extents.to_array();
        self.axes
            .iter()
            .zip(h)
            .all(|(axis, half)| v.dot(*axis).abs() <= half)
    }
}

impl From<Aabb> for Obb {
    fn from(aabb: Aabb) -> Self {
        Obb::axis_aligned(aabb.center(), aabb.half_extents())
    }
}

/// Separating-axis test between two oriented boxes.
///
/// Returns `None` as soon as a separating axis is found. Touching boxes count
/// as overlapping. On overlap, returns the axis with the least slack
/// (`ra + rb - |t·L|`) as an approximate contact normal, unit length and
/// pointing from `a` towards `b`.
///
/// The slack of edge-cross axes is not rescaled by the axis length, so the
/// normal is a cheap heuristic rather than the minimum translation vector.
pub fn obb_overlap(a: &Obb, b: &Obb) -> Option<Vec3> {
    let ea = a.half_extents.to_array();
    let eb = b.half_extents.to_array();

    // R[i][j] = a_i · b_j, B's frame expressed in A's.
    let mut r = [[0.0f32; 3]; 3];
    let mut abs_r = [[0.0f32; 3]; 3];
    for i in 0..3 {
        for j in 0..3 {
            r[i][j] = a.axes[i].dot(b.axes[j]);
            abs_r[i][j] = r[i][j].abs() + SAT_EPSILON;
        }
    }

    let offset = b.center - a.center;
    let t = [
        offset.dot(a.axes[0]),
        offset.dot(a.axes[1]),
        offset.dot(a.axes[2]),
    ];

    let mut best_slack = f32::INFINITY;
    let mut best_axis = a.axes[0];
    let mut track = |slack: f32, axis: Vec3| {
        if slack < best_slack {
            best_slack = slack;
            best_axis = axis;
        }
    };

    // A's face normals
    for i in 0..3 {
        let ra = ea[i];
        let rb = eb[0] * abs_r[i][0] + eb[1] * abs_r[i][1] + eb[2] * abs_r[i][2];
        let dist = t[i].abs();
        if dist > ra + rb {
            return None;
        }
        track(ra + rb - dist, a.axes[i]);
    }

    // B's face normals
    for j in 0..3 {
        let ra = ea[0] * abs_r[0][j] + ea[1] * abs_r[1][j] + ea[2] * abs_r[2][j];
        let rb = eb[j];
        let dist = (t[0] * r[0][j] + t[1] * r[1][j] + t[2] * r[2][j]).abs();
        if dist > ra + rb {
            return None;
        }
        track(ra + rb - dist, b.axes[j]);
    }

    // Edge-edge axes a_i × b_j
    for i in 0..3 {
        let (i1, i2) = ((i + 1) % 3, (i + 2) % 3);
        for j in 0..3 {
            let (j1, j2) = ((j + 1) % 3, (j + 2) % 3);
            let ra = ea[i1] * abs_r[i2][j] + ea[i2] * abs_r[i1][j];
            let rb = eb[j1] * abs_r[i][j2] + eb[j2] * abs_r[i][j1];
            let dist = (t[i2] * r[i1][j] - t[i1] * r[i2][j]).abs();
            if dist > ra + rb {
                return None;
            }
            let axis = a.axes[i].cross(b.axes[j]);
            if axis.length_squared() > PARALLEL_EPSILON {
                track(ra + rb - dist, axis);
            }
        }
    }

    let normal = best_axis.normalize_or_zero();
    if normal.dot(offset) < 0.0 {
        Some(-normal)
    } else {
        Some(normal)
    }
}

/// Whether an oriented box touches an axis-aligned cell.
pub fn obb_intersects_aabb(obb: &Obb, aabb: &Aabb) -> bool {
    obb_overlap(obb, &Obb::from(*aabb)).is_some()
}

/// Whether two spheres overlap. Compares squared distances.
pub fn sphere_sphere(center_a: Vec3, radius_a: f32, center_b: Vec3, radius_b: f32) -> bool {
    let reach = radius_a + radius_b;
    center_a.distance_squared(center_b) < reach * reach
}

/// Whether a sphere touches an axis-aligned box.
pub fn sphere_aabb(center: Vec3, radius: f32, aabb: &Aabb) -> bool {
    let closest = center.clamp(aabb.min, aabb.max);
    center.distance_squared(closest) <= radius * radius
}

/// A triangle of a body's surface, remembering which particles its vertices
/// came from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle {
    pub vertices: [Vec3; 3],
    pub corners: [usize; 3],
}

impl Triangle {
    /// Unnormalised face normal following the winding order.
    pub fn normal(&self) -> Vec3 {
        let [v0, v1, v2] = self.vertices;
        (v1 - v0).cross(v2 - v0)
    }
}

/// Where a ray struck a triangle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    pub point: Vec3,
    /// Distance along the ray in units of its direction.
    pub t: f32,
    pub u: f32,
    pub v: f32,
}

impl RayHit {
    /// Barycentric weights of the hit for the triangle's three vertices.
    pub fn weights(&self) -> [f32; 3] {
        [1.0 - self.u - self.v, self.u, self.v]
    }
}

/// Möller–Trumbore ray/triangle intersection.
///
/// Triangles facing away from the ray (`normal · direction >= 0`) are culled,
/// so a ray cast from outside a closed mesh only reports the faces it enters
/// through.
pub fn ray_triangle(origin: Vec3, direction: Vec3, triangle: &Triangle) -> Option<RayHit> {
    let [v0, v1, v2] = triangle.vertices;
    let e1 = v1 - v0;
    let e2 = v2 - v0;

    let h = direction.cross(e2);
    // det = -(normal · direction); culls back faces and grazing rays.
    let det = e1.dot(h);
    if det < RAY_EPSILON {
        return None;
    }

    let inv_det = 1.0 / det;
    let s = origin - v0;
    let u = inv_det * s.dot(h);
    if u < -EDGE_TOLERANCE || u > 1.0 + EDGE_TOLERANCE {
        return None;
    }

    let q = s.cross(e1);
    let v = inv_det * direction.dot(q);
    if v < -EDGE_TOLERANCE || u + v > 1.0 + EDGE_TOLERANCE {
        return None;
    }

    let t = inv_det * e2.dot(q);
    if t <= RAY_EPSILON {
        return None;
    }

    Some(RayHit {
        point: origin + direction * t,
        t,
        u,
        v,
    })
}

/// Nearest front-facing hit of a ray against a set of triangles.
pub fn raycast_triangles<'a>(
    origin: Vec3,
    direction: Vec3,
    triangles: impl IntoIterator<Item = &'a Triangle>,
) -> Option<(RayHit, &'a Triangle)> {
    triangles
        .into_iter()
        .filter_map(|tri| ray_triangle(origin, direction, tri).map(|hit| (hit, tri)))
        .min_by(|(a, _), (b, _)| a.t.total_cmp(&b.t))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy::math::Quat;

    fn unit_box(center: Vec3) -> Obb {
        Obb::axis_aligned(center, Vec3::ONE)
    }

    fn rotated_box(center: Vec3, rotation: Quat, half_extents: Vec3) -> Obb {
        Obb::new(
            center,
            [rotation * Vec3::X, rotation * Vec3::Y, rotation * Vec3::Z],
            half_extents,
        )
    }

    #[test]
    fn test_sat_overlap_at_1_9() {
        let a = unit_box(Vec3::ZERO);
        let b = unit_box(Vec3::new(1.9, 0.0, 0.0));

        let normal = obb_overlap(&a, &b).expect("boxes 1.9 apart should overlap");
        assert!(
            (normal - Vec3::X).length() < 1e-4,
            "normal should point from a to b along +X, got {:?}",
            normal
        );
    }

    #[test]
    fn test_sat_separated_at_2_1() {
        let a = unit_box(Vec3::ZERO);
        let b = unit_box(Vec3::new(2.1, 0.0, 0.0));
        assert!(obb_overlap(&a, &b).is_none());
    }

    #[test]
    fn test_sat_is_symmetric_in_overlap() {
        let a = rotated_box(Vec3::ZERO, Quat::from_rotation_y(0.3), Vec3::ONE);
        let b = rotated_box(
            Vec3::new(1.5, 0.8, -0.4),
            Quat::from_rotation_x(0.9) * Quat::from_rotation_z(0.2),
            Vec3::new(0.5, 1.0, 0.7),
        );
        let ab = obb_overlap(&a, &b);
        let ba = obb_overlap(&b, &a);
        assert_eq!(ab.is_some(), ba.is_some());
    }

    #[test]
    fn test_sat_normal_points_from_a_to_b() {
        let a = unit_box(Vec3::ZERO);
        let b = unit_box(Vec3::new(0.0, -1.8, 0.0));
        let normal = obb_overlap(&a, &b).unwrap();
        assert!(normal.y < -0.99, "expected -Y, got {:?}", normal);
        assert!((normal.length() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_sat_edge_axis_separates_rotated_boxes() {
        // A's top edge runs along Z, B's bottom edge along X, 0.1 apart.
        // Every face axis still overlaps; only Z × X = Y separates them.
        let sqrt2 = std::f32::consts::SQRT_2;
        let a = rotated_box(Vec3::ZERO, Quat::from_rotation_z(std::f32::consts::FRAC_PI_4), Vec3::ONE);
        let b = rotated_box(
            Vec3::new(0.0, 2.0 * sqrt2 + 0.1, 0.0),
            Quat::from_rotation_x(std::f32::consts::FRAC_PI_4),
            Vec3::ONE,
        );
        assert!(obb_overlap(&a, &b).is_none());

        let b_touching = Obb {
            center: Vec3::new(0.0, 2.0 * sqrt2 - 0.1, 0.0),
            ..b
        };
        assert!(obb_overlap(&a, &b_touching).is_some());
    }

    #[test]
    fn test_obb_contains() {
        let obb = rotated_box(Vec3::ZERO, Quat::from_rotation_y(0.5), Vec3::new(2.0, 1.0, 1.0));
        assert!(obb.contains(Vec3::ZERO));
        assert!(obb.contains(Quat::from_rotation_y(0.5) * Vec3::new(1.9, 0.9, -0.9)));
        assert!(!obb.contains(Vec3::new(0.0, 1.1, 0.0)));
    }

    #[test]
    fn test_obb_vs_aabb() {
        let cell = Aabb::from_center_half_extents(Vec3::new(2.5, 2.5, 2.5), Vec3::splat(2.5));
        let inside = unit_box(Vec3::new(1.0, 1.0, 1.0));
        let straddling = unit_box(Vec3::new(-0.5, 1.0, 1.0));
        let outside = unit_box(Vec3::new(-1.5, 1.0, 1.0));

        assert!(obb_intersects_aabb(&inside, &cell));
        assert!(obb_intersects_aabb(&straddling, &cell));
        assert!(!obb_intersects_aabb(&outside, &cell));
    }

    #[test]
    fn test_sphere_sphere() {
        assert!(sphere_sphere(Vec3::ZERO, 0.5, Vec3::new(0.9, 0.0, 0.0), 0.5));
        assert!(!sphere_sphere(Vec3::ZERO, 0.5, Vec3::new(1.1, 0.0, 0.0), 0.5));
        // Exactly touching is not an overlap.
        assert!(!sphere_sphere(Vec3::ZERO, 0.5, Vec3::new(1.0, 0.0, 0.0), 0.5));
    }

    #[test]
    fn test_sphere_aabb() {
        let cell = Aabb::new(Vec3::ZERO, Vec3::ONE);
        assert!(sphere_aabb(Vec3::splat(0.5), 0.1, &cell), "centre inside");
        assert!(sphere_aabb(Vec3::new(1.2, 0.5, 0.5), 0.25, &cell), "face contact");
        assert!(!sphere_aabb(Vec3::new(1.2, 1.2, 1.2), 0.3, &cell), "corner gap");
    }

    #[test]
    fn test_cuboid_triangles_face_outward() {
        // Corner layout used by cuboid bodies.
        let signs = [
            Vec3::new(1.0, 1.0, 1.0),
            Vec3::new(-1.0, 1.0, 1.0),
            Vec3::new(-1.0, 1.0, -1.0),
            Vec3::new(1.0, 1.0, -1.0),
            Vec3::new(1.0, -1.0, 1.0),
            Vec3::new(-1.0, -1.0, 1.0),
            Vec3::new(-1.0, -1.0, -1.0),
            Vec3::new(1.0, -1.0, -1.0),
        ];
        for corners in CUBOID_TRIANGLES {
            let tri = Triangle {
                vertices: corners.map(|c| signs[c]),
                corners,
            };
            let centroid = (tri.vertices[0] + tri.vertices[1] + tri.vertices[2]) / 3.0;
            assert!(
                tri.normal().dot(centroid) > 0.0,
                "triangle {:?} faces inward",
                corners
            );
        }
    }

    #[test]
    fn test_ray_hits_front_face() {
        let tri = Triangle {
            vertices: [
                Vec3::new(-1.0, 0.0, 1.0),
                Vec3::new(1.0, 0.0, 1.0),
                Vec3::new(0.0, 0.0, -1.0),
            ],
            corners: [0, 1, 2],
        };
        // Normal of this winding points +Y.
        assert!(tri.normal().y > 0.0);

        let hit = ray_triangle(Vec3::new(0.0, 2.0, 0.0), Vec3::NEG_Y, &tri)
            .expect("ray from above should hit");
        assert!((hit.t - 2.0).abs() < 1e-5);
        assert!(hit.point.distance(Vec3::ZERO) < 1e-5);
        let w = hit.weights();
        assert!((w[0] + w[1] + w[2] - 1.0).abs() < 1e-5);
        assert!(w.iter().all(|&x| x >= 0.0));
    }

    #[test]
    fn test_ray_back_face_is_culled() {
        let tri = Triangle {
            vertices: [
                Vec3::new(-1.0, 0.0, 1.0),
                Vec3::new(1.0, 0.0, 1.0),
                Vec3::new(0.0, 0.0, -1.0),
            ],
            corners: [0, 1, 2],
        };
        assert!(ray_triangle(Vec3::new(0.0, -2.0, 0.0), Vec3::Y, &tri).is_none());
    }

    #[test]
    fn test_ray_misses_outside_triangle() {
        let tri = Triangle {
            vertices: [
                Vec3::new(-1.0, 0.0, 1.0),
                Vec3::new(1.0, 0.0, 1.0),
                Vec3::new(0.0, 0.0, -1.0),
            ],
            corners: [0, 1, 2],
        };
        assert!(ray_triangle(Vec3::new(3.0, 2.0, 0.0), Vec3::NEG_Y, &tri).is_none());
        // Pointing away
        assert!(ray_triangle(Vec3::new(0.0, 2.0, 0.0), Vec3::Y, &tri).is_none());
    }

    #[test]
    fn test_raycast_box_returns_entry_face() {
        let corners = [
            Vec3::new(1.0, 1.0, 1.0),
            Vec3::new(-1.0, 1.0, 1.0),
            Vec3::new(-1.0, 1.0, -1.0),
            Vec3::new(1.0, 1.0, -1.0),
            Vec3::new(1.0, -1.0, 1.0),
            Vec3::new(-1.0, -1.0, 1.0),
            Vec3::new(-1.0, -1.0, -1.0),
            Vec3::new(1.0, -1.0, -1.0),
        ];
        let triangles: Vec<Triangle> = CUBOID_TRIANGLES
            .iter()
            .map(|&c| Triangle {
                vertices: c.map(|i| corners[i]),
                corners: c,
            })
            .collect();

        let (hit, tri) = raycast_triangles(Vec3::new(0.2, 5.0, 0.3), Vec3::NEG_Y, &triangles)
            .expect("ray through the box should hit");
        assert!((hit.point.y - 1.0).abs() < 1e-5, "entry on +Y, got {:?}", hit.point);
        assert!(tri.corners.iter().all(|&c| c < 4), "top-face corners");
    }
}
