//! Geometry helpers shared by the viewport camera logic.
//!
//! Everything here works in double precision world space (millimetres for
//! medical volumes). Bounds are axis aligned and follow the
//! `[x_min, x_max, y_min, y_max, z_min, z_max]` layout when flattened.

use glam::{DMat4, DQuat, DVec3};
use serde::{Deserialize, Serialize};

/// Tolerance used for containment and parallelism checks.
pub const GEOMETRY_EPSILON: f64 = 1e-6;

/// An axis-aligned bounding box in world coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    /// Minimum corner.
    pub min: DVec3,
    /// Maximum corner.
    pub max: DVec3,
}

impl Bounds {
    /// Creates bounds from two corners.
    #[must_use]
    pub fn new(min: DVec3, max: DVec3) -> Self {
        Self { min, max }
    }

    /// Creates bounds from the flat `[x_min, x_max, y_min, y_max, z_min, z_max]` layout.
    #[must_use]
    pub fn from_array(b: [f64; 6]) -> Self {
        Self {
            min: DVec3::new(b[0], b[2], b[4]),
            max: DVec3::new(b[1], b[3], b[5]),
        }
    }

    /// Returns the flat `[x_min, x_max, y_min, y_max, z_min, z_max]` layout.
    #[must_use]
    pub fn to_array(&self) -> [f64; 6] {
        [
            self.min.x, self.max.x, self.min.y, self.max.y, self.min.z, self.max.z,
        ]
    }

    /// Returns uninitialized bounds, which any union replaces.
    #[must_use]
    pub fn uninitialized() -> Self {
        Self {
            min: DVec3::splat(1.0),
            max: DVec3::splat(-1.0),
        }
    }

    /// Returns whether min <= max on every axis.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.min.cmple(self.max).all()
    }

    /// Geometric center.
    #[must_use]
    pub fn center(&self) -> DVec3 {
        (self.min + self.max) * 0.5
    }

    /// Extent along each axis.
    #[must_use]
    pub fn size(&self) -> DVec3 {
        self.max - self.min
    }

    /// Grows these bounds to include `other`. Invalid bounds are ignored.
    #[must_use]
    pub fn union(&self, other: &Bounds) -> Bounds {
        match (self.is_valid(), other.is_valid()) {
            (false, _) => *other,
            (true, false) => *self,
            (true, true) => Bounds::new(self.min.min(other.min), self.max.max(other.max)),
        }
    }

    /// Shrinks the bounds by `amount` on each side of each axis.
    #[must_use]
    pub fn shrink(&self, amount: DVec3) -> Bounds {
        Bounds::new(self.min + amount, self.max - amount)
    }

    /// Returns whether a point lies inside the bounds (with tolerance).
    #[must_use]
    pub fn contains(&self, point: DVec3) -> bool {
        let eps = DVec3::splat(GEOMETRY_EPSILON);
        (point + eps).cmpge(self.min).all() && (point - eps).cmple(self.max).all()
    }

    /// The eight corners, ordered x-major then y then z.
    #[must_use]
    pub fn corners(&self) -> [DVec3; 8] {
        let (a, b) = (self.min, self.max);
        [
            DVec3::new(a.x, a.y, a.z),
            DVec3::new(a.x, a.y, b.z),
            DVec3::new(a.x, b.y, a.z),
            DVec3::new(a.x, b.y, b.z),
            DVec3::new(b.x, a.y, a.z),
            DVec3::new(b.x, a.y, b.z),
            DVec3::new(b.x, b.y, a.z),
            DVec3::new(b.x, b.y, b.z),
        ]
    }

    /// The twelve cube edges built from [`Bounds::corners`].
    #[must_use]
    pub fn edges(&self) -> [(DVec3, DVec3); 12] {
        let [p1, p2, p3, p4, p5, p6, p7, p8] = self.corners();
        [
            (p1, p2),
            (p1, p5),
            (p1, p3),
            (p2, p4),
            (p2, p6),
            (p3, p4),
            (p3, p7),
            (p4, p8),
            (p5, p7),
            (p5, p6),
            (p6, p8),
            (p7, p8),
        ]
    }

    /// Bounds of the corners after applying `matrix`.
    #[must_use]
    pub fn transformed(&self, matrix: &DMat4) -> Bounds {
        let mut out = Bounds::uninitialized();
        for corner in self.corners() {
            let p = matrix.transform_point3(corner);
            out = out.union(&Bounds::new(p, p));
        }
        out
    }
}

impl Default for Bounds {
    fn default() -> Self {
        Self::uninitialized()
    }
}

/// A plane stored as `normal · x = distance`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Plane {
    /// Unit normal.
    pub normal: DVec3,
    /// Signed distance of the plane from the world origin along `normal`.
    pub distance: f64,
}

impl Plane {
    /// Creates a plane through `point` with the given normal.
    #[must_use]
    pub fn from_point_normal(point: DVec3, normal: DVec3) -> Self {
        let normal = normal.normalize_or_zero();
        Self {
            normal,
            distance: normal.dot(point),
        }
    }

    /// Signed distance from a point to the plane.
    #[must_use]
    pub fn signed_distance(&self, point: DVec3) -> f64 {
        self.normal.dot(point) - self.distance
    }

    /// Projects a point onto the plane.
    #[must_use]
    pub fn project(&self, point: DVec3) -> DVec3 {
        point - self.signed_distance(point) * self.normal
    }

    /// Intersects the infinite line through `p0` and `p1` with the plane.
    ///
    /// Returns `None` when the line is parallel to the plane.
    #[must_use]
    pub fn line_intersection(&self, p0: DVec3, p1: DVec3) -> Option<DVec3> {
        let dir = p1 - p0;
        let denom = self.normal.dot(dir);
        if denom.abs() < GEOMETRY_EPSILON * dir.length().max(1.0) {
            return None;
        }
        let t = (self.distance - self.normal.dot(p0)) / denom;
        Some(p0 + t * dir)
    }
}

/// Intersects a plane with the edges of an axis-aligned box.
///
/// Edges parallel to the plane are skipped and intersection points outside
/// the bounds are discarded. A corner on the plane is reported once even
/// though several edges meet there.
#[must_use]
pub fn plane_bounds_intersections(bounds: &Bounds, plane: &Plane) -> Vec<DVec3> {
    let tolerance = GEOMETRY_EPSILON * bounds.size().length().max(1.0);
    let mut points: Vec<DVec3> = Vec::with_capacity(6);
    for (p0, p1) in bounds.edges() {
        let Some(p) = plane.line_intersection(p0, p1) else {
            continue;
        };
        if bounds.contains(p) && !points.iter().any(|q| q.distance(p) <= tolerance) {
            points.push(p);
        }
    }
    points
}

/// Centroid of a point set, or `None` when empty.
#[must_use]
pub fn centroid(points: &[DVec3]) -> Option<DVec3> {
    if points.is_empty() {
        return None;
    }
    let sum: DVec3 = points.iter().copied().sum();
    Some(sum / points.len() as f64)
}

/// Direction pointing to the right of the screen for a camera frame.
#[must_use]
pub fn view_right(view_up: DVec3, view_plane_normal: DVec3) -> DVec3 {
    -view_up.cross(view_plane_normal)
}

/// Measures `bounds` along the camera's view-right and view-up directions.
///
/// Each pass rotates the corners so the measured direction lands on +X, then
/// takes the spread of the transformed X coordinates. Returns
/// `(width_world, height_world)`.
#[must_use]
pub fn world_distance_view_up_and_right(
    bounds: &Bounds,
    view_up: DVec3,
    view_plane_normal: DVec3,
) -> (f64, f64) {
    let right = view_right(view_up, view_plane_normal);
    let height = spread_along(bounds, view_up);
    let width = spread_along(bounds, right);
    (width, height)
}

fn spread_along(bounds: &Bounds, direction: DVec3) -> f64 {
    let Some(direction) = direction.try_normalize() else {
        return 0.0;
    };
    let rotation = DQuat::from_rotation_arc(direction, DVec3::X);
    let (min, max) = bounds
        .corners()
        .iter()
        .map(|&c| (rotation * c).x)
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), x| {
            (lo.min(x), hi.max(x))
        });
    max - min
}

/// Angle between two vectors in radians, robust to rounding outside [-1, 1].
#[must_use]
pub fn angle_between(a: DVec3, b: DVec3) -> f64 {
    let denom = a.length() * b.length();
    if denom == 0.0 {
        return 0.0;
    }
    (a.dot(b) / denom).clamp(-1.0, 1.0).acos()
}

/// Rotates `v` around `axis` by `degrees` (right-handed).
#[must_use]
pub fn rotate_about_axis(v: DVec3, axis: DVec3, degrees: f64) -> DVec3 {
    match axis.try_normalize() {
        Some(axis) => DQuat::from_axis_angle(axis, degrees.to_radians()) * v,
        None => v,
    }
}

/// Returns whether two unit vectors are parallel (or anti-parallel) within `eps`.
#[must_use]
pub fn is_parallel(a: DVec3, b: DVec3, eps: f64) -> bool {
    (1.0 - a.dot(b).abs()) < eps
}
