//! Planes in 3D space and the deduplicating plane database.
//!
//! A plane is stored as a unit normal and a distance along it, so a point `p`
//! lies on the plane when `normal.dot(p) == dist`. The compiler never compares
//! raw planes; it works with indices into a [`PlaneSet`], which stores every
//! plane together with its flip at adjacent indices. That pairing makes the
//! two orientations of a surface cheap to relate: `num ^ 1` is the flipped
//! plane and `num & !1` identifies the unsigned plane.

use crate::aabb::Aabb;
use crate::float_types::{EPSILON, Real};
use nalgebra::{Point3, Vector3};

/// Classification of geometry against a plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// Entirely on the normal side.
    Front,
    /// Entirely on the anti-normal side.
    Back,
    /// Within epsilon of the plane.
    On,
    /// Straddles the plane.
    Cross,
}

/// An oriented plane: `normal.dot(p) == dist` for points on the plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    pub normal: Vector3<Real>,
    pub dist: Real,
}

impl Plane {
    pub const fn new(normal: Vector3<Real>, dist: Real) -> Self {
        Self { normal, dist }
    }

    /// Axis-aligned plane with `+axis` normal at distance `dist`.
    pub fn axis(axis: usize, dist: Real) -> Self {
        let mut normal = Vector3::zeros();
        normal[axis] = 1.0;
        Self { normal, dist }
    }

    /// Plane through three CCW points. A degenerate triangle yields the
    /// default +Z plane.
    pub fn from_points(a: &Point3<Real>, b: &Point3<Real>, c: &Point3<Real>) -> Self {
        let n = (b - a).cross(&(c - a));
        let len = n.norm();
        if len < EPSILON {
            return Self::axis(2, 0.0);
        }
        let normal = n / len;
        Self {
            normal,
            dist: normal.dot(&a.coords),
        }
    }

    pub fn flipped(&self) -> Self {
        Self {
            normal: -self.normal,
            dist: -self.dist,
        }
    }

    /// Signed distance from `p` to the plane; positive in front.
    pub fn distance_to(&self, p: &Point3<Real>) -> Real {
        self.normal.dot(&p.coords) - self.dist
    }

    pub fn side_point(&self, p: &Point3<Real>, epsilon: Real) -> Side {
        let d = self.distance_to(p);
        if d > epsilon {
            Side::Front
        } else if d < -epsilon {
            Side::Back
        } else {
            Side::On
        }
    }

    /// Classify a bounding box. `On` is only returned for a degenerate flat
    /// box lying in the plane; a straddling box is `Cross`.
    pub fn side_bounds(&self, bounds: &Aabb, epsilon: Real) -> Side {
        let center = bounds.center();
        let half = bounds.size() * 0.5;
        let radius =
            self.normal.x.abs() * half.x + self.normal.y.abs() * half.y + self.normal.z.abs() * half.z;
        let d = self.distance_to(&center);
        if d - radius > epsilon {
            Side::Front
        } else if d + radius < -epsilon {
            Side::Back
        } else if radius <= epsilon && d.abs() <= epsilon {
            Side::On
        } else {
            Side::Cross
        }
    }

    /// Intersection of the segment `a -> b` with the plane, given the signed
    /// distances of the endpoints. The caller guarantees the segment crosses.
    pub fn intersect_segment(
        a: &Point3<Real>,
        da: Real,
        b: &Point3<Real>,
        db: Real,
    ) -> Point3<Real> {
        let t = da / (da - db);
        a + (b - a) * t
    }

    /// Two unit vectors spanning the plane. The up axis is projected from
    /// world Z (or world Y when the normal is mostly vertical).
    pub fn frame_vecs(&self) -> (Vector3<Real>, Vector3<Real>) {
        let mut up = if self.normal.z.abs() > self.normal.x.abs()
            && self.normal.z.abs() > self.normal.y.abs()
        {
            Vector3::y()
        } else {
            Vector3::z()
        };
        up -= self.normal * up.dot(&self.normal);
        up.normalize_mut();
        let left = up.cross(&self.normal);
        (up, left)
    }

    fn nearly_equal(&self, other: &Plane, normal_epsilon: Real, dist_epsilon: Real) -> bool {
        (self.dist - other.dist).abs() <= dist_epsilon
            && (self.normal.x - other.normal.x).abs() <= normal_epsilon
            && (self.normal.y - other.normal.y).abs() <= normal_epsilon
            && (self.normal.z - other.normal.z).abs() <= normal_epsilon
    }
}

/// Deduplicating plane database with paired orientation storage.
///
/// Every insertion stores the plane at an even index and its flip at the
/// following odd index, so `num ^ 1` flips a plane number and `num & !1` maps
/// both orientations to a canonical unsigned plane. Indices are stable; the
/// database only grows.
#[derive(Debug, Clone)]
pub struct PlaneSet {
    planes: Vec<Plane>,
    normal_epsilon: Real,
    dist_epsilon: Real,
}

impl PlaneSet {
    pub const fn new(normal_epsilon: Real, dist_epsilon: Real) -> Self {
        Self {
            planes: Vec::new(),
            normal_epsilon,
            dist_epsilon,
        }
    }

    /// Find or insert `plane`, returning its number. The returned number
    /// refers to the queried orientation; `num ^ 1` is the flip.
    pub fn find_plane_num(&mut self, plane: &Plane) -> u32 {
        let len = plane.normal.norm();
        debug_assert!(len > 0.0, "plane with zero normal");
        let plane = Plane {
            normal: plane.normal / len,
            dist: plane.dist / len,
        };

        for (i, candidate) in self.planes.iter().enumerate() {
            if candidate.nearly_equal(&plane, self.normal_epsilon, self.dist_epsilon) {
                return i as u32;
            }
        }

        let num = self.planes.len() as u32;
        self.planes.push(plane);
        self.planes.push(plane.flipped());
        num
    }

    pub fn plane(&self, num: u32) -> &Plane {
        &self.planes[num as usize]
    }

    pub fn len(&self) -> usize {
        self.planes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.planes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plane_set() -> PlaneSet {
        PlaneSet::new(1e-5, 0.01)
    }

    #[test]
    fn paired_insertion() {
        let mut set = plane_set();
        let num = set.find_plane_num(&Plane::axis(0, 16.0));
        assert_eq!(num, 0);
        assert_eq!(set.len(), 2);

        // the flip lands at num ^ 1
        let flip = set.find_plane_num(&Plane::new(-Vector3::x(), -16.0));
        assert_eq!(flip, num ^ 1);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn epsilon_dedup() {
        let mut set = plane_set();
        let a = set.find_plane_num(&Plane::axis(1, 8.0));
        let b = set.find_plane_num(&Plane::new(Vector3::new(1e-7, 1.0, 0.0), 8.004));
        assert_eq!(a, b);
    }

    #[test]
    fn distinct_planes_get_distinct_numbers() {
        let mut set = plane_set();
        let a = set.find_plane_num(&Plane::axis(2, 0.0));
        let b = set.find_plane_num(&Plane::axis(2, 64.0));
        assert_ne!(a & !1, b & !1);
    }

    #[test]
    fn query_orientation_is_preserved() {
        let mut set = plane_set();
        let num = set.find_plane_num(&Plane::new(-Vector3::z(), 4.0));
        assert_eq!(set.plane(num).normal, -Vector3::z());
        assert_eq!(set.plane(num ^ 1).normal, Vector3::z());
    }

    #[test]
    fn unnormalized_input_is_normalized() {
        let mut set = plane_set();
        let a = set.find_plane_num(&Plane::new(Vector3::new(2.0, 0.0, 0.0), 8.0));
        let b = set.find_plane_num(&Plane::axis(0, 4.0));
        assert_eq!(a, b);
    }

    #[test]
    fn side_point_classification() {
        let p = Plane::axis(2, 4.0);
        assert_eq!(p.side_point(&Point3::new(0.0, 0.0, 5.0), 0.01), Side::Front);
        assert_eq!(p.side_point(&Point3::new(0.0, 0.0, 3.0), 0.01), Side::Back);
        assert_eq!(p.side_point(&Point3::new(7.0, -2.0, 4.005), 0.01), Side::On);
    }

    #[test]
    fn side_bounds_classification() {
        let p = Plane::axis(0, 0.0);
        let front = Aabb::new(Point3::new(1.0, 0.0, 0.0), Point3::new(2.0, 1.0, 1.0));
        let back = Aabb::new(Point3::new(-2.0, 0.0, 0.0), Point3::new(-1.0, 1.0, 1.0));
        let cross = Aabb::new(Point3::new(-1.0, 0.0, 0.0), Point3::new(1.0, 1.0, 1.0));
        assert_eq!(p.side_bounds(&front, 0.0), Side::Front);
        assert_eq!(p.side_bounds(&back, 0.0), Side::Back);
        assert_eq!(p.side_bounds(&cross, 0.0), Side::Cross);
    }
}
