//! Axis-aligned bounding boxes.

use crate::float_types::Real;
use nalgebra::{Point3, Vector3};

/// Axis-Aligned Bounding Box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub mins: Point3<Real>,
    pub maxs: Point3<Real>,
}

impl Aabb {
    pub const fn new(mins: Point3<Real>, maxs: Point3<Real>) -> Self {
        Self { mins, maxs }
    }

    /// An inverted box that any insertion will overwrite.
    pub fn empty() -> Self {
        Self {
            mins: Point3::new(Real::MAX, Real::MAX, Real::MAX),
            maxs: Point3::new(-Real::MAX, -Real::MAX, -Real::MAX),
        }
    }

    /// True until the first insertion.
    pub fn is_empty(&self) -> bool {
        self.mins.x > self.maxs.x
    }

    pub fn insert_point(&mut self, p: &Point3<Real>) {
        for i in 0..3 {
            self.mins[i] = self.mins[i].min(p[i]);
            self.maxs[i] = self.maxs[i].max(p[i]);
        }
    }

    pub fn insert(&mut self, other: &Aabb) {
        if other.is_empty() {
            return;
        }
        self.insert_point(&other.mins);
        self.insert_point(&other.maxs);
    }

    pub fn expand(&mut self, pad: Real) {
        self.mins -= Vector3::new(pad, pad, pad);
        self.maxs += Vector3::new(pad, pad, pad);
    }

    pub fn size(&self) -> Vector3<Real> {
        self.maxs - self.mins
    }

    pub fn center(&self) -> Point3<Real> {
        self.mins + (self.maxs - self.mins) * 0.5
    }
}

impl Default for Aabb {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_size() {
        let mut b = Aabb::empty();
        assert!(b.is_empty());
        b.insert_point(&Point3::new(-1.0, 2.0, 3.0));
        b.insert_point(&Point3::new(4.0, -5.0, 6.0));
        assert!(!b.is_empty());
        assert_eq!(b.size(), Vector3::new(5.0, 7.0, 3.0));
        assert_eq!(b.center(), Point3::new(1.5, -1.5, 4.5));
    }

    #[test]
    fn expand_pads_all_axes() {
        let mut b = Aabb::new(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 1.0, 1.0));
        b.expand(32.0);
        assert_eq!(b.mins, Point3::new(-32.0, -32.0, -32.0));
        assert_eq!(b.maxs, Point3::new(33.0, 33.0, 33.0));
    }
}
