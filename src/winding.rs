//! Convex polygon windings.
//!
//! A winding is an ordered loop of vertices lying in a plane, wound
//! counter-clockwise when viewed from the front (normal) side. It is the
//! transient polygon currency of the compiler: triangles become windings,
//! windings get split at node planes, and portals are windings clipped down
//! from a huge quad.

use crate::aabb::Aabb;
use crate::float_types::{AREA_EPSILON, Real};
use crate::plane::{Plane, Side};
use nalgebra::{Point3, Vector3};

#[derive(Debug, Clone, PartialEq)]
pub struct Winding {
    verts: Vec<Point3<Real>>,
    plane: Plane,
}

impl Winding {
    /// A winding with no vertices on `plane`.
    pub const fn empty_on(plane: Plane) -> Self {
        Self {
            verts: Vec::new(),
            plane,
        }
    }

    pub fn from_tri(a: Point3<Real>, b: Point3<Real>, c: Point3<Real>, plane: Plane) -> Self {
        Self {
            verts: vec![a, b, c],
            plane,
        }
    }

    pub fn from_points(verts: Vec<Point3<Real>>, plane: Plane) -> Self {
        Self { verts, plane }
    }

    /// A square winding of half-extent `size` centered on the plane's
    /// projection of the origin. Bootstrap geometry for portals.
    pub fn from_plane(plane: &Plane, size: Real) -> Self {
        let org = Point3::from(plane.normal * plane.dist);
        let (up, left) = plane.frame_vecs();
        let verts = vec![
            org + (left + up) * size,
            org + (left - up) * size,
            org + (-left - up) * size,
            org + (-left + up) * size,
        ];
        Self {
            verts,
            plane: *plane,
        }
    }

    pub fn verts(&self) -> &[Point3<Real>] {
        &self.verts
    }

    pub const fn plane(&self) -> &Plane {
        &self.plane
    }

    /// Degenerate: fewer than 3 vertices, or collapsed to ~zero area.
    pub fn empty(&self) -> bool {
        self.verts.len() < 3 || self.area() < AREA_EPSILON
    }

    /// Twice-the-fan signed area magnitude.
    pub fn area(&self) -> Real {
        if self.verts.len() < 3 {
            return 0.0;
        }
        let mut total = Vector3::zeros();
        let v0 = &self.verts[0];
        for i in 1..self.verts.len() - 1 {
            total += (self.verts[i] - v0).cross(&(self.verts[i + 1] - v0));
        }
        total.norm() * 0.5
    }

    pub fn bounds(&self) -> Aabb {
        let mut b = Aabb::empty();
        for v in &self.verts {
            b.insert_point(v);
        }
        b
    }

    pub fn center(&self) -> Point3<Real> {
        let mut p = Vector3::zeros();
        for v in &self.verts {
            p += v.coords;
        }
        Point3::from(p / self.verts.len() as Real)
    }

    pub fn flip(&mut self) {
        self.verts.reverse();
        self.plane = self.plane.flipped();
    }

    /// Classify the whole winding against `plane`: `On` only when every
    /// vertex is within `epsilon`, `Cross` when vertices fall on both sides.
    pub fn side(&self, plane: &Plane, epsilon: Real) -> Side {
        let mut front = false;
        let mut back = false;
        for v in &self.verts {
            match plane.side_point(v, epsilon) {
                Side::Front => front = true,
                Side::Back => back = true,
                _ => {}
            }
        }
        match (front, back) {
            (true, true) => Side::Cross,
            (true, false) => Side::Front,
            (false, true) => Side::Back,
            (false, false) => Side::On,
        }
    }

    /// Side of the vertex farthest from `plane`; `On` when even that vertex
    /// is within `epsilon`.
    pub fn major_side(&self, plane: &Plane, epsilon: Real) -> Side {
        let mut best: Real = 0.0;
        for v in &self.verts {
            let d = plane.distance_to(v);
            if d.abs() > best.abs() {
                best = d;
            }
        }
        if best.abs() >= epsilon {
            if best > 0.0 {
                return Side::Front;
            }
            if best < 0.0 {
                return Side::Back;
            }
        }
        Side::On
    }

    /// Split into the fragments in front of and behind `plane`. Either
    /// output may be empty; a winding entirely within `epsilon` of the plane
    /// yields two empty outputs.
    pub fn split(&self, plane: &Plane, epsilon: Real) -> (Winding, Winding) {
        let mut front = Winding::empty_on(self.plane);
        let mut back = Winding::empty_on(self.plane);

        let mut sides = Vec::with_capacity(self.verts.len());
        let mut dists = Vec::with_capacity(self.verts.len());
        let (mut num_front, mut num_back, mut num_on) = (0usize, 0usize, 0usize);

        for v in &self.verts {
            let d = plane.distance_to(v);
            let s = if d > epsilon {
                num_front += 1;
                Side::Front
            } else if d < -epsilon {
                num_back += 1;
                Side::Back
            } else {
                num_on += 1;
                Side::On
            };
            sides.push(s);
            dists.push(d);
        }

        if num_on == self.verts.len() {
            return (front, back);
        }
        if num_back == 0 {
            front.verts = self.verts.clone();
            return (front, back);
        }
        if num_front == 0 {
            back.verts = self.verts.clone();
            return (front, back);
        }

        for i in 0..self.verts.len() {
            let j = (i + 1) % self.verts.len();
            let v = &self.verts[i];

            match sides[i] {
                Side::Front => front.verts.push(*v),
                Side::Back => back.verts.push(*v),
                Side::On => {
                    front.verts.push(*v);
                    back.verts.push(*v);
                    continue;
                }
                Side::Cross => unreachable!(),
            }

            if sides[j] != Side::On && sides[j] != sides[i] {
                let mid = Plane::intersect_segment(v, dists[i], &self.verts[j], dists[j]);
                front.verts.push(mid);
                back.verts.push(mid);
            }
        }

        (front, back)
    }

    /// Keep only the fragment on `side` of `plane`.
    pub fn chop(&self, plane: &Plane, side: Side, epsilon: Real) -> Winding {
        debug_assert!(side == Side::Front || side == Side::Back);
        let (front, back) = self.split(plane, epsilon);
        if side == Side::Front { front } else { back }
    }
}
