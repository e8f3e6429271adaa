//! Input scene model: triangle-soup models, entities, and content flags.
//!
//! The compiler consumes a [`Scene`] and annotates it in place: triangles
//! learn which areas they ended up in, models learn whether they are outside
//! the sealed hull.

use crate::aabb::Aabb;
use crate::float_types::Real;
use crate::plane::Plane;
use nalgebra::Point3;
use std::ops::{BitAnd, BitOr, BitOrAssign, BitXor, Not};

/// Content flags, a closed bitset. Contents describe what a volume bounded
/// by a surface is made of; they drive tree classification, flood fill, and
/// area assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Contents(pub u32);

impl Contents {
    pub const NONE: Contents = Contents(0);
    /// Structural solid; seals the hull and eats leaves.
    pub const SOLID: Contents = Contents(1 << 0);
    /// Visible but non-sealing detail geometry.
    pub const DETAIL: Contents = Contents(1 << 1);
    pub const FOG: Contents = Contents(1 << 2);
    pub const WATER: Contents = Contents(1 << 3);
    /// Sky surfaces; their triangles always belong to the sky area.
    pub const SKY: Contents = Contents(1 << 4);
    /// Separates two areas; blocks the area flood without being solid.
    pub const AREAPORTAL: Contents = Contents(1 << 5);
    /// Collision-only geometry, never rendered.
    pub const CLIP: Contents = Contents(1 << 6);
    /// Navigation helper geometry, never rendered.
    pub const FLOOR: Contents = Contents(1 << 7);

    /// Contents that can produce drawn faces.
    pub const VISIBLE: Contents =
        Contents(Self::SOLID.0 | Self::DETAIL.0 | Self::FOG.0 | Self::WATER.0 | Self::SKY.0);
    /// Contents that participate in sealing the hull.
    pub const STRUCTURAL: Contents = Contents(Self::SOLID.0 | Self::AREAPORTAL.0);
    /// Contents the flood fill will not pass through.
    pub const FLOOD_STOP: Contents = Contents(Self::SOLID.0);

    pub const fn intersects(self, other: Contents) -> bool {
        self.0 & other.0 != 0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// The visible content bits in ascending bit order.
    pub fn visible_bits(self) -> impl Iterator<Item = Contents> {
        (0..u32::BITS)
            .map(|i| Contents(1 << i))
            .filter(move |bit| bit.intersects(Self::VISIBLE) && bit.intersects(self))
    }

    /// The lowest visible content bit, if any.
    pub fn first_visible_bit(self) -> Option<Contents> {
        self.visible_bits().next()
    }
}

impl BitOr for Contents {
    type Output = Contents;
    fn bitor(self, rhs: Contents) -> Contents {
        Contents(self.0 | rhs.0)
    }
}

impl BitOrAssign for Contents {
    fn bitor_assign(&mut self, rhs: Contents) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for Contents {
    type Output = Contents;
    fn bitand(self, rhs: Contents) -> Contents {
        Contents(self.0 & rhs.0)
    }
}

impl BitXor for Contents {
    type Output = Contents;
    fn bitxor(self, rhs: Contents) -> Contents {
        Contents(self.0 ^ rhs.0)
    }
}

impl Not for Contents {
    type Output = Contents;
    fn not(self) -> Contents {
        Contents(!self.0)
    }
}

/// Per-triangle surface flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SurfaceFlags(pub u32);

impl SurfaceFlags {
    pub const NONE: SurfaceFlags = SurfaceFlags(0);
    /// The triangle contributes contents but is never drawn.
    pub const NO_DRAW: SurfaceFlags = SurfaceFlags(1 << 0);

    pub const fn intersects(self, other: SurfaceFlags) -> bool {
        self.0 & other.0 != 0
    }
}

/// Stable reference to a triangle: model index + triangle index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TriRef {
    pub model: usize,
    pub tri: usize,
}

/// One input triangle. `plane` faces the front (outward) side; `areas` and
/// `outside` are written by the compiler.
#[derive(Debug, Clone)]
pub struct TriFace {
    pub v: [usize; 3],
    pub plane: Plane,
    pub surface: SurfaceFlags,
    /// Filled in by the area decomposition; every area this triangle
    /// contributes a fragment to.
    pub areas: Vec<u32>,
    /// True when no fragment of the triangle reached an occupied leaf.
    pub outside: bool,
}

/// A named triangle mesh with uniform contents.
#[derive(Debug, Clone)]
pub struct TriModel {
    pub name: String,
    pub verts: Vec<Point3<Real>>,
    pub tris: Vec<TriFace>,
    pub contents: Contents,
    /// Excluded from compilation entirely.
    pub ignore: bool,
    /// Animated geometry; never decomposed into areas.
    pub cinematic: bool,
    /// Written by the compiler: the model ended up wholly outside the hull.
    pub outside: bool,
}

impl TriModel {
    pub fn new(name: impl Into<String>, contents: Contents) -> Self {
        Self {
            name: name.into(),
            verts: Vec::new(),
            tris: Vec::new(),
            contents,
            ignore: false,
            cinematic: false,
            outside: false,
        }
    }

    /// Append a triangle, computing its plane from the CCW vertex order.
    pub fn push_tri(&mut self, a: Point3<Real>, b: Point3<Real>, c: Point3<Real>) {
        self.push_tri_with(a, b, c, SurfaceFlags::NONE);
    }

    pub fn push_tri_with(
        &mut self,
        a: Point3<Real>,
        b: Point3<Real>,
        c: Point3<Real>,
        surface: SurfaceFlags,
    ) {
        let base = self.verts.len();
        let plane = Plane::from_points(&a, &b, &c);
        self.verts.extend([a, b, c]);
        self.tris.push(TriFace {
            v: [base, base + 1, base + 2],
            plane,
            surface,
            areas: Vec::new(),
            outside: false,
        });
    }

    pub fn tri_verts(&self, tri: &TriFace) -> [Point3<Real>; 3] {
        [
            self.verts[tri.v[0]],
            self.verts[tri.v[1]],
            self.verts[tri.v[2]],
        ]
    }

    pub fn bounds(&self) -> Aabb {
        let mut b = Aabb::empty();
        for v in &self.verts {
            b.insert_point(v);
        }
        b
    }
}

/// Point entity; flood fill seeds from entity origins.
#[derive(Debug, Clone)]
pub struct Entity {
    pub name: String,
    pub origin: Point3<Real>,
    /// Sky entities sit outside the hull on purpose and never seed the flood.
    pub sky: bool,
}

impl Entity {
    pub fn new(name: impl Into<String>, origin: Point3<Real>) -> Self {
        Self {
            name: name.into(),
            origin,
            sky: false,
        }
    }
}

/// The compiler's input: a set of triangle models plus the point entities.
#[derive(Debug, Clone, Default)]
pub struct Scene {
    pub models: Vec<TriModel>,
    pub entities: Vec<Entity>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tri(&self, r: TriRef) -> &TriFace {
        &self.models[r.model].tris[r.tri]
    }

    pub fn tri_mut(&mut self, r: TriRef) -> &mut TriFace {
        &mut self.models[r.model].tris[r.tri]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector3;

    #[test]
    fn visible_bits_ascend() {
        let c = Contents::SKY | Contents::SOLID | Contents::CLIP;
        let bits: Vec<Contents> = c.visible_bits().collect();
        assert_eq!(bits, vec![Contents::SOLID, Contents::SKY]);
        assert_eq!(c.first_visible_bit(), Some(Contents::SOLID));
        assert_eq!(Contents::CLIP.first_visible_bit(), None);
    }

    #[test]
    fn push_tri_computes_outward_plane() {
        let mut m = TriModel::new("floor", Contents::SOLID);
        m.push_tri(
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        );
        assert_eq!(m.tris[0].plane.normal, Vector3::z());
        assert_eq!(m.bounds().size(), Vector3::new(1.0, 1.0, 0.0));
    }
}
