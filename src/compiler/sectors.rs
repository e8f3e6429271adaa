//! Sector subdivision.
//!
//! Sectors chop each area's renderable triangles into axis-aligned buckets
//! no larger than the configured extent, recursively bisecting oversized
//! bounds at their center and discarding empty halves. Triangles shared by
//! more than one area are gathered separately into shared sectors; every
//! surviving sector registers with each area its triangles touch.

use super::{BspBuilder, Sector, SectorPoly};
use crate::aabb::Aabb;
use crate::errors::CompileError;
use crate::plane::{Plane, Side};
use crate::scene::{Contents, Scene, SurfaceFlags, TriRef};
use crate::winding::Winding;
use tracing::info;

impl BspBuilder {
    /// Build all area and shared sectors.
    pub(crate) fn build_sectors(&mut self, scene: &Scene) -> Result<(), CompileError> {
        info!("sectorizing");
        self.stats.num_sectors = 0;
        self.stats.num_shared_sectors = 0;

        for area_idx in 0..self.areas.len() {
            self.build_area_sectors(area_idx, scene)?;
        }
        self.build_shared_sectors(scene);

        info!(
            sectors = self.stats.num_sectors,
            shared = self.stats.num_shared_sectors,
            "sectors built"
        );
        Ok(())
    }

    /// Seed one root sector from the triangles exclusive to this area and
    /// subdivide it.
    fn build_area_sectors(&mut self, area_idx: usize, scene: &Scene) -> Result<(), CompileError> {
        let mut bounds = Aabb::empty();
        let mut root = Sector::new(Aabb::empty());
        root.areas.push(self.areas[area_idx].id);

        for &tri_ref in &self.areas[area_idx].tris {
            let tri = scene.tri(tri_ref);
            debug_assert!(
                !scene.models[tri_ref.model]
                    .contents
                    .intersects(Contents::AREAPORTAL)
            );

            if tri.surface.intersects(SurfaceFlags::NO_DRAW) {
                continue;
            }

            // tris shared with other areas go to the shared sectors instead
            if tri.areas.len() != 1 {
                continue;
            }

            let model = &scene.models[tri_ref.model];
            let [a, b, c] = model.tri_verts(tri);
            bounds.insert_point(&a);
            bounds.insert_point(&b);
            bounds.insert_point(&c);

            root.polys.push(SectorPoly {
                tri: tri_ref,
                winding: Winding::from_tri(a, b, c, tri.plane),
            });
        }

        self.areas[area_idx].bounds = bounds;
        root.bounds = bounds;

        if !bounds.is_empty() {
            let size = bounds.size();
            for i in 0..3 {
                if size[i] > self.options.max_range {
                    return Err(CompileError::AreaTooLarge {
                        area: self.areas[area_idx].id,
                        size_x: size.x,
                        size_y: size.y,
                        size_z: size.z,
                        max: self.options.max_range,
                    });
                }
            }
        }

        self.subdivide_sector(root, scene);
        Ok(())
    }

    /// Gather every triangle spanning multiple areas into one root sector
    /// and subdivide it.
    fn build_shared_sectors(&mut self, scene: &Scene) {
        let mut root = Sector::new(Aabb::empty());

        for (mi, model) in scene.models.iter().enumerate() {
            if model.ignore {
                continue;
            }
            if !model.contents.intersects(Contents::VISIBLE) {
                continue;
            }
            if model.contents.intersects(Contents::AREAPORTAL) {
                continue;
            }

            for (ti, tri) in model.tris.iter().enumerate() {
                if tri.surface.intersects(SurfaceFlags::NO_DRAW) {
                    continue;
                }
                if tri.areas.len() < 2 {
                    continue;
                }

                let [a, b, c] = model.tri_verts(tri);
                root.bounds.insert_point(&a);
                root.bounds.insert_point(&b);
                root.bounds.insert_point(&c);

                root.polys.push(SectorPoly {
                    tri: TriRef { model: mi, tri: ti },
                    winding: Winding::from_tri(a, b, c, tri.plane),
                });
            }
        }

        self.subdivide_sector(root, scene);
    }

    /// Recursively bisect any axis exceeding the sector extent at the
    /// bounds center, dropping empty halves. Terminal sectors register with
    /// every area their triangles touch.
    fn subdivide_sector(&mut self, sector: Sector, scene: &Scene) {
        if !sector.bounds.is_empty() {
            let size = sector.bounds.size();
            for axis in 0..3 {
                if size[axis] > self.options.max_sector_extent {
                    let mid = sector.bounds.center()[axis];
                    let plane = Plane::axis(axis, mid);

                    let mut front_bounds = sector.bounds;
                    front_bounds.mins[axis] = mid;
                    let mut back_bounds = sector.bounds;
                    back_bounds.maxs[axis] = mid;

                    let (front, back) = split_sector(&plane, sector, front_bounds, back_bounds);

                    if front.polys.is_empty() {
                        self.subdivide_sector(back, scene);
                    } else if back.polys.is_empty() {
                        self.subdivide_sector(front, scene);
                    } else {
                        self.subdivide_sector(front, scene);
                        self.subdivide_sector(back, scene);
                    }
                    return;
                }
            }
        }

        if sector.polys.is_empty() {
            return;
        }

        let mut sector = sector;

        // areas were filled in by the decomposition pass
        for poly in &sector.polys {
            for &area in &scene.tri(poly.tri).areas {
                if !sector.areas.contains(&area) {
                    sector.areas.push(area);
                }
            }
        }

        if sector.areas.len() > 1 {
            self.stats.num_shared_sectors += 1;
        } else {
            self.stats.num_sectors += 1;
        }

        let idx = self.sectors.len();
        for &area in &sector.areas {
            self.areas[area as usize].sectors.push(idx);
        }
        self.sectors.push(sector);
    }
}

/// Split a sector's polys at `plane`. Windings well to one side keep their
/// triangle whole; straddlers are split with both halves kept; a winding on
/// the plane goes to its major side, falling back to the normal tie-break.
fn split_sector(
    plane: &Plane,
    mut sector: Sector,
    front_bounds: Aabb,
    back_bounds: Aabb,
) -> (Sector, Sector) {
    let mut front = Sector::new(front_bounds);
    let mut back = Sector::new(back_bounds);

    for poly in sector.polys.drain(..) {
        match poly.winding.side(plane, 1.0) {
            Side::Front => front.polys.push(poly),
            Side::Back => back.polys.push(poly),
            Side::Cross => {
                let (f, b) = poly.winding.split(plane, 0.0);
                if !f.empty() {
                    front.polys.push(SectorPoly {
                        tri: poly.tri,
                        winding: f,
                    });
                }
                if !b.empty() {
                    back.polys.push(SectorPoly {
                        tri: poly.tri,
                        winding: b,
                    });
                }
            }
            Side::On => match poly.winding.major_side(plane, 0.0) {
                Side::Front => front.polys.push(poly),
                Side::Back => back.polys.push(poly),
                _ => {
                    if plane.normal.dot(&poly.winding.plane().normal) > 0.0 {
                        front.polys.push(poly);
                    } else {
                        back.polys.push(poly);
                    }
                }
            },
        }
    }

    (front, back)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::float_types::Real;
    use nalgebra::Point3;

    fn quad_poly(x0: Real, x1: Real) -> SectorPoly {
        let plane = Plane::axis(2, 0.0);
        SectorPoly {
            tri: TriRef { model: 0, tri: 0 },
            winding: Winding::from_points(
                vec![
                    Point3::new(x0, 0.0, 0.0),
                    Point3::new(x1, 0.0, 0.0),
                    Point3::new(x1, 64.0, 0.0),
                    Point3::new(x0, 64.0, 0.0),
                ],
                plane,
            ),
        }
    }

    #[test]
    fn split_sector_routes_sides() {
        let mut sector = Sector::new(Aabb::new(
            Point3::new(-128.0, 0.0, 0.0),
            Point3::new(128.0, 64.0, 0.0),
        ));
        sector.polys.push(quad_poly(-128.0, -8.0));
        sector.polys.push(quad_poly(8.0, 128.0));
        sector.polys.push(quad_poly(-64.0, 64.0));

        let plane = Plane::axis(0, 0.0);
        let (front, back) = split_sector(
            &plane,
            sector,
            Aabb::new(Point3::new(0.0, 0.0, 0.0), Point3::new(128.0, 64.0, 0.0)),
            Aabb::new(Point3::new(-128.0, 0.0, 0.0), Point3::new(0.0, 64.0, 0.0)),
        );

        // one whole quad each side plus half of the straddler
        assert_eq!(front.polys.len(), 2);
        assert_eq!(back.polys.len(), 2);
    }

    #[test]
    fn on_plane_poly_uses_normal_tie_break() {
        let split = Plane::axis(2, 0.0);
        let mut sector = Sector::new(Aabb::new(
            Point3::new(-8.0, -8.0, -8.0),
            Point3::new(8.0, 8.0, 8.0),
        ));

        // coplanar with the split plane, normal agreeing: front
        let plane = Plane::axis(2, 0.0);
        sector.polys.push(SectorPoly {
            tri: TriRef { model: 0, tri: 0 },
            winding: Winding::from_plane(&plane, 4.0),
        });

        let (front, back) = split_sector(&split, sector, Aabb::empty(), Aabb::empty());
        assert_eq!(front.polys.len(), 1);
        assert!(back.polys.is_empty());
    }
}
