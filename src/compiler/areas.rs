//! Area flood and triangle decomposition.
//!
//! Areas are the renderer's unit of visibility: connected regions of
//! non-solid leaves, separated by solid contents and by areaportal leaves.
//! Area 0 is reserved for sky. Once leaves know their areas, every visible
//! triangle is threaded down the tree and recorded in each area one of its
//! fragments reached.

use super::{Area, BspBuilder, NodeId, Progress};
use crate::aabb::Aabb;
use crate::errors::CompileError;
use crate::plane::{Plane, Side};
use crate::scene::{Contents, Scene, SurfaceFlags, TriRef};
use crate::winding::Winding;
use tracing::{debug, info, warn};

/// A triangle fragment being threaded down the tree. Owned; splitting
/// consumes the parent and recurses with the two halves.
#[derive(Debug, Clone)]
pub(crate) struct AreaPoly {
    pub tri: TriRef,
    pub plane: Plane,
    pub winding: Winding,
}

impl BspBuilder {
    /// Flood leaves into areas. Area 0 is reserved for sky.
    pub(crate) fn area_flood(&mut self) -> Result<(), CompileError> {
        info!("area flood");

        self.areas.push(Area {
            id: 0,
            bounds: Aabb::empty(),
            tris: Vec::new(),
            models: Vec::new(),
            sectors: Vec::new(),
        });

        let root = self.root_id();
        self.find_areas(root);

        if self.areas.len() > self.options.max_areas {
            return Err(CompileError::TooManyAreas {
                count: self.areas.len(),
                max: self.options.max_areas,
            });
        }

        self.stats.num_areas = self.areas.len();
        info!(areas = self.areas.len(), "areas set");
        Ok(())
    }

    fn find_areas(&mut self, node: NodeId) {
        if !self.node(node).is_leaf() {
            let [front, back] = self.node(node).children;
            if let Some(front) = front {
                self.find_areas(front);
            }
            if let Some(back) = back {
                self.find_areas(back);
            }
            return;
        }

        let leaf = self.node(node);
        if leaf.area.is_some() {
            return;
        }
        if self.flood && leaf.occupied == 0 {
            return;
        }
        if leaf.contents.intersects(Contents::SOLID) {
            return;
        }
        if leaf.contents.intersects(Contents::AREAPORTAL) {
            return;
        }

        let id = self.areas.len() as u32;
        self.areas.push(Area {
            id,
            bounds: Aabb::empty(),
            tris: Vec::new(),
            models: Vec::new(),
            sectors: Vec::new(),
        });
        self.area_flood_leaf(node, id);
    }

    /// Flood `area` outward from `leaf` through portals, stopping at solid
    /// contents. An areaportal leaf records the area on one of its two
    /// sides and does not pass the flood along.
    fn area_flood_leaf(&mut self, leaf: NodeId, area: u32) {
        debug_assert!(self.node(leaf).is_leaf());
        debug_assert!(!self.node(leaf).contents.intersects(Contents::SOLID));

        if self.node(leaf).contents.intersects(Contents::AREAPORTAL) {
            let n = self.node_mut(leaf);
            if n.area.is_none() {
                n.area = Some(area);
                n.portal_areas[0] = Some(area);
            } else if n.area != Some(area) {
                if n.portal_areas[1].is_none() {
                    n.portal_areas[1] = Some(area);
                } else if n.portal_areas[1] != Some(area) && !n.area_warned {
                    n.area_warned = true;
                    let first = n.portal_areas[0];
                    let second = n.portal_areas[1];
                    warn!(
                        ?first,
                        ?second,
                        third = area,
                        "areaportal touches more than 2 areas, map will not render correctly"
                    );
                }
            }
            return;
        }

        if self.node(leaf).area.is_some() {
            return;
        }
        self.node_mut(leaf).area = Some(area);

        for (id, side) in self.leaf_portals(leaf) {
            let Some(other) = self.portal(id).nodes[side ^ 1] else {
                continue;
            };
            if self.node(other).contents.intersects(Contents::FLOOD_STOP) {
                continue;
            }
            self.area_flood_leaf(other, area);
        }
    }

    /// Decompose every compilable model's triangles into areas.
    pub(crate) fn compile_areas(&mut self, scene: &mut Scene, progress: &mut dyn Progress) {
        info!("compiling areas");
        self.stats.num_inside_tris = 0;
        self.stats.num_outside_tris = 0;
        self.stats.num_nodraw_tris = 0;
        self.stats.num_inside_models = 0;
        self.stats.num_outside_models = 0;

        progress.begin("Compiling models", scene.models.len());
        for mi in 0..scene.models.len() {
            if scene.models[mi].ignore || scene.models[mi].cinematic {
                progress.step();
                continue;
            }
            self.decompose_area_model(scene, mi);
            progress.step();
        }

        info!(
            inside_models = self.stats.num_inside_models,
            outside_models = self.stats.num_outside_models,
            inside_tris = self.stats.num_inside_tris,
            outside_tris = self.stats.num_outside_tris,
            "decomposition done"
        );
    }

    /// Thread one model's triangles down the tree, assigning areas.
    pub(crate) fn decompose_area_model(&mut self, scene: &mut Scene, model_idx: usize) {
        let contents = scene.models[model_idx].contents;
        if contents.intersects(Contents::AREAPORTAL | Contents::CLIP | Contents::FLOOR) {
            return;
        }

        let solid = contents.intersects(Contents::SOLID);

        if self.flood && solid && scene.models[model_idx].outside {
            self.stats.num_outside_models += 1;
            self.stats.num_outside_tris += scene.models[model_idx].tris.len();
            return;
        }

        let mut found_area = false;

        for ti in 0..scene.models[model_idx].tris.len() {
            let tri_ref = TriRef {
                model: model_idx,
                tri: ti,
            };
            {
                let model = &scene.models[model_idx];
                let tri = &model.tris[ti];
                if tri.outside {
                    self.stats.num_outside_tris += 1;
                    continue;
                }
                if tri.surface.intersects(SurfaceFlags::NO_DRAW) {
                    self.stats.num_nodraw_tris += 1;
                    continue;
                }
            }

            let model = &scene.models[model_idx];
            let tri = &model.tris[ti];
            let [a, b, c] = model.tri_verts(tri);
            let poly = AreaPoly {
                tri: tri_ref,
                plane: tri.plane,
                winding: Winding::from_tri(a, b, c, tri.plane),
            };
            let root = self.root_id();
            self.decompose_area_poly(root, poly, scene);

            if scene.tri(tri_ref).areas.is_empty() {
                self.stats.num_outside_tris += 1;
            } else {
                found_area = true;
                self.stats.num_inside_tris += 1;
            }
        }

        if !found_area {
            scene.models[model_idx].outside = true;
            if !solid {
                warn!(
                    model = %scene.models[model_idx].name,
                    "model has no visible surfaces inside hull"
                );
            }
        }

        if scene.models[model_idx].outside {
            self.stats.num_outside_models += 1;
        } else {
            self.stats.num_inside_models += 1;
        }
    }

    /// Thread a polygon down the tree. Sky triangles always belong to area
    /// 0; other fragments land in the area of whatever (occupied) leaf they
    /// reach. A fragment on a node plane follows the tie-break: normals
    /// agreeing with the node plane go front.
    fn decompose_area_poly(&mut self, node: NodeId, poly: AreaPoly, scene: &mut Scene) {
        if scene.models[poly.tri.model].contents.intersects(Contents::SKY) {
            self.assign_tri_to_area(scene, poly.tri, 0);
            return;
        }

        let Some(planenum) = self.node(node).planenum else {
            let occupied = self.node(node).occupied;
            let area = self.node(node).area;
            if !self.flood || occupied != 0 {
                if let Some(area) = area {
                    self.assign_tri_to_area(scene, poly.tri, area);
                }
            }
            return;
        };

        let plane = *self.planes.plane(planenum);
        let mut s = poly.winding.side(&plane, 0.0);
        if s == Side::On {
            s = if poly.plane.normal.dot(&plane.normal) > 0.0 {
                Side::Front
            } else {
                Side::Back
            };
        }

        let [front, back] = match self.node(node).children {
            [Some(f), Some(b)] => [f, b],
            _ => return,
        };

        match s {
            Side::Front => self.decompose_area_poly(front, poly, scene),
            Side::Back => self.decompose_area_poly(back, poly, scene),
            Side::Cross | Side::On => {
                let (f, b) = poly.winding.split(&plane, 0.0);

                if f.empty() && b.empty() {
                    warn!("triangle clipped away during area decomposition");
                }

                if !f.empty() {
                    let mut fragment = poly.clone();
                    fragment.winding = f;
                    self.decompose_area_poly(front, fragment, scene);
                }
                if !b.empty() {
                    let mut fragment = poly;
                    fragment.winding = b;
                    self.decompose_area_poly(back, fragment, scene);
                }
            }
        }
    }

    /// Record `tri` in `area` idempotently and mark its model inside.
    fn assign_tri_to_area(&mut self, scene: &mut Scene, tri: TriRef, area: u32) {
        let face = scene.tri_mut(tri);
        if !face.areas.contains(&area) {
            face.areas.push(area);
            let a = &mut self.areas[area as usize];
            a.tris.push(tri);
            if !a.models.contains(&tri.model) {
                a.models.push(tri.model);
            }
            debug!(area, model = tri.model, tri = tri.tri, "tri assigned");
        }
        scene.models[tri.model].outside = false;
    }
}
