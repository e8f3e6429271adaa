//! BSP tree construction.
//!
//! The tree is built by recursively picking a splitting plane from the
//! polygons resident in a node and pushing model fragments down both sides.
//! A polygon coplanar with the node plane is marked `on_node` and routed to
//! the back child; its flipped twin goes to the front child. Recursion stops
//! when no candidate plane remains, and the leaf's contents are derived from
//! the fragments that reached it.

use super::{BspBuilder, ModelFrag, NodeId, Poly};
use crate::aabb::Aabb;
use crate::float_types::Real;
use crate::plane::{Plane, Side};
use crate::scene::{Contents, Scene, TriRef};
use crate::winding::Winding;
use tracing::debug;

impl BspBuilder {
    /// Gather every non-ignored model into a single root node.
    pub(crate) fn create_root(&mut self, scene: &Scene) {
        debug_assert!(self.root.is_none());

        let root = self.alloc_node();

        for (mi, model) in scene.models.iter().enumerate() {
            if model.ignore {
                continue;
            }

            if model.contents.intersects(Contents::STRUCTURAL) {
                self.stats.num_structural_tris += model.tris.len();
            } else {
                self.stats.num_detail_tris += model.tris.len();
            }

            if model.tris.is_empty() {
                continue;
            }

            let mut frag = ModelFrag {
                original: mi,
                contents: model.contents,
                polys: Vec::with_capacity(model.tris.len()),
                bounds: model.bounds(),
            };

            for (ti, tri) in model.tris.iter().enumerate() {
                let planenum = self.planes.find_plane_num(&tri.plane);
                let [a, b, c] = model.tri_verts(tri);
                frag.polys.push(Poly {
                    original: TriRef { model: mi, tri: ti },
                    winding: Winding::from_tri(a, b, c, *self.planes.plane(planenum)),
                    planenum,
                    contents: model.contents,
                    on_node: false,
                });
            }

            self.node_mut(root).bounds.insert(&frag.bounds);
            self.node_mut(root).models.push(frag);
        }

        self.root = Some(root);
    }

    /// Recursively split `node` until no candidate plane remains.
    pub(crate) fn split_node(&mut self, node: NodeId, scene: &Scene) {
        let Some(planenum) = self.find_split_plane(node, scene) else {
            self.leaf_node(node);
            return;
        };

        #[cfg(debug_assertions)]
        {
            let mut parent = self.node(node).parent;
            while let Some(p) = parent {
                debug_assert!(self.node(p).planenum != Some(planenum));
                parent = self.node(p).parent;
            }
        }

        self.node_mut(node).planenum = Some(planenum);
        self.stats.num_nodes += 1;
        if self.stats.num_nodes % 1000 == 0 {
            debug!(nodes = self.stats.num_nodes, "splitting");
        }

        let plane = *self.planes.plane(planenum);

        let front = self.alloc_node();
        let back = self.alloc_node();
        self.node_mut(front).parent = Some(node);
        self.node_mut(back).parent = Some(node);
        self.node_mut(node).children = [Some(front), Some(back)];

        let mut models = std::mem::take(&mut self.node_mut(node).models);
        for mut frag in models.drain(..) {
            let s = plane.side_bounds(&frag.bounds, 0.0);
            let on_node = mark_node_polys(planenum, &mut frag);

            if on_node || s == Side::Cross || s == Side::On {
                let (f, b) = split_model_frag(frag, &plane, planenum, self.options.split_epsilon);
                if let Some(f) = f {
                    self.node_mut(front).bounds.insert(&f.bounds);
                    self.node_mut(front).models.push(f);
                }
                if let Some(b) = b {
                    self.node_mut(back).bounds.insert(&b.bounds);
                    self.node_mut(back).models.push(b);
                }
            } else {
                let child = if s == Side::Front { front } else { back };
                self.node_mut(child).bounds.insert(&frag.bounds);
                self.node_mut(child).models.push(frag);
            }
        }

        self.split_node(front, scene);
        self.split_node(back, scene);
    }

    /// Make `node` a leaf and derive its contents: a solid model whose every
    /// poly landed on a node plane seals the leaf solid; non-solid models OR
    /// their contents in.
    pub(crate) fn leaf_node(&mut self, node: NodeId) {
        self.stats.num_leafs += 1;

        let mut contents = Contents::NONE;
        for frag in &self.node(node).models {
            if frag.contents == Contents::SOLID {
                if frag.polys.iter().all(|p| p.on_node) {
                    contents = Contents::SOLID;
                    break;
                }
            } else {
                contents |= frag.contents;
            }
        }

        let n = self.node_mut(node);
        n.planenum = None;
        n.contents = contents;
    }

    /// Pick the best splitting plane for `node`, or `None` for a leaf.
    ///
    /// Candidates are the unsigned planes of polys not yet on a node,
    /// considered one visible contents bit at a time; the first bit that
    /// yields any candidate wins. Cost is the axial imbalance of whole model
    /// fragments. After a flood fill, outside polys are only considered when
    /// no inside poly produced a candidate.
    pub(crate) fn find_split_plane(&self, node: NodeId, scene: &Scene) -> Option<u32> {
        let n = self.node(node);
        if n.models.is_empty() {
            return None;
        }

        let mut best: Option<(u32, i64)> = None;

        for outside_pass in 0..=1 {
            for contents in Contents::VISIBLE.visible_bits() {
                for frag in &n.models {
                    for poly in &frag.polys {
                        if poly.on_node {
                            continue;
                        }
                        if !poly.contents.intersects(contents) {
                            continue;
                        }
                        if self.flood && scene.tri(poly.original).outside && outside_pass == 0 {
                            continue;
                        }

                        let planenum = poly.planenum & !1;
                        let plane = self.planes.plane(planenum);

                        let mut front = 0i64;
                        let mut back = 0i64;
                        for test in &n.models {
                            match plane.side_bounds(&test.bounds, 0.0) {
                                Side::Front => front += test.polys.len() as i64,
                                Side::Back => back += test.polys.len() as i64,
                                _ => {}
                            }
                        }

                        let val = (front - back).abs();
                        if best.is_none_or(|(_, best_val)| val < best_val) {
                            best = Some((planenum, val));
                        }
                    }
                }

                if best.is_some() {
                    break;
                }
            }

            if !self.flood {
                break;
            }
            if best.is_some() {
                break;
            }
        }

        best.map(|(num, _)| num)
    }
}

/// Mark polys whose plane (either orientation) matches the node plane.
fn mark_node_polys(planenum: u32, frag: &mut ModelFrag) -> bool {
    let mut any = false;
    for poly in &mut frag.polys {
        if poly.planenum == planenum || poly.planenum ^ 1 == planenum {
            poly.on_node = true;
            any = true;
        }
    }
    any
}

/// Split a model fragment at the node plane. Coplanar polys route to the
/// back child, flipped coplanar polys to the front child; a poly whose both
/// split outputs are empty is a sliver and is dropped.
fn split_model_frag(
    frag: ModelFrag,
    plane: &Plane,
    planenum: u32,
    epsilon: Real,
) -> (Option<ModelFrag>, Option<ModelFrag>) {
    let mut front = ModelFrag {
        original: frag.original,
        contents: frag.contents,
        polys: Vec::new(),
        bounds: Aabb::empty(),
    };
    let mut back = ModelFrag {
        original: frag.original,
        contents: frag.contents,
        polys: Vec::new(),
        bounds: Aabb::empty(),
    };

    for poly in frag.polys {
        if poly.planenum == planenum {
            debug_assert!(poly.on_node);
            back.bounds.insert(&poly.winding.bounds());
            back.polys.push(poly);
        } else if poly.planenum ^ 1 == planenum {
            debug_assert!(poly.on_node);
            front.bounds.insert(&poly.winding.bounds());
            front.polys.push(poly);
        } else {
            let (f, b) = poly.winding.split(plane, epsilon);
            // both empty: a sliver too small to keep on either side
            if !f.empty() {
                front.bounds.insert(&f.bounds());
                front.polys.push(Poly {
                    winding: f,
                    ..poly.clone()
                });
            }
            if !b.empty() {
                back.bounds.insert(&b.bounds());
                back.polys.push(Poly { winding: b, ..poly });
            }
        }
    }

    (
        (!front.polys.is_empty()).then_some(front),
        (!back.polys.is_empty()).then_some(back),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point3;

    fn poly_on(planenum: u32, plane: Plane) -> Poly {
        Poly {
            original: TriRef { model: 0, tri: 0 },
            winding: Winding::from_plane(&plane, 8.0),
            planenum,
            contents: Contents::SOLID,
            on_node: false,
        }
    }

    #[test]
    fn coplanar_polys_route_by_orientation() {
        let plane = Plane::axis(0, 0.0);
        let frag = ModelFrag {
            original: 0,
            contents: Contents::SOLID,
            polys: vec![
                {
                    let mut p = poly_on(0, plane);
                    p.on_node = true;
                    p
                },
                {
                    let mut p = poly_on(1, plane.flipped());
                    p.on_node = true;
                    p
                },
            ],
            bounds: Aabb::new(Point3::new(0.0, -8.0, -8.0), Point3::new(0.0, 8.0, 8.0)),
        };

        let (front, back) = split_model_frag(frag, &plane, 0, 0.01);
        let front = front.unwrap();
        let back = back.unwrap();
        // same orientation goes back, flipped goes front
        assert_eq!(back.polys[0].planenum, 0);
        assert_eq!(front.polys[0].planenum, 1);
    }

    #[test]
    fn straddling_poly_is_split() {
        let plane = Plane::axis(0, 0.0);
        let quad = Plane::axis(2, 0.0);
        let frag = ModelFrag {
            original: 0,
            contents: Contents::SOLID,
            polys: vec![poly_on(2, quad)],
            bounds: Aabb::new(Point3::new(-8.0, -8.0, 0.0), Point3::new(8.0, 8.0, 0.0)),
        };

        let (front, back) = split_model_frag(frag, &plane, 0, 0.01);
        let front = front.unwrap();
        let back = back.unwrap();
        assert_eq!(front.polys.len(), 1);
        assert_eq!(back.polys.len(), 1);
        assert!(front.bounds.mins.x >= -0.01);
        assert!(back.bounds.maxs.x <= 0.01);
    }
}
