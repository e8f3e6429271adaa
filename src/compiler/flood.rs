//! Flood fill and outside culling.
//!
//! The flood starts at every point entity and spreads through portals whose
//! far leaf is not solid, stamping each reached leaf with its depth. If the
//! flood ever reaches the synthetic outside leaf the map leaked; the leak
//! trail is recorded and the optimization is disabled rather than aborting
//! the compile. After a clean flood, every unreached leaf is filled solid
//! and the triangles fronting occupied leaves are marked inside.

use super::{BspBuilder, NodeId};
use crate::float_types::Real;
use crate::scene::{Contents, Scene};
use nalgebra::Point3;
use tracing::{info, warn};

impl BspBuilder {
    /// The leaf containing `point`. Points exactly on a plane go to the
    /// back child.
    pub fn leaf_for_point(&self, point: &Point3<Real>) -> NodeId {
        let mut node = self.root_id();
        while let Some(planenum) = self.node(node).planenum {
            let plane = self.planes.plane(planenum);
            let side = (plane.distance_to(point) <= 0.0) as usize;
            match self.node(node).children[side] {
                Some(child) => node = child,
                None => break,
            }
        }
        node
    }

    /// Flood from every entity origin. Returns true when at least one
    /// entity flooded and nothing escaped the hull.
    pub(crate) fn flood_fill(&mut self, scene: &Scene) -> bool {
        info!("flood fill");
        self.stats.num_inside_nodes = 0;
        let mut did_flood = false;

        for entity in &scene.entities {
            if entity.sky {
                continue;
            }

            let leaf = self.leaf_for_point(&entity.origin);
            if self.node(leaf).contents.intersects(Contents::SOLID) {
                warn!(entity = %entity.name, "entity is in solid space");
                continue;
            }

            did_flood = true;
            self.portal_flood(leaf, 1);

            if self.node(self.outside).occupied != 0 {
                self.mark_leak_trail(entity.origin);
                self.stats.leaked = true;
                warn!(
                    entity = %entity.name,
                    "MAP LEAKED, hull will not be optimized (entity can see outside)"
                );
                return false;
            }
        }

        if !did_flood {
            warn!("no valid entities found for flood, level will not be optimized");
        }

        did_flood
    }

    /// After a clean flood: unoccupied leaves become solid, and portal
    /// source triangles fronting occupied leaves are pulled back inside.
    pub(crate) fn fill_outside(&mut self, scene: &mut Scene) {
        info!("fill outside (structural only)");
        self.stats.num_outside_nodes = 0;
        self.stats.num_inside_nodes = 0;
        self.stats.num_inside_tris = 0;
        self.stats.num_outside_tris = 0;
        self.stats.num_inside_models = 0;
        self.stats.num_outside_models = 0;

        // structural tris start outside; occupied faces pull them back in
        for model in scene.models.iter_mut() {
            if model.ignore || model.cinematic {
                continue;
            }
            if model.contents.intersects(Contents::DETAIL) || model.contents == Contents::SKY {
                continue;
            }
            for tri in model.tris.iter_mut() {
                tri.outside = true;
            }
        }

        let root = self.root_id();
        self.fill_outside_nodes(root);
        self.mark_occupied_node_faces(root, scene);

        for model in scene.models.iter_mut() {
            if model.ignore || model.cinematic {
                continue;
            }

            // detail and sky are never culled by the flood
            if model.contents.intersects(Contents::DETAIL) || model.contents == Contents::SKY {
                self.stats.num_inside_models += 1;
                self.stats.num_inside_tris += model.tris.len();
                continue;
            }

            let mut outside = true;
            for tri in &model.tris {
                if tri.outside {
                    self.stats.num_outside_tris += 1;
                } else {
                    self.stats.num_inside_tris += 1;
                    outside = false;
                }
            }

            model.outside = outside;
            if outside {
                self.stats.num_outside_models += 1;
            } else {
                self.stats.num_inside_models += 1;
            }
        }

        info!(
            inside_nodes = self.stats.num_inside_nodes,
            outside_nodes = self.stats.num_outside_nodes,
            inside_tris = self.stats.num_inside_tris,
            outside_tris = self.stats.num_outside_tris,
            "fill outside done"
        );
    }

    fn portal_flood(&mut self, leaf: NodeId, depth: u32) {
        debug_assert!(self.node(leaf).is_leaf());

        self.stats.num_inside_nodes += 1;
        self.node_mut(leaf).occupied = depth;

        for (id, side) in self.leaf_portals(leaf) {
            let Some(other) = self.portal(id).nodes[side ^ 1] else {
                continue;
            };
            if self.node(other).occupied != 0 {
                continue;
            }
            if self.node(other).contents.intersects(Contents::FLOOD_STOP) {
                continue;
            }
            self.portal_flood(other, depth + 1);
        }
    }

    /// Walk the shortest occupied path from the outside leaf back toward
    /// the seed, recording portal centers, then the entity origin.
    fn mark_leak_trail(&mut self, origin: Point3<Real>) {
        self.leak_points.clear();
        let mut node = self.outside;
        let mut count = self.node(node).occupied;

        while self.node(node).occupied > 1 {
            let mut next: Option<(Point3<Real>, NodeId)> = None;

            for (id, side) in self.leaf_portals(node) {
                let Some(other) = self.portal(id).nodes[side ^ 1] else {
                    continue;
                };
                let occupied = self.node(other).occupied;
                if occupied != 0 && occupied < count {
                    next = Some((self.portal(id).winding.center(), other));
                    count = occupied;
                }
            }

            let Some((center, cross)) = next else {
                break;
            };
            node = cross;
            self.leak_points.push(center);
        }

        self.leak_points.push(origin);
    }

    fn fill_outside_nodes(&mut self, node: NodeId) {
        if !self.node(node).is_leaf() {
            let [front, back] = self.node(node).children;
            if let Some(front) = front {
                self.fill_outside_nodes(front);
            }
            if let Some(back) = back {
                self.fill_outside_nodes(back);
            }
            return;
        }

        if self.node(node).occupied == 0 {
            self.stats.num_outside_nodes += 1;
            self.node_mut(node).contents = Contents::SOLID;
        }
    }

    /// Mark the source triangles of portals fronting occupied leaves as
    /// inside. Areaportal boundaries are suppressed; their faces are not
    /// drawn geometry.
    fn mark_occupied_node_faces(&mut self, node: NodeId, scene: &mut Scene) {
        if !self.node(node).is_leaf() {
            let [front, back] = self.node(node).children;
            if let Some(front) = front {
                self.mark_occupied_node_faces(front, scene);
            }
            if let Some(back) = back {
                self.mark_occupied_node_faces(back, scene);
            }
            return;
        }

        if self.node(node).occupied == 0 {
            return;
        }
        self.stats.num_inside_nodes += 1;

        for (id, _) in self.leaf_portals(node) {
            let portal = self.portal(id);
            let (n0, n1) = match (portal.nodes[0], portal.nodes[1]) {
                (Some(a), Some(b)) => (a, b),
                _ => continue,
            };

            let xor = self.node(n0).contents ^ self.node(n1).contents;
            if xor.intersects(Contents::AREAPORTAL) {
                continue;
            }

            for tri in self.portal(id).original.clone() {
                scene.tri_mut(tri).outside = false;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::CompileOptions;
    use crate::plane::Plane;

    #[test]
    fn leaf_for_point_walks_the_tree() {
        let mut b = BspBuilder::new(CompileOptions::default());
        let root = b.alloc_node();
        b.root = Some(root);
        let planenum = b.planes.find_plane_num(&Plane::axis(0, 0.0));
        let front = b.alloc_node();
        let back = b.alloc_node();
        b.node_mut(root).planenum = Some(planenum);
        b.node_mut(root).children = [Some(front), Some(back)];

        assert_eq!(b.leaf_for_point(&Point3::new(5.0, 0.0, 0.0)), front);
        assert_eq!(b.leaf_for_point(&Point3::new(-5.0, 0.0, 0.0)), back);
        // on-plane points go back
        assert_eq!(b.leaf_for_point(&Point3::new(0.0, 0.0, 0.0)), back);
    }
}
