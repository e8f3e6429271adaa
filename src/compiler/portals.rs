//! Portal generation.
//!
//! Portals seal the tree: every leaf's boundary is exactly covered by its
//! portal windings. Six outward-facing bounding portals link the padded
//! world box to the synthetic outside leaf; each internal node then grows a
//! portal on its plane, clipped by everything bounding the node, and the
//! node's inherited portals are split down to its children. A final pass
//! matches portals against resident polygons so each portal knows which
//! source triangles sit on it.

use super::{BspBuilder, NodeId, Portal, PortalId};
use crate::aabb::Aabb;
use crate::float_types::Real;
use crate::plane::{Plane, Side};
use crate::scene::Contents;
use crate::winding::Winding;
use nalgebra::Vector3;
use tracing::{debug, info, warn};

impl BspBuilder {
    /// Build the portal graph for the whole tree.
    pub(crate) fn portalize(&mut self) {
        let root = self.root_id();
        info!("portalize");
        self.stats.num_portal_splits = 0;
        self.stats.num_portal_faces = 0;

        // reset the outside leaf
        let root_bounds = self.node(root).bounds;
        let padding = self.options.bounds_padding;
        let outside = self.outside;
        {
            let n = self.node_mut(outside);
            n.portals = None;
            n.children = [None, None];
            n.models.clear();
            n.occupied = 0;
            n.area = None;
            n.planenum = None;
            n.contents = Contents::NONE;
            n.bounds = root_bounds;
            // avoid null volumes
            n.bounds.expand(padding);
        }

        // six bounding portals facing outward, root on the back
        let windings = bbox_windings(&self.node(outside).bounds, self.options.max_range);
        for winding in windings {
            let planenum = self.planes.find_plane_num(winding.plane());
            let id = self.alloc_portal(Portal {
                winding,
                planenum,
                on_node: None,
                nodes: [None, None],
                next: [None, None],
                contents: Contents::NONE,
                original: Vec::new(),
            });
            self.add_portal_to_nodes(id, outside, root);
        }

        self.make_tree_portals(root);
        self.find_portal_node_faces(root);
        info!(faces = self.stats.num_portal_faces, "portal faces matched");
    }

    /// Attach `p` with `front` on its front side and `back` on its back.
    pub(crate) fn add_portal_to_nodes(&mut self, p: PortalId, front: NodeId, back: NodeId) {
        debug_assert!(
            self.portal(p).nodes[0].is_none() && self.portal(p).nodes[1].is_none(),
            "portal already attached"
        );

        let front_head = self.node(front).portals;
        {
            let portal = self.portal_mut(p);
            portal.nodes[0] = Some(front);
            portal.next[0] = front_head;
        }
        self.node_mut(front).portals = Some(p);

        let back_head = self.node(back).portals;
        {
            let portal = self.portal_mut(p);
            portal.nodes[1] = Some(back);
            portal.next[1] = back_head;
        }
        self.node_mut(back).portals = Some(p);
    }

    /// Detach `p` from one of its nodes, walking that node's list.
    pub(crate) fn remove_portal_from_node(&mut self, p: PortalId, node: NodeId) {
        debug_assert!(
            self.portal(p).nodes[0] == Some(node) || self.portal(p).nodes[1] == Some(node)
        );
        let pside = (self.portal(p).nodes[1] == Some(node)) as usize;

        let mut prev: Option<(PortalId, usize)> = None;
        let mut cur = self.node(node).portals;

        while let Some(test) = cur {
            let ns = (self.portal(test).nodes[1] == Some(node)) as usize;

            if test == p {
                let after = self.portal(test).next[pside];
                match prev {
                    Some((last, ls)) => self.portal_mut(last).next[ls] = after,
                    None => self.node_mut(node).portals = after,
                }
                let portal = self.portal_mut(p);
                portal.nodes[pside] = None;
                portal.next[pside] = None;
                return;
            }

            prev = Some((test, ns));
            cur = self.portal(test).next[ns];
        }

        debug_assert!(false, "portal not linked to node");
    }

    fn make_tree_portals(&mut self, node: NodeId) {
        if self.node(node).is_leaf() {
            return;
        }
        self.make_node_portal(node);
        self.split_node_portals(node);

        let [front, back] = self.node(node).children;
        if let Some(front) = front {
            self.make_tree_portals(front);
        }
        if let Some(back) = back {
            self.make_tree_portals(back);
        }
    }

    /// Create the portal separating `node`'s children: a huge winding on
    /// the node plane, clipped by every portal bounding the node.
    fn make_node_portal(&mut self, node: NodeId) {
        let planenum = match self.node(node).planenum {
            Some(num) => num,
            None => return,
        };
        let mut winding =
            Winding::from_plane(self.planes.plane(planenum), self.options.max_range);

        let mut cur = self.node(node).portals;
        while let Some(id) = cur {
            let bounding = self.portal(id);
            debug_assert!(bounding.planenum & !1 != planenum & !1);
            let side = (bounding.nodes[1] == Some(node)) as usize;
            let next = bounding.next[side];
            let plane = *self.planes.plane(bounding.planenum);

            match winding.side(&plane, self.options.split_epsilon) {
                // too small to split
                Side::On => {}
                Side::Front => {
                    if side == 1 {
                        warn!("node portal clipped away (back)");
                        return;
                    }
                }
                Side::Back => {
                    if side == 0 {
                        warn!("node portal clipped away (front)");
                        return;
                    }
                }
                Side::Cross => {
                    let (mut f, mut b) = winding.split(&plane, self.options.split_epsilon);
                    if f.empty() {
                        warn!("node portal clipped away (cross/front)");
                    }
                    if b.empty() {
                        warn!("node portal clipped away (cross/back)");
                    }
                    if side == 1 {
                        std::mem::swap(&mut f, &mut b);
                    }
                    if f.empty() {
                        return;
                    }
                    winding = f;
                }
            }

            cur = next;
        }

        let [front, back] = self.node(node).children;
        let (front, back) = match (front, back) {
            (Some(f), Some(b)) => (f, b),
            _ => return,
        };

        let id = self.alloc_portal(Portal {
            winding,
            planenum,
            on_node: Some(node),
            nodes: [None, None],
            next: [None, None],
            contents: Contents::NONE,
            original: Vec::new(),
        });
        self.add_portal_to_nodes(id, front, back);
    }

    /// Hand every portal bounding `node` down to the child (or children) it
    /// bounds, splitting straddlers at the node plane. A portal coplanar
    /// with the node plane cannot bound either child and is dropped.
    fn split_node_portals(&mut self, node: NodeId) {
        let planenum = match self.node(node).planenum {
            Some(num) => num,
            None => return,
        };
        let plane = *self.planes.plane(planenum);
        let [front_child, back_child] = match self.node(node).children {
            [Some(f), Some(b)] => [f, b],
            _ => return,
        };

        while let Some(id) = self.node(node).portals {
            let portal = self.portal(id);
            let side = (portal.nodes[1] == Some(node)) as usize;
            let other = match portal.nodes[side ^ 1] {
                Some(other) => other,
                None => break,
            };
            let n0 = portal.nodes[0];
            let n1 = portal.nodes[1];

            if let Some(n0) = n0 {
                self.remove_portal_from_node(id, n0);
            }
            if let Some(n1) = n1 {
                self.remove_portal_from_node(id, n1);
            }

            let (f, b) = self
                .portal(id)
                .winding
                .split(&plane, self.options.split_epsilon);

            self.stats.num_portal_splits += 1;
            if self.stats.num_portal_splits % 1000 == 0 {
                debug!(splits = self.stats.num_portal_splits, "splitting portals");
            }

            if f.empty() && b.empty() {
                // coplanar with the node plane; it bounds neither child
                warn!("portal coplanar with node plane dropped");
                continue;
            }

            if !f.empty() && !b.empty() {
                let clone = self.clone_portal(id);
                self.portal_mut(id).winding = f;
                self.portal_mut(clone).winding = b;
                if side == 0 {
                    self.add_portal_to_nodes(id, front_child, other);
                    self.add_portal_to_nodes(clone, back_child, other);
                } else {
                    self.add_portal_to_nodes(id, other, front_child);
                    self.add_portal_to_nodes(clone, other, back_child);
                }
            } else if b.empty() {
                if side == 0 {
                    self.add_portal_to_nodes(id, front_child, other);
                } else {
                    self.add_portal_to_nodes(id, other, front_child);
                }
            } else if side == 0 {
                self.add_portal_to_nodes(id, back_child, other);
            } else {
                self.add_portal_to_nodes(id, other, back_child);
            }
        }
    }

    fn clone_portal(&mut self, id: PortalId) -> PortalId {
        let src = self.portal(id);
        let copy = Portal {
            winding: src.winding.clone(),
            planenum: src.planenum,
            on_node: src.on_node,
            nodes: [None, None],
            next: [None, None],
            contents: Contents::NONE,
            original: src.original.clone(),
        };
        self.alloc_portal(copy)
    }

    /// Post-order: for each visible-contents leaf, tag untagged portals
    /// whose (side-corrected, away-facing) plane matches a resident poly
    /// with that poly's source triangle and the single visible contents bit
    /// separating the portal's sides.
    fn find_portal_node_faces(&mut self, node: NodeId) {
        if !self.node(node).is_leaf() {
            let [front, back] = self.node(node).children;
            if let Some(front) = front {
                self.find_portal_node_faces(front);
            }
            if let Some(back) = back {
                self.find_portal_node_faces(back);
            }
        }

        if !self.node(node).contents.intersects(Contents::VISIBLE) {
            return;
        }

        for (id, side) in self.leaf_portals(node) {
            if !self.portal(id).original.is_empty() {
                continue;
            }

            let portal = self.portal(id);
            let (n0, n1) = match (portal.nodes[0], portal.nodes[1]) {
                (Some(a), Some(b)) => (a, b),
                _ => continue,
            };
            let xor = (self.node(n0).contents ^ self.node(n1).contents) & Contents::VISIBLE;
            let Some(contents) = xor.first_visible_bit() else {
                continue;
            };

            // matching polys always face away from the leaf
            let planenum = self.portal(id).planenum ^ (side as u32 ^ 1);

            let mut matched = Vec::new();
            for frag in &self.node(node).models {
                if !frag.contents.intersects(contents) {
                    continue;
                }
                for poly in &frag.polys {
                    if poly.planenum == planenum {
                        matched.push(poly.original);
                    }
                }
            }

            if !matched.is_empty() {
                self.stats.num_portal_faces += matched.len();
                let portal = self.portal_mut(id);
                portal.contents |= contents;
                portal.original.extend(matched);
            }
        }
    }
}

/// The six outward-facing planes of a box.
fn bbox_planes(bounds: &Aabb) -> [Plane; 6] {
    [
        Plane::new(-Vector3::x(), -bounds.mins.x),
        Plane::new(Vector3::x(), bounds.maxs.x),
        Plane::new(-Vector3::y(), -bounds.mins.y),
        Plane::new(Vector3::y(), bounds.maxs.y),
        Plane::new(-Vector3::z(), -bounds.mins.z),
        Plane::new(Vector3::z(), bounds.maxs.z),
    ]
}

/// One winding per box face, each clipped to the box by the four planes not
/// parallel to it.
fn bbox_windings(bounds: &Aabb, max_range: Real) -> Vec<Winding> {
    let planes = bbox_planes(bounds);
    let mut out = Vec::with_capacity(6);
    for i in 0..6 {
        let mut w = Winding::from_plane(&planes[i], max_range);
        for y in 0..4 {
            let z = ((i / 2 * 2) + y + 2) % 6;
            w = w.chop(&planes[z], Side::Back, 0.0);
            debug_assert!(!w.empty());
        }
        out.push(w);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::CompileOptions;
    use nalgebra::Point3;

    fn box_bounds(extent: Real) -> Aabb {
        Aabb::new(
            Point3::new(-extent, -extent, -extent),
            Point3::new(extent, extent, extent),
        )
    }

    #[test]
    fn bbox_windings_cover_faces() {
        let bounds = box_bounds(64.0);
        let windings = bbox_windings(&bounds, 16384.0);
        assert_eq!(windings.len(), 6);
        for w in &windings {
            assert!(!w.empty());
            // each face winding is a 128 x 128 quad
            assert!((w.area() - 128.0 * 128.0).abs() < 1e-6);
        }
    }

    /// Two leaves separated by a single plane through a box: each leaf must
    /// end up sealed by 6 portals, sharing exactly one separator.
    #[test]
    fn bisected_box_seals_both_leaves() {
        let mut b = BspBuilder::new(CompileOptions::default());
        let root = b.alloc_node();
        b.root = Some(root);
        let planenum = b.planes.find_plane_num(&Plane::axis(0, 0.0));

        let front = b.alloc_node();
        let back = b.alloc_node();
        b.node_mut(root).planenum = Some(planenum);
        b.node_mut(root).children = [Some(front), Some(back)];
        b.node_mut(front).parent = Some(root);
        b.node_mut(back).parent = Some(root);
        b.node_mut(root).bounds = box_bounds(64.0);

        b.portalize();

        let front_portals = b.leaf_portals(front);
        let back_portals = b.leaf_portals(back);
        assert_eq!(front_portals.len(), 6);
        assert_eq!(back_portals.len(), 6);

        // exactly one portal is shared between the two leaves
        let shared: Vec<_> = front_portals
            .iter()
            .filter(|(id, _)| back_portals.iter().any(|(other, _)| other == id))
            .collect();
        assert_eq!(shared.len(), 1);

        // the separator was generated by the root and spans the padded box
        let (sep, _) = *shared[0];
        assert_eq!(b.portal(sep).on_node, Some(root));
        let pad = 64.0 + 32.0;
        assert!((b.portal(sep).winding.area() - (2.0 * pad) * (2.0 * pad)).abs() < 1e-6);

        // every attached portal has both nodes
        for (id, _) in front_portals.iter().chain(back_portals.iter()) {
            let p = b.portal(*id);
            assert!(p.nodes[0].is_some() && p.nodes[1].is_some());
        }
    }

    /// Detach/attach symmetry: removing a portal from one node clears only
    /// that side.
    #[test]
    fn remove_portal_clears_one_side() {
        let mut b = BspBuilder::new(CompileOptions::default());
        let n0 = b.alloc_node();
        let n1 = b.alloc_node();
        let planenum = b.planes.find_plane_num(&Plane::axis(2, 0.0));
        let id = b.alloc_portal(Portal {
            winding: Winding::from_plane(&Plane::axis(2, 0.0), 8.0),
            planenum,
            on_node: None,
            nodes: [None, None],
            next: [None, None],
            contents: Contents::NONE,
            original: Vec::new(),
        });

        b.add_portal_to_nodes(id, n0, n1);
        assert_eq!(b.leaf_portals(n0).len(), 1);
        assert_eq!(b.leaf_portals(n1).len(), 1);

        b.remove_portal_from_node(id, n0);
        assert!(b.leaf_portals(n0).is_empty());
        assert_eq!(b.leaf_portals(n1).len(), 1);
        assert_eq!(b.portal(id).nodes[0], None);
        assert_eq!(b.portal(id).nodes[1], Some(n1));

        b.remove_portal_from_node(id, n1);
        assert!(b.leaf_portals(n1).is_empty());
        assert_eq!(b.portal(id).nodes[1], None);
    }
}
