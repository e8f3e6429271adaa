//! The solid BSP compiler.
//!
//! [`BspBuilder::compile`] runs the full pipeline over a [`Scene`]:
//!
//! 1. build the BSP tree from structural geometry ([`tree`]),
//! 2. seal every leaf with a portal graph ([`portals`]),
//! 3. flood from entity origins and fill unreachable leaves ([`flood`]),
//! 4. flood leaves into areas and decompose triangles into them ([`areas`]),
//! 5. subdivide each area's triangles into sectors ([`sectors`]).
//!
//! Nodes and portals live in arenas on the builder and are addressed by
//! [`NodeId`] / [`PortalId`]; leaves reference their portals through a
//! side-tagged intrusive list threaded through the portal arena.

pub mod areas;
pub mod flood;
pub mod portals;
pub mod sectors;
pub mod tree;

use crate::aabb::Aabb;
use crate::errors::CompileError;
use crate::float_types::{MAX_RANGE, Real};
use crate::plane::PlaneSet;
use crate::scene::{Contents, Scene, TriRef};
use crate::winding::Winding;
use nalgebra::Point3;
use tracing::info;

/// Index of a node in the builder's node arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) u32);

/// Index of a portal in the builder's portal arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PortalId(pub(crate) u32);

/// A polygon resident in the tree during construction: a triangle's winding
/// plus its plane number and the contents of its source model.
#[derive(Debug, Clone)]
pub struct Poly {
    pub original: TriRef,
    pub winding: Winding,
    pub planenum: u32,
    pub contents: Contents,
    /// Set once the poly's plane has been used as a node plane.
    pub on_node: bool,
}

/// The fragment of one model's polygons that reached a given node.
#[derive(Debug, Clone)]
pub struct ModelFrag {
    pub original: usize,
    pub contents: Contents,
    pub polys: Vec<Poly>,
    pub bounds: Aabb,
}

/// A BSP node. Internal nodes carry a plane number; leaves carry contents,
/// occupancy, an area, and the head of their portal list.
#[derive(Debug, Clone)]
pub struct Node {
    /// `None` marks a leaf.
    pub planenum: Option<u32>,
    pub parent: Option<NodeId>,
    pub children: [Option<NodeId>; 2],
    pub bounds: Aabb,
    pub models: Vec<ModelFrag>,
    /// Head of the intrusive portal list (leaves and, during portalization,
    /// internal nodes).
    pub portals: Option<PortalId>,
    pub contents: Contents,
    /// Flood-fill depth; 0 = unreached.
    pub occupied: u32,
    pub area: Option<u32>,
    /// For areaportal leaves: the (up to) two areas the portal separates.
    pub portal_areas: [Option<u32>; 2],
    pub area_warned: bool,
}

impl Node {
    fn new() -> Self {
        Self {
            planenum: None,
            parent: None,
            children: [None, None],
            bounds: Aabb::empty(),
            models: Vec::new(),
            portals: None,
            contents: Contents::NONE,
            occupied: 0,
            area: None,
            portal_areas: [None, None],
            area_warned: false,
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.planenum.is_none()
    }
}

/// A portal: the winding of shared boundary between two leaves. `nodes[0]`
/// is the leaf on the front side of the portal plane. A portal is either
/// attached on both sides or detached on both.
#[derive(Debug, Clone)]
pub struct Portal {
    pub winding: Winding,
    pub planenum: u32,
    /// The node whose plane generated this portal, if any.
    pub on_node: Option<NodeId>,
    pub nodes: [Option<NodeId>; 2],
    pub(crate) next: [Option<PortalId>; 2],
    /// Visible contents bit separating the two sides, set by face matching.
    pub contents: Contents,
    /// Source triangles resident on the portal plane.
    pub original: Vec<TriRef>,
}

/// A connected region of non-solid leaves. Area 0 is reserved for sky.
#[derive(Debug, Clone)]
pub struct Area {
    pub id: u32,
    pub bounds: Aabb,
    /// Triangles assigned to this area by the decomposition.
    pub tris: Vec<TriRef>,
    /// Models contributing at least one of those triangles.
    pub models: Vec<usize>,
    /// Indices into the builder's sector list.
    pub sectors: Vec<usize>,
}

/// A triangle fragment being sorted into sectors.
#[derive(Debug, Clone)]
pub struct SectorPoly {
    pub tri: TriRef,
    pub winding: Winding,
}

/// A spatial bucket of renderable triangle fragments, no larger than the
/// configured sector extent on any axis.
#[derive(Debug, Clone)]
pub struct Sector {
    pub bounds: Aabb,
    pub polys: Vec<SectorPoly>,
    pub areas: Vec<u32>,
}

impl Sector {
    fn new(bounds: Aabb) -> Self {
        Self {
            bounds,
            polys: Vec::new(),
            areas: Vec::new(),
        }
    }
}

/// Tuning knobs for a compile. The defaults match the engine's map format.
#[derive(Debug, Clone)]
pub struct CompileOptions {
    /// Epsilon used when splitting windings at node planes.
    pub split_epsilon: Real,
    /// Per-component normal tolerance for plane deduplication.
    pub plane_normal_epsilon: Real,
    /// Distance tolerance for plane deduplication.
    pub plane_dist_epsilon: Real,
    /// Maximum coordinate magnitude; portal base windings are this large.
    pub max_range: Real,
    /// Outward padding applied to the world bounds before portalization.
    pub bounds_padding: Real,
    /// Maximum sector extent per axis before subdivision.
    pub max_sector_extent: Real,
    /// Hard limit on the number of areas.
    pub max_areas: usize,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            split_epsilon: 0.01,
            plane_normal_epsilon: 1e-5,
            plane_dist_epsilon: 0.01,
            max_range: MAX_RANGE,
            bounds_padding: 32.0,
            max_sector_extent: 512.0,
            max_areas: 256,
        }
    }
}

/// Counters accumulated over a compile.
#[derive(Debug, Clone, Default)]
pub struct CompileStats {
    pub num_structural_tris: usize,
    pub num_detail_tris: usize,
    pub num_nodes: usize,
    pub num_leafs: usize,
    pub num_portal_splits: usize,
    pub num_portal_faces: usize,
    pub num_inside_nodes: usize,
    pub num_outside_nodes: usize,
    pub num_inside_tris: usize,
    pub num_outside_tris: usize,
    pub num_nodraw_tris: usize,
    pub num_inside_models: usize,
    pub num_outside_models: usize,
    pub num_areas: usize,
    pub num_sectors: usize,
    pub num_shared_sectors: usize,
    pub leaked: bool,
}

/// Coarse compile progress, for driving a UI. Side-effect only.
pub trait Progress {
    fn begin(&mut self, _title: &str, _total: usize) {}
    fn step(&mut self) {}
}

/// The default reporter; does nothing.
pub struct NullProgress;

impl Progress for NullProgress {}

/// The solid BSP compiler. Create one per compile.
pub struct BspBuilder {
    pub(crate) options: CompileOptions,
    pub(crate) planes: PlaneSet,
    pub(crate) nodes: Vec<Node>,
    pub(crate) portals: Vec<Portal>,
    pub(crate) areas: Vec<Area>,
    pub(crate) sectors: Vec<Sector>,
    pub(crate) root: Option<NodeId>,
    /// Synthetic leaf representing everything beyond the world bounds.
    pub(crate) outside: NodeId,
    /// True once a flood fill succeeded; enables outside-culling paths.
    pub(crate) flood: bool,
    pub(crate) leak_points: Vec<Point3<Real>>,
    pub(crate) stats: CompileStats,
}

impl BspBuilder {
    pub fn new(options: CompileOptions) -> Self {
        let planes = PlaneSet::new(options.plane_normal_epsilon, options.plane_dist_epsilon);
        let mut builder = Self {
            options,
            planes,
            nodes: Vec::new(),
            portals: Vec::new(),
            areas: Vec::new(),
            sectors: Vec::new(),
            root: None,
            outside: NodeId(0),
            flood: false,
            leak_points: Vec::new(),
            stats: CompileStats::default(),
        };
        builder.outside = builder.alloc_node();
        builder
    }

    /// Run the full pipeline. The scene is annotated in place (triangle
    /// areas, outside flags); the tree, portals, areas, and sectors stay on
    /// the builder for inspection afterwards.
    pub fn compile(
        &mut self,
        scene: &mut Scene,
        progress: &mut dyn Progress,
    ) -> Result<&CompileStats, CompileError> {
        self.create_root(scene);
        info!(
            structural = self.stats.num_structural_tris,
            detail = self.stats.num_detail_tris,
            "building tree"
        );

        let root = self.root_id();
        self.split_node(root, scene);
        info!(
            nodes = self.stats.num_nodes,
            leafs = self.stats.num_leafs,
            "tree built"
        );

        self.portalize();

        if self.flood_fill(scene) {
            self.flood = true;
            self.fill_outside(scene);
        }

        self.area_flood()?;
        self.compile_areas(scene, progress);
        self.build_sectors(scene)?;

        Ok(&self.stats)
    }

    pub fn root_id(&self) -> NodeId {
        match self.root {
            Some(id) => id,
            None => self.outside,
        }
    }

    pub fn outside_id(&self) -> NodeId {
        self.outside
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0 as usize]
    }

    pub fn portal(&self, id: PortalId) -> &Portal {
        &self.portals[id.0 as usize]
    }

    pub fn planes(&self) -> &PlaneSet {
        &self.planes
    }

    pub fn areas(&self) -> &[Area] {
        &self.areas
    }

    pub fn sectors(&self) -> &[Sector] {
        &self.sectors
    }

    pub fn stats(&self) -> &CompileStats {
        &self.stats
    }

    /// The leak trail recorded when the last flood fill escaped the hull:
    /// portal centers from the outside leaf back to the leaking entity.
    pub fn leak_points(&self) -> &[Point3<Real>] {
        &self.leak_points
    }

    /// The portals attached to `node`, each with the side `node` is on.
    pub fn leaf_portals(&self, node: NodeId) -> Vec<(PortalId, usize)> {
        let mut out = Vec::new();
        let mut cur = self.node(node).portals;
        while let Some(id) = cur {
            let p = self.portal(id);
            let side = (p.nodes[1] == Some(node)) as usize;
            out.push((id, side));
            cur = p.next[side];
        }
        out
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0 as usize]
    }

    pub(crate) fn portal_mut(&mut self, id: PortalId) -> &mut Portal {
        &mut self.portals[id.0 as usize]
    }

    pub(crate) fn alloc_node(&mut self) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node::new());
        id
    }

    pub(crate) fn alloc_portal(&mut self, portal: Portal) -> PortalId {
        let id = PortalId(self.portals.len() as u32);
        self.portals.push(portal);
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_builder_has_outside_leaf() {
        let b = BspBuilder::new(CompileOptions::default());
        assert!(b.node(b.outside_id()).is_leaf());
        assert!(b.leaf_portals(b.outside_id()).is_empty());
    }
}
