//! End-to-end compiles of small hand-built scenes.

use nalgebra::Point3;
use solidbsp::compiler::{BspBuilder, CompileOptions, NullProgress};
use solidbsp::float_types::Real;
use solidbsp::scene::{Contents, Entity, Scene, SurfaceFlags, TriModel};

/// A hollow cubic room with inward-facing walls: 6 quads, 12 triangles,
/// one solid model.
fn room_model(lo: Real, hi: Real) -> TriModel {
    let mut m = TriModel::new("room", Contents::SOLID);
    let quad = |m: &mut TriModel,
                a: Point3<Real>,
                b: Point3<Real>,
                c: Point3<Real>,
                d: Point3<Real>| {
        m.push_tri(a, b, c);
        m.push_tri(a, c, d);
    };

    let p = |x, y, z| Point3::new(x, y, z);

    // walls wound so the normals point into the room
    quad(&mut m, p(lo, lo, lo), p(lo, hi, lo), p(lo, hi, hi), p(lo, lo, hi)); // +X
    quad(&mut m, p(hi, lo, lo), p(hi, lo, hi), p(hi, hi, hi), p(hi, hi, lo)); // -X
    quad(&mut m, p(lo, lo, lo), p(lo, lo, hi), p(hi, lo, hi), p(hi, lo, lo)); // +Y
    quad(&mut m, p(lo, hi, lo), p(hi, hi, lo), p(hi, hi, hi), p(lo, hi, hi)); // -Y
    quad(&mut m, p(lo, lo, lo), p(hi, lo, lo), p(hi, hi, lo), p(lo, hi, lo)); // +Z
    quad(&mut m, p(lo, lo, hi), p(lo, hi, hi), p(hi, hi, hi), p(hi, lo, hi)); // -Z
    m
}

fn room_scene(lo: Real, hi: Real) -> Scene {
    let mut scene = Scene::new();
    scene.models.push(room_model(lo, hi));
    scene
}

#[test]
fn room_compiles_to_sealed_tree() {
    let mut scene = room_scene(-128.0, 128.0);
    let mut builder = BspBuilder::new(CompileOptions::default());
    let stats = builder
        .compile(&mut scene, &mut NullProgress)
        .expect("compile")
        .clone();

    // six wall planes, seven leaves: six solid slabs and the interior
    assert_eq!(stats.num_structural_tris, 12);
    assert_eq!(stats.num_nodes, 6);
    assert_eq!(stats.num_leafs, 7);
    assert!(!stats.leaked);

    // every wall quad is matched onto exactly one portal
    assert_eq!(stats.num_portal_faces, 12);

    // sky area plus the room interior
    assert_eq!(stats.num_areas, 2);
    assert_eq!(builder.areas().len(), 2);
    assert_eq!(builder.areas()[1].tris.len(), 12);
    assert!(builder.areas()[0].tris.is_empty());

    // all 12 triangles are inside and exclusive to area 1
    assert_eq!(stats.num_inside_tris, 12);
    assert_eq!(stats.num_outside_tris, 0);
    for tri in &scene.models[0].tris {
        assert_eq!(tri.areas, vec![1]);
    }

    // one sector holds the whole room (256 < max sector extent)
    assert_eq!(stats.num_sectors, 1);
    assert_eq!(stats.num_shared_sectors, 0);
    assert_eq!(builder.areas()[1].sectors.len(), 1);
    assert_eq!(builder.sectors()[builder.areas()[1].sectors[0]].polys.len(), 12);
}

#[test]
fn every_tree_leaf_is_sealed_by_portals() {
    let mut scene = room_scene(-128.0, 128.0);
    let mut builder = BspBuilder::new(CompileOptions::default());
    builder
        .compile(&mut scene, &mut NullProgress)
        .expect("compile");

    let mut stack = vec![builder.root_id()];
    let mut leaves = 0;
    while let Some(id) = stack.pop() {
        let node = builder.node(id);
        if node.is_leaf() {
            leaves += 1;
            let portals = builder.leaf_portals(id);
            assert!(!portals.is_empty(), "leaf without portals");
            for (pid, side) in portals {
                let p = builder.portal(pid);
                // both-or-neither attachment, and this leaf is on the
                // claimed side
                assert_eq!(p.nodes[side], Some(id));
                assert!(p.nodes[side ^ 1].is_some());
            }
        } else {
            for child in node.children.iter().flatten() {
                stack.push(*child);
            }
        }
    }
    assert_eq!(leaves, 7);
}

#[test]
fn flood_from_entity_keeps_room_inside() {
    let mut scene = room_scene(-128.0, 128.0);
    scene
        .entities
        .push(Entity::new("info_player_start", Point3::new(0.0, 0.0, 0.0)));

    let mut builder = BspBuilder::new(CompileOptions::default());
    let stats = builder
        .compile(&mut scene, &mut NullProgress)
        .expect("compile")
        .clone();

    assert!(!stats.leaked);
    assert!(builder.leak_points().is_empty());
    assert_eq!(stats.num_inside_tris, 12);
    assert_eq!(stats.num_outside_tris, 0);
    assert!(!scene.models[0].outside);

    // the entity's leaf is the interior, and it got an area
    let leaf = builder.leaf_for_point(&Point3::new(0.0, 0.0, 0.0));
    assert!(builder.node(leaf).is_leaf());
    assert!(builder.node(leaf).occupied > 0);
    assert_eq!(builder.node(leaf).area, Some(1));
}

#[test]
fn open_room_leaks() {
    // drop the ceiling: the entity can see the outside leaf
    let mut scene = Scene::new();
    let mut model = room_model(-128.0, 128.0);
    model.tris.truncate(10);
    scene.models.push(model);
    scene
        .entities
        .push(Entity::new("info_player_start", Point3::new(0.0, 0.0, 0.0)));

    let mut builder = BspBuilder::new(CompileOptions::default());
    let stats = builder
        .compile(&mut scene, &mut NullProgress)
        .expect("compile")
        .clone();

    assert!(stats.leaked);
    // trail ends at the leaking entity's origin
    let trail = builder.leak_points();
    assert!(!trail.is_empty());
    assert_eq!(trail[trail.len() - 1], Point3::new(0.0, 0.0, 0.0));

    // the hull is not optimized, but areas still exist
    assert!(builder.areas().len() >= 2);
    assert!(stats.num_inside_tris > 0);
}

#[test]
fn sky_triangles_always_land_in_area_zero() {
    let mut scene = room_scene(-128.0, 128.0);
    let mut sky = TriModel::new("sky_patch", Contents::SKY);
    let quad_z = 100.0;
    sky.push_tri(
        Point3::new(-32.0, -32.0, quad_z),
        Point3::new(32.0, -32.0, quad_z),
        Point3::new(32.0, 32.0, quad_z),
    );
    sky.push_tri(
        Point3::new(-32.0, -32.0, quad_z),
        Point3::new(32.0, 32.0, quad_z),
        Point3::new(-32.0, 32.0, quad_z),
    );
    scene.models.push(sky);

    let mut builder = BspBuilder::new(CompileOptions::default());
    builder
        .compile(&mut scene, &mut NullProgress)
        .expect("compile");

    for tri in &scene.models[1].tris {
        assert_eq!(tri.areas, vec![0]);
    }
    assert_eq!(builder.areas()[0].tris.len(), 2);
    assert_eq!(builder.areas()[0].models, vec![1]);

    // the room's own triangles never join the sky area; the sky quad's
    // plane may split the interior, so they can touch several areas
    for tri in &scene.models[0].tris {
        assert!(!tri.areas.is_empty());
        assert!(!tri.areas.contains(&0));
    }
}

#[test]
fn solid_model_beyond_the_walls_is_outside() {
    let mut scene = room_scene(-128.0, 128.0);
    let mut crate_outside = TriModel::new("crate_outside", Contents::SOLID);
    crate_outside.push_tri(
        Point3::new(-140.0, -8.0, -8.0),
        Point3::new(-140.0, 8.0, -8.0),
        Point3::new(-140.0, 8.0, 8.0),
    );
    scene.models.push(crate_outside);
    scene
        .entities
        .push(Entity::new("info_player_start", Point3::new(0.0, 0.0, 0.0)));

    let mut builder = BspBuilder::new(CompileOptions::default());
    let stats = builder
        .compile(&mut scene, &mut NullProgress)
        .expect("compile")
        .clone();

    assert!(!stats.leaked);
    assert!(scene.models[1].outside);
    assert_eq!(stats.num_outside_models, 1);
    assert_eq!(stats.num_outside_tris, 1);
    assert!(scene.models[1].tris[0].areas.is_empty());

    // the room itself is unaffected
    assert!(!scene.models[0].outside);
    assert_eq!(stats.num_inside_tris, 12);
}

#[test]
fn nodraw_triangles_are_counted_but_not_decomposed() {
    let mut scene = Scene::new();
    let mut model = room_model(-128.0, 128.0);
    model.tris[0].surface = SurfaceFlags::NO_DRAW;
    scene.models.push(model);

    let mut builder = BspBuilder::new(CompileOptions::default());
    let stats = builder
        .compile(&mut scene, &mut NullProgress)
        .expect("compile")
        .clone();

    assert_eq!(stats.num_nodraw_tris, 1);
    assert_eq!(stats.num_inside_tris, 11);
    assert!(scene.models[0].tris[0].areas.is_empty());
    assert_eq!(builder.areas()[1].tris.len(), 11);
}

#[test]
fn oversized_room_subdivides_into_sectors() {
    // 1200 units across: each axis must be bisected at least once
    let mut scene = room_scene(-600.0, 600.0);
    let mut builder = BspBuilder::new(CompileOptions::default());
    let stats = builder
        .compile(&mut scene, &mut NullProgress)
        .expect("compile")
        .clone();

    assert!(stats.num_sectors > 1);
    for &sector_idx in &builder.areas()[1].sectors {
        let sector = &builder.sectors()[sector_idx];
        let size = sector.bounds.size();
        for i in 0..3 {
            assert!(size[i] <= 512.0 + 1e-6);
        }
        assert!(!sector.polys.is_empty());
        assert_eq!(sector.areas, vec![1]);
    }
}

#[test]
fn entity_in_solid_space_warns_and_does_not_flood() {
    let mut scene = room_scene(-128.0, 128.0);
    // inside the -X wall slab
    scene
        .entities
        .push(Entity::new("stuck", Point3::new(-130.0, 0.0, 0.0)));

    let mut builder = BspBuilder::new(CompileOptions::default());
    let stats = builder
        .compile(&mut scene, &mut NullProgress)
        .expect("compile")
        .clone();

    // no flood happened, so the optimization is off and nothing leaks
    assert!(!stats.leaked);
    assert_eq!(stats.num_inside_tris, 12);
}
