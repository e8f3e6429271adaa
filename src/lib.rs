//! A solid **BSP map compiler**: turns triangle-soup scenes into a sealed
//! BSP tree with a portal graph, visibility areas, and render sectors.
//!
//! The pipeline, driven by [`BspBuilder::compile`](compiler::BspBuilder::compile):
//! - **tree**: recursive polygon splitting over a deduplicated plane
//!   database, leaves classified by contents,
//! - **portals**: every leaf sealed by the windings shared with its
//!   neighbors, with source triangles matched onto portals,
//! - **flood**: reachability from entity origins, leak detection, and
//!   solid-filling of unreachable leaves,
//! - **areas**: connected non-solid regions separated by areaportals, with
//!   every visible triangle decomposed into the areas it touches,
//! - **sectors**: axis-aligned spatial buckets of each area's triangles.
//!
//! # Features
//! - **f64** (default): use f64 as Real
//! - **f32**: use f32 as Real, conflicts with f64

#![forbid(unsafe_code)]
#![deny(unused)]
#![warn(clippy::all)]

pub mod aabb;
pub mod compiler;
pub mod errors;
pub mod float_types;
pub mod plane;
pub mod scene;
pub mod winding;

#[cfg(any(all(feature = "f64", feature = "f32"), not(any(feature = "f64", feature = "f32"))))]
compile_error!("Either 'f64' or 'f32' feature must be specified, but not both");

pub use compiler::{BspBuilder, CompileOptions, CompileStats, NullProgress, Progress};
pub use errors::CompileError;
pub use scene::{Contents, Entity, Scene, SurfaceFlags, TriModel};
