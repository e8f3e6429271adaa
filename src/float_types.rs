//! Scalar type selection and the numeric tolerances used across the crate.

// Our Real scalar type:
#[cfg(feature = "f32")]
pub type Real = f32;
#[cfg(feature = "f64")]
pub type Real = f64;

/// Default tolerance for point-vs-plane classification.
#[cfg(feature = "f32")]
pub const EPSILON: Real = 1e-4;
/// Default tolerance for point-vs-plane classification.
#[cfg(feature = "f64")]
pub const EPSILON: Real = 1e-5;

/// A winding whose area falls below this is considered degenerate (empty).
#[cfg(feature = "f32")]
pub const AREA_EPSILON: Real = 1e-4;
/// A winding whose area falls below this is considered degenerate (empty).
#[cfg(feature = "f64")]
pub const AREA_EPSILON: Real = 1e-6;

/// Coordinate magnitude limit for scene geometry. Portal base windings are
/// sized from this so they always overhang the world bounds.
pub const MAX_RANGE: Real = 16384.0;
