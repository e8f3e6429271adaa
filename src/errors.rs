//! Compile errors.
//!
//! Degenerate input geometry is never an error; the compiler clips it away
//! with a warning. Errors are reserved for limits the runtime format cannot
//! represent.

use crate::float_types::Real;

/// Fatal conditions a compile can end with.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CompileError {
    /// The map produced more areas than the runtime supports.
    #[error("map has {count} areas, exceeding the limit of {max}")]
    TooManyAreas { count: usize, max: usize },

    /// An area's bounds exceed the maximum coordinate range.
    #[error(
        "area {area} is huge: bounds ({size_x} x {size_y} x {size_z}) exceed the limit of {max}"
    )]
    AreaTooLarge {
        area: u32,
        size_x: Real,
        size_y: Real,
        size_z: Real,
        max: Real,
    },
}
