//! Pure transformations: body encoding and fault mapping.

pub mod body;
pub mod map;

pub use map::map_fault;
